use bonfire::geo::{BoundingBox, LatLng};
use bonfire::map::cluster::{ClusterIndex, ClusterOptions, Feature};
use bonfire::map::controller::{MapController, MapOptions};
use bonfire::map::viewport::{Frame, Viewport};
use std::collections::HashSet;

const WIDTH: f64 = 1280.0;
const HEIGHT: f64 = 800.0;

fn lisbon_events() -> Vec<(LatLng, u32)> {
    vec![
        (LatLng::new(38.720, -9.140), 1),
        (LatLng::new(38.725, -9.135), 2),
        (LatLng::new(38.715, -9.145), 3),
        (LatLng::new(38.720, -9.130), 4),
        (LatLng::new(38.730, -9.140), 5),
    ]
}

/// Deterministic scatter over most of the globe.
fn scattered_events(count: u32) -> Vec<(LatLng, u32)> {
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        seed = seed
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (seed >> 11) as f64 / (1u64 << 53) as f64
    };

    (0..count)
        .map(|id| {
            let latitude = next() * 160.0 - 80.0;
            let longitude = next() * 360.0 - 180.0;
            (LatLng::new(latitude, longitude), id)
        })
        .collect()
}

fn clusters(features: &[Feature<u32>]) -> Vec<(usize, LatLng)> {
    features
        .iter()
        .filter_map(|feature| match feature {
            Feature::Cluster { count, center, .. } => Some((*count, *center)),
            Feature::Leaf { .. } => None,
        })
        .collect()
}

#[test_log::test]
fn nearby_events_should_form_one_cluster_with_every_member() {
    for members in 2..=5 {
        let events = lisbon_events().into_iter().take(members).collect::<Vec<_>>();
        let index = ClusterIndex::new(ClusterOptions::default(), events);

        let features = index.clusters(&BoundingBox::WORLD, 10.0);

        assert_eq!(features.len(), 1, "{} members: {:?}", members, features);
        assert_eq!(clusters(&features)[0].0, members);
    }
}

#[test_log::test]
fn flattening_should_give_back_every_indexed_event() {
    let mut events = scattered_events(500);
    events.push((LatLng::new(f64::NAN, 10.0), 1_000));
    events.push((LatLng::new(95.0, 10.0), 1_001));
    let index = ClusterIndex::new(ClusterOptions::default(), events.clone());

    let expected = events
        .iter()
        .filter(|(position, _)| position.is_valid())
        .map(|(_, id)| *id)
        .collect::<HashSet<u32>>();

    for zoom in [0.0, 2.0, 5.0, 9.0, 19.0] {
        let frame = Frame::compute(&index, Viewport::new(BoundingBox::WORLD, zoom));
        let visible = frame.visible.iter().copied().collect::<HashSet<u32>>();

        assert_eq!(visible.len(), frame.visible.len(), "duplicates at zoom {}", zoom);
        assert_eq!(visible, expected, "zoom {}", zoom);
    }
}

#[test_log::test]
fn expansion_zoom_should_split_every_cluster() {
    let index = ClusterIndex::new(ClusterOptions::default(), scattered_events(300));

    for zoom in 0..6 {
        for feature in index.clusters(&BoundingBox::WORLD, zoom as f64) {
            let Feature::Cluster { id, count, .. } = feature else {
                continue;
            };
            let members = index.leaves(id).unwrap().into_iter().collect::<HashSet<u32>>();
            assert_eq!(members.len(), count);

            let expansion_zoom = index.expansion_zoom(id).unwrap();
            assert!(expansion_zoom as i32 > zoom);

            let holding_members = index
                .clusters(&BoundingBox::WORLD, expansion_zoom as f64)
                .into_iter()
                .filter(|feature| match feature {
                    Feature::Leaf { item, .. } => members.contains(item),
                    Feature::Cluster { id, .. } => index
                        .leaves(*id)
                        .unwrap()
                        .iter()
                        .any(|item| members.contains(item)),
                })
                .collect::<Vec<_>>();

            assert!(
                holding_members.len() > 1,
                "{} still whole at zoom {}",
                id,
                expansion_zoom
            );
            assert!(holding_members.iter().all(|feature| feature.count() < count));
        }
    }
}

#[test_log::test]
fn clicking_a_cluster_of_five_should_reveal_smaller_groups() {
    let center = LatLng::new(38.722, -9.138);
    let mut map = MapController::new(
        MapOptions::default(),
        Viewport::around(center, 10.0, WIDTH, HEIGHT),
    );

    let frame = map.replace_items(lisbon_events());
    let [Feature::Cluster { id, count: 5, .. }] = frame.features.as_slice() else {
        panic!("expected one cluster of five, got {:?}", frame.features);
    };
    let id = *id;

    let camera = map.expand_cluster(id).unwrap();
    assert!(camera.zoom > 10.0);

    let frame = map.set_viewport(Viewport::around(camera.center, camera.zoom, WIDTH, HEIGHT));

    assert!(frame.features.len() > 1);
    assert!(frame.features.iter().all(|feature| feature.count() < 5));
    assert_eq!(
        frame.visible.iter().copied().collect::<HashSet<u32>>(),
        HashSet::from([1, 2, 3, 4, 5])
    );
}

#[test_log::test]
fn clicked_cluster_from_an_old_index_should_be_rejected() {
    let center = LatLng::new(38.722, -9.138);
    let mut map = MapController::new(
        MapOptions::default(),
        Viewport::around(center, 10.0, WIDTH, HEIGHT),
    );

    let frame = map.replace_items(lisbon_events());
    let Feature::Cluster { id, .. } = frame.features[0] else {
        panic!("expected a cluster");
    };

    map.replace_items(Vec::new());

    assert!(map.expand_cluster(id).is_err());
}
