use crate::geo::{BoundingBox, LatLng};
use crate::map::cluster::{ClusterIndex, Feature};
use itertools::Itertools;
use std::hash::Hash;
use tracing::warn;

pub const DEFAULT_MAP_CENTER: LatLng = LatLng {
    latitude: 40.7128,
    longitude: -74.0060,
};
pub const DEFAULT_MAP_ZOOM: f64 = 13.0;

/// Visible area of the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bounds: BoundingBox,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(bounds: BoundingBox, zoom: f64) -> Self {
        Self { bounds, zoom }
    }

    pub fn around(center: LatLng, zoom: f64, width: f64, height: f64) -> Self {
        Self::new(BoundingBox::around(center, zoom, width, height), zoom)
    }

    /// Integer zoom the cluster index is queried with.
    pub fn cluster_zoom(&self) -> f64 {
        self.zoom.round()
    }
}

/// Camera change the host map widget should animate to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMove {
    pub center: LatLng,
    pub zoom: f64,
}

/// Result of one cluster recomputation: what the map draws and what the side list shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<T> {
    pub viewport: Viewport,
    pub features: Vec<Feature<T>>,
    /// Every item represented on screen, clusters expanded, without duplicates.
    pub visible: Vec<T>,
}

impl<T: Clone + Eq + Hash> Frame<T> {
    pub fn empty(viewport: Viewport) -> Self {
        Self {
            viewport,
            features: Vec::new(),
            visible: Vec::new(),
        }
    }

    pub fn compute(index: &ClusterIndex<T>, viewport: Viewport) -> Self {
        let features = index.clusters(&viewport.bounds, viewport.cluster_zoom());
        let visible = flatten_visible(index, &features);

        Self {
            viewport,
            features,
            visible,
        }
    }

    pub fn has_leaf(&self, item: &T) -> bool {
        self.features
            .iter()
            .any(|feature| matches!(feature, Feature::Leaf { item: leaf, .. } if leaf == item))
    }

    pub fn leaves(&self) -> impl Iterator<Item = &T> {
        self.features.iter().filter_map(|feature| match feature {
            Feature::Leaf { item, .. } => Some(item),
            Feature::Cluster { .. } => None,
        })
    }
}

/// Expands clusters into their members and drops repeats, keeping first-seen order.
pub fn flatten_visible<T: Clone + Eq + Hash>(
    index: &ClusterIndex<T>,
    features: &[Feature<T>],
) -> Vec<T> {
    features
        .iter()
        .flat_map(|feature| match feature {
            Feature::Leaf { item, .. } => vec![item.clone()],
            Feature::Cluster { id, .. } => index.leaves(*id).unwrap_or_else(|err| {
                warn!("Could not expand {}: {}", id, err);
                Vec::new()
            }),
        })
        .unique()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::cluster::ClusterOptions;

    #[test_log::test]
    fn frame_should_list_every_clustered_point_once() {
        let points = [(38.72, -9.14), (38.7201, -9.1401), (38.7202, -9.1399), (41.15, -8.61)];
        let index = ClusterIndex::new(
            ClusterOptions::default(),
            points
                .iter()
                .enumerate()
                .map(|(i, &(lat, lng))| (LatLng::new(lat, lng), i)),
        );

        let frame = Frame::compute(&index, Viewport::new(BoundingBox::WORLD, 6.0));

        let mut visible = frame.visible.clone();
        visible.sort_unstable();
        assert_eq!(visible, vec![0, 1, 2, 3]);
        assert!(frame.has_leaf(&3));
        assert!(!frame.has_leaf(&0));
    }

    #[test_log::test]
    fn fractional_zoom_should_round_for_clustering() {
        let viewport = Viewport::new(BoundingBox::WORLD, 12.6);

        assert_eq!(viewport.cluster_zoom(), 13.0);
    }
}
