use crate::geo::{lat_y, lng_x, x_lng, y_lat, BoundingBox, LatLng};
use crate::map::kdbush::KdIndex;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing::{debug, instrument};

const UNPROCESSED: u8 = u8::MAX;
// Cluster ids pack the origin zoom into the low 5 bits.
const ZOOM_BITS: usize = 5;
const MAX_SUPPORTED_ZOOM: u8 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOptions {
    pub min_zoom: u8,
    /// Past this zoom every point is shown on its own.
    pub max_zoom: u8,
    pub min_points: usize,
    /// Cluster radius in screen pixels.
    pub radius: f64,
    /// Tile extent the radius is measured against.
    pub extent: f64,
    pub node_size: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 18,
            min_points: 2,
            radius: 60.0,
            extent: 512.0,
            node_size: 64,
        }
    }
}

/// Opaque handle of a cluster, only meaningful for the index that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(usize);

impl Display for ClusterId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cluster-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Feature<T> {
    Cluster {
        id: ClusterId,
        center: LatLng,
        count: usize,
    },
    Leaf {
        item: T,
        position: LatLng,
    },
}

impl<T> Feature<T> {
    pub fn position(&self) -> LatLng {
        match self {
            Feature::Cluster { center, .. } => *center,
            Feature::Leaf { position, .. } => *position,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Feature::Cluster { count, .. } => *count,
            Feature::Leaf { .. } => 1,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ClusterError {
    #[error("No cluster with id {0}")]
    UnknownCluster(ClusterId),
}

#[derive(Debug, Clone, Copy)]
struct Node {
    x: f64,
    y: f64,
    /// Zoom at which this node was last visited while clustering.
    zoom: u8,
    kind: NodeKind,
    parent: Option<ClusterId>,
    num_points: usize,
}

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Point(usize),
    Cluster(ClusterId),
}

impl Node {
    fn carried_over(&self) -> Node {
        Node {
            zoom: UNPROCESSED,
            parent: None,
            ..*self
        }
    }
}

#[derive(Debug)]
struct Level {
    nodes: Vec<Node>,
    index: KdIndex,
}

impl Level {
    fn new(nodes: Vec<Node>, node_size: usize) -> Self {
        let index = KdIndex::new(nodes.iter().map(|node| (node.x, node.y)), node_size);

        Self { nodes, index }
    }
}

/// Zoom-indexed point clustering. Build once per point set, then query per viewport.
#[derive(Debug)]
pub struct ClusterIndex<T> {
    options: ClusterOptions,
    points: Vec<(LatLng, T)>,
    /// One level per zoom from `min_zoom` to `max_zoom + 1`.
    levels: Vec<Level>,
}

impl<T: Clone> ClusterIndex<T> {
    #[instrument(skip_all)]
    pub fn new(options: ClusterOptions, items: impl IntoIterator<Item = (LatLng, T)>) -> Self {
        let mut options = options;
        options.max_zoom = options.max_zoom.min(MAX_SUPPORTED_ZOOM);
        options.min_zoom = options.min_zoom.min(options.max_zoom);

        let mut skipped = 0;
        let points: Vec<(LatLng, T)> = items
            .into_iter()
            .filter(|(position, _)| {
                let valid = position.is_valid();
                if !valid {
                    skipped += 1;
                }
                valid
            })
            .collect();

        if skipped > 0 {
            debug!("Skipped {} points with invalid coordinates", skipped);
        }

        let nodes = points
            .iter()
            .enumerate()
            .map(|(i, (position, _))| Node {
                x: lng_x(position.longitude),
                y: lat_y(position.latitude),
                zoom: UNPROCESSED,
                kind: NodeKind::Point(i),
                parent: None,
                num_points: 1,
            })
            .collect();

        let mut index = Self {
            options,
            points,
            levels: Vec::new(),
        };

        let mut levels = Vec::new();
        let mut current = Level::new(nodes, index.options.node_size);

        for zoom in (index.options.min_zoom..=index.options.max_zoom).rev() {
            let next = index.cluster(&mut current, zoom);
            debug!(zoom, clusters = next.len(), "Clustered level");
            levels.push(current);
            current = Level::new(next, index.options.node_size);
        }

        levels.push(current);
        levels.reverse();
        index.levels = levels;

        index
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn cluster(&self, level: &mut Level, zoom: u8) -> Vec<Node> {
        let radius = self.options.radius / (self.options.extent * 2f64.powi(zoom as i32));
        let nodes = &mut level.nodes;
        let mut next = Vec::new();

        for i in 0..nodes.len() {
            if nodes[i].zoom <= zoom {
                continue;
            }
            nodes[i].zoom = zoom;

            let origin = nodes[i];
            let neighbors = level.index.within(origin.x, origin.y, radius);

            let num_points = origin.num_points
                + neighbors
                    .iter()
                    .filter(|&&n| nodes[n].zoom > zoom)
                    .map(|&n| nodes[n].num_points)
                    .sum::<usize>();

            if num_points > origin.num_points && num_points >= self.options.min_points {
                let id = ClusterId((i << ZOOM_BITS) + (zoom as usize + 1) + self.points.len());
                let mut wx = origin.x * origin.num_points as f64;
                let mut wy = origin.y * origin.num_points as f64;

                for &n in &neighbors {
                    let neighbor = &mut nodes[n];
                    if neighbor.zoom <= zoom {
                        continue;
                    }
                    neighbor.zoom = zoom;
                    neighbor.parent = Some(id);

                    wx += neighbor.x * neighbor.num_points as f64;
                    wy += neighbor.y * neighbor.num_points as f64;
                }

                nodes[i].parent = Some(id);
                next.push(Node {
                    x: wx / num_points as f64,
                    y: wy / num_points as f64,
                    zoom: UNPROCESSED,
                    kind: NodeKind::Cluster(id),
                    parent: None,
                    num_points,
                });
            } else {
                next.push(origin.carried_over());

                if num_points > 1 {
                    for &n in &neighbors {
                        if nodes[n].zoom <= zoom {
                            continue;
                        }
                        nodes[n].zoom = zoom;
                        next.push(nodes[n].carried_over());
                    }
                }
            }
        }

        next
    }

    fn limit_zoom(&self, zoom: f64) -> u8 {
        let upper = self.options.max_zoom as f64 + 1.0;
        let zoom = if zoom.is_nan() { 0.0 } else { zoom.floor() };

        zoom.clamp(self.options.min_zoom as f64, upper) as u8
    }

    fn level(&self, zoom: u8) -> &Level {
        &self.levels[(zoom - self.options.min_zoom) as usize]
    }

    fn feature(&self, node: &Node) -> Feature<T> {
        match node.kind {
            NodeKind::Point(i) => {
                let (position, item) = &self.points[i];
                Feature::Leaf {
                    item: item.clone(),
                    position: *position,
                }
            }
            NodeKind::Cluster(id) => Feature::Cluster {
                id,
                center: LatLng::new(y_lat(node.y), x_lng(node.x)),
                count: node.num_points,
            },
        }
    }

    /// Clusters and standalone points inside `bounds` at `zoom`.
    pub fn clusters(&self, bounds: &BoundingBox, zoom: f64) -> Vec<Feature<T>> {
        let mut min_lng = (bounds.west + 180.0).rem_euclid(360.0) - 180.0;
        let min_lat = bounds.south.clamp(-90.0, 90.0);
        let mut max_lng = if bounds.east == 180.0 {
            180.0
        } else {
            (bounds.east + 180.0).rem_euclid(360.0) - 180.0
        };
        let max_lat = bounds.north.clamp(-90.0, 90.0);

        if bounds.east - bounds.west >= 360.0 {
            min_lng = -180.0;
            max_lng = 180.0;
        } else if min_lng > max_lng {
            let eastern = BoundingBox::new(max_lat, min_lat, 180.0, min_lng);
            let western = BoundingBox::new(max_lat, min_lat, max_lng, -180.0);

            let mut features = self.clusters(&eastern, zoom);
            features.extend(self.clusters(&western, zoom));
            return features;
        }

        let level = self.level(self.limit_zoom(zoom));

        level
            .index
            .range(lng_x(min_lng), lat_y(max_lat), lng_x(max_lng), lat_y(min_lat))
            .into_iter()
            .map(|id| self.feature(&level.nodes[id]))
            .collect()
    }

    fn origin(&self, id: ClusterId) -> Result<(u8, usize), ClusterError> {
        let unknown = || ClusterError::UnknownCluster(id);
        let offset = id.0.checked_sub(self.points.len()).ok_or_else(unknown)?;
        let origin_zoom = (offset % (1 << ZOOM_BITS)) as u8;
        let origin_index = offset >> ZOOM_BITS;

        if origin_zoom <= self.options.min_zoom || origin_zoom > self.options.max_zoom + 1 {
            return Err(unknown());
        }

        let is_origin = self
            .level(origin_zoom)
            .nodes
            .get(origin_index)
            .is_some_and(|node| node.parent == Some(id));

        if is_origin {
            Ok((origin_zoom, origin_index))
        } else {
            Err(unknown())
        }
    }

    /// Direct children of a cluster, one zoom level below where it was formed.
    pub fn children(&self, id: ClusterId) -> Result<Vec<Feature<T>>, ClusterError> {
        let (origin_zoom, origin_index) = self.origin(id)?;
        let level = self.level(origin_zoom);
        let origin = &level.nodes[origin_index];
        let radius =
            self.options.radius / (self.options.extent * 2f64.powi(origin_zoom as i32 - 1));

        Ok(level
            .index
            .within(origin.x, origin.y, radius)
            .into_iter()
            .filter(|&n| level.nodes[n].parent == Some(id))
            .map(|n| self.feature(&level.nodes[n]))
            .collect())
    }

    /// Every point aggregated by a cluster, in no particular order.
    pub fn leaves(&self, id: ClusterId) -> Result<Vec<T>, ClusterError> {
        let mut leaves = Vec::new();
        let mut pending = vec![id];

        while let Some(cluster) = pending.pop() {
            for child in self.children(cluster)? {
                match child {
                    Feature::Cluster { id, .. } => pending.push(id),
                    Feature::Leaf { item, .. } => leaves.push(item),
                }
            }
        }

        Ok(leaves)
    }

    /// Lowest zoom at which the cluster breaks into more than one child.
    pub fn expansion_zoom(&self, id: ClusterId) -> Result<u8, ClusterError> {
        let (origin_zoom, _) = self.origin(id)?;
        let mut zoom = origin_zoom - 1;
        let mut current = id;

        while zoom <= self.options.max_zoom {
            let children = self.children(current)?;
            zoom += 1;

            match children.as_slice() {
                [Feature::Cluster { id, .. }] => current = *id,
                _ => break,
            }
        }

        Ok(zoom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(points: &[(f64, f64)]) -> ClusterIndex<usize> {
        ClusterIndex::new(
            ClusterOptions::default(),
            points
                .iter()
                .enumerate()
                .map(|(i, &(lat, lng))| (LatLng::new(lat, lng), i)),
        )
    }

    #[test_log::test]
    fn empty_input_should_yield_no_features() {
        let index = index(&[]);

        assert!(index.is_empty());
        assert!(index.clusters(&BoundingBox::WORLD, 3.0).is_empty());
    }

    #[test_log::test]
    fn a_single_point_should_never_cluster() {
        let index = index(&[(38.72, -9.14)]);

        for zoom in 0..=20 {
            let features = index.clusters(&BoundingBox::WORLD, zoom as f64);

            assert_eq!(features.len(), 1);
            assert!(matches!(features[0], Feature::Leaf { item: 0, .. }));
        }
    }

    #[test_log::test]
    fn identical_points_should_cluster_at_every_zoom_up_to_max() {
        let index = index(&[(38.72, -9.14); 4]);

        let features = index.clusters(&BoundingBox::WORLD, 18.0);
        assert_eq!(features.len(), 1);

        let Feature::Cluster { id, center, count } = features[0] else {
            panic!("expected a cluster, got {:?}", features[0]);
        };
        assert_eq!(count, 4);
        assert!(center.is_within(&LatLng::new(38.72, -9.14), 1e-6));
        assert_eq!(index.expansion_zoom(id), Ok(19));

        assert_eq!(index.clusters(&BoundingBox::WORLD, 19.0).len(), 4);
    }

    #[test_log::test]
    fn invalid_coordinates_should_be_skipped() {
        let index = index(&[(38.72, -9.14), (f64::NAN, 0.0), (120.0, 0.0)]);

        assert_eq!(index.len(), 1);
    }

    #[test_log::test]
    fn unknown_cluster_ids_should_be_rejected() {
        let index = index(&[(38.72, -9.14), (38.7201, -9.1401)]);

        assert_eq!(
            index.children(ClusterId(0)),
            Err(ClusterError::UnknownCluster(ClusterId(0)))
        );
        assert!(index.expansion_zoom(ClusterId(12345)).is_err());
    }

    #[test_log::test]
    fn far_apart_points_should_stay_separate() {
        let index = index(&[(38.72, -9.14), (40.71, -74.0)]);

        let features = index.clusters(&BoundingBox::WORLD, 5.0);

        assert_eq!(features.len(), 2);
        assert!(features.iter().all(|f| matches!(f, Feature::Leaf { .. })));
    }

    #[test_log::test]
    fn viewport_crossing_the_antimeridian_should_find_both_sides() {
        let index = index(&[(0.0, 179.5), (0.0, -179.5), (0.0, 0.0)]);
        let bounds = BoundingBox::new(10.0, -10.0, -170.0, 170.0);

        let mut found: Vec<usize> = index
            .clusters(&bounds, 10.0)
            .into_iter()
            .filter_map(|f| match f {
                Feature::Leaf { item, .. } => Some(item),
                Feature::Cluster { .. } => None,
            })
            .collect();
        found.sort_unstable();

        assert_eq!(found, vec![0, 1]);
    }
}
