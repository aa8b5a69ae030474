use crate::geo::LatLng;
use crate::map::cluster::{ClusterError, ClusterId, ClusterIndex, ClusterOptions, Feature};
use crate::map::popup::{PopupChange, PopupState, RetryPolicy};
use crate::map::viewport::{CameraMove, Frame, Viewport};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, info, instrument, warn};

/// The host map widget. Camera moves may be animated, so `viewport` can lag
/// behind the last `set_view`.
pub trait MapSurface {
    fn set_view(&mut self, camera: CameraMove);

    fn viewport(&self) -> Viewport;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    pub cluster: ClusterOptions,
    /// Highest zoom the camera may be sent to.
    pub max_camera_zoom: f64,
    pub retry: RetryPolicy,
}

impl Default for MapOptions {
    fn default() -> Self {
        let cluster = ClusterOptions::default();

        Self {
            max_camera_zoom: cluster.max_zoom as f64 + 1.0,
            cluster,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailsOutcome<T> {
    Opened(PopupChange<T>),
    /// The item is not indexed or lies outside the viewport.
    NotOnMap,
    /// The camera moved but the marker never showed up.
    GaveUp,
}

/// Owns the cluster index, the current frame and popup bookkeeping.
pub struct MapController<T> {
    options: MapOptions,
    index: ClusterIndex<T>,
    frame: Frame<T>,
    popups: PopupState<T>,
}

impl<T: Clone + Eq + Hash + Debug> MapController<T> {
    pub fn new(options: MapOptions, viewport: Viewport) -> Self {
        Self {
            index: ClusterIndex::new(options.cluster.clone(), Vec::new()),
            frame: Frame::empty(viewport),
            popups: PopupState::default(),
            options,
        }
    }

    pub fn frame(&self) -> &Frame<T> {
        &self.frame
    }

    pub fn index(&self) -> &ClusterIndex<T> {
        &self.index
    }

    pub fn popups(&self) -> &PopupState<T> {
        &self.popups
    }

    /// Rebuilds the index for a new item set and recomputes the frame.
    #[instrument(skip_all)]
    pub fn replace_items(&mut self, items: impl IntoIterator<Item = (LatLng, T)>) -> &Frame<T> {
        self.index = ClusterIndex::new(self.options.cluster.clone(), items);
        info!("Indexed {} map items", self.index.len());

        self.recompute(self.frame.viewport)
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> &Frame<T> {
        self.recompute(viewport)
    }

    fn recompute(&mut self, viewport: Viewport) -> &Frame<T> {
        self.frame = Frame::compute(&self.index, viewport);
        self.popups.sync_markers(self.frame.leaves());

        debug!(
            zoom = viewport.zoom,
            features = self.frame.features.len(),
            visible = self.frame.visible.len(),
            "Recomputed clusters"
        );

        &self.frame
    }

    /// Camera move that zooms into a clicked cluster just far enough to split it.
    pub fn expand_cluster(&self, id: ClusterId) -> Result<CameraMove, ClusterError> {
        let expansion_zoom = self.index.expansion_zoom(id)? as f64;
        let center = self
            .frame
            .features
            .iter()
            .find_map(|feature| match feature {
                Feature::Cluster {
                    id: cluster,
                    center,
                    ..
                } if *cluster == id => Some(*center),
                _ => None,
            })
            .ok_or(ClusterError::UnknownCluster(id))?;

        Ok(CameraMove {
            center,
            zoom: expansion_zoom.min(self.options.max_camera_zoom),
        })
    }

    pub fn open_popup(&mut self, item: &T) -> Option<PopupChange<T>> {
        self.popups.open(item)
    }

    pub fn close_popup(&mut self) -> Option<T> {
        self.popups.close()
    }

    /// Smallest cluster, reachable from the current frame, that still holds `item`.
    fn enclosing_cluster(&self, item: &T) -> Option<(ClusterId, LatLng)> {
        let mut found = self.frame.features.iter().find_map(|feature| match feature {
            Feature::Cluster { id, center, .. } => self
                .index
                .leaves(*id)
                .ok()
                .filter(|leaves| leaves.contains(item))
                .map(|_| (*id, *center)),
            Feature::Leaf { .. } => None,
        })?;

        while let Ok(children) = self.index.children(found.0) {
            let inner = children.iter().find_map(|child| match child {
                Feature::Cluster { id, center, .. } => self
                    .index
                    .leaves(*id)
                    .ok()
                    .filter(|leaves| leaves.contains(item))
                    .map(|_| (*id, *center)),
                Feature::Leaf { .. } => None,
            });

            match inner {
                Some(cluster) => found = cluster,
                None => break,
            }
        }

        Some(found)
    }

    /// Opens the popup for `item`, zooming into its cluster first when needed.
    #[instrument(skip(self, surface))]
    pub async fn show_details<S: MapSurface>(
        &mut self,
        surface: &mut S,
        item: &T,
    ) -> DetailsOutcome<T> {
        if let Some(change) = self.popups.open(item) {
            return DetailsOutcome::Opened(change);
        }

        let Some((cluster, center)) = self.enclosing_cluster(item) else {
            debug!("Item is not part of the current frame");
            return DetailsOutcome::NotOnMap;
        };

        let zoom = match self.index.expansion_zoom(cluster) {
            Ok(zoom) => (zoom as f64).min(self.options.max_camera_zoom),
            Err(err) => {
                warn!("Could not expand {}: {}", cluster, err);
                return DetailsOutcome::NotOnMap;
            }
        };

        debug!(zoom, "Zooming into {} to reveal item", cluster);
        surface.set_view(CameraMove { center, zoom });

        let retry = self.options.retry;
        for attempt in 1..=retry.attempts {
            tokio::time::sleep(retry.delay).await;

            let viewport = surface.viewport();
            if viewport != self.frame.viewport {
                self.recompute(viewport);
            }

            if let Some(change) = self.popups.open(item) {
                debug!(attempt, "Marker found");
                return DetailsOutcome::Opened(change);
            }
        }

        debug!("Marker did not appear after {} attempts", retry.attempts);
        DetailsOutcome::GaveUp
    }
}
