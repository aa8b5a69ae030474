use crate::geo::LatLng;
use crate::map::viewport::CameraMove;
use tracing::debug;

/// Fixes closer than this to the last applied one are treated as jitter.
pub const RECENTER_EPSILON: f64 = 1e-5;
pub const RECENTER_MIN_ZOOM: f64 = 14.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RecenterBehavior {
    /// Center on the first fix, then leave the camera to the user.
    #[default]
    Once,
    Follow,
}

/// Decides when a location fix should move the map camera.
#[derive(Debug, Clone)]
pub struct Recenter {
    behavior: RecenterBehavior,
    min_zoom: f64,
    did_center: bool,
    last_fix: Option<LatLng>,
}

impl Recenter {
    pub fn new(behavior: RecenterBehavior) -> Self {
        Self {
            behavior,
            min_zoom: RECENTER_MIN_ZOOM,
            did_center: false,
            last_fix: None,
        }
    }

    pub fn with_min_zoom(mut self, min_zoom: f64) -> Self {
        self.min_zoom = min_zoom;
        self
    }

    pub fn has_centered(&self) -> bool {
        self.did_center
    }

    pub fn apply(&mut self, fix: LatLng, current_zoom: f64) -> Option<CameraMove> {
        if self
            .last_fix
            .is_some_and(|last| last.is_within(&fix, RECENTER_EPSILON))
        {
            debug!("Ignoring jitter fix");
            return None;
        }

        if self.behavior == RecenterBehavior::Once && self.did_center {
            return None;
        }

        self.last_fix = Some(fix);
        self.did_center = true;

        Some(CameraMove {
            center: fix,
            zoom: current_zoom.max(self.min_zoom),
        })
    }
}
