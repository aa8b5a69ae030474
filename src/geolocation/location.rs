use crate::geo::LatLng;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// What the host reports when asked about the geolocation permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BrowserPermission {
    Granted,
    Prompt,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    #[default]
    Unrequested,
    /// Waiting for the user to allow or dismiss the location prompt.
    Prompting,
    Granted,
    Denied,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// How old a cached fix may be and still be accepted.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: false,
            timeout: Duration::from_secs(4),
            maximum_age: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub coords: LatLng,
    /// Accuracy radius in meters, when known.
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeolocationError {
    #[error("Location access denied.")]
    PermissionDenied,
    #[error("Location unavailable.")]
    PositionUnavailable,
    #[error("Location request timed out.")]
    Timeout,
    #[error("Unknown error while getting location.")]
    Unknown,
    #[error("Geolocation is not supported by this browser")]
    Unsupported,
}

impl GeolocationError {
    /// Maps a `GeolocationPositionError.code`.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => GeolocationError::PermissionDenied,
            2 => GeolocationError::PositionUnavailable,
            3 => GeolocationError::Timeout,
            _ => GeolocationError::Unknown,
        }
    }

    /// Text shown to the user; each failure kind has its own.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Browser geolocation, as seen from the client core.
#[allow(async_fn_in_trait)]
pub trait GeolocationProvider {
    fn is_supported(&self) -> bool;

    /// `None` when the permissions API itself is unavailable.
    async fn query_permission(&self) -> Option<BrowserPermission>;

    async fn current_position(&self, options: &PositionOptions)
        -> Result<Position, GeolocationError>;
}

/// Tracks the permission flow and the last successful fix.
#[derive(Debug, Clone, Default)]
pub struct LocationTracker {
    state: PermissionState,
    options: PositionOptions,
    last_fix: Option<LatLng>,
    locating: bool,
}

impl LocationTracker {
    pub fn new(options: PositionOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn state(&self) -> PermissionState {
        self.state
    }

    pub fn last_fix(&self) -> Option<LatLng> {
        self.last_fix
    }

    pub fn is_locating(&self) -> bool {
        self.locating
    }

    pub fn should_prompt(&self) -> bool {
        self.state == PermissionState::Prompting
    }

    /// First step after sign-in. Locates right away when permission was already
    /// granted, otherwise moves to `Prompting` or `Denied` and returns `None`.
    #[instrument(skip_all)]
    pub async fn check_permission<P: GeolocationProvider>(
        &mut self,
        provider: &P,
    ) -> Result<Option<LatLng>, GeolocationError> {
        if !provider.is_supported() {
            warn!("Geolocation unsupported");
            self.state = PermissionState::Unsupported;
            return Err(GeolocationError::Unsupported);
        }

        match provider.query_permission().await {
            Some(BrowserPermission::Granted) => {
                self.state = PermissionState::Granted;
                self.locate(provider).await.map(Some)
            }
            Some(BrowserPermission::Denied) => {
                self.state = PermissionState::Denied;
                Ok(None)
            }
            Some(BrowserPermission::Prompt) | None => {
                self.state = PermissionState::Prompting;
                Ok(None)
            }
        }
    }

    /// The user asked for their location, either from the prompt or after a denial.
    pub async fn request_location<P: GeolocationProvider>(
        &mut self,
        provider: &P,
    ) -> Result<LatLng, GeolocationError> {
        if !provider.is_supported() {
            self.state = PermissionState::Unsupported;
            return Err(GeolocationError::Unsupported);
        }

        self.locate(provider).await
    }

    /// Reacts to the permission `change` event. Returns true when a fix should be requested.
    pub fn on_permission_change(&mut self, permission: BrowserPermission) -> bool {
        debug!("Permission changed to {}", permission);

        self.state = match permission {
            BrowserPermission::Granted => PermissionState::Granted,
            BrowserPermission::Denied => PermissionState::Denied,
            BrowserPermission::Prompt => PermissionState::Prompting,
        };

        self.state == PermissionState::Granted
    }

    pub fn dismiss_prompt(&mut self) {
        self.state = PermissionState::Denied;
    }

    async fn locate<P: GeolocationProvider>(
        &mut self,
        provider: &P,
    ) -> Result<LatLng, GeolocationError> {
        self.locating = true;
        let result = provider.current_position(&self.options).await;
        self.locating = false;

        match result {
            Ok(position) => {
                info!("Got location fix");
                self.state = PermissionState::Granted;
                self.last_fix = Some(position.coords);
                Ok(position.coords)
            }
            Err(err) => {
                warn!("Failed to get location: {}", err);
                if err == GeolocationError::PermissionDenied {
                    self.state = PermissionState::Denied;
                } else if self.state == PermissionState::Prompting {
                    self.state = PermissionState::Unrequested;
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn browser_error_codes_should_map_to_distinct_messages() {
        let messages: Vec<String> = (1..=4)
            .map(|code| GeolocationError::from_code(code).user_message())
            .collect();

        assert_eq!(
            messages,
            vec![
                "Location access denied.",
                "Location unavailable.",
                "Location request timed out.",
                "Unknown error while getting location.",
            ]
        );
    }

    #[test_log::test]
    fn default_options_should_favor_a_fast_first_fix() {
        let options = PositionOptions::default();

        assert!(!options.high_accuracy);
        assert_eq!(options.timeout, Duration::from_secs(4));
        assert_eq!(options.maximum_age, Duration::from_secs(600));
    }

    #[test_log::test]
    fn permission_change_to_granted_should_trigger_a_fix() {
        let mut tracker = LocationTracker::default();

        assert!(!tracker.on_permission_change(BrowserPermission::Prompt));
        assert!(tracker.should_prompt());
        assert!(tracker.on_permission_change(BrowserPermission::Granted));
        assert_eq!(tracker.state(), PermissionState::Granted);
    }
}
