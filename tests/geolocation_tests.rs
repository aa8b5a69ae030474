use bonfire::geo::LatLng;
use bonfire::geolocation::location::{
    BrowserPermission, GeolocationError, GeolocationProvider, LocationTracker, PermissionState,
    Position, PositionOptions,
};
use bonfire::geolocation::recenter::{Recenter, RecenterBehavior};
use std::collections::VecDeque;
use std::sync::Mutex;

struct FakeBrowser {
    supported: bool,
    permission: Option<BrowserPermission>,
    fixes: Mutex<VecDeque<Result<LatLng, GeolocationError>>>,
    requested_with: Mutex<Vec<PositionOptions>>,
}

impl FakeBrowser {
    fn new(
        permission: Option<BrowserPermission>,
        fixes: impl IntoIterator<Item = Result<LatLng, GeolocationError>>,
    ) -> Self {
        Self {
            supported: true,
            permission,
            fixes: Mutex::new(fixes.into_iter().collect()),
            requested_with: Mutex::new(Vec::new()),
        }
    }
}

impl GeolocationProvider for FakeBrowser {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn query_permission(&self) -> Option<BrowserPermission> {
        self.permission
    }

    async fn current_position(&self, options: &PositionOptions) -> Result<Position, GeolocationError> {
        self.requested_with.lock().unwrap().push(*options);

        self.fixes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GeolocationError::PositionUnavailable))
            .map(|coords| Position {
                coords,
                accuracy: Some(25.0),
            })
    }
}

#[test_log::test(tokio::test)]
async fn granted_permission_should_locate_and_recenter_once() {
    let lisbon = LatLng::new(38.72, -9.14);
    let browser = FakeBrowser::new(
        Some(BrowserPermission::Granted),
        [Ok(lisbon), Ok(LatLng::new(38.80, -9.20))],
    );
    let mut tracker = LocationTracker::new(PositionOptions::default());
    let mut recenter = Recenter::new(RecenterBehavior::Once);

    let fix = tracker.check_permission(&browser).await.unwrap();

    assert_eq!(fix, Some(lisbon));
    assert_eq!(tracker.state(), PermissionState::Granted);
    assert_eq!(tracker.last_fix(), Some(lisbon));
    assert!(!tracker.is_locating());
    assert_eq!(
        browser.requested_with.lock().unwrap().as_slice(),
        &[PositionOptions::default()]
    );

    let camera = recenter.apply(lisbon, 13.0).unwrap();
    assert_eq!(camera.center, lisbon);
    assert_eq!(camera.zoom, 14.0);

    let second = tracker.request_location(&browser).await.unwrap();
    assert!(recenter.apply(second, 14.0).is_none());
}

#[test_log::test(tokio::test)]
async fn prompt_should_wait_for_the_user() {
    let lisbon = LatLng::new(38.72, -9.14);
    let browser = FakeBrowser::new(Some(BrowserPermission::Prompt), [Ok(lisbon)]);
    let mut tracker = LocationTracker::default();

    assert_eq!(tracker.state(), PermissionState::Unrequested);
    assert_eq!(tracker.check_permission(&browser).await, Ok(None));
    assert!(tracker.should_prompt());
    assert!(browser.requested_with.lock().unwrap().is_empty());

    assert_eq!(tracker.request_location(&browser).await, Ok(lisbon));
    assert_eq!(tracker.state(), PermissionState::Granted);
}

#[test_log::test(tokio::test)]
async fn each_failure_should_keep_its_own_message() {
    let browser = FakeBrowser::new(
        Some(BrowserPermission::Prompt),
        [
            Err(GeolocationError::Timeout),
            Err(GeolocationError::PositionUnavailable),
            Err(GeolocationError::PermissionDenied),
        ],
    );
    let mut tracker = LocationTracker::default();
    tracker.check_permission(&browser).await.unwrap();

    let timeout = tracker.request_location(&browser).await.unwrap_err();
    assert_eq!(timeout.user_message(), "Location request timed out.");
    assert_ne!(tracker.state(), PermissionState::Denied);

    let unavailable = tracker.request_location(&browser).await.unwrap_err();
    assert_eq!(unavailable.user_message(), "Location unavailable.");

    let denied = tracker.request_location(&browser).await.unwrap_err();
    assert_eq!(denied.user_message(), "Location access denied.");
    assert_eq!(tracker.state(), PermissionState::Denied);
    assert_eq!(tracker.last_fix(), None);
}

#[test_log::test(tokio::test)]
async fn denied_permission_should_not_locate() {
    let browser = FakeBrowser::new(Some(BrowserPermission::Denied), []);
    let mut tracker = LocationTracker::default();

    assert_eq!(tracker.check_permission(&browser).await, Ok(None));
    assert_eq!(tracker.state(), PermissionState::Denied);

    assert!(tracker.on_permission_change(BrowserPermission::Granted));
    assert_eq!(tracker.state(), PermissionState::Granted);
}

#[test_log::test(tokio::test)]
async fn unsupported_browser_should_be_reported() {
    let browser = FakeBrowser {
        supported: false,
        ..FakeBrowser::new(None, [])
    };
    let mut tracker = LocationTracker::default();

    assert_eq!(
        tracker.check_permission(&browser).await,
        Err(GeolocationError::Unsupported)
    );
    assert_eq!(tracker.state(), PermissionState::Unsupported);
}
