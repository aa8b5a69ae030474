use crate::routes::Route;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationRequest {
    Push(Route),
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardState {
    #[default]
    Clean,
    Dirty,
    /// Navigation was attempted with unsaved changes; waiting for the user.
    ConfirmingExit(NavigationRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Proceed(NavigationRequest),
    /// Show the "discard changes?" dialog.
    Hold,
}

/// Holds back navigation away from a form with unsaved changes.
#[derive(Debug, Clone, Default)]
pub struct NavigationGuard {
    state: GuardState,
}

impl NavigationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state != GuardState::Clean
    }

    pub fn mark_dirty(&mut self) {
        if self.state == GuardState::Clean {
            self.state = GuardState::Dirty;
        }
    }

    /// The form was submitted or reset.
    pub fn mark_saved(&mut self) {
        self.state = GuardState::Clean;
    }

    pub fn request(&mut self, request: NavigationRequest) -> NavigationDecision {
        match self.state {
            GuardState::Clean => NavigationDecision::Proceed(request),
            GuardState::Dirty | GuardState::ConfirmingExit(_) => {
                debug!("Holding {:?} for unsaved changes", request);
                self.state = GuardState::ConfirmingExit(request);
                NavigationDecision::Hold
            }
        }
    }

    /// Discards the changes and releases the held navigation.
    pub fn confirm_exit(&mut self) -> Option<NavigationRequest> {
        match self.state {
            GuardState::ConfirmingExit(request) => {
                self.state = GuardState::Clean;
                Some(request)
            }
            _ => None,
        }
    }

    /// Stays on the form, changes intact.
    pub fn cancel_exit(&mut self) {
        if let GuardState::ConfirmingExit(_) = self.state {
            self.state = GuardState::Dirty;
        }
    }
}
