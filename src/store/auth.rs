use crate::backend::{AuthBackend, BackendError, OAuthProvider};
use crate::supabase::model::User;
use tokio::sync::watch;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    /// True until the stored session has been looked up once.
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

/// Cached view of the auth service's current user.
pub struct AuthStore<B> {
    backend: B,
    state: watch::Sender<AuthState>,
}

impl<B: AuthBackend> AuthStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: watch::Sender::new(AuthState::default()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    fn set_user(&self, user: Option<User>) {
        self.state.send_modify(|state| {
            state.user = user;
            state.loading = false;
        });
    }

    /// Loads the stored session. Loading ends even when the lookup fails.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        match self.backend.current_session().await {
            Ok(session) => self.set_user(session.map(|session| session.user)),
            Err(err) => {
                error!("Auth initialization error: {}", err);
                self.state.send_modify(|state| state.loading = false);
            }
        }
    }

    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, BackendError> {
        let session = self.backend.sign_in(email, password).await?;

        info!("Signed in");
        self.set_user(Some(session.user.clone()));
        Ok(session.user)
    }

    /// Creates an account. `None` means the address still has to be confirmed.
    #[instrument(skip(self, password))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Option<User>, BackendError> {
        let session = self.backend.sign_up(email, password, name).await?;

        match session {
            Some(session) => {
                info!("Signed up and signed in");
                self.set_user(Some(session.user.clone()));
                Ok(Some(session.user))
            }
            None => {
                info!("Signed up, awaiting e-mail confirmation");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        self.backend.sign_out().await?;

        info!("Signed out");
        self.set_user(None);
        Ok(())
    }

    /// Where to send the browser for Google sign-in; it comes back to `/home`.
    pub fn google_sign_in_url(&self, app_origin: &str) -> String {
        let redirect_to = format!("{}/home", app_origin.trim_end_matches('/'));
        self.backend.oauth_url(OAuthProvider::Google, &redirect_to)
    }
}
