//! crates/docdesk_core/src/session.rs
//!
//! Authentication-session lifecycle.
//!
//! `SessionManager` is the state machine
//! (`Unauthenticated -> Validating -> Authenticated`, back to
//! `Unauthenticated` on logout or any authorization failure). The async
//! operations that drive it against the repository live on `DocumentDesk`
//! further down this file.

use std::future::Future;

use tracing::{info, warn};

use crate::desk::{DeskError, DocumentDesk};
use crate::domain::{AuthGrant, Credentials, Registration, User};
use crate::ports::{PortError, PortResult};

/// Which form the authentication prompt shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

/// Public view of the session, without the credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    Validating,
    Authenticated(User),
}

#[derive(Debug)]
enum Phase {
    Unauthenticated,
    Validating { token: String },
    Authenticated { token: String, user: User },
}

#[derive(Debug)]
pub struct SessionManager {
    phase: Phase,
    prompt: Option<AuthMode>,
    /// Bumped whenever the session identity changes, so work started under
    /// an older session can tell it has been superseded.
    epoch: u64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            phase: Phase::Unauthenticated,
            prompt: None,
            epoch: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match &self.phase {
            Phase::Unauthenticated => SessionStatus::Unauthenticated,
            Phase::Validating { .. } => SessionStatus::Validating,
            Phase::Authenticated { user, .. } => SessionStatus::Authenticated(user.clone()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.phase, Phase::Authenticated { .. })
    }

    pub fn is_validating(&self) -> bool {
        matches!(self.phase, Phase::Validating { .. })
    }

    pub fn user(&self) -> Option<&User> {
        match &self.phase {
            Phase::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }

    /// The bearer token, available only once the session is authenticated.
    pub fn token(&self) -> Option<&str> {
        match &self.phase {
            Phase::Authenticated { token, .. } => Some(token),
            _ => None,
        }
    }

    /// Whether `token` is the credential of the current (or validating) session.
    pub fn holds(&self, token: &str) -> bool {
        match &self.phase {
            Phase::Validating { token: t } | Phase::Authenticated { token: t, .. } => t == token,
            Phase::Unauthenticated => false,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The prompt mode when the authentication prompt is visible.
    pub fn prompt(&self) -> Option<AuthMode> {
        self.prompt
    }

    pub fn begin_validation(&mut self, token: String) {
        self.phase = Phase::Validating { token };
        self.epoch += 1;
    }

    /// Accepts the identity returned for `token`. Ignored (returns false)
    /// when the session moved on while validation was in flight.
    pub fn complete_validation(&mut self, token: &str, user: User) -> bool {
        match &self.phase {
            Phase::Validating { token: t } if t == token => {
                self.phase = Phase::Authenticated {
                    token: token.to_string(),
                    user,
                };
                self.prompt = None;
                true
            }
            _ => false,
        }
    }

    pub fn establish(&mut self, grant: AuthGrant) {
        self.phase = Phase::Authenticated {
            token: grant.token,
            user: grant.user,
        };
        self.prompt = None;
        self.epoch += 1;
    }

    pub fn sign_out(&mut self) {
        self.phase = Phase::Unauthenticated;
        self.prompt = Some(AuthMode::Login);
        self.epoch += 1;
    }

    /// Opens the prompt when no stored credential exists.
    pub fn require_credentials(&mut self) {
        self.phase = Phase::Unauthenticated;
        self.prompt.get_or_insert(AuthMode::Login);
    }

    pub fn set_prompt_mode(&mut self, mode: AuthMode) {
        if !self.is_authenticated() {
            self.prompt = Some(mode);
        }
    }
}

//=========================================================================================
// Session operations on the desk
//=========================================================================================

impl DocumentDesk {
    /// Startup: validates a previously stored token, or asks for credentials.
    pub async fn load_persisted(&self) -> Result<(), DeskError> {
        let stored = self.tokens.load().await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not read the persisted token");
            None
        });

        match stored {
            Some(token) => self.validate(token).await,
            None => {
                info!("No persisted session, credentials required");
                self.with_state(|state| state.session.require_credentials());
                Ok(())
            }
        }
    }

    /// Checks `token` against the identity endpoint. Any failure discards it.
    pub fn validate(&self, token: String) -> impl Future<Output = Result<(), DeskError>> + Send + '_ {
        self.with_state(|state| state.session.begin_validation(token.clone()));
        self.finish_validation(token)
    }

    async fn finish_validation(&self, token: String) -> Result<(), DeskError> {
        match self.repository.validate_token(&token).await {
            Ok(user) => {
                let username = user.username.clone();
                let accepted =
                    self.with_state(|state| state.session.complete_validation(&token, user));
                if !accepted {
                    return Err(DeskError::Superseded);
                }
                info!(%username, "Persisted session validated");
                let _ = self.fetch().await;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Session validation failed");
                let still_ours = self.read_state(|state| state.session.holds(&token));
                if still_ours {
                    self.logout().await;
                }
                Err(DeskError::Port(e))
            }
        }
    }

    pub async fn login(&self, credentials: Credentials) -> Result<(), DeskError> {
        let result = self.repository.login(&credentials).await;
        self.finish_auth(result).await
    }

    pub async fn register(&self, registration: Registration) -> Result<(), DeskError> {
        let result = self.repository.register(&registration).await;
        self.finish_auth(result).await
    }

    async fn finish_auth(&self, result: PortResult<AuthGrant>) -> Result<(), DeskError> {
        match result {
            Ok(grant) => {
                if let Err(e) = self.tokens.save(&grant.token).await {
                    warn!(error = %e, "Could not persist the session token");
                }
                info!(username = %grant.user.username, "Authenticated");
                self.with_state(|state| {
                    state.session.establish(grant);
                    state.notice = None;
                });
                let _ = self.fetch().await;
                Ok(())
            }
            Err(PortError::Unauthorized) => {
                self.logout().await;
                self.notify_error("Invalid username or password");
                Err(DeskError::Port(PortError::Unauthorized))
            }
            Err(e) => {
                self.notify_error(e.user_message());
                Err(DeskError::Port(e))
            }
        }
    }

    /// Drops the session and everything that belonged to it, and reopens
    /// the prompt in login mode. The persisted token is removed by the
    /// returned future.
    pub fn logout(&self) -> impl Future<Output = ()> + Send + '_ {
        self.with_state(|state| state.reset_for_logout());
        info!("Logged out");
        async move {
            if let Err(e) = self.tokens.clear().await {
                warn!(error = %e, "Could not clear the persisted token");
            }
        }
    }

    pub fn set_auth_mode(&self, mode: AuthMode) {
        self.with_state(|state| state.session.set_prompt_mode(mode));
    }

    /// The universal 401 rule: a call made with `token` was refused, so the
    /// session it belongs to is over. A refusal for a token that is no
    /// longer in use changes nothing.
    pub(crate) async fn session_expired(&self, token: &str) {
        let current = self.read_state(|state| state.session.holds(token));
        if current {
            warn!("Repository rejected the session token, logging out");
            self.logout().await;
        }
    }
}
