//! Session guard: the single place that reacts to the server rejecting
//! the session.
//!
//! The guard is built once inside `ApiClient` and every dispatched request
//! passes its outcome through `SessionGuard::observe`. When the response
//! status is in the configured invalidating set, the persisted session is
//! purged and the injected `SessionExpiredHandler` runs. The original error
//! is always handed back to the caller.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::ApiError;
use crate::auth::Session;

/// Statuses that invalidate the session unless configured otherwise
pub const DEFAULT_INVALIDATING_STATUSES: [u16; 2] = [400, 401];

/// Which response statuses mean "the session is no longer valid"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    invalidating: BTreeSet<u16>,
}

impl SessionPolicy {
    pub fn new(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            invalidating: statuses.into_iter().collect(),
        }
    }

    /// Only 401 invalidates; 400 is left to the caller
    pub fn unauthorized_only() -> Self {
        Self::new([401])
    }

    pub fn invalidates(&self, status: u16) -> bool {
        self.invalidating.contains(&status)
    }

    pub fn statuses(&self) -> impl Iterator<Item = u16> + '_ {
        self.invalidating.iter().copied()
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_INVALIDATING_STATUSES)
    }
}

/// Screens the navigation layer can route to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Chat { chat_id: String },
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Login => write!(f, "login"),
            Route::Chat { chat_id } => write!(f, "chat/{}", chat_id),
        }
    }
}

/// Navigation layer supplied by the front-end
pub trait Navigator: Send + Sync {
    fn push(&self, route: Route);

    /// Replace the current stack so the user cannot navigate back
    fn replace(&self, route: Route);
}

/// Reaction to the server rejecting the session
pub trait SessionExpiredHandler: Send + Sync {
    fn session_expired(&self, status: u16);
}

/// Sends the user to the login screen with a replace-style navigation
pub struct RedirectToLogin {
    navigator: Arc<dyn Navigator>,
}

impl RedirectToLogin {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self { navigator }
    }
}

impl SessionExpiredHandler for RedirectToLogin {
    fn session_expired(&self, status: u16) {
        debug!(status, "Redirecting to login");
        self.navigator.replace(Route::Login);
    }
}

pub struct SessionGuard {
    session: Session,
    policy: SessionPolicy,
    handler: Arc<dyn SessionExpiredHandler>,
}

impl SessionGuard {
    pub fn new(
        session: Session,
        policy: SessionPolicy,
        handler: Arc<dyn SessionExpiredHandler>,
    ) -> Self {
        Self {
            session,
            policy,
            handler,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Observe a request outcome. Successes pass through untouched; errors
    /// are returned unchanged after any session teardown.
    pub async fn observe<T>(&self, outcome: Result<T, ApiError>) -> Result<T, ApiError> {
        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match err.status() {
            Some(status) if self.policy.invalidates(status) => {
                warn!(status, "Server rejected the session, signing out");
                if let Err(e) = self.session.clear().await {
                    warn!(error = %e, "Session purge incomplete");
                }
                self.handler.session_expired(status);
            }
            Some(status) => debug!(status, "Request failed"),
            None => debug!(error = %err, "Request failed without a response"),
        }

        Err(err)
    }
}
