//! Session lifecycle events and the session terminator.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::credentials::{CredentialStore, UserSummary};

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 32;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// The user logged out explicitly.
    UserRequested,
    /// The credential could not be refreshed; the host should show its login entry point.
    SessionExpired,
}

/// Session state changes published to the hosting application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn(UserSummary),
    TokensRefreshed,
    LoggedOut { reason: LogoutReason },
}

/// Clears the credential store and tells the host the session is over.
#[derive(Debug, Clone)]
pub struct SessionTerminator {
    store: CredentialStore,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionTerminator {
    pub fn new(store: CredentialStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { store, events }
    }

    /// Receives every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Publishes an event. Having no subscribers is fine.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Ends an expired session.
    ///
    /// Idempotent: when nothing is stored this is a no-op and no event is
    /// published. Returns whether a session was actually ended.
    pub fn terminate(&self) -> bool {
        self.end_session(LogoutReason::SessionExpired)
    }

    /// Clears all credentials and publishes `LoggedOut` if anything was cleared.
    pub fn end_session(&self, reason: LogoutReason) -> bool {
        let ended = match self.store.clear() {
            Ok(cleared) => cleared,
            Err(e) => {
                // Whatever is left on disk is unusable; the host still has to log out.
                error!(error = %e, "Failed to clear credential store");
                true
            }
        };

        if ended {
            match reason {
                LogoutReason::SessionExpired => warn!("Session expired, credentials cleared"),
                LogoutReason::UserRequested => info!("Logged out"),
            }
            self.publish(SessionEvent::LoggedOut { reason });
        }
        ended
    }
}
