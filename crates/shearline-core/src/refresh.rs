//! Single-flight credential refresh with replay of queued requests.
//!
//! When a request fails with [`GatewayError::AuthenticationExpired`], the
//! caller hands it to [`RefreshCoordinator::recover`]. The coordinator is a
//! two-state machine:
//!
//! - `Idle`: no refresh in flight, queue empty.
//! - `Refreshing { queue }`: exactly one refresh call is running.
//!
//! The first caller to find the coordinator `Idle` flips it to `Refreshing`
//! and becomes the leader of the epoch; everyone arriving while it is
//! `Refreshing` is queued behind it. The check and the transition happen
//! under one mutex acquisition with no `.await` in between, so at most one
//! caller per epoch sees `Idle`.
//!
//! The epoch itself runs in a spawned task. Dropping a caller's future never
//! cancels the refresh or strands the rest of the queue. On success every
//! queued request (the leader's own first) is resent with the new token, one
//! at a time, in arrival order. On failure the session is terminated and every
//! queued request is rejected with `AuthenticationExpired`. If a logout or a
//! new login replaced the credential while the refresh call was in flight,
//! its result is discarded and the queue is rejected without touching the
//! newer session. In every case the queue is drained and the state returns
//! to `Idle` in the same critical section, so a later 401 starts a fresh
//! epoch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::credentials::StoreError;
use crate::dispatcher::Dispatcher;
use crate::error::{GatewayError, GatewayResult};
use crate::session::{SessionEvent, SessionTerminator};
use crate::transport::{ApiResponse, RequestSpec};

/// Default path of the refresh endpoint.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    token: String,
    refresh_token: String,
}

/// Why an epoch's refresh did not produce a new credential.
#[derive(Debug, Error)]
enum RefreshFailure {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("refresh endpoint failed: {0}")]
    Rejected(#[from] GatewayError),

    #[error("refresh response carried an empty token")]
    EmptyToken,

    #[error("session ended while the refresh was in flight")]
    SessionEnded,

    #[error("failed to persist refreshed credential: {0}")]
    Storage(#[from] StoreError),
}

/// A request parked until the current epoch finishes.
struct Waiter {
    request: RequestSpec,
    reply: oneshot::Sender<GatewayResult<ApiResponse>>,
}

enum RefreshState {
    Idle,
    Refreshing { queue: VecDeque<Waiter> },
}

struct Inner {
    dispatcher: Dispatcher,
    terminator: SessionTerminator,
    refresh_path: String,
    state: Mutex<RefreshState>,
    epochs: AtomicU64,
}

/// Coordinates credential refresh across concurrent callers.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        dispatcher: Dispatcher,
        terminator: SessionTerminator,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                dispatcher,
                terminator,
                refresh_path: refresh_path.into(),
                state: Mutex::new(RefreshState::Idle),
                epochs: AtomicU64::new(0),
            }),
        }
    }

    /// Path of the refresh endpoint.
    pub fn refresh_path(&self) -> &str {
        &self.inner.refresh_path
    }

    /// Whether `request` targets the refresh endpoint itself.
    pub fn is_refresh_request(&self, request: &RequestSpec) -> bool {
        request.path == self.inner.refresh_path
    }

    /// Whether an epoch is currently open.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.lock_state(), RefreshState::Refreshing { .. })
    }

    /// Number of requests waiting on the open epoch.
    pub fn queued(&self) -> usize {
        match &*self.inner.lock_state() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { queue, .. } => queue.len(),
        }
    }

    /// Number of epochs started since construction.
    pub fn epochs_started(&self) -> u64 {
        self.inner.epochs.load(Ordering::SeqCst)
    }

    /// Recovers a request that failed with `AuthenticationExpired`.
    ///
    /// Joins the open epoch or starts one, then resolves with the result of
    /// resending `request` under the refreshed credential. Resolves with
    /// `AuthenticationExpired` if the refresh fails.
    pub async fn recover(&self, request: RequestSpec) -> GatewayResult<ApiResponse> {
        let (reply, pending) = oneshot::channel();
        let path = request.path.clone();

        if let Some(epoch) = self.inner.enqueue(Waiter { request, reply }) {
            tokio::spawn(Arc::clone(&self.inner).run_epoch(epoch));
        } else {
            debug!(path = %path, "Queued behind in-flight refresh");
        }

        // A dropped sender means the epoch task died; treat it as a failed refresh.
        pending.await.unwrap_or(Err(GatewayError::AuthenticationExpired))
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parks `waiter`. Returns the new epoch number if this caller is the leader.
    fn enqueue(&self, waiter: Waiter) -> Option<u64> {
        let mut state = self.lock_state();
        match &mut *state {
            RefreshState::Refreshing { queue, .. } => {
                queue.push_back(waiter);
                None
            }
            RefreshState::Idle => {
                let epoch = self.epochs.fetch_add(1, Ordering::SeqCst) + 1;
                *state = RefreshState::Refreshing { queue: VecDeque::from([waiter]) };
                Some(epoch)
            }
        }
    }

    async fn run_epoch(self: Arc<Self>, epoch: u64) {
        info!(epoch, "Refreshing credentials");

        match self.refresh().await {
            Ok(()) => {
                info!(epoch, "Credentials refreshed");
                self.terminator.publish(SessionEvent::TokensRefreshed);
                self.replay_queue(epoch).await;
            }
            // Whoever replaced the credential already owns the session.
            Err(RefreshFailure::SessionEnded) => {
                info!(epoch, "Session replaced during refresh, dropping queued requests");
                self.reject_queue(epoch);
            }
            Err(failure) => {
                warn!(epoch, error = %failure, "Credential refresh failed");
                self.terminator.terminate();
                self.reject_queue(epoch);
            }
        }
    }

    /// Performs the single refresh call of an epoch and installs the result.
    async fn refresh(&self) -> Result<(), RefreshFailure> {
        let store = self.dispatcher.store();
        let refresh_token = store.refresh_token()?.ok_or(RefreshFailure::MissingRefreshToken)?;

        let spec = RequestSpec::post(self.refresh_path.clone())
            .json(&RefreshRequest { refresh_token: &refresh_token })?;

        // Sent straight through the dispatcher: a 401 here ends the epoch
        // instead of re-entering the coordinator.
        let tokens: RefreshResponse = self.dispatcher.send(spec).await?.json()?;
        if tokens.token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(RefreshFailure::EmptyToken);
        }

        // A logout or new login during the call replaced the refresh token we sent.
        if !store.rotate_tokens(&refresh_token, &tokens.token, &tokens.refresh_token)? {
            return Err(RefreshFailure::SessionEnded);
        }
        Ok(())
    }

    /// Resends queued requests in FIFO order until the queue is empty.
    ///
    /// Requests that fail with a stale token while replay is running land in
    /// this same queue and are picked up here.
    async fn replay_queue(&self, epoch: u64) {
        let mut replayed = 0usize;
        loop {
            let waiter = {
                let mut state = self.lock_state();
                let next = match &mut *state {
                    RefreshState::Refreshing { queue, .. } => queue.pop_front(),
                    RefreshState::Idle => None,
                };
                if next.is_none() {
                    *state = RefreshState::Idle;
                }
                next
            };
            let Some(Waiter { request, reply }) = waiter else { break };

            if reply.is_closed() {
                debug!(epoch, path = %request.path, "Caller gone, skipping replay");
                continue;
            }

            let result = self.dispatcher.send(request).await;
            let _ = reply.send(result);
            replayed += 1;
        }
        debug!(epoch, replayed, "Refresh epoch closed");
    }

    fn reject_queue(&self, epoch: u64) {
        let queue = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { queue, .. } => queue,
                RefreshState::Idle => VecDeque::new(),
            }
        };

        debug!(epoch, rejected = queue.len(), "Rejecting queued requests");
        for waiter in queue {
            let _ = waiter.reply.send(Err(GatewayError::AuthenticationExpired));
        }
    }
}
