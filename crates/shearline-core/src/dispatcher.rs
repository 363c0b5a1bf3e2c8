//! Request dispatcher: attaches the stored access token and classifies.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::classifier::classify;
use crate::credentials::CredentialStore;
use crate::error::GatewayResult;
use crate::transport::{ApiResponse, OutboundRequest, RequestSpec, Transport};

/// Sends requests with the current bearer token.
///
/// The dispatcher never starts a refresh. It is used by the refresh
/// coordinator itself to reach the refresh endpoint, so any refresh logic
/// here would recurse.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, store: CredentialStore) -> Self {
        Self { transport, store }
    }

    /// Credential store the token is read from.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Sends one request and classifies the outcome.
    pub async fn send(&self, spec: RequestSpec) -> GatewayResult<ApiResponse> {
        let bearer = match self.store.access_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read access token, sending unauthenticated");
                None
            }
        };

        debug!(
            method = %spec.method,
            path = %spec.path,
            authenticated = bearer.is_some(),
            "Dispatching request"
        );

        let outcome = self.transport.execute(OutboundRequest { spec, bearer }).await;
        classify(outcome)
    }
}
