//! The authenticated request gateway.
//!
//! [`Gateway`] wires the credential store, dispatcher, refresh coordinator
//! and session terminator together and is the only entry point hosts and
//! domain clients use.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::clients::ResourceClient;
use crate::config::GatewayConfig;
use crate::credentials::{Credential, CredentialStore, UserRole, UserSummary};
use crate::dispatcher::Dispatcher;
use crate::error::{GatewayError, GatewayResult, Result};
use crate::refresh::RefreshCoordinator;
use crate::session::{LogoutReason, SessionEvent, SessionTerminator};
use crate::transport::{ApiResponse, HttpTransport, RequestSpec, Transport};

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const LOGOUT_PATH: &str = "/auth/logout";

/// Credentials submitted to `/auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Account details submitted to `/auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

/// Body returned by login and register.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    token: String,
    refresh_token: String,
    user: Option<UserSummary>,
}

/// Authenticated HTTP gateway.
///
/// Cheap to clone; clones share credentials and refresh state.
#[derive(Clone)]
pub struct Gateway {
    dispatcher: Dispatcher,
    coordinator: RefreshCoordinator,
    terminator: SessionTerminator,
}

impl Gateway {
    /// Builds a gateway over any transport and credential store.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: CredentialStore,
        refresh_path: impl Into<String>,
    ) -> Self {
        let dispatcher = Dispatcher::new(transport, store.clone());
        let terminator = SessionTerminator::new(store);
        let coordinator =
            RefreshCoordinator::new(dispatcher.clone(), terminator.clone(), refresh_path);
        Self { dispatcher, coordinator, terminator }
    }

    /// Builds an HTTP gateway with a file-backed credential store.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::from_config(config)?;
        let store = match &config.credentials_path {
            Some(path) => CredentialStore::file(path),
            None => CredentialStore::file_default()?,
        };
        Ok(Self::new(Arc::new(transport), store, config.refresh_path.clone()))
    }

    /// Credential store backing this gateway.
    pub fn store(&self) -> &CredentialStore {
        self.dispatcher.store()
    }

    /// Refresh coordinator backing this gateway.
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Session events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.terminator.subscribe()
    }

    /// True when an access token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.store().is_authenticated()
    }

    /// Cached user summary of the current session.
    pub fn current_user(&self) -> Result<Option<UserSummary>> {
        Ok(self.store().user()?)
    }

    /// Sends a request, transparently refreshing an expired credential.
    ///
    /// A 401 from a regular endpoint joins (or starts) a refresh epoch and
    /// resolves with the replayed result. A 401 from the refresh endpoint
    /// itself ends the session. Every other error is returned unchanged.
    pub async fn send(&self, request: RequestSpec) -> GatewayResult<ApiResponse> {
        match self.dispatcher.send(request.clone()).await {
            Err(GatewayError::AuthenticationExpired)
                if self.coordinator.is_refresh_request(&request) =>
            {
                warn!(path = %request.path, "Refresh endpoint rejected the refresh token");
                self.terminator.terminate();
                Err(GatewayError::AuthenticationExpired)
            }
            Err(GatewayError::AuthenticationExpired) => {
                debug!(method = %request.method, path = %request.path, "Access token expired");
                self.coordinator.recover(request).await
            }
            other => other,
        }
    }

    /// Sends a request and decodes the JSON response.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestSpec) -> GatewayResult<T> {
        self.send(request).await?.json()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        self.send_json(RequestSpec::get(path)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(RequestSpec::post(path).json(body)?).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(RequestSpec::put(path).json(body)?).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(RequestSpec::patch(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> GatewayResult<ApiResponse> {
        self.send(RequestSpec::delete(path)).await
    }

    /// Signs in and stores the returned credential.
    ///
    /// Goes through the dispatcher only: a 401 here means bad credentials,
    /// not an expired token.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserSummary> {
        let body = LoginRequest { email: email.to_string(), password: password.to_string() };
        let spec = RequestSpec::new(Method::POST, LOGIN_PATH).json(&body)?;
        self.establish(spec, email).await
    }

    /// Creates an account and signs in with it.
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserSummary> {
        let spec = RequestSpec::new(Method::POST, REGISTER_PATH).json(request)?;
        self.establish(spec, &request.email).await
    }

    async fn establish(&self, spec: RequestSpec, email: &str) -> Result<UserSummary> {
        let auth: AuthResponse = self.dispatcher.send(spec).await?.json()?;
        let user = auth.user.unwrap_or_else(|| UserSummary {
            id: String::new(),
            name: String::new(),
            email: email.to_string(),
            role: UserRole::default(),
        });

        self.store().save(&Credential {
            access_token: auth.token,
            refresh_token: auth.refresh_token,
            user: Some(user.clone()),
        })?;

        info!(user_id = %user.id, role = ?user.role, "Logged in");
        self.terminator.publish(SessionEvent::LoggedIn(user.clone()));
        Ok(user)
    }

    /// Logs out: tells the backend (best effort) and clears local credentials.
    ///
    /// Returns whether a session was active.
    pub async fn logout(&self) -> bool {
        if self.is_authenticated() {
            if let Err(e) = self.dispatcher.send(RequestSpec::post(LOGOUT_PATH)).await {
                debug!(error = %e, "Backend logout failed, clearing local session anyway");
            }
        }
        self.terminator.end_session(LogoutReason::UserRequested)
    }

    /// Client for an arbitrary resource collection.
    pub fn resource(&self, base_path: &str) -> ResourceClient {
        ResourceClient::new(self.clone(), base_path)
    }

    pub fn appointments(&self) -> ResourceClient {
        self.resource("/appointments")
    }

    pub fn barbers(&self) -> ResourceClient {
        self.resource("/barbers")
    }

    pub fn services(&self) -> ResourceClient {
        self.resource("/services")
    }
}
