//! Shearline core: the authenticated request gateway.
//!
//! Every backend call from the booking client goes through [`Gateway`]. It
//! attaches the stored bearer token, classifies failures into
//! [`GatewayError`] kinds, and recovers from expired tokens. However many
//! requests fail at once, exactly one call is made to the refresh endpoint,
//! and every affected request is then replayed with the new token.
//!
//! # Example
//!
//! ```no_run
//! use shearline_core::{Gateway, GatewayConfig};
//!
//! # async fn run() -> shearline_core::Result<()> {
//! let gateway = Gateway::from_config(&GatewayConfig::discover_and_load()?)?;
//! gateway.login("ada@example.com", "hunter2").await?;
//!
//! let upcoming: serde_json::Value = gateway.appointments().list(&[("status", "upcoming")]).await?;
//! println!("{upcoming}");
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod clients;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod refresh;
pub mod session;
pub mod transport;

pub use clients::ResourceClient;
pub use config::{ConfigError, GatewayConfig};
pub use credentials::{Credential, CredentialStore, StoreError, UserRole, UserSummary};
pub use dispatcher::Dispatcher;
pub use error::{GatewayError, GatewayResult, Result, ShearlineError};
pub use gateway::{Gateway, LoginRequest, RegisterRequest};
pub use refresh::{RefreshCoordinator, DEFAULT_REFRESH_PATH};
pub use reqwest::Method;
pub use session::{LogoutReason, SessionEvent, SessionTerminator};
pub use transport::{ApiResponse, HttpTransport, OutboundRequest, RawOutcome, RequestSpec, Transport};
