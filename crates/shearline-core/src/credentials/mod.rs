//! Credential storage.
//!
//! The session credential (access token, refresh token, cached user) lives
//! in three named entries of a [`CredentialBackend`]:
//!
//! - `token`: the bearer access token
//! - `refreshToken`: the token sent to `/auth/refresh`
//! - `user`: the cached [`UserSummary`] as JSON
//!
//! [`FileBackend`] persists them to `~/.shearline/credentials.json` (0600) so
//! a session survives restarts. [`MemoryBackend`] is for tests and
//! short-lived hosts.
//!
//! # Example
//!
//! ```no_run
//! use shearline_core::credentials::{Credential, CredentialStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CredentialStore::file_default()?;
//! store.save(&Credential {
//!     access_token: "T1".to_string(),
//!     refresh_token: "R1".to_string(),
//!     user: None,
//! })?;
//! assert!(store.is_authenticated());
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod store;

pub use backend::{CredentialBackend, FileBackend, MemoryBackend, WriteBatch};
pub use error::{StoreError, StoreResult};
pub use store::{
    Credential, CredentialStore, UserRole, UserSummary, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
    USER_KEY,
};
