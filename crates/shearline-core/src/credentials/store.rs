//! Typed credential store over a key-value backend.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::backend::{CredentialBackend, FileBackend, MemoryBackend, WriteBatch};
use super::error::{StoreError, StoreResult};

/// Entry holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "token";
/// Entry holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Entry holding the cached user summary (JSON).
pub const USER_KEY: &str = "user";

const ALL_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Role of the signed-in account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Customer,
    Barber,
    Admin,
    /// Any role this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Customer => "customer",
            Self::Barber => "barber",
            Self::Admin => "admin",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Cached identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
}

/// Access token, refresh token, and cached user.
#[derive(Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Option<UserSummary>,
}

// Tokens never show up in logs or panic messages.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &format_args!("<{} chars>", self.access_token.len()))
            .field("refresh_token", &format_args!("<{} chars>", self.refresh_token.len()))
            .field("user", &self.user)
            .finish()
    }
}

/// Persisted holder of the session credential.
///
/// Cheap to clone; clones share the same backend.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn CredentialBackend>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Wraps an arbitrary backend.
    pub fn new(backend: Arc<dyn CredentialBackend>) -> Self {
        Self { backend }
    }

    /// Store persisted at `~/.shearline/credentials.json`.
    pub fn file_default() -> StoreResult<Self> {
        Ok(Self::new(Arc::new(FileBackend::new()?)))
    }

    /// Store persisted at a custom path.
    pub fn file(path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(Arc::new(FileBackend::with_path(path.into())))
    }

    /// Non-persistent store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    fn non_empty(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.backend.get(key)?.filter(|value| !value.is_empty()))
    }

    /// Current access token, if logged in.
    pub fn access_token(&self) -> StoreResult<Option<String>> {
        self.non_empty(ACCESS_TOKEN_KEY)
    }

    /// Current refresh token, if any.
    pub fn refresh_token(&self) -> StoreResult<Option<String>> {
        self.non_empty(REFRESH_TOKEN_KEY)
    }

    /// Cached user summary. A corrupt entry reads as absent.
    pub fn user(&self) -> StoreResult<Option<UserSummary>> {
        let Some(raw) = self.non_empty(USER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cached user");
                Ok(None)
            }
        }
    }

    /// Full credential, if an access token is present.
    pub fn credential(&self) -> StoreResult<Option<Credential>> {
        let Some(access_token) = self.access_token()? else {
            return Ok(None);
        };
        Ok(Some(Credential {
            access_token,
            refresh_token: self.refresh_token()?.unwrap_or_default(),
            user: self.user()?,
        }))
    }

    /// True when a non-empty access token is stored. Storage errors read as false.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.access_token(), Ok(Some(_)))
    }

    /// Installs a fresh credential after login.
    pub fn save(&self, credential: &Credential) -> StoreResult<()> {
        if credential.access_token.is_empty() {
            return Err(StoreError::InvalidFormat("access token is empty".to_string()));
        }

        let user = credential.user.as_ref().map(serde_json::to_string).transpose()?;
        let batch = WriteBatch::new()
            .put(ACCESS_TOKEN_KEY, credential.access_token.as_str())
            .put(REFRESH_TOKEN_KEY, credential.refresh_token.as_str());
        let batch = match user {
            Some(user) => batch.put(USER_KEY, user),
            None => batch.remove(USER_KEY),
        };
        self.backend.write(&batch)?;
        Ok(())
    }

    /// Replaces both tokens in one write, keeping the cached user.
    ///
    /// The write only happens while the stored refresh token is still
    /// `current_refresh`. Returns `false`, leaving the store untouched, when
    /// the session was ended or replaced in the meantime.
    pub fn rotate_tokens(
        &self,
        current_refresh: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> StoreResult<bool> {
        if access_token.is_empty() {
            return Err(StoreError::InvalidFormat("access token is empty".to_string()));
        }
        self.backend.write(
            &WriteBatch::new()
                .expect(REFRESH_TOKEN_KEY, current_refresh)
                .put(ACCESS_TOKEN_KEY, access_token)
                .put(REFRESH_TOKEN_KEY, refresh_token),
        )
    }

    /// Removes all three entries. Returns whether anything was stored.
    ///
    /// Of several concurrent clears, only one sees `true`.
    pub fn clear(&self) -> StoreResult<bool> {
        self.backend.remove(&ALL_KEYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_user() -> UserSummary {
        UserSummary {
            id: "u-1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role: UserRole::Customer,
        }
    }

    fn sample_credential() -> Credential {
        Credential {
            access_token: "T1".to_string(),
            refresh_token: "R1".to_string(),
            user: Some(sample_user()),
        }
    }

    #[test]
    fn test_empty_store_is_logged_out() {
        let store = CredentialStore::in_memory();
        assert!(!store.is_authenticated());
        assert_eq!(store.credential().unwrap(), None);
        assert_eq!(store.user().unwrap(), None);
    }

    #[test]
    fn test_save_and_read_back() {
        let store = CredentialStore::in_memory();
        store.save(&sample_credential()).unwrap();

        assert!(store.is_authenticated());
        assert_eq!(store.access_token().unwrap().as_deref(), Some("T1"));
        assert_eq!(store.refresh_token().unwrap().as_deref(), Some("R1"));
        assert_eq!(store.user().unwrap(), Some(sample_user()));
    }

    #[test]
    fn test_save_rejects_empty_access_token() {
        let store = CredentialStore::in_memory();
        let credential = Credential { access_token: String::new(), ..sample_credential() };
        assert!(matches!(store.save(&credential), Err(StoreError::InvalidFormat(_))));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_empty_token_entry_is_not_authenticated() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put(&[(ACCESS_TOKEN_KEY, String::new())]).unwrap();
        let store = CredentialStore::new(backend);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_rotate_tokens_keeps_user() {
        let store = CredentialStore::in_memory();
        store.save(&sample_credential()).unwrap();

        assert!(store.rotate_tokens("R1", "T2", "R2").unwrap());

        let credential = store.credential().unwrap().unwrap();
        assert_eq!(credential.access_token, "T2");
        assert_eq!(credential.refresh_token, "R2");
        assert_eq!(credential.user, Some(sample_user()));
    }

    #[test]
    fn test_rotate_tokens_after_clear_is_skipped() {
        let store = CredentialStore::in_memory();
        store.save(&sample_credential()).unwrap();
        store.clear().unwrap();

        assert!(!store.rotate_tokens("R1", "T2", "R2").unwrap());
        assert!(!store.is_authenticated());
        assert_eq!(store.refresh_token().unwrap(), None);
    }

    #[test]
    fn test_rotate_tokens_after_new_login_is_skipped() {
        let store = CredentialStore::in_memory();
        store.save(&sample_credential()).unwrap();
        store
            .save(&Credential {
                access_token: "T9".to_string(),
                refresh_token: "R9".to_string(),
                user: None,
            })
            .unwrap();

        assert!(!store.rotate_tokens("R1", "T2", "R2").unwrap());
        assert_eq!(store.access_token().unwrap().as_deref(), Some("T9"));
    }

    #[test]
    fn test_save_without_user_drops_cached_user() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::file(temp_dir.path().join("credentials.json"));
        store.save(&sample_credential()).unwrap();

        store.save(&Credential { user: None, ..sample_credential() }).unwrap();

        assert!(store.is_authenticated());
        assert_eq!(store.user().unwrap(), None);
    }

    #[test]
    fn test_clear_and_save_recover_from_unreadable_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");
        std::fs::write(&path, "{garbage").unwrap();
        let store = CredentialStore::file(&path);

        assert!(store.clear().unwrap());
        store.save(&sample_credential()).unwrap();

        assert!(store.is_authenticated());
        assert_eq!(store.user().unwrap(), Some(sample_user()));
    }

    #[test]
    fn test_clear_reports_whether_anything_was_stored() {
        let store = CredentialStore::in_memory();
        store.save(&sample_credential()).unwrap();

        assert!(store.clear().unwrap());
        assert!(!store.is_authenticated());
        assert_eq!(store.user().unwrap(), None);
        assert!(!store.clear().unwrap());
    }

    #[test]
    fn test_corrupt_user_reads_as_absent() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put(&[(USER_KEY, "not json".to_string())]).unwrap();
        let store = CredentialStore::new(backend);
        assert_eq!(store.user().unwrap(), None);
    }

    #[test]
    fn test_user_accepts_mongo_id_and_unknown_role() {
        let user: UserSummary =
            serde_json::from_str(r#"{"_id":"abc","name":"Bo","email":"bo@x.io","role":"owner"}"#)
                .unwrap();
        assert_eq!(user.id, "abc");
        assert_eq!(user.role, UserRole::Unknown);
    }

    #[test]
    fn test_file_store_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");

        CredentialStore::file(&path).save(&sample_credential()).unwrap();

        let reopened = CredentialStore::file(&path);
        assert!(reopened.is_authenticated());
        assert_eq!(reopened.user().unwrap(), Some(sample_user()));
    }

    #[test]
    fn test_credential_debug_hides_tokens() {
        let rendered = format!("{:?}", sample_credential());
        assert!(!rendered.contains("T1"));
        assert!(!rendered.contains("R1"));
        assert!(rendered.contains("<2 chars>"));
    }
}
