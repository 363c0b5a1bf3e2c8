//! Persistence backends for the credential store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::{StoreError, StoreResult};

/// Current version of the credentials file format.
const CREDENTIALS_VERSION: &str = "1.0";

/// Key-value persistence used by [`CredentialStore`](super::CredentialStore).
///
/// `write` and `remove` must apply all of their entries in one step: a reader
/// never observes half of a multi-key update.
pub trait CredentialBackend: Send + Sync {
    /// Reads a single entry.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Applies `batch` atomically.
    ///
    /// Returns `false`, leaving every entry untouched, when one of the
    /// batch's expectations does not hold.
    fn write(&self, batch: &WriteBatch<'_>) -> StoreResult<bool>;

    /// Removes all listed entries atomically. Missing keys are ignored.
    ///
    /// Returns whether any of the keys was present.
    fn remove(&self, keys: &[&str]) -> StoreResult<bool>;

    /// Writes all entries atomically, overwriting existing values.
    fn put(&self, entries: &[(&str, String)]) -> StoreResult<()> {
        let batch = entries
            .iter()
            .fold(WriteBatch::new(), |batch, (key, value)| batch.put(*key, value.clone()));
        self.write(&batch).map(|_| ())
    }
}

/// A set of puts and removals applied as one unit, optionally guarded by
/// the current value of some entries.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch<'a> {
    expect: Vec<(&'a str, &'a str)>,
    put: Vec<(&'a str, String)>,
    remove: Vec<&'a str>,
}

impl<'a> WriteBatch<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only apply the batch while `key` currently holds exactly `value`.
    #[must_use]
    pub fn expect(mut self, key: &'a str, value: &'a str) -> Self {
        self.expect.push((key, value));
        self
    }

    #[must_use]
    pub fn put(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.put.push((key, value.into()));
        self
    }

    #[must_use]
    pub fn remove(mut self, key: &'a str) -> Self {
        self.remove.push(key);
        self
    }

    /// Applies the batch to `entries`. Returns whether it was applied.
    fn apply_to(&self, entries: &mut HashMap<String, String>) -> bool {
        let holds = self
            .expect
            .iter()
            .all(|(key, value)| entries.get(*key).map(String::as_str) == Some(*value));
        if !holds {
            return false;
        }

        for key in &self.remove {
            entries.remove(*key);
        }
        for (key, value) in &self.put {
            entries.insert((*key).to_string(), value.clone());
        }
        true
    }
}

/// Credentials file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialsFile {
    /// Version of the credentials file format.
    version: String,
    /// Named entries.
    entries: HashMap<String, String>,
    /// Last write time.
    updated_at: DateTime<Utc>,
}

impl CredentialsFile {
    fn empty() -> Self {
        Self {
            version: CREDENTIALS_VERSION.to_string(),
            entries: HashMap::new(),
            updated_at: Utc::now(),
        }
    }
}

/// File-backed credential persistence.
///
/// Entries live in a single JSON document, by default
/// `~/.shearline/credentials.json`. The directory is created with mode 0700
/// and the file with 0600 on unix.
#[derive(Debug)]
pub struct FileBackend {
    file_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Creates a backend at the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the HOME environment variable is not set.
    pub fn new() -> StoreResult<Self> {
        Ok(Self::with_path(Self::default_path()?))
    }

    /// Creates a backend with a custom path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { file_path: path, write_lock: Mutex::new(()) }
    }

    /// Returns the default credentials file path.
    pub fn default_path() -> StoreResult<PathBuf> {
        // Allow env::var for HOME environment variable (path discovery)
        #[allow(clippy::disallowed_methods)]
        let home = std::env::var("HOME").map_err(|_| StoreError::NoHome("HOME not set".to_string()))?;
        Ok(Path::new(&home).join(".shearline").join("credentials.json"))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn ensure_dir(&self) -> StoreResult<()> {
        let dir = self.file_path.parent().ok_or_else(|| {
            StoreError::InvalidFormat(format!("{} has no parent", self.file_path.display()))
        })?;

        if !dir.exists() {
            fs::create_dir_all(dir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
            }
        }

        Ok(())
    }

    fn load(&self) -> StoreResult<CredentialsFile> {
        if !self.file_path.exists() {
            return Ok(CredentialsFile::empty());
        }

        let contents = fs::read_to_string(&self.file_path)?;
        if contents.trim().is_empty() {
            return Ok(CredentialsFile::empty());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Writes through a temp file and rename so readers never see a torn file.
    fn save(&self, creds: &CredentialsFile) -> StoreResult<()> {
        self.ensure_dir()?;

        let json = serde_json::to_string_pretty(creds)?;
        let tmp_path = self.file_path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp_path, &self.file_path)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialBackend for FileBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.load()?.entries.get(key).cloned())
    }

    fn write(&self, batch: &WriteBatch<'_>) -> StoreResult<bool> {
        let _guard = self.lock();
        let mut creds = match self.load() {
            Ok(creds) => creds,
            // Unreadable contents are replaced by the write below.
            Err(StoreError::Serialization(e)) => {
                warn!(path = %self.file_path.display(), error = %e, "Overwriting unreadable credentials file");
                CredentialsFile::empty()
            }
            Err(e) => return Err(e),
        };

        if !batch.apply_to(&mut creds.entries) {
            return Ok(false);
        }
        creds.updated_at = Utc::now();
        self.save(&creds)?;
        Ok(true)
    }

    fn remove(&self, keys: &[&str]) -> StoreResult<bool> {
        let _guard = self.lock();
        let mut creds = match self.load() {
            Ok(creds) => creds,
            Err(StoreError::Serialization(e)) => {
                warn!(path = %self.file_path.display(), error = %e, "Deleting unreadable credentials file");
                fs::remove_file(&self.file_path)?;
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        let found = keys.iter().fold(false, |found, key| creds.entries.remove(*key).is_some() || found);
        if found {
            creds.updated_at = Utc::now();
            self.save(&creds)?;
        }
        Ok(found)
    }
}

/// In-process credential persistence. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialBackend for MemoryBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned())
    }

    fn write(&self, batch: &WriteBatch<'_>) -> StoreResult<bool> {
        Ok(batch.apply_to(&mut self.entries.lock().unwrap_or_else(PoisonError::into_inner)))
    }

    fn remove(&self, keys: &[&str]) -> StoreResult<bool> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.iter().fold(false, |found, key| map.remove(*key).is_some() || found))
    }
}
