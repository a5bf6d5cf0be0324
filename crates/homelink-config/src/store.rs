// ── Durable credential stores ──
//
// Keyring entries live under service "homelink", account
// "{profile}/{key}". The file store keeps one JSON object per profile,
// readable only by the owner on Unix.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use homelink_core::{CoreError, CredentialStore};

const KEYRING_SERVICE: &str = "homelink";

fn storage_error(message: impl std::fmt::Display) -> CoreError {
    CoreError::Storage {
        message: message.to_string(),
    }
}

// ── Keyring ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct KeyringCredentialStore {
    profile: String,
}

impl KeyringCredentialStore {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    /// Build a store only if the platform keyring answers a lookup.
    pub fn probe(profile: &str) -> Result<Self, CoreError> {
        let store = Self::new(profile);
        store.get(homelink_core::credentials::USER_KEY)?;
        Ok(store)
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, CoreError> {
        keyring::Entry::new(KEYRING_SERVICE, &format!("{}/{key}", self.profile))
            .map_err(|e| storage_error(format!("keyring unavailable: {e}")))
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(storage_error(format!("keyring read of {key} failed: {e}"))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| storage_error(format!("keyring write of {key} failed: {e}")))
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(storage_error(format!("keyring delete of {key} failed: {e}"))),
        }
    }
}

// ── File ────────────────────────────────────────────────────────────

/// JSON-file store. Every operation re-reads the file so separate
/// processes sharing a profile see each other's writes.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, CoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                storage_error(format!("{} is not valid JSON: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(storage_error(format!("cannot read {}: {e}", self.path.display()))),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), CoreError> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(storage_error(format!(
                    "cannot remove {}: {e}",
                    self.path.display()
                ))),
            };
        }

        let json = serde_json::to_vec_pretty(entries).map_err(storage_error)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(storage_error)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut file = open_private(&tmp)
            .map_err(|e| storage_error(format!("cannot write {}: {e}", tmp.display())))?;
        file.write_all(&json).map_err(storage_error)?;
        file.sync_all().map_err(storage_error)?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| storage_error(format!("cannot replace {}: {e}", self.path.display())))
    }

    fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), CoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        if f(&mut entries) {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.update(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.update(|entries| entries.remove(key).is_some())
    }
}
