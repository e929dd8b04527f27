//! Credential storage
//!
//! The stored credential is the single source of truth for "are we signed in".
//! All three fields are written and removed together: a store never holds a
//! refresh token without an expiry, or an access token from another session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use crate::Result;

/// Access token, refresh token and the instant the access token stops working
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build from a token response, `expires_in` being relative to `now`.
    ///
    /// Returns `None` when the lifetime does not fit in a timestamp.
    pub fn from_expires_in(
        access_token: String,
        refresh_token: String,
        expires_in_secs: i64,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let expires_at = Duration::try_seconds(expires_in_secs)
            .and_then(|lifetime| now.checked_add_signed(lifetime))?;
        Some(Self {
            access_token,
            refresh_token,
            expires_at,
        })
    }

    /// Usable for API calls iff `now < expires_at`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        !self.is_valid_at(Utc::now())
    }
}

/// Persistent holder of the current credential
pub trait CredentialStore: Send + Sync {
    /// Returns `None` unless every field is present
    fn load(&self) -> Result<Option<Credential>>;

    /// Overwrite all fields at once
    fn save(&self, credential: &Credential) -> Result<()>;

    /// Remove all fields at once
    fn clear(&self) -> Result<()>;
}

/// On-disk shape; fields are optional so a damaged file reads as "no credential"
#[derive(Debug, Deserialize)]
struct StoredCredential {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredCredential {
    fn complete(self) -> Option<Credential> {
        Some(Credential {
            access_token: self.access_token?,
            refresh_token: self.refresh_token?,
            expires_at: self.expires_at?,
        })
    }
}

/// JSON file store at `~/.teamslink/credentials.json`
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the default location
    pub fn default_location() -> Self {
        Self::new(crate::config::config_dir().join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let stored: StoredCredential = match serde_json::from_str(&content) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Ignoring unreadable credential file at {:?}: {}", self.path, e);
                return Ok(None);
            }
        };

        let credential = stored.complete();
        if credential.is_none() {
            tracing::warn!("Ignoring incomplete credential file at {:?}", self.path);
        }
        Ok(credential)
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write to a sibling file then rename, so readers see old or new, never half
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(credential)?;

        // A leftover temp file may carry looser permissions, so always create afresh
        if temp_path.exists() {
            std::fs::remove_file(&temp_path)?;
        }
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&temp_path, &self.path)?;
        tracing::debug!("Saved credential to {:?}", self.path);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            tracing::info!("Cleared stored credential");
        }
        Ok(())
    }
}

/// In-process store, used by tests and short-lived embeddings
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Credential>> {
        self.credential.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credential>> {
        Ok(self.slot().clone())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        *self.slot() = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}
