//! Key/value persistence for opaque JSON blobs.
//!
//! One file per key under a data directory. Saves go through a temp file
//! plus atomic rename so a crash mid-write never leaves a torn blob.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use satchel_core::error::{Result, SatchelError};

/// Keys under which Satchel persists its JSON blobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKey {
    ConversationHistory,
    Bookmarks,
    CustomPrompts,
    Settings,
    CustomTemplates,
}

impl StoreKey {
    /// File name for this key inside the store directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            StoreKey::ConversationHistory => "conversation_history.json",
            StoreKey::Bookmarks => "bookmarks.json",
            StoreKey::CustomPrompts => "custom_prompts.json",
            StoreKey::Settings => "settings.json",
            StoreKey::CustomTemplates => "custom_templates.json",
        }
    }
}

/// Directory-backed JSON blob store.
///
/// The store survives process restarts; a missing key loads as `None`.
#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open (or create) a store rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Load and deserialize the blob stored under `key`.
    ///
    /// Returns `Ok(None)` if the key has never been saved.
    pub fn load<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let value: T = serde_json::from_str(&content)?;
        Ok(Some(value))
    }

    /// Serialize `value` and store it under `key`, atomically.
    pub fn save<T: Serialize>(&self, key: StoreKey, value: &T) -> Result<()> {
        let path = self.path(key);
        let content = serde_json::to_string(value)?;

        // Write to a temp file in the same directory, then rename over the
        // destination so readers never observe a partial write.
        let tmp_path = self.dir.join(format!(".{}.tmp", key.file_name()));
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(content.as_bytes())?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &path)
            .map_err(|e| SatchelError::Storage(format!("failed to commit {}: {}", key.file_name(), e)))?;
        debug!(key = key.file_name(), bytes = content.len(), "blob saved");
        Ok(())
    }

    /// Remove the blob stored under `key`. No-op if absent.
    pub fn remove(&self, key: StoreKey) -> Result<()> {
        let path = self.path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Directory the store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: StoreKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}
