//! Process-wide user settings with write-through persistence.
//!
//! Loaded once at construction (defaults if nothing is persisted); every
//! setter persists before returning, so the stored blob and the in-memory
//! value never diverge observably.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::kv::{JsonStore, StoreKey};

/// Color theme preference. Carried for the presentation layer, not
/// interpreted here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// User-tunable runtime settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Use the streaming endpoint for answer queries.
    pub streaming_enabled: bool,
    /// Streaming attempts before falling back to the single-shot endpoint.
    /// Always at least 1.
    pub stream_retries: u32,
    /// Bookmark every new conversation as it is recorded.
    pub auto_bookmark: bool,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            streaming_enabled: false,
            stream_retries: 3,
            auto_bookmark: false,
            theme: Theme::Dark,
        }
    }
}

/// Single process-wide settings instance backed by the JSON store.
pub struct SettingsStore {
    store: Arc<JsonStore>,
    inner: Mutex<Settings>,
}

impl SettingsStore {
    /// Load settings from the store, falling back to defaults if the blob
    /// is absent or unreadable.
    pub fn new(store: Arc<JsonStore>) -> Self {
        let settings = match store.load::<Settings>(StoreKey::Settings) {
            Ok(Some(mut s)) => {
                s.stream_retries = s.stream_retries.max(1);
                s
            }
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!(error = %e, "failed to load settings, using defaults");
                Settings::default()
            }
        };
        Self {
            store,
            inner: Mutex::new(settings),
        }
    }

    /// Snapshot of the current settings.
    pub fn current(&self) -> Settings {
        self.lock().clone()
    }

    pub fn set_streaming_enabled(&self, enabled: bool) {
        self.update(|s| s.streaming_enabled = enabled);
    }

    /// Set the streaming attempt budget; values below 1 are clamped to 1.
    pub fn set_stream_retries(&self, retries: u32) {
        self.update(|s| s.stream_retries = retries.max(1));
    }

    pub fn set_auto_bookmark(&self, enabled: bool) {
        self.update(|s| s.auto_bookmark = enabled);
    }

    pub fn set_theme(&self, theme: Theme) {
        self.update(|s| s.theme = theme);
    }

    fn update(&self, f: impl FnOnce(&mut Settings)) {
        let mut settings = self.lock();
        f(&mut settings);
        if let Err(e) = self.store.save(StoreKey::Settings, &*settings) {
            warn!(error = %e, "failed to persist settings");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Settings> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("settings lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
