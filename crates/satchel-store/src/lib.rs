//! Persistent stores for the Satchel client.
//!
//! A directory-backed JSON blob store plus the typed stores built on it:
//! conversation history, user settings, and the prompt/template libraries.
//! Every store loads at construction and persists on each mutation.

pub mod history;
pub mod kv;
pub mod library;
pub mod settings;

pub use history::{ConversationHistoryStore, HistoryFilter, HISTORY_CAP};
pub use kv::{JsonStore, StoreKey};
pub use library::{AgentTemplate, CustomPrompt, PromptLibrary, TemplateLibrary};
pub use settings::{Settings, SettingsStore, Theme};
