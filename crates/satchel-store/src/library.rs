//! User-authored prompt and generator-template libraries.
//!
//! Both are small persisted lists with the same lifecycle as the other
//! stores: load at construction, write-through on every mutation.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::kv::{JsonStore, StoreKey};

/// A saved prompt text the user can re-apply to the query box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomPrompt {
    pub id: Uuid,
    pub name: String,
    pub prompt: String,
    pub category: String,
    pub timestamp: DateTime<Utc>,
}

/// A user-authored generator template ("agent").
///
/// `prompt` holds the fully composed instruction; the builder inputs are
/// kept alongside so the template can be edited later.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentTemplate {
    pub id: Uuid,
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub behavior: String,
    #[serde(default)]
    pub rules: String,
    pub knowledge_preference: String,
    pub creativity: String,
    pub timestamp: DateTime<Utc>,
}

impl AgentTemplate {
    /// Compose a template from builder inputs.
    ///
    /// Optional behavior and rules sections are appended to the main task,
    /// followed by the knowledge/creativity preferences.
    pub fn compose(
        name: impl Into<String>,
        task: &str,
        behavior: &str,
        rules: &str,
        knowledge_preference: impl Into<String>,
        creativity: impl Into<String>,
    ) -> Self {
        let knowledge_preference = knowledge_preference.into();
        let creativity = creativity.into();

        let mut prompt = task.to_string();
        if !behavior.trim().is_empty() {
            prompt.push_str(&format!("\n\nBehavior: {}", behavior));
        }
        if !rules.trim().is_empty() {
            prompt.push_str(&format!("\n\nRules to follow:\n{}", rules));
        }
        prompt.push_str(&format!("\n\nKnowledge preference: {}", knowledge_preference));
        prompt.push_str(&format!("\nCreativity level: {}", creativity));

        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            prompt,
            behavior: behavior.to_string(),
            rules: rules.to_string(),
            knowledge_preference,
            creativity,
            timestamp: Utc::now(),
        }
    }
}

/// Persisted list of user-saved prompts.
pub struct PromptLibrary {
    store: Arc<JsonStore>,
    inner: Mutex<Vec<CustomPrompt>>,
}

impl PromptLibrary {
    pub fn new(store: Arc<JsonStore>) -> Self {
        let prompts = load_list(&store, StoreKey::CustomPrompts);
        Self {
            store,
            inner: Mutex::new(prompts),
        }
    }

    /// Save a new prompt under the "Custom" category and persist.
    pub fn add(&self, name: impl Into<String>, prompt: impl Into<String>) -> CustomPrompt {
        let entry = CustomPrompt {
            id: Uuid::new_v4(),
            name: name.into(),
            prompt: prompt.into(),
            category: "Custom".to_string(),
            timestamp: Utc::now(),
        };
        let mut prompts = lock(&self.inner, "prompt library");
        prompts.push(entry.clone());
        persist(&self.store, StoreKey::CustomPrompts, &*prompts);
        entry
    }

    /// Remove a prompt by id. No-op if absent.
    pub fn remove(&self, id: Uuid) {
        let mut prompts = lock(&self.inner, "prompt library");
        let before = prompts.len();
        prompts.retain(|p| p.id != id);
        if prompts.len() != before {
            persist(&self.store, StoreKey::CustomPrompts, &*prompts);
        }
    }

    /// Snapshot in insertion order.
    pub fn list(&self) -> Vec<CustomPrompt> {
        lock(&self.inner, "prompt library").clone()
    }
}

/// Persisted list of user-authored generator templates.
pub struct TemplateLibrary {
    store: Arc<JsonStore>,
    inner: Mutex<Vec<AgentTemplate>>,
}

impl TemplateLibrary {
    pub fn new(store: Arc<JsonStore>) -> Self {
        let templates = load_list(&store, StoreKey::CustomTemplates);
        Self {
            store,
            inner: Mutex::new(templates),
        }
    }

    /// Add a composed template and persist.
    pub fn add(&self, template: AgentTemplate) -> Uuid {
        let id = template.id;
        let mut templates = lock(&self.inner, "template library");
        templates.push(template);
        persist(&self.store, StoreKey::CustomTemplates, &*templates);
        id
    }

    /// Remove a template by id. No-op if absent.
    pub fn remove(&self, id: Uuid) {
        let mut templates = lock(&self.inner, "template library");
        let before = templates.len();
        templates.retain(|t| t.id != id);
        if templates.len() != before {
            persist(&self.store, StoreKey::CustomTemplates, &*templates);
        }
    }

    /// Snapshot in insertion order.
    pub fn list(&self) -> Vec<AgentTemplate> {
        lock(&self.inner, "template library").clone()
    }
}

fn load_list<T: serde::de::DeserializeOwned>(store: &JsonStore, key: StoreKey) -> Vec<T> {
    match store.load(key) {
        Ok(Some(list)) => list,
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(key = key.file_name(), error = %e, "failed to load library, starting empty");
            Vec::new()
        }
    }
}

fn persist<T: Serialize>(store: &JsonStore, key: StoreKey, list: &[T]) {
    if let Err(e) = store.save(key, &list) {
        warn!(key = key.file_name(), error = %e, "failed to persist library");
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!("{} lock poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}
