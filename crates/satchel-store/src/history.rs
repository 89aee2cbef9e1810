//! Conversation history: a capped, newest-first ledger of exchanges.
//!
//! State lives in memory behind a mutex; every mutation persists the full
//! list through the injected [`JsonStore`] before returning. Persistence
//! failures are logged and absorbed — the in-memory list stays
//! authoritative for the session.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{error, warn};

use satchel_core::types::{Conversation, Message, Rating};

use crate::kv::{JsonStore, StoreKey};

/// Maximum number of conversations retained; oldest are evicted on insert.
pub const HISTORY_CAP: usize = 100;

/// Criterion for a read-only view of the history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryFilter {
    All,
    /// Bookmarked conversations only.
    Bookmarked,
    /// Conversations with any rating set.
    Rated,
}

struct Inner {
    conversations: Vec<Conversation>,
    last_id: u64,
}

/// Append-only (capped) ledger of user/assistant exchanges.
pub struct ConversationHistoryStore {
    store: Arc<JsonStore>,
    inner: Mutex<Inner>,
}

impl ConversationHistoryStore {
    /// Create a store, loading any persisted history.
    ///
    /// A missing or unreadable blob starts the store empty.
    pub fn new(store: Arc<JsonStore>) -> Self {
        let conversations: Vec<Conversation> =
            match store.load(StoreKey::ConversationHistory) {
                Ok(Some(list)) => list,
                Ok(None) => Vec::new(),
                Err(e) => {
                    warn!(error = %e, "failed to load conversation history, starting empty");
                    Vec::new()
                }
            };
        // Newest-first ordering means the front carries the largest id.
        let last_id = conversations.iter().map(|c| c.id).max().unwrap_or(0);

        Self {
            store,
            inner: Mutex::new(Inner {
                conversations,
                last_id,
            }),
        }
    }

    /// Record a new exchange at the front of the ledger.
    ///
    /// The conversation gets a fresh unique id, bookmarked=false and no
    /// rating; the list is truncated to [`HISTORY_CAP`] and persisted.
    /// Returns the new conversation's id.
    pub fn append(&self, user: Message, mut assistant: Message) -> u64 {
        // A persisted conversation never carries an in-progress message.
        if let Message::Assistant { streaming, .. } = &mut assistant {
            *streaming = false;
        }

        let mut inner = self.lock();
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;
        let id = now_ms.max(inner.last_id + 1);
        inner.last_id = id;

        inner.conversations.insert(
            0,
            Conversation {
                id,
                user,
                assistant,
                timestamp: Utc::now(),
                bookmarked: false,
                rating: None,
            },
        );
        inner.conversations.truncate(HISTORY_CAP);

        self.persist(&inner.conversations);
        id
    }

    /// Flip the bookmarked flag on the matching conversation.
    ///
    /// Returns the resulting flag value, or `None` if the id is absent
    /// (which is not an error).
    pub fn toggle_bookmark(&self, id: u64) -> Option<bool> {
        let mut inner = self.lock();
        let flag = match inner.conversations.iter_mut().find(|c| c.id == id) {
            Some(conv) => {
                conv.bookmarked = !conv.bookmarked;
                Some(conv.bookmarked)
            }
            None => None,
        };
        if flag.is_some() {
            self.persist(&inner.conversations);
        }
        flag
    }

    /// Set the rating on the matching conversation to exactly `rating`.
    ///
    /// Overwrites any previous value; no-op if the id is absent.
    pub fn rate(&self, id: u64, rating: Option<Rating>) {
        let mut inner = self.lock();
        if let Some(conv) = inner.conversations.iter_mut().find(|c| c.id == id) {
            conv.rating = rating;
            self.persist(&inner.conversations);
        }
    }

    /// Remove the matching conversation. No-op if the id is absent.
    pub fn delete(&self, id: u64) {
        let mut inner = self.lock();
        let before = inner.conversations.len();
        inner.conversations.retain(|c| c.id != id);
        if inner.conversations.len() != before {
            self.persist(&inner.conversations);
        }
    }

    /// Empty the ledger and persist the empty state.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.conversations.clear();
        self.persist(&inner.conversations);
    }

    /// Read-only snapshot matching `filter`, in newest-first order.
    pub fn filtered(&self, filter: HistoryFilter) -> Vec<Conversation> {
        let inner = self.lock();
        inner
            .conversations
            .iter()
            .filter(|c| match filter {
                HistoryFilter::All => true,
                HistoryFilter::Bookmarked => c.bookmarked,
                HistoryFilter::Rated => c.rating.is_some(),
            })
            .cloned()
            .collect()
    }

    /// Snapshot of the full ledger, newest-first.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.lock().conversations.clone()
    }

    /// Number of recorded conversations.
    pub fn len(&self) -> usize {
        self.lock().conversations.len()
    }

    /// True if no conversations are recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("history lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn persist(&self, conversations: &[Conversation]) {
        if let Err(e) = self.store.save(StoreKey::ConversationHistory, &conversations) {
            warn!(error = %e, "failed to persist conversation history");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> (tempfile::TempDir, ConversationHistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path().join("data")).unwrap());
        (dir, ConversationHistoryStore::new(store))
    }

    fn exchange(n: usize) -> (Message, Message) {
        (
            Message::user(format!("question {}", n)),
            Message::Assistant {
                content: format!("answer {}", n),
                sources: vec![],
                metadata: Default::default(),
                streaming: false,
                query: Some(format!("question {}", n)),
                timestamp: Utc::now(),
            },
        )
    }

    // ---- Append ----

    #[test]
    fn test_append_front_newest_first() {
        let (_dir, history) = history();
        let (u1, a1) = exchange(1);
        let (u2, a2) = exchange(2);
        history.append(u1, a1);
        history.append(u2, a2);

        let all = history.conversations();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].assistant.content(), "answer 2");
        assert_eq!(all[1].assistant.content(), "answer 1");
    }

    #[test]
    fn test_append_sets_defaults() {
        let (_dir, history) = history();
        let (u, a) = exchange(1);
        let id = history.append(u, a);

        let conv = &history.conversations()[0];
        assert_eq!(conv.id, id);
        assert!(!conv.bookmarked);
        assert!(conv.rating.is_none());
    }

    #[test]
    fn test_append_ids_strictly_increasing() {
        let (_dir, history) = history();
        let mut last = 0;
        for n in 0..10 {
            let (u, a) = exchange(n);
            let id = history.append(u, a);
            assert!(id > last, "id {} not greater than {}", id, last);
            last = id;
        }
    }

    #[test]
    fn test_append_clears_streaming_flag() {
        let (_dir, history) = history();
        let assistant = Message::Assistant {
            content: "partial".into(),
            sources: vec![],
            metadata: Default::default(),
            streaming: true,
            query: None,
            timestamp: Utc::now(),
        };
        history.append(Message::user("q"), assistant);
        assert!(!history.conversations()[0].assistant.is_streaming());
    }

    #[test]
    fn test_cap_at_one_hundred() {
        let (_dir, history) = history();
        let mut ids = Vec::new();
        for n in 0..101 {
            let (u, a) = exchange(n);
            ids.push(history.append(u, a));
        }

        let all = history.conversations();
        assert_eq!(all.len(), HISTORY_CAP);
        // The newest 100 survive; the very first append was evicted.
        assert_eq!(all[0].id, ids[100]);
        assert_eq!(all[99].id, ids[1]);
        assert!(!all.iter().any(|c| c.id == ids[0]));
    }

    // ---- Bookmarks ----

    #[test]
    fn test_toggle_bookmark() {
        let (_dir, history) = history();
        let (u, a) = exchange(1);
        let id = history.append(u, a);

        assert_eq!(history.toggle_bookmark(id), Some(true));
        assert!(history.conversations()[0].bookmarked);

        assert_eq!(history.toggle_bookmark(id), Some(false));
        assert!(!history.conversations()[0].bookmarked);
    }

    #[test]
    fn test_toggle_bookmark_twice_restores_state() {
        let (_dir, history) = history();
        for n in 0..5 {
            let (u, a) = exchange(n);
            history.append(u, a);
        }
        let before = history.conversations();
        for conv in &before {
            history.toggle_bookmark(conv.id);
            history.toggle_bookmark(conv.id);
        }
        assert_eq!(history.conversations(), before);
    }

    #[test]
    fn test_toggle_bookmark_missing_id_is_noop() {
        let (_dir, history) = history();
        let (u, a) = exchange(1);
        history.append(u, a);
        let before = history.conversations();

        assert_eq!(history.toggle_bookmark(999), None);
        assert_eq!(history.conversations(), before);
    }

    // ---- Ratings ----

    #[test]
    fn test_rate_last_write_wins() {
        let (_dir, history) = history();
        let (u, a) = exchange(1);
        let id = history.append(u, a);

        history.rate(id, Some(Rating::Up));
        assert_eq!(history.conversations()[0].rating, Some(Rating::Up));

        history.rate(id, Some(Rating::Down));
        assert_eq!(history.conversations()[0].rating, Some(Rating::Down));
    }

    #[test]
    fn test_rate_can_clear() {
        let (_dir, history) = history();
        let (u, a) = exchange(1);
        let id = history.append(u, a);

        history.rate(id, Some(Rating::Up));
        history.rate(id, None);
        assert!(history.conversations()[0].rating.is_none());
    }

    #[test]
    fn test_rate_missing_id_is_noop() {
        let (_dir, history) = history();
        let (u, a) = exchange(1);
        history.append(u, a);
        history.rate(12345, Some(Rating::Up));
        assert!(history.conversations()[0].rating.is_none());
    }

    // ---- Delete / clear ----

    #[test]
    fn test_delete() {
        let (_dir, history) = history();
        let (u1, a1) = exchange(1);
        let (u2, a2) = exchange(2);
        let id1 = history.append(u1, a1);
        history.append(u2, a2);

        history.delete(id1);
        let all = history.conversations();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].assistant.content(), "answer 2");
    }

    #[test]
    fn test_delete_missing_id_is_noop() {
        let (_dir, history) = history();
        let (u, a) = exchange(1);
        history.append(u, a);
        history.delete(42);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_clear() {
        let (_dir, history) = history();
        for n in 0..3 {
            let (u, a) = exchange(n);
            history.append(u, a);
        }
        history.clear();
        assert!(history.is_empty());
    }

    // ---- Filters ----

    #[test]
    fn test_filtered_all_preserves_order() {
        let (_dir, history) = history();
        for n in 0..4 {
            let (u, a) = exchange(n);
            history.append(u, a);
        }
        let all = history.filtered(HistoryFilter::All);
        assert_eq!(all, history.conversations());
    }

    #[test]
    fn test_filtered_bookmarked_never_includes_unbookmarked() {
        let (_dir, history) = history();
        let mut ids = Vec::new();
        for n in 0..6 {
            let (u, a) = exchange(n);
            ids.push(history.append(u, a));
        }
        history.toggle_bookmark(ids[1]);
        history.toggle_bookmark(ids[4]);

        let bookmarked = history.filtered(HistoryFilter::Bookmarked);
        assert_eq!(bookmarked.len(), 2);
        assert!(bookmarked.iter().all(|c| c.bookmarked));
        // Newest-first within the view.
        assert_eq!(bookmarked[0].id, ids[4]);
        assert_eq!(bookmarked[1].id, ids[1]);
    }

    #[test]
    fn test_filtered_rated_only() {
        let (_dir, history) = history();
        let mut ids = Vec::new();
        for n in 0..4 {
            let (u, a) = exchange(n);
            ids.push(history.append(u, a));
        }
        history.rate(ids[0], Some(Rating::Down));
        history.rate(ids[3], Some(Rating::Up));

        let rated = history.filtered(HistoryFilter::Rated);
        assert_eq!(rated.len(), 2);
        assert!(rated.iter().all(|c| c.rating.is_some()));
    }

    #[test]
    fn test_filtered_does_not_mutate() {
        let (_dir, history) = history();
        for n in 0..3 {
            let (u, a) = exchange(n);
            history.append(u, a);
        }
        let before = history.conversations();
        history.filtered(HistoryFilter::Bookmarked);
        history.filtered(HistoryFilter::Rated);
        assert_eq!(history.conversations(), before);
    }

    // ---- Persistence ----

    #[test]
    fn test_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path().join("data")).unwrap());

        let id = {
            let history = ConversationHistoryStore::new(Arc::clone(&store));
            let (u, a) = exchange(1);
            let id = history.append(u, a);
            history.toggle_bookmark(id);
            history.rate(id, Some(Rating::Up));
            id
        };

        let reloaded = ConversationHistoryStore::new(store);
        let all = reloaded.conversations();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert!(all[0].bookmarked);
        assert_eq!(all[0].rating, Some(Rating::Up));
    }

    #[test]
    fn test_ids_unique_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path().join("data")).unwrap());

        let first = {
            let history = ConversationHistoryStore::new(Arc::clone(&store));
            let (u, a) = exchange(1);
            history.append(u, a)
        };

        let history = ConversationHistoryStore::new(store);
        let (u, a) = exchange(2);
        let second = history.append(u, a);
        assert!(second > first);
    }

    #[test]
    fn test_corrupt_blob_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path().join("data")).unwrap());
        std::fs::write(
            store.dir().join(StoreKey::ConversationHistory.file_name()),
            "{ not json",
        )
        .unwrap();

        let history = ConversationHistoryStore::new(store);
        assert!(history.is_empty());
    }

    #[test]
    fn test_clear_persists_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path().join("data")).unwrap());
        {
            let history = ConversationHistoryStore::new(Arc::clone(&store));
            let (u, a) = exchange(1);
            history.append(u, a);
            history.clear();
        }
        let reloaded = ConversationHistoryStore::new(store);
        assert!(reloaded.is_empty());
    }
}
