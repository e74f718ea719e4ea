//! The signed-in user's watched list with optimistic writes.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use watchlist_models::{normalize_external_id, WatchedEntry, WatchedSummary};
use watchlist_sources::WatchedRepository;
use crate::error::{SyncError, ValidationError};

#[derive(Default)]
struct WatchedState {
    owner: Option<String>,
    entries: Vec<WatchedEntry>,
    /// Bumped on every owner change so late responses from an earlier
    /// session are dropped
    epoch: u64,
}

/// Local mirror of the `watched` rows owned by the current user.
///
/// Writes are applied locally before the repository call is issued. When
/// the call fails the local change is rolled back and the error returned,
/// unless the session changed in the meantime.
pub struct WatchedStore {
    repository: Arc<dyn WatchedRepository>,
    state: Mutex<WatchedState>,
    entries: watch::Sender<Vec<WatchedEntry>>,
}

impl WatchedStore {
    pub fn new(repository: Arc<dyn WatchedRepository>) -> Self {
        let (entries, _) = watch::channel(Vec::new());
        Self {
            repository,
            state: Mutex::new(WatchedState::default()),
            entries,
        }
    }

    fn state(&self) -> MutexGuard<'_, WatchedState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn publish(&self, state: &WatchedState) {
        self.entries.send_replace(state.entries.clone());
    }

    pub fn entries(&self) -> Vec<WatchedEntry> {
        self.state().entries.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<WatchedEntry>> {
        self.entries.subscribe()
    }

    pub fn owner(&self) -> Option<String> {
        self.state().owner.clone()
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.state().entries.iter().any(|e| e.matches(external_id))
    }

    /// The user's stored rating for a movie they already watched
    pub fn rating_for(&self, external_id: &str) -> Option<u8> {
        self.state()
            .entries
            .iter()
            .find(|e| e.matches(external_id))
            .and_then(|e| e.user_rating)
    }

    pub fn summary(&self) -> WatchedSummary {
        WatchedSummary::from_entries(&self.state().entries)
    }

    /// Replace the collection with `user_id`'s rows, newest first
    pub async fn load(&self, user_id: &str) -> Result<(), SyncError> {
        let epoch = {
            let mut state = self.state();
            if state.owner.as_deref() != Some(user_id) {
                state.entries.clear();
                self.publish(&state);
            }
            state.owner = Some(user_id.to_string());
            state.epoch += 1;
            state.epoch
        };

        let result = self.repository.list_for_user(user_id).await;
        let mut state = self.state();
        if state.epoch != epoch {
            debug!(user_id, "Dropping watched list for a stale session");
            return Ok(());
        }
        match result {
            Ok(mut rows) => {
                rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                info!(user_id, count = rows.len(), "Loaded watched list");
                state.entries = rows;
                self.publish(&state);
                Ok(())
            }
            Err(e) => {
                error!(user_id, "Failed to load watched list: {}", e);
                Err(e.into())
            }
        }
    }

    /// Add an entry for the current owner; the store assigns `created_at`
    pub async fn add(&self, entry: WatchedEntry) -> Result<WatchedEntry, SyncError> {
        let (entry, epoch) = {
            let mut state = self.state();
            let owner = state.owner.clone().ok_or(SyncError::SignedOut)?;
            let mut entry = entry.normalized();
            if state.entries.iter().any(|e| e.matches(&entry.external_id)) {
                return Err(ValidationError::Duplicate {
                    external_id: entry.external_id,
                    title: entry.title,
                }
                .into());
            }
            entry.owner_id = owner;
            state.entries.insert(0, entry.clone());
            self.publish(&state);
            (entry, state.epoch)
        };

        debug!(external_id = %entry.external_id, "Persisting watched entry");
        let result = self.repository.insert(&entry).await;

        let mut state = self.state();
        let live = state.epoch == epoch;
        match result {
            Ok(stored) => {
                if live {
                    if let Some(local) = state.entries.iter_mut().find(|e| e.matches(&entry.external_id)) {
                        *local = stored.clone();
                        self.publish(&state);
                    }
                }
                info!(external_id = %stored.external_id, "Added to watched list");
                Ok(stored)
            }
            Err(e) => {
                if live {
                    state.entries.retain(|e| !e.matches(&entry.external_id));
                    self.publish(&state);
                }
                error!(external_id = %entry.external_id, "Failed to add watched entry: {}", e);
                Err(e.into())
            }
        }
    }

    /// Remove by id; a row already missing on the store counts as removed
    pub async fn remove(&self, external_id: &str) -> Result<(), SyncError> {
        let external_id = normalize_external_id(external_id);
        let (owner, removed, epoch) = {
            let mut state = self.state();
            let owner = state.owner.clone().ok_or(SyncError::SignedOut)?;
            let removed = state
                .entries
                .iter()
                .position(|e| e.matches(&external_id))
                .map(|index| (index, state.entries.remove(index)));
            self.publish(&state);
            (owner, removed, state.epoch)
        };

        match self.repository.delete_by_key(&owner, &external_id).await {
            Ok(0) => {
                warn!(external_id = %external_id, "Watched entry was already gone from the store");
                Ok(())
            }
            Ok(_) => {
                info!(external_id = %external_id, "Removed from watched list");
                Ok(())
            }
            Err(e) => {
                let mut state = self.state();
                if state.epoch == epoch {
                    if let Some((index, entry)) = removed {
                        if !state.entries.iter().any(|e| e.matches(&external_id)) {
                            let index = index.min(state.entries.len());
                            state.entries.insert(index, entry);
                            self.publish(&state);
                        }
                    }
                }
                error!(external_id = %external_id, "Failed to remove watched entry: {}", e);
                Err(e.into())
            }
        }
    }

    /// Forget everything without touching the repository
    pub fn clear(&self) {
        let mut state = self.state();
        state.owner = None;
        state.entries.clear();
        state.epoch += 1;
        self.publish(&state);
        debug!("Cleared watched list");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::testing::{entry, persisted_entry, seeded_backend, SlowWatched};
    use watchlist_sources::{GatewayError, InMemoryBackend, MemoryOp};

    async fn signed_in_store(backend: &Arc<InMemoryBackend>, user: &str) -> WatchedStore {
        backend.sign_in_as(user).unwrap();
        let store = WatchedStore::new(backend.clone());
        store.load(user).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_load_orders_newest_first() {
        let backend = seeded_backend();
        backend.seed_watched(persisted_entry("tt0000001", "ana", 1));
        backend.seed_watched(persisted_entry("tt0000003", "ana", 3));
        backend.seed_watched(persisted_entry("tt0000002", "ana", 2));
        backend.seed_watched(persisted_entry("tt0000009", "ben", 9));

        let store = signed_in_store(&backend, "ana").await;
        let ids: Vec<String> = store.entries().into_iter().map(|e| e.external_id).collect();
        assert_eq!(ids, vec!["tt0000003", "tt0000002", "tt0000001"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_is_visible_before_the_call_completes() {
        let backend = seeded_backend();
        backend.sign_in_as("ana").unwrap();
        let store = Arc::new(WatchedStore::new(Arc::new(SlowWatched {
            inner: backend.clone(),
            delay: Duration::from_secs(1),
        })));
        store.load("ana").await.unwrap();

        let adding = {
            let store = store.clone();
            tokio::spawn(async move { store.add(entry("tt0110912", "ana", 9)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.entries().len(), 1);
        assert!(store.entries()[0].created_at.is_none());
        assert!(backend.all_watched().is_empty());

        let stored = adding.await.unwrap().unwrap();
        assert!(stored.created_at.is_some());
        assert_eq!(store.entries()[0].created_at, stored.created_at);
    }

    #[tokio::test]
    async fn test_duplicate_add_is_rejected_without_a_call() {
        let backend = seeded_backend();
        let store = signed_in_store(&backend, "ana").await;
        store.add(entry("tt0110912", "ana", 9)).await.unwrap();

        let err = store.add(entry("TT0110912", "ana", 5)).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::Duplicate { ref external_id, .. }) if external_id == "tt0110912"
        ));
        assert_eq!(store.entries().len(), 1);
        assert_eq!(backend.calls(MemoryOp::InsertWatched), 1);
    }

    #[tokio::test]
    async fn test_failed_add_rolls_back() {
        let backend = seeded_backend();
        let store = signed_in_store(&backend, "ana").await;
        backend.fail_next(MemoryOp::InsertWatched, GatewayError::Transport("timeout".to_string()));

        let err = store.add(entry("tt0110912", "ana", 9)).await.unwrap_err();
        assert_eq!(err, SyncError::Transport("timeout".to_string()));
        assert!(store.entries().is_empty());
        assert!(backend.all_watched().is_empty());
    }

    #[tokio::test]
    async fn test_add_requires_session() {
        let backend = seeded_backend();
        let store = WatchedStore::new(backend.clone());
        assert_eq!(store.add(entry("tt0110912", "ana", 9)).await, Err(SyncError::SignedOut));
        assert_eq!(backend.calls(MemoryOp::InsertWatched), 0);
    }

    #[tokio::test]
    async fn test_remove_converges_with_store() {
        let backend = seeded_backend();
        let store = signed_in_store(&backend, "ana").await;
        store.add(entry("tt0110912", "ana", 9)).await.unwrap();
        store.add(entry("tt1375666", "ana", 8)).await.unwrap();

        store.remove("TT0110912").await.unwrap();
        let local: Vec<String> = store.entries().into_iter().map(|e| e.external_id).collect();

        store.load("ana").await.unwrap();
        let fetched: Vec<String> = store.entries().into_iter().map(|e| e.external_id).collect();
        assert_eq!(local, vec!["tt1375666"]);
        assert_eq!(local, fetched);
    }

    #[tokio::test]
    async fn test_remove_of_missing_row_is_not_an_error() {
        let backend = seeded_backend();
        let store = signed_in_store(&backend, "ana").await;
        store.remove("tt0110912").await.unwrap();
        assert_eq!(backend.calls(MemoryOp::DeleteWatched), 1);
    }

    #[tokio::test]
    async fn test_failed_remove_restores_position() {
        let backend = seeded_backend();
        let store = signed_in_store(&backend, "ana").await;
        for id in ["tt0000001", "tt0000002", "tt0000003"] {
            store.add(entry(id, "ana", 7)).await.unwrap();
        }
        let before = store.entries();
        backend.fail_next(MemoryOp::DeleteWatched, GatewayError::Transport("offline".to_string()));

        assert!(store.remove("tt0000002").await.is_err());
        assert_eq!(store.entries(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_never_resurrects_after_clear() {
        let backend = seeded_backend();
        backend.sign_in_as("ana").unwrap();
        let store = Arc::new(WatchedStore::new(Arc::new(SlowWatched {
            inner: backend.clone(),
            delay: Duration::from_secs(1),
        })));
        store.load("ana").await.unwrap();
        store.add(entry("tt0110912", "ana", 9)).await.unwrap();
        backend.fail_next(MemoryOp::DeleteWatched, GatewayError::Transport("offline".to_string()));

        let removing = {
            let store = store.clone();
            tokio::spawn(async move { store.remove("tt0110912").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.entries().is_empty());

        store.clear();
        assert!(removing.await.unwrap().is_err());
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn test_clear_makes_no_calls() {
        let backend = seeded_backend();
        let store = signed_in_store(&backend, "ana").await;
        store.add(entry("tt0110912", "ana", 9)).await.unwrap();
        let calls_before = backend.calls(MemoryOp::DeleteWatched) + backend.calls(MemoryOp::ListWatched);

        store.clear();
        assert!(store.entries().is_empty());
        assert_eq!(store.owner(), None);
        assert_eq!(
            backend.calls(MemoryOp::DeleteWatched) + backend.calls(MemoryOp::ListWatched),
            calls_before
        );
    }

    #[tokio::test]
    async fn test_rating_for_and_summary() {
        let backend = seeded_backend();
        let store = signed_in_store(&backend, "ana").await;
        store.add(entry("tt0110912", "ana", 9)).await.unwrap();
        store.add(entry("tt1375666", "ana", 7)).await.unwrap();

        assert_eq!(store.rating_for("TT0110912"), Some(9));
        assert_eq!(store.rating_for("tt0000000"), None);
        assert_eq!(store.summary().count, 2);
        assert_eq!(store.summary().avg_user_rating, Some(8.0));
    }
}
