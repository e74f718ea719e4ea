//! Debounced, cancellable title search.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};
use watchlist_config::SearchConfig;
use watchlist_models::MovieSummary;
use watchlist_sources::MovieProvider;
use crate::cancel::CancelToken;
use crate::error::SyncError;

/// Lifecycle of the most recent query
#[derive(Debug, Clone, PartialEq)]
pub enum SearchStatus {
    /// Nothing to show: no query yet, or one too short to send
    Idle,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub movies: Vec<MovieSummary>,
    pub status: SearchStatus,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            query: String::new(),
            movies: Vec::new(),
            status: SearchStatus::Idle,
        }
    }
}

impl SearchState {
    /// True once the state describes `query` and no lookup for it is running
    pub fn is_settled_for(&self, query: &str) -> bool {
        self.query == query && self.status != SearchStatus::Loading
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub min_query_len: usize,
    pub debounce: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            min_query_len: config.min_query_len,
            debounce: Duration::from_millis(config.debounce_ms),
        }
    }
}

struct Inner {
    provider: Arc<dyn MovieProvider>,
    options: SearchOptions,
    state: watch::Sender<SearchState>,
    /// Token of the lookup allowed to publish; guards every publish
    current: Mutex<Option<CancelToken>>,
}

impl Inner {
    fn current(&self) -> MutexGuard<'_, Option<CancelToken>> {
        self.current.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Publish only while `token` is still the live lookup
    fn publish_if_live(&self, token: &CancelToken, state: SearchState) -> bool {
        let _current = self.current();
        if token.is_cancelled() {
            return false;
        }
        self.state.send_replace(state);
        true
    }
}

/// Turns keystrokes into at most one outstanding provider lookup.
///
/// Each `set_query` cancels the previous lookup; a cancelled lookup never
/// publishes, so a slow stale response cannot overwrite a newer one.
#[derive(Clone)]
pub struct SearchController {
    inner: Arc<Inner>,
}

impl SearchController {
    pub fn new(provider: Arc<dyn MovieProvider>, options: SearchOptions) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            inner: Arc::new(Inner {
                provider,
                options,
                state,
                current: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    /// Replace the desired query. Must be called inside a tokio runtime.
    pub fn set_query(&self, text: &str) {
        let query = text.trim().to_string();
        let mut current = self.inner.current();
        if let Some(previous) = current.take() {
            previous.cancel();
        }

        if query.chars().count() < self.inner.options.min_query_len {
            debug!(query = %query, "Query below minimum length, clearing results");
            self.inner.state.send_replace(SearchState {
                query,
                movies: Vec::new(),
                status: SearchStatus::Idle,
            });
            return;
        }

        let token = CancelToken::new();
        *current = Some(token.clone());
        drop(current);

        let inner = self.inner.clone();
        tokio::spawn(async move { run_lookup(inner, query, token).await });
    }

    /// Cancel any pending lookup; its result will be discarded
    pub fn shutdown(&self) {
        if let Some(token) = self.inner.current().take() {
            token.cancel();
        }
    }
}

async fn run_lookup(inner: Arc<Inner>, query: String, token: CancelToken) {
    tokio::select! {
        _ = token.cancelled() => return,
        _ = tokio::time::sleep(inner.options.debounce) => {}
    }

    let previous = inner.state.borrow().movies.clone();
    let loading = SearchState {
        query: query.clone(),
        movies: previous,
        status: SearchStatus::Loading,
    };
    if !inner.publish_if_live(&token, loading) {
        return;
    }

    debug!(query = %query, "Searching provider");
    let result = tokio::select! {
        _ = token.cancelled() => return,
        result = inner.provider.search(&query) => result,
    };

    let next = match result {
        Ok(movies) => {
            debug!(query = %query, results = movies.len(), "Search finished");
            SearchState { query, movies, status: SearchStatus::Ready }
        }
        Err(e) => {
            let reason = SyncError::from(e).to_string();
            warn!(query = %query, "Search failed: {}", reason);
            SearchState { query, movies: Vec::new(), status: SearchStatus::Failed(reason) }
        }
    };
    if !inner.publish_if_live(&token, next) {
        debug!("Discarded superseded search result");
    }
}
