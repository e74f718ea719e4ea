//! Fake collaborators and fixtures shared by the controller tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use watchlist_models::{Comment, MovieDetail, MovieSummary, WatchedEntry};
use watchlist_sources::{
    CommentRepository, Gateways, GatewayError, InMemoryBackend, MovieProvider, WatchedRepository,
};

struct Scripted {
    delay: Duration,
    result: Result<Vec<MovieSummary>, GatewayError>,
}

/// Provider whose answers and latencies are scripted per query
#[derive(Default)]
pub(crate) struct FakeProvider {
    scripted: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn respond(&self, query: &str, delay: Duration, result: Result<Vec<MovieSummary>, GatewayError>) {
        self.scripted
            .lock()
            .unwrap()
            .insert(query.to_string(), Scripted { delay, result });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MovieProvider for FakeProvider {
    async fn search(&self, title: &str) -> Result<Vec<MovieSummary>, GatewayError> {
        self.calls.lock().unwrap().push(title.to_string());
        let (delay, result) = match self.scripted.lock().unwrap().get(title) {
            Some(scripted) => (scripted.delay, scripted.result.clone()),
            None => (Duration::ZERO, Err(GatewayError::provider("Movie not found!"))),
        };
        tokio::time::sleep(delay).await;
        result
    }

    async fn fetch_by_id(&self, _external_id: &str) -> Result<MovieDetail, GatewayError> {
        Err(GatewayError::provider("Incorrect IMDb ID."))
    }
}

pub(crate) fn summary(id: &str, title: &str) -> MovieSummary {
    detail(id, title).summary()
}

pub(crate) fn detail(id: &str, title: &str) -> MovieDetail {
    MovieDetail {
        external_id: id.to_string(),
        title: title.to_string(),
        year: "2010".to_string(),
        poster_url: None,
        runtime_minutes: Some(148),
        external_rating: Some(8.8),
        plot: String::new(),
        released: String::new(),
        actors: String::new(),
        director: String::new(),
        genre: String::new(),
    }
}

pub(crate) fn entry(id: &str, owner: &str, rating: u8) -> WatchedEntry {
    WatchedEntry::from_detail(&detail(id, id), owner, rating, 1)
}

/// Entry with a fixed creation time, `minute` minutes past noon
pub(crate) fn persisted_entry(id: &str, owner: &str, minute: u32) -> WatchedEntry {
    WatchedEntry {
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).single(),
        ..entry(id, owner, 7)
    }
}

/// Backend with users "ana" and "ben" and a small catalog
pub(crate) fn seeded_backend() -> Arc<InMemoryBackend> {
    let backend = Arc::new(InMemoryBackend::new());
    backend.register_user("ana", "ana@example.com");
    backend.register_user("ben", "ben@example.com");
    backend.add_movie(detail("tt1375666", "Inception"));
    backend.add_movie(detail("tt5295894", "Inception: The Cobol Job"));
    backend.add_movie(detail("tt1790736", "Inception: Jump Right Into the Action"));
    backend.add_movie(detail("tt0110912", "Pulp Fiction"));
    backend
}

pub(crate) fn gateways(backend: &Arc<InMemoryBackend>) -> Gateways {
    Gateways::in_memory(backend.clone())
}

/// Watched repository that answers only after `delay`
pub(crate) struct SlowWatched {
    pub inner: Arc<InMemoryBackend>,
    pub delay: Duration,
}

#[async_trait]
impl WatchedRepository for SlowWatched {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<WatchedEntry>, GatewayError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_for_user(user_id).await
    }

    async fn insert(&self, entry: &WatchedEntry) -> Result<WatchedEntry, GatewayError> {
        tokio::time::sleep(self.delay).await;
        WatchedRepository::insert(self.inner.as_ref(), entry).await
    }

    async fn delete_by_key(&self, user_id: &str, external_id: &str) -> Result<u64, GatewayError> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_by_key(user_id, external_id).await
    }
}

/// Comment repository whose inserts answer only after `delay`
pub(crate) struct SlowComments {
    pub inner: Arc<InMemoryBackend>,
    pub delay: Duration,
}

#[async_trait]
impl CommentRepository for SlowComments {
    async fn list_for_movie(&self, movie_id: &str) -> Result<Vec<Comment>, GatewayError> {
        self.inner.list_for_movie(movie_id).await
    }

    async fn insert(&self, movie_id: &str, author_id: &str, body: &str) -> Result<Comment, GatewayError> {
        tokio::time::sleep(self.delay).await;
        CommentRepository::insert(self.inner.as_ref(), movie_id, author_id, body).await
    }

    async fn delete_by_id(&self, comment_id: &str) -> Result<(), GatewayError> {
        self.inner.delete_by_id(comment_id).await
    }

    async fn resolve_authors(&self, author_ids: &[String]) -> Result<HashMap<String, String>, GatewayError> {
        self.inner.resolve_authors(author_ids).await
    }
}
