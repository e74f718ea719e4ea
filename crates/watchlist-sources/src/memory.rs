//! In-process backend implementing every collaborator trait.
//!
//! Applies the same ownership rules as the hosted project: rows are only
//! visible to and deletable by their owner. Used by tests and by the CLI's
//! offline mode.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use watchlist_models::{normalize_external_id, same_external_id, sort_newest_first, Comment, MovieDetail, MovieSummary, Session, WatchedEntry};
use crate::error::GatewayError;
use crate::session_events::SessionEvents;
use crate::traits::{CommentRepository, IdentityService, MovieProvider, PasswordSignIn, SessionHandler, Subscription, WatchedRepository};

/// Operations that can be counted and made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    Search,
    FetchById,
    ListWatched,
    InsertWatched,
    DeleteWatched,
    ListComments,
    InsertComment,
    DeleteComment,
    ResolveAuthors,
    SignOut,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, Session>,
    current: Option<Session>,
    catalog: Vec<MovieDetail>,
    watched: Vec<WatchedEntry>,
    comments: Vec<Comment>,
    next_comment_id: u64,
    last_created_at: Option<DateTime<Utc>>,
    calls: HashMap<MemoryOp, usize>,
    failures: HashMap<MemoryOp, Vec<GatewayError>>,
}

impl MemoryState {
    /// Count the call and pop an injected failure, if any
    fn enter(&mut self, op: MemoryOp) -> Result<(), GatewayError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.failures.get_mut(&op) {
            Some(queue) if !queue.is_empty() => Err(queue.remove(0)),
            _ => Ok(()),
        }
    }

    fn signed_in(&self) -> Result<&Session, GatewayError> {
        self.current.as_ref().ok_or(GatewayError::Unauthorized)
    }

    /// Strictly increasing timestamps keep newest-first ordering stable
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_created_at {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_created_at = Some(stamp);
        stamp
    }
}

#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
    events: SessionEvents,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn register_user(&self, user_id: &str, email: &str) {
        self.state()
            .users
            .insert(user_id.to_string(), Session::new(user_id, email));
    }

    /// Make `user_id` the signed-in identity and notify subscribers
    pub fn sign_in_as(&self, user_id: &str) -> Result<Session, GatewayError> {
        let session = {
            let mut state = self.state();
            let session = state
                .users
                .get(user_id)
                .cloned()
                .ok_or(GatewayError::Unauthorized)?;
            state.current = Some(session.clone());
            session
        };
        self.events.notify(Some(session.clone()));
        Ok(session)
    }

    /// Simulate the identity provider expiring the session
    pub fn expire_session(&self) {
        self.state().current = None;
        self.events.notify(None);
    }

    pub fn add_movie(&self, detail: MovieDetail) {
        self.state().catalog.push(detail);
    }

    /// Seed a row directly, bypassing ownership checks
    pub fn seed_watched(&self, entry: WatchedEntry) {
        let mut state = self.state();
        let mut entry = entry.normalized();
        if entry.created_at.is_none() {
            entry.created_at = Some(state.next_timestamp());
        }
        state.watched.push(entry);
    }

    /// Seed a comment directly, bypassing ownership checks
    pub fn seed_comment(&self, movie_id: &str, author_id: &str, body: &str) -> Comment {
        let mut state = self.state();
        state.next_comment_id += 1;
        let comment = Comment {
            id: state.next_comment_id.to_string(),
            movie_external_id: normalize_external_id(movie_id),
            author_id: author_id.to_string(),
            body: body.to_string(),
            created_at: state.next_timestamp(),
        };
        state.comments.push(comment.clone());
        comment
    }

    /// Queue a one-shot failure for the next call of `op`
    pub fn fail_next(&self, op: MemoryOp, error: GatewayError) {
        self.state().failures.entry(op).or_default().push(error);
    }

    pub fn calls(&self, op: MemoryOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Every persisted watched row, regardless of owner
    pub fn all_watched(&self) -> Vec<WatchedEntry> {
        self.state().watched.clone()
    }

    pub fn all_comments(&self) -> Vec<Comment> {
        self.state().comments.clone()
    }
}

#[async_trait]
impl MovieProvider for InMemoryBackend {
    async fn search(&self, title: &str) -> Result<Vec<MovieSummary>, GatewayError> {
        let mut state = self.state();
        state.enter(MemoryOp::Search)?;
        let needle = title.trim().to_lowercase();
        let hits: Vec<MovieSummary> = state
            .catalog
            .iter()
            .filter(|movie| movie.title.to_lowercase().contains(&needle))
            .map(MovieDetail::summary)
            .collect();
        if hits.is_empty() {
            return Err(GatewayError::provider("Movie not found!"));
        }
        Ok(hits)
    }

    async fn fetch_by_id(&self, external_id: &str) -> Result<MovieDetail, GatewayError> {
        let mut state = self.state();
        state.enter(MemoryOp::FetchById)?;
        state
            .catalog
            .iter()
            .find(|movie| same_external_id(&movie.external_id, external_id))
            .cloned()
            .ok_or_else(|| GatewayError::provider("Incorrect IMDb ID."))
    }
}

#[async_trait]
impl WatchedRepository for InMemoryBackend {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<WatchedEntry>, GatewayError> {
        let mut state = self.state();
        state.enter(MemoryOp::ListWatched)?;
        let viewer = state.signed_in()?.user_id.clone();
        let mut rows: Vec<WatchedEntry> = state
            .watched
            .iter()
            .filter(|row| row.owner_id == viewer && row.owner_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert(&self, entry: &WatchedEntry) -> Result<WatchedEntry, GatewayError> {
        let mut state = self.state();
        state.enter(MemoryOp::InsertWatched)?;
        let viewer = state.signed_in()?.user_id.clone();
        if entry.owner_id != viewer {
            return Err(GatewayError::Forbidden("cannot write another user's list".to_string()));
        }
        let duplicate = state
            .watched
            .iter()
            .any(|row| row.owner_id == viewer && row.matches(&entry.external_id));
        if duplicate {
            return Err(GatewayError::Status {
                status: 409,
                message: "duplicate key value violates unique constraint".to_string(),
            });
        }

        let mut row = entry.clone().normalized();
        row.created_at = Some(state.next_timestamp());
        state.watched.push(row.clone());
        debug!(external_id = %row.external_id, "Stored watched entry");
        Ok(row)
    }

    async fn delete_by_key(&self, user_id: &str, external_id: &str) -> Result<u64, GatewayError> {
        let mut state = self.state();
        state.enter(MemoryOp::DeleteWatched)?;
        let viewer = state.signed_in()?.user_id.clone();
        let before = state.watched.len();
        state
            .watched
            .retain(|row| !(row.owner_id == viewer && row.owner_id == user_id && row.matches(external_id)));
        Ok((before - state.watched.len()) as u64)
    }
}

#[async_trait]
impl CommentRepository for InMemoryBackend {
    async fn list_for_movie(&self, movie_id: &str) -> Result<Vec<Comment>, GatewayError> {
        let mut state = self.state();
        state.enter(MemoryOp::ListComments)?;
        let mut comments: Vec<Comment> = state
            .comments
            .iter()
            .filter(|c| same_external_id(&c.movie_external_id, movie_id))
            .cloned()
            .collect();
        sort_newest_first(&mut comments);
        Ok(comments)
    }

    async fn insert(&self, movie_id: &str, author_id: &str, body: &str) -> Result<Comment, GatewayError> {
        {
            let mut state = self.state();
            state.enter(MemoryOp::InsertComment)?;
            if state.signed_in()?.user_id != author_id {
                return Err(GatewayError::Forbidden("cannot comment as another user".to_string()));
            }
            if body.trim().is_empty() {
                return Err(GatewayError::Status {
                    status: 400,
                    message: "Comment cannot be empty.".to_string(),
                });
            }
        }
        Ok(self.seed_comment(movie_id, author_id, body))
    }

    async fn delete_by_id(&self, comment_id: &str) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.enter(MemoryOp::DeleteComment)?;
        let viewer = state.signed_in()?.user_id.clone();
        let position = state
            .comments
            .iter()
            .position(|c| c.id == comment_id)
            .ok_or(GatewayError::NotFound)?;
        if state.comments[position].author_id != viewer {
            return Err(GatewayError::Forbidden("only the author may delete a comment".to_string()));
        }
        state.comments.remove(position);
        Ok(())
    }

    async fn resolve_authors(&self, author_ids: &[String]) -> Result<HashMap<String, String>, GatewayError> {
        let mut state = self.state();
        state.enter(MemoryOp::ResolveAuthors)?;
        Ok(author_ids
            .iter()
            .filter_map(|id| state.users.get(id).map(|user| (id.clone(), user.email.clone())))
            .collect())
    }
}

#[async_trait]
impl IdentityService for InMemoryBackend {
    async fn current_session(&self) -> Result<Option<Session>, GatewayError> {
        Ok(self.state().current.clone())
    }

    fn on_session_change(&self, handler: SessionHandler) -> Subscription {
        self.events.subscribe(handler)
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        {
            let mut state = self.state();
            state.enter(MemoryOp::SignOut)?;
            state.current = None;
        }
        self.events.notify(None);
        Ok(())
    }
}

#[async_trait]
impl PasswordSignIn for InMemoryBackend {
    async fn sign_in_with_password(&self, email: &str, _password: &str) -> Result<Session, GatewayError> {
        let user_id = self
            .state()
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .map(|user| user.user_id.clone())
            .ok_or(GatewayError::Unauthorized)?;
        self.sign_in_as(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, owner: &str) -> WatchedEntry {
        WatchedEntry {
            external_id: id.to_string(),
            title: id.to_string(),
            year: "1994".to_string(),
            poster_url: None,
            external_rating: None,
            user_rating: Some(8),
            runtime_minutes: None,
            rating_revision_count: 0,
            owner_id: owner.to_string(),
            created_at: None,
        }
    }

    fn backend() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend.register_user("ana", "ana@example.com");
        backend.register_user("ben", "ben@example.com");
        backend
    }

    #[tokio::test]
    async fn test_watched_rows_are_private_to_owner() {
        let backend = backend();
        backend.sign_in_as("ana").unwrap();
        WatchedRepository::insert(&backend, &entry("tt0110912", "ana")).await.unwrap();

        backend.sign_in_as("ben").unwrap();
        assert!(backend.list_for_user("ana").await.unwrap().is_empty());
        assert_eq!(backend.delete_by_key("ana", "tt0110912").await.unwrap(), 0);
        assert!(WatchedRepository::insert(&backend, &entry("tt1", "ana")).await.is_err());
        assert_eq!(backend.all_watched().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected_case_insensitively() {
        let backend = backend();
        backend.sign_in_as("ana").unwrap();
        WatchedRepository::insert(&backend, &entry("tt0110912", "ana")).await.unwrap();
        let err = WatchedRepository::insert(&backend, &entry("TT0110912", "ana")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Status { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_non_author_comment_delete_is_rejected() {
        let backend = backend();
        let comment = backend.seed_comment("tt0110912", "ana", "mine");
        backend.sign_in_as("ben").unwrap();

        let err = backend.delete_by_id(&comment.id).await.unwrap_err();
        assert!(matches!(err, GatewayError::Forbidden(_)));
        assert_eq!(backend.all_comments().len(), 1);
    }

    #[tokio::test]
    async fn test_comments_list_newest_first() {
        let backend = backend();
        backend.seed_comment("tt0110912", "ana", "first");
        backend.seed_comment("TT0110912", "ben", "second");
        backend.seed_comment("tt9999999", "ben", "elsewhere");

        let comments = backend.list_for_movie("tt0110912").await.unwrap();
        let bodies: Vec<&str> = comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let backend = backend();
        backend.fail_next(MemoryOp::Search, GatewayError::Transport("offline".to_string()));
        assert!(backend.search("anything").await.is_err());
        assert_eq!(
            backend.search("anything").await.unwrap_err(),
            GatewayError::provider("Movie not found!")
        );
        assert_eq!(backend.calls(MemoryOp::Search), 2);
    }

    #[tokio::test]
    async fn test_resolve_authors_omits_unknown_ids() {
        let backend = backend();
        let authors = backend
            .resolve_authors(&["ana".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors["ana"], "ana@example.com");
    }
}
