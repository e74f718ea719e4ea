//! Comment thread of the selected movie.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use watchlist_models::{normalize_external_id, Comment, Session};
use watchlist_sources::{CommentRepository, GatewayError};
use crate::error::{SyncError, ValidationError};

/// Shown for authors whose display name could not be resolved
pub const AUTHOR_PLACEHOLDER: &str = "...";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadState {
    pub movie_id: Option<String>,
    /// Newest first
    pub comments: Vec<Comment>,
    /// Author id to display name
    pub authors: HashMap<String, String>,
    pub draft: String,
    pub posting: bool,
}

/// A comment as presented to one viewer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub comment: Comment,
    pub author_label: String,
    pub can_delete: bool,
}

#[derive(Default)]
struct Guarded {
    thread: ThreadState,
    /// Bumped on every selection change
    epoch: u64,
}

pub struct CommentThread {
    repository: Arc<dyn CommentRepository>,
    guarded: Mutex<Guarded>,
    state: watch::Sender<ThreadState>,
}

impl CommentThread {
    pub fn new(repository: Arc<dyn CommentRepository>) -> Self {
        let (state, _) = watch::channel(ThreadState::default());
        Self {
            repository,
            guarded: Mutex::new(Guarded::default()),
            state,
        }
    }

    fn guarded(&self) -> MutexGuard<'_, Guarded> {
        self.guarded.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn publish(&self, guarded: &Guarded) {
        self.state.send_replace(guarded.thread.clone());
    }

    pub fn state(&self) -> ThreadState {
        self.guarded().thread.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ThreadState> {
        self.state.subscribe()
    }

    pub fn draft(&self) -> String {
        self.guarded().thread.draft.clone()
    }

    pub fn set_draft(&self, text: &str) {
        let mut guarded = self.guarded();
        guarded.thread.draft = text.to_string();
        self.publish(&guarded);
    }

    /// Reset the thread to `movie_id` and fetch its comments and authors
    pub async fn select(&self, movie_id: &str) -> Result<(), SyncError> {
        let movie_id = normalize_external_id(movie_id);
        let epoch = {
            let mut guarded = self.guarded();
            guarded.epoch += 1;
            guarded.thread = ThreadState {
                movie_id: Some(movie_id.clone()),
                ..ThreadState::default()
            };
            self.publish(&guarded);
            guarded.epoch
        };

        let comments = match self.repository.list_for_movie(&movie_id).await {
            Ok(comments) => comments,
            Err(e) => {
                error!(movie_id = %movie_id, "Failed to fetch comments: {}", e);
                return Err(e.into());
            }
        };
        debug!(movie_id = %movie_id, count = comments.len(), "Fetched comments");

        let author_ids: Vec<String> = comments
            .iter()
            .map(|c| c.author_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        {
            let mut guarded = self.guarded();
            if guarded.epoch != epoch {
                return Ok(());
            }
            guarded.thread.comments = comments;
            self.publish(&guarded);
        }
        if author_ids.is_empty() {
            return Ok(());
        }

        let authors = match self.repository.resolve_authors(&author_ids).await {
            Ok(authors) => authors,
            Err(e) => {
                warn!(movie_id = %movie_id, "Author lookup failed, showing placeholders: {}", e);
                return Ok(());
            }
        };
        let mut guarded = self.guarded();
        if guarded.epoch == epoch {
            guarded.thread.authors = authors;
            self.publish(&guarded);
        }
        Ok(())
    }

    /// Post `body` as `author` to the selected movie
    pub async fn post(&self, author: &Session, body: &str) -> Result<Comment, SyncError> {
        let body = body.trim();
        let (movie_id, epoch) = {
            let mut guarded = self.guarded();
            let movie_id = guarded
                .thread
                .movie_id
                .clone()
                .ok_or(ValidationError::NoSelection)?;
            if body.is_empty() {
                return Err(ValidationError::EmptyComment.into());
            }
            if guarded.thread.posting {
                return Err(ValidationError::PostInFlight.into());
            }
            guarded.thread.posting = true;
            self.publish(&guarded);
            (movie_id, guarded.epoch)
        };

        let result = self.repository.insert(&movie_id, &author.user_id, body).await;

        let mut guarded = self.guarded();
        let live = guarded.epoch == epoch;
        if live {
            guarded.thread.posting = false;
        }
        match result {
            Ok(comment) => {
                if live {
                    guarded.thread.comments.insert(0, comment.clone());
                    guarded
                        .thread
                        .authors
                        .entry(author.user_id.clone())
                        .or_insert_with(|| author.email.clone());
                    guarded.thread.draft.clear();
                    self.publish(&guarded);
                }
                info!(movie_id = %movie_id, comment_id = %comment.id, "Posted comment");
                Ok(comment)
            }
            Err(e) => {
                if live {
                    self.publish(&guarded);
                }
                error!(movie_id = %movie_id, "Failed to post comment: {}", e);
                Err(e.into())
            }
        }
    }

    /// Delete one of `viewer`'s own comments
    pub async fn delete(&self, viewer: &Session, comment_id: &str) -> Result<(), SyncError> {
        let (removed, epoch) = {
            let mut guarded = self.guarded();
            let index = guarded
                .thread
                .comments
                .iter()
                .position(|c| c.id == comment_id)
                .ok_or_else(|| SyncError::Authorization(format!("comment {} is not in this thread", comment_id)))?;
            if !guarded.thread.comments[index].is_authored_by(&viewer.user_id) {
                return Err(SyncError::Authorization(
                    "only the author may delete a comment".to_string(),
                ));
            }
            let removed = guarded.thread.comments.remove(index);
            self.publish(&guarded);
            ((index, removed), guarded.epoch)
        };

        match self.repository.delete_by_id(comment_id).await {
            Ok(()) => {
                info!(comment_id, "Deleted comment");
                Ok(())
            }
            Err(GatewayError::NotFound) => {
                warn!(comment_id, "Comment was already gone from the store");
                Ok(())
            }
            Err(e) => {
                let mut guarded = self.guarded();
                if guarded.epoch == epoch {
                    let (index, comment) = removed;
                    let index = index.min(guarded.thread.comments.len());
                    guarded.thread.comments.insert(index, comment);
                    self.publish(&guarded);
                }
                error!(comment_id, "Failed to delete comment: {}", e);
                Err(e.into())
            }
        }
    }

    /// The thread as seen by `viewer`; only their own comments are deletable
    pub fn views(&self, viewer: Option<&Session>) -> Vec<CommentView> {
        let guarded = self.guarded();
        guarded
            .thread
            .comments
            .iter()
            .map(|comment| CommentView {
                author_label: guarded
                    .thread
                    .authors
                    .get(&comment.author_id)
                    .cloned()
                    .unwrap_or_else(|| AUTHOR_PLACEHOLDER.to_string()),
                can_delete: viewer.map_or(false, |v| comment.is_authored_by(&v.user_id)),
                comment: comment.clone(),
            })
            .collect()
    }

    /// Drop the selection and everything fetched for it, without any calls
    pub fn clear(&self) {
        let mut guarded = self.guarded();
        guarded.epoch += 1;
        guarded.thread = ThreadState::default();
        self.publish(&guarded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seeded_backend, SlowComments};
    use std::time::Duration;
    use watchlist_sources::{InMemoryBackend, MemoryOp};

    const MOVIE: &str = "tt0110912";

    fn ana() -> Session {
        Session::new("ana", "ana@example.com")
    }

    fn ben() -> Session {
        Session::new("ben", "ben@example.com")
    }

    async fn thread_for(backend: &Arc<InMemoryBackend>, user: &str) -> CommentThread {
        backend.sign_in_as(user).unwrap();
        let thread = CommentThread::new(backend.clone());
        thread.select(MOVIE).await.unwrap();
        thread
    }

    #[tokio::test]
    async fn test_select_resolves_authors_in_one_batch() {
        let backend = seeded_backend();
        backend.seed_comment(MOVIE, "ana", "first");
        backend.seed_comment(MOVIE, "ben", "second");
        backend.seed_comment(MOVIE, "ana", "third");

        let thread = thread_for(&backend, "ana").await;
        let views = thread.views(Some(&ana()));

        let bodies: Vec<&str> = views.iter().map(|v| v.comment.body.as_str()).collect();
        assert_eq!(bodies, vec!["third", "second", "first"]);
        assert_eq!(views[1].author_label, "ben@example.com");
        assert_eq!(backend.calls(MemoryOp::ResolveAuthors), 1);
    }

    #[tokio::test]
    async fn test_empty_thread_skips_author_lookup() {
        let backend = seeded_backend();
        let thread = thread_for(&backend, "ana").await;
        assert!(thread.state().comments.is_empty());
        assert_eq!(backend.calls(MemoryOp::ResolveAuthors), 0);
    }

    #[tokio::test]
    async fn test_author_lookup_failure_uses_placeholder() {
        let backend = seeded_backend();
        backend.seed_comment(MOVIE, "ben", "hello");
        backend.fail_next(MemoryOp::ResolveAuthors, GatewayError::Transport("offline".to_string()));

        let thread = thread_for(&backend, "ana").await;
        let views = thread.views(Some(&ana()));
        assert_eq!(views[0].author_label, AUTHOR_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_empty_post_is_rejected_without_a_call() {
        let backend = seeded_backend();
        let thread = thread_for(&backend, "ana").await;

        for body in ["", "   \n"] {
            let err = thread.post(&ana(), body).await.unwrap_err();
            assert_eq!(err, SyncError::Validation(ValidationError::EmptyComment));
        }
        assert_eq!(backend.calls(MemoryOp::InsertComment), 0);
    }

    #[tokio::test]
    async fn test_post_prepends_and_clears_draft() {
        let backend = seeded_backend();
        backend.seed_comment(MOVIE, "ben", "older");
        let thread = thread_for(&backend, "ana").await;
        thread.set_draft("Royale with cheese");

        let comment = thread.post(&ana(), &thread.draft()).await.unwrap();
        let state = thread.state();
        assert_eq!(state.comments[0], comment);
        assert_eq!(state.comments.len(), 2);
        assert_eq!(state.authors["ana"], "ana@example.com");
        assert!(state.draft.is_empty());
        assert!(!state.posting);
        assert_eq!(backend.calls(MemoryOp::ListComments), 1);
    }

    #[tokio::test]
    async fn test_failed_post_keeps_draft() {
        let backend = seeded_backend();
        let thread = thread_for(&backend, "ana").await;
        thread.set_draft("keep me");
        backend.fail_next(MemoryOp::InsertComment, GatewayError::Transport("offline".to_string()));

        assert!(thread.post(&ana(), "keep me").await.is_err());
        let state = thread.state();
        assert_eq!(state.draft, "keep me");
        assert!(state.comments.is_empty());
        assert!(!state.posting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_post_while_pending_is_rejected() {
        let backend = seeded_backend();
        backend.sign_in_as("ana").unwrap();
        let thread = Arc::new(CommentThread::new(Arc::new(SlowComments {
            inner: backend.clone(),
            delay: Duration::from_millis(500),
        })));
        thread.select(MOVIE).await.unwrap();

        let first = tokio::spawn({
            let thread = thread.clone();
            async move { thread.post(&ana(), "first").await }
        });
        let mut state = thread.subscribe();
        state.wait_for(|s| s.posting).await.unwrap();

        let err = thread.post(&ana(), "second").await.unwrap_err();
        assert_eq!(err, SyncError::Validation(ValidationError::PostInFlight));

        let posted = first.await.unwrap().unwrap();
        assert_eq!(posted.body, "first");
        assert_eq!(backend.calls(MemoryOp::InsertComment), 1);
        let state = thread.state();
        assert_eq!(state.comments.len(), 1);
        assert!(!state.posting);
    }

    #[tokio::test]
    async fn test_post_without_selection_is_rejected() {
        let backend = seeded_backend();
        let thread = CommentThread::new(backend.clone());
        let err = thread.post(&ana(), "hello").await.unwrap_err();
        assert_eq!(err, SyncError::Validation(ValidationError::NoSelection));
    }

    #[tokio::test]
    async fn test_non_author_cannot_delete() {
        let backend = seeded_backend();
        let theirs = backend.seed_comment(MOVIE, "ana", "mine");
        let thread = thread_for(&backend, "ben").await;

        let views = thread.views(Some(&ben()));
        assert!(!views[0].can_delete);

        let err = thread.delete(&ben(), &theirs.id).await.unwrap_err();
        assert!(matches!(err, SyncError::Authorization(_)));
        assert_eq!(thread.state().comments.len(), 1);
        assert_eq!(backend.calls(MemoryOp::DeleteComment), 0);

        let direct = backend.delete_by_id(&theirs.id).await.unwrap_err();
        assert!(matches!(direct, GatewayError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_author_deletes_own_comment() {
        let backend = seeded_backend();
        let mine = backend.seed_comment(MOVIE, "ana", "mine");
        let thread = thread_for(&backend, "ana").await;
        assert!(thread.views(Some(&ana()))[0].can_delete);

        thread.delete(&ana(), &mine.id).await.unwrap();
        assert!(thread.state().comments.is_empty());
        assert!(backend.all_comments().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_restores_comment() {
        let backend = seeded_backend();
        backend.seed_comment(MOVIE, "ana", "one");
        let mine = backend.seed_comment(MOVIE, "ana", "two");
        backend.seed_comment(MOVIE, "ana", "three");
        let thread = thread_for(&backend, "ana").await;
        let before = thread.state().comments;
        backend.fail_next(MemoryOp::DeleteComment, GatewayError::Transport("offline".to_string()));

        assert!(thread.delete(&ana(), &mine.id).await.is_err());
        assert_eq!(thread.state().comments, before);
    }

    #[tokio::test]
    async fn test_signed_out_viewer_sees_nothing_deletable() {
        let backend = seeded_backend();
        backend.seed_comment(MOVIE, "ana", "mine");
        let thread = thread_for(&backend, "ana").await;
        assert!(thread.views(None).iter().all(|v| !v.can_delete));
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let backend = seeded_backend();
        backend.seed_comment(MOVIE, "ana", "mine");
        let thread = thread_for(&backend, "ana").await;
        thread.set_draft("half written");

        thread.clear();
        assert_eq!(thread.state(), ThreadState::default());
    }
}
