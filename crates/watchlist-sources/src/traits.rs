use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use watchlist_models::{Comment, MovieDetail, MovieSummary, Session, WatchedEntry};
use crate::error::GatewayError;

/// Called with the new session value on every identity change
pub type SessionHandler = Arc<dyn Fn(Option<Session>) + Send + Sync>;

/// Third-party movie metadata lookup
#[async_trait]
pub trait MovieProvider: Send + Sync {
    /// Title search. A provider-side "no results" is reported as
    /// `GatewayError::Provider`, never as an empty list.
    async fn search(&self, title: &str) -> Result<Vec<MovieSummary>, GatewayError>;
    async fn fetch_by_id(&self, external_id: &str) -> Result<MovieDetail, GatewayError>;
}

/// Persistent watch-list rows. Ownership is enforced by the store.
#[async_trait]
pub trait WatchedRepository: Send + Sync {
    /// Newest first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<WatchedEntry>, GatewayError>;
    async fn insert(&self, entry: &WatchedEntry) -> Result<WatchedEntry, GatewayError>;
    /// Returns how many rows were deleted; zero means nothing matched
    async fn delete_by_key(&self, user_id: &str, external_id: &str) -> Result<u64, GatewayError>;
}

/// Persistent comment rows. Deleting someone else's comment is rejected.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Newest first
    async fn list_for_movie(&self, movie_id: &str) -> Result<Vec<Comment>, GatewayError>;
    async fn insert(&self, movie_id: &str, author_id: &str, body: &str) -> Result<Comment, GatewayError>;
    async fn delete_by_id(&self, comment_id: &str) -> Result<(), GatewayError>;
    /// Display names (emails) for a batch of user ids; unknown ids are omitted
    async fn resolve_authors(&self, author_ids: &[String]) -> Result<HashMap<String, String>, GatewayError>;
}

/// Who is signed in
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>, GatewayError>;
    /// Handlers stay registered until the returned subscription is dropped
    fn on_session_change(&self, handler: SessionHandler) -> Subscription;
    async fn sign_out(&self) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait PasswordSignIn: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, GatewayError>;
}

/// Handle for a registered session handler; unsubscribes when dropped
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription with nothing to undo
    pub fn noop() -> Self {
        Self { unsubscribe: None }
    }

    pub fn unsubscribe(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
