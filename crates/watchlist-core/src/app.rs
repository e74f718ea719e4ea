//! Facade wiring the controllers together for a presentation layer.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};
use watchlist_models::{normalize_external_id, MovieDetail, Session, WatchedEntry, WatchedSummary};
use watchlist_sources::Gateways;
use crate::comments::{CommentThread, CommentView, ThreadState};
use crate::error::{SyncError, ValidationError};
use crate::search::{SearchController, SearchOptions, SearchState};
use crate::session::SessionController;
use crate::watched::WatchedStore;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;

/// The movie currently open in the detail view
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub external_id: String,
    /// None until the provider answers
    pub detail: Option<MovieDetail>,
    pub user_rating: Option<u8>,
    /// How many times the rating was changed since the movie was opened
    pub rating_revision_count: u32,
}

impl Selection {
    fn new(external_id: String) -> Self {
        Self {
            external_id,
            detail: None,
            user_rating: None,
            rating_revision_count: 0,
        }
    }
}

pub struct WatchlistApp {
    gateways: Gateways,
    search: SearchController,
    watched: Arc<WatchedStore>,
    comments: Arc<CommentThread>,
    session: SessionController,
    selection: watch::Sender<Option<Selection>>,
}

impl WatchlistApp {
    pub fn new(gateways: Gateways, search_options: SearchOptions) -> Self {
        let (selection, _) = watch::channel(None);
        Self {
            search: SearchController::new(gateways.provider.clone(), search_options),
            watched: Arc::new(WatchedStore::new(gateways.watched.clone())),
            comments: Arc::new(CommentThread::new(gateways.comments.clone())),
            session: SessionController::new(gateways.identity.clone()),
            selection,
            gateways,
        }
    }

    /// Resolve the session, load its watched list and start following
    /// identity changes.
    ///
    /// Sign-out clearing is wired before anything else, so a failed initial
    /// load still leaves the app following the session.
    pub async fn start(&self) -> Result<Option<Session>, SyncError> {
        let watched = self.watched.clone();
        let comments = self.comments.clone();
        self.session.on_signed_out(Arc::new(move || {
            watched.clear();
            comments.clear();
        }));

        self.session.start().await?;

        let watched = self.watched.clone();
        self.session.on_signed_in(Arc::new(move |session: &Session| {
            let watched = watched.clone();
            let user_id = session.user_id.clone();
            tokio::spawn(async move {
                if let Err(e) = watched.load(&user_id).await {
                    warn!(user_id = %user_id, "Could not load watched list: {}", e);
                }
            });
        }));

        // A sign-in between resolving and registering above is picked up here
        let session = self.session.current();
        if let Some(session) = session.as_ref() {
            self.watched.load(&session.user_id).await?;
        }
        Ok(session)
    }

    pub fn session(&self) -> Option<Session> {
        self.session.current()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    fn require_session(&self) -> Result<Session, SyncError> {
        self.session.current().ok_or(SyncError::SignedOut)
    }

    // Search

    pub fn set_query(&self, text: &str) {
        self.search.set_query(text);
    }

    pub fn search(&self) -> SearchState {
        self.search.state()
    }

    pub fn subscribe_search(&self) -> watch::Receiver<SearchState> {
        self.search.subscribe()
    }

    // Selection

    pub fn selection(&self) -> Option<Selection> {
        self.selection.borrow().clone()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Option<Selection>> {
        self.selection.subscribe()
    }

    fn is_selected(&self, external_id: &str) -> bool {
        self.selection
            .borrow()
            .as_ref()
            .map_or(false, |s| s.external_id == external_id)
    }

    /// Open a movie: fetch its detail and its comment thread concurrently.
    ///
    /// A comment thread failure is logged and leaves the thread empty; only a
    /// detail failure is returned.
    pub async fn select_movie(&self, external_id: &str) -> Result<MovieDetail, SyncError> {
        let external_id = normalize_external_id(external_id);
        self.selection.send_replace(Some(Selection::new(external_id.clone())));
        debug!(external_id = %external_id, "Selected movie");

        let (detail, thread) = futures::join!(
            self.gateways.provider.fetch_by_id(&external_id),
            self.comments.select(&external_id),
        );
        if let Err(e) = thread {
            warn!(external_id = %external_id, "Comments unavailable: {}", e);
        }

        let detail = detail.map_err(SyncError::from)?;
        if self.is_selected(&external_id) {
            self.selection.send_modify(|selection| {
                if let Some(selection) = selection.as_mut() {
                    selection.detail = Some(detail.clone());
                }
            });
        }
        Ok(detail)
    }

    pub fn close_movie(&self) {
        self.selection.send_replace(None);
        self.comments.clear();
    }

    /// Set the pending rating for the selected movie; each change of the
    /// rating counts as a rating decision, repeating the current one does not
    pub fn rate(&self, rating: u8) -> Result<(), SyncError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(ValidationError::RatingOutOfRange(rating).into());
        }
        let mut result: Result<(), SyncError> = Err(ValidationError::NoSelection.into());
        self.selection.send_if_modified(|selection| match selection.as_mut() {
            Some(selection) => {
                result = Ok(());
                if selection.user_rating == Some(rating) {
                    return false;
                }
                selection.user_rating = Some(rating);
                selection.rating_revision_count += 1;
                true
            }
            None => false,
        });
        result
    }

    /// Add the selected movie with its pending rating, then close it
    pub async fn rate_and_add(&self) -> Result<WatchedEntry, SyncError> {
        let session = self.require_session()?;
        let selection = self.selection().ok_or(ValidationError::NoSelection)?;
        let detail = selection.detail.as_ref().ok_or(ValidationError::NoSelection)?;
        let rating = selection.user_rating.ok_or(ValidationError::NoRating)?;

        let entry = WatchedEntry::from_detail(
            detail,
            &session.user_id,
            rating,
            selection.rating_revision_count,
        );
        let stored = self.watched.add(entry).await?;
        if self.is_selected(&selection.external_id) {
            self.close_movie();
        }
        Ok(stored)
    }

    // Watched list

    pub fn watched(&self) -> Vec<WatchedEntry> {
        self.watched.entries()
    }

    pub fn subscribe_watched(&self) -> watch::Receiver<Vec<WatchedEntry>> {
        self.watched.subscribe()
    }

    pub fn watched_summary(&self) -> WatchedSummary {
        self.watched.summary()
    }

    /// The user's stored rating when `external_id` is already watched
    pub fn watched_rating(&self, external_id: &str) -> Option<u8> {
        self.watched.rating_for(external_id)
    }

    pub fn is_watched(&self, external_id: &str) -> bool {
        self.watched.contains(external_id)
    }

    /// Add an entry built elsewhere (e.g. from a detail fetched by id)
    pub async fn add_watched(&self, entry: WatchedEntry) -> Result<WatchedEntry, SyncError> {
        self.require_session()?;
        self.watched.add(entry).await
    }

    pub async fn remove_watched(&self, external_id: &str) -> Result<(), SyncError> {
        self.require_session()?;
        self.watched.remove(external_id).await
    }

    // Comments

    pub fn comments(&self) -> ThreadState {
        self.comments.state()
    }

    pub fn subscribe_comments(&self) -> watch::Receiver<ThreadState> {
        self.comments.subscribe()
    }

    pub fn comment_views(&self) -> Vec<CommentView> {
        self.comments.views(self.session.current().as_ref())
    }

    pub fn set_comment_draft(&self, text: &str) {
        self.comments.set_draft(text);
    }

    pub async fn post_comment(&self, body: &str) -> Result<(), SyncError> {
        let session = self.require_session()?;
        self.comments.post(&session, body).await.map(|_| ())
    }

    pub async fn delete_comment(&self, comment_id: &str) -> Result<(), SyncError> {
        let session = self.require_session()?;
        self.comments.delete(&session, comment_id).await
    }

    // Session

    pub async fn sign_out(&self) -> Result<(), SyncError> {
        self.session.sign_out().await
    }

    /// Cancel pending lookups and stop following identity changes
    pub fn shutdown(&self) {
        self.search.shutdown();
        self.session.shutdown();
    }
}
