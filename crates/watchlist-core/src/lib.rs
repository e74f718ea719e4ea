pub mod app;
pub mod cancel;
pub mod comments;
pub mod error;
pub mod search;
pub mod session;
pub mod watched;

#[cfg(test)]
mod testing;

pub use app::{Selection, WatchlistApp, MAX_RATING, MIN_RATING};
pub use cancel::CancelToken;
pub use comments::{CommentThread, CommentView, ThreadState, AUTHOR_PLACEHOLDER};
pub use error::{SyncError, ValidationError};
pub use search::{SearchController, SearchOptions, SearchState, SearchStatus};
pub use session::{SessionController, SignedInListener, SignedOutListener};
pub use watched::WatchedStore;
