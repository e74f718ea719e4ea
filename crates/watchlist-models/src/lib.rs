pub mod comment;
pub mod external_id;
pub mod movie;
pub mod session;
pub mod summary;
pub mod watched;

pub use comment::{sort_newest_first, Comment};
pub use external_id::{normalize_external_id, same_external_id};
pub use movie::{parse_poster, parse_rating, parse_runtime_minutes, MovieDetail, MovieSummary};
pub use session::Session;
pub use summary::WatchedSummary;
pub use watched::WatchedEntry;
