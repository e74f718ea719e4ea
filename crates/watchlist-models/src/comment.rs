use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    /// Server-assigned
    pub id: String,
    pub movie_external_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }
}

/// Sort newest first, the order threads are displayed in
pub fn sort_newest_first(comments: &mut [Comment]) {
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
