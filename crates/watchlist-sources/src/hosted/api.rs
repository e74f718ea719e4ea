use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use watchlist_models::{Comment, Session, WatchedEntry};
use crate::error::GatewayError;

pub(crate) const WATCHED_TABLE: &str = "/rest/v1/watched";
pub(crate) const COMMENTS_TABLE: &str = "/rest/v1/comments";
pub(crate) const AUTHOR_EMAILS_RPC: &str = "/rest/v1/rpc/get_emails_for_user_ids";
pub(crate) const TOKEN_ENDPOINT: &str = "/auth/v1/token";
pub(crate) const USER_ENDPOINT: &str = "/auth/v1/user";
pub(crate) const LOGOUT_ENDPOINT: &str = "/auth/v1/logout";

/// Row of the `watched` table
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WatchedRow {
    #[serde(rename = "imdbID")]
    imdb_id: String,
    title: String,
    #[serde(default)]
    year: String,
    poster: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<f32>,
    #[serde(rename = "userRating")]
    user_rating: Option<u8>,
    runtime: Option<u32>,
    #[serde(rename = "countRatingDecisions", default)]
    count_rating_decisions: u32,
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl From<&WatchedEntry> for WatchedRow {
    fn from(entry: &WatchedEntry) -> Self {
        Self {
            imdb_id: entry.external_id.clone(),
            title: entry.title.clone(),
            year: entry.year.clone(),
            poster: entry.poster_url.clone(),
            imdb_rating: entry.external_rating,
            user_rating: entry.user_rating,
            runtime: entry.runtime_minutes,
            count_rating_decisions: entry.rating_revision_count,
            user_id: entry.owner_id.clone(),
            created_at: None,
        }
    }
}

impl From<WatchedRow> for WatchedEntry {
    fn from(row: WatchedRow) -> Self {
        WatchedEntry {
            external_id: row.imdb_id,
            title: row.title,
            year: row.year,
            poster_url: row.poster,
            external_rating: row.imdb_rating,
            user_rating: row.user_rating,
            runtime_minutes: row.runtime,
            rating_revision_count: row.count_rating_decisions,
            owner_id: row.user_id,
            created_at: row.created_at,
        }
        .normalized()
    }
}

/// Row of the `comments` table
#[derive(Debug, Deserialize)]
pub(crate) struct CommentRow {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
    movie_id: String,
    user_id: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            movie_external_id: row.movie_id,
            author_id: row.user_id,
            body: row.content,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NewCommentRow<'a> {
    pub movie_id: &'a str,
    pub user_id: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthorEmailRow {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthUser {
    pub fn into_session(self) -> Session {
        Session::new(self.id, self.email.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

/// Comment ids may be bigint or uuid columns
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unsupported id: {}", other))),
    }
}

/// PostgREST `eq.` filter value
pub(crate) fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// Turn a non-success response into a `GatewayError`, otherwise hand it back
pub(crate) async fn check(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let error_text = response.text().await.unwrap_or_default();
    Err(GatewayError::from_status(status, error_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watched_row_round_trip_uses_table_columns() {
        let entry = WatchedEntry {
            external_id: "tt0110912".to_string(),
            title: "Pulp Fiction".to_string(),
            year: "1994".to_string(),
            poster_url: None,
            external_rating: Some(8.9),
            user_rating: Some(9),
            runtime_minutes: Some(154),
            rating_revision_count: 3,
            owner_id: "user-1".to_string(),
            created_at: None,
        };
        let json = serde_json::to_value(WatchedRow::from(&entry)).unwrap();
        assert_eq!(json["imdbID"], "tt0110912");
        assert_eq!(json["countRatingDecisions"], 3);
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn test_watched_row_id_is_normalized() {
        let json = r#"{"imdbID": "TT0110912", "title": "Pulp Fiction", "year": "1994",
            "poster": null, "imdbRating": 8.9, "userRating": 9, "runtime": 154,
            "user_id": "user-1", "created_at": "2024-05-01T12:00:00Z"}"#;
        let row: WatchedRow = serde_json::from_str(json).unwrap();
        let entry = WatchedEntry::from(row);
        assert_eq!(entry.external_id, "tt0110912");
        assert_eq!(entry.rating_revision_count, 0);
        assert!(entry.created_at.is_some());
    }

    #[test]
    fn test_comment_row_accepts_numeric_id() {
        let json = r#"{"id": 42, "movie_id": "tt0110912", "user_id": "user-1",
            "content": "Great", "created_at": "2024-05-01T12:00:00+00:00"}"#;
        let row: CommentRow = serde_json::from_str(json).unwrap();
        let comment = Comment::from(row);
        assert_eq!(comment.id, "42");
        assert_eq!(comment.body, "Great");
    }

    #[test]
    fn test_eq_filter() {
        assert_eq!(eq("tt0110912"), "eq.tt0110912");
    }
}
