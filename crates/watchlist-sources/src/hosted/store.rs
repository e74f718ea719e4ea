use std::collections::HashMap;
use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;
use watchlist_models::{normalize_external_id, sort_newest_first, Comment, WatchedEntry};
use crate::error::GatewayError;
use crate::hosted::api::{self, eq, AuthorEmailRow, CommentRow, NewCommentRow, WatchedRow};
use crate::hosted::HostedBackend;
use crate::traits::{CommentRepository, WatchedRepository};

const RETURN_REPRESENTATION: (&str, &str) = ("Prefer", "return=representation");

/// `watched` and `comments` tables of the hosted project
#[derive(Clone)]
pub struct HostedStore {
    backend: HostedBackend,
}

impl HostedStore {
    pub fn new(backend: HostedBackend) -> Self {
        Self { backend }
    }

    fn first<T>(rows: Vec<T>, what: &str) -> Result<T, GatewayError> {
        rows.into_iter()
            .next()
            .ok_or_else(|| GatewayError::Decode(format!("{} insert returned no row", what)))
    }
}

/// Row-level security hides other users' rows, so an empty representation
/// means the comment is already gone or was never visible to this user
fn comment_deleted(comment_id: &str, rows: &[serde_json::Value]) -> Result<(), GatewayError> {
    if rows.is_empty() {
        debug!(comment_id, "Comment delete matched no rows");
        return Err(GatewayError::NotFound);
    }
    Ok(())
}

#[async_trait]
impl WatchedRepository for HostedStore {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<WatchedEntry>, GatewayError> {
        let response = self
            .backend
            .request(Method::GET, api::WATCHED_TABLE)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await?;
        let rows: Vec<WatchedRow> = self.backend.check(response).await?.json().await?;
        debug!(user_id, count = rows.len(), "Fetched watched entries");
        Ok(rows.into_iter().map(WatchedEntry::from).collect())
    }

    async fn insert(&self, entry: &WatchedEntry) -> Result<WatchedEntry, GatewayError> {
        let response = self
            .backend
            .request(Method::POST, api::WATCHED_TABLE)
            .header(RETURN_REPRESENTATION.0, RETURN_REPRESENTATION.1)
            .json(&[WatchedRow::from(entry)])
            .send()
            .await?;
        let rows: Vec<WatchedRow> = self.backend.check(response).await?.json().await?;
        Self::first(rows, "watched").map(WatchedEntry::from)
    }

    async fn delete_by_key(&self, user_id: &str, external_id: &str) -> Result<u64, GatewayError> {
        let response = self
            .backend
            .request(Method::DELETE, api::WATCHED_TABLE)
            .header(RETURN_REPRESENTATION.0, RETURN_REPRESENTATION.1)
            .query(&[
                ("user_id", eq(user_id)),
                ("imdbID", eq(&normalize_external_id(external_id))),
            ])
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = self.backend.check(response).await?.json().await?;
        Ok(rows.len() as u64)
    }
}

#[async_trait]
impl CommentRepository for HostedStore {
    async fn list_for_movie(&self, movie_id: &str) -> Result<Vec<Comment>, GatewayError> {
        let response = self
            .backend
            .request(Method::GET, api::COMMENTS_TABLE)
            .query(&[
                ("select", "id,created_at,content,user_id,movie_id".to_string()),
                ("movie_id", eq(&normalize_external_id(movie_id))),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await?;
        let rows: Vec<CommentRow> = self.backend.check(response).await?.json().await?;
        let mut comments: Vec<Comment> = rows.into_iter().map(Comment::from).collect();
        sort_newest_first(&mut comments);
        Ok(comments)
    }

    async fn insert(&self, movie_id: &str, author_id: &str, body: &str) -> Result<Comment, GatewayError> {
        let movie_id = normalize_external_id(movie_id);
        let response = self
            .backend
            .request(Method::POST, api::COMMENTS_TABLE)
            .header(RETURN_REPRESENTATION.0, RETURN_REPRESENTATION.1)
            .json(&NewCommentRow {
                movie_id: &movie_id,
                user_id: author_id,
                content: body,
            })
            .send()
            .await?;
        let rows: Vec<CommentRow> = self.backend.check(response).await?.json().await?;
        Self::first(rows, "comment").map(Comment::from)
    }

    async fn delete_by_id(&self, comment_id: &str) -> Result<(), GatewayError> {
        let response = self
            .backend
            .request(Method::DELETE, api::COMMENTS_TABLE)
            .header(RETURN_REPRESENTATION.0, RETURN_REPRESENTATION.1)
            .query(&[("id", eq(comment_id))])
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = self.backend.check(response).await?.json().await?;
        comment_deleted(comment_id, &rows)
    }

    async fn resolve_authors(&self, author_ids: &[String]) -> Result<HashMap<String, String>, GatewayError> {
        if author_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let response = self
            .backend
            .request(Method::POST, api::AUTHOR_EMAILS_RPC)
            .json(&serde_json::json!({ "user_ids": author_ids }))
            .send()
            .await?;
        let rows: Vec<AuthorEmailRow> = self.backend.check(response).await?.json().await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.email.map(|email| (row.id, email)))
            .collect())
    }
}
