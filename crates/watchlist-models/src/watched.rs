use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::external_id::{normalize_external_id, same_external_id};
use crate::movie::MovieDetail;

/// A movie the user has watched and rated.
///
/// Entries are never edited in place; removing and re-adding is the only
/// way to change one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchedEntry {
    pub external_id: String,
    pub title: String,
    pub year: String,
    pub poster_url: Option<String>,
    pub external_rating: Option<f32>,
    pub user_rating: Option<u8>,
    pub runtime_minutes: Option<u32>,
    /// How many times the user changed their mind before adding
    pub rating_revision_count: u32,
    pub owner_id: String,
    /// Assigned by the store; None until persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl WatchedEntry {
    /// Build an entry for `owner_id` from the selected movie's detail
    pub fn from_detail(
        detail: &MovieDetail,
        owner_id: &str,
        user_rating: u8,
        rating_revision_count: u32,
    ) -> Self {
        Self {
            external_id: normalize_external_id(&detail.external_id),
            title: detail.title.clone(),
            year: detail.year.clone(),
            poster_url: detail.poster_url.clone(),
            external_rating: detail.external_rating,
            user_rating: Some(user_rating),
            runtime_minutes: detail.runtime_minutes,
            rating_revision_count,
            owner_id: owner_id.to_string(),
            created_at: None,
        }
    }

    pub fn matches(&self, external_id: &str) -> bool {
        same_external_id(&self.external_id, external_id)
    }

    /// Copy of this entry with the id in canonical form
    pub fn normalized(mut self) -> Self {
        self.external_id = normalize_external_id(&self.external_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(id: &str) -> MovieDetail {
        MovieDetail {
            external_id: id.to_string(),
            title: "Pulp Fiction".to_string(),
            year: "1994".to_string(),
            poster_url: None,
            runtime_minutes: Some(154),
            external_rating: Some(8.9),
            plot: String::new(),
            released: String::new(),
            actors: String::new(),
            director: String::new(),
            genre: String::new(),
        }
    }

    #[test]
    fn test_from_detail_normalizes_id() {
        let entry = WatchedEntry::from_detail(&detail("TT0110912"), "user-1", 9, 2);
        assert_eq!(entry.external_id, "tt0110912");
        assert_eq!(entry.user_rating, Some(9));
        assert_eq!(entry.rating_revision_count, 2);
        assert_eq!(entry.owner_id, "user-1");
        assert!(entry.created_at.is_none());
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let entry = WatchedEntry::from_detail(&detail("tt0110912"), "user-1", 9, 0);
        assert!(entry.matches("TT0110912"));
        assert!(!entry.matches("tt0000001"));
    }

    #[test]
    fn test_serialization_skips_missing_created_at() {
        let entry = WatchedEntry::from_detail(&detail("tt0110912"), "user-1", 9, 0);
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("created_at").is_none());
        assert_eq!(json["external_id"], "tt0110912");
    }
}
