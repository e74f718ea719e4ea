use serde::{Deserialize, Serialize};

/// One hit from a title search. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieSummary {
    pub external_id: String,
    pub title: String,
    pub year: String,
    pub poster_url: Option<String>,
}

/// Full metadata for the selected movie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieDetail {
    pub external_id: String,
    pub title: String,
    pub year: String,
    pub poster_url: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub external_rating: Option<f32>,
    pub plot: String,
    pub released: String,
    pub actors: String,
    pub director: String,
    pub genre: String,
}

impl MovieDetail {
    pub fn summary(&self) -> MovieSummary {
        MovieSummary {
            external_id: self.external_id.clone(),
            title: self.title.clone(),
            year: self.year.clone(),
            poster_url: self.poster_url.clone(),
        }
    }
}

/// Parse a provider runtime such as "148 min".
///
/// Returns None for "N/A" and anything that does not start with a number.
pub fn parse_runtime_minutes(raw: &str) -> Option<u32> {
    raw.split_whitespace().next()?.parse().ok()
}

/// Parse a provider rating such as "8.8". "N/A" yields None.
pub fn parse_rating(raw: &str) -> Option<f32> {
    raw.trim()
        .parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Providers report missing posters as the literal "N/A"
pub fn parse_poster(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_runtime_minutes() {
        assert_eq!(parse_runtime_minutes("148 min"), Some(148));
        assert_eq!(parse_runtime_minutes("90"), Some(90));
        assert_eq!(parse_runtime_minutes("N/A"), None);
        assert_eq!(parse_runtime_minutes(""), None);
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("8.8"), Some(8.8));
        assert_eq!(parse_rating(" 7 "), Some(7.0));
        assert_eq!(parse_rating("N/A"), None);
        assert_eq!(parse_rating("NaN"), None);
    }

    #[test]
    fn test_parse_poster() {
        assert_eq!(parse_poster("N/A"), None);
        assert_eq!(parse_poster(""), None);
        assert_eq!(
            parse_poster("https://img.example/p.jpg"),
            Some("https://img.example/p.jpg".to_string())
        );
    }

    #[test]
    fn test_detail_projects_to_summary() {
        let detail = MovieDetail {
            external_id: "tt1375666".to_string(),
            title: "Inception".to_string(),
            year: "2010".to_string(),
            poster_url: None,
            runtime_minutes: Some(148),
            external_rating: Some(8.8),
            plot: String::new(),
            released: "16 Jul 2010".to_string(),
            actors: String::new(),
            director: "Christopher Nolan".to_string(),
            genre: "Action, Sci-Fi".to_string(),
        };
        let summary = detail.summary();
        assert_eq!(summary.external_id, "tt1375666");
        assert_eq!(summary.title, "Inception");
    }
}
