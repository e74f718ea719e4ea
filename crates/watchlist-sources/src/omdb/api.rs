use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use watchlist_models::{parse_poster, parse_rating, parse_runtime_minutes, MovieDetail, MovieSummary};
use crate::error::GatewayError;

#[derive(Debug, Deserialize)]
pub(crate) struct OmdbSearchResponse {
    #[serde(rename = "Search", default)]
    search: Vec<OmdbSearchItem>,
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmdbSearchItem {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Year", default)]
    year: String,
    #[serde(rename = "imdbID")]
    imdb_id: String,
    #[serde(rename = "Poster", default)]
    poster: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OmdbDetailResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(rename = "imdbID", default)]
    imdb_id: String,
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "Year", default)]
    year: String,
    #[serde(rename = "Poster", default)]
    poster: String,
    #[serde(rename = "Runtime", default)]
    runtime: String,
    #[serde(rename = "imdbRating", default)]
    imdb_rating: String,
    #[serde(rename = "Plot", default)]
    plot: String,
    #[serde(rename = "Released", default)]
    released: String,
    #[serde(rename = "Actors", default)]
    actors: String,
    #[serde(rename = "Director", default)]
    director: String,
    #[serde(rename = "Genre", default)]
    genre: String,
}

/// OMDb signals failures in-band with `"Response": "False"`
fn is_ok(response: &str) -> bool {
    response.eq_ignore_ascii_case("true")
}

fn failure_reason(error: Option<String>) -> GatewayError {
    GatewayError::provider(error.unwrap_or_else(|| "Unknown provider error".to_string()))
}

pub(crate) fn into_summaries(body: OmdbSearchResponse) -> Result<Vec<MovieSummary>, GatewayError> {
    if !is_ok(&body.response) {
        return Err(failure_reason(body.error));
    }

    Ok(body
        .search
        .into_iter()
        .map(|item| MovieSummary {
            external_id: item.imdb_id,
            title: item.title,
            year: item.year,
            poster_url: parse_poster(&item.poster),
        })
        .collect())
}

pub(crate) fn into_detail(body: OmdbDetailResponse) -> Result<MovieDetail, GatewayError> {
    if !is_ok(&body.response) {
        return Err(failure_reason(body.error));
    }

    Ok(MovieDetail {
        external_id: body.imdb_id,
        title: body.title,
        year: body.year,
        poster_url: parse_poster(&body.poster),
        runtime_minutes: parse_runtime_minutes(&body.runtime),
        external_rating: parse_rating(&body.imdb_rating),
        plot: body.plot,
        released: body.released,
        actors: body.actors,
        director: body.director,
        genre: body.genre,
    })
}

async fn get(
    client: &Client,
    base_url: &str,
    api_key: &str,
    param: (&str, &str),
) -> Result<reqwest::Response, GatewayError> {
    let url = format!("{}/", base_url.trim_end_matches('/'));
    let response = client
        .get(&url)
        .query(&[("apikey", api_key), param])
        .header("Accept", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let error_text = response.text().await.unwrap_or_default();
        return Err(GatewayError::Status { status, message: error_text });
    }
    Ok(response)
}

/// Title search (`?s=`)
pub async fn search(
    client: &Client,
    base_url: &str,
    api_key: &str,
    title: &str,
) -> Result<Vec<MovieSummary>, GatewayError> {
    debug!(title, "OMDb search");
    let body: OmdbSearchResponse = get(client, base_url, api_key, ("s", title)).await?.json().await?;
    into_summaries(body)
}

/// Lookup by IMDb id (`?i=`)
pub async fn fetch_by_id(
    client: &Client,
    base_url: &str,
    api_key: &str,
    external_id: &str,
) -> Result<MovieDetail, GatewayError> {
    debug!(external_id, "OMDb detail lookup");
    let body: OmdbDetailResponse = get(client, base_url, api_key, ("i", external_id)).await?.json().await?;
    into_detail(body)
}
