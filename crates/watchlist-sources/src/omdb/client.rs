use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use watchlist_config::OmdbConfig;
use watchlist_models::{MovieDetail, MovieSummary};
use crate::error::GatewayError;
use crate::omdb::api;
use crate::traits::MovieProvider;

#[derive(Clone)]
pub struct OmdbClient {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
}

impl OmdbClient {
    pub fn new(config: &OmdbConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build OMDb HTTP client: {}", e))?;
        Ok(Self {
            client: Arc::new(client),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl MovieProvider for OmdbClient {
    async fn search(&self, title: &str) -> Result<Vec<MovieSummary>, GatewayError> {
        api::search(&self.client, &self.base_url, &self.api_key, title).await
    }

    async fn fetch_by_id(&self, external_id: &str) -> Result<MovieDetail, GatewayError> {
        api::fetch_by_id(&self.client, &self.base_url, &self.api_key, external_id).await
    }
}
