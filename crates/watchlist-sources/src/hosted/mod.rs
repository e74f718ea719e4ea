//! Hosted database (PostgREST) and auth (GoTrue) backend.
//!
//! Row ownership is enforced by the backend's row-level security; the
//! clients here only attach the signed-in user's bearer token.

pub mod api;
pub mod auth;
pub mod store;

pub use auth::HostedIdentity;
pub use store::HostedStore;

use std::sync::{Arc, RwLock};
use std::time::Duration;
use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::warn;
use watchlist_config::BackendConfig;
use crate::error::GatewayError;

/// Called when the backend refuses the signed-in user's access token
pub(crate) type RejectedHook = Arc<dyn Fn() + Send + Sync>;

/// Access token shared between the identity client (writer) and the
/// store client (reader)
#[derive(Clone, Default)]
pub struct TokenCell(Arc<RwLock<Option<String>>>);

impl TokenCell {
    pub fn get(&self) -> Option<String> {
        self.0.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn set(&self, token: Option<String>) {
        *self.0.write().unwrap_or_else(|p| p.into_inner()) = token;
    }
}

/// Connection to the hosted project
#[derive(Clone)]
pub struct HostedBackend {
    client: Arc<Client>,
    base_url: String,
    anon_key: String,
    tokens: TokenCell,
    on_rejected: Arc<RwLock<Option<RejectedHook>>>,
}

impl HostedBackend {
    pub fn new(config: &BackendConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build backend HTTP client: {}", e))?;
        Ok(Self {
            client: Arc::new(client),
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            tokens: TokenCell::default(),
            on_rejected: Arc::new(RwLock::new(None)),
        })
    }

    pub fn tokens(&self) -> &TokenCell {
        &self.tokens
    }

    /// Request with the project key and the user's token (anon key when signed out)
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self.tokens.get().unwrap_or_else(|| self.anon_key.clone());
        self.request_with_token(method, path, &bearer)
    }

    pub(crate) fn set_on_rejected(&self, hook: RejectedHook) {
        *self.on_rejected.write().unwrap_or_else(|p| p.into_inner()) = Some(hook);
    }

    /// A 401 while a user token is attached means the session has ended
    pub(crate) fn token_rejected(&self) {
        if self.tokens.get().is_none() {
            return;
        }
        warn!("Backend rejected the access token");
        let hook = self.on_rejected.read().unwrap_or_else(|p| p.into_inner()).clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// `api::check` for store requests, reporting rejected tokens
    pub(crate) async fn check(&self, response: Response) -> Result<Response, GatewayError> {
        let result = api::check(response).await;
        if matches!(result, Err(GatewayError::Unauthorized)) {
            self.token_rejected();
        }
        result
    }

    pub(crate) fn request_with_token(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/json")
    }
}
