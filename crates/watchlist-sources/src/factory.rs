//! Wiring of the collaborator set from configuration.

use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tracing::debug;
use watchlist_config::{Config, PathManager};
use crate::hosted::{HostedBackend, HostedIdentity, HostedStore};
use crate::memory::InMemoryBackend;
use crate::omdb::OmdbClient;
use crate::traits::{CommentRepository, IdentityService, MovieProvider, PasswordSignIn, WatchedRepository};

/// Every remote collaborator the controllers need
#[derive(Clone)]
pub struct Gateways {
    pub provider: Arc<dyn MovieProvider>,
    pub watched: Arc<dyn WatchedRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub identity: Arc<dyn IdentityService>,
    pub sign_in: Arc<dyn PasswordSignIn>,
}

impl Gateways {
    /// OMDb for metadata, the hosted project for storage and identity
    pub fn hosted(config: &Config, paths: &PathManager) -> Result<Self> {
        config.validate()?;
        let timeout = Duration::from_secs(config.http.timeout_secs);

        let provider = Arc::new(OmdbClient::new(&config.omdb, timeout)?);
        let backend = HostedBackend::new(&config.backend, timeout)?;
        let store = Arc::new(HostedStore::new(backend.clone()));
        let identity = HostedIdentity::new(backend, paths.credentials_file());
        debug!(backend = %config.backend.url, "Created hosted gateways");

        Ok(Self {
            provider,
            watched: store.clone(),
            comments: store,
            identity: identity.clone(),
            sign_in: identity,
        })
    }

    /// All collaborators backed by one in-process backend
    pub fn in_memory(backend: Arc<InMemoryBackend>) -> Self {
        Self {
            provider: backend.clone(),
            watched: backend.clone(),
            comments: backend.clone(),
            identity: backend.clone(),
            sign_in: backend,
        }
    }
}
