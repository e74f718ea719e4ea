use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const PLACEHOLDER_PREFIX: &str = "YOUR_";

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub omdb: OmdbConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Movie metadata provider
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OmdbConfig {
    pub api_key: String,
    #[serde(default = "default_omdb_base_url")]
    pub base_url: String,
}

/// Hosted database + auth project
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SearchConfig {
    /// Queries shorter than this never reach the provider
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,
    /// Quiet period before a query is sent
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub fn default_omdb_base_url() -> String {
    "https://www.omdbapi.com".to_string()
}

fn default_min_query_len() -> usize {
    3
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_len: default_min_query_len(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn is_unset(value: &str) -> bool {
    value.trim().is_empty() || value.starts_with(PLACEHOLDER_PREFIX)
}

impl Config {
    /// Template written by `config init` before the user fills it in
    pub fn template() -> Self {
        Self {
            omdb: OmdbConfig {
                api_key: "YOUR_OMDB_API_KEY".to_string(),
                base_url: default_omdb_base_url(),
            },
            backend: BackendConfig {
                url: "YOUR_BACKEND_URL".to_string(),
                anon_key: "YOUR_ANON_KEY".to_string(),
            },
            search: SearchConfig::default(),
            http: HttpConfig::default(),
        }
    }

    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if is_unset(&self.omdb.api_key) {
            return Err(anyhow::anyhow!("omdb.api_key is not configured"));
        }
        if is_unset(&self.omdb.base_url) {
            return Err(anyhow::anyhow!("omdb.base_url is not configured"));
        }
        if is_unset(&self.backend.url) {
            return Err(anyhow::anyhow!("backend.url is not configured"));
        }
        if !self.backend.url.starts_with("http://") && !self.backend.url.starts_with("https://") {
            return Err(anyhow::anyhow!("backend.url must be an http(s) URL: {}", self.backend.url));
        }
        if is_unset(&self.backend.anon_key) {
            return Err(anyhow::anyhow!("backend.anon_key is not configured"));
        }
        if self.search.min_query_len == 0 {
            return Err(anyhow::anyhow!("search.min_query_len must be at least 1"));
        }
        if self.http.timeout_secs == 0 {
            return Err(anyhow::anyhow!("http.timeout_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn is_omdb_configured(&self) -> bool {
        !is_unset(&self.omdb.api_key)
    }

    pub fn is_backend_configured(&self) -> bool {
        !is_unset(&self.backend.url) && !is_unset(&self.backend.anon_key)
    }
}
