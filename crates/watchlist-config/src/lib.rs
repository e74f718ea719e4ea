pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{BackendConfig, Config, HttpConfig, OmdbConfig, SearchConfig, default_omdb_base_url};
pub use credentials::{CredentialStore, StoredSession};
pub use paths::{PathManager, container_base_path};
