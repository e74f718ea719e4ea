use anyhow::Result;
use dirs;
use std::path::PathBuf;

const APP_DIR: &str = "movie-watchlist";

/// Get the container base path from environment variable, defaulting to "/app"
pub fn container_base_path() -> PathBuf {
    std::env::var("WATCHLIST_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/app"))
}

pub struct PathManager {
    config_dir: PathBuf,
    log_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join(APP_DIR);

        Ok(Self::at(base_dir))
    }

    /// Config files at `base`, logs in `base/logs`
    pub fn at(base: PathBuf) -> Self {
        Self {
            log_dir: base.join("logs"),
            config_dir: base,
        }
    }

    pub fn from_docker_env() -> Self {
        Self::at(container_base_path())
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.config_dir.join("credentials.toml")
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("watchlist.log")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

impl Default for PathManager {
    fn default() -> Self {
        // The container image creates the base directory; its presence means we run inside it
        let base = container_base_path();
        if base.exists() {
            return Self::from_docker_env();
        }

        Self::new().unwrap_or_else(|_| Self::from_docker_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_base() {
        let paths = PathManager::at(PathBuf::from("/srv/watchlist"));
        assert_eq!(paths.config_file(), PathBuf::from("/srv/watchlist/config.toml"));
        assert_eq!(paths.credentials_file(), PathBuf::from("/srv/watchlist/credentials.toml"));
        assert_eq!(paths.log_file(), PathBuf::from("/srv/watchlist/logs/watchlist.log"));
    }
}
