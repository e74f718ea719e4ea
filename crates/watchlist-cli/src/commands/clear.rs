use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use watchlist_config::{CredentialStore, PathManager};

pub fn run_clear(credentials: bool, output: &Output) -> Result<()> {
    if !credentials {
        output.warn("No clear option specified. Use --credentials");
        output.println("\nExample: watchlist clear --credentials");
        return Ok(());
    }
    clear_credentials(&super::path_manager(), output)
}

fn clear_credentials(paths: &PathManager, output: &Output) -> Result<()> {
    let credentials_file = paths.credentials_file();
    if !credentials_file.exists() {
        output.info("No stored session found to clear");
        return Ok(());
    }

    let mut store = CredentialStore::new(credentials_file.clone());
    store
        .load()
        .map_err(|e| eyre!("Failed to read {}: {}", credentials_file.display(), e))?;
    let had_session = store.session().is_some();
    store.clear_session();
    store
        .save()
        .map_err(|e| eyre!("Failed to write {}: {}", credentials_file.display(), e))?;

    if had_session {
        output.success(format!("Cleared stored session: {}", credentials_file.display()));
    } else {
        output.info("No stored session found to clear");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use watchlist_config::StoredSession;

    #[test]
    fn test_clear_credentials_removes_session_keys() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::at(dir.path().to_path_buf());
        paths.ensure_directories().unwrap();

        let mut store = CredentialStore::new(paths.credentials_file());
        store.set_session(&StoredSession {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: None,
            user_id: "u1".to_string(),
            email: "ana@example.com".to_string(),
        });
        store.save().unwrap();

        let output = Output::new(OutputFormat::Json, true);
        clear_credentials(&paths, &output).unwrap();

        let mut reloaded = CredentialStore::new(paths.credentials_file());
        reloaded.load().unwrap();
        assert!(reloaded.session().is_none());
    }
}
