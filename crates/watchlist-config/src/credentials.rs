use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use toml;

const ACCESS_TOKEN: &str = "access_token";
const REFRESH_TOKEN: &str = "refresh_token";
const TOKEN_EXPIRES: &str = "token_expires";
const USER_ID: &str = "user_id";
const USER_EMAIL: &str = "user_email";

#[derive(Debug, Serialize, Deserialize, Default)]
struct CredentialsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

/// Tokens of the last signed-in session, as persisted between runs
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user_id: String,
    pub email: String,
}

impl StoredSession {
    /// Treat tokens within five minutes of expiry as already expired
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|expires| expires <= now + chrono::Duration::minutes(5))
            .unwrap_or(false)
    }
}

pub struct CredentialStore {
    path: PathBuf,
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            credentials: HashMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            let creds_data: CredentialsData = toml::from_str(&content)?;
            self.credentials = creds_data.data;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let creds_data = CredentialsData {
            data: self.credentials.clone(),
        };
        let content = toml::to_string_pretty(&creds_data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.credentials.get(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.credentials.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.credentials.remove(key);
    }

    pub fn session(&self) -> Option<StoredSession> {
        let access_token = self.get(ACCESS_TOKEN).filter(|t| !t.is_empty())?.clone();
        let user_id = self.get(USER_ID)?.clone();
        Some(StoredSession {
            access_token,
            refresh_token: self.get(REFRESH_TOKEN).cloned(),
            expires_at: self
                .get(TOKEN_EXPIRES)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            user_id,
            email: self.get(USER_EMAIL).cloned().unwrap_or_default(),
        })
    }

    pub fn set_session(&mut self, session: &StoredSession) {
        self.set(ACCESS_TOKEN.to_string(), session.access_token.clone());
        match &session.refresh_token {
            Some(token) => self.set(REFRESH_TOKEN.to_string(), token.clone()),
            None => self.remove(REFRESH_TOKEN),
        }
        match session.expires_at {
            Some(expires) => self.set(TOKEN_EXPIRES.to_string(), expires.to_rfc3339()),
            None => self.remove(TOKEN_EXPIRES),
        }
        self.set(USER_ID.to_string(), session.user_id.clone());
        self.set(USER_EMAIL.to_string(), session.email.clone());
    }

    pub fn clear_session(&mut self) {
        for key in [ACCESS_TOKEN, REFRESH_TOKEN, TOKEN_EXPIRES, USER_ID, USER_EMAIL] {
            self.remove(key);
        }
    }
}
