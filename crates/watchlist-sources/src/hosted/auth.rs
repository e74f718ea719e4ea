use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Method;
use tracing::{debug, info, warn};
use watchlist_config::{CredentialStore, StoredSession};
use watchlist_models::Session;
use crate::error::GatewayError;
use crate::hosted::api::{self, check, AuthUser, TokenResponse};
use crate::hosted::HostedBackend;
use crate::session_events::SessionEvents;
use crate::traits::{IdentityService, PasswordSignIn, SessionHandler, Subscription};

/// Identity service of the hosted project.
///
/// Tokens survive restarts through the credential store; the access token
/// is published to the shared `TokenCell` so store requests run as the user.
pub struct HostedIdentity {
    backend: HostedBackend,
    credentials_path: PathBuf,
    current: Mutex<Option<Session>>,
    events: SessionEvents,
}

impl HostedIdentity {
    /// The identity also ends its session when a store request comes back
    /// with the token rejected
    pub fn new(backend: HostedBackend, credentials_path: PathBuf) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            backend.set_on_rejected(Arc::new(move || {
                if let Some(identity) = weak.upgrade() {
                    identity.expire();
                }
            }));
            Self {
                backend,
                credentials_path,
                current: Mutex::new(None),
                events: SessionEvents::new(),
            }
        })
    }

    fn expire(&self) {
        if self.cached().is_some() {
            info!("Session expired");
            self.apply(None, true);
        }
    }

    fn cached(&self) -> Option<Session> {
        self.current.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn load_stored(&self) -> Option<StoredSession> {
        let mut cred_store = CredentialStore::new(self.credentials_path.clone());
        if let Err(e) = cred_store.load() {
            warn!("Failed to load credentials from {}: {}", self.credentials_path.display(), e);
            return None;
        }
        cred_store.session()
    }

    fn persist(&self, stored: Option<&StoredSession>) {
        let mut cred_store = CredentialStore::new(self.credentials_path.clone());
        let result = cred_store.load().and_then(|_| {
            match stored {
                Some(session) => cred_store.set_session(session),
                None => cred_store.clear_session(),
            }
            cred_store.save()
        });
        if let Err(e) = result {
            warn!("Failed to save credentials to {}: {}", self.credentials_path.display(), e);
        }
    }

    /// Install a session locally and tell subscribers when it changed
    fn apply(&self, stored: Option<StoredSession>, notify: bool) -> Option<Session> {
        self.backend.tokens().set(stored.as_ref().map(|s| s.access_token.clone()));
        self.persist(stored.as_ref());

        let session = stored.map(|s| Session::new(s.user_id, s.email));
        let changed = {
            let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
            let changed = *current != session;
            *current = session.clone();
            changed
        };
        if notify && changed {
            self.events.notify(session.clone());
        }
        session
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<StoredSession, GatewayError> {
        let response = self
            .backend
            .request_with_token(Method::POST, api::TOKEN_ENDPOINT, &self.backend.anon_key)
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;
        let session = token.user.into_session();
        Ok(StoredSession {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            user_id: session.user_id,
            email: session.email,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredSession, GatewayError> {
        debug!("Refreshing access token");
        self.token_grant("refresh_token", serde_json::json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Session, GatewayError> {
        let response = self
            .backend
            .request_with_token(Method::GET, api::USER_ENDPOINT, access_token)
            .send()
            .await?;
        let user: AuthUser = check(response).await?.json().await?;
        Ok(user.into_session())
    }

    /// Validate stored tokens, refreshing them once if the backend rejects them
    async fn restore(&self, stored: StoredSession) -> Result<Option<StoredSession>, GatewayError> {
        if !stored.is_expired(Utc::now()) {
            match self.fetch_user(&stored.access_token).await {
                Ok(user) => {
                    return Ok(Some(StoredSession {
                        user_id: user.user_id,
                        email: user.email,
                        ..stored
                    }))
                }
                Err(GatewayError::Unauthorized) => {}
                Err(e) => return Err(e),
            }
        }

        match stored.refresh_token.as_deref() {
            Some(refresh_token) => match self.refresh(refresh_token).await {
                Ok(fresh) => Ok(Some(fresh)),
                Err(GatewayError::Unauthorized) | Err(GatewayError::Status { status: 400, .. }) => Ok(None),
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }
}

#[async_trait]
impl IdentityService for HostedIdentity {
    async fn current_session(&self) -> Result<Option<Session>, GatewayError> {
        if let Some(session) = self.cached() {
            return Ok(Some(session));
        }
        let Some(stored) = self.load_stored() else {
            return Ok(None);
        };

        let restored = self.restore(stored).await?;
        if restored.is_none() {
            info!("Stored session is no longer valid");
        }
        Ok(self.apply(restored, false))
    }

    fn on_session_change(&self, handler: SessionHandler) -> Subscription {
        self.events.subscribe(handler)
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        if let Some(token) = self.backend.tokens().get() {
            let response = self
                .backend
                .request_with_token(Method::POST, api::LOGOUT_ENDPOINT, &token)
                .send()
                .await?;
            match check(response).await {
                // An already-invalid token means the backend session is gone anyway
                Ok(_) | Err(GatewayError::Unauthorized) => {}
                Err(e) => return Err(e),
            }
        }

        info!("Signed out");
        self.apply(None, true);
        Ok(())
    }
}

#[async_trait]
impl PasswordSignIn for HostedIdentity {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, GatewayError> {
        let stored = self
            .token_grant(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        info!(user_id = %stored.user_id, "Signed in");
        self.apply(Some(stored), true)
            .ok_or_else(|| GatewayError::Decode("sign-in returned no session".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlist_config::BackendConfig;

    fn backend() -> HostedBackend {
        let config = BackendConfig {
            url: "https://project.example.co".to_string(),
            anon_key: "anon".to_string(),
        };
        HostedBackend::new(&config, std::time::Duration::from_secs(5)).unwrap()
    }

    fn stored() -> StoredSession {
        StoredSession {
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: None,
            user_id: "user-1".to_string(),
            email: "ana@example.com".to_string(),
        }
    }

    #[test]
    fn test_rejected_token_ends_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend();
        let identity = HostedIdentity::new(backend.clone(), dir.path().join("credentials.toml"));
        identity.apply(Some(stored()), false);

        let seen: Arc<Mutex<Vec<Option<Session>>>> = Arc::new(Mutex::new(Vec::new()));
        let _subscription = identity.on_session_change(Arc::new({
            let seen = seen.clone();
            move |session: Option<Session>| seen.lock().unwrap().push(session)
        }));

        backend.token_rejected();

        assert_eq!(identity.cached(), None);
        assert_eq!(backend.tokens().get(), None);
        assert_eq!(*seen.lock().unwrap(), vec![None]);
        assert!(identity.load_stored().is_none());
    }

    #[test]
    fn test_rejection_without_user_token_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend();
        let identity = HostedIdentity::new(backend.clone(), dir.path().join("credentials.toml"));

        let seen: Arc<Mutex<Vec<Option<Session>>>> = Arc::new(Mutex::new(Vec::new()));
        let _subscription = identity.on_session_change(Arc::new({
            let seen = seen.clone();
            move |session: Option<Session>| seen.lock().unwrap().push(session)
        }));

        backend.token_rejected();
        assert!(seen.lock().unwrap().is_empty());
    }
}
