//! Tracks the signed-in identity and fans out sign-in/sign-out transitions.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tracing::{debug, info};
use watchlist_models::Session;
use watchlist_sources::{IdentityService, Subscription};
use crate::error::SyncError;

pub type SignedInListener = Arc<dyn Fn(&Session) + Send + Sync>;
pub type SignedOutListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    signed_in: Vec<SignedInListener>,
    signed_out: Vec<SignedOutListener>,
}

struct Inner {
    session: watch::Sender<Option<Session>>,
    listeners: Mutex<Listeners>,
}

impl Inner {
    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Replace the session and run the listeners for the transition
    fn apply(&self, next: Option<Session>) {
        let previous = self.session.send_replace(next.clone());
        let user_changed = match (&previous, &next) {
            (Some(a), Some(b)) => a.user_id != b.user_id,
            _ => false,
        };

        if previous.is_some() && (next.is_none() || user_changed) {
            info!("Session ended");
            let listeners: Vec<SignedOutListener> = self.listeners().signed_out.clone();
            for listener in listeners {
                listener();
            }
        }
        if let Some(session) = next.as_ref() {
            if previous.is_none() || user_changed {
                info!(user_id = %session.user_id, "Session started");
                let listeners: Vec<SignedInListener> = self.listeners().signed_in.clone();
                for listener in listeners {
                    listener(session);
                }
            }
        }
    }
}

/// Owns the current `Option<Session>` for the life of the app.
///
/// Sign-out listeners run synchronously inside the identity notification,
/// so state cleared by them is gone before `sign_out` returns.
pub struct SessionController {
    identity: Arc<dyn IdentityService>,
    inner: Arc<Inner>,
    subscription: Mutex<Option<Subscription>>,
}

impl SessionController {
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            identity,
            inner: Arc::new(Inner {
                session,
                listeners: Mutex::new(Listeners::default()),
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribe to identity changes, then resolve the current session once
    pub async fn start(&self) -> Result<Option<Session>, SyncError> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let subscription = self.identity.on_session_change(Arc::new(move |session| {
            if let Some(inner) = weak.upgrade() {
                inner.apply(session);
            }
        }));
        *self.subscription.lock().unwrap_or_else(|p| p.into_inner()) = Some(subscription);

        let session = self.identity.current_session().await?;
        debug!(signed_in = session.is_some(), "Resolved initial session");
        self.inner.apply(session.clone());
        Ok(session)
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.session.subscribe()
    }

    pub fn on_signed_in(&self, listener: SignedInListener) {
        self.inner.listeners().signed_in.push(listener);
    }

    pub fn on_signed_out(&self, listener: SignedOutListener) {
        self.inner.listeners().signed_out.push(listener);
    }

    /// Ask the identity service to end the session. State is cleared by the
    /// resulting notification, not here.
    pub async fn sign_out(&self) -> Result<(), SyncError> {
        self.identity.sign_out().await.map_err(SyncError::from)
    }

    /// Stop listening for identity changes
    pub fn shutdown(&self) {
        if let Some(subscription) = self.subscription.lock().unwrap_or_else(|p| p.into_inner()).take() {
            subscription.unsubscribe();
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
