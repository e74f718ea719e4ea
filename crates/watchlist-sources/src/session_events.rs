use std::sync::{Arc, Mutex, Weak};
use tracing::debug;
use watchlist_models::Session;
use crate::traits::{SessionHandler, Subscription};

#[derive(Default)]
struct Handlers {
    next_id: u64,
    entries: Vec<(u64, SessionHandler)>,
}

/// Fan-out of session changes to subscribed handlers.
///
/// Handlers run synchronously, in subscription order, on the thread that
/// reports the change. The handler list is snapshotted before dispatch so a
/// handler may subscribe or unsubscribe without deadlocking.
#[derive(Clone, Default)]
pub struct SessionEvents {
    handlers: Arc<Mutex<Handlers>>,
}

impl SessionEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: SessionHandler) -> Subscription {
        let id = {
            let mut handlers = lock(&self.handlers);
            let id = handlers.next_id;
            handlers.next_id += 1;
            handlers.entries.push((id, handler));
            id
        };

        let weak: Weak<Mutex<Handlers>> = Arc::downgrade(&self.handlers);
        Subscription::new(move || {
            if let Some(handlers) = weak.upgrade() {
                lock(&handlers).entries.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    pub fn notify(&self, session: Option<Session>) {
        let snapshot: Vec<SessionHandler> = lock(&self.handlers)
            .entries
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        debug!(
            handlers = snapshot.len(),
            signed_in = session.is_some(),
            "Dispatching session change"
        );

        for handler in snapshot {
            handler(session.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.handlers).entries.len()
    }
}

// A panicking handler must not wedge every later notification
fn lock(handlers: &Mutex<Handlers>) -> std::sync::MutexGuard<'_, Handlers> {
    handlers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_reaches_every_subscriber() {
        let events = SessionEvents::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c1 = calls.clone();
        let _s1 = events.subscribe(Arc::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = calls.clone();
        let _s2 = events.subscribe(Arc::new(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        }));

        events.notify(None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let events = SessionEvents::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        let subscription = events.subscribe(Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(events.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(events.subscriber_count(), 0);

        events.notify(Some(Session::new("user-1", "a@example.com")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let events = SessionEvents::new();
        let subscription = events.subscribe(Arc::new(|_| {}));
        subscription.unsubscribe();
        assert_eq!(events.subscriber_count(), 0);
    }
}
