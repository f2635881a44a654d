// ── Session store ──
//
// The one piece of mutable state shared by every task. Readers always see
// either the previous or the new session as a whole.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::watch;
use tracing::debug;

use crate::model::Session;

/// Guarded holder of the current session.
///
/// Every change bumps a generation counter observable through
/// [`subscribe`](Self::subscribe), which lets the scheduler sleep until a
/// new session arrives.
pub struct SessionStore {
    current: ArcSwapOption<Session>,
    generation: watch::Sender<u64>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            current: ArcSwapOption::empty(),
            generation,
        }
    }

    /// The current session, valid or not.
    pub fn get(&self) -> Option<Arc<Session>> {
        self.current.load_full()
    }

    /// The current session, only if it is still valid.
    pub fn get_valid(&self) -> Option<Arc<Session>> {
        self.get().filter(|s| s.valid)
    }

    pub fn is_valid(&self) -> bool {
        self.current.load().as_deref().is_some_and(|s| s.valid)
    }

    /// Replace the current session.
    pub fn set(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.current.store(Some(Arc::clone(&session)));
        self.bump();
        debug!(acquired_at = %session.acquired_at, "session stored");
        session
    }

    /// Mark the current session invalid, whichever it is.
    pub fn invalidate(&self) {
        let previous = self
            .current
            .rcu(|cur| cur.as_ref().map(|s| Arc::new(s.invalidated())));
        if previous.is_some_and(|s| s.valid) {
            self.bump();
        }
    }

    /// Mark `expected` invalid if it is still the current, valid session.
    ///
    /// Returns `true` for exactly one caller per valid-to-invalid transition.
    /// A failure of a request made with an older session does not touch a
    /// newer one.
    pub fn invalidate_if_current(&self, expected: &Arc<Session>) -> bool {
        let mut transitioned = false;
        self.current.rcu(|cur| match cur {
            Some(s) if Arc::ptr_eq(s, expected) && s.valid => {
                transitioned = true;
                Some(Arc::new(s.invalidated()))
            }
            other => {
                transitioned = false;
                other.clone()
            }
        });
        if transitioned {
            self.bump();
            debug!("session invalidated");
        }
        transitioned
    }

    /// Drop the session entirely.
    pub fn clear(&self) {
        if self.current.swap(None).is_some() {
            self.bump();
        }
    }

    /// Receiver of the generation counter, bumped on every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    fn bump(&self) {
        self.generation.send_modify(|g| *g += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::{ExposeSecret, SecretString};

    fn session(token: &str) -> Session {
        Session::new(SecretString::from(token.to_string()))
    }

    #[test]
    fn starts_empty() {
        let store = SessionStore::new();
        assert!(store.get().is_none());
        assert!(!store.is_valid());
    }

    #[test]
    fn set_then_get_returns_same_session() {
        let store = SessionStore::new();
        let stored = store.set(session("abc"));
        let current = store.get().unwrap();
        assert!(Arc::ptr_eq(&stored, &current));
        assert_eq!(current.token.expose_secret(), "abc");
        assert!(store.is_valid());
    }

    #[test]
    fn only_one_caller_sees_the_transition() {
        let store = SessionStore::new();
        let current = store.set(session("abc"));

        assert!(store.invalidate_if_current(&current));
        assert!(!store.invalidate_if_current(&current));
        assert!(!store.is_valid());
        assert!(store.get().is_some());
    }

    #[test]
    fn stale_failure_does_not_invalidate_newer_session() {
        let store = SessionStore::new();
        let old = store.set(session("old"));
        store.set(session("new"));

        assert!(!store.invalidate_if_current(&old));
        assert!(store.is_valid());
    }

    #[test]
    fn concurrent_invalidations_transition_once() {
        let store = Arc::new(SessionStore::new());
        let current = store.set(session("abc"));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let current = Arc::clone(&current);
                std::thread::spawn(move || store.invalidate_if_current(&current))
            })
            .collect();
        let transitions = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|t| *t)
            .count();

        assert_eq!(transitions, 1);
    }

    #[test]
    fn changes_bump_generation() {
        let store = SessionStore::new();
        let rx = store.subscribe();
        assert_eq!(*rx.borrow(), 0);

        store.set(session("abc"));
        store.invalidate();
        store.invalidate();
        assert_eq!(*rx.borrow(), 2);

        store.clear();
        assert_eq!(*rx.borrow(), 3);
    }
}
