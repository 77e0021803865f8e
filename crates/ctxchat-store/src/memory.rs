use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use ctxchat_core::{UserContext, UserId};

/// In-memory keyed register of per-user context. The store itself validates
/// nothing: `put` replaces the whole record (last writer wins, no merge) and
/// `get` of an absent user yields defaults. Records live for the process
/// lifetime; there is no persistence.
///
/// Read-modify-write cycles go through [`ContextStore::lease`], which hands
/// out an exclusive per-user guard. Mutating flows take the lease first;
/// plain reads never do. Distinct users never contend.
#[derive(Clone, Default)]
pub struct ContextStore {
    records: Arc<DashMap<UserId, UserContext>>,
    // One lock per user ever seen. Entries are never removed, so a lease
    // taken before a reset and one taken after share the same mutex.
    locks: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

/// Exclusive per-user section. Held for the duration of one
/// `get` → mutate → `put` cycle, dropped to release.
pub struct UserLease {
    _guard: OwnedMutexGuard<()>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the user's context, default-empty when absent.
    pub fn get(&self, user: &UserId) -> UserContext {
        self.records
            .get(user)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Replace the stored record wholesale.
    pub fn put(&self, user: &UserId, ctx: UserContext) {
        self.records.insert(user.clone(), ctx);
    }

    /// Remove the user's record entirely; the next `get` sees defaults.
    pub fn reset(&self, user: &UserId) {
        self.records.remove(user);
    }

    /// Number of users with a stored record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Acquire the user's exclusive lease, waiting if another holder has it.
    pub async fn lease(&self, user: &UserId) -> UserLease {
        // The map guard must drop before the await below.
        let lock = {
            let entry = self.locks.entry(user.clone()).or_default();
            entry.value().clone()
        };
        UserLease {
            _guard: lock.lock_owned().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxchat_core::context::Document;
    use std::time::Duration;

    fn user(s: &str) -> UserId {
        UserId::new(s)
    }

    #[test]
    fn get_missing_returns_default() {
        let store = ContextStore::new();
        let ctx = store.get(&user("nobody"));
        assert_eq!(ctx, UserContext::default());
    }

    #[test]
    fn put_then_get_roundtrip() {
        let store = ContextStore::new();
        let ctx = UserContext {
            history: "\nUser: hi\nAI: hello".into(),
            urls: vec!["http://a".into()],
            ..Default::default()
        };
        store.put(&user("u1"), ctx.clone());
        assert_eq!(store.get(&user("u1")), ctx);
    }

    #[test]
    fn put_replaces_wholesale() {
        let store = ContextStore::new();
        let u = user("u1");
        store.put(
            &u,
            UserContext {
                urls: vec!["http://a".into()],
                documents: vec![Document { name: "d".into(), text: "t".into() }],
                ..Default::default()
            },
        );
        store.put(
            &u,
            UserContext {
                history: "new".into(),
                ..Default::default()
            },
        );
        let got = store.get(&u);
        assert_eq!(got.history, "new");
        assert!(got.urls.is_empty(), "old urls must not survive a put");
        assert!(got.documents.is_empty());
    }

    #[test]
    fn reset_removes_record() {
        let store = ContextStore::new();
        let u = user("u1");
        store.put(
            &u,
            UserContext {
                history: "something".into(),
                ..Default::default()
            },
        );
        store.reset(&u);
        assert_eq!(store.get(&u), UserContext::default());
        assert!(store.is_empty());
    }

    #[test]
    fn reset_missing_is_noop() {
        let store = ContextStore::new();
        store.reset(&user("ghost"));
        assert!(store.is_empty());
    }

    #[test]
    fn users_are_independent() {
        let store = ContextStore::new();
        store.put(
            &user("a"),
            UserContext {
                history: "for a".into(),
                ..Default::default()
            },
        );
        assert_eq!(store.get(&user("b")), UserContext::default());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn lease_serializes_same_user_mutation() {
        let store = ContextStore::new();
        let u = user("u1");

        let mut handles = Vec::new();
        for i in 0..2 {
            let store = store.clone();
            let u = u.clone();
            handles.push(tokio::spawn(async move {
                let _lease = store.lease(&u).await;
                let mut ctx = store.get(&u);
                // Yield mid-cycle so an unserialized peer would interleave.
                tokio::time::sleep(Duration::from_millis(10)).await;
                ctx.urls.push(format!("http://{i}"));
                store.put(&u, ctx);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(store.get(&u).urls.len(), 2, "a write was lost");
    }

    #[tokio::test]
    async fn distinct_users_do_not_contend() {
        let store = ContextStore::new();
        let _held = store.lease(&user("a")).await;

        let other = tokio::time::timeout(Duration::from_millis(100), store.lease(&user("b"))).await;
        assert!(other.is_ok(), "lease for another user must not block");
    }

    #[tokio::test]
    async fn reads_ignore_held_lease() {
        let store = ContextStore::new();
        let u = user("u1");
        store.put(
            &u,
            UserContext {
                history: "h".into(),
                ..Default::default()
            },
        );
        let _held = store.lease(&u).await;
        assert_eq!(store.get(&u).history, "h");
    }

    #[tokio::test]
    async fn lease_survives_reset() {
        let store = ContextStore::new();
        let u = user("u1");
        {
            let _lease = store.lease(&u).await;
            store.reset(&u);
        }
        // Same mutex is handed out after the reset.
        let _again = store.lease(&u).await;
        assert_eq!(store.get(&u), UserContext::default());
    }
}
