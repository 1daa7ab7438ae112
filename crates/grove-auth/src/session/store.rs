//! Per-user sharded session store.
//!
//! Every user id owns one shard behind its own async mutex. Holding the
//! shard lock for the duration of an operation makes mutations against a
//! single user serially ordered (a list observes every preceding
//! mutation), while operations on different users never contend.
//!
//! Forged session ids cannot reach this store through the normal path:
//! the encrypted cookie authenticates before a lookup happens. `validate`
//! answers misses and hits through the same lock acquisition so the
//! difference is a map probe, not a divergent code path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::session::record::{NewSession, SessionRecord};

#[derive(Default)]
struct UserShard {
    sessions: HashMap<Uuid, SessionRecord>,
}

/// Session store sharded by user id.
pub struct SessionStore {
    shards: DashMap<Uuid, Arc<Mutex<UserShard>>>,
    session_ttl: Duration,
}

impl SessionStore {
    /// Creates a store with the given session lifetime.
    #[must_use]
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            shards: DashMap::new(),
            session_ttl,
        }
    }

    fn shard(&self, user_id: Uuid) -> Arc<Mutex<UserShard>> {
        self.shards
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(UserShard::default())))
            .clone()
    }

    /// Creates a session for a user. The record is in the shard (and
    /// visible to every later operation) before this returns.
    pub async fn create(&self, user_id: Uuid, new: NewSession) -> SessionRecord {
        let record = SessionRecord::new(user_id, new, self.session_ttl);
        let shard = self.shard(user_id);
        let mut shard = shard.lock().await;
        shard.sessions.insert(record.id, record.clone());
        record
    }

    /// Validates a session id, touching `last_active_at` on a hit.
    ///
    /// Returns `None` for unknown, revoked, and expired sessions alike.
    pub async fn validate(&self, user_id: Uuid, session_id: Uuid) -> Option<SessionRecord> {
        let shard = self.shard(user_id);
        let mut shard = shard.lock().await;
        let session = shard.sessions.get_mut(&session_id)?;
        if !session.is_live() {
            return None;
        }
        session.last_active_at = time::OffsetDateTime::now_utc();
        Some(session.clone())
    }

    /// Revokes one session. Idempotent; siblings are untouched.
    ///
    /// Returns `true` if a live session was revoked by this call.
    pub async fn revoke(&self, user_id: Uuid, session_id: Uuid) -> bool {
        let shard = self.shard(user_id);
        let mut shard = shard.lock().await;
        match shard.sessions.get_mut(&session_id) {
            Some(session) if !session.revoked => {
                session.revoked = true;
                true
            }
            _ => false,
        }
    }

    /// Revokes every live session of a user, optionally keeping one.
    ///
    /// The whole operation happens under the shard lock, so it is atomic
    /// with respect to every other operation on this user.
    ///
    /// Returns the number of sessions revoked.
    pub async fn revoke_all(&self, user_id: Uuid, keep: Option<Uuid>) -> usize {
        let shard = self.shard(user_id);
        let mut shard = shard.lock().await;
        let mut revoked = 0;
        for session in shard.sessions.values_mut() {
            if Some(session.id) == keep || session.revoked {
                continue;
            }
            session.revoked = true;
            revoked += 1;
        }
        revoked
    }

    /// Lists a user's live sessions, most recently active first.
    ///
    /// Reads only this user's shard; revoked and expired records are
    /// filtered out (and dropped from the shard while we hold the lock).
    pub async fn list(&self, user_id: Uuid) -> Vec<SessionRecord> {
        let shard = self.shard(user_id);
        let mut shard = shard.lock().await;
        shard.sessions.retain(|_, s| !s.is_expired());

        let mut sessions: Vec<SessionRecord> = shard
            .sessions
            .values()
            .filter(|s| s.is_live())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(3600))
    }

    fn new_session(name: &str) -> NewSession {
        NewSession {
            fingerprint: format!("fp-{name}"),
            device_name: name.to_string(),
            ip: Some("1.2.3.4".to_string()),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_validate() {
        let store = store();
        let user = Uuid::new_v4();

        let session = store.create(user, new_session("laptop")).await;
        let validated = store.validate(user, session.id).await.unwrap();
        assert_eq!(validated.id, session.id);
        assert!(validated.last_active_at >= session.last_active_at);
    }

    #[tokio::test]
    async fn test_validate_unknown_or_revoked() {
        let store = store();
        let user = Uuid::new_v4();

        assert!(store.validate(user, Uuid::new_v4()).await.is_none());

        let session = store.create(user, new_session("laptop")).await;
        assert!(store.revoke(user, session.id).await);
        assert!(store.validate(user, session.id).await.is_none());

        // Idempotent
        assert!(!store.revoke(user, session.id).await);
    }

    #[tokio::test]
    async fn test_revoke_does_not_affect_siblings() {
        let store = store();
        let user = Uuid::new_v4();

        let a = store.create(user, new_session("laptop")).await;
        let b = store.create(user, new_session("phone")).await;

        store.revoke(user, a.id).await;
        assert!(store.validate(user, a.id).await.is_none());
        assert!(store.validate(user, b.id).await.is_some());
    }

    #[tokio::test]
    async fn test_revoke_all_with_keep() {
        let store = store();
        let user = Uuid::new_v4();

        let keep = store.create(user, new_session("laptop")).await;
        store.create(user, new_session("phone")).await;
        store.create(user, new_session("tablet")).await;

        let revoked = store.revoke_all(user, Some(keep.id)).await;
        assert_eq!(revoked, 2);

        let live = store.list(user).await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, keep.id);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store.create(alice, new_session("laptop")).await;
        let bob_session = store.create(bob, new_session("phone")).await;

        // Revoking everything of Alice's leaves Bob untouched.
        let revoked = store.revoke_all(alice, None).await;
        assert_eq!(revoked, 1);
        assert!(store.validate(bob, bob_session.id).await.is_some());
        assert_eq!(store.list(bob).await.len(), 1);
        assert!(store.list(alice).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_by_activity_and_filters() {
        let store = store();
        let user = Uuid::new_v4();

        let a = store.create(user, new_session("a")).await;
        let b = store.create(user, new_session("b")).await;

        // Touch `a` so it becomes the most recent.
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.validate(user, a.id).await.unwrap();

        let list = store.list(user).await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, a.id);
        assert_eq!(list[1].id, b.id);
    }

    #[tokio::test]
    async fn test_serial_ordering_within_a_user() {
        let store = Arc::new(store());
        let user = Uuid::new_v4();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.create(user, new_session(&format!("d{i}"))).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Listing observes every preceding mutation.
        assert_eq!(store.list(user).await.len(), 16);
    }
}
