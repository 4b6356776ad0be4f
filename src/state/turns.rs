use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// One async lock per session so turns on a session run one at a time,
/// each seeing the transcript the previous one wrote.
#[derive(Clone, Default)]
pub struct TurnLocks {
    sessions: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl TurnLocks {
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut sessions = self
                .sessions
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Nobody holds or waits on a lock whose only owner is the map.
            sessions.retain(|_, lock| Arc::strong_count(lock) > 1);
            sessions.entry(session_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn active(&self) -> usize {
        self.sessions
            .lock()
            .map(|sessions| {
                sessions
                    .values()
                    .filter(|lock| Arc::strong_count(lock) > 1)
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_session_waits_for_the_running_turn() {
        let locks = TurnLocks::default();
        let guard = locks.acquire("s1").await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire("s1")).await;
        assert!(blocked.is_err());

        drop(guard);
        let again = tokio::time::timeout(Duration::from_millis(50), locks.acquire("s1")).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn other_sessions_are_not_blocked() {
        let locks = TurnLocks::default();
        let _guard = locks.acquire("s1").await;

        let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire("s2")).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let locks = TurnLocks::default();
        drop(locks.acquire("s1").await);
        let _guard = locks.acquire("s2").await;

        assert_eq!(locks.active(), 1);
        assert_eq!(locks.sessions.lock().unwrap().len(), 1);
    }
}
