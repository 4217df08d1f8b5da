use std::collections::HashMap;
use std::sync::Arc;
use storage::models::LeaderboardKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per (category, period). Every read-modify-write of a
/// stored leaderboard holds the guard for its key.
#[derive(Default)]
pub struct LeaderboardLocks {
    registry: Mutex<HashMap<LeaderboardKey, Arc<Mutex<()>>>>,
}

impl LeaderboardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: LeaderboardKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut registry = self.registry.lock().await;
            registry.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }
}
