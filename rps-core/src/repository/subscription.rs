use crate::types::Game;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Live subscription counts per game
#[derive(Debug, Default, Clone)]
pub struct SubscriptionTracker {
    counts: Arc<Mutex<HashMap<Uuid, usize>>>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, game_id: Uuid) -> SubscriptionGuard {
        *self.counts.lock().entry(game_id).or_insert(0) += 1;
        SubscriptionGuard {
            tracker: self.clone(),
            game_id,
        }
    }

    fn unregister(&self, game_id: &Uuid) {
        let mut counts = self.counts.lock();
        if let Some(count) = counts.get_mut(game_id) {
            if *count > 1 {
                *count -= 1;
            } else {
                counts.remove(game_id);
            }
        }
    }

    pub fn count(&self, game_id: &Uuid) -> usize {
        self.counts.lock().get(game_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.lock().values().sum()
    }
}

pub struct SubscriptionGuard {
    tracker: SubscriptionTracker,
    game_id: Uuid,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.tracker.unregister(&self.game_id);
    }
}

/// Change feed for a single game.
///
/// Yields every newer revision of the game row. Dropping the handle (or
/// calling [`GameSubscription::unsubscribe`]) stops the watcher task right
/// away, so no stale notification is delivered afterwards.
pub struct GameSubscription {
    game_id: Uuid,
    receiver: mpsc::Receiver<Game>,
    task: JoinHandle<()>,
    _guard: SubscriptionGuard,
}

impl GameSubscription {
    pub fn new(
        game_id: Uuid,
        receiver: mpsc::Receiver<Game>,
        task: JoinHandle<()>,
        guard: SubscriptionGuard,
    ) -> Self {
        Self {
            game_id,
            receiver,
            task,
            _guard: guard,
        }
    }

    pub fn game_id(&self) -> Uuid {
        self.game_id
    }

    /// Next revision, or `None` once the feed has ended
    pub async fn next(&mut self) -> Option<Game> {
        self.receiver.recv().await
    }

    /// Revision already queued, if any
    pub fn try_next(&mut self) -> Option<Game> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        tracing::debug!("Unsubscribed from game {}", self.game_id);
    }
}

impl Drop for GameSubscription {
    fn drop(&mut self) {
        self.task.abort();
        self.receiver.close();
    }
}

impl std::fmt::Debug for GameSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSubscription")
            .field("game_id", &self.game_id)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_guards() {
        let tracker = SubscriptionTracker::new();
        let id = Uuid::new_v4();

        let first = tracker.register(id);
        let second = tracker.register(id);
        assert_eq!(tracker.count(&id), 2);

        drop(first);
        assert_eq!(tracker.count(&id), 1);
        drop(second);
        assert_eq!(tracker.count(&id), 0);
        assert_eq!(tracker.total(), 0);
    }
}
