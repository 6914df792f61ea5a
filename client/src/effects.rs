//! Shockwave effect lifecycle
//!
//! Each effect gets a one-shot timer task that reports its id on the expiry
//! channel once its lifetime has elapsed. The controller removes effects by
//! id when those reports arrive, so expiry never touches session state
//! directly. Timers are not cancelled individually; outstanding ones are
//! aborted when the manager is dropped.

use crate::state::{Effect, EffectId};
use log::debug;
use shared::{Color, Position};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

pub type ExpiryReceiver = mpsc::UnboundedReceiver<EffectId>;

pub struct EffectManager {
    next_id: u64,
    lifetime: Duration,
    expiry_tx: mpsc::UnboundedSender<EffectId>,
    timers: HashMap<EffectId, JoinHandle<()>>,
}

impl EffectManager {
    /// Must be used from within a tokio runtime.
    pub fn new(lifetime: Duration) -> (Self, ExpiryReceiver) {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();

        let manager = Self {
            next_id: 0,
            lifetime,
            expiry_tx,
            timers: HashMap::new(),
        };

        (manager, expiry_rx)
    }

    /// Creates an effect and schedules its expiry.
    pub fn spawn(&mut self, pos: Position, color: Color) -> Effect {
        let id = EffectId(self.next_id);
        self.next_id += 1;

        let spawned_at = Instant::now();
        let deadline = spawned_at + self.lifetime;
        let expiry_tx = self.expiry_tx.clone();

        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            // Receiver gone means the session runtime is shutting down.
            let _ = expiry_tx.send(id);
        });

        self.timers.retain(|_, timer| !timer.is_finished());
        self.timers.insert(id, handle);
        debug!("Effect {} spawned, expires in {:?}", id, self.lifetime);

        Effect {
            id,
            pos,
            color,
            spawned_at,
        }
    }

    /// Forgets the timer of an expired effect.
    pub fn expired(&mut self, id: EffectId) {
        self.timers.remove(&id);
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

impl Drop for EffectManager {
    fn drop(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_are_monotonic() {
        let (mut manager, _rx) = EffectManager::new(Duration::from_millis(1000));
        let a = manager.spawn(Position::new(0.0, 0.0), shared::color_for(0));
        let b = manager.spawn(Position::new(1.0, 1.0), shared::color_for(1));
        let c = manager.spawn(Position::new(2.0, 2.0), shared::color_for(2));

        assert!(a.id < b.id && b.id < c.id);
        assert_eq!(manager.pending(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_never_early() {
        let (mut manager, mut rx) = EffectManager::new(Duration::from_millis(1000));
        let effect = manager.spawn(Position::new(10.0, 20.0), shared::color_for(3));

        tokio::time::advance(Duration::from_millis(999)).await;
        settle().await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        tokio::time::advance(Duration::from_millis(1)).await;
        let expired = rx.recv().await.unwrap();
        assert_eq!(expired, effect.id);
        assert!(Instant::now() >= effect.spawned_at + Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_order_follows_creation() {
        let (mut manager, mut rx) = EffectManager::new(Duration::from_millis(1000));
        let first = manager.spawn(Position::new(0.0, 0.0), shared::color_for(0));
        tokio::time::advance(Duration::from_millis(300)).await;
        let second = manager.spawn(Position::new(0.0, 0.0), shared::color_for(0));

        assert_eq!(rx.recv().await.unwrap(), first.id);
        assert_eq!(rx.recv().await.unwrap(), second.id);

        manager.expired(first.id);
        manager.expired(second.id);
        manager.expired(second.id);
        assert_eq!(manager.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_timers() {
        let (mut manager, mut rx) = EffectManager::new(Duration::from_millis(1000));
        manager.spawn(Position::new(0.0, 0.0), shared::color_for(0));
        drop(manager);

        tokio::time::advance(Duration::from_millis(2000)).await;
        settle().await;
        assert!(rx.recv().await.is_none());
    }
}
