//! One-shot collision signal shared between the contact sensor and the controller
//!
//! The sensor side writes through [`CollisionLatch::on_contact`]; writes are
//! dropped unless the latch is armed. The controller arms the latch once the
//! arm has reached its initial pose and disarms it when it consumes a
//! collision, so at most one collision is charged per episode.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Raw sensor value that means "in contact"
pub const CONTACT: u16 = 1;

/// Single-producer, single-consumer collision flag with a receive gate
#[derive(Debug, Default)]
pub struct CollisionLatch {
    receiving: AtomicBool,
    signal: AtomicU16,
}

impl CollisionLatch {
    /// A disarmed latch with no pending signal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting sensor values
    pub fn arm(&self) {
        self.receiving.store(true, Ordering::SeqCst);
    }

    /// Stop accepting sensor values. A pending signal is kept.
    pub fn disarm(&self) {
        self.receiving.store(false, Ordering::SeqCst);
    }

    /// Whether sensor values are currently accepted
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.receiving.load(Ordering::SeqCst)
    }

    /// Producer side. Stores the latest sensor value while armed; returns
    /// whether the value was accepted.
    pub fn on_contact(&self, value: u16) -> bool {
        if self.is_armed() {
            self.signal.store(value, Ordering::SeqCst);
            true
        } else {
            trace!(value, "contact dropped while latch disarmed");
            false
        }
    }

    /// Whether a collision is pending
    #[must_use]
    pub fn triggered(&self) -> bool {
        self.signal.load(Ordering::SeqCst) == CONTACT
    }

    /// Drop any pending signal
    pub fn clear(&self) {
        self.signal.store(0, Ordering::SeqCst);
    }

    /// Consumer side: disarm and clear in one go, reporting whether a
    /// collision was pending.
    pub fn consume(&self) -> bool {
        self.disarm();
        self.signal.swap(0, Ordering::SeqCst) == CONTACT
    }
}

/// Forward every value received on `contacts` into `latch` until the sender
/// side is dropped.
pub fn spawn_collision_listener(
    latch: Arc<CollisionLatch>,
    mut contacts: mpsc::Receiver<u16>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(value) = contacts.recv().await {
            if latch.on_contact(value) {
                debug!(value, "contact latched");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contacts_outside_the_window_are_dropped() {
        let latch = CollisionLatch::new();
        assert!(!latch.on_contact(CONTACT));
        assert!(!latch.triggered());

        latch.arm();
        assert!(latch.on_contact(CONTACT));
        assert!(latch.triggered());
    }

    #[test]
    fn consume_disarms_and_clears() {
        let latch = CollisionLatch::new();
        latch.arm();
        latch.on_contact(CONTACT);

        assert!(latch.consume());
        assert!(!latch.is_armed());
        assert!(!latch.triggered());

        // a second contact in the same episode is ignored
        assert!(!latch.on_contact(CONTACT));
        assert!(!latch.consume());
    }

    #[test]
    fn latest_value_wins_while_armed() {
        let latch = CollisionLatch::new();
        latch.arm();
        latch.on_contact(CONTACT);
        latch.on_contact(0);
        assert!(!latch.triggered());
    }

    #[tokio::test]
    async fn listener_feeds_the_latch() {
        let latch = Arc::new(CollisionLatch::new());
        latch.arm();
        let (tx, rx) = mpsc::channel(4);
        let handle = spawn_collision_listener(Arc::clone(&latch), rx);

        tx.send(CONTACT).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(latch.triggered());
    }
}
