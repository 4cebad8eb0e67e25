//! Lifecycle bookkeeping: exactly-once disposal and abandonment detection

use crate::backend::Resource;
use crate::eviction::{EvictionPolicy, Timestamps};

use std::time::Instant;

/// A resource tagged with its pool-wide id.
///
/// The resource is disposed when the slot is dropped, unless it was already
/// disposed explicitly. Disposal runs at most once.
pub(crate) struct Slot<R: Resource> {
    id: u64,
    resource: Option<R>,
    stamps: Timestamps,
}

impl<R: Resource> Slot<R> {
    pub fn new(id: u64, resource: R) -> Self {
        Self {
            id,
            resource: Some(resource),
            stamps: Timestamps::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mark the slot as used just now.
    pub fn touch(&mut self) {
        self.stamps.touch();
    }

    pub fn is_expired(&self, policy: &EvictionPolicy, now: Instant) -> bool {
        self.stamps.is_expired(policy, now)
    }

    pub fn resource(&self) -> &R {
        self.resource.as_ref().expect("slot already disposed")
    }

    pub fn resource_mut(&mut self) -> &mut R {
        self.resource.as_mut().expect("slot already disposed")
    }

    /// Dispose the resource. Returns `false` if it was already gone.
    pub fn dispose(&mut self) -> bool {
        match self.resource.take() {
            Some(resource) => {
                resource.dispose();
                true
            }
            None => false,
        }
    }
}

impl<R: Resource> Drop for Slot<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Wraps a checked-out slot. Dropping an armed guard disposes the slot.
pub(crate) struct Guard<R: Resource> {
    slot: Option<Slot<R>>,
}

impl<R: Resource> Guard<R> {
    pub fn arm(slot: Slot<R>) -> Self {
        Self { slot: Some(slot) }
    }

    pub fn is_armed(&self) -> bool {
        self.slot.is_some()
    }

    pub fn slot(&self) -> &Slot<R> {
        self.slot.as_ref().expect("guard already disarmed")
    }

    pub fn slot_mut(&mut self) -> &mut Slot<R> {
        self.slot.as_mut().expect("guard already disarmed")
    }

    /// Take the slot back without disposing it.
    pub fn disarm(&mut self) -> Option<Slot<R>> {
        self.slot.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counted(Arc<AtomicUsize>);

    impl Resource for Counted {
        fn dispose(self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn slot_disposes_once_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut slot = Slot::new(7, Counted(Arc::clone(&count)));
        assert_eq!(slot.id(), 7);

        assert!(slot.dispose());
        assert!(!slot.dispose());
        drop(slot);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn slot_expires_after_idle_timeout() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut slot = Slot::new(3, Counted(Arc::clone(&count)));
        let policy = EvictionPolicy::IdleTimeout(Duration::from_secs(10));

        let later = Instant::now() + Duration::from_secs(11);
        assert!(slot.is_expired(&policy, later));
        slot.touch();
        assert!(slot.is_expired(&policy, later + Duration::from_secs(11)));
        assert!(!slot.is_expired(&policy, Instant::now()));
    }

    #[test]
    fn dropping_armed_guard_disposes() {
        let count = Arc::new(AtomicUsize::new(0));
        let guard = Guard::arm(Slot::new(1, Counted(Arc::clone(&count))));
        assert!(guard.is_armed());
        drop(guard);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disarmed_guard_leaves_slot_alive() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut guard = Guard::arm(Slot::new(1, Counted(Arc::clone(&count))));
        let slot = guard.disarm().unwrap();
        assert!(!guard.is_armed());
        drop(guard);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        drop(slot);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
