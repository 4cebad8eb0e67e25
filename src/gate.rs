//! Admission gate: a blocking counting semaphore bounding concurrent checkouts

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// Counting semaphore with a fixed number of slots.
///
/// `acquire` blocks while every slot is taken. There is no timeout: a permit
/// that is never released keeps its slot forever.
pub(crate) struct AdmissionGate {
    in_use: Mutex<usize>,
    signal: Condvar,
    capacity: usize,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            in_use: Mutex::new(0),
            signal: Condvar::new(),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub fn in_use(&self) -> usize {
        *self.in_use.lock()
    }

    /// Block until a slot is free and take it.
    pub fn acquire(self: &Arc<Self>) -> GatePermit {
        let mut in_use = self.in_use.lock();
        while *in_use >= self.capacity {
            self.signal.wait(&mut in_use);
        }
        *in_use += 1;
        GatePermit {
            gate: Arc::clone(self),
        }
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(self: &Arc<Self>) -> Option<GatePermit> {
        let mut in_use = self.in_use.lock();
        if *in_use >= self.capacity {
            return None;
        }
        *in_use += 1;
        Some(GatePermit {
            gate: Arc::clone(self),
        })
    }

    fn release(&self) {
        let mut in_use = self.in_use.lock();
        *in_use -= 1;
        drop(in_use);
        self.signal.notify_one();
    }
}

/// One occupied gate slot; released on drop.
pub(crate) struct GatePermit {
    gate: Arc<AdmissionGate>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn try_acquire_respects_capacity() {
        let gate = AdmissionGate::new(2);
        let a = gate.try_acquire();
        let b = gate.try_acquire();
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(gate.try_acquire().is_none());
        assert_eq!(gate.in_use(), 2);

        drop(a);
        assert_eq!(gate.in_use(), 1);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn acquire_blocks_until_release() {
        let gate = AdmissionGate::new(1);
        let held = gate.acquire();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let _permit = gate.acquire();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(held);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
        assert_eq!(gate.in_use(), 0);
    }
}
