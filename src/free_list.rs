//! Idle-instance free list with lazy growth and idle eviction

use crate::backend::Backend;
use crate::errors::PoolResult;
use crate::eviction::EvictionPolicy;
use crate::factory::Factory;
use crate::guard::Slot;

use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Where a slot handed out by [`FreeList::get`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Reused,
    Created,
}

/// Unordered, unbounded bag of idle slots. Misses fall through to the factory.
///
/// Idle slots that outlive the eviction policy, or that would push the idle
/// count past `max_idle`, are disposed instead of being handed out again.
pub(crate) struct FreeList<B: Backend> {
    factory: Factory<B>,
    idle: SegQueue<Slot<B::Resource>>,
    policy: EvictionPolicy,
    max_idle: Option<usize>,
    // Idle slots, counted before the push so the cap holds under concurrent puts.
    reserved: AtomicUsize,
    evicted: AtomicUsize,
}

impl<B: Backend> FreeList<B> {
    /// Build the list and seed it with one synchronously created slot, so that
    /// a template that cannot be instantiated fails here rather than later.
    pub fn seeded(
        factory: Factory<B>,
        policy: EvictionPolicy,
        max_idle: Option<usize>,
    ) -> PoolResult<Self> {
        let seed = factory.create()?;
        let idle = SegQueue::new();
        idle.push(seed);
        Ok(Self {
            factory,
            idle,
            policy,
            max_idle,
            reserved: AtomicUsize::new(1),
            evicted: AtomicUsize::new(0),
        })
    }

    pub fn factory(&self) -> &Factory<B> {
        &self.factory
    }

    pub fn get(&self) -> PoolResult<(Slot<B::Resource>, Origin)> {
        let now = Instant::now();
        while let Some(slot) = self.idle.pop() {
            self.reserved.fetch_sub(1, Ordering::AcqRel);
            if slot.is_expired(&self.policy, now) {
                self.evict(slot, "expired");
                continue;
            }
            return Ok((slot, Origin::Reused));
        }
        self.factory.create().map(|slot| (slot, Origin::Created))
    }

    pub fn put(&self, mut slot: Slot<B::Resource>) {
        let admitted = match self.max_idle {
            Some(max) => self
                .reserved
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
                .is_ok(),
            None => {
                self.reserved.fetch_add(1, Ordering::AcqRel);
                true
            }
        };
        if !admitted {
            self.evict(slot, "surplus");
            return;
        }
        slot.touch();
        self.idle.push(slot);
    }

    /// Dispose every idle slot the eviction policy has expired.
    pub fn evict_expired(&self) -> usize {
        if self.policy.is_none() {
            return 0;
        }

        let now = Instant::now();
        let mut evicted = 0;
        // Bounded by the length at entry so concurrent puts are not revisited.
        for _ in 0..self.idle.len() {
            let Some(slot) = self.idle.pop() else { break };
            if slot.is_expired(&self.policy, now) {
                self.reserved.fetch_sub(1, Ordering::AcqRel);
                self.evict(slot, "expired");
                evicted += 1;
            } else {
                self.idle.push(slot);
            }
        }
        evicted
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Idle slots disposed by eviction so far
    pub fn evicted(&self) -> usize {
        self.evicted.load(Ordering::Relaxed)
    }

    fn evict(&self, slot: Slot<B::Resource>, reason: &'static str) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(instance_id = slot.id(), reason, "evicting idle instance");
        // Dropping the slot disposes its resource.
    }
}
