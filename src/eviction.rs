//! Eviction policies for idle instances

use std::time::{Duration, Instant};

/// Eviction policy for idle pool instances
///
/// Expired instances are disposed when the free list comes across them: on
/// checkout, or during [`InstancePool::evict_expired`](crate::InstancePool::evict_expired).
///
/// # Examples
///
/// ```
/// use esox_instancepool::{EvictionPolicy, PoolOptions};
/// use std::time::Duration;
///
/// let options = PoolOptions::new().with_idle_timeout(Duration::from_secs(30));
/// assert_eq!(options.eviction, EvictionPolicy::IdleTimeout(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Idle instances are kept until the pool is dropped
    #[default]
    None,

    /// Instances expire a fixed duration after they were created
    TimeToLive(Duration),

    /// Instances expire after sitting idle this long
    IdleTimeout(Duration),

    /// Either limit expires the instance
    Combined {
        ttl: Duration,
        idle_timeout: Duration,
    },
}

impl EvictionPolicy {
    pub fn is_none(&self) -> bool {
        matches!(self, EvictionPolicy::None)
    }
}

/// Lifecycle timestamps of one instance
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timestamps {
    pub created_at: Instant,
    pub last_used: Instant,
}

impl Timestamps {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            created_at: now,
            last_used: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    pub fn is_expired(&self, policy: &EvictionPolicy, now: Instant) -> bool {
        let age = now.saturating_duration_since(self.created_at);
        let idle = now.saturating_duration_since(self.last_used);
        match policy {
            EvictionPolicy::None => false,
            EvictionPolicy::TimeToLive(ttl) => age > *ttl,
            EvictionPolicy::IdleTimeout(timeout) => idle > *timeout,
            EvictionPolicy::Combined { ttl, idle_timeout } => age > *ttl || idle > *idle_timeout,
        }
    }
}
