//! Instance pool facade: admission, checkout, return and leak recovery

use crate::backend::Backend;
use crate::config::PoolOptions;
use crate::errors::{PoolError, PoolResult};
use crate::factory::Factory;
use crate::free_list::{FreeList, Origin};
use crate::gate::{AdmissionGate, GatePermit};
use crate::guard::Guard;
use crate::health::HealthStatus;
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};
use crate::wasm::WasmRuntime;

use dashmap::DashMap;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

struct Shared<B: Backend> {
    free: FreeList<B>,
    gate: Option<Arc<AdmissionGate>>,
    checked_out: DashMap<u64, ()>,
    metrics: MetricsTracker,
    // Abandonments already reported by `health`.
    reported_abandoned: AtomicUsize,
}

/// A checked-out instance.
///
/// Return it with [`Lease::put`] or [`InstancePool::put`]. A lease dropped
/// without being put back is treated as abandoned: its instance is disposed
/// and its admission slot is released.
pub struct Lease<B: Backend> {
    // Field order matters: the instance is disposed before the permit is released.
    guard: Guard<B::Resource>,
    permit: Option<GatePermit>,
    shared: Arc<Shared<B>>,
}

impl<B: Backend> Lease<B> {
    /// Pool-wide id of the leased instance
    pub fn id(&self) -> u64 {
        self.guard.slot().id()
    }

    /// Return the instance to the pool
    pub fn put(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(slot) = self.guard.disarm() {
            let id = slot.id();
            self.shared.checked_out.remove(&id);
            self.shared.free.put(slot);
            MetricsTracker::record(&self.shared.metrics.total_returned);
            tracing::trace!(instance_id = id, "returned instance to pool");
        }
        self.permit.take();
    }
}

impl<B: Backend> Deref for Lease<B> {
    type Target = B::Resource;

    fn deref(&self) -> &Self::Target {
        self.guard.slot().resource()
    }
}

impl<B: Backend> DerefMut for Lease<B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.slot_mut().resource_mut()
    }
}

impl<B: Backend> Drop for Lease<B> {
    fn drop(&mut self) {
        if self.guard.is_armed() {
            let id = self.guard.slot().id();
            tracing::warn!(instance_id = id, "lease dropped without put, disposing instance");
            self.shared.checked_out.remove(&id);
            MetricsTracker::record(&self.shared.metrics.abandoned);
        }
        // The armed guard and then the permit are dropped with the fields.
    }
}

/// Thread-safe pool of instances of one compiled template
///
/// Cloning is cheap and yields another handle to the same pool.
///
/// # Examples
///
/// ```
/// use esox_instancepool::{InstanceConfig, InstancePool, PoolOptions, RuntimeConfig, WasmRuntime};
///
/// let wat = r#"(module (func (export "add") (param i32 i32) (result i64)
///     local.get 0 local.get 1 i32.add i64.extend_i32_u))"#;
///
/// let runtime = WasmRuntime::new(&RuntimeConfig::default()).unwrap();
/// let pool = InstancePool::new(
///     runtime,
///     wat.as_bytes(),
///     InstanceConfig::default(),
///     PoolOptions::new().with_limit(4),
/// )
/// .unwrap();
///
/// let sum = pool
///     .run(|instance| instance.call_typed::<(u32, u32), u64>("add", (1, 1)))
///     .unwrap()
///     .unwrap();
/// assert_eq!(sum, 2);
/// ```
pub struct InstancePool<B: Backend = WasmRuntime> {
    shared: Arc<Shared<B>>,
}

impl<B: Backend> Clone for InstancePool<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: Backend> InstancePool<B> {
    /// Compile `bytes`, instantiate one seed instance and build the pool.
    ///
    /// Fails with [`PoolError::Compile`] or [`PoolError::Instantiation`]
    /// before any pool exists.
    pub fn new(
        backend: B,
        bytes: &[u8],
        config: B::Config,
        options: PoolOptions,
    ) -> PoolResult<Self> {
        let factory = Factory::new(backend, bytes, config)?;
        let free = FreeList::seeded(factory, options.eviction, options.max_idle)?;

        let metrics = MetricsTracker::new();
        MetricsTracker::record(&metrics.instances_created);

        tracing::info!(
            limit = options.limit.unwrap_or(0),
            max_idle = options.max_idle.unwrap_or(0),
            eviction = ?options.eviction,
            "instance pool ready"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                free,
                gate: options.limit.map(AdmissionGate::new),
                checked_out: DashMap::new(),
                metrics,
                reported_abandoned: AtomicUsize::new(0),
            }),
        })
    }

    /// Check out an instance, blocking while the admission limit is reached.
    ///
    /// There is no timeout. With a limit set, every lease must eventually be
    /// put back or dropped, or later callers wait forever.
    pub fn get(&self) -> PoolResult<Lease<B>> {
        let permit = self.shared.gate.as_ref().map(|gate| gate.acquire());
        self.checkout(permit)
    }

    /// Check out an instance without blocking
    pub fn try_get(&self) -> PoolResult<Lease<B>> {
        let permit = match &self.shared.gate {
            Some(gate) => Some(gate.try_acquire().ok_or(PoolError::LimitReached)?),
            None => None,
        };
        self.checkout(permit)
    }

    /// Check out an instance from async code.
    ///
    /// The blocking wait runs on tokio's blocking pool. If this future is
    /// dropped early, the lease it eventually obtains is put back into the
    /// pool, so neither the instance nor its admission slot is lost.
    pub async fn get_async(&self) -> PoolResult<Lease<B>> {
        let pool = self.clone();
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            if let Err(Ok(lease)) = tx.send(pool.get()) {
                tracing::debug!(instance_id = lease.id(), "async caller gone, returning instance");
                lease.put();
            }
        });
        rx.await.map_err(|_| PoolError::Cancelled)?
    }

    /// Return an instance to the pool
    pub fn put(&self, lease: Lease<B>) {
        if !Arc::ptr_eq(&self.shared, &lease.shared) {
            tracing::warn!(
                instance_id = lease.id(),
                "lease returned through a different pool handle"
            );
        }
        lease.put();
    }

    /// Run `f` with a checked-out instance, putting it back on every exit path.
    ///
    /// A panic inside `f` is resumed after the instance has been returned.
    pub fn run<T, F>(&self, f: F) -> PoolResult<T>
    where
        F: FnOnce(&mut B::Resource) -> T,
    {
        let mut lease = self.get()?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *lease)));
        lease.put();
        match outcome {
            Ok(value) => Ok(value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// The compiled template shared by every instance
    pub fn compiled(&self) -> &B::Template {
        self.shared.free.factory().template()
    }

    /// Admission limit (0 = unbounded)
    pub fn limit(&self) -> usize {
        self.shared.gate.as_ref().map_or(0, |gate| gate.capacity())
    }

    pub fn active_count(&self) -> usize {
        self.shared.checked_out.len()
    }

    pub fn idle_count(&self) -> usize {
        self.shared.free.idle_count()
    }

    /// Dispose idle instances the eviction policy has expired.
    ///
    /// Checkout already skips expired instances; this sweeps the rest.
    pub fn evict_expired(&self) -> usize {
        self.shared.free.evict_expired()
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        self.shared.metrics.get_metrics(
            self.active_count(),
            self.idle_count(),
            self.limit(),
            self.shared.free.evicted(),
        )
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }

    /// Get health status
    ///
    /// Abandoned leases are reported once, by the first health check after
    /// they were dropped.
    pub fn health(&self) -> HealthStatus {
        let abandoned = self.shared.metrics.abandoned.load(Ordering::Relaxed);
        let reported = self.shared.reported_abandoned.fetch_max(abandoned, Ordering::Relaxed);
        let recent = abandoned.saturating_sub(reported);
        HealthStatus::new(self.idle_count(), self.active_count(), self.limit(), recent)
    }

    fn checkout(&self, permit: Option<GatePermit>) -> PoolResult<Lease<B>> {
        let (slot, origin) = match self.shared.free.get() {
            Ok(found) => found,
            Err(err) => {
                // The permit is released on return; nothing was left checked out.
                MetricsTracker::record(&self.shared.metrics.instantiation_failures);
                tracing::warn!(error = %err, "lazy instantiation failed");
                return Err(err);
            }
        };

        if origin == Origin::Created {
            MetricsTracker::record(&self.shared.metrics.instances_created);
        }
        MetricsTracker::record(&self.shared.metrics.total_retrieved);

        let id = slot.id();
        let reused = origin == Origin::Reused;
        self.shared.checked_out.insert(id, ());
        tracing::trace!(instance_id = id, reused, "checked out instance");

        Ok(Lease {
            guard: Guard::arm(slot),
            permit,
            shared: Arc::clone(&self.shared),
        })
    }
}
