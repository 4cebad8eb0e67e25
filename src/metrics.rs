//! Metrics collection and export for instance pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Snapshot of a pool's counters and gauges
///
/// # Examples
///
/// ```
/// use esox_instancepool::{InstanceConfig, InstancePool, PoolOptions, RuntimeConfig, WasmRuntime};
///
/// let runtime = WasmRuntime::new(&RuntimeConfig::default()).unwrap();
/// let pool = InstancePool::new(
///     runtime,
///     b"(module)",
///     InstanceConfig::default(),
///     PoolOptions::new(),
/// )
/// .unwrap();
///
/// let lease = pool.get().unwrap();
/// let metrics = pool.metrics();
/// assert_eq!(metrics.instances_created, 1);
/// assert_eq!(metrics.active_instances, 1);
/// pool.put(lease);
/// assert_eq!(pool.metrics().total_returned, 1);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Instances created, including the construction seed
    pub instances_created: usize,

    /// Total successful checkouts
    pub total_retrieved: usize,

    /// Total instances returned with `put`
    pub total_returned: usize,

    /// Leases dropped without `put`; their instances were disposed
    pub abandoned: usize,

    /// Lazy instantiations that failed inside `get`
    pub instantiation_failures: usize,

    /// Idle instances disposed by eviction or the idle cap
    pub evicted: usize,

    /// Instances currently checked out
    pub active_instances: usize,

    /// Instances currently idle in the free list
    pub idle_instances: usize,

    /// Admission limit (0 = unbounded)
    pub limit: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("instances_created".to_string(), self.instances_created.to_string());
        metrics.insert("total_retrieved".to_string(), self.total_retrieved.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("abandoned".to_string(), self.abandoned.to_string());
        metrics.insert(
            "instantiation_failures".to_string(),
            self.instantiation_failures.to_string(),
        );
        metrics.insert("evicted".to_string(), self.evicted.to_string());
        metrics.insert("active_instances".to_string(), self.active_instances.to_string());
        metrics.insert("idle_instances".to_string(), self.idle_instances.to_string());
        metrics.insert("limit".to_string(), self.limit.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let labels = Self::format_labels(pool_name, tags);
        let mut output = String::new();

        let gauges = [
            (
                "instancepool_instances_active",
                "Instances currently checked out",
                metrics.active_instances,
            ),
            (
                "instancepool_instances_idle",
                "Instances idle in the free list",
                metrics.idle_instances,
            ),
            ("instancepool_limit", "Admission limit (0 = unbounded)", metrics.limit),
        ];
        for (name, help, value) in gauges {
            Self::write_metric(&mut output, name, help, "gauge", &labels, value);
        }

        let counters = [
            (
                "instancepool_instances_created_total",
                "Instances created",
                metrics.instances_created,
            ),
            ("instancepool_retrieved_total", "Total checkouts", metrics.total_retrieved),
            ("instancepool_returned_total", "Total returns", metrics.total_returned),
            ("instancepool_abandoned_total", "Leases dropped without put", metrics.abandoned),
            (
                "instancepool_instantiation_failures_total",
                "Failed lazy instantiations",
                metrics.instantiation_failures,
            ),
            ("instancepool_evicted_total", "Idle instances evicted", metrics.evicted),
        ];
        for (name, help, value) in counters {
            Self::write_metric(&mut output, name, help, "counter", &labels, value);
        }

        output
    }

    fn write_metric(
        output: &mut String,
        name: &str,
        help: &str,
        kind: &str,
        labels: &str,
        value: usize,
    ) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, kind));
        output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut tags: Vec<_> = tags.iter().collect();
            tags.sort();
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub instances_created: AtomicUsize,
    pub total_retrieved: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub abandoned: AtomicUsize,
    pub instantiation_failures: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(
        &self,
        active: usize,
        idle: usize,
        limit: usize,
        evicted: usize,
    ) -> PoolMetrics {
        PoolMetrics {
            instances_created: self.instances_created.load(Ordering::Relaxed),
            total_retrieved: self.total_retrieved.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            instantiation_failures: self.instantiation_failures.load(Ordering::Relaxed),
            evicted,
            active_instances: active,
            idle_instances: idle,
            limit,
        }
    }
}
