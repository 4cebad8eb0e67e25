//! Health monitoring for instance pools

/// Health status of an instance pool
///
/// Utilization is measured against the admission limit, so an unbounded pool
/// always reports zero utilization.
///
/// # Examples
///
/// ```
/// use esox_instancepool::HealthStatus;
///
/// let health = HealthStatus::new(1, 3, 4, 0);
/// assert!(health.is_healthy());
/// assert_eq!(health.utilization, 0.75);
///
/// let saturated = HealthStatus::new(0, 4, 4, 0);
/// assert!(!saturated.is_healthy());
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Checked-out instances divided by the limit (0.0 to 1.0)
    pub utilization: f64,

    /// Idle instances count
    pub idle_instances: usize,

    /// Checked-out instances count
    pub active_instances: usize,

    /// Admission limit (0 = unbounded)
    pub limit: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    ///
    /// `abandoned` is the number of leases dropped without `put` since the
    /// previous check.
    pub fn new(idle: usize, active: usize, limit: usize, abandoned: usize) -> Self {
        let utilization = if limit > 0 {
            active as f64 / limit as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        // A saturated gate blocks every new caller
        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if abandoned > 0 {
            warnings.push(format!("{} lease(s) dropped without put since last check", abandoned));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            idle_instances: idle,
            active_instances: active,
            limit,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
