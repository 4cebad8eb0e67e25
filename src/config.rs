//! Pool, runtime and instance configuration options

use crate::eviction::EvictionPolicy;

use std::collections::BTreeMap;
use std::time::Duration;

/// Options controlling pool behavior
///
/// # Examples
///
/// ```
/// use esox_instancepool::PoolOptions;
/// use std::time::Duration;
///
/// let options = PoolOptions::new().with_limit(4);
/// assert_eq!(options.limit, Some(4));
///
/// // Zero means unbounded, same as the default
/// let options = PoolOptions::new().with_limit(0);
/// assert_eq!(options.limit, None);
///
/// // Let a burst of idle instances settle back down
/// let options = PoolOptions::new()
///     .with_max_idle(8)
///     .with_idle_timeout(Duration::from_secs(60));
/// assert_eq!(options.max_idle, Some(8));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PoolOptions {
    /// Maximum number of instances checked out simultaneously (`None` = unbounded)
    pub limit: Option<usize>,

    /// Maximum number of idle instances kept; surplus returns are disposed
    pub max_idle: Option<usize>,

    /// When idle instances expire
    pub eviction: EvictionPolicy,
}

impl PoolOptions {
    /// Create options with default values (unbounded)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the admission limit. A limit below 1 disables the gate.
    pub fn with_limit(mut self, n: usize) -> Self {
        self.limit = if n < 1 { None } else { Some(n) };
        self
    }

    /// Cap the number of idle instances. A cap below 1 disables it.
    pub fn with_max_idle(mut self, n: usize) -> Self {
        self.max_idle = if n < 1 { None } else { Some(n) };
        self
    }

    pub fn with_eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    /// Dispose instances that sit idle longer than `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.eviction = match self.eviction {
            EvictionPolicy::TimeToLive(ttl) | EvictionPolicy::Combined { ttl, .. } => {
                EvictionPolicy::Combined {
                    ttl,
                    idle_timeout: timeout,
                }
            }
            _ => EvictionPolicy::IdleTimeout(timeout),
        };
        self
    }

    /// Dispose instances older than `ttl` instead of reusing them.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.eviction = match self.eviction {
            EvictionPolicy::IdleTimeout(idle_timeout)
            | EvictionPolicy::Combined { idle_timeout, .. } => {
                EvictionPolicy::Combined { ttl, idle_timeout }
            }
            _ => EvictionPolicy::TimeToLive(ttl),
        };
        self
    }
}

/// Engine-wide settings for [`WasmRuntime`](crate::WasmRuntime)
///
/// # Examples
///
/// ```
/// use esox_instancepool::RuntimeConfig;
///
/// let config = RuntimeConfig::new().with_fuel_metering(true).with_wasi(false);
/// assert!(config.consume_fuel);
/// assert!(!config.link_wasi);
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Meter execution with fuel; instances then need a fuel budget per call
    pub consume_fuel: bool,

    /// Link WASI preview1 imports into every instance
    pub link_wasi: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            consume_fuel: false,
            link_wasi: true,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fuel_metering(mut self, enabled: bool) -> Self {
        self.consume_fuel = enabled;
        self
    }

    pub fn with_wasi(mut self, enabled: bool) -> Self {
        self.link_wasi = enabled;
        self
    }
}

/// Settings applied identically to every module instance in a pool
///
/// # Examples
///
/// ```
/// use esox_instancepool::InstanceConfig;
///
/// let config = InstanceConfig::new()
///     .with_args(["app", "--quiet"])
///     .with_env("MODE", "pooled")
///     .with_max_memory_bytes(16 * 1024 * 1024)
///     .with_fuel(100_000);
///
/// assert_eq!(config.args.len(), 2);
/// assert_eq!(config.env.get("MODE").map(String::as_str), Some("pooled"));
/// assert_eq!(config.fuel, Some(100_000));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InstanceConfig {
    /// Command-line arguments visible through WASI
    pub args: Vec<String>,

    /// Environment variables visible through WASI
    pub env: BTreeMap<String, String>,

    /// Inherit the host's stdin, stdout and stderr
    pub inherit_stdio: bool,

    /// Linear memory cap per instance, in bytes
    pub max_memory_bytes: Option<usize>,

    /// Fuel budget granted before each call (only with fuel metering)
    pub fuel: Option<u64>,
}

impl InstanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_inherited_stdio(mut self) -> Self {
        self.inherit_stdio = true;
        self
    }

    pub fn with_max_memory_bytes(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = Some(fuel);
        self
    }
}
