//! # EsoxSolutions.InstancePool
//!
//! Thread-safe pool of reusable WebAssembly module instances for Rust.
//! A module is compiled once; instances are created lazily, reused across
//! callers and never handed to two callers at once.
//!
//! ## Features
//!
//! - One compiled template, many pooled instances
//! - Optional admission limit on concurrently checked-out instances
//! - Eager failure: a module that does not compile or instantiate fails at construction
//! - Leak recovery: a lease dropped without `put` disposes its instance and frees its slot
//! - Idle instances settle back down through an idle cap and eviction policies
//! - Per-instance export cache
//! - Async acquisition on tokio's blocking pool
//! - Health monitoring and metrics, with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_instancepool::{InstanceConfig, InstancePool, PoolOptions, RuntimeConfig, WasmRuntime};
//!
//! let wat = r#"(module (func (export "add") (param i32 i32) (result i64)
//!     local.get 0 local.get 1 i32.add i64.extend_i32_u))"#;
//!
//! let runtime = WasmRuntime::new(&RuntimeConfig::default()).unwrap();
//! let pool = InstancePool::new(
//!     runtime,
//!     wat.as_bytes(),
//!     InstanceConfig::default(),
//!     PoolOptions::new(),
//! )
//! .unwrap();
//!
//! let mut instance = pool.get().unwrap();
//! let sum: u64 = instance.call_typed("add", (1u32, 1u32)).unwrap();
//! assert_eq!(sum, 2);
//! pool.put(instance);
//! ```

mod backend;
mod cache;
mod config;
mod errors;
mod eviction;
mod factory;
mod free_list;
mod gate;
mod guard;
mod health;
mod metrics;
mod pool;
mod wasm;

pub use backend::{Backend, Resource};
pub use cache::AccessorCache;
pub use config::{InstanceConfig, PoolOptions, RuntimeConfig};
pub use errors::{BoxError, PoolError, PoolResult};
pub use eviction::EvictionPolicy;
pub use health::HealthStatus;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{InstancePool, Lease};
pub use wasm::{HostState, ModuleInstance, WasmRuntime};

pub use wasmtime::{Module, Val};
