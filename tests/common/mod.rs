//! Shared fixtures for instance pool integration tests.

#![allow(dead_code)]

use dashmap::DashMap;
use esox_instancepool::{Backend, PoolError, PoolResult, Resource};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Module with two exports: `add` and `mul`, both `(u32, u32) -> u64`.
pub const ADD_WAT: &str = r#"
(module
  (func (export "add") (param i32 i32) (result i64)
    local.get 0
    local.get 1
    i32.add
    i64.extend_i32_u)
  (func (export "mul") (param i32 i32) (result i64)
    local.get 0
    i64.extend_i32_u
    local.get 1
    i64.extend_i32_u
    i64.mul))
"#;

/// Module that keeps per-instance state in a global.
pub const COUNTER_WAT: &str = r#"
(module
  (global $n (mut i32) (i32.const 0))
  (func (export "bump") (result i32)
    global.get $n
    i32.const 1
    i32.add
    global.set $n
    global.get $n))
"#;

/// Module that calls a WASI import before adding.
pub const WASI_WAT: &str = r#"
(module
  (import "wasi_snapshot_preview1" "sched_yield" (func $yield (result i32)))
  (memory (export "memory") 1)
  (func (export "yield_add") (param i32 i32) (result i64)
    call $yield
    drop
    local.get 0
    local.get 1
    i32.add
    i64.extend_i32_u))
"#;

/// Same call as `WASI_WAT`, but WASI host functions need an exported memory.
pub const WASI_WITHOUT_MEMORY_WAT: &str = r#"
(module
  (import "wasi_snapshot_preview1" "sched_yield" (func $yield (result i32)))
  (func (export "yield_add") (param i32 i32) (result i64)
    call $yield
    drop
    local.get 0
    local.get 1
    i32.add
    i64.extend_i32_u))
"#;

/// Module that sleeps on the monotonic clock through `poll_oneoff`.
///
/// `microsleep(us)` returns the WASI errno (0 on success).
pub const SLEEP_WAT: &str = r#"
(module
  (import "wasi_snapshot_preview1" "poll_oneoff"
    (func $poll_oneoff (param i32 i32 i32 i32) (result i32)))
  (memory (export "memory") 1)
  (func (export "microsleep") (param $micros i64) (result i32)
    ;; one clock subscription at offset 0, event at 64, nevents at 128
    (i64.store (i32.const 0) (i64.const 0))
    (i32.store8 (i32.const 8) (i32.const 0))
    (i32.store (i32.const 16) (i32.const 1))
    (i64.store (i32.const 24) (i64.mul (local.get $micros) (i64.const 1000)))
    (i64.store (i32.const 32) (i64.const 0))
    (i32.store16 (i32.const 40) (i32.const 0))
    (call $poll_oneoff (i32.const 0) (i32.const 64) (i32.const 1) (i32.const 128))))
"#;

/// Compiles, but the import can never be satisfied.
pub const UNLINKABLE_WAT: &str = r#"
(module
  (import "env" "missing" (func))
  (func (export "noop")))
"#;

/// Compiles, but its start function traps.
pub const TRAPPING_START_WAT: &str = r#"
(module
  (func $boom unreachable)
  (start $boom))
"#;

/// Backend with observable instantiation and disposal.
#[derive(Clone, Default)]
pub struct CountingBackend {
    pub tally: Tally,
    /// Instantiations with a serial at or above this value fail.
    pub fail_from: Option<usize>,
}

#[derive(Clone, Default)]
pub struct Tally {
    created: Arc<AtomicUsize>,
    disposals: Arc<DashMap<usize, usize>>,
}

impl Tally {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// How many times the instance with `serial` has been disposed.
    pub fn disposals(&self, serial: usize) -> usize {
        self.disposals.get(&serial).map_or(0, |count| *count)
    }

    pub fn total_disposed(&self) -> usize {
        self.disposals.iter().map(|entry| *entry.value()).sum()
    }

    pub fn is_disposed(&self, serial: usize) -> bool {
        self.disposals(serial) > 0
    }
}

pub struct CountingInstance {
    serial: usize,
    pub uses: usize,
    disposals: Arc<DashMap<usize, usize>>,
}

impl CountingInstance {
    pub fn serial(&self) -> usize {
        self.serial
    }
}

impl Resource for CountingInstance {
    fn dispose(self) {
        *self.disposals.entry(self.serial).or_insert(0) += 1;
    }
}

impl Backend for CountingBackend {
    type Template = ();
    type Config = ();
    type Resource = CountingInstance;

    fn compile(&self, bytes: &[u8]) -> PoolResult<()> {
        if bytes == b"invalid" {
            return Err(PoolError::compile("not a program", "unrecognized bytes"));
        }
        Ok(())
    }

    fn instantiate(&self, _: &(), _: &()) -> PoolResult<CountingInstance> {
        let serial = self.tally.created.fetch_add(1, Ordering::SeqCst);
        if self.fail_from.is_some_and(|from| serial >= from) {
            return Err(PoolError::instantiation("start routine failed", "simulated trap"));
        }
        Ok(CountingInstance {
            serial,
            uses: 0,
            disposals: Arc::clone(&self.tally.disposals),
        })
    }
}
