//! Basic usage examples for InstancePool

use esox_instancepool::{InstanceConfig, InstancePool, PoolOptions, RuntimeConfig, WasmRuntime};
use std::thread;

const ADD_WAT: &str = r#"
(module
  (func (export "add") (param i32 i32) (result i64)
    local.get 0
    local.get 1
    i32.add
    i64.extend_i32_u))
"#;

fn main() {
    println!("=== EsoxSolutions.InstancePool - Basic Examples ===\n");

    let runtime = WasmRuntime::new(&RuntimeConfig::default()).expect("runtime");
    let pool = InstancePool::new(
        runtime,
        ADD_WAT.as_bytes(),
        InstanceConfig::default(),
        PoolOptions::new().with_limit(4),
    )
    .expect("pool");

    // Example 1: explicit get and put
    get_and_put(&pool);

    // Example 2: scoped access from many threads
    scoped_run(&pool);

    // Example 3: metrics and health
    metrics_and_health(&pool);
}

fn get_and_put(pool: &InstancePool) {
    println!("1. Get and Put:");
    let mut instance = pool.get().expect("get");
    let sum: u64 = instance.call_typed("add", (1u32, 1u32)).expect("add");
    println!("   add(1, 1) = {}", sum);
    pool.put(instance);
    println!("   Idle after put: {}\n", pool.idle_count());
}

fn scoped_run(pool: &InstancePool) {
    println!("2. Scoped Run:");
    thread::scope(|scope| {
        for i in 0..8u32 {
            scope.spawn(move || {
                let sum = pool
                    .run(|instance| instance.call_typed::<(u32, u32), u64>("add", (i, i)))
                    .expect("run")
                    .expect("add");
                println!("   add({i}, {i}) = {sum}");
            });
        }
    });
    println!();
}

fn metrics_and_health(pool: &InstancePool) {
    println!("3. Metrics and Health:");
    let health = pool.health();
    println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
    println!("   Idle: {}, Active: {}", health.idle_instances, health.active_instances);

    println!("\n   Metrics:");
    for (key, value) in pool.export_metrics() {
        println!("     {}: {}", key, value);
    }
}
