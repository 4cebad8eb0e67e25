//! Wasmtime-backed templates and instances

use crate::backend::{Backend, Resource};
use crate::cache::AccessorCache;
use crate::config::{InstanceConfig, RuntimeConfig};
use crate::errors::{PoolError, PoolResult};

use wasmtime::{
    Config, Engine, Func, Instance, Linker, Module, Store, StoreLimits, StoreLimitsBuilder, Val,
    WasmParams, WasmResults,
};
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::preview1::{self, WasiP1Ctx};

/// Per-instance host state stored in `Store<HostState>`.
pub struct HostState {
    wasi: WasiP1Ctx,
    limits: StoreLimits,
}

impl HostState {
    /// Build WASI wiring and store limits from the pool's instance config.
    pub fn new(config: &InstanceConfig) -> Self {
        let mut builder = WasiCtxBuilder::new();
        builder.args(config.args.as_slice());
        for (key, value) in &config.env {
            builder.env(key, value);
        }
        if config.inherit_stdio {
            builder.inherit_stdio();
        }

        let mut limits = StoreLimitsBuilder::new();
        if let Some(bytes) = config.max_memory_bytes {
            limits = limits.memory_size(bytes).trap_on_grow_failure(true);
        }

        Self {
            wasi: builder.build_p1(),
            limits: limits.build(),
        }
    }
}

/// Compiles modules and instantiates them against a shared engine and linker.
///
/// The engine and linker are created once and reused for every instance.
pub struct WasmRuntime {
    engine: Engine,
    linker: Linker<HostState>,
    consume_fuel: bool,
}

impl WasmRuntime {
    pub fn new(config: &RuntimeConfig) -> PoolResult<Self> {
        let mut wasm_config = Config::new();
        wasm_config.consume_fuel(config.consume_fuel);
        let engine = Engine::new(&wasm_config)
            .map_err(|e| PoolError::config(format!("failed to create engine: {e:#}"), e))?;

        let mut linker = Linker::new(&engine);
        if config.link_wasi {
            preview1::add_to_linker_sync(&mut linker, |state: &mut HostState| &mut state.wasi)
                .map_err(|e| {
                    PoolError::config(format!("failed to add WASI to linker: {e:#}"), e)
                })?;
        }

        Ok(Self {
            engine,
            linker,
            consume_fuel: config.consume_fuel,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Backend for WasmRuntime {
    type Template = Module;
    type Config = InstanceConfig;
    type Resource = ModuleInstance;

    fn compile(&self, bytes: &[u8]) -> PoolResult<Module> {
        Module::new(&self.engine, bytes)
            .map_err(|e| PoolError::compile("failed to compile module from bytes", e))
    }

    fn instantiate(&self, module: &Module, config: &InstanceConfig) -> PoolResult<ModuleInstance> {
        let mut store = Store::new(&self.engine, HostState::new(config));
        store.limiter(|state| &mut state.limits);

        // Start functions run during instantiation and need fuel too.
        let fuel = self.consume_fuel.then(|| config.fuel.unwrap_or(u64::MAX));
        if let Some(fuel) = fuel {
            store
                .set_fuel(fuel)
                .map_err(|e| PoolError::config(format!("failed to set fuel: {e:#}"), e))?;
        }

        let instance = self
            .linker
            .instantiate(&mut store, module)
            .map_err(|e| PoolError::instantiation("failed to instantiate module", e))?;

        Ok(ModuleInstance {
            store,
            instance,
            exports: AccessorCache::new(),
            fuel,
        })
    }
}

/// One instantiated module with its own store and export cache.
pub struct ModuleInstance {
    store: Store<HostState>,
    instance: Instance,
    exports: AccessorCache<Func>,
    fuel: Option<u64>,
}

impl ModuleInstance {
    /// Look up an exported function, memoizing the result.
    pub fn exported_function(&mut self, name: &str) -> Option<Func> {
        let Self {
            store,
            instance,
            exports,
            ..
        } = self;
        exports.get_or_resolve(name, |name| instance.get_func(&mut *store, name))
    }

    /// Call an export with dynamically typed arguments.
    pub fn call(&mut self, name: &str, params: &[Val]) -> PoolResult<Vec<Val>> {
        let func = self.require(name)?;
        self.refuel()?;

        let mut results = vec![Val::I32(0); func.ty(&self.store).results().len()];
        func.call(&mut self.store, params, &mut results)
            .map_err(|e| PoolError::trap(format!("{e:#}"), e))?;
        Ok(results)
    }

    /// Call an export with a statically known signature.
    pub fn call_typed<P, R>(&mut self, name: &str, params: P) -> PoolResult<R>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let func = self.require(name)?;
        let typed = func
            .typed::<P, R>(&self.store)
            .map_err(|e| PoolError::SignatureMismatch {
                name: name.to_string(),
                message: format!("{e:#}"),
            })?;
        self.refuel()?;

        typed
            .call(&mut self.store, params)
            .map_err(|e| PoolError::trap(format!("{e:#}"), e))
    }

    pub fn instance(&self) -> Instance {
        self.instance
    }

    pub fn store(&self) -> &Store<HostState> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store<HostState> {
        &mut self.store
    }

    /// Number of export names resolved so far.
    pub fn cached_exports(&self) -> usize {
        self.exports.len()
    }

    fn require(&mut self, name: &str) -> PoolResult<Func> {
        self.exported_function(name)
            .ok_or_else(|| PoolError::ExportNotFound {
                name: name.to_string(),
            })
    }

    fn refuel(&mut self) -> PoolResult<()> {
        if let Some(fuel) = self.fuel {
            self.store
                .set_fuel(fuel)
                .map_err(|e| PoolError::config(format!("failed to refuel: {e:#}"), e))?;
        }
        Ok(())
    }
}

impl Resource for ModuleInstance {
    fn dispose(self) {
        tracing::trace!(cached_exports = self.exports.len(), "disposing module instance");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD_WAT: &str = r#"
        (module
          (func (export "add") (param i32 i32) (result i64)
            local.get 0
            local.get 1
            i32.add
            i64.extend_i32_u))
    "#;

    const UNREACHABLE_WAT: &str = r#"
        (module
          (func (export "boom")
            unreachable))
    "#;

    const SPIN_WAT: &str = r#"
        (module
          (func (export "spin")
            (loop $l
              br $l)))
    "#;

    fn runtime() -> WasmRuntime {
        WasmRuntime::new(&RuntimeConfig::default()).unwrap()
    }

    #[test]
    fn compile_rejects_garbage() {
        assert!(matches!(
            runtime().compile(b"invalid"),
            Err(PoolError::Compile { .. })
        ));
    }

    #[test]
    fn call_typed_and_dynamic() {
        let runtime = runtime();
        let module = runtime.compile(ADD_WAT.as_bytes()).unwrap();
        let mut instance = runtime.instantiate(&module, &InstanceConfig::default()).unwrap();

        let sum: u64 = instance.call_typed("add", (2u32, 3u32)).unwrap();
        assert_eq!(sum, 5);

        let results = instance.call("add", &[Val::I32(1), Val::I32(1)]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].unwrap_i64(), 2);
        assert_eq!(instance.cached_exports(), 1);
    }

    #[test]
    fn missing_export_and_bad_signature() {
        let runtime = runtime();
        let module = runtime.compile(ADD_WAT.as_bytes()).unwrap();
        let mut instance = runtime.instantiate(&module, &InstanceConfig::default()).unwrap();

        assert!(matches!(
            instance.call("sub", &[]),
            Err(PoolError::ExportNotFound { .. })
        ));
        assert!(matches!(
            instance.call_typed::<(), ()>("add", ()),
            Err(PoolError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn trap_message_carries_the_cause() {
        let runtime = runtime();
        let module = runtime.compile(UNREACHABLE_WAT.as_bytes()).unwrap();
        let mut instance = runtime.instantiate(&module, &InstanceConfig::default()).unwrap();

        for err in [
            instance.call_typed::<(), ()>("boom", ()).unwrap_err(),
            instance.call("boom", &[]).unwrap_err(),
        ] {
            assert!(matches!(err, PoolError::Trap { .. }));
            assert!(err.to_string().contains("unreachable"), "{err}");
            assert!(std::error::Error::source(&err).is_some());
        }
    }

    #[test]
    fn fuel_budget_is_reapplied_per_call() {
        let runtime = WasmRuntime::new(&RuntimeConfig::new().with_fuel_metering(true)).unwrap();
        let config = InstanceConfig::new().with_fuel(10_000);

        let add = runtime.compile(ADD_WAT.as_bytes()).unwrap();
        let mut instance = runtime.instantiate(&add, &config).unwrap();
        for _ in 0..100 {
            let sum: u64 = instance.call_typed("add", (1u32, 1u32)).unwrap();
            assert_eq!(sum, 2);
        }

        let spin = runtime.compile(SPIN_WAT.as_bytes()).unwrap();
        let mut instance = runtime.instantiate(&spin, &config).unwrap();
        assert!(matches!(
            instance.call_typed::<(), ()>("spin", ()),
            Err(PoolError::Trap { .. })
        ));
    }
}
