//! Running a real module under wasmtime.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use wasmtime::error::Context as _;
use tracing::{debug, info};
use wasmtime::{
    AsContext, AsContextMut, Cache, Caller, Config, Engine, Extern, Func, FuncType, Instance,
    Linker, Memory, Module, OptLevel, Ref, Store, Table, Val,
};

use crate::boundary::linker::define_imports;
use crate::config::{BridgeConfig, Viewport};
use crate::context::Bridge;
use crate::error::BridgeError;
use crate::guest::{Guest, GuestVal};
use crate::host::{self, Event, EventTarget};
use crate::value::HostValue;
use tessel_obj_model::Handle;

pub const MEMORY_EXPORT: &str = "memory";
pub const MALLOC_EXPORT: &str = "__wbindgen_malloc";
pub const REALLOC_EXPORT: &str = "__wbindgen_realloc";
pub const FREE_EXPORT: &str = "__wbindgen_free";
pub const EXN_STORE_EXPORT: &str = "__wbindgen_exn_store";
pub const TABLE_EXPORT: &str = "__wbg_function_table";
pub const RUN_EXPORT: &str = "run";

const DEFAULT_MAX_STACK: usize = 8 << 20;

/// Engine settings read from the `TESSEL_WASM_*` environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    pub max_stack: usize,
    /// `None` leaves the compilation cache off.
    pub cache: Option<Option<PathBuf>>,
    pub serial: bool,
    pub fast: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_stack: DEFAULT_MAX_STACK,
            cache: None,
            serial: false,
            fast: false,
        }
    }
}

impl EngineOptions {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// The cache turns on with `TESSEL_WASM_CACHE=1` or a cache config path,
    /// and `TESSEL_WASM_CACHE=0` wins over both.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| lookup(key).as_deref() == Some("1");
        let max_stack = lookup("TESSEL_WASM_MAX_STACK")
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|&bytes| bytes > 0)
            .unwrap_or(DEFAULT_MAX_STACK);
        let cache_config = lookup("TESSEL_WASM_CACHE_CONFIG").map(PathBuf::from);
        let cache = match lookup("TESSEL_WASM_CACHE").as_deref() {
            Some("0") => None,
            Some("1") => Some(cache_config),
            _ => cache_config.map(Some),
        };
        Self {
            max_stack,
            cache,
            serial: flag("TESSEL_WASM_COMPILE_SERIAL"),
            fast: flag("TESSEL_WASM_COMPILE_FAST"),
        }
    }

    pub fn build(&self) -> Result<Engine> {
        let mut config = Config::new();
        config
            .max_wasm_stack(self.max_stack)
            .parallel_compilation(!self.serial);
        if self.fast {
            config.cranelift_opt_level(OptLevel::None);
        }
        if let Some(path) = &self.cache {
            config.cache(Some(Cache::from_file(path.as_deref())?));
        }
        debug!(options = ?self, "building engine");
        Ok(Engine::new(&config)?)
    }
}

pub fn build_engine() -> Result<Engine> {
    EngineOptions::from_env().build()
}

pub struct HostState {
    pub bridge: Bridge,
    exports: Option<GuestExports>,
}

impl HostState {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            bridge: Bridge::new(config),
            exports: None,
        }
    }
}

/// Module exports the bridge calls back into.
#[derive(Clone, Copy)]
struct GuestExports {
    memory: Memory,
    malloc: Option<Func>,
    realloc: Option<Func>,
    free: Option<Func>,
    exn_store: Option<Func>,
    table: Option<Table>,
}

impl GuestExports {
    fn resolve(mut lookup: impl FnMut(&str) -> Option<Extern>) -> Result<Self, BridgeError> {
        let mut func = |name: &str| lookup(name).and_then(Extern::into_func);
        let malloc = func(MALLOC_EXPORT);
        let realloc = func(REALLOC_EXPORT);
        let free = func(FREE_EXPORT);
        let exn_store = func(EXN_STORE_EXPORT);
        let memory = lookup(MEMORY_EXPORT)
            .and_then(Extern::into_memory)
            .ok_or(BridgeError::MissingExport(MEMORY_EXPORT))?;
        let table = lookup(TABLE_EXPORT).and_then(Extern::into_table);
        Ok(Self {
            memory,
            malloc,
            realloc,
            free,
            exn_store,
            table,
        })
    }
}

/// Store access shared by [`Store`] and [`Caller`].
pub trait StateAccess: AsContextMut<Data = HostState> {
    fn state_mut(&mut self) -> &mut HostState;

    /// Looks up a module export, where the context can see the instance.
    fn export(&mut self, name: &str) -> Option<Extern>;
}

impl StateAccess for Store<HostState> {
    fn state_mut(&mut self) -> &mut HostState {
        self.data_mut()
    }

    fn export(&mut self, _name: &str) -> Option<Extern> {
        None
    }
}

impl StateAccess for Caller<'_, HostState> {
    fn state_mut(&mut self) -> &mut HostState {
        self.data_mut()
    }

    fn export(&mut self, name: &str) -> Option<Extern> {
        self.get_export(name)
    }
}

pub struct WasmGuest<'a, C: StateAccess> {
    ctx: &'a mut C,
}

impl<'a, C: StateAccess> WasmGuest<'a, C> {
    pub fn new(ctx: &'a mut C) -> Self {
        Self { ctx }
    }

    fn exports(&mut self) -> Result<GuestExports, BridgeError> {
        if let Some(exports) = self.ctx.state_mut().exports {
            return Ok(exports);
        }
        let exports = GuestExports::resolve(|name| self.ctx.export(name))?;
        self.ctx.state_mut().exports = Some(exports);
        Ok(exports)
    }

    fn call(&mut self, func: Func, params: &[Val]) -> Result<Option<Val>, BridgeError> {
        let mut results = alloc_results(&func.ty(self.ctx.as_context()))?;
        func.call(self.ctx.as_context_mut(), params, &mut results)
            .map_err(|err| BridgeError::Guest(format!("{err:#}")))?;
        Ok(results.into_iter().next())
    }

    fn call_u32(&mut self, func: Func, params: &[Val]) -> Result<u32, BridgeError> {
        match self.call(func, params)? {
            Some(Val::I32(value)) => Ok(value as u32),
            other => Err(BridgeError::Guest(format!("expected an i32 result, got {other:?}"))),
        }
    }
}

fn alloc_results(ty: &FuncType) -> Result<Vec<Val>, BridgeError> {
    let mut results = Vec::new();
    for val_ty in ty.results() {
        let Some(val) = Val::default_for_ty(&val_ty) else {
            return Err(BridgeError::Guest(format!("unsupported result type: {val_ty:?}")));
        };
        results.push(val);
    }
    Ok(results)
}

fn to_val(value: GuestVal) -> Val {
    match value {
        GuestVal::I32(value) => Val::I32(value),
        GuestVal::F32(value) => Val::F32(value.to_bits()),
        GuestVal::F64(value) => Val::F64(value.to_bits()),
    }
}

fn from_val(value: Val) -> Option<GuestVal> {
    match value {
        Val::I32(value) => Some(GuestVal::I32(value)),
        Val::F32(bits) => Some(GuestVal::F32(f32::from_bits(bits))),
        Val::F64(bits) => Some(GuestVal::F64(f64::from_bits(bits))),
        _ => None,
    }
}

impl<C: StateAccess> Guest for WasmGuest<'_, C> {
    fn parts(&mut self) -> (&mut [u8], &mut Bridge) {
        match self.exports() {
            Ok(exports) => {
                let (bytes, state) = exports.memory.data_and_store_mut(self.ctx.as_context_mut());
                (bytes, &mut state.bridge)
            }
            // Before the instance exists there is no memory to view.
            Err(_) => (Default::default(), &mut self.ctx.state_mut().bridge),
        }
    }

    fn malloc(&mut self, size: u32) -> Result<u32, BridgeError> {
        let malloc = self
            .exports()?
            .malloc
            .ok_or(BridgeError::MissingExport(MALLOC_EXPORT))?;
        self.call_u32(malloc, &[Val::I32(size as i32)])
    }

    fn realloc(&mut self, ptr: u32, old_size: u32, new_size: u32) -> Result<u32, BridgeError> {
        let realloc = self
            .exports()?
            .realloc
            .ok_or(BridgeError::MissingExport(REALLOC_EXPORT))?;
        self.call_u32(
            realloc,
            &[
                Val::I32(ptr as i32),
                Val::I32(old_size as i32),
                Val::I32(new_size as i32),
            ],
        )
    }

    fn free(&mut self, ptr: u32, size: u32) -> Result<(), BridgeError> {
        let free = self.exports()?.free.ok_or(BridgeError::MissingExport(FREE_EXPORT))?;
        self.call(free, &[Val::I32(ptr as i32), Val::I32(size as i32)])
            .map(drop)
    }

    fn store_exception(&mut self, handle: Handle) -> Result<(), BridgeError> {
        let store = self
            .exports()?
            .exn_store
            .ok_or(BridgeError::MissingExport(EXN_STORE_EXPORT))?;
        self.call(store, &[Val::I32(handle.raw() as i32)]).map(drop)
    }

    fn call_indirect(
        &mut self,
        index: u32,
        args: &[GuestVal],
    ) -> Result<Option<GuestVal>, BridgeError> {
        let table = self
            .exports()?
            .table
            .ok_or(BridgeError::MissingExport(TABLE_EXPORT))?;
        let func = match table.get(self.ctx.as_context_mut(), u64::from(index)) {
            Some(Ref::Func(Some(func))) => func,
            _ => return Err(BridgeError::MissingTableEntry(index)),
        };
        let params: Vec<Val> = args.iter().copied().map(to_val).collect();
        Ok(self.call(func, &params)?.and_then(from_val))
    }
}

/// One instantiated module with its bridge.
pub struct WasmSession {
    store: Store<HostState>,
    instance: Instance,
}

impl WasmSession {
    pub fn instantiate(engine: &Engine, module: &Module, config: BridgeConfig) -> Result<Self> {
        let mut linker = Linker::new(engine);
        let defined = define_imports(&mut linker, module, &config)?;
        debug!(defined, "boundary imports defined");
        let mut store = Store::new(engine, HostState::new(config));
        let instance = linker
            .instantiate(&mut store, module)
            .context("failed to instantiate module")?;
        let exports = GuestExports::resolve(|name| instance.get_export(&mut store, name))?;
        store.data_mut().exports = Some(exports);
        Ok(Self { store, instance })
    }

    pub fn from_file(engine: &Engine, path: &Path, config: BridgeConfig) -> Result<Self> {
        let module = Module::from_file(engine, path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        Self::instantiate(engine, &module, config)
    }

    pub fn bridge(&self) -> &Bridge {
        &self.store.data().bridge
    }

    pub fn instance(&self) -> Instance {
        self.instance
    }

    pub fn store_mut(&mut self) -> &mut Store<HostState> {
        &mut self.store
    }

    pub fn guest(&mut self) -> WasmGuest<'_, Store<HostState>> {
        WasmGuest::new(&mut self.store)
    }

    /// Calls a nullary export, `run` by default.
    pub fn call_export(&mut self, name: &str) -> Result<()> {
        let Some(func) = self.instance.get_func(&mut self.store, name) else {
            bail!("module does not export `{name}`");
        };
        let func = func
            .typed::<(), ()>(&self.store)
            .with_context(|| format!("export `{name}` is not a nullary function"))?;
        info!(export = name, "calling module entry point");
        func.call(&mut self.store, ())
            .with_context(|| format!("`{name}` failed"))?;
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        self.call_export(RUN_EXPORT)
    }

    pub fn animation_frame(&mut self, timestamp: f64) -> Result<usize> {
        Ok(host::fire_animation_frames(&mut self.guest(), timestamp)?)
    }

    pub fn dispatch(&mut self, target: &EventTarget, event: Event) -> Result<usize> {
        Ok(host::dispatch_event(&mut self.guest(), target, event)?)
    }

    pub fn resize(&mut self, viewport: Viewport) -> Result<usize> {
        Ok(host::resize(&mut self.guest(), viewport)?)
    }

    pub fn last_exception(&self) -> Option<&HostValue> {
        self.bridge().last_exception()
    }
}
