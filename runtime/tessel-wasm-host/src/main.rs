use std::env;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tessel_runtime::boundary::linker::{Resolution, describe_imports};
use tessel_runtime::{BridgeConfig, HostValue, Viewport, WasmSession, build_engine};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use wasmtime::{Engine, Module};

/// Runs a bindgen-style module against the headless DOM and WebGL2 host.
#[derive(Parser, Debug)]
#[command(name = "tessel-wasm-host", version)]
struct Args {
    /// Module to run. Falls back to `TESSEL_WASM_PATH`, then `./output.wasm`.
    module: Option<PathBuf>,

    /// JSON bridge configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Animation frames to pump after `run` returns.
    #[arg(long, default_value_t = 0)]
    frames: u32,

    #[arg(long, default_value_t = 16.0)]
    frame_interval_ms: f64,

    /// Overrides the configured viewport, as WIDTHxHEIGHT.
    #[arg(long, value_parser = parse_viewport)]
    viewport: Option<Viewport>,

    /// Print how each import resolves and exit.
    #[arg(long)]
    list_imports: bool,
}

fn parse_viewport(text: &str) -> Result<Viewport, String> {
    let (width, height) = text
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{text}`"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<i32>()
            .map_err(|err| format!("bad dimension `{part}`: {err}"))
    };
    Ok(Viewport {
        width: parse(width)?,
        height: parse(height)?,
    })
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("TESSEL_LOG").unwrap_or_else(|_| {
        if env::var("TESSEL_WASM_HOST_DEBUG").is_ok() {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    let use_ansi = env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(use_ansi)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();
}

fn resolve_wasm_path(arg: Option<PathBuf>) -> Result<PathBuf> {
    let env_path = env::var("TESSEL_WASM_PATH").ok().map(PathBuf::from);
    for candidate in [arg, env_path].into_iter().flatten() {
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    let local = PathBuf::from("output.wasm");
    if local.exists() {
        return Ok(local);
    }
    bail!("WASM path not found (arg, TESSEL_WASM_PATH, or ./output.wasm)");
}

fn precompiled_path(wasm_path: &Path) -> Option<PathBuf> {
    if !matches!(env::var("TESSEL_WASM_PRECOMPILED").as_deref(), Ok("1")) {
        return None;
    }
    match env::var("TESSEL_WASM_PRECOMPILED_PATH") {
        Ok(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => Some(wasm_path.with_extension("cwasm")),
    }
}

fn load_or_compile_module(engine: &Engine, wasm_path: &Path) -> Result<Module> {
    let precompiled = precompiled_path(wasm_path);
    if let Some(precompiled) = precompiled.as_deref().filter(|path| path.exists()) {
        debug!(path = %precompiled.display(), "loading precompiled module");
        // SAFETY: the artifact is only ever produced by `Module::serialize`
        // below, for the same engine configuration.
        match unsafe { Module::deserialize_file(engine, precompiled) } {
            Ok(module) => return Ok(module),
            Err(err) => warn!(%err, "precompiled load failed"),
        }
    }
    let read_start = Instant::now();
    let wasm_bytes = fs::read(wasm_path).with_context(|| format!("read {wasm_path:?}"))?;
    debug!(elapsed = ?read_start.elapsed(), "read wasm");
    let compile_start = Instant::now();
    let module = wasmtime::error::Context::with_context(Module::new(engine, wasm_bytes), || format!("compile {wasm_path:?}"))?;
    debug!(elapsed = ?compile_start.elapsed(), "compiled module");
    if let Some(precompiled) = precompiled {
        if matches!(env::var("TESSEL_WASM_PRECOMPILED_WRITE").as_deref(), Ok("1")) {
            match module.serialize() {
                Ok(bytes) => {
                    if let Err(err) = fs::write(&precompiled, bytes) {
                        warn!(%err, "precompiled write failed");
                    } else {
                        debug!(path = %precompiled.display(), "wrote precompiled module");
                    }
                }
                Err(err) => warn!(%err, "precompiled serialize failed"),
            }
        }
    }
    Ok(module)
}

fn list_imports(module: &Module, config: &BridgeConfig) -> usize {
    let mut unknown = 0;
    for report in describe_imports(module, config) {
        let target = match &report.resolution {
            Resolution::Entry(entry) => format!("{} ({:?})", entry.site(), entry.category()),
            Resolution::Closure(shim) => format!(
                "closure shim (invoke {}, destroy {}, {:?}{})",
                shim.invoke,
                shim.destroy,
                shim.arg,
                if shim.once { ", once" } else { "" }
            ),
            Resolution::Unknown => {
                unknown += 1;
                "UNKNOWN".to_string()
            }
        };
        println!("{}::{} -> {target}", report.module, report.name);
    }
    unknown
}

fn summarize(session: &WasmSession, frames: usize) {
    let bridge = session.bridge();
    let (mut commands, mut draws) = (0, 0);
    for (_, value) in bridge.heap.iter() {
        if let HostValue::Gl(gl) = value {
            commands += gl.commands().len();
            draws += gl.draw_count();
        }
    }
    let body_children = bridge
        .window()
        .document()
        .body()
        .map_or(0, |body| body.children().len());
    println!("frames fired:     {frames}");
    println!("live handles:     {}", bridge.heap.live());
    println!("pending frames:   {}", bridge.window().pending_frames());
    println!("body children:    {body_children}");
    println!("gl commands:      {commands} ({draws} draws)");
    if let Some(HostValue::Error(error)) = session.last_exception() {
        println!("last exception:   {}", error.stack());
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let wasm_path = resolve_wasm_path(args.module)?;
    let mut config = match &args.config {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(viewport) = args.viewport {
        config.viewport = viewport;
    }

    let engine = build_engine()?;
    let module = load_or_compile_module(&engine, &wasm_path)?;
    if args.list_imports {
        let unknown = list_imports(&module, &config);
        if unknown > 0 {
            bail!("{unknown} import(s) outside the boundary catalog");
        }
        return Ok(());
    }

    let mut session = WasmSession::instantiate(&engine, &module, config)
        .with_context(|| format!("instantiate {}", wasm_path.display()))?;
    session.run()?;

    let mut fired = 0;
    for frame in 0..args.frames {
        if session.bridge().window().pending_frames() == 0 {
            info!(frame, "no animation frames pending, stopping");
            break;
        }
        let timestamp = f64::from(frame) * args.frame_interval_ms;
        fired += session
            .animation_frame(timestamp)
            .with_context(|| format!("animation frame {frame}"))?;
    }
    summarize(&session, fired);
    Ok(())
}
