//! Host side of the boundary between a garbage-collected host and a module
//! running in linear memory.
//!
//! The module never holds host values directly. It holds integer handles into
//! the bridge's [`HandleTable`](tessel_obj_model::HandleTable), passes strings
//! as byte ranges in its own memory, and reaches host functionality only
//! through the fixed table of imports in [`boundary`]. Host callbacks into the
//! module go through [`closure::Trampoline`].

pub mod boundary;
pub mod closure;
pub mod config;
pub mod context;
pub mod error;
pub mod guest;
pub mod host;
pub mod memory;
pub mod sim;
pub mod transcode;
pub mod value;
pub mod wasm;

pub use boundary::{Category, Entry};
pub use closure::{ClosureKind, Trampoline};
pub use config::{ArgKind, BridgeConfig, ClosureShim, StringPassing, Viewport};
pub use context::Bridge;
pub use error::{BridgeError, HostException};
pub use guest::{Guest, GuestVal};
pub use sim::SimGuest;
pub use value::{Capability, HostFunction, HostValue};
pub use wasm::{EngineOptions, HostState, WasmGuest, WasmSession, build_engine};
