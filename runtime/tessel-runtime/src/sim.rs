//! An in-process module stand-in.
//!
//! [`SimGuest`] gives the bridge a linear memory with a bump allocator and a
//! function table of Rust closures, so the boundary catalog can be driven
//! without compiling a module. Growing the memory always moves it to a new
//! buffer, the same way a real memory grow detaches existing views.

use std::rc::Rc;

use tessel_obj_model::Handle;
use tracing::trace;

use crate::config::BridgeConfig;
use crate::context::Bridge;
use crate::error::BridgeError;
use crate::guest::{Guest, GuestVal};

pub type SimFunction =
    Rc<dyn Fn(&mut SimGuest, &[GuestVal]) -> Result<Option<GuestVal>, BridgeError>>;

const PAGE: usize = 64 * 1024;
const ALIGN: u32 = 8;

pub struct SimGuest {
    bridge: Bridge,
    memory: Vec<u8>,
    top: u32,
    table: Vec<Option<SimFunction>>,
    exceptions: Vec<Handle>,
    frees: Vec<(u32, u32)>,
    reallocs: usize,
}

impl SimGuest {
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_memory(config, PAGE)
    }

    pub fn with_memory(config: BridgeConfig, size: usize) -> Self {
        Self {
            bridge: Bridge::new(config),
            memory: vec![0; size],
            // Keep address 0 unused so a zero pointer always means "none".
            top: ALIGN,
            table: Vec::new(),
            exceptions: Vec::new(),
            frees: Vec::new(),
            reallocs: 0,
        }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Moves linear memory to a new, larger buffer.
    pub fn grow(&mut self, additional: usize) {
        let mut grown = vec![0; self.memory.len() + additional];
        grown[..self.memory.len()].copy_from_slice(&self.memory);
        self.memory = grown;
        trace!(len = self.memory.len(), "grew simulated memory");
    }

    pub fn register<F>(&mut self, index: u32, function: F)
    where
        F: Fn(&mut SimGuest, &[GuestVal]) -> Result<Option<GuestVal>, BridgeError> + 'static,
    {
        let index = index as usize;
        if self.table.len() <= index {
            self.table.resize(index + 1, None);
        }
        self.table[index] = Some(Rc::new(function));
    }

    /// Allocates and fills a buffer the way module code would before
    /// passing a string out. Returns `(ptr, len)`.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> (u32, u32) {
        let len = bytes.len() as u32;
        let ptr = self.bump(len);
        self.memory[ptr as usize..(ptr + len) as usize].copy_from_slice(bytes);
        (ptr, len)
    }

    pub fn write_str(&mut self, text: &str) -> (u32, u32) {
        self.write_bytes(text.as_bytes())
    }

    pub fn write_f32s(&mut self, values: &[f32]) -> (u32, u32) {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let (ptr, _) = self.write_bytes(&bytes);
        (ptr, values.len() as u32)
    }

    pub fn read_u32(&self, ptr: u32) -> u32 {
        let at = ptr as usize;
        u32::from_le_bytes([
            self.memory[at],
            self.memory[at + 1],
            self.memory[at + 2],
            self.memory[at + 3],
        ])
    }

    pub fn read_str(&self, ptr: u32, len: u32) -> &str {
        std::str::from_utf8(&self.memory[ptr as usize..(ptr + len) as usize]).unwrap_or("")
    }

    pub fn exceptions(&self) -> &[Handle] {
        &self.exceptions
    }

    pub fn take_exception(&mut self) -> Option<Handle> {
        self.exceptions.pop()
    }

    pub fn frees(&self) -> &[(u32, u32)] {
        &self.frees
    }

    pub fn reallocs(&self) -> usize {
        self.reallocs
    }

    fn bump(&mut self, size: u32) -> u32 {
        let ptr = self.top;
        let end = ptr as usize + size as usize;
        if end > self.memory.len() {
            let needed = end - self.memory.len();
            self.grow(needed.div_ceil(PAGE) * PAGE);
        }
        self.top = (ptr + size).next_multiple_of(ALIGN);
        ptr
    }
}

impl Guest for SimGuest {
    fn parts(&mut self) -> (&mut [u8], &mut Bridge) {
        (self.memory.as_mut_slice(), &mut self.bridge)
    }

    fn malloc(&mut self, size: u32) -> Result<u32, BridgeError> {
        Ok(self.bump(size))
    }

    fn realloc(&mut self, ptr: u32, old_size: u32, new_size: u32) -> Result<u32, BridgeError> {
        self.reallocs += 1;
        let moved = self.bump(new_size);
        let keep = old_size.min(new_size) as usize;
        self.memory
            .copy_within(ptr as usize..ptr as usize + keep, moved as usize);
        Ok(moved)
    }

    fn free(&mut self, ptr: u32, size: u32) -> Result<(), BridgeError> {
        self.frees.push((ptr, size));
        Ok(())
    }

    fn store_exception(&mut self, handle: Handle) -> Result<(), BridgeError> {
        self.exceptions.push(handle);
        Ok(())
    }

    fn call_indirect(
        &mut self,
        index: u32,
        args: &[GuestVal],
    ) -> Result<Option<GuestVal>, BridgeError> {
        let function = self
            .table
            .get(index as usize)
            .cloned()
            .flatten()
            .ok_or(BridgeError::MissingTableEntry(index))?;
        function(self, args)
    }
}
