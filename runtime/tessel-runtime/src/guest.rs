use tessel_obj_model::Handle;

use crate::context::Bridge;
use crate::error::BridgeError;

/// A scalar crossing into or out of the module's function table.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GuestVal {
    I32(i32),
    F32(f32),
    F64(f64),
}

impl GuestVal {
    pub fn handle(handle: Handle) -> Self {
        GuestVal::I32(handle.raw() as i32)
    }
}

/// The module side of the boundary as the bridge sees it: its linear memory,
/// its allocator, its exception slot and its function table.
///
/// Every method may run module code, and module code may call back into the
/// bridge, so implementors must not hold borrows of bridge state across them.
pub trait Guest {
    /// Live linear memory together with the bridge state.
    fn parts(&mut self) -> (&mut [u8], &mut Bridge);

    fn bridge_mut(&mut self) -> &mut Bridge {
        self.parts().1
    }

    fn malloc(&mut self, size: u32) -> Result<u32, BridgeError>;

    fn realloc(&mut self, ptr: u32, old_size: u32, new_size: u32) -> Result<u32, BridgeError>;

    fn free(&mut self, ptr: u32, size: u32) -> Result<(), BridgeError>;

    /// Records `handle` as the module's pending exception.
    fn store_exception(&mut self, handle: Handle) -> Result<(), BridgeError>;

    fn call_indirect(
        &mut self,
        index: u32,
        args: &[GuestVal],
    ) -> Result<Option<GuestVal>, BridgeError>;
}
