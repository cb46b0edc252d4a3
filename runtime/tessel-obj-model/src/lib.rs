//! Object heap for the tessel host bridge.
//! A module running in linear memory never sees host objects; it holds small
//! integer handles into a [`HandleTable`] owned by the host.

mod handle_table;

pub use handle_table::{
    DEFAULT_RESERVED_PREFIX, Handle, HandleTable, HeapLayout, HeapValue, SENTINEL_COUNT, Sentinel,
};
