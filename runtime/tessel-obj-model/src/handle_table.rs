use std::fmt;
use std::mem;

/// Number of singleton sentinels stored right after the reserved prefix.
pub const SENTINEL_COUNT: u32 = 4;

/// Slots the code generator expects to exist before the sentinels.
pub const DEFAULT_RESERVED_PREFIX: u32 = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Handle(u32);

impl Handle {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sentinel {
    Undefined,
    Null,
    True,
    False,
}

impl Sentinel {
    pub const ALL: [Sentinel; SENTINEL_COUNT as usize] =
        [Sentinel::Undefined, Sentinel::Null, Sentinel::True, Sentinel::False];

    const fn offset(self) -> u32 {
        match self {
            Sentinel::Undefined => 0,
            Sentinel::Null => 1,
            Sentinel::True => 2,
            Sentinel::False => 3,
        }
    }
}

/// Position of the reserved block and the sentinels in a fresh table.
///
/// Handles below [`HeapLayout::threshold`] are permanent: releasing them is a
/// no-op and they are never handed out by [`HandleTable::allocate`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeapLayout {
    reserved_prefix: u32,
}

impl HeapLayout {
    pub const fn new(reserved_prefix: u32) -> Self {
        Self { reserved_prefix }
    }

    pub const fn reserved_prefix(self) -> u32 {
        self.reserved_prefix
    }

    pub const fn threshold(self) -> u32 {
        self.reserved_prefix + SENTINEL_COUNT
    }

    pub const fn sentinel(self, sentinel: Sentinel) -> Handle {
        Handle(self.reserved_prefix + sentinel.offset())
    }

    pub const fn is_reserved(self, handle: Handle) -> bool {
        handle.0 < self.threshold()
    }
}

impl Default for HeapLayout {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVED_PREFIX)
    }
}

/// Values a [`HandleTable`] can seed its permanent slots with.
pub trait HeapValue {
    fn undefined() -> Self;
    fn null() -> Self;
    fn boolean(value: bool) -> Self;
}

enum Slot<T> {
    Live(T),
    /// Link to the next free slot. A link equal to the slot count means the
    /// chain is exhausted and the next allocation grows the table.
    Free(u32),
}

/// Growable slot array with an intrusive LIFO free-list.
///
/// Liveness is not re-validated on the hot path: handing a released or
/// never-allocated handle to [`get`](Self::get), [`take`](Self::take) or
/// [`release`](Self::release) is a contract violation.
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    next: u32,
    layout: HeapLayout,
    live: usize,
}

impl<T: HeapValue> HandleTable<T> {
    pub fn new(layout: HeapLayout) -> Self {
        let threshold = layout.threshold() as usize;
        let mut slots = Vec::with_capacity(threshold.next_power_of_two());
        slots.extend((0..layout.reserved_prefix()).map(|_| Slot::Live(T::undefined())));
        for sentinel in Sentinel::ALL {
            slots.push(Slot::Live(match sentinel {
                Sentinel::Undefined => T::undefined(),
                Sentinel::Null => T::null(),
                Sentinel::True => T::boolean(true),
                Sentinel::False => T::boolean(false),
            }));
        }
        Self {
            next: slots.len() as u32,
            slots,
            layout,
            live: 0,
        }
    }
}

impl<T> HandleTable<T> {
    pub fn layout(&self) -> HeapLayout {
        self.layout
    }

    pub fn sentinel(&self, sentinel: Sentinel) -> Handle {
        self.layout.sentinel(sentinel)
    }

    /// Number of dynamically allocated handles currently live.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Total slot count, reserved slots and free links included.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn allocate(&mut self, value: T) -> Handle {
        if self.next as usize == self.slots.len() {
            self.slots.push(Slot::Free(self.next + 1));
        }
        let index = self.next;
        let Slot::Free(next) = mem::replace(&mut self.slots[index as usize], Slot::Live(value))
        else {
            unreachable!("free-list head {index} points at a live slot");
        };
        self.next = next;
        self.live += 1;
        Handle(index)
    }

    /// # Panics
    ///
    /// Panics if `handle` refers to a released slot or lies past the end of
    /// the table.
    pub fn get(&self, handle: Handle) -> &T {
        match &self.slots[handle.0 as usize] {
            Slot::Live(value) => value,
            Slot::Free(_) => panic!("handle {handle} used after release"),
        }
    }

    pub fn try_get(&self, handle: Handle) -> Option<&T> {
        match self.slots.get(handle.0 as usize)? {
            Slot::Live(value) => Some(value),
            Slot::Free(_) => None,
        }
    }

    pub fn release(&mut self, handle: Handle) {
        if self.layout.is_reserved(handle) {
            return;
        }
        let slot = mem::replace(&mut self.slots[handle.0 as usize], Slot::Free(self.next));
        debug_assert!(
            matches!(slot, Slot::Live(_)),
            "handle {handle} released twice"
        );
        self.next = handle.0;
        self.live -= 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        let threshold = self.layout.threshold() as usize;
        self.slots
            .iter()
            .enumerate()
            .skip(threshold)
            .filter_map(|(index, slot)| match slot {
                Slot::Live(value) => Some((Handle(index as u32), value)),
                Slot::Free(_) => None,
            })
    }
}

impl<T: Clone> HandleTable<T> {
    /// Reads and releases in one step. Sentinels are copied out and stay put.
    pub fn take(&mut self, handle: Handle) -> T {
        if self.layout.is_reserved(handle) {
            return self.get(handle).clone();
        }
        let slot = mem::replace(&mut self.slots[handle.0 as usize], Slot::Free(self.next));
        match slot {
            Slot::Live(value) => {
                self.next = handle.0;
                self.live -= 1;
                value
            }
            Slot::Free(link) => {
                self.slots[handle.0 as usize] = Slot::Free(link);
                panic!("handle {handle} used after release")
            }
        }
    }

    pub fn clone_ref(&mut self, handle: Handle) -> Handle {
        let value = self.get(handle).clone();
        self.allocate(value)
    }
}
