//! Typed views over the module's linear memory.
//!
//! Linear memory may be replaced wholesale when the module grows it, which
//! detaches every view built over the old buffer. [`MemoryViews`] remembers
//! the identity of the buffer each cached view was built for and rebuilds
//! the view whenever the live buffer differs. The returned views borrow the
//! live memory, so none of them can outlive the boundary call that made it.

use tracing::trace;

use crate::error::BridgeError;

/// Identity of one linear-memory buffer: where it lives and how big it is.
/// Growth always yields a new identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferId {
    base: usize,
    len: usize,
}

impl BufferId {
    pub const fn new(base: usize, len: usize) -> Self {
        Self { base, len }
    }

    pub fn of(memory: &[u8]) -> Self {
        Self {
            base: memory.as_ptr() as usize,
            len: memory.len(),
        }
    }

    pub const fn len(self) -> usize {
        self.len
    }

    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ViewKind {
    Bytes,
    Words,
    Floats,
}

#[derive(Debug, Default)]
pub struct MemoryViews {
    bytes: Option<BufferId>,
    words: Option<BufferId>,
    floats: Option<BufferId>,
    rebuilds: u64,
}

impl MemoryViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes<'m>(&mut self, memory: &'m mut [u8]) -> ByteView<'m> {
        self.refresh(ViewKind::Bytes, BufferId::of(memory));
        ByteView { memory }
    }

    pub fn words<'m>(&mut self, memory: &'m mut [u8]) -> WordView<'m> {
        self.refresh(ViewKind::Words, BufferId::of(memory));
        WordView { memory }
    }

    pub fn floats<'m>(&mut self, memory: &'m mut [u8]) -> FloatView<'m> {
        self.refresh(ViewKind::Floats, BufferId::of(memory));
        FloatView { memory }
    }

    /// Buffer the cached view of `kind` was last built for.
    pub fn cached(&self, kind: ViewKind) -> Option<BufferId> {
        match kind {
            ViewKind::Bytes => self.bytes,
            ViewKind::Words => self.words,
            ViewKind::Floats => self.floats,
        }
    }

    /// Total number of views built since creation, across all kinds.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    fn refresh(&mut self, kind: ViewKind, live: BufferId) {
        let slot = match kind {
            ViewKind::Bytes => &mut self.bytes,
            ViewKind::Words => &mut self.words,
            ViewKind::Floats => &mut self.floats,
        };
        if *slot != Some(live) {
            trace!(?kind, len = live.len(), "rebuilding memory view");
            *slot = Some(live);
            self.rebuilds += 1;
        }
    }
}

fn range(offset: u64, len: u64, limit: usize) -> Result<std::ops::Range<usize>, BridgeError> {
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= limit as u64)
        .ok_or(BridgeError::OutOfBounds { offset, len })?;
    Ok(offset as usize..end as usize)
}

pub struct ByteView<'m> {
    memory: &'m mut [u8],
}

impl<'m> ByteView<'m> {
    pub fn buffer(&self) -> BufferId {
        BufferId::of(self.memory)
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn slice(&self, ptr: u32, len: u32) -> Result<&[u8], BridgeError> {
        let range = range(u64::from(ptr), u64::from(len), self.memory.len())?;
        Ok(&self.memory[range])
    }

    pub fn slice_mut(&mut self, ptr: u32, len: u32) -> Result<&mut [u8], BridgeError> {
        let range = range(u64::from(ptr), u64::from(len), self.memory.len())?;
        Ok(&mut self.memory[range])
    }

    pub fn set(&mut self, ptr: u32, bytes: &[u8]) -> Result<(), BridgeError> {
        self.slice_mut(ptr, bytes.len() as u32)?.copy_from_slice(bytes);
        Ok(())
    }

    pub fn into_slice(self, ptr: u32, len: u32) -> Result<&'m [u8], BridgeError> {
        let range = range(u64::from(ptr), u64::from(len), self.memory.len())?;
        Ok(&self.memory[range])
    }
}

/// Little-endian u32 view, indexed in words.
pub struct WordView<'m> {
    memory: &'m mut [u8],
}

impl WordView<'_> {
    pub fn get(&self, index: u32) -> Result<u32, BridgeError> {
        let range = range(u64::from(index) * 4, 4, self.memory.len())?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.memory[range]);
        Ok(u32::from_le_bytes(word))
    }

    pub fn set(&mut self, index: u32, value: u32) -> Result<(), BridgeError> {
        let range = range(u64::from(index) * 4, 4, self.memory.len())?;
        self.memory[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

/// Little-endian f32 view, indexed in elements.
pub struct FloatView<'m> {
    memory: &'m mut [u8],
}

impl FloatView<'_> {
    pub fn buffer(&self) -> BufferId {
        BufferId::of(self.memory)
    }

    pub fn len(&self) -> u32 {
        (self.memory.len() / 4) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: u32) -> Result<f32, BridgeError> {
        let range = range(u64::from(index) * 4, 4, self.memory.len())?;
        let mut bits = [0u8; 4];
        bits.copy_from_slice(&self.memory[range]);
        Ok(f32::from_le_bytes(bits))
    }

    pub fn set(&mut self, index: u32, value: f32) -> Result<(), BridgeError> {
        let range = range(u64::from(index) * 4, 4, self.memory.len())?;
        self.memory[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Copies out `len` floats starting at element `start`.
    pub fn to_vec(&self, start: u32, len: u32) -> Result<Vec<f32>, BridgeError> {
        let range = range(u64::from(start) * 4, u64::from(len) * 4, self.memory.len())?;
        Ok(self.memory[range]
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}
