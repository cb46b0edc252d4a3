use thiserror::Error;

use crate::value::Capability;

/// A host API rejected a call. Catching boundary calls turn it into an error
/// object the module can inspect by handle.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{name}: {message}")]
pub struct HostException {
    pub name: &'static str,
    pub message: String,
}

impl HostException {
    pub fn new(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Host(#[from] HostException),
    #[error("expected {expected}, handle holds {found}")]
    Capability {
        expected: Capability,
        found: &'static str,
    },
    #[error("handle {0} is not live")]
    StaleHandle(u32),
    #[error("{0}")]
    Thrown(String),
    #[error("closure invoked after it was consumed")]
    ClosureConsumed,
    #[error("closure invoked recursively")]
    ClosureReentered,
    #[error("access of {len} bytes at offset {offset} is outside linear memory")]
    OutOfBounds { offset: u64, len: u64 },
    #[error("module does not export `{0}`")]
    MissingExport(&'static str),
    #[error("function table has no entry at index {0}")]
    MissingTableEntry(u32),
    #[error("import `{0}` is not part of the boundary catalog")]
    UnknownImport(String),
    #[error("guest call failed: {0}")]
    Guest(String),
}

impl BridgeError {
    pub fn is_host(&self) -> bool {
        matches!(self, BridgeError::Host(_))
    }
}
