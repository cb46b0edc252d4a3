use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tessel_obj_model::{DEFAULT_RESERVED_PREFIX, HeapLayout};

/// Per-module bridge settings. Every field has a default matching the
/// boundary layout the stock code generator emits.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub heap: HeapConfig,
    pub strings: StringPassing,
    pub viewport: Viewport,
    pub closures: Vec<ClosureShim>,
    /// Import name to catalog symbol, for modules built against a different
    /// hash suffix of the same host API.
    pub aliases: BTreeMap<String, String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            heap: HeapConfig::default(),
            strings: StringPassing::default(),
            viewport: Viewport::default(),
            closures: vec![
                ClosureShim {
                    import: "__wbindgen_closure_wrapper105".to_string(),
                    invoke: 27,
                    destroy: 28,
                    arg: ArgKind::Object,
                    once: false,
                },
                ClosureShim {
                    import: "__wbindgen_closure_wrapper107".to_string(),
                    invoke: 31,
                    destroy: 28,
                    arg: ArgKind::F64,
                    once: false,
                },
            ],
            aliases: BTreeMap::new(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid bridge config")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn closure_shim(&self, import: &str) -> Option<&ClosureShim> {
        self.closures.iter().find(|shim| shim.import == import)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeapConfig {
    pub reserved_prefix: u32,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            reserved_prefix: DEFAULT_RESERVED_PREFIX,
        }
    }
}

impl HeapConfig {
    pub fn layout(&self) -> HeapLayout {
        HeapLayout::new(self.reserved_prefix)
    }
}

/// How non-ASCII strings are finished after the ASCII fast path.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringPassing {
    /// Grow to the worst-case size of the remainder and encode in place.
    #[default]
    EncodeInto,
    /// Encode the remainder to a scratch buffer and grow to its exact size.
    Encode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

/// A closure-wrapper import and the function-table slots it dispatches to.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClosureShim {
    pub import: String,
    pub invoke: u32,
    pub destroy: u32,
    #[serde(default)]
    pub arg: ArgKind,
    /// Single-shot wrapper: consumed by its first invocation.
    #[serde(default)]
    pub once: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    /// The argument is handed over as a fresh handle.
    #[default]
    Object,
    /// The argument is passed as a float.
    F64,
}
