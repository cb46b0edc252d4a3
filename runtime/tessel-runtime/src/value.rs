use std::fmt;
use std::rc::Rc;

use tessel_obj_model::HeapValue;

use crate::closure::Trampoline;
use crate::error::BridgeError;
use crate::host::{
    CssStyleDeclaration, Document, Element, ErrorObject, Event, GlObject, GlObjectKind,
    WebGl2Context, Window,
};
use crate::memory::BufferId;

/// Everything a handle can refer to.
#[derive(Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Window(Rc<Window>),
    Document(Rc<Document>),
    Element(Rc<Element>),
    Style(Rc<CssStyleDeclaration>),
    Event(Rc<Event>),
    Gl(Rc<WebGl2Context>),
    GlObject(GlObject),
    Error(Rc<ErrorObject>),
    Function(HostFunction),
    /// The module's own linear memory.
    Memory,
    ArrayBuffer(BufferId),
    Float32Array(Float32Array),
}

impl HeapValue for HostValue {
    fn undefined() -> Self {
        HostValue::Undefined
    }

    fn null() -> Self {
        HostValue::Null
    }

    fn boolean(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

#[derive(Clone)]
pub enum HostFunction {
    Closure(Rc<Trampoline>),
    Native(NativeFunction),
}

/// Functions compiled from source text by the host. Only bodies the host
/// recognizes get behavior; everything else evaluates to `undefined`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NativeFunction {
    GlobalThis,
    Empty,
}

impl NativeFunction {
    pub fn compile(source: &str) -> Self {
        let body = source.trim().trim_end_matches(';').trim();
        match body {
            "return this" | "return globalThis" | "return window" => NativeFunction::GlobalThis,
            _ => NativeFunction::Empty,
        }
    }
}

/// A float view over a slice of linear memory, in f32 elements.
///
/// Nothing is copied on creation; the floats are read through the bridge's
/// float view when a host API consumes the array.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Float32Array {
    pub buffer: BufferId,
    pub offset: u32,
    pub len: u32,
}

impl Float32Array {
    pub fn over(buffer: BufferId) -> Self {
        Self {
            buffer,
            offset: 0,
            len: (buffer.len() / 4) as u32,
        }
    }

    /// Relative bounds are clamped to the array like `TypedArray.subarray`.
    pub fn subarray(&self, begin: u32, end: u32) -> Self {
        let end = end.min(self.len);
        let begin = begin.min(end);
        Self {
            buffer: self.buffer,
            offset: self.offset + begin,
            len: end - begin,
        }
    }
}

/// Runtime type tests a boundary entry can demand of a handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Capability {
    String,
    Window,
    Document,
    Element,
    HtmlElement,
    CanvasElement,
    EventTarget,
    Style,
    MouseEvent,
    WebGl2,
    GlObject(GlObjectKind),
    Error,
    Function,
    Memory,
    ArrayBuffer,
    Float32Array,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::String => f.write_str("a string"),
            Capability::Window => f.write_str("a Window"),
            Capability::Document => f.write_str("a Document"),
            Capability::Element => f.write_str("an Element"),
            Capability::HtmlElement => f.write_str("an HTMLElement"),
            Capability::CanvasElement => f.write_str("an HTMLCanvasElement"),
            Capability::EventTarget => f.write_str("an EventTarget"),
            Capability::Style => f.write_str("a CSSStyleDeclaration"),
            Capability::MouseEvent => f.write_str("a MouseEvent"),
            Capability::WebGl2 => f.write_str("a WebGL2RenderingContext"),
            Capability::GlObject(kind) => write!(f, "a {}", kind.type_name()),
            Capability::Error => f.write_str("an Error"),
            Capability::Function => f.write_str("a Function"),
            Capability::Memory => f.write_str("a WebAssembly.Memory"),
            Capability::ArrayBuffer => f.write_str("an ArrayBuffer"),
            Capability::Float32Array => f.write_str("a Float32Array"),
        }
    }
}

impl HostValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Window(_) => "Window",
            HostValue::Document(_) => "Document",
            HostValue::Element(element) if element.is_canvas() => "HTMLCanvasElement",
            HostValue::Element(_) => "HTMLElement",
            HostValue::Style(_) => "CSSStyleDeclaration",
            HostValue::Event(event) if event.is_mouse() => "MouseEvent",
            HostValue::Event(_) => "Event",
            HostValue::Gl(_) => "WebGL2RenderingContext",
            HostValue::GlObject(object) => object.kind.type_name(),
            HostValue::Error(_) => "Error",
            HostValue::Function(_) => "Function",
            HostValue::Memory => "WebAssembly.Memory",
            HostValue::ArrayBuffer(_) => "ArrayBuffer",
            HostValue::Float32Array(_) => "Float32Array",
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::String => matches!(self, HostValue::String(_)),
            Capability::Window => matches!(self, HostValue::Window(_)),
            Capability::Document => matches!(self, HostValue::Document(_)),
            Capability::Element | Capability::HtmlElement => matches!(self, HostValue::Element(_)),
            Capability::CanvasElement => {
                matches!(self, HostValue::Element(element) if element.is_canvas())
            }
            Capability::EventTarget => {
                matches!(self, HostValue::Window(_) | HostValue::Element(_))
            }
            Capability::Style => matches!(self, HostValue::Style(_)),
            Capability::MouseEvent => matches!(self, HostValue::Event(event) if event.is_mouse()),
            Capability::WebGl2 => matches!(self, HostValue::Gl(_)),
            Capability::GlObject(kind) => {
                matches!(self, HostValue::GlObject(object) if object.kind == kind)
            }
            Capability::Error => matches!(self, HostValue::Error(_)),
            Capability::Function => matches!(self, HostValue::Function(_)),
            Capability::Memory => matches!(self, HostValue::Memory),
            Capability::ArrayBuffer => matches!(self, HostValue::ArrayBuffer(_)),
            Capability::Float32Array => matches!(self, HostValue::Float32Array(_)),
        }
    }

    /// `undefined` and `null` both read as an absent optional.
    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    pub fn mismatch(&self, expected: Capability) -> BridgeError {
        BridgeError::Capability {
            expected,
            found: self.type_name(),
        }
    }

    /// Tri-state read used by the `boolean_get` entry: 1 true, 0 false, 2 otherwise.
    pub fn boolean_code(&self) -> u32 {
        match self {
            HostValue::Bool(true) => 1,
            HostValue::Bool(false) => 0,
            _ => 2,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn string(text: &str) -> Self {
        HostValue::String(Rc::from(text))
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Bool(value) => write!(f, "{value}"),
            HostValue::Number(value) => write!(f, "{value}"),
            HostValue::String(text) => write!(f, "{text:?}"),
            HostValue::Element(element) => write!(f, "<{}>", element.tag()),
            HostValue::GlObject(object) => {
                write!(f, "{}({})", object.kind.type_name(), object.name)
            }
            HostValue::Error(error) => write!(f, "Error({:?})", error.message()),
            HostValue::Float32Array(array) => {
                write!(f, "Float32Array[{}..+{}]", array.offset, array.len)
            }
            other => f.write_str(other.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_code_is_tristate() {
        assert_eq!(HostValue::Bool(true).boolean_code(), 1);
        assert_eq!(HostValue::Bool(false).boolean_code(), 0);
        assert_eq!(HostValue::Number(1.0).boolean_code(), 2);
        assert_eq!(HostValue::Undefined.boolean_code(), 2);
    }

    #[test]
    fn native_function_recognizes_global_lookup() {
        assert_eq!(NativeFunction::compile("return this"), NativeFunction::GlobalThis);
        assert_eq!(NativeFunction::compile("  return this;  "), NativeFunction::GlobalThis);
        assert_eq!(NativeFunction::compile("return 1"), NativeFunction::Empty);
    }

    #[test]
    fn subarray_clamps_bounds() {
        let buffer = BufferId::new(0x1000, 64);
        let all = Float32Array::over(buffer);
        assert_eq!(all.len, 16);
        let mid = all.subarray(4, 8);
        assert_eq!((mid.offset, mid.len), (4, 4));
        let nested = mid.subarray(1, 100);
        assert_eq!((nested.offset, nested.len), (5, 3));
        let empty = all.subarray(20, 2);
        assert_eq!(empty.len, 0);
    }

    #[test]
    fn capability_checks_follow_variant() {
        let text = HostValue::string("x");
        assert!(text.has(Capability::String));
        assert!(!text.has(Capability::Function));
        let err = HostValue::Null.mismatch(Capability::Window);
        assert_eq!(err.to_string(), "expected a Window, handle holds null");
    }
}
