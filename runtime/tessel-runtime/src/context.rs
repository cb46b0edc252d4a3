use std::rc::Rc;

use tessel_obj_model::{Handle, HandleTable, Sentinel};
use tracing::warn;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, HostException};
use crate::host::{
    Document, Element, ErrorObject, Event, GlObject, GlObjectKind, WebGl2Context, Window,
};
use crate::memory::MemoryViews;
use crate::value::{Capability, HostValue};

/// Host-side state shared by every boundary call into one module instance.
pub struct Bridge {
    pub heap: HandleTable<HostValue>,
    pub views: MemoryViews,
    window: Rc<Window>,
    config: BridgeConfig,
    last_exception: Option<HostValue>,
    next_context: u32,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            heap: HandleTable::new(config.heap.layout()),
            views: MemoryViews::new(),
            window: Window::new(config.viewport),
            config,
            last_exception: None,
            next_context: 0,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn window(&self) -> &Rc<Window> {
        &self.window
    }

    pub fn add(&mut self, value: HostValue) -> u32 {
        self.heap.allocate(value).raw()
    }

    /// Absent values cross as handle 0, which reads back as `undefined`.
    pub fn add_optional(&mut self, value: Option<HostValue>) -> u32 {
        value.map_or(0, |value| self.add(value))
    }

    pub fn sentinel(&self, sentinel: Sentinel) -> u32 {
        self.heap.sentinel(sentinel).raw()
    }

    pub fn value(&self, raw: u32) -> Result<&HostValue, BridgeError> {
        self.heap
            .try_get(Handle::from_raw(raw))
            .ok_or(BridgeError::StaleHandle(raw))
    }

    pub fn take(&mut self, raw: u32) -> Result<HostValue, BridgeError> {
        let handle = Handle::from_raw(raw);
        if self.heap.try_get(handle).is_none() {
            return Err(BridgeError::StaleHandle(raw));
        }
        Ok(self.heap.take(handle))
    }

    pub fn clone_ref(&mut self, raw: u32) -> Result<u32, BridgeError> {
        let value = self.value(raw)?.clone();
        Ok(self.add(value))
    }

    pub fn string(&self, raw: u32) -> Result<Rc<str>, BridgeError> {
        match self.value(raw)? {
            HostValue::String(text) => Ok(text.clone()),
            other => Err(other.mismatch(Capability::String)),
        }
    }

    pub fn window_at(&self, raw: u32) -> Result<Rc<Window>, BridgeError> {
        match self.value(raw)? {
            HostValue::Window(window) => Ok(window.clone()),
            other => Err(other.mismatch(Capability::Window)),
        }
    }

    pub fn document(&self, raw: u32) -> Result<Rc<Document>, BridgeError> {
        match self.value(raw)? {
            HostValue::Document(document) => Ok(document.clone()),
            other => Err(other.mismatch(Capability::Document)),
        }
    }

    pub fn element(&self, raw: u32) -> Result<Rc<Element>, BridgeError> {
        match self.value(raw)? {
            HostValue::Element(element) => Ok(element.clone()),
            other => Err(other.mismatch(Capability::Element)),
        }
    }

    pub fn canvas(&self, raw: u32) -> Result<Rc<Element>, BridgeError> {
        match self.value(raw)? {
            HostValue::Element(element) if element.is_canvas() => Ok(element.clone()),
            other => Err(other.mismatch(Capability::CanvasElement)),
        }
    }

    pub fn mouse_event(&self, raw: u32) -> Result<Rc<Event>, BridgeError> {
        match self.value(raw)? {
            HostValue::Event(event) if event.is_mouse() => Ok(event.clone()),
            other => Err(other.mismatch(Capability::MouseEvent)),
        }
    }

    pub fn gl(&self, raw: u32) -> Result<Rc<WebGl2Context>, BridgeError> {
        match self.value(raw)? {
            HostValue::Gl(context) => Ok(context.clone()),
            other => Err(other.mismatch(Capability::WebGl2)),
        }
    }

    /// A GL object of the given kind; `undefined` and `null` read as `None`.
    pub fn gl_object(
        &self,
        raw: u32,
        kind: GlObjectKind,
    ) -> Result<Option<GlObject>, BridgeError> {
        match self.value(raw)? {
            HostValue::GlObject(object) if object.kind == kind => Ok(Some(*object)),
            value if value.is_nullish() => Ok(None),
            other => Err(other.mismatch(Capability::GlObject(kind))),
        }
    }

    /// Like [`gl_object`](Self::gl_object) for parameters that may not be
    /// absent.
    pub fn required_gl_object(
        &self,
        raw: u32,
        kind: GlObjectKind,
    ) -> Result<GlObject, BridgeError> {
        match self.value(raw)? {
            HostValue::GlObject(object) if object.kind == kind => Ok(*object),
            other => Err(other.mismatch(Capability::GlObject(kind))),
        }
    }

    pub(crate) fn next_context_id(&mut self) -> u32 {
        self.next_context += 1;
        self.next_context
    }

    /// Turns a rejected host call into an error object the module owns,
    /// remembers it as the last exception and returns its handle.
    pub fn record_exception(&mut self, site: &str, exception: HostException) -> Handle {
        warn!(site, name = exception.name, message = %exception.message, "host call raised");
        let error = HostValue::Error(Rc::new(ErrorObject::new(
            exception.name,
            &exception.message,
            site,
        )));
        self.last_exception = Some(error.clone());
        self.heap.allocate(error)
    }

    pub fn last_exception(&self) -> Option<&HostValue> {
        self.last_exception.as_ref()
    }
}
