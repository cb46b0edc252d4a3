use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::config::Viewport;
use crate::error::HostException;
use crate::host::gl::WebGl2Context;
use crate::value::HostValue;

/// Registered `(event type, callback)` pairs, in registration order.
#[derive(Default)]
pub struct Listeners {
    entries: RefCell<Vec<(String, HostValue)>>,
}

impl Listeners {
    pub fn add(&self, kind: &str, callback: HostValue) -> Result<(), HostException> {
        if !matches!(callback, HostValue::Function(_)) {
            return Err(HostException::type_error(format!(
                "addEventListener: callback is {}, not a function",
                callback.type_name()
            )));
        }
        self.entries.borrow_mut().push((kind.to_string(), callback));
        Ok(())
    }

    /// Snapshot of the callbacks for `kind`, so dispatch can re-enter freely.
    pub fn matching(&self, kind: &str) -> Vec<HostValue> {
        self.entries
            .borrow()
            .iter()
            .filter(|(registered, _)| registered == kind)
            .map(|(_, callback)| callback.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

pub struct Window {
    document: Rc<Document>,
    listeners: Listeners,
    frames: RefCell<Vec<(i32, HostValue)>>,
    next_frame: Cell<i32>,
}

impl Window {
    pub fn new(viewport: Viewport) -> Rc<Self> {
        Rc::new(Self {
            document: Document::new(viewport),
            listeners: Listeners::default(),
            frames: RefCell::new(Vec::new()),
            next_frame: Cell::new(1),
        })
    }

    pub fn document(&self) -> &Rc<Document> {
        &self.document
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    pub fn request_animation_frame(&self, callback: HostValue) -> Result<i32, HostException> {
        if !matches!(callback, HostValue::Function(_)) {
            return Err(HostException::type_error(format!(
                "requestAnimationFrame: callback is {}, not a function",
                callback.type_name()
            )));
        }
        let id = self.next_frame.get();
        self.next_frame.set(id.wrapping_add(1).max(1));
        self.frames.borrow_mut().push((id, callback));
        Ok(id)
    }

    /// Takes every callback queued so far. Callbacks queued while these run
    /// wait for the next frame.
    pub fn take_frame_callbacks(&self) -> Vec<(i32, HostValue)> {
        std::mem::take(&mut *self.frames.borrow_mut())
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }
}

pub struct Document {
    body: Rc<Element>,
}

impl Document {
    fn new(viewport: Viewport) -> Rc<Self> {
        let body = Element::new("body");
        body.fixed_size.set(Some(viewport));
        Rc::new(Self { body })
    }

    pub fn body(&self) -> Option<Rc<Element>> {
        Some(self.body.clone())
    }

    pub fn create_element(&self, tag: &str) -> Result<Rc<Element>, HostException> {
        validate_name(tag, "createElement", "tag name")?;
        Ok(Element::new(&tag.to_ascii_lowercase()))
    }

    pub fn resize(&self, viewport: Viewport) {
        self.body.fixed_size.set(Some(viewport));
    }
}

/// Canvas size when no width or height attribute is set.
const DEFAULT_CANVAS: Viewport = Viewport {
    width: 300,
    height: 150,
};

pub struct Element {
    tag: String,
    attributes: RefCell<Vec<(String, String)>>,
    children: RefCell<Vec<Rc<Element>>>,
    parent: RefCell<Weak<Element>>,
    style: Rc<CssStyleDeclaration>,
    inner_text: RefCell<String>,
    listeners: Listeners,
    context: RefCell<Option<Rc<WebGl2Context>>>,
    fixed_size: Cell<Option<Viewport>>,
}

impl Element {
    fn new(tag: &str) -> Rc<Self> {
        Rc::new(Self {
            tag: tag.to_string(),
            attributes: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            style: Rc::new(CssStyleDeclaration::default()),
            inner_text: RefCell::new(String::new()),
            listeners: Listeners::default(),
            context: RefCell::new(None),
            fixed_size: Cell::new(None),
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_canvas(&self) -> bool {
        self.tag == "canvas"
    }

    pub fn style(&self) -> &Rc<CssStyleDeclaration> {
        &self.style
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<(), HostException> {
        validate_name(name, "setAttribute", "attribute name")?;
        let name = name.to_ascii_lowercase();
        let mut attributes = self.attributes.borrow_mut();
        match attributes.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => attributes.push((name, value.to_string())),
        }
        Ok(())
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.attributes
            .borrow()
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| value.clone())
    }

    pub fn set_inner_text(&self, text: &str) {
        *self.inner_text.borrow_mut() = text.to_string();
        self.children.borrow_mut().clear();
    }

    pub fn inner_text(&self) -> String {
        self.inner_text.borrow().clone()
    }

    pub fn children(&self) -> Vec<Rc<Element>> {
        self.children.borrow().clone()
    }

    pub fn parent(&self) -> Option<Rc<Element>> {
        self.parent.borrow().upgrade()
    }

    pub fn append_child(self: &Rc<Self>, child: &Rc<Element>) -> Result<(), HostException> {
        let mut ancestor = Some(self.clone());
        while let Some(node) = ancestor {
            if Rc::ptr_eq(&node, child) {
                return Err(HostException::new(
                    "HierarchyRequestError",
                    "appendChild: the new child is an ancestor of the parent",
                ));
            }
            ancestor = node.parent();
        }
        if let Some(previous) = child.parent() {
            previous
                .children
                .borrow_mut()
                .retain(|existing| !Rc::ptr_eq(existing, child));
        }
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(child.clone());
        Ok(())
    }

    pub fn client_width(&self) -> i32 {
        self.size().width
    }

    pub fn client_height(&self) -> i32 {
        self.size().height
    }

    fn size(&self) -> Viewport {
        if let Some(size) = self.fixed_size.get() {
            return size;
        }
        let fallback = if self.is_canvas() {
            DEFAULT_CANVAS
        } else {
            Viewport {
                width: 0,
                height: 0,
            }
        };
        Viewport {
            width: self.dimension("width").unwrap_or(fallback.width),
            height: self.dimension("height").unwrap_or(fallback.height),
        }
    }

    fn dimension(&self, name: &str) -> Option<i32> {
        let value = self.attribute(name)?;
        let parsed: f64 = value.trim().parse().ok()?;
        (parsed.is_finite() && parsed >= 0.0).then_some(parsed as i32)
    }

    /// The rendering context for `id`, created on first request. Only
    /// `webgl2` is available headless.
    /// Only canvases have contexts, and only `webgl2` is supported.
    pub fn get_context(
        &self,
        id: &str,
        context_id: impl FnOnce() -> u32,
    ) -> Result<Option<Rc<WebGl2Context>>, HostException> {
        if !self.is_canvas() {
            return Err(HostException::new(
                "NotSupportedError",
                format!("getContext: <{}> is not a canvas", self.tag()),
            ));
        }
        if id != "webgl2" {
            return Ok(None);
        }
        let mut context = self.context.borrow_mut();
        Ok(Some(
            context
                .get_or_insert_with(|| Rc::new(WebGl2Context::new(context_id())))
                .clone(),
        ))
    }
}

#[derive(Default)]
pub struct CssStyleDeclaration {
    properties: RefCell<Vec<(String, String)>>,
}

impl CssStyleDeclaration {
    pub fn set_property(&self, name: &str, value: &str) -> Result<(), HostException> {
        if name.trim().is_empty() {
            return Err(HostException::new(
                "SyntaxError",
                "setProperty: property name is empty",
            ));
        }
        let mut properties = self.properties.borrow_mut();
        if value.is_empty() {
            properties.retain(|(existing, _)| existing != name);
            return Ok(());
        }
        match properties.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => properties.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn property(&self, name: &str) -> Option<String> {
        self.properties
            .borrow()
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.clone())
    }
}

/// An event delivered to listeners. Mouse events carry an offset.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    kind: String,
    offset: Option<(i32, i32)>,
}

impl Event {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            offset: None,
        }
    }

    pub fn mouse(kind: &str, offset_x: i32, offset_y: i32) -> Self {
        Self {
            kind: kind.to_string(),
            offset: Some((offset_x, offset_y)),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_mouse(&self) -> bool {
        self.offset.is_some()
    }

    pub fn offset_x(&self) -> i32 {
        self.offset.map_or(0, |(x, _)| x)
    }

    pub fn offset_y(&self) -> i32 {
        self.offset.map_or(0, |(_, y)| y)
    }
}

/// An error object as the module sees it through a handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorObject {
    name: String,
    message: String,
    stack: String,
}

impl ErrorObject {
    pub fn new(name: &str, message: &str, site: &str) -> Self {
        let head = if message.is_empty() {
            name.to_string()
        } else {
            format!("{name}: {message}")
        };
        Self {
            name: name.to_string(),
            message: message.to_string(),
            stack: format!("{head}\n    at {site}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }
}

fn validate_name(name: &str, operation: &str, what: &str) -> Result<(), HostException> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == ':' => chars
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | ':')),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(HostException::new(
            "InvalidCharacterError",
            format!("{operation}: {what} {name:?} contains an invalid character"),
        ))
    }
}
