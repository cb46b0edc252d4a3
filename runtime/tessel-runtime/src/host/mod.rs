//! Headless stand-ins for the host APIs a module reaches through the
//! boundary catalog.

pub mod dom;
pub mod events;
pub mod gl;

pub use dom::{CssStyleDeclaration, Document, Element, ErrorObject, Event, Listeners, Window};
pub use events::{EventTarget, dispatch_event, fire_animation_frames, invoke_callback, resize};
pub use gl::{GlCommand, GlObject, GlObjectKind, WebGl2Context};
