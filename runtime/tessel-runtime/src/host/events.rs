//! Host-initiated re-entry into the module: animation frames and events.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::config::Viewport;
use crate::error::BridgeError;
use crate::guest::{Guest, GuestVal};
use crate::host::dom::{Element, Event};
use crate::value::{Capability, HostFunction, HostValue, NativeFunction};

#[derive(Clone)]
pub enum EventTarget {
    Window,
    Element(Rc<Element>),
}

/// Calls a host-held function value with one argument.
pub fn invoke_callback<G: Guest + ?Sized>(
    guest: &mut G,
    callback: &HostValue,
    arg: HostValue,
) -> Result<HostValue, BridgeError> {
    match callback {
        HostValue::Function(HostFunction::Closure(closure)) => {
            Ok(match closure.invoke(guest, arg)? {
                Some(GuestVal::I32(raw)) => HostValue::Number(f64::from(raw)),
                Some(GuestVal::F32(value)) => HostValue::Number(f64::from(value)),
                Some(GuestVal::F64(value)) => HostValue::Number(value),
                None => HostValue::Undefined,
            })
        }
        HostValue::Function(HostFunction::Native(native)) => {
            Ok(call_native(guest, *native, &HostValue::Undefined))
        }
        other => Err(other.mismatch(Capability::Function)),
    }
}

pub fn call_native<G: Guest + ?Sized>(
    guest: &mut G,
    native: NativeFunction,
    this: &HostValue,
) -> HostValue {
    match native {
        NativeFunction::GlobalThis if this.is_nullish() => {
            HostValue::Window(guest.bridge_mut().window().clone())
        }
        NativeFunction::GlobalThis => this.clone(),
        NativeFunction::Empty => HostValue::Undefined,
    }
}

/// Runs every animation-frame callback queued before this call, in request
/// order, and returns how many ran. The first failing callback aborts the
/// frame; callbacks not yet run are dropped with it.
pub fn fire_animation_frames<G: Guest + ?Sized>(
    guest: &mut G,
    timestamp: f64,
) -> Result<usize, BridgeError> {
    let callbacks = guest.bridge_mut().window().take_frame_callbacks();
    let count = callbacks.len();
    for (id, callback) in callbacks {
        debug!(id, timestamp, "animation frame");
        invoke_callback(guest, &callback, HostValue::Number(timestamp)).inspect_err(|err| {
            warn!(id, %err, "animation frame callback failed");
        })?;
    }
    Ok(count)
}

/// Delivers `event` to the listeners registered on `target` for its type.
pub fn dispatch_event<G: Guest + ?Sized>(
    guest: &mut G,
    target: &EventTarget,
    event: Event,
) -> Result<usize, BridgeError> {
    let callbacks = match target {
        EventTarget::Window => guest.bridge_mut().window().listeners().matching(event.kind()),
        EventTarget::Element(element) => element.listeners().matching(event.kind()),
    };
    let event = Rc::new(event);
    for callback in &callbacks {
        debug!(kind = event.kind(), "dispatching event");
        invoke_callback(guest, callback, HostValue::Event(event.clone())).inspect_err(|err| {
            warn!(kind = event.kind(), %err, "event listener failed");
        })?;
    }
    Ok(callbacks.len())
}

/// Changes the viewport and notifies `resize` listeners on the window.
pub fn resize<G: Guest + ?Sized>(guest: &mut G, viewport: Viewport) -> Result<usize, BridgeError> {
    guest.bridge_mut().window().document().resize(viewport);
    dispatch_event(guest, &EventTarget::Window, Event::new("resize"))
}
