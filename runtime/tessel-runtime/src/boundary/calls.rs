//! Implementations of the boundary call table.
//!
//! Each function takes the raw ABI arguments of its import: handles and
//! pointers as `u32`, strings as `(ptr, len)` pairs in linear memory, and
//! optional results as handle 0. Entries wrapped in [`catching`] turn a
//! rejected host call, or a handle of the wrong kind, into a pending
//! exception on the module side and return a default. Stale handles,
//! out-of-bounds accesses and failed guest calls propagate and trap.

use std::rc::Rc;

use tracing::{error, warn};

use crate::boundary::Entry;
use crate::closure::Trampoline;
use crate::config::ClosureShim;
use crate::error::{BridgeError, HostException};
use crate::guest::Guest;
use crate::host::events::{call_native, invoke_callback};
use crate::host::{ErrorObject, GlObjectKind};
use crate::transcode::{decode, return_string};
use crate::value::{Capability, Float32Array, HostFunction, HostValue, NativeFunction};

type CallResult<T> = Result<T, BridgeError>;

pub fn catching<G, T, F>(guest: &mut G, entry: Entry, call: F) -> CallResult<T>
where
    G: Guest + ?Sized,
    T: Default,
    F: FnOnce(&mut G) -> CallResult<T>,
{
    let exception = match call(guest) {
        Err(BridgeError::Host(exception)) => exception,
        // A receiver or argument of the wrong kind is what the host reports
        // as a TypeError.
        Err(BridgeError::Capability { expected, found }) => HostException::type_error(format!(
            "{}: expected {expected}, got {found}",
            entry.site()
        )),
        result => return result,
    };
    let handle = guest
        .bridge_mut()
        .record_exception(entry.site(), exception);
    guest.store_exception(handle)?;
    Ok(T::default())
}

fn add<G: Guest + ?Sized>(guest: &mut G, value: HostValue) -> u32 {
    guest.bridge_mut().add(value)
}

fn add_optional<G: Guest + ?Sized>(guest: &mut G, value: Option<HostValue>) -> u32 {
    guest.bridge_mut().add_optional(value)
}

fn flag(value: bool) -> u32 {
    u32::from(value)
}

// Lifecycle

pub fn object_drop_ref<G: Guest + ?Sized>(guest: &mut G, idx: u32) -> CallResult<()> {
    let value = guest.bridge_mut().take(idx)?;
    if let HostValue::Function(HostFunction::Closure(closure)) = value {
        closure.release(guest)?;
    }
    Ok(())
}

pub fn object_clone_ref<G: Guest + ?Sized>(guest: &mut G, idx: u32) -> CallResult<u32> {
    let bridge = guest.bridge_mut();
    let value = bridge.value(idx)?.clone();
    if let HostValue::Function(HostFunction::Closure(closure)) = &value {
        closure.retain();
    }
    Ok(bridge.add(value))
}

pub fn string_new<G: Guest + ?Sized>(guest: &mut G, ptr: u32, len: u32) -> CallResult<u32> {
    let text = decode(guest, ptr, len)?;
    Ok(add(guest, HostValue::String(Rc::from(text))))
}

/// The module gave up its handle to a closure it leaks on purpose: the
/// handle goes, the closure stays alive wherever the host stored it.
pub fn cb_forget<G: Guest + ?Sized>(guest: &mut G, idx: u32) -> CallResult<()> {
    guest.bridge_mut().take(idx).map(drop)
}

pub fn boolean_get<G: Guest + ?Sized>(guest: &mut G, idx: u32) -> CallResult<u32> {
    Ok(guest.bridge_mut().value(idx)?.boolean_code())
}

pub fn throw<G: Guest + ?Sized>(guest: &mut G, ptr: u32, len: u32) -> CallResult<()> {
    let message = decode(guest, ptr, len)?;
    Err(BridgeError::Thrown(message))
}

pub fn memory<G: Guest + ?Sized>(guest: &mut G) -> CallResult<u32> {
    Ok(add(guest, HostValue::Memory))
}

pub fn closure_wrapper<G: Guest + ?Sized>(
    guest: &mut G,
    shim: &ClosureShim,
    state: u32,
    vtable: u32,
) -> CallResult<u32> {
    let closure = Trampoline::new(shim, state, vtable);
    Ok(add(guest, HostValue::Function(HostFunction::Closure(closure))))
}

// Diagnostics

pub fn error_new<G: Guest + ?Sized>(guest: &mut G) -> CallResult<u32> {
    let error = ErrorObject::new("Error", "", Entry::ErrorNew.site());
    Ok(add(guest, HostValue::Error(Rc::new(error))))
}

pub fn error_stack<G: Guest + ?Sized>(guest: &mut G, ret: u32, idx: u32) -> CallResult<()> {
    let stack = match guest.bridge_mut().value(idx)? {
        HostValue::Error(error) => error.stack().to_string(),
        other => return Err(other.mismatch(Capability::Error)),
    };
    return_string(guest, ret, Some(&stack))
}

/// Reports a message and frees the buffer it arrived in.
pub fn console_error<G: Guest + ?Sized>(guest: &mut G, ptr: u32, len: u32) -> CallResult<()> {
    let message = decode(guest, ptr, len)?;
    error!(target: "console", "{message}");
    guest.free(ptr, len)
}

// Type checks

fn instance_of<G: Guest + ?Sized>(
    guest: &mut G,
    idx: u32,
    capability: Capability,
) -> CallResult<u32> {
    Ok(flag(guest.bridge_mut().value(idx)?.has(capability)))
}

pub fn instanceof_window<G: Guest + ?Sized>(guest: &mut G, idx: u32) -> CallResult<u32> {
    instance_of(guest, idx, Capability::Window)
}

pub fn instanceof_html_canvas_element<G: Guest + ?Sized>(
    guest: &mut G,
    idx: u32,
) -> CallResult<u32> {
    instance_of(guest, idx, Capability::CanvasElement)
}

pub fn instanceof_html_element<G: Guest + ?Sized>(guest: &mut G, idx: u32) -> CallResult<u32> {
    instance_of(guest, idx, Capability::HtmlElement)
}

pub fn instanceof_mouse_event<G: Guest + ?Sized>(guest: &mut G, idx: u32) -> CallResult<u32> {
    instance_of(guest, idx, Capability::MouseEvent)
}

pub fn instanceof_webgl2<G: Guest + ?Sized>(guest: &mut G, idx: u32) -> CallResult<u32> {
    instance_of(guest, idx, Capability::WebGl2)
}

pub fn instanceof_memory<G: Guest + ?Sized>(guest: &mut G, idx: u32) -> CallResult<u32> {
    instance_of(guest, idx, Capability::Memory)
}

// DOM

pub fn style_set_property<G: Guest + ?Sized>(
    guest: &mut G,
    style: u32,
    name_ptr: u32,
    name_len: u32,
    value_ptr: u32,
    value_len: u32,
) -> CallResult<()> {
    catching(guest, Entry::StyleSetProperty, |guest| {
        let style = match guest.bridge_mut().value(style)? {
            HostValue::Style(style) => style.clone(),
            other => return Err(other.mismatch(Capability::Style)),
        };
        let name = decode(guest, name_ptr, name_len)?;
        let value = decode(guest, value_ptr, value_len)?;
        Ok(style.set_property(&name, &value)?)
    })
}

pub fn document_create_element<G: Guest + ?Sized>(
    guest: &mut G,
    document: u32,
    ptr: u32,
    len: u32,
) -> CallResult<u32> {
    catching(guest, Entry::DocumentCreateElement, |guest| {
        let document = guest.bridge_mut().document(document)?;
        let tag = decode(guest, ptr, len)?;
        let element = document.create_element(&tag)?;
        Ok(add(guest, HostValue::Element(element)))
    })
}

pub fn document_body<G: Guest + ?Sized>(guest: &mut G, document: u32) -> CallResult<u32> {
    let body = guest.bridge_mut().document(document)?.body();
    Ok(add_optional(guest, body.map(HostValue::Element)))
}

pub fn element_set_attribute<G: Guest + ?Sized>(
    guest: &mut G,
    element: u32,
    name_ptr: u32,
    name_len: u32,
    value_ptr: u32,
    value_len: u32,
) -> CallResult<()> {
    catching(guest, Entry::ElementSetAttribute, |guest| {
        let element = guest.bridge_mut().element(element)?;
        let name = decode(guest, name_ptr, name_len)?;
        let value = decode(guest, value_ptr, value_len)?;
        Ok(element.set_attribute(&name, &value)?)
    })
}

pub fn element_client_width<G: Guest + ?Sized>(guest: &mut G, element: u32) -> CallResult<i32> {
    Ok(guest.bridge_mut().element(element)?.client_width())
}

pub fn element_client_height<G: Guest + ?Sized>(guest: &mut G, element: u32) -> CallResult<i32> {
    Ok(guest.bridge_mut().element(element)?.client_height())
}

pub fn canvas_get_context<G: Guest + ?Sized>(
    guest: &mut G,
    canvas: u32,
    ptr: u32,
    len: u32,
) -> CallResult<u32> {
    catching(guest, Entry::CanvasGetContext, |guest| {
        let canvas = guest.bridge_mut().element(canvas)?;
        let id = decode(guest, ptr, len)?;
        let bridge = guest.bridge_mut();
        let context = canvas.get_context(&id, || bridge.next_context_id())?;
        Ok(bridge.add_optional(context.map(HostValue::Gl)))
    })
}

pub fn html_element_set_inner_text<G: Guest + ?Sized>(
    guest: &mut G,
    element: u32,
    ptr: u32,
    len: u32,
) -> CallResult<()> {
    let element = guest.bridge_mut().element(element)?;
    let text = decode(guest, ptr, len)?;
    element.set_inner_text(&text);
    Ok(())
}

pub fn html_element_style<G: Guest + ?Sized>(guest: &mut G, element: u32) -> CallResult<u32> {
    let style = guest.bridge_mut().element(element)?.style().clone();
    Ok(add(guest, HostValue::Style(style)))
}

pub fn node_append_child<G: Guest + ?Sized>(
    guest: &mut G,
    parent: u32,
    child: u32,
) -> CallResult<u32> {
    catching(guest, Entry::NodeAppendChild, |guest| {
        let bridge = guest.bridge_mut();
        let parent = bridge.element(parent)?;
        let child = match bridge.value(child)? {
            HostValue::Element(child) => child.clone(),
            other => {
                return Err(HostException::type_error(format!(
                    "appendChild: argument is {}, not a Node",
                    other.type_name()
                ))
                .into());
            }
        };
        parent.append_child(&child)?;
        Ok(bridge.add(HostValue::Element(child)))
    })
}

pub fn window_document<G: Guest + ?Sized>(guest: &mut G, window: u32) -> CallResult<u32> {
    let document = guest.bridge_mut().window_at(window)?.document().clone();
    Ok(add_optional(guest, Some(HostValue::Document(document))))
}

// Events

pub fn add_event_listener<G: Guest + ?Sized>(
    guest: &mut G,
    target: u32,
    ptr: u32,
    len: u32,
    callback: u32,
) -> CallResult<()> {
    catching(guest, Entry::AddEventListener, |guest| {
        let bridge = guest.bridge_mut();
        let target = bridge.value(target)?.clone();
        let callback = bridge.value(callback)?.clone();
        let kind = decode(guest, ptr, len)?;
        match &target {
            HostValue::Window(window) => window.listeners().add(&kind, callback)?,
            HostValue::Element(element) => element.listeners().add(&kind, callback)?,
            other => return Err(other.mismatch(Capability::EventTarget)),
        }
        Ok(())
    })
}

pub fn mouse_event_offset_x<G: Guest + ?Sized>(guest: &mut G, event: u32) -> CallResult<i32> {
    Ok(guest.bridge_mut().mouse_event(event)?.offset_x())
}

pub fn mouse_event_offset_y<G: Guest + ?Sized>(guest: &mut G, event: u32) -> CallResult<i32> {
    Ok(guest.bridge_mut().mouse_event(event)?.offset_y())
}

pub fn request_animation_frame<G: Guest + ?Sized>(
    guest: &mut G,
    window: u32,
    callback: u32,
) -> CallResult<i32> {
    catching(guest, Entry::RequestAnimationFrame, |guest| {
        let bridge = guest.bridge_mut();
        let window = bridge.window_at(window)?;
        let callback = bridge.value(callback)?.clone();
        Ok(window.request_animation_frame(callback)?)
    })
}

// Functions

pub fn function_call<G: Guest + ?Sized>(
    guest: &mut G,
    function: u32,
    this: u32,
) -> CallResult<u32> {
    catching(guest, Entry::FunctionCall, |guest| {
        let bridge = guest.bridge_mut();
        let function = bridge.value(function)?.clone();
        let this = bridge.value(this)?.clone();
        let result = match &function {
            HostValue::Function(HostFunction::Native(native)) => call_native(guest, *native, &this),
            HostValue::Function(HostFunction::Closure(_)) => {
                invoke_callback(guest, &function, HostValue::Undefined)?
            }
            other => {
                return Err(HostException::type_error(format!(
                    "{} is not a function",
                    other.type_name()
                ))
                .into());
            }
        };
        Ok(add(guest, result))
    })
}

pub fn function_new_no_args<G: Guest + ?Sized>(
    guest: &mut G,
    ptr: u32,
    len: u32,
) -> CallResult<u32> {
    let source = decode(guest, ptr, len)?;
    let function = NativeFunction::compile(&source);
    Ok(add(guest, HostValue::Function(HostFunction::Native(function))))
}

// Typed arrays

pub fn memory_buffer<G: Guest + ?Sized>(guest: &mut G, memory: u32) -> CallResult<u32> {
    let (bytes, bridge) = guest.parts();
    match bridge.value(memory)? {
        HostValue::Memory => {}
        other => return Err(other.mismatch(Capability::Memory)),
    }
    let buffer = bridge.views.bytes(bytes).buffer();
    Ok(bridge.add(HostValue::ArrayBuffer(buffer)))
}

pub fn float32_array_new<G: Guest + ?Sized>(guest: &mut G, buffer: u32) -> CallResult<u32> {
    let bridge = guest.bridge_mut();
    let array = match bridge.value(buffer)? {
        HostValue::ArrayBuffer(buffer) => Float32Array::over(*buffer),
        other => return Err(other.mismatch(Capability::ArrayBuffer)),
    };
    Ok(bridge.add(HostValue::Float32Array(array)))
}

pub fn float32_array_subarray<G: Guest + ?Sized>(
    guest: &mut G,
    array: u32,
    begin: u32,
    end: u32,
) -> CallResult<u32> {
    let bridge = guest.bridge_mut();
    let sub = match bridge.value(array)? {
        HostValue::Float32Array(array) => array.subarray(begin, end),
        other => return Err(other.mismatch(Capability::Float32Array)),
    };
    Ok(bridge.add(HostValue::Float32Array(sub)))
}

/// Reads the floats a typed array covers. An array over a buffer that has
/// since been replaced is detached and reads as empty.
fn resolve_floats<G: Guest + ?Sized>(guest: &mut G, array: &Float32Array) -> CallResult<Vec<f32>> {
    let (bytes, bridge) = guest.parts();
    let floats = bridge.views.floats(bytes);
    if floats.buffer() != array.buffer {
        warn!("typed array refers to a detached buffer");
        return Ok(Vec::new());
    }
    floats.to_vec(array.offset, array.len)
}

fn floats_at<G: Guest + ?Sized>(guest: &mut G, ptr: u32, len: u32) -> CallResult<Vec<f32>> {
    let (bytes, bridge) = guest.parts();
    bridge.views.floats(bytes).to_vec(ptr / 4, len)
}

// Graphics

pub fn gl_bind_vertex_array<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    array: u32,
) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    gl.bind_vertex_array(bridge.gl_object(array, GlObjectKind::VertexArray)?.as_ref());
    Ok(())
}

pub fn gl_buffer_data<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    target: u32,
    data: u32,
    usage: u32,
) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    let array = match bridge.value(data)? {
        HostValue::Float32Array(array) => *array,
        other => return Err(other.mismatch(Capability::Float32Array)),
    };
    let floats = resolve_floats(guest, &array)?;
    gl.buffer_data(target, floats, usage);
    Ok(())
}

pub fn gl_create_vertex_array<G: Guest + ?Sized>(guest: &mut G, ctx: u32) -> CallResult<u32> {
    let bridge = guest.bridge_mut();
    let array = bridge.gl(ctx)?.create_vertex_array();
    Ok(bridge.add_optional(Some(HostValue::GlObject(array))))
}

fn gl_uniform_fv<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    location: u32,
    ptr: u32,
    len: u32,
) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    let location = bridge.gl_object(location, GlObjectKind::UniformLocation)?;
    let values = floats_at(guest, ptr, len)?;
    gl.uniform(location.as_ref(), values);
    Ok(())
}

pub fn gl_uniform1fv<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    location: u32,
    ptr: u32,
    len: u32,
) -> CallResult<()> {
    gl_uniform_fv(guest, ctx, location, ptr, len)
}

pub fn gl_uniform2fv<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    location: u32,
    ptr: u32,
    len: u32,
) -> CallResult<()> {
    gl_uniform_fv(guest, ctx, location, ptr, len)
}

pub fn gl_attach_shader<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    program: u32,
    shader: u32,
) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    let program = bridge.required_gl_object(program, GlObjectKind::Program)?;
    let shader = bridge.required_gl_object(shader, GlObjectKind::Shader)?;
    gl.attach_shader(&program, &shader);
    Ok(())
}

pub fn gl_bind_buffer<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    target: u32,
    buffer: u32,
) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    gl.bind_buffer(target, bridge.gl_object(buffer, GlObjectKind::Buffer)?.as_ref());
    Ok(())
}

pub fn gl_clear<G: Guest + ?Sized>(guest: &mut G, ctx: u32, mask: u32) -> CallResult<()> {
    guest.bridge_mut().gl(ctx)?.clear(mask);
    Ok(())
}

pub fn gl_clear_color<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    r: f32,
    g: f32,
    b: f32,
    a: f32,
) -> CallResult<()> {
    guest.bridge_mut().gl(ctx)?.clear_color(r, g, b, a);
    Ok(())
}

pub fn gl_compile_shader<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    shader: u32,
) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    gl.compile_shader(&bridge.required_gl_object(shader, GlObjectKind::Shader)?);
    Ok(())
}

pub fn gl_create_buffer<G: Guest + ?Sized>(guest: &mut G, ctx: u32) -> CallResult<u32> {
    let bridge = guest.bridge_mut();
    let buffer = bridge.gl(ctx)?.create_buffer();
    Ok(bridge.add_optional(Some(HostValue::GlObject(buffer))))
}

pub fn gl_create_program<G: Guest + ?Sized>(guest: &mut G, ctx: u32) -> CallResult<u32> {
    let bridge = guest.bridge_mut();
    let program = bridge.gl(ctx)?.create_program();
    Ok(bridge.add_optional(Some(HostValue::GlObject(program))))
}

pub fn gl_create_shader<G: Guest + ?Sized>(guest: &mut G, ctx: u32, kind: u32) -> CallResult<u32> {
    let bridge = guest.bridge_mut();
    let shader = bridge.gl(ctx)?.create_shader(kind);
    Ok(bridge.add_optional(shader.map(HostValue::GlObject)))
}

pub fn gl_delete_program<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    program: u32,
) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    gl.delete_program(bridge.gl_object(program, GlObjectKind::Program)?.as_ref());
    Ok(())
}

pub fn gl_delete_shader<G: Guest + ?Sized>(guest: &mut G, ctx: u32, shader: u32) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    gl.delete_shader(bridge.gl_object(shader, GlObjectKind::Shader)?.as_ref());
    Ok(())
}

pub fn gl_draw_arrays<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    mode: u32,
    first: i32,
    count: i32,
) -> CallResult<()> {
    guest.bridge_mut().gl(ctx)?.draw_arrays(mode, first, count);
    Ok(())
}

pub fn gl_enable_vertex_attrib_array<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    index: u32,
) -> CallResult<()> {
    guest.bridge_mut().gl(ctx)?.enable_vertex_attrib_array(index);
    Ok(())
}

pub fn gl_get_attrib_location<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    program: u32,
    ptr: u32,
    len: u32,
) -> CallResult<i32> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    let program = bridge.required_gl_object(program, GlObjectKind::Program)?;
    let name = decode(guest, ptr, len)?;
    Ok(gl.attrib_location(&program, &name))
}

pub fn gl_get_program_info_log<G: Guest + ?Sized>(
    guest: &mut G,
    ret: u32,
    ctx: u32,
    program: u32,
) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    let log = gl.program_info_log(&bridge.required_gl_object(program, GlObjectKind::Program)?);
    return_string(guest, ret, log.as_deref())
}

pub fn gl_get_program_parameter<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    program: u32,
    pname: u32,
) -> CallResult<u32> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    let program = bridge.required_gl_object(program, GlObjectKind::Program)?;
    let value = gl.program_parameter(&program, pname);
    Ok(bridge.add(value))
}

pub fn gl_get_shader_info_log<G: Guest + ?Sized>(
    guest: &mut G,
    ret: u32,
    ctx: u32,
    shader: u32,
) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    let log = gl.shader_info_log(&bridge.required_gl_object(shader, GlObjectKind::Shader)?);
    return_string(guest, ret, log.as_deref())
}

pub fn gl_get_shader_parameter<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    shader: u32,
    pname: u32,
) -> CallResult<u32> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    let shader = bridge.required_gl_object(shader, GlObjectKind::Shader)?;
    let value = gl.shader_parameter(&shader, pname);
    Ok(bridge.add(value))
}

pub fn gl_get_uniform_location<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    program: u32,
    ptr: u32,
    len: u32,
) -> CallResult<u32> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    let program = bridge.required_gl_object(program, GlObjectKind::Program)?;
    let name = decode(guest, ptr, len)?;
    let location = gl.uniform_location(&program, &name);
    Ok(add_optional(guest, location.map(HostValue::GlObject)))
}

pub fn gl_link_program<G: Guest + ?Sized>(guest: &mut G, ctx: u32, program: u32) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    gl.link_program(&bridge.required_gl_object(program, GlObjectKind::Program)?);
    Ok(())
}

pub fn gl_shader_source<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    shader: u32,
    ptr: u32,
    len: u32,
) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    let shader = bridge.required_gl_object(shader, GlObjectKind::Shader)?;
    let source = decode(guest, ptr, len)?;
    gl.shader_source(&shader, &source);
    Ok(())
}

pub fn gl_uniform1f<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    location: u32,
    value: f32,
) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    gl.uniform(bridge.gl_object(location, GlObjectKind::UniformLocation)?.as_ref(), vec![value]);
    Ok(())
}

pub fn gl_use_program<G: Guest + ?Sized>(guest: &mut G, ctx: u32, program: u32) -> CallResult<()> {
    let bridge = guest.bridge_mut();
    let gl = bridge.gl(ctx)?;
    gl.use_program(bridge.gl_object(program, GlObjectKind::Program)?.as_ref());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn gl_vertex_attrib_pointer<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    index: u32,
    size: i32,
    ty: u32,
    normalized: u32,
    stride: i32,
    offset: i32,
) -> CallResult<()> {
    guest
        .bridge_mut()
        .gl(ctx)?
        .vertex_attrib_pointer(index, size, ty, normalized != 0, stride, offset);
    Ok(())
}

pub fn gl_viewport<G: Guest + ?Sized>(
    guest: &mut G,
    ctx: u32,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
) -> CallResult<()> {
    guest.bridge_mut().gl(ctx)?.viewport(x, y, width, height);
    Ok(())
}
