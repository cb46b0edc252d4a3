use std::cell::RefCell;
use std::rc::Rc;

use tessel_obj_model::Sentinel;
use tessel_runtime::boundary::calls;
use tessel_runtime::host::gl::{COMPILE_STATUS, FRAGMENT_SHADER, LINK_STATUS, VERTEX_SHADER};
use tessel_runtime::host::{Event, EventTarget, GlObjectKind, dispatch_event, fire_animation_frames};
use tessel_runtime::{BridgeConfig, BridgeError, Guest, GuestVal, HostValue, SimGuest};

const ARRAY_BUFFER: u32 = 0x8892;
const STATIC_DRAW: u32 = 0x88E4;

fn sim() -> SimGuest {
    SimGuest::new(BridgeConfig::default())
}

fn string(sim: &mut SimGuest, text: &str) -> (u32, u32) {
    sim.write_str(text)
}

/// Walks the same bootstrap a generated `run` does: global object, window,
/// document, body.
fn bootstrap(sim: &mut SimGuest) -> (u32, u32, u32) {
    let (ptr, len) = string(sim, "return this");
    let global_fn = calls::function_new_no_args(sim, ptr, len).unwrap();
    let undefined = sim.bridge().heap.sentinel(Sentinel::Undefined).raw();
    let global = calls::function_call(sim, global_fn, undefined).unwrap();
    calls::object_drop_ref(sim, global_fn).unwrap();
    assert_eq!(calls::instanceof_window(sim, global).unwrap(), 1);
    let document = calls::window_document(sim, global).unwrap();
    let body = calls::document_body(sim, document).unwrap();
    (global, document, body)
}

fn create(sim: &mut SimGuest, document: u32, tag: &str) -> u32 {
    let (ptr, len) = string(sim, tag);
    calls::document_create_element(sim, document, ptr, len).unwrap()
}

#[test]
fn string_handles_follow_table_discipline() {
    let mut sim = sim();
    let (ptr, len) = string(&mut sim, "hello");
    let first = calls::string_new(&mut sim, ptr, len).unwrap();
    assert_eq!(first, 36);
    let copy = calls::object_clone_ref(&mut sim, first).unwrap();
    assert_ne!(copy, first);
    calls::object_drop_ref(&mut sim, first).unwrap();
    assert_eq!(sim.bridge().string(copy).unwrap().as_ref(), "hello");
    let reused = calls::string_new(&mut sim, ptr, len).unwrap();
    assert_eq!(reused, first);
}

#[test]
fn sentinel_handles_survive_drops() {
    let mut sim = sim();
    let null = sim.bridge().heap.sentinel(Sentinel::Null).raw();
    let truthy = sim.bridge().heap.sentinel(Sentinel::True).raw();
    calls::object_drop_ref(&mut sim, truthy).unwrap();
    calls::object_drop_ref(&mut sim, null).unwrap();
    assert_eq!(calls::boolean_get(&mut sim, truthy).unwrap(), 1);
    assert_eq!(calls::boolean_get(&mut sim, null).unwrap(), 2);
    let falsy = sim.bridge().heap.sentinel(Sentinel::False).raw();
    assert_eq!(calls::boolean_get(&mut sim, falsy).unwrap(), 0);
}

#[test]
fn bootstrap_reaches_window_and_body() {
    let mut sim = sim();
    let (_, _, body) = bootstrap(&mut sim);
    assert_eq!(calls::instanceof_html_element(&mut sim, body).unwrap(), 1);
    assert_eq!(calls::instanceof_html_canvas_element(&mut sim, body).unwrap(), 0);
    assert_eq!(calls::element_client_width(&mut sim, body).unwrap(), 1024);
    assert_eq!(calls::element_client_height(&mut sim, body).unwrap(), 768);
}

#[test]
fn rejected_host_call_becomes_pending_exception() {
    let mut sim = sim();
    let (_, document, _) = bootstrap(&mut sim);
    let (ptr, len) = string(&mut sim, "not a tag");
    let result = calls::document_create_element(&mut sim, document, ptr, len).unwrap();
    assert_eq!(result, 0);

    let stored = sim.take_exception().expect("exception stored");
    let HostValue::Error(error) = sim.bridge().value(stored.raw()).unwrap() else {
        panic!("expected an error object");
    };
    assert_eq!(error.name(), "InvalidCharacterError");
    assert!(!error.message().is_empty());
    assert!(matches!(sim.bridge().last_exception(), Some(HostValue::Error(_))));
}

fn stored_error(sim: &mut SimGuest) -> (String, String) {
    let stored = sim.take_exception().expect("exception stored");
    let HostValue::Error(error) = sim.bridge().value(stored.raw()).unwrap() else {
        panic!("expected an error object");
    };
    (error.name().to_string(), error.message().to_string())
}

#[test]
fn wrong_kind_receivers_are_caught_type_errors() {
    let mut sim = sim();
    let (window, _, _) = bootstrap(&mut sim);
    let (ptr, len) = string(&mut sim, "div");
    assert_eq!(calls::document_create_element(&mut sim, window, ptr, len).unwrap(), 0);
    let (name, message) = stored_error(&mut sim);
    assert_eq!(name, "TypeError");
    assert!(message.contains("Window"));

    let (ptr, len) = string(&mut sim, "not a target");
    let target = calls::string_new(&mut sim, ptr, len).unwrap();
    let (ptr, len) = string(&mut sim, "return this");
    let callback = calls::function_new_no_args(&mut sim, ptr, len).unwrap();
    let (ptr, len) = string(&mut sim, "click");
    calls::add_event_listener(&mut sim, target, ptr, len, callback).unwrap();
    let (name, message) = stored_error(&mut sim);
    assert_eq!(name, "TypeError");
    assert!(message.contains("string"));
    assert!(sim.exceptions().is_empty());
}

#[test]
fn stale_handles_still_trap() {
    let mut sim = sim();
    let (ptr, len) = string(&mut sim, "div");
    let err = calls::document_create_element(&mut sim, 999, ptr, len).unwrap_err();
    assert!(matches!(err, BridgeError::StaleHandle(999)));
    assert!(sim.exceptions().is_empty());
}

#[test]
fn context_on_non_canvas_is_not_supported() {
    let mut sim = sim();
    let (_, document, _) = bootstrap(&mut sim);
    let div = create(&mut sim, document, "div");
    let (ptr, len) = string(&mut sim, "webgl2");
    assert_eq!(calls::canvas_get_context(&mut sim, div, ptr, len).unwrap(), 0);
    let (name, message) = stored_error(&mut sim);
    assert_eq!(name, "NotSupportedError");
    assert!(message.contains("div"));
}

#[test]
fn throw_carries_message() {
    let mut sim = sim();
    let (ptr, len) = string(&mut sim, "unreachable executed");
    let err = calls::throw(&mut sim, ptr, len).unwrap_err();
    assert!(matches!(err, BridgeError::Thrown(message) if message == "unreachable executed"));
}

#[test]
fn error_stack_is_returned_through_retptr() {
    let mut sim = sim();
    let error = calls::error_new(&mut sim).unwrap();
    let ret = sim.malloc(8).unwrap();
    calls::error_stack(&mut sim, ret, error).unwrap();
    let (ptr, len) = (sim.read_u32(ret), sim.read_u32(ret + 4));
    assert!(len > 0);
    assert!(sim.read_str(ptr, len).starts_with("Error"));
}

#[test]
fn console_error_frees_its_buffer() {
    let mut sim = sim();
    let (ptr, len) = string(&mut sim, "panicked at src/lib.rs:1:1");
    calls::console_error(&mut sim, ptr, len).unwrap();
    assert_eq!(sim.frees(), &[(ptr, len)]);
}

#[test]
fn dom_tree_and_attributes() {
    let mut sim = sim();
    let (_, document, body) = bootstrap(&mut sim);
    let canvas = create(&mut sim, document, "canvas");
    let (name_ptr, name_len) = string(&mut sim, "width");
    let (value_ptr, value_len) = string(&mut sim, "640");
    calls::element_set_attribute(&mut sim, canvas, name_ptr, name_len, value_ptr, value_len)
        .unwrap();
    assert_eq!(calls::element_client_width(&mut sim, canvas).unwrap(), 640);

    let appended = calls::node_append_child(&mut sim, body, canvas).unwrap();
    assert_ne!(appended, 0);
    assert_eq!(calls::instanceof_html_canvas_element(&mut sim, appended).unwrap(), 1);

    let cycle = calls::node_append_child(&mut sim, canvas, body).unwrap();
    assert_eq!(cycle, 0);
    assert_eq!(sim.exceptions().len(), 1);

    let style = calls::html_element_style(&mut sim, canvas).unwrap();
    let (prop_ptr, prop_len) = string(&mut sim, "position");
    let (val_ptr, val_len) = string(&mut sim, "absolute");
    calls::style_set_property(&mut sim, style, prop_ptr, prop_len, val_ptr, val_len).unwrap();
    let element = sim.bridge().element(canvas).unwrap();
    assert_eq!(element.style().property("position").as_deref(), Some("absolute"));

    let (text_ptr, text_len) = string(&mut sim, "Loading…");
    calls::html_element_set_inner_text(&mut sim, body, text_ptr, text_len).unwrap();
    assert_eq!(sim.bridge().element(body).unwrap().inner_text(), "Loading…");
}

#[test]
fn float_arrays_read_through_live_memory() {
    let mut sim = sim();
    let (_, document, _) = bootstrap(&mut sim);
    let canvas = create(&mut sim, document, "canvas");
    let (ptr, len) = string(&mut sim, "webgl2");
    let gl = calls::canvas_get_context(&mut sim, canvas, ptr, len).unwrap();
    assert_eq!(calls::instanceof_webgl2(&mut sim, gl).unwrap(), 1);

    let buffer = calls::gl_create_buffer(&mut sim, gl).unwrap();
    calls::gl_bind_buffer(&mut sim, gl, ARRAY_BUFFER, buffer).unwrap();
    let (data_ptr, count) = sim.write_f32s(&[-1.0, 1.0, 0.5, 0.25]);

    let memory = calls::memory(&mut sim).unwrap();
    assert_eq!(calls::instanceof_memory(&mut sim, memory).unwrap(), 1);
    let array_buffer = calls::memory_buffer(&mut sim, memory).unwrap();
    let floats = calls::float32_array_new(&mut sim, array_buffer).unwrap();
    let (begin, end) = (data_ptr / 4, data_ptr / 4 + count);
    let view = calls::float32_array_subarray(&mut sim, floats, begin, end).unwrap();
    calls::gl_buffer_data(&mut sim, gl, ARRAY_BUFFER, view, STATIC_DRAW).unwrap();

    let context = sim.bridge().gl(gl).unwrap();
    let object = sim.bridge().required_gl_object(buffer, GlObjectKind::Buffer).unwrap();
    assert_eq!(context.buffer_contents(&object), Some(vec![-1.0, 1.0, 0.5, 0.25]));
}

#[test]
fn views_follow_memory_growth() {
    let mut sim = SimGuest::with_memory(BridgeConfig::default(), 256);
    let (ptr, len) = string(&mut sim, "before");
    let first = calls::string_new(&mut sim, ptr, len).unwrap();
    let rebuilds = sim.bridge().views.rebuilds();

    sim.grow(64 * 1024);
    let (ptr, len) = string(&mut sim, "after");
    let second = calls::string_new(&mut sim, ptr, len).unwrap();
    assert_eq!(sim.bridge().string(first).unwrap().as_ref(), "before");
    assert_eq!(sim.bridge().string(second).unwrap().as_ref(), "after");
    assert_eq!(sim.bridge().views.rebuilds(), rebuilds + 1);
}

#[test]
fn typed_array_over_replaced_buffer_is_detached() {
    let mut sim = sim();
    let (_, document, _) = bootstrap(&mut sim);
    let canvas = create(&mut sim, document, "canvas");
    let (ptr, len) = string(&mut sim, "webgl2");
    let gl = calls::canvas_get_context(&mut sim, canvas, ptr, len).unwrap();
    let buffer = calls::gl_create_buffer(&mut sim, gl).unwrap();
    calls::gl_bind_buffer(&mut sim, gl, ARRAY_BUFFER, buffer).unwrap();
    let (data_ptr, count) = sim.write_f32s(&[3.0, 4.0]);
    let memory = calls::memory(&mut sim).unwrap();
    let array_buffer = calls::memory_buffer(&mut sim, memory).unwrap();
    let floats = calls::float32_array_new(&mut sim, array_buffer).unwrap();
    let (begin, end) = (data_ptr / 4, data_ptr / 4 + count);
    let view = calls::float32_array_subarray(&mut sim, floats, begin, end).unwrap();

    sim.grow(64 * 1024);
    calls::gl_buffer_data(&mut sim, gl, ARRAY_BUFFER, view, STATIC_DRAW).unwrap();
    let context = sim.bridge().gl(gl).unwrap();
    let object = sim.bridge().required_gl_object(buffer, GlObjectKind::Buffer).unwrap();
    assert_eq!(context.buffer_contents(&object), Some(Vec::new()));
}

#[test]
fn shader_pipeline_round_trip() {
    let mut sim = sim();
    let (_, document, _) = bootstrap(&mut sim);
    let canvas = create(&mut sim, document, "canvas");
    let (ptr, len) = string(&mut sim, "webgl2");
    let gl = calls::canvas_get_context(&mut sim, canvas, ptr, len).unwrap();

    let compile = |sim: &mut SimGuest, kind: u32, source: &str| {
        let shader = calls::gl_create_shader(sim, gl, kind).unwrap();
        let (ptr, len) = sim.write_str(source);
        calls::gl_shader_source(sim, gl, shader, ptr, len).unwrap();
        calls::gl_compile_shader(sim, gl, shader).unwrap();
        let status = calls::gl_get_shader_parameter(sim, gl, shader, COMPILE_STATUS).unwrap();
        assert_eq!(calls::boolean_get(sim, status).unwrap(), 1);
        shader
    };
    let vertex = compile(&mut sim, VERTEX_SHADER, "#version 300 es\nin vec2 pos;\nvoid main() {}");
    let fragment = compile(
        &mut sim,
        FRAGMENT_SHADER,
        "#version 300 es\nprecision highp float;\nuniform float t;\nuniform vec2 c[4];\nvoid main() {}",
    );

    let program = calls::gl_create_program(&mut sim, gl).unwrap();
    calls::gl_attach_shader(&mut sim, gl, program, vertex).unwrap();
    calls::gl_attach_shader(&mut sim, gl, program, fragment).unwrap();
    calls::gl_link_program(&mut sim, gl, program).unwrap();
    let linked = calls::gl_get_program_parameter(&mut sim, gl, program, LINK_STATUS).unwrap();
    assert_eq!(calls::boolean_get(&mut sim, linked).unwrap(), 1);

    let ret = sim.malloc(8).unwrap();
    calls::gl_get_program_info_log(&mut sim, ret, gl, program).unwrap();
    assert_eq!(sim.read_u32(ret + 4), 0);

    let (ptr, len) = string(&mut sim, "pos");
    assert_eq!(calls::gl_get_attrib_location(&mut sim, gl, program, ptr, len).unwrap(), 0);
    let (ptr, len) = string(&mut sim, "missing");
    assert_eq!(calls::gl_get_uniform_location(&mut sim, gl, program, ptr, len).unwrap(), 0);

    let (ptr, len) = string(&mut sim, "c");
    let location = calls::gl_get_uniform_location(&mut sim, gl, program, ptr, len).unwrap();
    assert_ne!(location, 0);
    let (values, count) = sim.write_f32s(&[0.1, 0.2, 0.3, 0.4]);
    calls::gl_uniform2fv(&mut sim, gl, location, values, count).unwrap();
    calls::gl_use_program(&mut sim, gl, program).unwrap();
    calls::gl_draw_arrays(&mut sim, gl, 4, 0, 6).unwrap();

    let context = sim.bridge().gl(gl).unwrap();
    let program = sim.bridge().required_gl_object(program, GlObjectKind::Program).unwrap();
    assert_eq!(context.uniform_value(&program, "c"), Some(vec![0.1, 0.2, 0.3, 0.4]));
    assert_eq!(context.draw_count(), 1);
}

#[test]
fn animation_frame_closure_runs_and_is_destroyed_on_drop() {
    let mut sim = sim();
    let calls_seen = Rc::new(RefCell::new(Vec::new()));
    let destroyed = Rc::new(RefCell::new(Vec::new()));
    let seen = calls_seen.clone();
    sim.register(31, move |_, args| {
        seen.borrow_mut().push(args.to_vec());
        Ok(None)
    });
    let gone = destroyed.clone();
    sim.register(28, move |_, args| {
        gone.borrow_mut().push(args.to_vec());
        Ok(None)
    });

    let (window, _, _) = bootstrap(&mut sim);
    let shim = sim
        .bridge()
        .config()
        .closure_shim("__wbindgen_closure_wrapper107")
        .cloned()
        .unwrap();
    let closure = calls::closure_wrapper(&mut sim, &shim, 0x40, 0x80).unwrap();
    let id = calls::request_animation_frame(&mut sim, window, closure).unwrap();
    assert!(id > 0);
    assert_eq!(fire_animation_frames(&mut sim, 16.5).unwrap(), 1);
    assert_eq!(
        *calls_seen.borrow(),
        vec![vec![GuestVal::I32(0x40), GuestVal::I32(0x80), GuestVal::F64(16.5)]]
    );
    assert!(destroyed.borrow().is_empty());

    calls::object_drop_ref(&mut sim, closure).unwrap();
    assert_eq!(*destroyed.borrow(), vec![vec![GuestVal::I32(0x40), GuestVal::I32(0x80)]]);
}

#[test]
fn forgotten_closure_keeps_listening() {
    let mut sim = sim();
    let offsets = Rc::new(RefCell::new(Vec::new()));
    let seen = offsets.clone();
    sim.register(27, move |guest, args| {
        let GuestVal::I32(event) = args[2] else {
            panic!("expected event handle");
        };
        let x = calls::mouse_event_offset_x(guest, event as u32)?;
        let y = calls::mouse_event_offset_y(guest, event as u32)?;
        calls::object_drop_ref(guest, event as u32)?;
        seen.borrow_mut().push((x, y));
        Ok(None)
    });
    sim.register(28, |_, _| panic!("forgotten closure must not be destroyed"));

    let (_, document, _) = bootstrap(&mut sim);
    let canvas = create(&mut sim, document, "canvas");
    let shim = sim
        .bridge()
        .config()
        .closure_shim("__wbindgen_closure_wrapper105")
        .cloned()
        .unwrap();
    let closure = calls::closure_wrapper(&mut sim, &shim, 0x10, 0x20).unwrap();
    let (ptr, len) = string(&mut sim, "mousemove");
    calls::add_event_listener(&mut sim, canvas, ptr, len, closure).unwrap();
    calls::cb_forget(&mut sim, closure).unwrap();

    let target = EventTarget::Element(sim.bridge().element(canvas).unwrap());
    dispatch_event(&mut sim, &target, Event::mouse("mousemove", 10, 20)).unwrap();
    dispatch_event(&mut sim, &target, Event::mouse("mousemove", 11, 21)).unwrap();
    assert_eq!(*offsets.borrow(), vec![(10, 20), (11, 21)]);
}

#[test]
fn non_function_listener_is_a_caught_type_error() {
    let mut sim = sim();
    let (window, _, _) = bootstrap(&mut sim);
    let (ptr, len) = string(&mut sim, "resize");
    let not_a_function = calls::string_new(&mut sim, ptr, len).unwrap();
    calls::add_event_listener(&mut sim, window, ptr, len, not_a_function).unwrap();
    let stored = sim.take_exception().expect("exception stored");
    let HostValue::Error(error) = sim.bridge().value(stored.raw()).unwrap() else {
        panic!("expected an error object");
    };
    assert_eq!(error.name(), "TypeError");
}

#[test]
fn non_ascii_strings_cross_both_ways() {
    let mut sim = sim();
    let error = calls::error_new(&mut sim).unwrap();
    let (ptr, len) = string(&mut sim, "ünïcødé ✓");
    let text = calls::string_new(&mut sim, ptr, len).unwrap();
    assert_eq!(sim.bridge().string(text).unwrap().as_ref(), "ünïcødé ✓");
    let ret = sim.malloc(8).unwrap();
    calls::error_stack(&mut sim, ret, error).unwrap();
    assert!(sim.read_u32(ret + 4) > 0);
}
