use tessel_runtime::boundary::linker::{Resolution, describe_imports};
use tessel_runtime::transcode::{decode, encode};
use tessel_runtime::{
    ArgKind, BridgeConfig, BridgeError, ClosureShim, Entry, HostValue, WasmSession,
};
use wasmtime::{Engine, Module, Val};

const MODULE: &str = r#"
(module
  (import "wbg" "__wbindgen_string_new" (func $string_new (param i32 i32) (result i32)))
  (import "wbg" "__wbg_newnoargs_8d1797b163dbc9fb" (func $newnoargs (param i32 i32) (result i32)))
  (import "wbg" "__wbg_call_836fa928f74337e5" (func $call (param i32 i32) (result i32)))
  (import "wbg" "__widl_instanceof_Window" (func $is_window (param i32) (result i32)))
  (import "wbg" "__widl_f_document_Window" (func $document (param i32) (result i32)))
  (import "wbg" "__widl_f_create_element_Document" (func $create_element (param i32 i32 i32) (result i32)))
  (import "wbg" "__wbindgen_object_drop_ref" (func $drop_ref (param i32)))
  (import "wbg" "__widl_f_request_animation_frame_Window" (func $raf (param i32 i32) (result i32)))
  (import "wbg" "__wbindgen_closure_wrapper1" (func $wrap (param i32 i32 i32) (result i32)))
  (import "wbg" "__wbindgen_throw" (func $throw (param i32 i32)))

  (memory (export "memory") 1)
  (table (export "__wbg_function_table") 3 funcref)
  (elem (i32.const 1) func $invoke $destroy)

  (data (i32.const 16) "return this")
  (data (i32.const 32) "canvas")
  (data (i32.const 48) "bad tag!")
  (data (i32.const 64) "boom")

  (global $heap (mut i32) (i32.const 1024))
  (global $exn (export "exn") (mut i32) (i32.const 0))
  (global $window (export "window") (mut i32) (i32.const 0))
  (global $canvas (export "canvas") (mut i32) (i32.const 0))
  (global $bad (export "bad") (mut i32) (i32.const -1))
  (global $closure (mut i32) (i32.const 0))
  (global $frames (export "frames") (mut i32) (i32.const 0))
  (global $last_ts (export "last_ts") (mut f64) (f64.const 0))
  (global $destroyed (export "destroyed") (mut i32) (i32.const 0))

  (func $malloc (export "__wbindgen_malloc") (param $size i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $heap))
    (global.set $heap
      (i32.and
        (i32.add (i32.add (global.get $heap) (local.get $size)) (i32.const 7))
        (i32.const -8)))
    (local.get $ptr))

  (func (export "__wbindgen_realloc") (param $ptr i32) (param $old i32) (param $new i32) (result i32)
    (local $moved i32)
    (local.set $moved (call $malloc (local.get $new)))
    (memory.copy (local.get $moved) (local.get $ptr) (local.get $old))
    (local.get $moved))

  (func (export "__wbindgen_free") (param i32 i32))

  (func (export "__wbindgen_exn_store") (param $idx i32)
    (global.set $exn (local.get $idx)))

  (func $invoke (param $state i32) (param $vtable i32) (param $ts f64)
    (global.set $frames (i32.add (global.get $frames) (i32.const 1)))
    (global.set $last_ts (local.get $ts))
    (drop (call $raf (global.get $window) (global.get $closure))))

  (func $destroy (param $state i32) (param $vtable i32)
    (global.set $destroyed (i32.add (global.get $destroyed) (i32.const 1))))

  (func (export "run")
    (local $f i32)
    (local $doc i32)
    (local.set $f (call $newnoargs (i32.const 16) (i32.const 11)))
    (global.set $window (call $call (local.get $f) (i32.const 32)))
    (call $drop_ref (local.get $f))
    (if (i32.eqz (call $is_window (global.get $window)))
      (then unreachable))
    (local.set $doc (call $document (global.get $window)))
    (global.set $canvas (call $create_element (local.get $doc) (i32.const 32) (i32.const 6)))
    (global.set $bad (call $create_element (local.get $doc) (i32.const 48) (i32.const 8)))
    (global.set $closure (call $wrap (i32.const 8) (i32.const 16) (i32.const 0)))
    (drop (call $raf (global.get $window) (global.get $closure))))

  (func (export "stop")
    (call $drop_ref (global.get $closure)))

  (func (export "fail")
    (call $throw (i32.const 64) (i32.const 4)))

  (func (export "grow")
    (drop (memory.grow (i32.const 1))))
)
"#;

fn config() -> BridgeConfig {
    BridgeConfig {
        closures: vec![ClosureShim {
            import: "__wbindgen_closure_wrapper1".to_string(),
            invoke: 1,
            destroy: 2,
            arg: ArgKind::F64,
            once: false,
        }],
        ..BridgeConfig::default()
    }
}

fn session() -> WasmSession {
    let engine = Engine::default();
    let module = Module::new(&engine, MODULE).unwrap();
    WasmSession::instantiate(&engine, &module, config()).unwrap()
}

fn global(session: &mut WasmSession, name: &str) -> Val {
    let instance = session.instance();
    let global = instance.get_global(session.store_mut(), name).unwrap();
    global.get(session.store_mut())
}

fn global_i32(session: &mut WasmSession, name: &str) -> i32 {
    global(session, name).i32().unwrap()
}

#[test]
fn run_bootstraps_and_catches_host_errors() {
    let mut session = session();
    session.run().unwrap();

    let window = global_i32(&mut session, "window") as u32;
    assert!(matches!(session.bridge().value(window).unwrap(), HostValue::Window(_)));
    let canvas = global_i32(&mut session, "canvas") as u32;
    assert!(session.bridge().canvas(canvas).is_ok());

    assert_eq!(global_i32(&mut session, "bad"), 0);
    let exn = global_i32(&mut session, "exn") as u32;
    let HostValue::Error(error) = session.bridge().value(exn).unwrap() else {
        panic!("expected an error object");
    };
    assert_eq!(error.name(), "InvalidCharacterError");
    assert!(session.last_exception().is_some());
}

#[test]
fn animation_frames_reenter_module() {
    let mut session = session();
    session.run().unwrap();
    assert_eq!(session.bridge().window().pending_frames(), 1);

    assert_eq!(session.animation_frame(16.0).unwrap(), 1);
    assert_eq!(global_i32(&mut session, "frames"), 1);
    assert_eq!(global(&mut session, "last_ts").f64(), Some(16.0));
    assert_eq!(session.bridge().window().pending_frames(), 1);

    assert_eq!(session.animation_frame(32.0).unwrap(), 1);
    assert_eq!(global_i32(&mut session, "frames"), 2);
    assert_eq!(global_i32(&mut session, "destroyed"), 0);
}

#[test]
fn dropping_last_reference_destroys_closure() {
    let mut session = session();
    session.run().unwrap();
    session.call_export("stop").unwrap();
    assert_eq!(global_i32(&mut session, "destroyed"), 1);

    let err = session.animation_frame(48.0).unwrap_err();
    assert!(format!("{err:#}").contains("consumed"));
    assert_eq!(global_i32(&mut session, "frames"), 0);
}

#[test]
fn throw_traps_with_message() {
    let mut session = session();
    let err = session.call_export("fail").unwrap_err();
    assert!(format!("{err:?}").contains("boom"));
}

#[test]
fn strings_pass_through_module_allocator() {
    let mut session = session();
    let mut guest = session.guest();
    let ascii = encode(&mut guest, "plain").unwrap();
    assert_eq!(ascii.capacity, 5);
    let passed = encode(&mut guest, "héllo wörld").unwrap();
    assert_eq!(passed.len as usize, "héllo wörld".len());
    assert!(passed.capacity > passed.len);
    assert_eq!(decode(&mut guest, passed.ptr, passed.len).unwrap(), "héllo wörld");
}

#[test]
fn memory_growth_rebuilds_views() {
    let mut session = session();
    let passed = encode(&mut session.guest(), "before").unwrap();
    let rebuilds = session.bridge().views.rebuilds();
    session.call_export("grow").unwrap();
    let text = decode(&mut session.guest(), passed.ptr, passed.len).unwrap();
    assert_eq!(text, "before");
    assert_eq!(session.bridge().views.rebuilds(), rebuilds + 1);
}

#[test]
fn unknown_imports_are_rejected_before_instantiation() {
    let engine = Engine::default();
    let module = Module::new(
        &engine,
        r#"(module
             (import "wbg" "__wbindgen_string_new" (func (param i32 i32) (result i32)))
             (import "wbg" "__wbg_fetch_0123456789abcdef" (func (param i32) (result i32)))
             (memory (export "memory") 1))"#,
    )
    .unwrap();
    let reports = describe_imports(&module, &BridgeConfig::default());
    assert_eq!(reports[0].resolution, Resolution::Entry(Entry::StringNew));
    assert_eq!(reports[1].resolution, Resolution::Unknown);

    let err = WasmSession::instantiate(&engine, &module, BridgeConfig::default())
        .err()
        .expect("instantiation must fail");
    assert!(err.to_string().contains("__wbg_fetch_0123456789abcdef"));
}

#[test]
fn aliases_map_renamed_imports() {
    let engine = Engine::default();
    let module = Module::new(
        &engine,
        r#"(module
             (import "wbg" "__wbg_new_ffffffffffffffff" (func (result i32)))
             (memory (export "memory") 1))"#,
    )
    .unwrap();
    let mut config = BridgeConfig::default();
    config.aliases.insert(
        "__wbg_new_ffffffffffffffff".to_string(),
        Entry::ErrorNew.symbol().to_string(),
    );
    let reports = describe_imports(&module, &config);
    assert_eq!(reports[0].resolution, Resolution::Entry(Entry::ErrorNew));
}

#[test]
fn modules_without_allocator_exports_still_run() {
    let engine = Engine::default();
    let module = Module::new(
        &engine,
        r#"(module
             (import "wbg" "__wbindgen_object_drop_ref" (func $drop_ref (param i32)))
             (import "wbg" "__wbg_new_59cb74e423758ede" (func $error_new (result i32)))
             (memory (export "memory") 1)
             (func (export "run")
               (call $drop_ref (call $error_new))))"#,
    )
    .unwrap();
    let mut session =
        WasmSession::instantiate(&engine, &module, BridgeConfig::default()).unwrap();
    session.run().unwrap();
    assert_eq!(session.bridge().heap.live(), 0);

    let err = encode(&mut session.guest(), "needs an allocator").unwrap_err();
    assert!(matches!(err, BridgeError::MissingExport("__wbindgen_malloc")));
}
