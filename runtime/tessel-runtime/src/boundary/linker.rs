//! Binding the boundary call table into a wasmtime [`Linker`].

use std::collections::HashSet;

use anyhow::Result;
use tracing::trace;
use wasmtime::{Caller, Linker, Module};

use crate::boundary::{Entry, NAMESPACE, calls};
use crate::config::{BridgeConfig, ClosureShim};
use crate::error::BridgeError;
use crate::wasm::{HostState, WasmGuest};

/// How one module import will be satisfied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Entry(Entry),
    Closure(ClosureShim),
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportReport {
    pub module: String,
    pub name: String,
    pub resolution: Resolution,
}

pub fn describe_imports(module: &Module, config: &BridgeConfig) -> Vec<ImportReport> {
    module
        .imports()
        .map(|import| {
            let resolution = if import.module() != NAMESPACE {
                Resolution::Unknown
            } else if let Some(shim) = config.closure_shim(import.name()) {
                Resolution::Closure(shim.clone())
            } else {
                Entry::resolve(import.name(), &config.aliases)
                    .map_or(Resolution::Unknown, Resolution::Entry)
            };
            ImportReport {
                module: import.module().to_string(),
                name: import.name().to_string(),
                resolution,
            }
        })
        .collect()
}

/// Defines every import `module` declares, failing on the first one the
/// catalog cannot satisfy. Returns the number of definitions made.
pub fn define_imports(
    linker: &mut Linker<HostState>,
    module: &Module,
    config: &BridgeConfig,
) -> Result<usize> {
    let reports = describe_imports(module, config);
    if let Some(unknown) = reports
        .iter()
        .find(|report| report.resolution == Resolution::Unknown)
    {
        let name = format!("{}::{}", unknown.module, unknown.name);
        return Err(BridgeError::UnknownImport(name).into());
    }
    let mut defined = HashSet::new();
    for report in reports {
        if !defined.insert(report.name.clone()) {
            continue;
        }
        trace!(name = %report.name, "defining import");
        match report.resolution {
            Resolution::Entry(entry) => define_entry(linker, &report.name, entry)?,
            Resolution::Closure(shim) => define_closure_shim(linker, shim)?,
            Resolution::Unknown => unreachable!("unknown imports rejected above"),
        }
    }
    Ok(defined.len())
}

fn define_closure_shim(linker: &mut Linker<HostState>, shim: ClosureShim) -> Result<()> {
    let name = shim.import.clone();
    linker.func_wrap(
        NAMESPACE,
        &name,
        move |mut caller: Caller<'_, HostState>,
              state: u32,
              vtable: u32,
              _unused: u32|
              -> wasmtime::Result<u32> {
            let mut guest = WasmGuest::new(&mut caller);
            Ok(calls::closure_wrapper(&mut guest, &shim, state, vtable)?)
        },
    )?;
    Ok(())
}

macro_rules! wrap {
    ($linker:expr, $name:expr, $call:path, ($($arg:ident: $ty:ty),*) -> $ret:ty) => {
        $linker.func_wrap(
            NAMESPACE,
            $name,
            |mut caller: Caller<'_, HostState>, $($arg: $ty),*| -> wasmtime::Result<$ret> {
                let mut guest = WasmGuest::new(&mut caller);
                Ok($call(&mut guest, $($arg),*)?)
            },
        )?
    };
}

fn define_entry(linker: &mut Linker<HostState>, name: &str, entry: Entry) -> Result<()> {
    match entry {
        Entry::ObjectDropRef => wrap!(linker, name, calls::object_drop_ref, (idx: u32) -> ()),
        Entry::ObjectCloneRef => wrap!(linker, name, calls::object_clone_ref, (idx: u32) -> u32),
        Entry::StringNew => wrap!(linker, name, calls::string_new, (ptr: u32, len: u32) -> u32),
        Entry::CbForget => wrap!(linker, name, calls::cb_forget, (idx: u32) -> ()),
        Entry::BooleanGet => wrap!(linker, name, calls::boolean_get, (idx: u32) -> u32),
        Entry::Throw => wrap!(linker, name, calls::throw, (ptr: u32, len: u32) -> ()),
        Entry::Memory => wrap!(linker, name, calls::memory, () -> u32),
        Entry::ErrorNew => wrap!(linker, name, calls::error_new, () -> u32),
        Entry::ErrorStack => wrap!(linker, name, calls::error_stack, (ret: u32, idx: u32) -> ()),
        Entry::ConsoleError => wrap!(
            linker, name, calls::console_error,
            (ptr: u32, len: u32) -> ()
        ),
        Entry::InstanceofWindow => wrap!(linker, name, calls::instanceof_window, (idx: u32) -> u32),
        Entry::InstanceofHtmlCanvasElement => {
            wrap!(linker, name, calls::instanceof_html_canvas_element, (idx: u32) -> u32)
        }
        Entry::InstanceofHtmlElement => {
            wrap!(linker, name, calls::instanceof_html_element, (idx: u32) -> u32)
        }
        Entry::InstanceofMouseEvent => {
            wrap!(linker, name, calls::instanceof_mouse_event, (idx: u32) -> u32)
        }
        Entry::InstanceofWebGl2 => wrap!(linker, name, calls::instanceof_webgl2, (idx: u32) -> u32),
        Entry::InstanceofMemory => wrap!(linker, name, calls::instanceof_memory, (idx: u32) -> u32),
        Entry::StyleSetProperty => wrap!(
            linker, name, calls::style_set_property,
            (style: u32, name_ptr: u32, name_len: u32, value_ptr: u32, value_len: u32) -> ()
        ),
        Entry::DocumentCreateElement => wrap!(
            linker, name, calls::document_create_element,
            (document: u32, ptr: u32, len: u32) -> u32
        ),
        Entry::DocumentBody => wrap!(linker, name, calls::document_body, (document: u32) -> u32),
        Entry::ElementSetAttribute => wrap!(
            linker, name, calls::element_set_attribute,
            (element: u32, name_ptr: u32, name_len: u32, value_ptr: u32, value_len: u32) -> ()
        ),
        Entry::ElementClientWidth => {
            wrap!(linker, name, calls::element_client_width, (element: u32) -> i32)
        }
        Entry::ElementClientHeight => {
            wrap!(linker, name, calls::element_client_height, (element: u32) -> i32)
        }
        Entry::CanvasGetContext => wrap!(
            linker, name, calls::canvas_get_context,
            (canvas: u32, ptr: u32, len: u32) -> u32
        ),
        Entry::HtmlElementSetInnerText => wrap!(
            linker, name, calls::html_element_set_inner_text,
            (element: u32, ptr: u32, len: u32) -> ()
        ),
        Entry::HtmlElementStyle => wrap!(
            linker, name, calls::html_element_style,
            (element: u32) -> u32
        ),
        Entry::NodeAppendChild => {
            wrap!(linker, name, calls::node_append_child, (parent: u32, child: u32) -> u32)
        }
        Entry::WindowDocument => wrap!(linker, name, calls::window_document, (window: u32) -> u32),
        Entry::AddEventListener => wrap!(
            linker, name, calls::add_event_listener,
            (target: u32, ptr: u32, len: u32, callback: u32) -> ()
        ),
        Entry::MouseEventOffsetX => {
            wrap!(linker, name, calls::mouse_event_offset_x, (event: u32) -> i32)
        }
        Entry::MouseEventOffsetY => {
            wrap!(linker, name, calls::mouse_event_offset_y, (event: u32) -> i32)
        }
        Entry::RequestAnimationFrame => wrap!(
            linker, name, calls::request_animation_frame,
            (window: u32, callback: u32) -> i32
        ),
        Entry::FunctionCall => wrap!(
            linker, name, calls::function_call,
            (function: u32, this: u32) -> u32
        ),
        Entry::FunctionNewNoArgs => {
            wrap!(linker, name, calls::function_new_no_args, (ptr: u32, len: u32) -> u32)
        }
        Entry::MemoryBuffer => wrap!(linker, name, calls::memory_buffer, (memory: u32) -> u32),
        Entry::Float32ArrayNew => wrap!(
            linker, name, calls::float32_array_new,
            (buffer: u32) -> u32
        ),
        Entry::Float32ArraySubarray => wrap!(
            linker, name, calls::float32_array_subarray,
            (array: u32, begin: u32, end: u32) -> u32
        ),
        Entry::GlBindVertexArray => {
            wrap!(linker, name, calls::gl_bind_vertex_array, (ctx: u32, array: u32) -> ())
        }
        Entry::GlBufferData => wrap!(
            linker, name, calls::gl_buffer_data,
            (ctx: u32, target: u32, data: u32, usage: u32) -> ()
        ),
        Entry::GlCreateVertexArray => {
            wrap!(linker, name, calls::gl_create_vertex_array, (ctx: u32) -> u32)
        }
        Entry::GlUniform1fv => wrap!(
            linker, name, calls::gl_uniform1fv,
            (ctx: u32, location: u32, ptr: u32, len: u32) -> ()
        ),
        Entry::GlUniform2fv => wrap!(
            linker, name, calls::gl_uniform2fv,
            (ctx: u32, location: u32, ptr: u32, len: u32) -> ()
        ),
        Entry::GlAttachShader => wrap!(
            linker, name, calls::gl_attach_shader,
            (ctx: u32, program: u32, shader: u32) -> ()
        ),
        Entry::GlBindBuffer => wrap!(
            linker, name, calls::gl_bind_buffer,
            (ctx: u32, target: u32, buffer: u32) -> ()
        ),
        Entry::GlClear => wrap!(linker, name, calls::gl_clear, (ctx: u32, mask: u32) -> ()),
        Entry::GlClearColor => wrap!(
            linker, name, calls::gl_clear_color,
            (ctx: u32, r: f32, g: f32, b: f32, a: f32) -> ()
        ),
        Entry::GlCompileShader => {
            wrap!(linker, name, calls::gl_compile_shader, (ctx: u32, shader: u32) -> ())
        }
        Entry::GlCreateBuffer => wrap!(linker, name, calls::gl_create_buffer, (ctx: u32) -> u32),
        Entry::GlCreateProgram => wrap!(linker, name, calls::gl_create_program, (ctx: u32) -> u32),
        Entry::GlCreateShader => {
            wrap!(linker, name, calls::gl_create_shader, (ctx: u32, kind: u32) -> u32)
        }
        Entry::GlDeleteProgram => {
            wrap!(linker, name, calls::gl_delete_program, (ctx: u32, program: u32) -> ())
        }
        Entry::GlDeleteShader => {
            wrap!(linker, name, calls::gl_delete_shader, (ctx: u32, shader: u32) -> ())
        }
        Entry::GlDrawArrays => wrap!(
            linker, name, calls::gl_draw_arrays,
            (ctx: u32, mode: u32, first: i32, count: i32) -> ()
        ),
        Entry::GlEnableVertexAttribArray => wrap!(
            linker, name, calls::gl_enable_vertex_attrib_array,
            (ctx: u32, index: u32) -> ()
        ),
        Entry::GlGetAttribLocation => wrap!(
            linker, name, calls::gl_get_attrib_location,
            (ctx: u32, program: u32, ptr: u32, len: u32) -> i32
        ),
        Entry::GlGetProgramInfoLog => wrap!(
            linker, name, calls::gl_get_program_info_log,
            (ret: u32, ctx: u32, program: u32) -> ()
        ),
        Entry::GlGetProgramParameter => wrap!(
            linker, name, calls::gl_get_program_parameter,
            (ctx: u32, program: u32, pname: u32) -> u32
        ),
        Entry::GlGetShaderInfoLog => wrap!(
            linker, name, calls::gl_get_shader_info_log,
            (ret: u32, ctx: u32, shader: u32) -> ()
        ),
        Entry::GlGetShaderParameter => wrap!(
            linker, name, calls::gl_get_shader_parameter,
            (ctx: u32, shader: u32, pname: u32) -> u32
        ),
        Entry::GlGetUniformLocation => wrap!(
            linker, name, calls::gl_get_uniform_location,
            (ctx: u32, program: u32, ptr: u32, len: u32) -> u32
        ),
        Entry::GlLinkProgram => {
            wrap!(linker, name, calls::gl_link_program, (ctx: u32, program: u32) -> ())
        }
        Entry::GlShaderSource => wrap!(
            linker, name, calls::gl_shader_source,
            (ctx: u32, shader: u32, ptr: u32, len: u32) -> ()
        ),
        Entry::GlUniform1f => wrap!(
            linker, name, calls::gl_uniform1f,
            (ctx: u32, location: u32, value: f32) -> ()
        ),
        Entry::GlUseProgram => {
            wrap!(linker, name, calls::gl_use_program, (ctx: u32, program: u32) -> ())
        }
        Entry::GlVertexAttribPointer => wrap!(
            linker, name, calls::gl_vertex_attrib_pointer,
            (
                ctx: u32,
                index: u32,
                size: i32,
                ty: u32,
                normalized: u32,
                stride: i32,
                offset: i32
            ) -> ()
        ),
        Entry::GlViewport => wrap!(
            linker, name, calls::gl_viewport,
            (ctx: u32, x: i32, y: i32, width: i32, height: i32) -> ()
        ),
    };
    Ok(())
}
