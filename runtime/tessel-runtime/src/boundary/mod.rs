//! The boundary call table: every host function a module may import, keyed
//! by the symbol the code generator emits.

pub mod calls;
pub mod linker;

use std::collections::BTreeMap;

use crate::error::BridgeError;

/// Import namespace the code generator places boundary calls in.
pub const NAMESPACE: &str = "wbg";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Lifecycle,
    Diagnostics,
    TypeCheck,
    Dom,
    Events,
    Functions,
    TypedArrays,
    Graphics,
}

macro_rules! catalog {
    ($($entry:ident => $symbol:literal, $category:ident, $site:literal;)*) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum Entry {
            $($entry,)*
        }

        impl Entry {
            pub const ALL: &'static [Entry] = &[$(Entry::$entry,)*];

            pub fn symbol(self) -> &'static str {
                match self {
                    $(Entry::$entry => $symbol,)*
                }
            }

            pub fn category(self) -> Category {
                match self {
                    $(Entry::$entry => Category::$category,)*
                }
            }

            /// Host API the entry stands for, as reported in error stacks.
            pub fn site(self) -> &'static str {
                match self {
                    $(Entry::$entry => $site,)*
                }
            }
        }
    };
}

catalog! {
    ObjectDropRef => "__wbindgen_object_drop_ref", Lifecycle, "dropObject";
    ObjectCloneRef => "__wbindgen_object_clone_ref", Lifecycle, "cloneObject";
    StringNew => "__wbindgen_string_new", Lifecycle, "String";
    CbForget => "__wbindgen_cb_forget", Lifecycle, "forgetClosure";
    BooleanGet => "__wbindgen_boolean_get", Lifecycle, "Boolean";
    Throw => "__wbindgen_throw", Lifecycle, "throw";
    Memory => "__wbindgen_memory", Lifecycle, "WebAssembly.Memory";
    ErrorNew => "__wbg_new_59cb74e423758ede", Diagnostics, "Error";
    ErrorStack => "__wbg_stack_558ba5917b466edd", Diagnostics, "Error.stack";
    ConsoleError => "__wbg_error_4bb6c2a97407129a", Diagnostics, "console.error";
    InstanceofWindow => "__widl_instanceof_Window", TypeCheck, "instanceof Window";
    InstanceofHtmlCanvasElement => "__widl_instanceof_HTMLCanvasElement", TypeCheck, "instanceof HTMLCanvasElement";
    InstanceofHtmlElement => "__widl_instanceof_HTMLElement", TypeCheck, "instanceof HTMLElement";
    InstanceofMouseEvent => "__widl_instanceof_MouseEvent", TypeCheck, "instanceof MouseEvent";
    InstanceofWebGl2 => "__widl_instanceof_WebGL2RenderingContext", TypeCheck, "instanceof WebGL2RenderingContext";
    InstanceofMemory => "__wbg_instanceof_Memory_7cf0cf614421960b", TypeCheck, "instanceof WebAssembly.Memory";
    StyleSetProperty => "__widl_f_set_property_CSSStyleDeclaration", Dom, "CSSStyleDeclaration.setProperty";
    DocumentCreateElement => "__widl_f_create_element_Document", Dom, "Document.createElement";
    DocumentBody => "__widl_f_body_Document", Dom, "Document.body";
    ElementSetAttribute => "__widl_f_set_attribute_Element", Dom, "Element.setAttribute";
    ElementClientWidth => "__widl_f_client_width_Element", Dom, "Element.clientWidth";
    ElementClientHeight => "__widl_f_client_height_Element", Dom, "Element.clientHeight";
    CanvasGetContext => "__widl_f_get_context_HTMLCanvasElement", Dom, "HTMLCanvasElement.getContext";
    HtmlElementSetInnerText => "__widl_f_set_inner_text_HTMLElement", Dom, "HTMLElement.innerText";
    HtmlElementStyle => "__widl_f_style_HTMLElement", Dom, "HTMLElement.style";
    NodeAppendChild => "__widl_f_append_child_Node", Dom, "Node.appendChild";
    WindowDocument => "__widl_f_document_Window", Dom, "Window.document";
    AddEventListener => "__widl_f_add_event_listener_with_callback_EventTarget", Events, "EventTarget.addEventListener";
    MouseEventOffsetX => "__widl_f_offset_x_MouseEvent", Events, "MouseEvent.offsetX";
    MouseEventOffsetY => "__widl_f_offset_y_MouseEvent", Events, "MouseEvent.offsetY";
    RequestAnimationFrame => "__widl_f_request_animation_frame_Window", Events, "Window.requestAnimationFrame";
    FunctionCall => "__wbg_call_836fa928f74337e5", Functions, "Function.call";
    FunctionNewNoArgs => "__wbg_newnoargs_8d1797b163dbc9fb", Functions, "Function";
    MemoryBuffer => "__wbg_buffer_e04d67bf3bf41917", TypedArrays, "WebAssembly.Memory.buffer";
    Float32ArrayNew => "__wbg_new_28b28665890d8497", TypedArrays, "Float32Array";
    Float32ArraySubarray => "__wbg_subarray_604f76ccca176864", TypedArrays, "Float32Array.subarray";
    GlBindVertexArray => "__widl_f_bind_vertex_array_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.bindVertexArray";
    GlBufferData => "__widl_f_buffer_data_with_array_buffer_view_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.bufferData";
    GlCreateVertexArray => "__widl_f_create_vertex_array_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.createVertexArray";
    GlUniform1fv => "__widl_f_uniform1fv_with_f32_array_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.uniform1fv";
    GlUniform2fv => "__widl_f_uniform2fv_with_f32_array_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.uniform2fv";
    GlAttachShader => "__widl_f_attach_shader_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.attachShader";
    GlBindBuffer => "__widl_f_bind_buffer_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.bindBuffer";
    GlClear => "__widl_f_clear_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.clear";
    GlClearColor => "__widl_f_clear_color_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.clearColor";
    GlCompileShader => "__widl_f_compile_shader_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.compileShader";
    GlCreateBuffer => "__widl_f_create_buffer_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.createBuffer";
    GlCreateProgram => "__widl_f_create_program_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.createProgram";
    GlCreateShader => "__widl_f_create_shader_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.createShader";
    GlDeleteProgram => "__widl_f_delete_program_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.deleteProgram";
    GlDeleteShader => "__widl_f_delete_shader_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.deleteShader";
    GlDrawArrays => "__widl_f_draw_arrays_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.drawArrays";
    GlEnableVertexAttribArray => "__widl_f_enable_vertex_attrib_array_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.enableVertexAttribArray";
    GlGetAttribLocation => "__widl_f_get_attrib_location_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.getAttribLocation";
    GlGetProgramInfoLog => "__widl_f_get_program_info_log_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.getProgramInfoLog";
    GlGetProgramParameter => "__widl_f_get_program_parameter_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.getProgramParameter";
    GlGetShaderInfoLog => "__widl_f_get_shader_info_log_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.getShaderInfoLog";
    GlGetShaderParameter => "__widl_f_get_shader_parameter_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.getShaderParameter";
    GlGetUniformLocation => "__widl_f_get_uniform_location_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.getUniformLocation";
    GlLinkProgram => "__widl_f_link_program_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.linkProgram";
    GlShaderSource => "__widl_f_shader_source_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.shaderSource";
    GlUniform1f => "__widl_f_uniform1f_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.uniform1f";
    GlUseProgram => "__widl_f_use_program_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.useProgram";
    GlVertexAttribPointer => "__widl_f_vertex_attrib_pointer_with_i32_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.vertexAttribPointer";
    GlViewport => "__widl_f_viewport_WebGL2RenderingContext", Graphics, "WebGL2RenderingContext.viewport";
}

impl Entry {
    pub fn lookup(symbol: &str) -> Option<Entry> {
        Entry::ALL.iter().copied().find(|entry| entry.symbol() == symbol)
    }

    /// Resolves an import name through the alias map first, then by symbol.
    pub fn resolve(name: &str, aliases: &BTreeMap<String, String>) -> Result<Entry, BridgeError> {
        let symbol = aliases.get(name).map_or(name, String::as_str);
        Entry::lookup(symbol).ok_or_else(|| BridgeError::UnknownImport(name.to_string()))
    }
}
