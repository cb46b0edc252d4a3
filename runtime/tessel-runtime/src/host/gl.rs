//! A headless WebGL2 context.
//!
//! Nothing is rasterized. The context hands out object names, tracks the
//! state the module can query back (compile and link status, info logs,
//! attribute and uniform locations) and records every command so callers
//! can inspect what a frame would have drawn.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use crate::value::HostValue;

pub const VERTEX_SHADER: u32 = 0x8B31;
pub const FRAGMENT_SHADER: u32 = 0x8B30;
pub const COMPILE_STATUS: u32 = 0x8B81;
pub const LINK_STATUS: u32 = 0x8B82;
pub const DELETE_STATUS: u32 = 0x8B80;
pub const SHADER_TYPE: u32 = 0x8B4F;
pub const ATTACHED_SHADERS: u32 = 0x8B85;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GlObjectKind {
    Buffer,
    VertexArray,
    Program,
    Shader,
    UniformLocation,
}

impl GlObjectKind {
    pub fn type_name(self) -> &'static str {
        match self {
            GlObjectKind::Buffer => "WebGLBuffer",
            GlObjectKind::VertexArray => "WebGLVertexArrayObject",
            GlObjectKind::Program => "WebGLProgram",
            GlObjectKind::Shader => "WebGLShader",
            GlObjectKind::UniformLocation => "WebGLUniformLocation",
        }
    }
}

/// A name issued by one context. Names are never reused within a context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlObject {
    pub context: u32,
    pub kind: GlObjectKind,
    pub name: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GlCommand {
    BindVertexArray(Option<u32>),
    BindBuffer { target: u32, buffer: Option<u32> },
    BufferData { target: u32, data: Vec<f32>, usage: u32 },
    ShaderSource { shader: u32, source: String },
    CompileShader(u32),
    AttachShader { program: u32, shader: u32 },
    LinkProgram(u32),
    UseProgram(Option<u32>),
    DeleteProgram(Option<u32>),
    DeleteShader(Option<u32>),
    EnableVertexAttribArray(u32),
    VertexAttribPointer {
        index: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    },
    Uniform { location: Option<u32>, values: Vec<f32> },
    Viewport([i32; 4]),
    ClearColor([f32; 4]),
    Clear(u32),
    DrawArrays { mode: u32, first: i32, count: i32 },
}

#[derive(Debug, Default)]
struct Shader {
    kind: u32,
    source: String,
    compiled: bool,
    deleted: bool,
    log: String,
}

#[derive(Debug, Default)]
struct Program {
    shaders: Vec<u32>,
    linked: bool,
    deleted: bool,
    log: String,
    attributes: Vec<String>,
    uniforms: Vec<String>,
}

#[derive(Debug, Default)]
struct GlState {
    next_name: u32,
    kinds: HashMap<u32, GlObjectKind>,
    shaders: HashMap<u32, Shader>,
    programs: HashMap<u32, Program>,
    locations: HashMap<u32, (u32, String)>,
    buffer_bindings: HashMap<u32, u32>,
    buffers: HashMap<u32, Vec<f32>>,
    uniform_values: BTreeMap<(u32, String), Vec<f32>>,
    current_program: Option<u32>,
    commands: Vec<GlCommand>,
    draws: usize,
}

impl GlState {
    fn issue(&mut self, kind: GlObjectKind) -> u32 {
        self.next_name += 1;
        self.kinds.insert(self.next_name, kind);
        self.next_name
    }
}

#[derive(Debug)]
pub struct WebGl2Context {
    id: u32,
    state: RefCell<GlState>,
}

impl WebGl2Context {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            state: RefCell::new(GlState::default()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    fn object(&self, kind: GlObjectKind, name: u32) -> GlObject {
        GlObject {
            context: self.id,
            kind,
            name,
        }
    }

    fn record(&self, command: GlCommand) {
        self.state.borrow_mut().commands.push(command);
    }

    pub fn commands(&self) -> Vec<GlCommand> {
        self.state.borrow().commands.clone()
    }

    pub fn draw_count(&self) -> usize {
        self.state.borrow().draws
    }

    pub fn buffer_contents(&self, buffer: &GlObject) -> Option<Vec<f32>> {
        self.state.borrow().buffers.get(&buffer.name).cloned()
    }

    pub fn uniform_value(&self, program: &GlObject, name: &str) -> Option<Vec<f32>> {
        self.state
            .borrow()
            .uniform_values
            .get(&(program.name, name.to_string()))
            .cloned()
    }

    pub fn create_buffer(&self) -> GlObject {
        let name = self.state.borrow_mut().issue(GlObjectKind::Buffer);
        self.object(GlObjectKind::Buffer, name)
    }

    pub fn create_vertex_array(&self) -> GlObject {
        let name = self.state.borrow_mut().issue(GlObjectKind::VertexArray);
        self.object(GlObjectKind::VertexArray, name)
    }

    pub fn create_program(&self) -> GlObject {
        let mut state = self.state.borrow_mut();
        let name = state.issue(GlObjectKind::Program);
        state.programs.insert(name, Program::default());
        self.object(GlObjectKind::Program, name)
    }

    /// `None` for an unknown shader type, like the real API returning null.
    pub fn create_shader(&self, kind: u32) -> Option<GlObject> {
        if kind != VERTEX_SHADER && kind != FRAGMENT_SHADER {
            return None;
        }
        let mut state = self.state.borrow_mut();
        let name = state.issue(GlObjectKind::Shader);
        state.shaders.insert(
            name,
            Shader {
                kind,
                ..Shader::default()
            },
        );
        Some(self.object(GlObjectKind::Shader, name))
    }

    pub fn bind_vertex_array(&self, array: Option<&GlObject>) {
        self.record(GlCommand::BindVertexArray(array.map(|a| a.name)));
    }

    pub fn bind_buffer(&self, target: u32, buffer: Option<&GlObject>) {
        let mut state = self.state.borrow_mut();
        match buffer {
            Some(buffer) => state.buffer_bindings.insert(target, buffer.name),
            None => state.buffer_bindings.remove(&target),
        };
        state.commands.push(GlCommand::BindBuffer {
            target,
            buffer: buffer.map(|b| b.name),
        });
    }

    pub fn buffer_data(&self, target: u32, data: Vec<f32>, usage: u32) {
        let mut state = self.state.borrow_mut();
        if let Some(buffer) = state.buffer_bindings.get(&target).copied() {
            state.buffers.insert(buffer, data.clone());
        }
        state.commands.push(GlCommand::BufferData {
            target,
            data,
            usage,
        });
    }

    pub fn shader_source(&self, shader: &GlObject, source: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.shaders.get_mut(&shader.name) {
            entry.source = source.to_string();
        }
        state.commands.push(GlCommand::ShaderSource {
            shader: shader.name,
            source: source.to_string(),
        });
    }

    /// Compiles when the source opens with a `#version` directive.
    pub fn compile_shader(&self, shader: &GlObject) {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.shaders.get_mut(&shader.name) {
            entry.compiled = entry.source.trim_start().starts_with("#version");
            entry.log = if entry.compiled {
                String::new()
            } else {
                "ERROR: 0:1: '' : missing #version directive\n".to_string()
            };
        }
        state.commands.push(GlCommand::CompileShader(shader.name));
    }

    pub fn attach_shader(&self, program: &GlObject, shader: &GlObject) {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.programs.get_mut(&program.name) {
            if !entry.shaders.contains(&shader.name) {
                entry.shaders.push(shader.name);
            }
        }
        state.commands.push(GlCommand::AttachShader {
            program: program.name,
            shader: shader.name,
        });
    }

    /// Links when a compiled vertex and fragment shader are attached.
    /// Attribute and uniform names come from the attached sources.
    pub fn link_program(&self, program: &GlObject) {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        if let Some(entry) = state.programs.get_mut(&program.name) {
            let stage = |kind: u32| {
                entry
                    .shaders
                    .iter()
                    .filter_map(|name| state.shaders.get(name))
                    .find(|shader| shader.kind == kind && shader.compiled)
            };
            match (stage(VERTEX_SHADER), stage(FRAGMENT_SHADER)) {
                (Some(vertex), Some(fragment)) => {
                    let attributes = declarations(&vertex.source, &["in", "attribute"]);
                    let mut uniforms = declarations(&vertex.source, &["uniform"]);
                    for name in declarations(&fragment.source, &["uniform"]) {
                        if !uniforms.contains(&name) {
                            uniforms.push(name);
                        }
                    }
                    entry.attributes = attributes;
                    entry.uniforms = uniforms;
                    entry.linked = true;
                    entry.log.clear();
                }
                (vertex, _) => {
                    let missing = if vertex.is_none() { "vertex" } else { "fragment" };
                    entry.linked = false;
                    entry.log = format!("error: no compiled {missing} shader attached\n");
                }
            }
        }
        state.commands.push(GlCommand::LinkProgram(program.name));
    }

    pub fn use_program(&self, program: Option<&GlObject>) {
        let mut state = self.state.borrow_mut();
        state.current_program = program.map(|p| p.name);
        state.commands.push(GlCommand::UseProgram(program.map(|p| p.name)));
    }

    pub fn delete_program(&self, program: Option<&GlObject>) {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = program.and_then(|p| state.programs.get_mut(&p.name)) {
            entry.deleted = true;
        }
        state.commands.push(GlCommand::DeleteProgram(program.map(|p| p.name)));
    }

    pub fn delete_shader(&self, shader: Option<&GlObject>) {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = shader.and_then(|s| state.shaders.get_mut(&s.name)) {
            entry.deleted = true;
        }
        state.commands.push(GlCommand::DeleteShader(shader.map(|s| s.name)));
    }

    pub fn program_parameter(&self, program: &GlObject, pname: u32) -> HostValue {
        let state = self.state.borrow();
        let Some(entry) = state.programs.get(&program.name) else {
            return HostValue::Null;
        };
        match pname {
            LINK_STATUS => HostValue::Bool(entry.linked),
            DELETE_STATUS => HostValue::Bool(entry.deleted),
            ATTACHED_SHADERS => HostValue::Number(entry.shaders.len() as f64),
            _ => HostValue::Null,
        }
    }

    pub fn shader_parameter(&self, shader: &GlObject, pname: u32) -> HostValue {
        let state = self.state.borrow();
        let Some(entry) = state.shaders.get(&shader.name) else {
            return HostValue::Null;
        };
        match pname {
            COMPILE_STATUS => HostValue::Bool(entry.compiled),
            DELETE_STATUS => HostValue::Bool(entry.deleted),
            SHADER_TYPE => HostValue::Number(f64::from(entry.kind)),
            _ => HostValue::Null,
        }
    }

    pub fn program_info_log(&self, program: &GlObject) -> Option<String> {
        self.state
            .borrow()
            .programs
            .get(&program.name)
            .map(|p| p.log.clone())
    }

    pub fn shader_info_log(&self, shader: &GlObject) -> Option<String> {
        self.state
            .borrow()
            .shaders
            .get(&shader.name)
            .map(|s| s.log.clone())
    }

    /// Index of `name` among the vertex shader inputs, or -1.
    pub fn attrib_location(&self, program: &GlObject, name: &str) -> i32 {
        self.state
            .borrow()
            .programs
            .get(&program.name)
            .filter(|p| p.linked)
            .and_then(|p| p.attributes.iter().position(|a| a == name))
            .map_or(-1, |index| index as i32)
    }

    pub fn uniform_location(&self, program: &GlObject, name: &str) -> Option<GlObject> {
        let mut state = self.state.borrow_mut();
        let declared = state
            .programs
            .get(&program.name)
            .is_some_and(|p| p.linked && p.uniforms.iter().any(|u| u == name));
        if !declared {
            return None;
        }
        let location = state.issue(GlObjectKind::UniformLocation);
        state.locations.insert(location, (program.name, name.to_string()));
        Some(self.object(GlObjectKind::UniformLocation, location))
    }

    pub fn uniform(&self, location: Option<&GlObject>, values: Vec<f32>) {
        let mut state = self.state.borrow_mut();
        if let Some(key) = location.and_then(|l| state.locations.get(&l.name)).cloned() {
            state.uniform_values.insert(key, values.clone());
        }
        state.commands.push(GlCommand::Uniform {
            location: location.map(|l| l.name),
            values,
        });
    }

    pub fn enable_vertex_attrib_array(&self, index: u32) {
        self.record(GlCommand::EnableVertexAttribArray(index));
    }

    pub fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        self.record(GlCommand::VertexAttribPointer {
            index,
            size,
            ty,
            normalized,
            stride,
            offset,
        });
    }

    pub fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(GlCommand::Viewport([x, y, width, height]));
    }

    pub fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.record(GlCommand::ClearColor([r, g, b, a]));
    }

    pub fn clear(&self, mask: u32) {
        self.record(GlCommand::Clear(mask));
    }

    pub fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        let mut state = self.state.borrow_mut();
        state.draws += 1;
        state.commands.push(GlCommand::DrawArrays { mode, first, count });
    }
}

/// Names declared by statements starting with one of `qualifiers`, in
/// source order. Array suffixes are stripped.
fn declarations(source: &str, qualifiers: &[&str]) -> Vec<String> {
    source
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(|line| line.split(';'))
        .filter_map(|statement| {
            let mut words = statement.split_whitespace();
            let first = words.next()?;
            if first == "layout" || first.starts_with("layout(") {
                return declaration_after_layout(statement, qualifiers);
            }
            if !qualifiers.contains(&first) {
                return None;
            }
            words.last().map(strip_array)
        })
        .collect()
}

fn declaration_after_layout(statement: &str, qualifiers: &[&str]) -> Option<String> {
    let (_, rest) = statement.split_once(')')?;
    let mut words = rest.split_whitespace();
    let qualifier = words.next()?;
    qualifiers
        .contains(&qualifier)
        .then(|| words.last().map(strip_array))
        .flatten()
}

fn strip_array(name: &str) -> String {
    name.split('[').next().unwrap_or(name).to_string()
}
