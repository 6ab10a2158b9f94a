//! Vertex allocation for the type propagation graph.
//!
//! Every value a reference type can flow through gets a vertex: formal
//! parameters and local variables, fields, allocation sites, and the
//! actual parameters and return values of call sites. Vertex `0` is the
//! error vertex; values the analysis cannot track map there.

use crate::jvm::code::{Instruction, MethodBody};
use crate::types::{self, JvmType, MethodDescriptor, UNKNOWN_ARRAY_TYPE, UNKNOWN_TYPE};

use crate::analysis::data_flow::LocalVariables;

/// The vertex collecting untracked values. Its type set stays empty.
pub(super) const VERTEX_ERROR: u32 = 0;

/// Allocates vertices and records the declared type of each.
#[derive(Debug)]
pub(super) struct VertexPool {
    declared_types: Vec<String>,
}

impl VertexPool {
    pub(super) fn new() -> Self {
        Self {
            declared_types: vec![UNKNOWN_TYPE.to_owned()],
        }
    }

    /// Allocates a vertex whose declared type is `type_name`.
    pub(super) fn alloc(&mut self, type_name: impl Into<String>) -> u32 {
        let vertex = u32::try_from(self.declared_types.len()).unwrap_or(u32::MAX);
        self.declared_types.push(type_name.into());
        vertex
    }

    pub(super) fn declared(&self, vertex: u32) -> &str {
        &self.declared_types[vertex as usize]
    }

    pub(super) fn vertex_count(&self) -> u32 {
        u32::try_from(self.declared_types.len()).unwrap_or(u32::MAX)
    }

    pub(super) fn into_declared_types(self) -> Vec<String> {
        self.declared_types
    }
}

/// The vertices of one analyzed method: formal parameters, local
/// variable entries, and the return value.
#[derive(Debug)]
pub(super) struct MethodVertices {
    param_vertices: Vec<u32>,
    entry_vertices: Vec<u32>,
    return_vertex: u32,
}

impl MethodVertices {
    /// Allocates vertices for a method.
    ///
    /// `params` includes the receiver of instance methods. Local variable
    /// entries that hold a parameter share the parameter's vertex;
    /// entries without a recovered descriptor fall back to
    /// `java/lang/Object` (or its array form).
    pub(super) fn new(
        pool: &mut VertexPool,
        params: &[JvmType],
        return_type: Option<&JvmType>,
        locals: &LocalVariables,
    ) -> Self {
        let mut param_vertices = Vec::with_capacity(params.len());
        let mut param_slots = Vec::with_capacity(params.len());
        let mut slot: u16 = 0;
        for param in params {
            let vertex = if param.is_reference {
                pool.alloc(param.name.clone())
            } else {
                VERTEX_ERROR
            };
            param_vertices.push(vertex);
            param_slots.push(slot);
            slot += u16::from(param.width);
        }

        let entry_vertices = (0..locals.entry_count())
            .map(|entry| {
                if !locals.is_object_variable(entry) {
                    return VERTEX_ERROR;
                }
                if locals.is_parameter(entry) {
                    let slot = locals.slot(entry);
                    return param_slots
                        .iter()
                        .position(|&s| s == slot)
                        .map_or(VERTEX_ERROR, |position| param_vertices[position]);
                }
                let type_name = locals.type_name(entry).unwrap_or_else(|| {
                    if locals.is_array_variable(entry) {
                        UNKNOWN_ARRAY_TYPE.to_owned()
                    } else {
                        UNKNOWN_TYPE.to_owned()
                    }
                });
                pool.alloc(type_name)
            })
            .collect();

        let return_vertex = match return_type {
            Some(t) if t.is_reference => pool.alloc(t.name.clone()),
            _ => VERTEX_ERROR,
        };

        Self {
            param_vertices,
            entry_vertices,
            return_vertex,
        }
    }

    /// The vertex of the parameter at `position` (receiver first).
    pub(super) fn param_vertex(&self, position: usize) -> u32 {
        self.param_vertices.get(position).copied().unwrap_or(VERTEX_ERROR)
    }

    pub(super) fn param_count(&self) -> usize {
        self.param_vertices.len()
    }

    /// The vertex of the local variable accessed by `instruction`.
    pub(super) fn local_vertex(&self, locals: &LocalVariables, instruction: u32) -> u32 {
        locals
            .find_entry_for_instruction(instruction)
            .map_or(VERTEX_ERROR, |entry| self.entry_vertices[entry])
    }

    /// The vertex of the return value, or [`VERTEX_ERROR`] for `void` and
    /// primitive returns.
    pub(super) fn return_vertex(&self) -> u32 {
        self.return_vertex
    }
}

/// Vertices for the allocation sites of one method body.
#[derive(Debug)]
pub(super) struct NewVertices {
    // (instruction index, vertex), sorted by instruction index.
    vertices: Vec<(u32, u32)>,
}

impl NewVertices {
    pub(super) fn new(pool: &mut VertexPool, body: &MethodBody) -> Self {
        let mut vertices = Vec::new();
        for (index, instruction) in body.instructions.iter().enumerate() {
            let type_name = match instruction {
                Instruction::New { class_name } => class_name.clone(),
                Instruction::NewArray { element, .. } => {
                    format!("{element}{}", types::ARRAY_SUFFIX)
                }
                _ => continue,
            };
            #[expect(clippy::cast_possible_truncation)]
            vertices.push((index as u32, pool.alloc(type_name)));
        }
        Self { vertices }
    }

    /// The vertex of the allocation at `instruction`, if there is one.
    pub(super) fn vertex_at(&self, instruction: u32) -> Option<u32> {
        self.vertices
            .binary_search_by_key(&instruction, |&(index, _)| index)
            .ok()
            .map(|position| self.vertices[position].1)
    }

    pub(super) fn vertices(&self) -> impl Iterator<Item = u32> + '_ {
        self.vertices.iter().map(|&(_, vertex)| vertex)
    }
}

/// Vertices for the actual parameters and return value of one call site.
///
/// Parameter positions count the receiver of instance calls as position
/// `0`; the position one past the last parameter denotes the return
/// value.
#[derive(Debug)]
pub(super) struct CallSiteVertices {
    // (parameter position, vertex), in position order.
    vertices: Vec<(u8, u32)>,
    param_count: u8,
    has_return: bool,
}

impl CallSiteVertices {
    pub(super) fn new(
        pool: &mut VertexPool,
        class_name: &str,
        descriptor: &MethodDescriptor,
        is_static: bool,
    ) -> Self {
        let this_count = u8::from(!is_static);
        #[expect(clippy::cast_possible_truncation)]
        let param_count = descriptor.parameters.len() as u8 + this_count;

        let mut vertices = Vec::new();
        if !is_static {
            vertices.push((0, pool.alloc(class_name)));
        }
        for (position, param) in descriptor.parameters.iter().enumerate() {
            if param.is_reference {
                #[expect(clippy::cast_possible_truncation)]
                vertices.push((position as u8 + this_count, pool.alloc(param.name.clone())));
            }
        }
        let has_return = match &descriptor.return_type {
            Some(t) if t.is_reference => {
                vertices.push((param_count, pool.alloc(t.name.clone())));
                true
            }
            _ => false,
        };

        Self {
            vertices,
            param_count,
            has_return,
        }
    }

    pub(super) fn param_count(&self) -> u8 {
        self.param_count
    }

    /// The vertex of the actual parameter at `position`, or
    /// [`VERTEX_ERROR`] for primitive parameters.
    pub(super) fn param_vertex(&self, position: u8) -> u32 {
        self.vertices
            .iter()
            .find(|&&(p, _)| p == position)
            .map_or(VERTEX_ERROR, |&(_, vertex)| vertex)
    }

    /// The vertex of the receiver, or [`VERTEX_ERROR`] for static calls.
    pub(super) fn receiver_vertex(&self) -> u32 {
        self.param_vertex(0)
    }

    /// The vertex of the returned value, if the callee returns a
    /// reference.
    pub(super) fn return_vertex(&self) -> Option<u32> {
        self.has_return.then(|| self.param_vertex(self.param_count))
    }
}
