//! Variable Type Analysis call resolution.
//!
//! [`VtaResolver`] narrows the targets of dynamically dispatched call
//! sites. It builds a directed graph over every value a reference can
//! flow through (parameters, locals, fields, allocation sites, call
//! site operands), seeds allocation sites with the types they create,
//! and propagates the seeds along the graph's condensation in
//! topological order. A call site then only resolves against the types
//! that can actually reach its receiver, instead of every subtype of
//! the declared receiver type as Class Hierarchy Analysis assumes.
//!
//! Values the analysis cannot see allocations for are covered by
//! approximated types: the declared return type of calls without an
//! analyzed callee, the declared types of exception handler variables,
//! and optionally the declared parameter types of externally callable
//! methods. Approximated types resolve like declared types do under
//! Class Hierarchy Analysis, so the result never drops a target the
//! hierarchy admits for them.

mod type_set;
mod vertices;

use std::collections::{BTreeSet, HashMap, HashSet};

use itertools::Itertools;

use crate::analysis::AnalysisTarget;
use crate::analysis::data_flow::{DataDependence, Def};
use crate::analysis::hierarchy::ClassHierarchy;
use crate::graph::{topological, Condensation, DirectedGraph, DirectedGraphOps, TopologicalVisitor};
use crate::jvm::code::{Instruction, ValueKind};
use crate::jvm::references::{CallSite, ClassId, FieldAccess, FieldId, FieldRef, MethodId};
use crate::types::{MethodDescriptor, UNKNOWN_TYPE, is_array_type_name, strip_array_suffix};

pub use type_set::{SetId, SymbolId, TypeSet, TypeSetInterner};
use vertices::{CallSiteVertices, MethodVertices, NewVertices, VERTEX_ERROR, VertexPool};

/// A call resolver backed by type propagation.
///
/// Construction runs the whole analysis: allocating vertices, building
/// the assignment graph, and propagating type sets. The resolver then
/// answers queries without further computation.
///
/// Only dynamically dispatched call sites are resolved here; wrap the
/// resolver in [`crate::analysis::CallResolver`] to also cover static
/// and special sites.
#[derive(Debug)]
pub struct VtaResolver<'a> {
    hierarchy: &'a ClassHierarchy,
    target: &'a dyn AnalysisTarget,
    declared_types: Vec<String>,
    method_vertices: HashMap<MethodId, MethodVertices>,
    field_vertices: HashMap<FieldId, u32>,
    callsite_map: HashMap<MethodId, HashMap<u32, CallSiteVertices>>,
    reaching: Vec<TypeSet>,
    interner: TypeSetInterner,
}

impl<'a> VtaResolver<'a> {
    /// Runs the analysis over every target method registered in
    /// `hierarchy`.
    ///
    /// Methods whose body cannot be analyzed (absent code, malformed
    /// descriptors, broken stack discipline) are treated like library
    /// methods: calls into them approximate the return by its declared
    /// type.
    #[must_use]
    pub fn new(hierarchy: &'a ClassHierarchy, target: &'a dyn AnalysisTarget) -> Self {
        let mut builder = Builder::new(hierarchy, target);
        builder.allocate_method_vertices();
        builder.allocate_field_vertices();
        builder.connect_methods();
        builder.finish()
    }

    /// Resolves a dynamically dispatched call site to the methods the
    /// receiver's reaching types select. Returns an empty list for
    /// static and special sites and for call sites outside the analyzed
    /// methods.
    ///
    /// The result is sorted by class name, method name, and descriptor,
    /// without duplicates.
    #[must_use]
    pub fn resolve_call(&self, call_site: &CallSite) -> Vec<MethodId> {
        if call_site.is_static_or_special() {
            return Vec::new();
        }
        let Some(vertices) = self.call_site_vertices(call_site) else {
            return Vec::new();
        };
        let receiver = vertices.receiver_vertex();
        if receiver == VERTEX_ERROR {
            return Vec::new();
        }
        let declared = self.declared_types[receiver as usize].clone();
        let declared_subtypes = self.hierarchy.all_subtypes([declared]);
        let reaching = self.reaching[receiver as usize];

        let mut result = Vec::new();
        for name in reaching.concrete(&self.interner) {
            if declared_subtypes.contains(name) {
                self.push_resolved(name, call_site, &mut result);
            }
        }
        let approximated: BTreeSet<String> = self
            .hierarchy
            .all_subtypes(reaching.approximated(&self.interner).map(str::to_owned));
        for name in &approximated {
            if declared_subtypes.contains(name) {
                self.push_resolved(name, call_site, &mut result);
            }
        }

        result
            .into_iter()
            .sorted_by_key(|&id| {
                let class = &self.hierarchy.class_by_id(id.class).binary_name;
                let method = self.hierarchy.method_by_id(id);
                (class, &method.name, &method.descriptor, id)
            })
            .dedup()
            .collect()
    }

    /// The types reaching the receiver of a call site. `None` for static
    /// calls and call sites outside the analyzed methods.
    #[must_use]
    pub fn receiver_type_at(&self, call_site: &CallSite) -> Option<TypeSet> {
        if call_site.is_static() {
            return None;
        }
        let receiver = self.call_site_vertices(call_site)?.receiver_vertex();
        (receiver != VERTEX_ERROR).then(|| self.reaching[receiver as usize])
    }

    /// The types reaching a formal parameter. The receiver of instance
    /// methods is position `0`. `None` for primitive parameters and
    /// methods outside the analysis.
    #[must_use]
    pub fn method_param_type(&self, method: MethodId, position: usize) -> Option<TypeSet> {
        let vertex = self.method_vertices.get(&method)?.param_vertex(position);
        (vertex != VERTEX_ERROR).then(|| self.reaching[vertex as usize])
    }

    /// The types reaching a field. `None` for primitive fields.
    #[must_use]
    pub fn field_type_set(&self, field: FieldId) -> Option<TypeSet> {
        let vertex = *self.field_vertices.get(&field)?;
        Some(self.reaching[vertex as usize])
    }

    /// The interner resolving the ids inside returned [`TypeSet`]s.
    #[must_use]
    pub fn interner(&self) -> &TypeSetInterner {
        &self.interner
    }

    fn call_site_vertices(&self, call_site: &CallSite) -> Option<&CallSiteVertices> {
        self.callsite_map
            .get(&call_site.owner)?
            .get(&call_site.instruction_index)
    }

    fn push_resolved(&self, class_name: &str, call_site: &CallSite, result: &mut Vec<MethodId>) {
        let resolved = self.hierarchy.resolve_special_call(
            class_name,
            &call_site.method_name,
            &call_site.descriptor,
        );
        if let Some(id) = resolved {
            let owner = &self.hierarchy.class_by_id(id.class).binary_name;
            if !self.target.is_excluded_type(owner) {
                result.push(id);
            }
        }
    }
}

/// Accumulates vertices and assignment edges, then runs the
/// propagation.
struct Builder<'a> {
    hierarchy: &'a ClassHierarchy,
    target: &'a dyn AnalysisTarget,
    pool: VertexPool,
    dataflow: HashMap<MethodId, DataDependence>,
    method_vertices: HashMap<MethodId, MethodVertices>,
    field_vertices: HashMap<FieldId, u32>,
    callsite_map: HashMap<MethodId, HashMap<u32, CallSiteVertices>>,
    edges: Vec<(u32, u32)>,
    allocation_vertices: Vec<u32>,
    approximated_returns: Vec<u32>,
    approximated_fields: Vec<u32>,
    catch_vertices: HashMap<u32, String>,
}

impl<'a> Builder<'a> {
    fn new(hierarchy: &'a ClassHierarchy, target: &'a dyn AnalysisTarget) -> Self {
        Self {
            hierarchy,
            target,
            pool: VertexPool::new(),
            dataflow: HashMap::new(),
            method_vertices: HashMap::new(),
            field_vertices: HashMap::new(),
            callsite_map: HashMap::new(),
            edges: Vec::new(),
            allocation_vertices: Vec::new(),
            approximated_returns: Vec::new(),
            approximated_fields: Vec::new(),
            catch_vertices: HashMap::new(),
        }
    }

    fn class_ids(&self) -> impl Iterator<Item = ClassId> {
        #[expect(clippy::cast_possible_truncation)]
        let count = self.hierarchy.class_count() as u32;
        (0..count).map(ClassId)
    }

    /// First pass: a vertex per reference-typed formal parameter, local
    /// variable entry, return value, and field.
    fn allocate_method_vertices(&mut self) {
        let hierarchy = self.hierarchy;
        for class_id in self.class_ids().collect::<Vec<_>>() {
            let class = hierarchy.class_by_id(class_id);
            for (index, method) in class.methods.iter().enumerate() {
                if !method.has_body() || !self.target.is_target_method(class, method) {
                    continue;
                }
                let Ok(dataflow) = DataDependence::compute(&class.binary_name, method) else {
                    continue;
                };
                let Ok(params) = method.param_types(&class.binary_name) else {
                    continue;
                };
                let Ok(return_type) = method.return_type() else {
                    continue;
                };
                #[expect(clippy::cast_possible_truncation)]
                let id = MethodId { class: class_id, index: index as u16 };
                let vertices = MethodVertices::new(
                    &mut self.pool,
                    &params,
                    return_type.as_ref(),
                    dataflow.local_variables(),
                );
                self.method_vertices.insert(id, vertices);
                self.dataflow.insert(id, dataflow);
            }
        }
    }

    fn allocate_field_vertices(&mut self) {
        let hierarchy = self.hierarchy;
        for class_id in self.class_ids().collect::<Vec<_>>() {
            let class = hierarchy.class_by_id(class_id);
            for (index, field) in class.fields.iter().enumerate() {
                let Ok(parsed) = crate::types::parse_field_descriptor(&field.descriptor) else {
                    continue;
                };
                if !parsed.is_reference {
                    continue;
                }
                let vertex = self.pool.alloc(parsed.name);
                #[expect(clippy::cast_possible_truncation)]
                let id = FieldId { class: class_id, index: index as u16 };
                self.field_vertices.insert(id, vertex);
                if !self.target.is_target_field(class, field) {
                    self.approximated_fields.push(vertex);
                }
            }
        }
    }

    /// Second pass: allocation site and call site vertices, plus the
    /// assignment edges within and between the analyzed methods.
    fn connect_methods(&mut self) {
        let dataflow = std::mem::take(&mut self.dataflow);
        let mut ids: Vec<MethodId> = dataflow.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            self.connect_method(id, &dataflow[&id]);
        }
    }

    fn connect_method(&mut self, id: MethodId, dataflow: &DataDependence) {
        let hierarchy = self.hierarchy;
        let method = hierarchy.method_by_id(id);
        let Some(body) = &method.body else {
            return;
        };
        let news = NewVertices::new(&mut self.pool, body);
        for call_site in method.call_sites(id) {
            self.connect_call_site(&call_site);
        }
        for index in 0..dataflow.instruction_count() {
            self.analyze_instruction(id, dataflow, &news, index);
        }
        self.allocation_vertices.extend(news.vertices());
    }

    /// Allocates the call site's vertices and wires actual parameters to
    /// the formals of every statically known callee. Calls without an
    /// analyzed callee get their return approximated by its declared
    /// type.
    fn connect_call_site(&mut self, call_site: &CallSite) {
        let Ok(descriptor) = call_site.descriptor.parse::<MethodDescriptor>() else {
            return;
        };
        let vertices = CallSiteVertices::new(
            &mut self.pool,
            &call_site.class_name,
            &descriptor,
            call_site.is_static(),
        );
        let actuals: Vec<u32> = (0..vertices.param_count())
            .map(|position| vertices.param_vertex(position))
            .collect();
        let return_vertex = vertices.return_vertex();
        self.callsite_map
            .entry(call_site.owner)
            .or_default()
            .insert(call_site.instruction_index, vertices);

        let callees = self.hierarchy.resolve_call(call_site);
        let mut unanalyzed_callee = callees.is_empty();
        for callee in callees {
            let formals = self.method_vertices.get(&callee).map(|vertices| {
                let params: Vec<u32> = (0..actuals.len())
                    .map(|position| vertices.param_vertex(position))
                    .collect();
                (params, vertices.return_vertex())
            });
            let Some((formals, formal_return)) = formals else {
                unanalyzed_callee = true;
                continue;
            };
            for (&actual, &formal) in actuals.iter().zip(&formals) {
                self.add_edge(actual, formal);
            }
            if let Some(actual_return) = return_vertex {
                self.add_edge(formal_return, actual_return);
            }
        }
        if unanalyzed_callee {
            if let Some(actual_return) = return_vertex {
                self.approximated_returns.push(actual_return);
            }
        }
    }

    fn analyze_instruction(
        &mut self,
        id: MethodId,
        dataflow: &DataDependence,
        news: &NewVertices,
        index: u32,
    ) {
        match dataflow.instruction(index) {
            Instruction::Return { kind: Some(ValueKind::Reference) } => {
                let return_vertex = self.method_vertices[&id].return_vertex();
                self.connect_operand_sources(id, dataflow, news, index, 0, return_vertex);
            }
            Instruction::Store { kind: ValueKind::Reference, .. } => {
                self.analyze_reference_store(id, dataflow, news, index);
            }
            Instruction::PutField { field, is_static } => {
                let Some(field_vertex) = self.field_vertex(field, *is_static) else {
                    return;
                };
                let value_operand = u8::from(!*is_static);
                self.connect_operand_sources(id, dataflow, news, index, value_operand, field_vertex);
            }
            Instruction::Invoke { .. } => {
                let Some(vertices) = self.callsite_map.get(&id).and_then(|m| m.get(&index)) else {
                    return;
                };
                let actuals: Vec<u32> = (0..vertices.param_count())
                    .map(|position| vertices.param_vertex(position))
                    .collect();
                for (position, &actual) in actuals.iter().enumerate() {
                    #[expect(clippy::cast_possible_truncation)]
                    self.connect_operand_sources(id, dataflow, news, index, position as u8, actual);
                }
            }
            Instruction::ArrayStore { kind: ValueKind::Reference } => {
                // Element assignments flow into the array's vertex.
                let operands = dataflow.data_definitions(index);
                let (Some(arrays), Some(values)) = (operands.first(), operands.get(2)) else {
                    return;
                };
                let array_vertices: Vec<u32> = arrays
                    .iter()
                    .flat_map(|&def| {
                        self.source_vertices(id, dataflow, news, def, &mut HashSet::new())
                    })
                    .collect();
                let value_vertices: Vec<u32> = values
                    .iter()
                    .flat_map(|&def| {
                        self.source_vertices(id, dataflow, news, def, &mut HashSet::new())
                    })
                    .collect();
                for &value in &value_vertices {
                    for &array in &array_vertices {
                        self.add_edge(value, array);
                    }
                }
            }
            _ => {}
        }
    }

    /// A reference store either seeds an exception handler variable with
    /// the caught type or connects the stored value's sources to the
    /// local variable's vertex.
    fn analyze_reference_store(
        &mut self,
        id: MethodId,
        dataflow: &DataDependence,
        news: &NewVertices,
        index: u32,
    ) {
        let operands = dataflow.data_definitions(index);
        let Some(defs) = operands.first() else {
            return;
        };
        let local = self.method_vertices[&id].local_vertex(dataflow.local_variables(), index);
        if matches!(defs.as_slice(), [Def::Entry]) {
            let handler = self
                .hierarchy
                .method_by_id(id)
                .body
                .as_ref()
                .and_then(|body| body.exception_handlers.iter().find(|h| h.handler == index));
            if let Some(handler) = handler {
                let caught = handler
                    .catch_type
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_TYPE.to_owned());
                if local != VERTEX_ERROR {
                    self.catch_vertices.insert(local, caught);
                }
            }
            return;
        }
        for &def in defs {
            for source in self.source_vertices(id, dataflow, news, def, &mut HashSet::new()) {
                self.add_edge(source, local);
            }
        }
    }

    /// Connects the sources of one operand of `index` to `destination`.
    fn connect_operand_sources(
        &mut self,
        id: MethodId,
        dataflow: &DataDependence,
        news: &NewVertices,
        index: u32,
        operand: u8,
        destination: u32,
    ) {
        if destination == VERTEX_ERROR {
            return;
        }
        let operands = dataflow.data_definitions(index);
        let Some(defs) = operands.get(operand as usize) else {
            return;
        };
        for &def in defs {
            for source in self.source_vertices(id, dataflow, news, def, &mut HashSet::new()) {
                self.add_edge(source, destination);
            }
        }
    }

    /// The vertices a definition reads from. Casts and array loads are
    /// transparent: their sources are the sources of their operand.
    fn source_vertices(
        &self,
        id: MethodId,
        dataflow: &DataDependence,
        news: &NewVertices,
        def: Def,
        visited: &mut HashSet<u32>,
    ) -> Vec<u32> {
        let Def::Insn(index) = def else {
            return vec![VERTEX_ERROR];
        };
        if !visited.insert(index) {
            return Vec::new();
        }
        match dataflow.instruction(index) {
            Instruction::CheckCast { .. } | Instruction::ArrayLoad { kind: ValueKind::Reference } => {
                dataflow
                    .data_definitions(index)
                    .first()
                    .map_or_else(Vec::new, |defs| {
                        defs.iter()
                            .flat_map(|&inner| {
                                self.source_vertices(id, dataflow, news, inner, visited)
                            })
                            .collect()
                    })
            }
            Instruction::Invoke { .. } => {
                let returned = self
                    .callsite_map
                    .get(&id)
                    .and_then(|m| m.get(&index))
                    .and_then(CallSiteVertices::return_vertex);
                vec![returned.unwrap_or(VERTEX_ERROR)]
            }
            Instruction::GetField { field, is_static } => self
                .field_vertex(field, *is_static)
                .map_or_else(Vec::new, |vertex| vec![vertex]),
            Instruction::Load { kind: ValueKind::Reference, .. } => {
                vec![self.method_vertices[&id].local_vertex(dataflow.local_variables(), index)]
            }
            Instruction::New { .. } | Instruction::NewArray { .. } => {
                vec![news.vertex_at(index).unwrap_or(VERTEX_ERROR)]
            }
            _ => vec![VERTEX_ERROR],
        }
    }

    fn field_vertex(&self, field: &FieldRef, is_static: bool) -> Option<u32> {
        let access = FieldAccess::put(
            field.owner.clone(),
            field.name.clone(),
            field.descriptor.clone(),
            is_static,
        );
        let id = self.hierarchy.resolve_field(&access)?;
        self.field_vertices.get(&id).copied()
    }

    /// Records an assignment edge. Array assignments and assignments
    /// between two `java/lang/Object` values alias both directions.
    fn add_edge(&mut self, source: u32, destination: u32) {
        if source == VERTEX_ERROR || destination == VERTEX_ERROR {
            return;
        }
        self.edges.push((source, destination));
        let source_type = self.pool.declared(source);
        let destination_type = self.pool.declared(destination);
        if is_array_type_name(source_type)
            || is_array_type_name(destination_type)
            || (source_type == UNKNOWN_TYPE && destination_type == UNKNOWN_TYPE)
        {
            self.edges.push((destination, source));
        }
    }

    fn finish(self) -> VtaResolver<'a> {
        let graph = DirectedGraph::new(self.pool.vertex_count(), self.edges.iter().copied());
        let condensation = Condensation::new(&graph);
        let mut interner = TypeSetInterner::new();
        let mut reaching: Vec<Option<TypeSet>> = vec![None; self.pool.vertex_count() as usize];

        for &vertex in &self.allocation_vertices {
            let base = strip_array_suffix(self.pool.declared(vertex)).to_owned();
            assign_specific(&condensation, &mut reaching, &mut interner, vertex, &base);
        }
        for &vertex in &self.approximated_returns {
            let base = strip_array_suffix(self.pool.declared(vertex)).to_owned();
            assign_approximated(&condensation, &mut reaching, &mut interner, vertex, &base);
        }
        if self.target.assume_external_callers() {
            let mut ids: Vec<MethodId> = self.method_vertices.keys().copied().collect();
            ids.sort_unstable();
            for id in ids {
                let vertices = &self.method_vertices[&id];
                for position in 0..vertices.param_count() {
                    let vertex = vertices.param_vertex(position);
                    if vertex != VERTEX_ERROR {
                        let base = strip_array_suffix(self.pool.declared(vertex)).to_owned();
                        assign_approximated(&condensation, &mut reaching, &mut interner, vertex, &base);
                    }
                }
            }
        }
        for (&vertex, caught) in &self.catch_vertices {
            let base = strip_array_suffix(caught);
            assign_approximated(&condensation, &mut reaching, &mut interner, vertex, base);
        }
        for &vertex in &self.approximated_fields {
            let base = strip_array_suffix(self.pool.declared(vertex)).to_owned();
            assign_approximated(&condensation, &mut reaching, &mut interner, vertex, &base);
        }

        let incoming = condensation.dag().reverse();
        let mut propagation = Propagation {
            incoming: &incoming,
            reaching: &mut reaching,
            interner: &mut interner,
        };
        topological::search(&condensation, &mut propagation);
        for vertex in 0..graph.vertex_count() {
            let representative = condensation.representative(vertex);
            if representative != vertex {
                reaching[vertex as usize] = reaching[representative as usize];
            }
        }
        let reaching = reaching
            .into_iter()
            .map(|set| set.unwrap_or_else(|| TypeSet::empty(&interner)))
            .collect();

        VtaResolver {
            hierarchy: self.hierarchy,
            target: self.target,
            declared_types: self.pool.into_declared_types(),
            method_vertices: self.method_vertices,
            field_vertices: self.field_vertices,
            callsite_map: self.callsite_map,
            reaching,
            interner,
        }
    }
}

fn assign_specific(
    condensation: &Condensation,
    reaching: &mut [Option<TypeSet>],
    interner: &mut TypeSetInterner,
    vertex: u32,
    type_name: &str,
) {
    let representative = condensation.representative(vertex) as usize;
    reaching[representative] = Some(match reaching[representative] {
        Some(set) => set.add_type(interner, type_name),
        None => TypeSet::with_type(interner, type_name),
    });
}

fn assign_approximated(
    condensation: &Condensation,
    reaching: &mut [Option<TypeSet>],
    interner: &mut TypeSetInterner,
    vertex: u32,
    type_name: &str,
) {
    let representative = condensation.representative(vertex) as usize;
    reaching[representative] = Some(match reaching[representative] {
        Some(set) => set.add_approximated(interner, type_name),
        None => TypeSet::approximation(interner, type_name),
    });
}

/// Merges the type sets of predecessor components into each component,
/// in topological order over the condensation.
struct Propagation<'p> {
    incoming: &'p DirectedGraph,
    reaching: &'p mut [Option<TypeSet>],
    interner: &'p mut TypeSetInterner,
}

impl TopologicalVisitor for Propagation<'_> {
    fn on_visit(&mut self, representative: u32) -> bool {
        if representative == VERTEX_ERROR {
            // Untracked values contribute no types.
            self.reaching[0] = Some(TypeSet::empty(self.interner));
            return true;
        }
        let mut sets: Vec<TypeSet> = self
            .incoming
            .edges_of(representative)
            .iter()
            .filter_map(|&predecessor| self.reaching[predecessor as usize])
            .collect();
        if let Some(own) = self.reaching[representative as usize] {
            sets.push(own);
        }
        let merged = if sets.is_empty() {
            TypeSet::empty(self.interner)
        } else {
            TypeSet::merged(self.interner, sets)
        };
        self.reaching[representative as usize] = Some(merged);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{CallResolver, WholeProgram};
    use crate::jvm::code::{ExceptionHandler, InvokeKind, StackOp};
    use crate::jvm::{Class, Method, MethodAccessFlags};
    use crate::tests::{
        aload, astore, body, call_site_at, class, concrete, hierarchy, invoke, method, method_id,
        target_names, trivial_body,
    };

    // A small family: C <- D <- G, plus an unrelated exception class.
    fn family() -> Vec<Class> {
        vec![
            class(
                "pkg/C",
                "java/lang/Object",
                &[],
                vec![
                    concrete("n", "()V"),
                    method(
                        "boom",
                        "()V",
                        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
                        Some(trivial_body()),
                    ),
                ],
            ),
            class("pkg/D", "pkg/C", &[], vec![concrete("n", "()V")]),
            class("pkg/G", "pkg/D", &[], vec![concrete("<init>", "()V"), concrete("n", "()V")]),
            class("pkg/Ex", "java/lang/Object", &[], vec![concrete("handle", "()V")]),
        ]
    }

    fn static_run(instructions: Vec<Instruction>, max_locals: u16, max_stack: u16) -> Method {
        method(
            "run",
            "()V",
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            Some(body(instructions, max_locals, max_stack)),
        )
    }

    #[test]
    fn allocations_narrow_virtual_calls() {
        let mut classes = family();
        classes.push(class(
            "pkg/Main",
            "java/lang/Object",
            &[],
            vec![static_run(
                vec![
                    Instruction::New { class_name: "pkg/G".to_owned() },
                    Instruction::Stack(StackOp::Dup),
                    invoke(InvokeKind::Special, "pkg/G", "<init>", "()V"),
                    astore(0),
                    aload(0),
                    invoke(InvokeKind::Virtual, "pkg/C", "n", "()V"),
                    Instruction::Return { kind: None },
                ],
                1,
                2,
            )],
        ));
        let h = hierarchy(classes);
        let vta = VtaResolver::new(&h, &WholeProgram);
        let call = call_site_at(&h, "pkg/Main", "run", "()V", 5);

        assert_eq!(target_names(&h, &vta.resolve_call(&call)), ["pkg/G.n"]);
        assert_eq!(
            target_names(&h, &CallResolver::cha(&h).resolve_call(&call)),
            ["pkg/C.n", "pkg/D.n", "pkg/G.n"]
        );

        let receiver = vta.receiver_type_at(&call).unwrap();
        assert_eq!(receiver.concrete(vta.interner()).collect::<Vec<_>>(), ["pkg/G"]);
        assert_eq!(receiver.approximated(vta.interner()).count(), 0);
    }

    #[test]
    fn special_sites_resolve_through_the_wrapper() {
        let mut classes = family();
        classes.push(class(
            "pkg/Main",
            "java/lang/Object",
            &[],
            vec![static_run(
                vec![
                    Instruction::New { class_name: "pkg/G".to_owned() },
                    Instruction::Stack(StackOp::Dup),
                    invoke(InvokeKind::Special, "pkg/G", "<init>", "()V"),
                    Instruction::Stack(StackOp::Pop),
                    Instruction::Return { kind: None },
                ],
                0,
                2,
            )],
        ));
        let h = hierarchy(classes);
        let vta = VtaResolver::new(&h, &WholeProgram);
        let resolver = CallResolver::vta(&h, &vta);
        let init = call_site_at(&h, "pkg/Main", "run", "()V", 2);

        // The propagation result itself never answers special sites.
        assert!(vta.resolve_call(&init).is_empty());
        assert_eq!(
            resolver.resolve_call(&init),
            [method_id(&h, "pkg/G", "<init>", "()V")]
        );
    }

    #[test]
    fn unanalyzed_callees_fall_back_to_the_declared_return_type() {
        let mut classes = family();
        classes.push(class(
            "pkg/Main",
            "java/lang/Object",
            &[],
            vec![static_run(
                vec![
                    invoke(InvokeKind::Static, "pkg/Factory", "create", "()Lpkg/C;"),
                    astore(0),
                    aload(0),
                    invoke(InvokeKind::Virtual, "pkg/C", "n", "()V"),
                    Instruction::Return { kind: None },
                ],
                1,
                1,
            )],
        ));
        let h = hierarchy(classes);
        let vta = VtaResolver::new(&h, &WholeProgram);
        let call = call_site_at(&h, "pkg/Main", "run", "()V", 3);

        // The factory is unknown, so every subtype of the declared return
        // type stays possible, exactly as under CHA.
        let expected = target_names(&h, &CallResolver::cha(&h).resolve_call(&call));
        assert_eq!(expected, ["pkg/C.n", "pkg/D.n", "pkg/G.n"]);
        assert_eq!(target_names(&h, &vta.resolve_call(&call)), expected.as_slice());
    }

    #[test]
    fn catch_variables_carry_the_caught_type() {
        let mut classes = family();
        let mut run_body = body(
            vec![
                invoke(InvokeKind::Static, "pkg/C", "boom", "()V"),
                Instruction::Goto { target: 5 },
                astore(0),
                aload(0),
                invoke(InvokeKind::Virtual, "pkg/Ex", "handle", "()V"),
                Instruction::Return { kind: None },
            ],
            1,
            1,
        );
        run_body.exception_handlers.push(ExceptionHandler {
            start: 0,
            end: 1,
            handler: 2,
            catch_type: Some("pkg/Ex".to_owned()),
        });
        classes.push(class(
            "pkg/Main",
            "java/lang/Object",
            &[],
            vec![method(
                "run",
                "()V",
                MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
                Some(run_body),
            )],
        ));
        let h = hierarchy(classes);
        let vta = VtaResolver::new(&h, &WholeProgram);
        let call = call_site_at(&h, "pkg/Main", "run", "()V", 4);

        assert_eq!(target_names(&h, &vta.resolve_call(&call)), ["pkg/Ex.handle"]);
        let receiver = vta.receiver_type_at(&call).unwrap();
        assert_eq!(receiver.concrete(vta.interner()).count(), 0);
        assert_eq!(
            receiver.approximated(vta.interner()).collect::<Vec<_>>(),
            ["pkg/Ex"]
        );
    }

    #[test]
    fn actual_parameters_reach_the_callee_formals() {
        let mut classes = family();
        classes.push(class(
            "pkg/Sink",
            "java/lang/Object",
            &[],
            vec![method(
                "consume",
                "(Lpkg/C;)V",
                MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
                Some(trivial_body()),
            )],
        ));
        classes.push(class(
            "pkg/Main",
            "java/lang/Object",
            &[],
            vec![static_run(
                vec![
                    Instruction::New { class_name: "pkg/G".to_owned() },
                    Instruction::Stack(StackOp::Dup),
                    invoke(InvokeKind::Special, "pkg/G", "<init>", "()V"),
                    invoke(InvokeKind::Static, "pkg/Sink", "consume", "(Lpkg/C;)V"),
                    Instruction::Return { kind: None },
                ],
                1,
                2,
            )],
        ));
        let h = hierarchy(classes);
        let vta = VtaResolver::new(&h, &WholeProgram);
        let consume = method_id(&h, "pkg/Sink", "consume", "(Lpkg/C;)V");

        let param = vta.method_param_type(consume, 0).unwrap();
        assert!(param.contains(vta.interner(), "pkg/G"));
    }

    #[test]
    fn array_elements_conflate_with_the_array() {
        let mut classes = family();
        classes.push(class(
            "pkg/Main",
            "java/lang/Object",
            &[],
            vec![static_run(
                vec![
                    Instruction::Push { width: 1 },
                    Instruction::NewArray { element: "pkg/C".to_owned(), dimensions: 1 },
                    astore(0),
                    aload(0),
                    Instruction::Push { width: 1 },
                    Instruction::New { class_name: "pkg/G".to_owned() },
                    Instruction::Stack(StackOp::Dup),
                    invoke(InvokeKind::Special, "pkg/G", "<init>", "()V"),
                    Instruction::ArrayStore { kind: ValueKind::Reference },
                    aload(0),
                    Instruction::Push { width: 1 },
                    Instruction::ArrayLoad { kind: ValueKind::Reference },
                    astore(1),
                    aload(1),
                    invoke(InvokeKind::Virtual, "pkg/C", "n", "()V"),
                    Instruction::Return { kind: None },
                ],
                2,
                4,
            )],
        ));
        let h = hierarchy(classes);
        let vta = VtaResolver::new(&h, &WholeProgram);
        let call = call_site_at(&h, "pkg/Main", "run", "()V", 14);

        // The stored element and the array allocation's base type both
        // reach values loaded back out of the array.
        assert_eq!(
            target_names(&h, &vta.resolve_call(&call)),
            ["pkg/C.n", "pkg/G.n"]
        );
    }
}
