//! Intraprocedural may-reaching-definitions dataflow.
//!
//! [`DataDependence::compute`] abstractly interprets a method body with
//! the worklist solver from [`crate::analysis::fixed_point`], then
//! derives per-operand definition sites, def-use edges, and local
//! variable entries recovered from the edges.

mod frame;
mod locals;

use std::fmt;

use itertools::Itertools;
use thiserror::Error;

use crate::analysis::fixed_point::{self, FixedPointAnalyzer};
use crate::graph::DirectedGraph;
use crate::jvm::code::{Instruction, MethodBody};
use crate::jvm::Method;
use crate::types::{InvalidDescriptor, MethodDescriptor};

pub use frame::Frame;
pub use locals::LocalVariables;

/// A definition site of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Def {
    /// The value is defined outside the method: a parameter, or the
    /// exception caught by a handler.
    Entry,
    /// The value is defined by the instruction at this index.
    Insn(u32),
}

impl fmt::Display for Def {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Def::Entry => write!(f, "PARAM"),
            Def::Insn(index) => write!(f, "{index}"),
        }
    }
}

/// A set of definitions reaching a value, with the value's width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefSet {
    width: u8,
    defs: Vec<Def>,
}

impl DefSet {
    /// A value without known definitions.
    #[must_use]
    pub fn empty(width: u8) -> Self {
        Self { width, defs: Vec::new() }
    }

    /// A value with a single definition.
    #[must_use]
    pub fn single(width: u8, def: Def) -> Self {
        Self { width, defs: vec![def] }
    }

    /// The width of the value in words (1 or 2).
    #[must_use]
    pub fn width(&self) -> u8 {
        self.width
    }

    /// The definitions, sorted with [`Def::Entry`] first.
    #[must_use]
    pub fn defs(&self) -> &[Def] {
        &self.defs
    }

    /// Returns `true` if every definition of `other` is also in `self`.
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        other.defs.iter().all(|def| self.defs.binary_search(def).is_ok())
    }

    /// The union of two definition sets. The merged width is the minimum
    /// of the two.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let width = self.width.min(other.width);
        if width == self.width && self.contains_all(other) {
            return self.clone();
        }
        let mut defs: Vec<Def> = self.defs.iter().chain(&other.defs).copied().collect();
        defs.sort_unstable();
        defs.dedup();
        Self { width, defs }
    }
}

/// A failure while abstractly executing a method body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// An instruction popped from an empty operand stack.
    #[error("operand stack underflow")]
    StackUnderflow,
    /// The operand stack grew beyond the declared maximum.
    #[error("operand stack exceeds the declared maximum")]
    StackOverflow,
    /// A local variable slot lies outside the local table.
    #[error("local variable slot out of range")]
    LocalLimitExceeded,
    /// Two control flow paths reach the same instruction with different
    /// operand stack sizes.
    #[error("control flow paths disagree on the operand stack size")]
    StackSizeMismatch,
    /// A stack operand has the wrong width for the instruction.
    #[error("operand width does not match the instruction")]
    ValueMismatch,
    /// A branch target lies outside the instruction sequence.
    #[error("jump target {target} is out of bounds")]
    JumpOutOfBounds {
        /// The offending instruction index.
        target: u32,
    },
    /// The analyzed method has no body.
    #[error("the method has no body")]
    AbsentCode,
    /// A field or method reference carries a malformed descriptor.
    #[error(transparent)]
    Descriptor(#[from] InvalidDescriptor),
}

/// A def-use edge between two instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFlowEdge {
    /// The definition flowing into the destination.
    pub source: Def,
    /// The instruction consuming the value.
    pub destination: u32,
    /// The operand position within the destination instruction.
    pub operand_index: u8,
    /// The number of operands the destination instruction consumes.
    pub operand_count: u8,
    /// The operand stack position, or the local variable slot for local
    /// edges.
    pub value_index: u16,
    /// `true` if the value flows through a local variable.
    pub is_local: bool,
}

impl DataFlowEdge {
    /// Returns `true` if the value comes from a formal parameter.
    #[must_use]
    pub fn is_parameter(&self) -> bool {
        self.is_local && self.source == Def::Entry
    }
}

impl fmt::Display for DataFlowEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)?;
        if self.operand_count > 1 {
            write!(f, " [{}/{}]", self.operand_index + 1, self.operand_count)?;
        }
        let kind = if self.is_local { "LOCAL" } else { "STACK" };
        write!(f, " ({kind}:{})", self.value_index)
    }
}

/// The number of stack operands an instruction consumes. Loads and
/// `iinc` consume none; they read a local variable instead.
fn operand_count(instruction: &Instruction) -> Result<u8, InvalidDescriptor> {
    use Instruction as I;
    Ok(match instruction {
        I::Nop
        | I::Push { .. }
        | I::Load { .. }
        | I::Increment { .. }
        | I::Stack(_)
        | I::New { .. }
        | I::Goto { .. }
        | I::GetField { is_static: true, .. } => 0,
        I::Store { .. }
        | I::CheckCast { .. }
        | I::Throw
        | I::Switch { .. }
        | I::GetField { is_static: false, .. }
        | I::PutField { is_static: true, .. } => 1,
        I::Return { kind } => u8::from(kind.is_some()),
        I::PutField { is_static: false, .. } | I::ArrayLoad { .. } => 2,
        I::ArrayStore { .. } => 3,
        I::Compute { pops, .. } | I::Branch { pops, .. } => *pops,
        I::NewArray { dimensions, .. } => *dimensions,
        I::Invoke { target, kind } => {
            let descriptor: MethodDescriptor = target.descriptor.parse()?;
            let receiver = u8::from(*kind != crate::jvm::code::InvokeKind::Static);
            #[expect(clippy::cast_possible_truncation)]
            let count = descriptor.parameters.len() as u8 + receiver;
            count
        }
    })
}

fn local_slot(instruction: &Instruction) -> Option<u16> {
    match instruction {
        Instruction::Load { slot, .. } | Instruction::Increment { slot } => Some(*slot),
        _ => None,
    }
}

struct DependenceAnalyzer<'a> {
    body: &'a MethodBody,
    entry: Frame,
}

impl DependenceAnalyzer<'_> {
    fn checked(&self, target: u32) -> Result<u32, ExecutionError> {
        if target < self.body.instruction_count() {
            Ok(target)
        } else {
            Err(ExecutionError::JumpOutOfBounds { target })
        }
    }
}

impl FixedPointAnalyzer for DependenceAnalyzer<'_> {
    type Location = u32;
    type Fact = Frame;
    type Error = ExecutionError;

    fn entry_fact(&self) -> Result<Vec<(u32, Frame)>, ExecutionError> {
        Ok(vec![(self.checked(0)?, self.entry.clone())])
    }

    fn execute(&mut self, location: u32, fact: &Frame) -> Result<Vec<(u32, Frame)>, ExecutionError> {
        let instruction = &self.body.instructions[location as usize];
        let next = fact.execute(location, instruction)?;
        let mut successors = Vec::new();
        match instruction {
            Instruction::Goto { target } => {
                successors.push((self.checked(*target)?, next));
            }
            Instruction::Branch { target, .. } => {
                successors.push((self.checked(location + 1)?, next.clone()));
                successors.push((self.checked(*target)?, next));
            }
            Instruction::Switch { targets, default } => {
                for target in targets {
                    successors.push((self.checked(*target)?, next.clone()));
                }
                successors.push((self.checked(*default)?, next));
            }
            Instruction::Return { .. } | Instruction::Throw => {}
            _ => {
                successors.push((self.checked(location + 1)?, next));
            }
        }
        for handler in &self.body.exception_handlers {
            if handler.start <= location && location < handler.end {
                successors.push((self.checked(handler.handler)?, fact.exception_frame()));
            }
        }
        Ok(successors)
    }
}

/// The data dependence information of a single method body.
#[derive(Debug)]
pub struct DataDependence {
    body: MethodBody,
    frames: Vec<Option<Frame>>,
    operand_counts: Vec<u8>,
    edges: Vec<DataFlowEdge>,
    edges_source_order: Vec<DataFlowEdge>,
    locals: LocalVariables,
}

impl DataDependence {
    /// Runs the reaching-definitions analysis on a method body.
    ///
    /// `owner` is the binary name of the declaring class; it types the
    /// receiver slot of instance methods.
    ///
    /// # Errors
    /// Fails for methods without a body, for malformed descriptors, and
    /// for bodies that violate stack discipline.
    pub fn compute(owner: &str, method: &Method) -> Result<Self, ExecutionError> {
        let body = method.body.as_ref().ok_or(ExecutionError::AbsentCode)?.clone();
        if body.instructions.is_empty() {
            return Err(ExecutionError::AbsentCode);
        }
        let parameters = method.param_types(owner)?;
        let entry = Frame::entry(&parameters, body.max_locals, body.max_stack);
        let mut analyzer = DependenceAnalyzer { body: &body, entry };
        let facts = fixed_point::analyze(&mut analyzer)?;

        let mut frames: Vec<Option<Frame>> = vec![None; body.instructions.len()];
        for (location, frame) in facts {
            frames[location as usize] = Some(frame);
        }
        let operand_counts = body
            .instructions
            .iter()
            .map(operand_count)
            .collect::<Result<Vec<_>, _>>()?;

        let mut edges = Vec::new();
        for (index, instruction) in body.instructions.iter().enumerate() {
            #[expect(clippy::cast_possible_truncation)]
            let destination = index as u32;
            let Some(frame) = &frames[index] else {
                continue;
            };
            let count = operand_counts[index];
            if count > 0 {
                let stack = frame.stack();
                for operand in 0..count {
                    let position = stack.len() - count as usize + operand as usize;
                    for &source in stack[position].defs() {
                        #[expect(clippy::cast_possible_truncation)]
                        edges.push(DataFlowEdge {
                            source,
                            destination,
                            operand_index: operand,
                            operand_count: count,
                            value_index: position as u16,
                            is_local: false,
                        });
                    }
                }
            } else if let Some(slot) = local_slot(instruction) {
                if let Some(value) = frame.local(slot) {
                    for &source in value.defs() {
                        edges.push(DataFlowEdge {
                            source,
                            destination,
                            operand_index: 0,
                            operand_count: 1,
                            value_index: slot,
                            is_local: true,
                        });
                    }
                }
            }
        }
        let edges_source_order = edges
            .iter()
            .copied()
            .sorted_by_key(|e| (e.source, e.destination, e.operand_index, e.value_index, e.is_local))
            .collect();
        let locals = LocalVariables::new(&edges, &body);
        Ok(Self { body, frames, operand_counts, edges, edges_source_order, locals })
    }

    /// The def-use edges, sorted by destination instruction.
    #[must_use]
    pub fn edges(&self) -> &[DataFlowEdge] {
        &self.edges
    }

    /// The def-use edges, sorted by source instruction.
    #[must_use]
    pub fn edges_in_source_order(&self) -> &[DataFlowEdge] {
        &self.edges_source_order
    }

    /// The edges flowing into one instruction.
    #[must_use]
    pub fn incoming_edges(&self, destination: u32) -> &[DataFlowEdge] {
        let start = self.edges.partition_point(|e| e.destination < destination);
        let end = self.edges.partition_point(|e| e.destination <= destination);
        &self.edges[start..end]
    }

    /// The edges flowing into one operand of one instruction.
    #[must_use]
    pub fn incoming_operand_edges(&self, destination: u32, operand_index: u8) -> Vec<DataFlowEdge> {
        self.incoming_edges(destination)
            .iter()
            .filter(|e| e.operand_index == operand_index)
            .copied()
            .collect()
    }

    /// The definition sites of each operand of an instruction. For loads
    /// and `iinc` the single operand is the referenced local variable.
    /// Empty for instructions without operands or never reached.
    #[must_use]
    pub fn data_definitions(&self, index: u32) -> Vec<Vec<Def>> {
        let Some(frame) = self.frame(index) else {
            return Vec::new();
        };
        let count = self.operand_counts[index as usize] as usize;
        if count > 0 {
            let stack = frame.stack();
            (0..count)
                .map(|operand| stack[stack.len() - count + operand].defs().to_vec())
                .collect()
        } else if let Some(slot) = local_slot(&self.body.instructions[index as usize]) {
            match frame.local(slot) {
                Some(value) => vec![value.defs().to_vec()],
                None => Vec::new(),
            }
        } else {
            Vec::new()
        }
    }

    /// An instruction-level graph of the def-use edges. Edges from formal
    /// parameters are not represented.
    #[must_use]
    pub fn dependence_graph(&self) -> DirectedGraph {
        DirectedGraph::new(
            self.body.instruction_count(),
            self.edges.iter().filter_map(|e| match e.source {
                Def::Insn(source) => Some((source, e.destination)),
                Def::Entry => None,
            }),
        )
    }

    /// The local variable entries recovered from the edges.
    #[must_use]
    pub fn local_variables(&self) -> &LocalVariables {
        &self.locals
    }

    /// The abstract frame entering an instruction, if it is reachable.
    #[must_use]
    pub fn frame(&self, index: u32) -> Option<&Frame> {
        self.frames.get(index as usize)?.as_ref()
    }

    /// The number of stack operands an instruction consumes.
    #[must_use]
    pub fn operand_count(&self, index: u32) -> u8 {
        self.operand_counts[index as usize]
    }

    /// Returns `true` if the instruction consumes stack operands.
    #[must_use]
    pub fn uses_stack(&self, index: u32) -> bool {
        self.operand_count(index) > 0
    }

    /// The analyzed instruction at `index`.
    #[must_use]
    pub fn instruction(&self, index: u32) -> &Instruction {
        &self.body.instructions[index as usize]
    }

    /// The number of analyzed instructions.
    #[must_use]
    pub fn instruction_count(&self) -> u32 {
        self.body.instruction_count()
    }

    /// The source-level name of the variable a local edge flows through.
    #[must_use]
    pub fn variable_name(&self, edge: &DataFlowEdge) -> Option<&str> {
        self.variable_metadata(edge, LocalVariables::variable_name)
    }

    /// The descriptor of the variable a local edge flows through.
    #[must_use]
    pub fn variable_descriptor(&self, edge: &DataFlowEdge) -> Option<&str> {
        self.variable_metadata(edge, LocalVariables::descriptor)
    }

    fn variable_metadata<'a>(
        &'a self,
        edge: &DataFlowEdge,
        accessor: impl Fn(&'a LocalVariables, usize) -> Option<&'a str>,
    ) -> Option<&'a str> {
        if !edge.is_local {
            return None;
        }
        if let Def::Insn(source) = edge.source {
            if let Some(entry) = self.locals.find_entry_for_instruction(source) {
                if let Some(value) = accessor(&self.locals, entry) {
                    return Some(value);
                }
            }
        }
        let entry = self.locals.find_entry_for_instruction(edge.destination)?;
        accessor(&self.locals, entry)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn insn_set(defs: &[u32]) -> DefSet {
        DefSet { width: 1, defs: defs.iter().map(|&i| Def::Insn(i)).collect() }
    }

    #[test]
    fn merge_keeps_the_minimum_width() {
        let wide = DefSet::single(2, Def::Insn(1));
        let narrow = DefSet::single(1, Def::Insn(2));
        assert_eq!(wide.merge(&narrow).width(), 1);
    }

    #[test]
    fn merge_is_a_sorted_union() {
        let a = insn_set(&[3, 7]);
        let b = DefSet { width: 1, defs: vec![Def::Entry, Def::Insn(5)] };
        let merged = a.merge(&b);
        assert_eq!(merged.defs(), &[Def::Entry, Def::Insn(3), Def::Insn(5), Def::Insn(7)]);
    }

    proptest! {
        #[test]
        fn merge_is_commutative_and_idempotent(
            a in proptest::collection::btree_set(0u32..32, 0..6),
            b in proptest::collection::btree_set(0u32..32, 0..6),
        ) {
            let a = insn_set(&a.into_iter().collect::<Vec<_>>());
            let b = insn_set(&b.into_iter().collect::<Vec<_>>());
            prop_assert_eq!(a.merge(&b), b.merge(&a));
            prop_assert_eq!(a.merge(&a), a.clone());
            let merged = a.merge(&b);
            prop_assert!(merged.contains_all(&a) && merged.contains_all(&b));
        }
    }

    #[test]
    fn both_branch_assignments_reach_a_read_after_the_join() {
        use crate::jvm::MethodAccessFlags;
        use crate::jvm::code::ValueKind;
        use crate::tests::{body, method};

        let branchy = method(
            "pick",
            "(I)I",
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            Some(body(
                vec![
                    Instruction::Load { slot: 0, kind: ValueKind::Int },
                    Instruction::Branch { target: 5, pops: 1 },
                    Instruction::Push { width: 1 },
                    Instruction::Store { slot: 1, kind: ValueKind::Int },
                    Instruction::Goto { target: 7 },
                    Instruction::Push { width: 1 },
                    Instruction::Store { slot: 1, kind: ValueKind::Int },
                    Instruction::Load { slot: 1, kind: ValueKind::Int },
                    Instruction::Return { kind: Some(ValueKind::Int) },
                ],
                2,
                2,
            )),
        );
        let dataflow = DataDependence::compute("pkg/Branches", &branchy)
            .unwrap();

        assert_eq!(
            dataflow.data_definitions(7),
            vec![vec![Def::Insn(3), Def::Insn(6)]],
        );

        let locals = dataflow.local_variables();
        assert_eq!(locals.entry_count(), 2);
        let parameter = locals.find_entry_for_instruction(0).unwrap();
        assert!(locals.is_parameter(parameter));
        let joined = locals.find_entry_for_instruction(7).unwrap();
        assert_eq!(locals.find_entry_for_instruction(3), Some(joined));
        assert_eq!(locals.find_entry_for_instruction(6), Some(joined));
        assert!(!locals.is_object_variable(joined));
    }

    #[test]
    fn parameter_edges_are_local_entry_edges() {
        let edge = DataFlowEdge {
            source: Def::Entry,
            destination: 4,
            operand_index: 0,
            operand_count: 1,
            value_index: 1,
            is_local: true,
        };
        assert!(edge.is_parameter());
        assert_eq!(edge.to_string(), "PARAM -> 4 (LOCAL:1)");
    }
}
