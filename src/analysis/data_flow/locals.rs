//! Local variable entries recovered from def-use edges.

use std::collections::BTreeSet;

use crate::analysis::data_flow::{DataFlowEdge, Def};
use crate::jvm::code::{Instruction, LocalVariableInfo, MethodBody, ValueKind};
use crate::types;

/// The local variables of a method, reconstructed from the local def-use
/// edges.
///
/// Each entry is a group of def-use chains that share instructions. A
/// slot reused for independent chains yields several entries; debug
/// metadata, when present and in scope for the whole entry, contributes
/// the source-level name and type.
#[derive(Debug)]
pub struct LocalVariables {
    entries: Vec<Entry>,
}

#[derive(Debug)]
struct Entry {
    slot: u16,
    defs: BTreeSet<Def>,
    refs: BTreeSet<u32>,
    ref_operands: BTreeSet<(u32, u8)>,
    is_object: bool,
    is_array: bool,
    is_alone: bool,
    name: Option<String>,
    descriptor: Option<String>,
}

impl Entry {
    fn from_edge(edge: &DataFlowEdge) -> Self {
        Self {
            slot: edge.value_index,
            defs: BTreeSet::from([edge.source]),
            refs: BTreeSet::from([edge.destination]),
            ref_operands: BTreeSet::from([(edge.destination, edge.operand_index)]),
            is_object: false,
            is_array: false,
            is_alone: false,
            name: None,
            descriptor: None,
        }
    }

    fn standalone(index: u32, slot: u16, is_object: bool) -> Self {
        Self {
            slot,
            defs: BTreeSet::from([Def::Insn(index)]),
            refs: BTreeSet::new(),
            ref_operands: BTreeSet::new(),
            is_object,
            is_array: false,
            is_alone: true,
            name: None,
            descriptor: None,
        }
    }

    fn add(&mut self, edge: &DataFlowEdge) {
        self.defs.insert(edge.source);
        self.refs.insert(edge.destination);
        self.ref_operands.insert((edge.destination, edge.operand_index));
    }

    fn merge(&mut self, other: Entry) {
        self.defs.extend(other.defs);
        for (destination, operand) in other.ref_operands {
            self.refs.insert(destination);
            self.ref_operands.insert((destination, operand));
        }
        self.is_object |= other.is_object;
        self.is_array |= other.is_array;
    }

    fn is_connected(&self, edge: &DataFlowEdge) -> bool {
        self.slot == edge.value_index
            && (self.defs.contains(&edge.source)
                || self.ref_operands.contains(&(edge.destination, edge.operand_index)))
    }

    fn contains(&self, index: u32) -> bool {
        self.defs.contains(&Def::Insn(index)) || self.refs.contains(&index)
    }

    /// An entry belongs to a debug variable only if every definition and
    /// use lies within the variable's scope.
    fn is_dataflow_of(&self, var: &LocalVariableInfo, body: &MethodBody) -> bool {
        if self.slot != var.slot {
            return false;
        }
        let defs_in_scope = self.defs.iter().all(|def| match def {
            Def::Entry => var.start == 0,
            Def::Insn(index) => is_access(body, *index, var),
        });
        defs_in_scope && self.refs.iter().all(|&index| is_access(body, index, var))
    }

    fn attach(&mut self, var: &LocalVariableInfo) {
        if self.name.is_none() {
            self.name = Some(var.name.clone());
        }
        if self.descriptor.is_none() {
            self.descriptor = Some(var.descriptor.clone());
        }
    }
}

/// Scope check for one access against one debug variable.
///
/// A store writing the declaration itself sits one instruction before the
/// scope starts; a store at the very end of the scope re-defines the slot
/// for a later variable and is excluded.
fn is_access(body: &MethodBody, index: u32, var: &LocalVariableInfo) -> bool {
    let Some(instruction) = body.instructions.get(index as usize) else {
        return false;
    };
    let slot = match instruction {
        Instruction::Load { slot, .. }
        | Instruction::Store { slot, .. }
        | Instruction::Increment { slot } => *slot,
        _ => return false,
    };
    if slot != var.slot {
        return false;
    }
    let is_write = matches!(
        instruction,
        Instruction::Store { .. } | Instruction::Increment { .. }
    );
    let scope_end = if is_write {
        if index + 1 == var.start {
            return true;
        }
        let before_end = var.end.checked_sub(1).map(|prev| &body.instructions[prev as usize]);
        if var.start != var.end
            && matches!(
                before_end,
                Some(Instruction::Store { .. } | Instruction::Increment { .. })
            )
        {
            var.end - 1
        } else {
            var.end
        }
    } else {
        var.end
    };
    var.start <= index && index < scope_end
}

impl LocalVariables {
    /// Groups the local def-use edges of a method into variable entries.
    /// `edges` must be in destination order, as produced by the dataflow
    /// analysis.
    #[must_use]
    pub fn new(edges: &[DataFlowEdge], body: &MethodBody) -> Self {
        let mut entries: Vec<Entry> = Vec::new();
        for edge in edges.iter().filter(|e| e.is_local) {
            let mut connected = entries.iter().enumerate().filter_map(|(i, e)| {
                e.is_connected(edge).then_some(i)
            });
            match (connected.next(), connected.next()) {
                (Some(first), None) => {
                    entries[first].add(edge);
                    check_value_kind(&mut entries[first], edge, body);
                }
                (Some(first), Some(second)) => {
                    let other = entries.remove(second);
                    entries[first].merge(other);
                }
                (None, _) => {
                    let mut entry = Entry::from_edge(edge);
                    check_value_kind(&mut entry, edge, body);
                    entries.push(entry);
                }
            }
        }

        for var in &body.local_variables {
            for entry in &mut entries {
                if entry.is_dataflow_of(var, body) {
                    entry.attach(var);
                }
            }
        }

        let mut locals = Self { entries };
        // Stores whose value is never read, and isolated loads, get
        // entries of their own.
        for (index, instruction) in body.instructions.iter().enumerate() {
            #[expect(clippy::cast_possible_truncation)]
            let index = index as u32;
            let described = match instruction {
                Instruction::Store { slot, kind } => {
                    Some((*slot, matches!(kind, ValueKind::Reference)))
                }
                Instruction::Load { slot, .. } => Some((*slot, false)),
                _ => None,
            };
            if let Some((slot, is_object)) = described {
                if locals.find_entry_for_instruction(index).is_none() {
                    locals.entries.push(Entry::standalone(index, slot, is_object));
                }
            }
        }
        locals
    }

    /// The number of entries. May exceed the number of source-level
    /// variables when slots are reused.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// The source-level name of an entry, if debug metadata matched.
    #[must_use]
    pub fn variable_name(&self, entry: usize) -> Option<&str> {
        self.entries[entry].name.as_deref()
    }

    /// The descriptor of an entry, if debug metadata matched.
    #[must_use]
    pub fn descriptor(&self, entry: usize) -> Option<&str> {
        self.entries[entry].descriptor.as_deref()
    }

    /// The readable type name of an entry, if debug metadata matched.
    #[must_use]
    pub fn type_name(&self, entry: usize) -> Option<String> {
        let descriptor = self.descriptor(entry)?;
        types::type_name(descriptor).ok()
    }

    /// The local variable slot of an entry.
    #[must_use]
    pub fn slot(&self, entry: usize) -> u16 {
        self.entries[entry].slot
    }

    /// Returns `true` if the entry carries reference values.
    #[must_use]
    pub fn is_object_variable(&self, entry: usize) -> bool {
        self.entries[entry].is_object
    }

    /// Returns `true` if the entry is used as an array.
    #[must_use]
    pub fn is_array_variable(&self, entry: usize) -> bool {
        self.entries[entry].is_array
    }

    /// Returns `true` if no instruction reads the entry's value.
    #[must_use]
    pub fn has_no_data_dependence(&self, entry: usize) -> bool {
        self.entries[entry].is_alone
    }

    /// Returns `true` if the entry's value comes from a formal parameter.
    #[must_use]
    pub fn is_parameter(&self, entry: usize) -> bool {
        self.entries[entry].defs.contains(&Def::Entry)
    }

    /// Finds the entry whose def-use chains involve the instruction.
    #[must_use]
    pub fn find_entry_for_instruction(&self, index: u32) -> Option<usize> {
        self.entries.iter().position(|entry| entry.contains(index))
    }
}

/// Marks entries flowing reference or array values, judging by the
/// instructions on the edge.
fn check_value_kind(entry: &mut Entry, edge: &DataFlowEdge, body: &MethodBody) {
    if matches!(
        body.instructions.get(edge.destination as usize),
        Some(Instruction::Load { kind: ValueKind::Reference, .. })
    ) {
        entry.is_object = true;
    }
    if let Def::Insn(source) = edge.source {
        match body.instructions.get(source as usize) {
            Some(Instruction::Store { kind: ValueKind::Reference, .. }) => {
                entry.is_object = true;
            }
            Some(
                Instruction::ArrayLoad { kind: ValueKind::Reference }
                | Instruction::ArrayStore { kind: ValueKind::Reference },
            ) if edge.operand_index == 0 => {
                entry.is_array = true;
            }
            _ => {}
        }
    }
}
