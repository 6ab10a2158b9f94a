//! Abstract execution frames for the reaching-definitions analysis.

use crate::analysis::data_flow::{Def, DefSet, ExecutionError};
use crate::analysis::fixed_point::FixedPointFact;
use crate::jvm::code::{Instruction, StackOp, ValueKind};
use crate::types::{JvmType, parse_field_descriptor, MethodDescriptor};

/// The abstract state before an instruction: one [`DefSet`] per local
/// variable slot and per operand stack value.
///
/// The stack is value based: a wide value occupies one stack entry with
/// width 2. In the local table a wide value occupies its first slot; the
/// second slot holds an empty placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    locals: Vec<DefSet>,
    stack: Vec<DefSet>,
    max_stack: u16,
}

impl Frame {
    /// Builds the frame at method entry. Every parameter is defined by the
    /// caller, modeled as [`Def::Entry`].
    #[must_use]
    pub fn entry(parameters: &[JvmType], max_locals: u16, max_stack: u16) -> Self {
        let mut locals = vec![DefSet::empty(1); max_locals as usize];
        let mut slot = 0usize;
        for parameter in parameters {
            if slot >= locals.len() {
                break;
            }
            locals[slot] = DefSet::single(parameter.width, Def::Entry);
            slot += parameter.width as usize;
        }
        Self { locals, stack: Vec::new(), max_stack }
    }

    /// The definitions reaching local variable `slot`.
    #[must_use]
    pub fn local(&self, slot: u16) -> Option<&DefSet> {
        self.locals.get(slot as usize)
    }

    /// The operand stack, bottom first.
    #[must_use]
    pub fn stack(&self) -> &[DefSet] {
        &self.stack
    }

    /// The frame entering an exception handler: locals are kept, the stack
    /// holds only the caught exception, whose producer is unknown.
    #[must_use]
    pub fn exception_frame(&self) -> Self {
        Self {
            locals: self.locals.clone(),
            stack: vec![DefSet::single(1, Def::Entry)],
            max_stack: self.max_stack,
        }
    }

    fn slot_count(&self) -> u32 {
        self.stack.iter().map(|it| u32::from(it.width())).sum()
    }

    fn push(&mut self, value: DefSet) -> Result<(), ExecutionError> {
        if self.slot_count() + u32::from(value.width()) > u32::from(self.max_stack) {
            return Err(ExecutionError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<DefSet, ExecutionError> {
        self.stack.pop().ok_or(ExecutionError::StackUnderflow)
    }

    fn pop_width(&mut self, width: u8) -> Result<DefSet, ExecutionError> {
        let value = self.pop()?;
        if value.width() != width {
            return Err(ExecutionError::ValueMismatch);
        }
        Ok(value)
    }

    fn pop_many(&mut self, count: usize) -> Result<(), ExecutionError> {
        for _ in 0..count {
            self.pop()?;
        }
        Ok(())
    }

    fn set_local(&mut self, slot: u16, value: DefSet) -> Result<(), ExecutionError> {
        let slot = slot as usize;
        let width = value.width() as usize;
        if slot + width > self.locals.len() {
            return Err(ExecutionError::LocalLimitExceeded);
        }
        if width == 2 {
            self.locals[slot + 1] = DefSet::empty(1);
        }
        self.locals[slot] = value;
        // Overwriting the upper half of a wide value invalidates it.
        if slot > 0 && self.locals[slot - 1].width() == 2 {
            self.locals[slot - 1] = DefSet::empty(1);
        }
        Ok(())
    }

    fn execute_stack_op(&mut self, op: StackOp) -> Result<(), ExecutionError> {
        match op {
            StackOp::Pop => {
                self.pop_width(1)?;
            }
            StackOp::Pop2 => {
                let top = self.pop()?;
                if top.width() == 1 {
                    self.pop_width(1)?;
                }
            }
            StackOp::Dup => {
                let top = self.pop_width(1)?;
                self.push(top.clone())?;
                self.push(top)?;
            }
            StackOp::DupX1 => {
                let v1 = self.pop_width(1)?;
                let v2 = self.pop_width(1)?;
                self.push(v1.clone())?;
                self.push(v2)?;
                self.push(v1)?;
            }
            StackOp::DupX2 => {
                let v1 = self.pop_width(1)?;
                let v2 = self.pop()?;
                if v2.width() == 2 {
                    self.push(v1.clone())?;
                    self.push(v2)?;
                    self.push(v1)?;
                } else {
                    let v3 = self.pop_width(1)?;
                    self.push(v1.clone())?;
                    self.push(v3)?;
                    self.push(v2)?;
                    self.push(v1)?;
                }
            }
            StackOp::Dup2 => {
                let v1 = self.pop()?;
                if v1.width() == 2 {
                    self.push(v1.clone())?;
                    self.push(v1)?;
                } else {
                    let v2 = self.pop_width(1)?;
                    self.push(v2.clone())?;
                    self.push(v1.clone())?;
                    self.push(v2)?;
                    self.push(v1)?;
                }
            }
            StackOp::Dup2X1 => {
                let v1 = self.pop()?;
                if v1.width() == 2 {
                    let v2 = self.pop_width(1)?;
                    self.push(v1.clone())?;
                    self.push(v2)?;
                    self.push(v1)?;
                } else {
                    let v2 = self.pop_width(1)?;
                    let v3 = self.pop_width(1)?;
                    self.push(v2.clone())?;
                    self.push(v1.clone())?;
                    self.push(v3)?;
                    self.push(v2)?;
                    self.push(v1)?;
                }
            }
            StackOp::Dup2X2 => {
                let v1 = self.pop()?;
                if v1.width() == 2 {
                    let v2 = self.pop()?;
                    if v2.width() == 2 {
                        self.push(v1.clone())?;
                        self.push(v2)?;
                        self.push(v1)?;
                    } else {
                        let v3 = self.pop_width(1)?;
                        self.push(v1.clone())?;
                        self.push(v3)?;
                        self.push(v2)?;
                        self.push(v1)?;
                    }
                } else {
                    let v2 = self.pop_width(1)?;
                    let v3 = self.pop()?;
                    if v3.width() == 2 {
                        self.push(v2.clone())?;
                        self.push(v1.clone())?;
                        self.push(v3)?;
                        self.push(v2)?;
                        self.push(v1)?;
                    } else {
                        let v4 = self.pop_width(1)?;
                        self.push(v2.clone())?;
                        self.push(v1.clone())?;
                        self.push(v4)?;
                        self.push(v3)?;
                        self.push(v2)?;
                        self.push(v1)?;
                    }
                }
            }
            StackOp::Swap => {
                let v1 = self.pop_width(1)?;
                let v2 = self.pop_width(1)?;
                self.push(v1)?;
                self.push(v2)?;
            }
        }
        Ok(())
    }

    /// Executes the instruction at `index`, returning the frame entering
    /// its non-exceptional successors.
    ///
    /// Instructions that produce a value push a fresh definition at
    /// `index`; loads and stores do too, so that def-use chains through
    /// locals remain two-step (store to load, load to consumer).
    ///
    /// # Errors
    /// Fails on stack or local table violations and on malformed
    /// descriptors in field and method references.
    pub fn execute(&self, index: u32, instruction: &Instruction) -> Result<Self, ExecutionError> {
        let mut next = self.clone();
        let def = |width: u8| DefSet::single(width, Def::Insn(index));
        match instruction {
            Instruction::Nop | Instruction::Goto { .. } => {}
            Instruction::Push { width } => {
                next.push(def(*width))?;
            }
            Instruction::Load { kind, .. } => {
                next.push(def(kind.width()))?;
            }
            Instruction::Store { slot, kind } => {
                next.pop()?;
                next.set_local(*slot, def(kind.width()))?;
            }
            Instruction::Increment { slot } => {
                next.set_local(*slot, def(1))?;
            }
            Instruction::ArrayLoad { kind } => {
                next.pop_many(2)?;
                next.push(def(kind.width()))?;
            }
            Instruction::ArrayStore { .. } => {
                next.pop_many(3)?;
            }
            Instruction::Stack(op) => {
                next.execute_stack_op(*op)?;
            }
            Instruction::Compute { pops, result } => {
                next.pop_many(*pops as usize)?;
                if let Some(kind) = result {
                    next.push(def(kind.width()))?;
                }
            }
            Instruction::GetField { field, is_static } => {
                if !is_static {
                    next.pop()?;
                }
                let field_type = parse_field_descriptor(&field.descriptor)?;
                next.push(def(field_type.width))?;
            }
            Instruction::PutField { is_static, .. } => {
                next.pop()?;
                if !is_static {
                    next.pop()?;
                }
            }
            Instruction::Invoke { target, kind } => {
                let descriptor: MethodDescriptor = target.descriptor.parse()?;
                let receiver = usize::from(*kind != crate::jvm::code::InvokeKind::Static);
                next.pop_many(descriptor.parameters.len() + receiver)?;
                if let Some(return_type) = &descriptor.return_type {
                    next.push(def(return_type.width))?;
                }
            }
            Instruction::New { .. } => {
                next.push(def(1))?;
            }
            Instruction::NewArray { dimensions, .. } => {
                next.pop_many(*dimensions as usize)?;
                next.push(def(1))?;
            }
            Instruction::CheckCast { .. } => {
                next.pop()?;
                next.push(def(1))?;
            }
            Instruction::Branch { pops, .. } => {
                next.pop_many(*pops as usize)?;
            }
            Instruction::Switch { .. } => {
                next.pop()?;
            }
            Instruction::Return { kind } => {
                if kind.is_some() {
                    next.pop()?;
                }
            }
            Instruction::Throw => {
                next.pop()?;
            }
        }
        Ok(next)
    }
}

impl FixedPointFact for Frame {
    type MergeError = ExecutionError;

    fn merge(&self, other: &Self) -> Result<Self, ExecutionError> {
        if self.stack.len() != other.stack.len() {
            return Err(ExecutionError::StackSizeMismatch);
        }
        let locals = self
            .locals
            .iter()
            .zip(&other.locals)
            .map(|(a, b)| a.merge(b))
            .collect();
        let stack = self
            .stack
            .iter()
            .zip(&other.stack)
            .map(|(a, b)| a.merge(b))
            .collect();
        Ok(Self { locals, stack, max_stack: self.max_stack })
    }
}
