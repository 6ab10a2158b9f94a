//! Instructions and method bodies.
//!
//! The instruction set models the shapes the analyses need: stack effects,
//! local variable accesses, control transfers, allocations, field accesses,
//! and invocations. Opcodes that only differ in arithmetic detail are folded
//! into [`Instruction::Compute`].

use crate::jvm::references::{FieldRef, MethodRef};

/// The kind of value an instruction produces or consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `int` and the smaller integral types.
    Int,
    /// `long`.
    Long,
    /// `float`.
    Float,
    /// `double`.
    Double,
    /// A class or array reference.
    Reference,
}

impl ValueKind {
    /// The number of words a value of this kind occupies.
    #[must_use]
    pub const fn width(self) -> u8 {
        match self {
            ValueKind::Long | ValueKind::Double => 2,
            ValueKind::Int | ValueKind::Float | ValueKind::Reference => 1,
        }
    }
}

/// Untyped operand stack manipulations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum StackOp {
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
}

/// The dispatch kind of an invocation instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum InvokeKind {
    /// `invokestatic`.
    Static,
    /// `invokespecial` (constructors, private methods, `super` calls).
    Special,
    /// `invokevirtual`.
    Virtual,
    /// `invokeinterface`.
    Interface,
}

impl InvokeKind {
    /// Returns `true` if the callee is bound without dynamic dispatch.
    #[must_use]
    pub const fn is_static_or_special(self) -> bool {
        matches!(self, InvokeKind::Static | InvokeKind::Special)
    }
}

/// A bytecode instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// No effect.
    Nop,
    /// Pushes a constant of the given width.
    Push {
        /// The word count of the constant (1 or 2).
        width: u8,
    },
    /// Loads a local variable onto the stack.
    Load {
        /// The local variable slot.
        slot: u16,
        /// The kind of the loaded value.
        kind: ValueKind,
    },
    /// Pops a value into a local variable.
    Store {
        /// The local variable slot.
        slot: u16,
        /// The kind of the stored value.
        kind: ValueKind,
    },
    /// Increments an `int` local variable in place.
    Increment {
        /// The local variable slot.
        slot: u16,
    },
    /// Loads an element from an array.
    ArrayLoad {
        /// The kind of the loaded element.
        kind: ValueKind,
    },
    /// Stores an element into an array.
    ArrayStore {
        /// The kind of the stored element.
        kind: ValueKind,
    },
    /// An untyped stack manipulation.
    Stack(StackOp),
    /// Arithmetic, comparison, conversion, and other computations without
    /// analysis-relevant structure.
    Compute {
        /// The number of stack operands consumed.
        pops: u8,
        /// The result kind, if the computation produces a value.
        result: Option<ValueKind>,
    },
    /// Reads a field.
    GetField {
        /// The referenced field.
        field: FieldRef,
        /// `true` for `getstatic`.
        is_static: bool,
    },
    /// Writes a field.
    PutField {
        /// The referenced field.
        field: FieldRef,
        /// `true` for `putstatic`.
        is_static: bool,
    },
    /// Invokes a method.
    Invoke {
        /// The referenced method.
        target: MethodRef,
        /// The dispatch kind.
        kind: InvokeKind,
    },
    /// Allocates an object.
    New {
        /// The binary name of the instantiated class.
        class_name: String,
    },
    /// Allocates a reference array. Primitive array allocations are modeled
    /// as [`Instruction::Compute`].
    NewArray {
        /// The element type name. May itself carry `[]` suffixes.
        element: String,
        /// The number of dimension counts popped from the stack.
        dimensions: u8,
    },
    /// Checks and narrows the type of the top of the stack.
    CheckCast {
        /// The binary name of the target type.
        class_name: String,
    },
    /// Unconditional jump.
    Goto {
        /// The target instruction index.
        target: u32,
    },
    /// Conditional branch falling through to the next instruction.
    Branch {
        /// The target instruction index.
        target: u32,
        /// The number of values the comparison consumes (1 or 2).
        pops: u8,
    },
    /// `tableswitch` / `lookupswitch`.
    Switch {
        /// The case targets.
        targets: Vec<u32>,
        /// The default target.
        default: u32,
    },
    /// Returns from the method.
    Return {
        /// The kind of the returned value. `None` for `void`.
        kind: Option<ValueKind>,
    },
    /// Throws the exception on top of the stack.
    Throw,
}

/// The range of instructions protected by an exception handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// The first protected instruction index (inclusive).
    pub start: u32,
    /// The end of the protected range (exclusive).
    pub end: u32,
    /// The instruction index of the handler entry.
    pub handler: u32,
    /// The caught class name. `None` catches everything (`finally`).
    pub catch_type: Option<String>,
}

/// Debug metadata for a local variable, from the class file's
/// `LocalVariableTable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariableInfo {
    /// The local variable slot.
    pub slot: u16,
    /// The source-level variable name.
    pub name: String,
    /// The variable's field descriptor.
    pub descriptor: String,
    /// The first instruction index at which the variable is in scope.
    pub start: u32,
    /// The end of the scope (exclusive).
    pub end: u32,
}

/// The body of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// The instruction sequence.
    pub instructions: Vec<Instruction>,
    /// The exception handler table.
    pub exception_handlers: Vec<ExceptionHandler>,
    /// Local variable debug metadata. May be empty.
    pub local_variables: Vec<LocalVariableInfo>,
    /// The size of the local variable table.
    pub max_locals: u16,
    /// The maximum operand stack depth.
    pub max_stack: u16,
}

impl MethodBody {
    /// The number of instructions in the body.
    #[must_use]
    #[expect(clippy::cast_possible_truncation)]
    pub fn instruction_count(&self) -> u32 {
        self.instructions.len() as u32
    }
}
