//! The in-memory model of a JVM program.
//!
//! This module defines the classes, methods, fields, and instructions the
//! analyses consume. A bytecode front end populates these structures; the
//! crate itself does not parse class files.

pub mod class;
pub mod code;
pub mod field;
pub mod method;
pub mod references;

pub use class::{Class, ClassAccessFlags, ClassLabel};
pub use field::{Field, FieldAccessFlags};
pub use method::{Method, MethodAccessFlags};
