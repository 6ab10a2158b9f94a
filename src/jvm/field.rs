//! Fields of a class.

use bitflags::bitflags;

use crate::types::{self, InvalidDescriptor};

bitflags! {
    /// The access modifiers of a [`Field`].
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct FieldAccessFlags: u16 {
        /// Declared `public`; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared `private`; accessible only within the defining class.
        const PRIVATE = 0x0002;
        /// Declared `protected`; may be accessed within subclasses.
        const PROTECTED = 0x0004;
        /// Declared `static`.
        const STATIC = 0x0008;
        /// Declared `final`; never directly assigned to after construction.
        const FINAL = 0x0010;
        /// Declared `volatile`; cannot be cached.
        const VOLATILE = 0x0040;
        /// Declared `transient`; not written or read by a persistent object manager.
        const TRANSIENT = 0x0080;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
        /// Declared as an element of an enum class.
        const ENUM = 0x4000;
    }
}

/// A field declared by a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// The access modifiers of the field.
    pub access_flags: FieldAccessFlags,
    /// The field name.
    pub name: String,
    /// The field descriptor.
    pub descriptor: String,
    /// The generic signature, if any.
    pub signature: Option<String>,
}

impl Field {
    /// Returns `true` if the field is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }

    /// Returns the type name of the field.
    ///
    /// # Errors
    /// Returns [`InvalidDescriptor`] if the descriptor is malformed.
    pub fn type_name(&self) -> Result<String, InvalidDescriptor> {
        types::type_name(&self.descriptor)
    }
}
