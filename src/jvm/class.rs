//! Classes and interfaces of a program.

use bitflags::bitflags;

use crate::jvm::field::Field;
use crate::jvm::method::Method;

bitflags! {
    /// The access modifiers of a [`Class`].
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct ClassAccessFlags: u16 {
        /// Declared `public`; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared `final`; no subclasses allowed.
        const FINAL = 0x0010;
        /// Treat superclass methods specially when invoked by the
        /// `invokespecial` instruction.
        const SUPER = 0x0020;
        /// Is an interface, not a class.
        const INTERFACE = 0x0200;
        /// Declared `abstract`; must not be instantiated.
        const ABSTRACT = 0x0400;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface.
        const ANNOTATION = 0x2000;
        /// Declared as an `enum` class.
        const ENUM = 0x4000;
        /// Is a module, not a class or interface.
        const MODULE = 0x8000;
    }
}

/// Whether a class belongs to the program under analysis or to its
/// surrounding runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassLabel {
    /// Part of the program under analysis.
    Application,
    /// Part of the runtime or a dependency.
    Library,
}

/// A class or interface.
#[derive(Debug, Clone)]
pub struct Class {
    /// The access modifiers of the class.
    pub access_flags: ClassAccessFlags,
    /// The binary name of the class (e.g. `java/lang/String`).
    pub binary_name: String,
    /// The binary name of the superclass. `None` for `java/lang/Object`
    /// and for module info.
    pub super_class: Option<String>,
    /// The binary names of the directly implemented interfaces.
    pub interfaces: Vec<String>,
    /// The declared fields.
    pub fields: Vec<Field>,
    /// The declared methods.
    pub methods: Vec<Method>,
    /// Whether the class is part of the analyzed program.
    pub label: ClassLabel,
    /// A content digest of the originating class file, if known.
    pub digest: Option<String>,
}

impl Class {
    /// Returns `true` if the class is an interface.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// Returns the package part of the binary name. The empty string for
    /// classes in the default package.
    #[must_use]
    pub fn package_name(&self) -> &str {
        match self.binary_name.rfind('/') {
            Some(pos) => &self.binary_name[..pos],
            None => "",
        }
    }

    /// Looks up a declared method by name and descriptor.
    #[must_use]
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.methods
            .iter()
            .position(|it| it.name == name && it.descriptor == descriptor)
    }

    /// Looks up a declared field by name and descriptor.
    #[must_use]
    pub fn find_field(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|it| it.name == name && it.descriptor == descriptor)
    }

    /// Returns the declared method by name and descriptor, if any.
    #[must_use]
    pub fn get_method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.find_method(name, descriptor).map(|idx| &self.methods[idx])
    }
}

/// Returns the package part of a binary class name.
#[must_use]
pub(crate) fn package_of(binary_name: &str) -> &str {
    match binary_name.rfind('/') {
        Some(pos) => &binary_name[..pos],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_names() {
        assert_eq!(package_of("java/lang/String"), "java/lang");
        assert_eq!(package_of("TopLevel"), "");
    }
}
