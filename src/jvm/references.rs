//! References to JVM elements.
//!
//! Registered classes, methods, and fields are identified by dense indices
//! into the class hierarchy's arenas. Unresolved references inside
//! instructions carry owner, name, and descriptor strings.

use crate::jvm::code::InvokeKind;

/// A dense identifier of a registered class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("class#{_0}")]
pub struct ClassId(pub u32);

/// A dense identifier of a method of a registered class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodId {
    /// The class declaring the method.
    pub class: ClassId,
    /// The position of the method in the class's method list.
    pub index: u16,
}

/// A dense identifier of a field of a registered class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId {
    /// The class declaring the field.
    pub class: ClassId,
    /// The position of the field in the class's field list.
    pub index: u16,
}

/// A reference to a method as it appears in an invocation instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{owner}.{name}{descriptor}")]
pub struct MethodRef {
    /// The binary name of the class the instruction names.
    pub owner: String,
    /// The method name.
    pub name: String,
    /// The method descriptor.
    pub descriptor: String,
}

/// A reference to a field as it appears in a field access instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{owner}.{name}:{descriptor}")]
pub struct FieldRef {
    /// The binary name of the class the instruction names.
    pub owner: String,
    /// The field name.
    pub name: String,
    /// The field descriptor.
    pub descriptor: String,
}

/// An invocation instruction occurring in a method body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// The method containing the invocation.
    pub owner: MethodId,
    /// The position of the invocation in the method body.
    pub instruction_index: u32,
    /// The binary name of the callee's class as named by the instruction.
    pub class_name: String,
    /// The callee's method name.
    pub method_name: String,
    /// The callee's method descriptor.
    pub descriptor: String,
    /// The invocation kind.
    pub kind: InvokeKind,
}

impl CallSite {
    /// Returns `true` if the callee is bound statically, i.e. the call is
    /// not a virtual dispatch.
    #[must_use]
    pub fn is_static_or_special(&self) -> bool {
        self.kind.is_static_or_special()
    }

    /// Returns `true` if the invocation calls a static method.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.kind == InvokeKind::Static
    }
}

/// A field access instruction occurring in a method body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldAccess {
    /// The binary name of the class the instruction names.
    pub class_name: String,
    /// The field name.
    pub field_name: String,
    /// The field descriptor.
    pub descriptor: String,
    /// Whether the accessed field is static.
    pub is_static: bool,
    /// `true` for a load of the field, `false` for a store.
    pub is_get: bool,
}

impl FieldAccess {
    /// Creates a [`FieldAccess`] representing a field load.
    #[must_use]
    pub fn get(class_name: String, field_name: String, descriptor: String, is_static: bool) -> Self {
        FieldAccess {
            class_name,
            field_name,
            descriptor,
            is_static,
            is_get: true,
        }
    }

    /// Creates a [`FieldAccess`] representing a field store.
    #[must_use]
    pub fn put(class_name: String, field_name: String, descriptor: String, is_static: bool) -> Self {
        FieldAccess {
            class_name,
            field_name,
            descriptor,
            is_static,
            is_get: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_method_ref() {
        let method = MethodRef {
            owner: "java/util/List".to_owned(),
            name: "add".to_owned(),
            descriptor: "(Ljava/lang/Object;)Z".to_owned(),
        };
        assert_eq!(method.to_string(), "java/util/List.add(Ljava/lang/Object;)Z");
    }

    #[test]
    fn ids_order_by_class_then_index() {
        let a = MethodId {
            class: ClassId(1),
            index: 5,
        };
        let b = MethodId {
            class: ClassId(2),
            index: 0,
        };
        assert!(a < b);
    }
}
