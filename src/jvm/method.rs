//! Methods of a class.

use bitflags::bitflags;

use crate::jvm::code::{Instruction, MethodBody};
use crate::jvm::references::{CallSite, FieldAccess, MethodId};
use crate::types::{InvalidDescriptor, JvmType, MethodDescriptor};

bitflags! {
    /// The access modifiers of a [`Method`].
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct MethodAccessFlags: u16 {
        /// Declared `public`; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared `private`; accessible only within the defining class.
        const PRIVATE = 0x0002;
        /// Declared `protected`; may be accessed within subclasses.
        const PROTECTED = 0x0004;
        /// Declared `static`.
        const STATIC = 0x0008;
        /// Declared `final`; must not be overridden.
        const FINAL = 0x0010;
        /// Declared `synchronized`; invocation is wrapped by a monitor use.
        const SYNCHRONIZED = 0x0020;
        /// A bridge method generated by the compiler.
        const BRIDGE = 0x0040;
        /// Declared with a variable number of arguments.
        const VARARGS = 0x0080;
        /// Declared `native`; implemented in a language other than Java.
        const NATIVE = 0x0100;
        /// Declared `abstract`; no implementation is provided.
        const ABSTRACT = 0x0400;
        /// In a class file of version 46 through 60, declared `strictfp`.
        const STRICT = 0x0800;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
    }
}

/// A method declared by a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    /// The access modifiers of the method.
    pub access_flags: MethodAccessFlags,
    /// The method name.
    pub name: String,
    /// The method descriptor.
    pub descriptor: String,
    /// The generic signature, if any.
    pub signature: Option<String>,
    /// The method body. `None` for abstract and native methods.
    pub body: Option<MethodBody>,
}

impl Method {
    /// The name of constructors.
    pub const CONSTRUCTOR_NAME: &'static str = "<init>";
    /// The name of static initializer blocks.
    pub const CLASS_INITIALIZER_NAME: &'static str = "<clinit>";

    /// Returns `true` if the method has a body.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Returns `true` if the method is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Returns `true` if the method is private.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::PRIVATE)
    }

    /// Returns `true` if the method has default (package) visibility.
    #[must_use]
    pub fn is_package_private(&self) -> bool {
        !self.access_flags.intersects(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::PRIVATE | MethodAccessFlags::PROTECTED,
        )
    }

    /// Returns `true` if the method is a constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == Method::CONSTRUCTOR_NAME
    }

    /// Returns `true` if a subclass declaration with the same signature
    /// overrides this method.
    #[must_use]
    pub fn is_overridable(&self) -> bool {
        !self.is_private() && !self.is_static() && !self.is_constructor()
    }

    /// Parses the method descriptor.
    ///
    /// # Errors
    /// Returns [`InvalidDescriptor`] if the descriptor is malformed.
    pub fn parsed_descriptor(&self) -> Result<MethodDescriptor, InvalidDescriptor> {
        self.descriptor.parse()
    }

    /// Returns the parameter types of the method. For instance methods the
    /// receiver is included at position zero, typed as the owning class.
    ///
    /// # Errors
    /// Returns [`InvalidDescriptor`] if the descriptor is malformed.
    pub fn param_types(&self, owner: &str) -> Result<Vec<JvmType>, InvalidDescriptor> {
        let descriptor = self.parsed_descriptor()?;
        let mut params = Vec::with_capacity(descriptor.parameters.len() + 1);
        if !self.is_static() {
            params.push(JvmType::reference(owner));
        }
        params.extend(descriptor.parameters);
        Ok(params)
    }

    /// Returns the return type. `None` for `void`.
    ///
    /// # Errors
    /// Returns [`InvalidDescriptor`] if the descriptor is malformed.
    pub fn return_type(&self) -> Result<Option<JvmType>, InvalidDescriptor> {
        Ok(self.parsed_descriptor()?.return_type)
    }

    /// Lists the invocation instructions in the method body.
    #[must_use]
    #[expect(clippy::cast_possible_truncation)]
    pub fn call_sites(&self, id: MethodId) -> Vec<CallSite> {
        let Some(body) = &self.body else {
            return Vec::new();
        };
        body.instructions
            .iter()
            .enumerate()
            .filter_map(|(index, insn)| match insn {
                Instruction::Invoke { target, kind } => Some(CallSite {
                    owner: id,
                    instruction_index: index as u32,
                    class_name: target.owner.clone(),
                    method_name: target.name.clone(),
                    descriptor: target.descriptor.clone(),
                    kind: *kind,
                }),
                _ => None,
            })
            .collect()
    }

    /// Lists the field access instructions in the method body.
    #[must_use]
    pub fn field_accesses(&self) -> Vec<FieldAccess> {
        let Some(body) = &self.body else {
            return Vec::new();
        };
        body.instructions
            .iter()
            .filter_map(|insn| match insn {
                Instruction::GetField { field, is_static } => Some(FieldAccess::get(
                    field.owner.clone(),
                    field.name.clone(),
                    field.descriptor.clone(),
                    *is_static,
                )),
                Instruction::PutField { field, is_static } => Some(FieldAccess::put(
                    field.owner.clone(),
                    field.name.clone(),
                    field.descriptor.clone(),
                    *is_static,
                )),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, flags: MethodAccessFlags) -> Method {
        Method {
            access_flags: flags,
            name: name.to_owned(),
            descriptor: "()V".to_owned(),
            signature: None,
            body: None,
        }
    }

    #[test]
    fn overridability() {
        assert!(method("m", MethodAccessFlags::PUBLIC).is_overridable());
        assert!(!method("m", MethodAccessFlags::PRIVATE).is_overridable());
        assert!(!method("m", MethodAccessFlags::STATIC).is_overridable());
        assert!(!method(Method::CONSTRUCTOR_NAME, MethodAccessFlags::PUBLIC).is_overridable());
    }

    #[test]
    fn package_visibility() {
        assert!(method("m", MethodAccessFlags::empty()).is_package_private());
        assert!(!method("m", MethodAccessFlags::PROTECTED).is_package_private());
    }

    #[test]
    fn receiver_is_prepended_for_instance_methods() {
        let mut m = method("m", MethodAccessFlags::PUBLIC);
        m.descriptor = "(I)V".to_owned();
        let params = m.param_types("com/example/A").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "com/example/A");
        assert_eq!(params[1].name, "int");

        m.access_flags |= MethodAccessFlags::STATIC;
        assert_eq!(m.param_types("com/example/A").unwrap().len(), 1);
    }
}
