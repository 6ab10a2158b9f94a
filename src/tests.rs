//! Shared fixtures for the unit tests: small synthetic classes and a
//! helper to assemble them into a frozen hierarchy.

use crate::analysis::hierarchy::ClassHierarchy;
use crate::jvm::code::{Instruction, InvokeKind, MethodBody, ValueKind};
use crate::jvm::references::{CallSite, MethodId, MethodRef};
use crate::jvm::{
    Class, ClassAccessFlags, ClassLabel, Method, MethodAccessFlags,
};

pub(crate) fn class(
    name: &str,
    super_class: &str,
    interfaces: &[&str],
    methods: Vec<Method>,
) -> Class {
    Class {
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        binary_name: name.to_owned(),
        super_class: Some(super_class.to_owned()),
        interfaces: interfaces.iter().map(|&it| it.to_owned()).collect(),
        fields: Vec::new(),
        methods,
        label: ClassLabel::Application,
        digest: None,
    }
}

pub(crate) fn interface(name: &str, methods: Vec<Method>) -> Class {
    let mut result = class(name, "java/lang/Object", &[], methods);
    result.access_flags =
        ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
    result
}

pub(crate) fn method(
    name: &str,
    descriptor: &str,
    access_flags: MethodAccessFlags,
    body: Option<MethodBody>,
) -> Method {
    Method {
        access_flags,
        name: name.to_owned(),
        descriptor: descriptor.to_owned(),
        signature: None,
        body,
    }
}

/// A public method with a body that just returns.
pub(crate) fn concrete(name: &str, descriptor: &str) -> Method {
    method(name, descriptor, MethodAccessFlags::PUBLIC, Some(trivial_body()))
}

/// A public abstract method.
pub(crate) fn abstract_method(name: &str, descriptor: &str) -> Method {
    method(
        name,
        descriptor,
        MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
        None,
    )
}

pub(crate) fn trivial_body() -> MethodBody {
    body(vec![Instruction::Return { kind: None }], 4, 0)
}

pub(crate) fn body(instructions: Vec<Instruction>, max_locals: u16, max_stack: u16) -> MethodBody {
    MethodBody {
        instructions,
        exception_handlers: Vec::new(),
        local_variables: Vec::new(),
        max_locals,
        max_stack,
    }
}

pub(crate) fn invoke(kind: InvokeKind, owner: &str, name: &str, descriptor: &str) -> Instruction {
    Instruction::Invoke {
        target: MethodRef {
            owner: owner.to_owned(),
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
        },
        kind,
    }
}

pub(crate) fn aload(slot: u16) -> Instruction {
    Instruction::Load { slot, kind: ValueKind::Reference }
}

pub(crate) fn astore(slot: u16) -> Instruction {
    Instruction::Store { slot, kind: ValueKind::Reference }
}

/// Registers the classes and freezes the hierarchy.
pub(crate) fn hierarchy(classes: Vec<Class>) -> ClassHierarchy {
    let mut result = ClassHierarchy::new();
    for class in classes {
        result.register_class(class).unwrap();
    }
    result.freeze();
    result
}

pub(crate) fn method_id(
    hierarchy: &ClassHierarchy,
    class_name: &str,
    method_name: &str,
    descriptor: &str,
) -> MethodId {
    let class = hierarchy.class_id(class_name).unwrap();
    let index = hierarchy
        .class_by_id(class)
        .find_method(method_name, descriptor)
        .unwrap();
    MethodId { class, index: u16::try_from(index).unwrap() }
}

/// Renders resolved targets as `Class.method` strings, sorted.
pub(crate) fn target_names(hierarchy: &ClassHierarchy, targets: &[MethodId]) -> Vec<String> {
    let mut names: Vec<String> = targets
        .iter()
        .map(|&id| {
            let class = &hierarchy.class_by_id(id.class).binary_name;
            let method = &hierarchy.method_by_id(id).name;
            format!("{class}.{method}")
        })
        .collect();
    names.sort();
    names
}

/// The call site at `instruction_index` of the named method.
pub(crate) fn call_site_at(
    hierarchy: &ClassHierarchy,
    class_name: &str,
    method_name: &str,
    descriptor: &str,
    instruction_index: u32,
) -> CallSite {
    let id = method_id(hierarchy, class_name, method_name, descriptor);
    hierarchy
        .method_by_id(id)
        .call_sites(id)
        .into_iter()
        .find(|cs| cs.instruction_index == instruction_index)
        .unwrap()
}
