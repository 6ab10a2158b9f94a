//! The class hierarchy and Class Hierarchy Analysis resolution.
//!
//! A [`ClassHierarchy`] is populated by registering [`Class`] values, then
//! frozen before analysis. Queries tolerate classes that were never
//! registered (library classes, typically); the names of such classes are
//! recorded and available from [`ClassHierarchy::requested_classes`].

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};

use thiserror::Error;

use crate::jvm::references::{CallSite, ClassId, FieldAccess, FieldId, MethodId};
use crate::jvm::{Class, Method};
use crate::types::is_array_type_name;

const JAVA_LANG_OBJECT: &str = "java/lang/Object";
const NO_INTERFACES: &[String] = &[];

/// A modification was attempted after [`ClassHierarchy::freeze`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the class hierarchy is frozen")]
pub struct FrozenHierarchyError;

/// A registry of classes with their inheritance relations.
#[derive(Debug, Default)]
pub struct ClassHierarchy {
    classes: Vec<Class>,
    by_name: HashMap<String, ClassId>,
    parent_class: HashMap<String, Option<String>>,
    parent_interfaces: HashMap<String, Vec<String>>,
    subtypes: HashMap<String, BTreeSet<String>>,
    requested: RefCell<BTreeSet<String>>,
    frozen: bool,
}

impl ClassHierarchy {
    /// Creates an empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class together with its inheritance relations.
    ///
    /// # Errors
    /// Fails if the hierarchy is frozen.
    pub fn register_class(&mut self, class: Class) -> Result<ClassId, FrozenHierarchyError> {
        if self.frozen {
            return Err(FrozenHierarchyError);
        }
        #[expect(clippy::cast_possible_truncation)]
        let id = ClassId(self.classes.len() as u32);
        let name = class.binary_name.clone();
        let super_class = class.super_class.clone();
        let interfaces = class.interfaces.clone();
        self.by_name.insert(name.clone(), id);
        self.classes.push(class);
        self.register_super_class(&name, super_class.as_deref())?;
        if let Some(parent) = &super_class {
            self.register_subtype(&name, parent)?;
        }
        self.register_interfaces(&name, interfaces.clone())?;
        for interface in &interfaces {
            self.register_subtype(&name, interface)?;
        }
        Ok(id)
    }

    /// Records the superclass relation of a class. Intended for manual
    /// adjustments of the hierarchy.
    ///
    /// # Errors
    /// Fails if the hierarchy is frozen.
    pub fn register_super_class(
        &mut self,
        class_name: &str,
        super_class: Option<&str>,
    ) -> Result<(), FrozenHierarchyError> {
        if self.frozen {
            return Err(FrozenHierarchyError);
        }
        self.parent_class
            .insert(class_name.to_owned(), super_class.map(str::to_owned));
        Ok(())
    }

    /// Records that `class_name` is a direct subtype of `super_type`. A
    /// subtype of a class is a subclass; a subtype of an interface is an
    /// implementing class or a subinterface.
    ///
    /// # Errors
    /// Fails if the hierarchy is frozen.
    pub fn register_subtype(
        &mut self,
        class_name: &str,
        super_type: &str,
    ) -> Result<(), FrozenHierarchyError> {
        if self.frozen {
            return Err(FrozenHierarchyError);
        }
        self.subtypes
            .entry(super_type.to_owned())
            .or_default()
            .insert(class_name.to_owned());
        Ok(())
    }

    /// Records the directly implemented interfaces of a class.
    ///
    /// # Errors
    /// Fails if the hierarchy is frozen.
    pub fn register_interfaces(
        &mut self,
        class_name: &str,
        interfaces: Vec<String>,
    ) -> Result<(), FrozenHierarchyError> {
        if self.frozen {
            return Err(FrozenHierarchyError);
        }
        self.parent_interfaces.insert(class_name.to_owned(), interfaces);
        Ok(())
    }

    /// Prevents further modifications.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Returns `true` if the hierarchy has been frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn record_request(&self, class_name: &str) {
        self.requested.borrow_mut().insert(class_name.to_owned());
    }

    fn lookup(&self, class_name: &str) -> Option<ClassId> {
        let id = self.by_name.get(class_name).copied();
        if id.is_none() {
            self.record_request(class_name);
        }
        id
    }

    /// The names that were queried but never registered, in sorted order.
    #[must_use]
    pub fn requested_classes(&self) -> BTreeSet<String> {
        self.requested.borrow().clone()
    }

    /// Returns the registered class with the given binary name. A miss is
    /// recorded as a requested class.
    #[must_use]
    pub fn class(&self, class_name: &str) -> Option<&Class> {
        self.lookup(class_name).map(|id| &self.classes[id.0 as usize])
    }

    /// Returns the identifier of a registered class. A miss is recorded as
    /// a requested class.
    #[must_use]
    pub fn class_id(&self, class_name: &str) -> Option<ClassId> {
        self.lookup(class_name)
    }

    /// Returns a registered class by identifier.
    #[must_use]
    pub fn class_by_id(&self, id: ClassId) -> &Class {
        &self.classes[id.0 as usize]
    }

    /// Returns a registered method by identifier.
    #[must_use]
    pub fn method_by_id(&self, id: MethodId) -> &Method {
        &self.class_by_id(id.class).methods[id.index as usize]
    }

    /// The number of registered classes.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Iterates over the registered classes in registration order.
    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.iter()
    }

    /// Iterates over the binary names of the registered classes.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|it| it.binary_name.as_str())
    }

    /// The superclass of a class. `None` for `java/lang/Object` and for
    /// classes whose superclass was never recorded; `java/lang/Object` for
    /// array types.
    #[must_use]
    pub fn super_class_of(&self, class_name: &str) -> Option<&str> {
        if is_array_type_name(class_name) {
            return Some(JAVA_LANG_OBJECT);
        }
        match self.parent_class.get(class_name) {
            Some(parent) => parent.as_deref(),
            None => {
                self.record_request(class_name);
                None
            }
        }
    }

    /// The directly implemented interfaces of a class. For an interface,
    /// the interfaces it extends. Empty for array types and for classes
    /// without recorded interfaces.
    #[must_use]
    pub fn super_interfaces_of(&self, class_name: &str) -> &[String] {
        if is_array_type_name(class_name) {
            return NO_INTERFACES;
        }
        match self.parent_interfaces.get(class_name) {
            Some(interfaces) => interfaces,
            None => {
                if !self.by_name.contains_key(class_name) {
                    self.record_request(class_name);
                }
                NO_INTERFACES
            }
        }
    }

    /// The direct subtypes of a type, in sorted order.
    pub fn subtypes_of(&self, type_name: &str) -> impl Iterator<Item = &str> {
        if !self.by_name.contains_key(type_name) {
            self.record_request(type_name);
        }
        self.subtypes
            .get(type_name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// The transitive subtypes of the given types, the given types
    /// included.
    #[must_use]
    pub fn all_subtypes(&self, type_names: impl IntoIterator<Item = String>) -> BTreeSet<String> {
        let mut worklist: Vec<String> = type_names.into_iter().collect();
        let mut visited = BTreeSet::new();
        while let Some(type_name) = worklist.pop() {
            if !visited.insert(type_name.clone()) {
                continue;
            }
            worklist.extend(self.subtypes_of(&type_name).map(str::to_owned));
        }
        visited
    }

    /// All direct and transitive supertypes of a class, classes and
    /// interfaces alike.
    #[must_use]
    pub fn list_all_super_types(&self, class_name: &str) -> BTreeSet<String> {
        if !self.by_name.contains_key(class_name) {
            self.record_request(class_name);
        }
        let mut supertypes = BTreeSet::new();
        let mut worklist = VecDeque::from([class_name.to_owned()]);
        while let Some(name) = worklist.pop_front() {
            if let Some(super_class) = self.super_class_of(&name) {
                if supertypes.insert(super_class.to_owned()) {
                    worklist.push_back(super_class.to_owned());
                }
            }
            for interface in self.super_interfaces_of(&name) {
                if supertypes.insert(interface.clone()) {
                    worklist.push_back(interface.clone());
                }
            }
        }
        supertypes
    }

    /// Returns `true` if both classes are registered and declared in the
    /// same package.
    #[must_use]
    pub fn is_same_package(&self, first: &str, second: &str) -> bool {
        match (self.lookup(first), self.lookup(second)) {
            (Some(a), Some(b)) => {
                self.class_by_id(a).package_name() == self.class_by_id(b).package_name()
            }
            _ => false,
        }
    }

    /// Resolves the method bodies a call site may execute.
    ///
    /// Static and special invocations resolve to at most one declaration.
    /// Dynamic invocations resolve to every overriding body reachable from
    /// the declared receiver type. The result is empty if no matching
    /// declaration is found.
    #[must_use]
    pub fn resolve_call(&self, call_site: &CallSite) -> Vec<MethodId> {
        self.resolve_call_named(
            &call_site.class_name,
            &call_site.method_name,
            &call_site.descriptor,
            !call_site.is_static_or_special(),
        )
    }

    /// Resolves a call given by name. `dynamic` selects virtual dispatch.
    #[must_use]
    pub fn resolve_call_named(
        &self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
        dynamic: bool,
    ) -> Vec<MethodId> {
        if dynamic {
            self.resolve_dynamic_call(class_name, method_name, descriptor)
        } else {
            self.resolve_special_call(class_name, method_name, descriptor)
                .into_iter()
                .collect()
        }
    }

    /// Resolves a static, special, or constructor call to its single
    /// declaration, if any.
    #[must_use]
    pub fn resolve_special_call(
        &self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
    ) -> Option<MethodId> {
        self.find_declaration(class_name, method_name, descriptor)
    }

    fn resolve_dynamic_call(
        &self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
    ) -> Vec<MethodId> {
        let Some(top_decl) = self.find_declaration(class_name, method_name, descriptor) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        if self.method_by_id(top_decl).has_body() {
            result.push(top_decl);
        }

        // Arrays have no registered subtypes.
        if is_array_type_name(class_name) {
            return result;
        }

        let mut checked: BTreeSet<String> = BTreeSet::new();
        let mut worklist: Vec<String> = vec![class_name.to_owned()];
        while let Some(current) = worklist.pop() {
            if !checked.insert(current.clone()) {
                continue;
            }
            let Some(id) = self.lookup(&current) else {
                continue;
            };
            let class = self.class_by_id(id);
            let declared = class.find_method(method_name, descriptor).map(|index| {
                #[expect(clippy::cast_possible_truncation)]
                MethodId { class: id, index: index as u16 }
            });
            if let Some(method_id) = declared {
                let method = self.method_by_id(method_id);
                if method.has_body() && method_id != top_decl {
                    result.push(method_id);
                }
            }
            let overridable = match declared {
                Some(method_id) => self.method_by_id(method_id).is_overridable(),
                None => true,
            };
            if overridable {
                let package_private = declared
                    .is_some_and(|method_id| self.method_by_id(method_id).is_package_private());
                for subtype in self.subtypes_of(&current).map(str::to_owned).collect::<Vec<_>>() {
                    // Package-private methods can only be overridden within
                    // their own package.
                    if !package_private || self.is_same_package(&subtype, &current) {
                        worklist.push(subtype);
                    }
                }
            }
        }
        result
    }

    /// Finds the nearest declaration of a method, walking superclasses
    /// first and the implemented interfaces afterwards.
    #[must_use]
    pub fn find_declaration(
        &self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
    ) -> Option<MethodId> {
        let mut current = Some(class_name.to_owned());
        while let Some(name) = current {
            if let Some(id) = self.lookup(&name) {
                if let Some(index) = self.class_by_id(id).find_method(method_name, descriptor) {
                    #[expect(clippy::cast_possible_truncation)]
                    return Some(MethodId { class: id, index: index as u16 });
                }
                current = self.super_class_of(&name).map(str::to_owned);
            } else if is_array_type_name(&name) {
                current = self.super_class_of(&name).map(str::to_owned);
            } else {
                return None;
            }
        }

        // No ancestor class declares the method; search the interfaces of
        // the whole superclass chain.
        let mut worklist: VecDeque<String> = VecDeque::new();
        let mut current = Some(class_name.to_owned());
        while let Some(name) = current {
            worklist.extend(self.super_interfaces_of(&name).iter().cloned());
            current = self.super_class_of(&name).map(str::to_owned);
        }
        while let Some(interface) = worklist.pop_front() {
            if let Some(id) = self.lookup(&interface) {
                if let Some(index) = self.class_by_id(id).find_method(method_name, descriptor) {
                    #[expect(clippy::cast_possible_truncation)]
                    return Some(MethodId { class: id, index: index as u16 });
                }
                worklist.extend(self.super_interfaces_of(&interface).iter().cloned());
            } else if is_array_type_name(&interface) {
                continue;
            } else {
                return None;
            }
        }
        None
    }

    /// Resolves a field access to the declaration it reads or writes.
    #[must_use]
    pub fn resolve_field(&self, access: &FieldAccess) -> Option<FieldId> {
        let owner = if access.is_static {
            self.resolve_static_field_owner(
                &access.class_name,
                &access.field_name,
                &access.descriptor,
            )
        } else {
            self.resolve_instance_field_owner(
                &access.class_name,
                &access.field_name,
                &access.descriptor,
            )
        }?;
        let index = self
            .class_by_id(owner)
            .find_field(&access.field_name, &access.descriptor)?;
        #[expect(clippy::cast_possible_truncation)]
        Some(FieldId { class: owner, index: index as u16 })
    }

    /// Finds the class that declares an instance field, walking the
    /// superclass chain. Resolution stops at the first unregistered class.
    #[must_use]
    pub fn resolve_instance_field_owner(
        &self,
        class_name: &str,
        field_name: &str,
        descriptor: &str,
    ) -> Option<ClassId> {
        let mut current = Some(class_name.to_owned());
        while let Some(name) = current {
            let id = self.lookup(&name)?;
            let class = self.class_by_id(id);
            if class.find_field(field_name, descriptor).is_some() {
                return Some(id);
            }
            current = class.super_class.clone();
        }
        None
    }

    /// Finds the class that declares a static field. Per JVMS 5.4.3.2 the
    /// class itself is checked first, then its interfaces transitively,
    /// then the superclass recursively.
    #[must_use]
    pub fn resolve_static_field_owner(
        &self,
        class_name: &str,
        field_name: &str,
        descriptor: &str,
    ) -> Option<ClassId> {
        let id = self.lookup(class_name)?;
        let mut worklist: Vec<String> = vec![class_name.to_owned()];
        while let Some(current) = worklist.pop() {
            if let Some(current_id) = self.lookup(&current) {
                let class = self.class_by_id(current_id);
                if class.find_field(field_name, descriptor).is_some() {
                    return Some(current_id);
                }
                worklist.extend(class.interfaces.iter().cloned());
            }
        }
        match &self.class_by_id(id).super_class {
            Some(parent) => self.resolve_static_field_owner(parent, field_name, descriptor),
            None => None,
        }
    }
}

#[cfg(feature = "petgraph")]
#[cfg_attr(docsrs, doc(cfg(feature = "petgraph")))]
mod petgraph_impl {
    //! Petgraph implementation of the subtype graph.

    use std::collections::HashSet;

    use petgraph::visit::{Control, DfsEvent, GraphBase, IntoNeighbors, Visitable, depth_first_search};

    use super::ClassHierarchy;
    use crate::jvm::references::ClassId;

    impl GraphBase for ClassHierarchy {
        type NodeId = ClassId;
        type EdgeId = (ClassId, ClassId);
    }

    impl IntoNeighbors for &ClassHierarchy {
        type Neighbors = std::vec::IntoIter<ClassId>;

        fn neighbors(self, node: ClassId) -> Self::Neighbors {
            let name = &self.class_by_id(node).binary_name;
            self.subtypes
                .get(name)
                .into_iter()
                .flatten()
                .filter_map(|subtype| self.by_name.get(subtype).copied())
                .collect::<Vec<_>>()
                .into_iter()
        }
    }

    /// A visit map for the subtype graph.
    pub type Visited = HashSet<ClassId>;

    impl Visitable for ClassHierarchy {
        type Map = Visited;

        fn visit_map(&self) -> Self::Map {
            Visited::default()
        }

        fn reset_map(&self, map: &mut Self::Map) {
            map.clear();
        }
    }

    impl ClassHierarchy {
        /// Returns the registered classes reachable from `class_name`
        /// through the subtype relation, the class itself excluded.
        #[must_use]
        pub fn reachable_subtypes(&self, class_name: &str) -> HashSet<ClassId> {
            let Some(start) = self.by_name.get(class_name).copied() else {
                return HashSet::new();
            };
            let mut subtypes = HashSet::new();
            depth_first_search(self, [start], |event| {
                if let DfsEvent::TreeEdge(_, target) = event {
                    subtypes.insert(target);
                }
                Control::<()>::Continue
            });
            subtypes.remove(&start);
            subtypes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::MethodAccessFlags;
    use crate::tests::{
        abstract_method, class, concrete, hierarchy, interface, method, method_id, target_names,
        trivial_body,
    };

    // An interface I, a family C <- D <- {F, G, H} in package `pkg`, and
    // a class X in another package extending C. `p` is package-private,
    // `q` is private.
    fn sample() -> ClassHierarchy {
        let package_private = |name: &str| {
            method(name, "(I)V", MethodAccessFlags::empty(), Some(trivial_body()))
        };
        hierarchy(vec![
            interface("pkg/I", vec![abstract_method("m", "()V")]),
            class(
                "pkg/C",
                "java/lang/Object",
                &["pkg/I"],
                vec![
                    concrete("<init>", "()V"),
                    concrete("m", "()V"),
                    concrete("n", "()V"),
                    package_private("p"),
                    method("q", "()V", MethodAccessFlags::PRIVATE, Some(trivial_body())),
                ],
            ),
            class(
                "pkg/D",
                "pkg/C",
                &[],
                vec![concrete("m", "()V"), concrete("n", "()V")],
            ),
            class("pkg/F", "pkg/D", &[], Vec::new()),
            class("pkg/G", "pkg/D", &[], vec![concrete("<init>", "()V"), concrete("n", "()V")]),
            class(
                "pkg/H",
                "pkg/D",
                &[],
                vec![concrete("n", "()V"), concrete("q", "()V"), package_private("p")],
            ),
            class("other/X", "pkg/C", &[], vec![package_private("p")]),
        ])
    }

    fn resolved(h: &ClassHierarchy, class_name: &str, method_name: &str) -> Vec<String> {
        let descriptor = if method_name == "p" { "(I)V" } else { "()V" };
        target_names(h, &h.resolve_call_named(class_name, method_name, descriptor, true))
    }

    #[test]
    fn dynamic_dispatch_collects_overriding_bodies() {
        let h = sample();
        assert_eq!(resolved(&h, "pkg/C", "m"), ["pkg/C.m", "pkg/D.m"]);
        assert_eq!(resolved(&h, "pkg/D", "m"), ["pkg/D.m"]);
        assert_eq!(resolved(&h, "pkg/H", "m"), ["pkg/D.m"]);
        assert_eq!(
            resolved(&h, "pkg/C", "n"),
            ["pkg/C.n", "pkg/D.n", "pkg/G.n", "pkg/H.n"]
        );
    }

    #[test]
    fn interface_calls_dispatch_to_implementations() {
        let h = sample();
        assert_eq!(resolved(&h, "pkg/I", "m"), ["pkg/C.m", "pkg/D.m"]);
    }

    #[test]
    fn package_private_dispatch_stays_in_the_package() {
        let h = sample();
        // other/X also declares `p`, but it cannot override across
        // packages.
        assert_eq!(resolved(&h, "pkg/C", "p"), ["pkg/C.p", "pkg/H.p"]);
    }

    #[test]
    fn private_methods_never_dispatch_to_subtypes() {
        let h = sample();
        assert_eq!(resolved(&h, "pkg/C", "q"), ["pkg/C.q"]);
    }

    #[test]
    fn special_calls_resolve_through_supertypes() {
        let h = sample();
        assert_eq!(
            h.resolve_special_call("pkg/F", "m", "()V"),
            Some(method_id(&h, "pkg/D", "m", "()V"))
        );
        assert_eq!(
            h.resolve_special_call("pkg/F", "q", "()V"),
            Some(method_id(&h, "pkg/C", "q", "()V"))
        );
        assert_eq!(h.resolve_special_call("pkg/F", "absent", "()V"), None);
    }

    #[test]
    fn subtype_and_supertype_queries() {
        let h = sample();
        let subtypes = h.all_subtypes(["pkg/D".to_owned()]);
        assert_eq!(
            subtypes.iter().map(String::as_str).collect::<Vec<_>>(),
            ["pkg/D", "pkg/F", "pkg/G", "pkg/H"]
        );
        let supertypes = h.list_all_super_types("pkg/H");
        assert!(supertypes.contains("pkg/C"));
        assert!(supertypes.contains("pkg/D"));
        assert!(supertypes.contains("pkg/I"));
        assert!(supertypes.contains("java/lang/Object"));
        assert!(!supertypes.contains("pkg/H"));
    }

    #[test]
    fn unresolved_names_are_recorded_as_requested() {
        let h = sample();
        assert!(h.resolve_call_named("pkg/Missing", "m", "()V", true).is_empty());
        assert!(h.requested_classes().contains("pkg/Missing"));
    }

    #[test]
    fn frozen_hierarchies_reject_registration() {
        let mut h = sample();
        assert!(h.is_frozen());
        let orphan = class("pkg/Late", "java/lang/Object", &[], Vec::new());
        assert_eq!(h.register_class(orphan), Err(FrozenHierarchyError));
    }

    #[cfg(feature = "petgraph")]
    #[test]
    fn reachable_subtypes_follow_the_subtype_relation() {
        let h = sample();
        let reachable = h.reachable_subtypes("pkg/C");
        let names: BTreeSet<&str> = reachable
            .iter()
            .map(|&id| h.class_by_id(id).binary_name.as_str())
            .collect();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            ["other/X", "pkg/D", "pkg/F", "pkg/G", "pkg/H"]
        );
    }
}
