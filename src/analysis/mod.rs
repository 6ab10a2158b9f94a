//! Whole-program analyses over the [`crate::jvm`] program model.
//!
//! The entry points are [`hierarchy::ClassHierarchy`] for Class Hierarchy
//! Analysis, [`data_flow::DataDependence`] for intraprocedural reaching
//! definitions, and [`vta::VtaResolver`] for type-propagation call
//! resolution. [`CallResolver`] unifies the two call resolution
//! strategies behind one interface.

pub mod data_flow;
pub mod fixed_point;
pub mod hierarchy;
pub mod vta;

use std::fmt;

use crate::jvm::references::{CallSite, MethodId};
use crate::jvm::{Class, Field, Method};
use hierarchy::ClassHierarchy;
use vta::VtaResolver;

/// Selects which parts of a program a type-propagation analysis models
/// precisely. Everything outside the target is approximated by its
/// declared types.
pub trait AnalysisTarget {
    /// Whether the body of `method` is propagated through.
    fn is_target_method(&self, class: &Class, method: &Method) -> bool;

    /// Whether reads and writes of `field` are tracked.
    fn is_target_field(&self, class: &Class, field: &Field) -> bool;

    /// Whether callers outside the target may invoke target methods. When
    /// `true`, formal parameters also carry their declared types.
    fn assume_external_callers(&self) -> bool;

    /// Whether `class_name` is excluded from resolved call targets.
    fn is_excluded_type(&self, class_name: &str) -> bool;
}

impl fmt::Debug for dyn AnalysisTarget + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AnalysisTarget")
    }
}

/// The whole program is the target: every method body and field is
/// modeled, and no external callers are assumed.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeProgram;

impl AnalysisTarget for WholeProgram {
    fn is_target_method(&self, _class: &Class, _method: &Method) -> bool {
        true
    }

    fn is_target_field(&self, _class: &Class, _field: &Field) -> bool {
        true
    }

    fn assume_external_callers(&self) -> bool {
        false
    }

    fn is_excluded_type(&self, _class_name: &str) -> bool {
        false
    }
}

/// A call resolution strategy.
///
/// Static and special call sites resolve the same way under both
/// strategies; they only differ on dynamically dispatched sites.
#[derive(Debug)]
pub enum CallResolver<'a> {
    /// Class Hierarchy Analysis: every overriding body under the declared
    /// receiver type is a possible target.
    Cha(&'a ClassHierarchy),
    /// Variable Type Analysis: only bodies of types that can reach the
    /// receiver are possible targets.
    Vta {
        /// The hierarchy used for static and special sites.
        hierarchy: &'a ClassHierarchy,
        /// The propagation result used for dynamic sites.
        resolver: &'a VtaResolver<'a>,
    },
}

impl<'a> CallResolver<'a> {
    /// A resolver backed by Class Hierarchy Analysis alone.
    #[must_use]
    pub fn cha(hierarchy: &'a ClassHierarchy) -> Self {
        Self::Cha(hierarchy)
    }

    /// A resolver that narrows dynamic sites with Variable Type Analysis.
    #[must_use]
    pub fn vta(hierarchy: &'a ClassHierarchy, resolver: &'a VtaResolver<'a>) -> Self {
        Self::Vta { hierarchy, resolver }
    }

    /// Resolves the possible targets of `call_site`, sorted by class name,
    /// method name, and descriptor.
    #[must_use]
    pub fn resolve_call(&self, call_site: &CallSite) -> Vec<MethodId> {
        match self {
            Self::Cha(hierarchy) => hierarchy.resolve_call(call_site),
            Self::Vta { hierarchy, resolver } => {
                if call_site.is_static_or_special() {
                    hierarchy.resolve_call(call_site)
                } else {
                    resolver.resolve_call(call_site)
                }
            }
        }
    }
}
