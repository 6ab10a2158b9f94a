//! Interned sets of class names flowing through the type propagation graph.
//!
//! A propagation run merges the same pairs of sets over and over, so sets are
//! deduplicated behind small ids and pairwise merges are memoized.  A
//! [`TypeSet`] is then two ids (concrete and approximated types) and can be
//! copied freely between vertices.

use std::collections::HashMap;

/// Identifies an interned class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{_0}")]
pub struct SymbolId(u32);

/// Identifies an interned, sorted set of class names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetId(u32);

/// Interns class names and sorted sets of them, memoizing pairwise unions.
#[derive(Debug, Default)]
pub struct TypeSetInterner {
    symbols: Vec<String>,
    symbol_ids: HashMap<String, SymbolId>,
    sets: Vec<Vec<SymbolId>>,
    set_ids: HashMap<Vec<SymbolId>, SetId>,
    merges: HashMap<(SetId, SetId), SetId>,
}

impl TypeSetInterner {
    /// Creates an interner whose first entry is the empty set.
    #[must_use]
    pub fn new() -> Self {
        let mut interner = Self::default();
        let empty = interner.intern_set(Vec::new());
        debug_assert_eq!(empty, SetId(0));
        interner
    }

    /// The id of the empty set.
    #[must_use]
    pub fn empty(&self) -> SetId {
        SetId(0)
    }

    /// Interns a class name.
    pub fn symbol(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.symbol_ids.get(name) {
            id
        } else {
            let id = SymbolId(u32::try_from(self.symbols.len()).unwrap_or(u32::MAX));
            self.symbols.push(name.to_owned());
            self.symbol_ids.insert(name.to_owned(), id);
            id
        }
    }

    /// Interns a set containing a single class name.
    pub fn singleton(&mut self, name: &str) -> SetId {
        let symbol = self.symbol(name);
        self.intern_set(vec![symbol])
    }

    /// Returns the union of two interned sets.
    pub fn merge(&mut self, lhs: SetId, rhs: SetId) -> SetId {
        if lhs == rhs {
            return lhs;
        }
        let key = (lhs.min(rhs), lhs.max(rhs));
        if let Some(&merged) = self.merges.get(&key) {
            return merged;
        }
        let mut union: Vec<_> = self.set(lhs).iter().chain(self.set(rhs)).copied().collect();
        union.sort_unstable_by_key(|symbol| symbol.0);
        union.dedup();
        let merged = self.intern_set(union);
        self.merges.insert(key, merged);
        merged
    }

    /// The class names in an interned set, sorted by interning order.
    #[must_use]
    pub fn names(&self, id: SetId) -> impl Iterator<Item = &str> {
        self.set(id).iter().map(|&SymbolId(i)| self.symbols[i as usize].as_str())
    }

    /// Whether an interned set contains the given class name.
    #[must_use]
    pub fn contains(&self, id: SetId, name: &str) -> bool {
        self.symbol_ids
            .get(name)
            .is_some_and(|symbol| self.set(id).contains(symbol))
    }

    fn set(&self, SetId(id): SetId) -> &[SymbolId] {
        &self.sets[id as usize]
    }

    fn intern_set(&mut self, symbols: Vec<SymbolId>) -> SetId {
        if let Some(&id) = self.set_ids.get(&symbols) {
            id
        } else {
            let id = SetId(u32::try_from(self.sets.len()).unwrap_or(u32::MAX));
            self.sets.push(symbols.clone());
            self.set_ids.insert(symbols, id);
            id
        }
    }
}

/// The set of types that may reach a vertex of the propagation graph.
///
/// Concrete types come from observed allocation sites.  Approximated types
/// stand in for values whose allocations are outside the analyzed code, such
/// as callees without bodies or exception handler variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSet {
    types: SetId,
    approximated: SetId,
}

impl TypeSet {
    /// A set with no type information.
    #[must_use]
    pub fn empty(interner: &TypeSetInterner) -> Self {
        Self {
            types: interner.empty(),
            approximated: interner.empty(),
        }
    }

    /// A set containing a single concrete type.
    pub fn with_type(interner: &mut TypeSetInterner, name: &str) -> Self {
        Self {
            types: interner.singleton(name),
            approximated: interner.empty(),
        }
    }

    /// A set containing a single approximated type.
    pub fn approximation(interner: &mut TypeSetInterner, name: &str) -> Self {
        Self {
            types: interner.empty(),
            approximated: interner.singleton(name),
        }
    }

    /// Adds a concrete type, returning the extended set.
    #[must_use]
    pub fn add_type(self, interner: &mut TypeSetInterner, name: &str) -> Self {
        let singleton = interner.singleton(name);
        Self {
            types: interner.merge(self.types, singleton),
            approximated: self.approximated,
        }
    }

    /// Adds an approximated type, returning the extended set.
    #[must_use]
    pub fn add_approximated(self, interner: &mut TypeSetInterner, name: &str) -> Self {
        let singleton = interner.singleton(name);
        Self {
            types: self.types,
            approximated: interner.merge(self.approximated, singleton),
        }
    }

    /// Merges any number of sets into one.
    pub fn merged(interner: &mut TypeSetInterner, sets: impl IntoIterator<Item = Self>) -> Self {
        let mut result = Self::empty(interner);
        for set in sets {
            result.types = interner.merge(result.types, set.types);
            result.approximated = interner.merge(result.approximated, set.approximated);
        }
        result
    }

    /// The concrete type names in this set.
    #[must_use]
    pub fn concrete<'i>(&self, interner: &'i TypeSetInterner) -> impl Iterator<Item = &'i str> {
        interner.names(self.types)
    }

    /// The approximated type names in this set.
    #[must_use]
    pub fn approximated<'i>(&self, interner: &'i TypeSetInterner) -> impl Iterator<Item = &'i str> {
        interner.names(self.approximated)
    }

    /// Whether the concrete types include the given class name.
    #[must_use]
    pub fn contains(&self, interner: &TypeSetInterner, name: &str) -> bool {
        interner.contains(self.types, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merging_is_memoized_by_id() {
        let mut interner = TypeSetInterner::new();
        let a = interner.singleton("com/example/A");
        let b = interner.singleton("com/example/B");
        let first = interner.merge(a, b);
        let second = interner.merge(b, a);
        assert_eq!(first, second);
        let names: Vec<_> = interner.names(first).collect();
        assert_eq!(names, vec!["com/example/A", "com/example/B"]);
    }

    #[test]
    fn adding_existing_type_keeps_the_set() {
        let mut interner = TypeSetInterner::new();
        let set = TypeSet::with_type(&mut interner, "com/example/A");
        let same = set.add_type(&mut interner, "com/example/A");
        assert_eq!(set, same);
    }

    #[test]
    fn concrete_and_approximated_are_separate() {
        let mut interner = TypeSetInterner::new();
        let set = TypeSet::with_type(&mut interner, "com/example/A")
            .add_approximated(&mut interner, "com/example/B");
        assert!(set.contains(&interner, "com/example/A"));
        assert!(!set.contains(&interner, "com/example/B"));
        assert_eq!(set.approximated(&interner).collect::<Vec<_>>(), vec!["com/example/B"]);
    }

    #[test]
    fn merged_unions_both_halves() {
        let mut interner = TypeSetInterner::new();
        let a = TypeSet::with_type(&mut interner, "com/example/A");
        let b = TypeSet::approximation(&mut interner, "com/example/B");
        let merged = TypeSet::merged(&mut interner, [a, b]);
        assert!(merged.contains(&interner, "com/example/A"));
        assert_eq!(merged.approximated(&interner).collect::<Vec<_>>(), vec!["com/example/B"]);
    }
}
