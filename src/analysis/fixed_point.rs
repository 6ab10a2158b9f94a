//! A generic worklist solver for forward dataflow analyses.
//!
//! Facts form a join semi-lattice: merging two facts yields their least
//! upper bound, and the solver iterates until every location is stable.
//! Merging is fallible so that analyses can reject ill-formed inputs
//! (e.g. control flow paths that disagree on the operand stack size).

use std::collections::BTreeMap;

/// A dataflow fact that can be merged at control flow join points.
///
/// `merge` must be idempotent, commutative, and associative, and the
/// chain of merged facts at any location must be finite for the solver
/// to terminate.
pub trait FixedPointFact: PartialEq + Sized {
    /// The error produced when two facts cannot be merged.
    type MergeError;

    /// Computes the least upper bound of two facts.
    ///
    /// # Errors
    /// Fails if the facts are incompatible.
    fn merge(&self, other: &Self) -> Result<Self, Self::MergeError>;
}

/// A forward dataflow analysis over an implicit control flow graph.
pub trait FixedPointAnalyzer {
    /// A program point.
    type Location: Ord + Copy;
    /// The fact computed at each location.
    type Fact: FixedPointFact;
    /// The analysis error type.
    type Error: From<<Self::Fact as FixedPointFact>::MergeError>;

    /// The initial facts at the entry locations.
    ///
    /// # Errors
    /// Fails if the entry state cannot be constructed.
    fn entry_fact(&self) -> Result<Vec<(Self::Location, Self::Fact)>, Self::Error>;

    /// Applies the transfer function at `location`, yielding the facts
    /// propagated to its successors. A successor may appear more than
    /// once; its facts are merged before the next visit.
    ///
    /// # Errors
    /// Fails if the instruction at `location` cannot be executed.
    fn execute(
        &mut self,
        location: Self::Location,
        fact: &Self::Fact,
    ) -> Result<Vec<(Self::Location, Self::Fact)>, Self::Error>;
}

/// Runs the worklist algorithm to a fixed point and returns the final
/// fact at every reached location.
///
/// # Errors
/// Propagates the first merge or transfer failure.
pub fn analyze<A: FixedPointAnalyzer>(
    analyzer: &mut A,
) -> Result<BTreeMap<A::Location, A::Fact>, A::Error> {
    let mut facts: BTreeMap<A::Location, A::Fact> = BTreeMap::new();
    let mut dirty: BTreeMap<A::Location, Vec<A::Fact>> = BTreeMap::new();
    for (location, fact) in analyzer.entry_fact()? {
        dirty.entry(location).or_default().push(fact);
    }

    while let Some((location, incoming)) = dirty.pop_first() {
        let mut merged: Option<A::Fact> = None;
        for fact in incoming {
            merged = Some(match merged {
                Some(acc) => acc.merge(&fact)?,
                None => fact,
            });
        }
        let Some(incoming_fact) = merged else {
            continue;
        };
        let updated = match facts.get(&location) {
            Some(current) => {
                let joined = current.merge(&incoming_fact)?;
                (joined != *current).then_some(joined)
            }
            None => Some(incoming_fact),
        };
        if let Some(fact) = updated {
            for (successor, new_fact) in analyzer.execute(location, &fact)? {
                dirty.entry(successor).or_default().push(new_fact);
            }
            facts.insert(location, fact);
        }
    }
    Ok(facts)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::convert::Infallible;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Reached(BTreeSet<u32>);

    impl FixedPointFact for Reached {
        type MergeError = Infallible;

        fn merge(&self, other: &Self) -> Result<Self, Infallible> {
            Ok(Reached(self.0.union(&other.0).cloned().collect()))
        }
    }

    /// Collects, per vertex, the set of vertices on some path to it.
    struct PathCollector {
        successors: Vec<Vec<u32>>,
    }

    impl FixedPointAnalyzer for PathCollector {
        type Location = u32;
        type Fact = Reached;
        type Error = Infallible;

        fn entry_fact(&self) -> Result<Vec<(u32, Reached)>, Infallible> {
            Ok(vec![(0, Reached(BTreeSet::from([0])))])
        }

        fn execute(&mut self, location: u32, fact: &Reached) -> Result<Vec<(u32, Reached)>, Infallible> {
            Ok(self.successors[location as usize]
                .iter()
                .map(|&succ| {
                    let mut set = fact.0.clone();
                    set.insert(succ);
                    (succ, Reached(set))
                })
                .collect())
        }
    }

    #[test]
    fn converges_on_cyclic_graphs() {
        // 0 -> 1 -> 2 -> 1, 2 -> 3
        let mut collector = PathCollector {
            successors: vec![vec![1], vec![2], vec![1, 3], vec![]],
        };
        let facts = analyze(&mut collector).unwrap();
        assert_eq!(facts[&3].0, BTreeSet::from([0, 1, 2, 3]));
        assert_eq!(facts[&1].0, BTreeSet::from([0, 1, 2]));
    }

    #[test]
    fn unreached_locations_are_absent() {
        let mut collector = PathCollector {
            successors: vec![vec![], vec![0]],
        };
        let facts = analyze(&mut collector).unwrap();
        assert!(facts.contains_key(&0));
        assert!(!facts.contains_key(&1));
    }
}
