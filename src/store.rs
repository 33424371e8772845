use crate::debug::fmt_fact;
use crate::util::VecSet;
use crate::{ConcreteFact, Relation, Shape, Value};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Append-only, deduplicating facts, indexed by relation.
///
/// Each relation's facts keep insertion order, so a length taken at some point in
/// time identifies exactly the facts that existed then. The evaluator relies on
/// this to separate old facts from the delta of the previous pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactStore {
    relations: BTreeMap<Relation, VecSet<ConcreteFact>>,
    shapes: BTreeMap<Relation, Shape>,
    len: usize,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }
    /// An empty store that prints named relations with their field names.
    pub fn with_shapes(shapes: BTreeMap<Relation, Shape>) -> Self {
        Self { shapes, ..Self::default() }
    }

    /// Returns true iff the fact was not yet present.
    pub fn add_fact(&mut self, fact: ConcreteFact) -> bool {
        let added = match self.relations.get_mut(&fact.relation) {
            Some(facts) => facts.insert(fact),
            None => {
                let mut facts = VecSet::default();
                let relation = fact.relation.clone();
                facts.insert(fact);
                self.relations.insert(relation, facts);
                true
            }
        };
        if added {
            self.len += 1;
        }
        added
    }

    pub fn contains(&self, fact: &ConcreteFact) -> bool {
        self.relations.get(&fact.relation).is_some_and(|facts| facts.contains(fact))
    }

    /// Facts of one relation in insertion order. Empty for an unknown relation.
    pub fn facts_of(&self, relation: &str) -> std::slice::Iter<'_, ConcreteFact> {
        self.slice_of(relation).iter()
    }

    /// Facts of `relation` whose insertion index lies in `range`, clamped to what exists.
    pub(crate) fn facts_in(&self, relation: &str, range: Range<usize>) -> &[ConcreteFact] {
        let facts = self.slice_of(relation);
        let end = range.end.min(facts.len());
        facts.get(range.start.min(end)..end).unwrap_or_default()
    }

    fn slice_of(&self, relation: &str) -> &[ConcreteFact] {
        self.relations.get(relation).map_or(&[][..], VecSet::as_slice)
    }

    pub fn count_of(&self, relation: &str) -> usize {
        self.relations.get(relation).map_or(0, VecSet::len)
    }

    /// Every fact, grouped by relation in name order.
    pub fn all_facts(&self) -> impl Iterator<Item = &ConcreteFact> + '_ {
        self.relations.values().flat_map(VecSet::as_slice)
    }

    /// Names of relations holding at least one fact.
    pub fn relations(&self) -> impl Iterator<Item = &str> + '_ {
        self.relations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn shape_of(&self, relation: &str) -> Option<&Shape> {
        self.shapes.get(relation)
    }

    /// Value of field `name` of a fact of a named relation.
    pub fn field<'f>(&self, fact: &'f ConcreteFact, name: &str) -> Option<&'f Value> {
        match self.shape_of(&fact.relation)? {
            Shape::Named(fields) => {
                let index = fields.iter().position(|field| field == name)?;
                fact.values.get(index)
            }
            Shape::Ordered(_) => None,
        }
    }
}

/// The facts of one relation, sorted, one per line.
pub struct RelationDisplay<'s> {
    store: &'s FactStore,
    relation: &'s str,
}

impl FactStore {
    pub fn display_relation<'s>(&'s self, relation: &'s str) -> RelationDisplay<'s> {
        RelationDisplay { store: self, relation }
    }
}

impl fmt::Display for RelationDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = self.store.shape_of(self.relation);
        for fact in self.store.facts_of(self.relation).sorted() {
            fmt_fact(f, fact, shape)?;
            writeln!(f, ".")?;
        }
        Ok(())
    }
}

impl fmt::Display for FactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for relation in self.relations() {
            write!(f, "{}", self.display_relation(relation))?;
        }
        Ok(())
    }
}

impl Extend<ConcreteFact> for FactStore {
    fn extend<I: IntoIterator<Item = ConcreteFact>>(&mut self, facts: I) {
        for fact in facts {
            self.add_fact(fact);
        }
    }
}
