//! Structural equality and hashing where the derived versions would be too strict:
//! wildcard names are cosmetic, rule bodies and rule sets are unordered.

use crate::{Rule, RuleSet, Term};
use std::hash::{DefaultHasher, Hash, Hasher};

/// Views a slice as a multiset for equality and hashing.
struct UnorderedSlice<'a, T>(&'a [T]);

impl<T: Hash> Hash for UnorderedSlice<'_, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Sort by a key that depends only on each element, then hash in that order.
        // The per-element hasher must be deterministic or equal slices diverge.
        let mut elems: Vec<&T> = self.0.iter().collect();
        elems.sort_by_cached_key(|elem| {
            let mut hasher = DefaultHasher::new();
            elem.hash(&mut hasher);
            hasher.finish()
        });
        elems.hash(state)
    }
}

impl<T: PartialEq> PartialEq for UnorderedSlice<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        // cross off matches so duplicates are counted
        let mut unmatched: Vec<&T> = other.0.iter().collect();
        for lhs in self.0 {
            match unmatched.iter().position(|&rhs| lhs == rhs) {
                Some(i) => {
                    unmatched.swap_remove(i);
                }
                None => return false,
            }
        }
        true
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Constant(a), Self::Constant(b)) => a == b,
            (Self::Variable(a), Self::Variable(b)) => a == b,
            (Self::Wildcard(_), Self::Wildcard(_)) => true,
            _ => false,
        }
    }
}
impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Constant(c) => c.hash(state),
            Self::Variable(v) => v.hash(state),
            Self::Wildcard(_) => {}
        }
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        let Self { head, positive, negative, constraints } = self;
        *head == other.head
            && UnorderedSlice(positive) == UnorderedSlice(&other.positive)
            && UnorderedSlice(negative) == UnorderedSlice(&other.negative)
            && UnorderedSlice(constraints) == UnorderedSlice(&other.constraints)
    }
}
impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let Self { head, positive, negative, constraints } = self;
        head.hash(state);
        UnorderedSlice(positive).hash(state);
        UnorderedSlice(negative).hash(state);
        UnorderedSlice(constraints).hash(state);
    }
}

impl PartialEq for RuleSet {
    fn eq(&self, other: &Self) -> bool {
        UnorderedSlice(self.facts()) == UnorderedSlice(other.facts())
            && UnorderedSlice(self.rules()) == UnorderedSlice(other.rules())
            && self.shapes() == other.shapes()
    }
}
impl Eq for RuleSet {}

impl Hash for RuleSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        UnorderedSlice(self.facts()).hash(state);
        UnorderedSlice(self.rules()).hash(state);
        self.shapes().hash(state);
    }
}
