use crate::{Atom, ConcreteFact, Constraint, HeadAtom, HeadTerm, Term, Value};

/// Variable assignments of one candidate match. Values borrow from the fact store,
/// names from the rule.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings<'a> {
    pairs: Vec<(&'a str, &'a Value)>,
}

impl<'a> Bindings<'a> {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(&self, var: &str) -> Option<&'a Value> {
        self.pairs.iter().find(|(name, _)| *name == var).map(|(_, value)| *value)
    }
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + '_ {
        self.pairs.iter().copied()
    }
}

/// Matches `term` against `value`, returning the extended bindings on success.
pub fn unify<'a>(term: &'a Term, value: &'a Value, bindings: &Bindings<'a>) -> Option<Bindings<'a>> {
    let mut out = bindings.clone();
    term.unify_in_place(value, &mut out).then_some(out)
}

/// Grounds a head atom. `None` if some variable is unbound.
pub fn substitute(head: &HeadAtom, bindings: &Bindings) -> Option<ConcreteFact> {
    let values = head.terms().map(|term| term.resolve(bindings)).collect::<Option<Vec<_>>>()?;
    Some(ConcreteFact { relation: head.relation.clone(), values })
}

impl Term {
    fn unify_in_place<'a>(&'a self, value: &'a Value, bindings: &mut Bindings<'a>) -> bool {
        match self {
            Self::Wildcard(_) => true,
            Self::Constant(c) => c == value,
            Self::Variable(v) => match bindings.get(v) {
                // re-occurrence is a join condition
                Some(bound) => bound == value,
                None => {
                    bindings.pairs.push((v.as_str(), value));
                    true
                }
            },
        }
    }
    fn resolve<'a>(&'a self, bindings: &Bindings<'a>) -> Option<&'a Value> {
        match self {
            Self::Constant(c) => Some(c),
            Self::Variable(v) => bindings.get(v),
            Self::Wildcard(_) => None,
        }
    }
}

impl HeadTerm {
    fn resolve(&self, bindings: &Bindings) -> Option<Value> {
        match self {
            Self::Constant(c) => Some(c.clone()),
            Self::Variable(v) => bindings.get(v).cloned(),
        }
    }
}

impl Atom {
    /// Unifies this atom's terms position by position with `fact`.
    pub fn unify_fact<'a>(
        &'a self,
        fact: &'a ConcreteFact,
        bindings: &Bindings<'a>,
    ) -> Option<Bindings<'a>> {
        if fact.relation != self.relation || fact.values.len() != self.arity() {
            return None;
        }
        let mut out = bindings.clone();
        self.terms()
            .zip(&fact.values)
            .all(|(term, value)| term.unify_in_place(value, &mut out))
            .then_some(out)
    }
    /// The fact this atom denotes under `bindings`, if every term is resolved.
    pub fn ground(&self, bindings: &Bindings) -> Option<ConcreteFact> {
        let values = self
            .terms()
            .map(|term| term.resolve(bindings).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(ConcreteFact { relation: self.relation.clone(), values })
    }
}

impl Constraint {
    /// False if an operand is unbound.
    pub fn holds(&self, bindings: &Bindings) -> bool {
        let (Some(left), Some(right)) = (bindings.get(&self.left), self.right.resolve(bindings))
        else {
            return false;
        };
        self.op.test(left.compare(right))
    }
}
