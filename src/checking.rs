use crate::error::{CompileError, CompileErrorKind};
use crate::{Rule, RuleSet, Shape, Term, Variable};
use std::collections::HashSet;

/// Where a variable must be bound by a positive body atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place {
    Head,
    NegatedAtom,
    Constraint,
}

impl Place {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Head => "the rule head",
            Self::NegatedAtom => "a negated atom",
            Self::Constraint => "a constraint",
        }
    }
}

impl Rule {
    /// Variables bound by positive body atoms.
    pub fn bound_variables(&self) -> HashSet<&Variable> {
        let mut buf = HashSet::default();
        for atom in &self.positive {
            buf.extend(atom.terms().filter_map(Term::as_variable));
        }
        buf
    }

    /// The first variable violating range restriction or negation safety, looking
    /// at the head, then negated atoms, then constraints.
    pub fn unbound_variable(&self) -> Option<(&Variable, Place)> {
        let bound = self.bound_variables();
        let head = self.head.terms().filter_map(|term| match term {
            crate::HeadTerm::Variable(v) => Some((v, Place::Head)),
            crate::HeadTerm::Constant(_) => None,
        });
        let negated = self
            .negative
            .iter()
            .flat_map(|atom| atom.terms().filter_map(Term::as_variable))
            .map(|v| (v, Place::NegatedAtom));
        let constrained = self
            .constraints
            .iter()
            .flat_map(|c| std::iter::once(&c.left).chain(c.right.as_variable()))
            .map(|v| (v, Place::Constraint));
        head.chain(negated).chain(constrained).find(|(v, _)| !bound.contains(v))
    }
}

impl RuleSet {
    /// Rechecks what compilation guarantees, for rule sets built by hand: every
    /// fact and atom matches its relation's recorded shape and every rule is safe.
    /// Errors carry no position.
    pub fn check(&self) -> Result<(), CompileError> {
        let mismatch = |relation: &str, found: Shape| -> Option<CompileErrorKind> {
            let expected = self.shape_of(relation).filter(|&expected| *expected != found)?;
            Some(CompileErrorKind::ShapeMismatch {
                relation: relation.to_owned(),
                expected: expected.clone(),
                found,
            })
        };
        for fact in self.facts() {
            let found = match self.shape_of(&fact.relation) {
                Some(Shape::Named(fields)) if fields.len() == fact.values.len() => {
                    Shape::Named(fields.clone())
                }
                _ => Shape::Ordered(fact.values.len()),
            };
            if let Some(kind) = mismatch(fact.relation.as_str(), found) {
                return Err(CompileError { kind, position: None });
            }
        }
        for rule in self.rules() {
            let head = std::iter::once((rule.head.relation.as_str(), rule.head.args.shape()));
            let body = rule
                .positive
                .iter()
                .chain(&rule.negative)
                .map(|atom| (atom.relation.as_str(), atom.args.shape()));
            if let Some(kind) = head.chain(body).find_map(|(relation, found)| mismatch(relation, found))
            {
                return Err(CompileError { kind, position: None });
            }
            if let Some((variable, place)) = rule.unbound_variable() {
                let kind = CompileErrorKind::UnsafeVariable {
                    variable: variable.clone(),
                    place: place.describe(),
                };
                return Err(CompileError { kind, position: None });
            }
        }
        Ok(())
    }
}

impl Term {
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::Variable(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Atom, CmpOp, ConcreteFact, Constraint, HeadAtom, HeadTerm, Value};

    fn rule(head: &[&str], positive: &[&str], negative: &[&str]) -> Rule {
        let atom = |r: &str, vars: &[&str]| Atom::ordered(r, vars.iter().map(|v| Term::var(v)).collect());
        Rule {
            head: HeadAtom::ordered("h", head.iter().map(|v| HeadTerm::var(v)).collect()),
            positive: vec![atom("p", positive)],
            negative: vec![atom("n", negative)],
            constraints: vec![],
        }
    }

    #[test]
    fn safe_rule_has_no_unbound_variables() {
        assert_eq!(rule(&["X"], &["X", "Y"], &["Y"]).unbound_variable(), None);
    }

    #[test]
    fn unbound_variables_by_place() {
        let r = rule(&["Z"], &["X"], &[]);
        assert_eq!(r.unbound_variable(), Some((&"Z".to_owned(), Place::Head)));
        let r = rule(&["X"], &["X"], &["W"]);
        assert_eq!(r.unbound_variable(), Some((&"W".to_owned(), Place::NegatedAtom)));

        let mut r = rule(&["X"], &["X"], &[]);
        r.constraints.push(Constraint { left: "X".into(), op: CmpOp::Lt, right: Term::var("V") });
        assert_eq!(r.unbound_variable(), Some((&"V".to_owned(), Place::Constraint)));
    }

    #[test]
    fn hand_built_rule_sets_are_rechecked() {
        let mut rule_set = RuleSet::default();
        rule_set.add_fact(ConcreteFact::new("p", [Value::Int(1)]));
        assert_eq!(rule_set.check(), Ok(()));
        rule_set.add_fact(ConcreteFact::new("p", [Value::Int(1), Value::Int(2)]));
        let err = rule_set.check().unwrap_err();
        assert_eq!(err.position, None);
        assert_eq!(
            err.kind,
            CompileErrorKind::ShapeMismatch {
                relation: "p".into(),
                expected: Shape::Ordered(1),
                found: Shape::Ordered(2),
            }
        );

        let mut rule_set = RuleSet::default();
        rule_set.add_rule(rule(&["Z"], &["X"], &[]));
        let err = rule_set.check().unwrap_err();
        assert_eq!(
            err.kind,
            CompileErrorKind::UnsafeVariable { variable: "Z".into(), place: "the rule head" }
        );
    }
}
