//! Lowers a parsed [`Program`] to a [`RuleSet`], rejecting programs that are
//! well-formed text but not meaningful rules.

use crate::ast::{ArgsNode, AtomNode, ClauseNode, LiteralNode, Program, TermNode, Token};
use crate::checking::Place;
use crate::error::{CompileError, CompileErrorKind as Kind, Position};
use crate::util::VecSet;
use crate::{
    stratify, Args, Atom, AtomOf, CmpOp, ConcreteFact, Constraint, HeadAtom, HeadTerm, Relation,
    Rule, RuleSet, Shape, Term,
};
use std::collections::btree_map::{BTreeMap, Entry};

type Result<T> = std::result::Result<T, CompileError>;

/// One compilation. Owns the counter naming anonymous wildcards, so separate
/// compilations of the same text produce equal rule sets.
pub struct Compiler<'s> {
    source: &'s str,
    wildcards: usize,
    shapes: BTreeMap<Relation, Shape>,
}

impl<'s> Compiler<'s> {
    /// `source` is the text the program was parsed from, used to locate errors.
    pub fn new(source: &'s str) -> Self {
        Self { source, wildcards: 0, shapes: BTreeMap::new() }
    }

    /// Translates and stratifies the program.
    pub fn compile_program(self, program: &Program) -> Result<RuleSet> {
        let (rule_set, heads) = self.translate_located(program)?;
        let stratification = stratify(&rule_set).map_err(|e| {
            let position = heads.get(e.rule).copied();
            CompileError { kind: Kind::Unstratifiable { relation: e.relation }, position }
        })?;
        tracing::debug!(
            facts = rule_set.facts().len(),
            rules = rule_set.rules().len(),
            relations = rule_set.shapes().len(),
            strata = stratification.len(),
            "compiled program"
        );
        Ok(rule_set)
    }

    /// Translates the program without checking that it is stratifiable.
    pub fn translate(self, program: &Program) -> Result<RuleSet> {
        self.translate_located(program).map(|(rule_set, _)| rule_set)
    }

    /// Also returns the head position of each distinct rule, by rule index.
    fn translate_located(mut self, program: &Program) -> Result<(RuleSet, Vec<Position>)> {
        let mut facts = VecSet::default();
        let mut rules = VecSet::default();
        let mut heads = vec![];
        for clause in &program.clauses {
            match clause {
                ClauseNode::Fact(atom) => {
                    facts.insert(self.fact(atom)?);
                }
                ClauseNode::Rule { head, body } => {
                    if rules.insert(self.rule(head, body)?) {
                        heads.push(self.position(head.relation));
                    }
                }
            }
        }
        Ok((RuleSet::from_parts(facts, rules, self.shapes), heads))
    }

    fn position(&self, token: Token) -> Position {
        token.position(self.source)
    }

    fn error(&self, kind: Kind, token: Token) -> CompileError {
        CompileError::new(kind, self.position(token))
    }

    fn fact(&mut self, atom: &AtomNode) -> Result<ConcreteFact> {
        let args = self.args(atom, |this, term| match term {
            TermNode::Literal { value, .. } => Ok(value.clone()),
            TermNode::Identifier(token) | TermNode::Wildcard(token) => Err(this.error(
                Kind::NonConstantFact { term: token.lexeme.to_owned() },
                *token,
            )),
        })?;
        let relation = self.check_shape(atom, &args)?;
        Ok(ConcreteFact { relation, values: args.iter().cloned().collect() })
    }

    fn rule(&mut self, head: &AtomNode, body: &[LiteralNode]) -> Result<Rule> {
        let head_args = self.args(head, |this, term| match term {
            TermNode::Literal { value, .. } => Ok(HeadTerm::Constant(value.clone())),
            TermNode::Identifier(token) => Ok(HeadTerm::Variable(token.lexeme.to_owned())),
            TermNode::Wildcard(token) => Err(this.error(
                Kind::MisplacedWildcard { wildcard: token.lexeme.to_owned(), place: "the rule head" },
                *token,
            )),
        })?;
        let relation = self.check_shape(head, &head_args)?;
        let mut rule = Rule {
            head: HeadAtom { relation, args: head_args },
            positive: vec![],
            negative: vec![],
            constraints: vec![],
        };
        for literal in body {
            match literal {
                LiteralNode::Positive(atom) => rule.positive.push(self.body_atom(atom)?),
                LiteralNode::Negated(atom) => rule.negative.push(self.body_atom(atom)?),
                LiteralNode::Comparison { left, op, right } => {
                    rule.constraints.push(self.constraint(left, *op, right)?)
                }
            }
        }
        if let Some((variable, place)) = rule.unbound_variable() {
            let token = unsafe_occurrence(head, body, variable, place).unwrap_or(head.relation);
            let kind = Kind::UnsafeVariable { variable: variable.clone(), place: place.describe() };
            return Err(self.error(kind, token));
        }
        Ok(rule)
    }

    fn body_atom(&mut self, atom: &AtomNode) -> Result<Atom> {
        let args = self.args(atom, |this, term| Ok(this.body_term(term)))?;
        let relation = self.check_shape(atom, &args)?;
        Ok(AtomOf { relation, args })
    }

    fn body_term(&mut self, term: &TermNode) -> Term {
        match term {
            TermNode::Literal { value, .. } => Term::Constant(value.clone()),
            TermNode::Identifier(token) => Term::Variable(token.lexeme.to_owned()),
            TermNode::Wildcard(token) if token.lexeme == "_" => {
                let name = format!("_{}", self.wildcards);
                self.wildcards += 1;
                Term::Wildcard(name)
            }
            TermNode::Wildcard(token) => Term::Wildcard(token.lexeme.to_owned()),
        }
    }

    fn constraint(&mut self, left: &TermNode, op: Token, right: &TermNode) -> Result<Constraint> {
        let left = match left {
            TermNode::Identifier(token) => token.lexeme.to_owned(),
            other => {
                let token = other.token();
                return Err(self.error(Kind::LeftOperandNotVariable(token.lexeme.to_owned()), token));
            }
        };
        let Some(cmp) = CmpOp::from_lexeme(op.lexeme) else {
            return Err(self.error(Kind::UnrecognizedOperator(op.lexeme.to_owned()), op));
        };
        if let TermNode::Wildcard(token) = right {
            let kind = Kind::MisplacedWildcard { wildcard: token.lexeme.to_owned(), place: "a constraint" };
            return Err(self.error(kind, *token));
        }
        Ok(Constraint { left, op: cmp, right: self.body_term(right) })
    }

    /// Translates the arguments of `atom`, rejecting repeated field names.
    fn args<T>(
        &mut self,
        atom: &AtomNode,
        mut term: impl FnMut(&mut Self, &TermNode) -> Result<T>,
    ) -> Result<Args<T>> {
        match &atom.args {
            ArgsNode::Ordered(terms) => {
                let terms = terms.iter().map(|t| term(self, t)).collect::<Result<_>>()?;
                Ok(Args::Ordered(terms))
            }
            ArgsNode::Named(fields) => {
                let mut out = BTreeMap::new();
                for (field, t) in fields {
                    let translated = term(self, t)?;
                    if out.insert(field.lexeme.to_owned(), translated).is_some() {
                        let kind = Kind::DuplicateField {
                            relation: atom.relation.lexeme.to_owned(),
                            field: field.lexeme.to_owned(),
                        };
                        return Err(self.error(kind, *field));
                    }
                }
                Ok(Args::Named(out))
            }
        }
    }

    /// Records the shape of a relation's first use and checks every later use against it.
    fn check_shape<T>(&mut self, atom: &AtomNode, args: &Args<T>) -> Result<Relation> {
        let relation = atom.relation.lexeme.to_owned();
        let found = args.shape();
        match self.shapes.entry(relation.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(found);
            }
            Entry::Occupied(entry) if *entry.get() != found => {
                let expected = entry.get().clone();
                let kind = Kind::ShapeMismatch { relation: relation.clone(), expected, found };
                return Err(self.error(kind, atom.relation));
            }
            Entry::Occupied(_) => {}
        }
        Ok(relation)
    }
}

/// The first token naming `variable` where `place` requires it to be bound.
fn unsafe_occurrence<'a>(
    head: &AtomNode<'a>,
    body: &[LiteralNode<'a>],
    variable: &str,
    place: Place,
) -> Option<Token<'a>> {
    let naming = |term: &TermNode<'a>| match term {
        TermNode::Identifier(token) if token.lexeme == variable => Some(*token),
        _ => None,
    };
    match place {
        Place::Head => head.terms().find_map(naming),
        Place::NegatedAtom => body.iter().find_map(|literal| match literal {
            LiteralNode::Negated(atom) => atom.terms().find_map(naming),
            _ => None,
        }),
        Place::Constraint => body.iter().find_map(|literal| match literal {
            LiteralNode::Comparison { left, right, .. } => naming(left).or_else(|| naming(right)),
            _ => None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Value};

    fn compile(source: &str) -> std::result::Result<RuleSet, CompileError> {
        match crate::compile(source) {
            Ok(rule_set) => Ok(rule_set),
            Err(Error::Compile(e)) => Err(e),
            Err(other) => panic!("unexpected error {other}"),
        }
    }

    fn kind(source: &str) -> Kind {
        compile(source).unwrap_err().kind
    }

    #[test]
    fn facts_and_rules_are_normalized() {
        let rule_set = compile(
            "edge(1, 2). edge(1, 2).
             Point(y: 2, x: 1).
             q(X) :- edge(X, _), not edge(_, X), X != 3.",
        )
        .unwrap();
        assert_eq!(rule_set.facts().len(), 2);
        let point = ConcreteFact::named("Point", [("x", Value::Int(1)), ("y", Value::Int(2))]);
        assert_eq!(rule_set.facts()[1], point);
        assert_eq!(rule_set.shape_of("Point"), Some(&Shape::Named(vec!["x".into(), "y".into()])));
        assert_eq!(rule_set.shape_of("edge"), Some(&Shape::Ordered(2)));
        let rule = &rule_set.rules()[0];
        assert_eq!(rule.to_string(), "q(X) :- edge(X, _0), not edge(_1, X), X != 3.");
    }

    #[test]
    fn fact_terms_must_be_constant() {
        let err = compile("p(1).\np(X).").unwrap_err();
        assert_eq!(err.kind, Kind::NonConstantFact { term: "X".into() });
        assert_eq!(err.position, Some(Position { line: 2, column: 3 }));
        assert_eq!(kind("p(_)."), Kind::NonConstantFact { term: "_".into() });
    }

    #[test]
    fn comparison_operands_and_operators() {
        assert_eq!(kind("n(1). p(X) :- n(X), 1 < X."), Kind::LeftOperandNotVariable("1".into()));
        assert_eq!(kind("n(1). p(X) :- n(X), X <> 2."), Kind::UnrecognizedOperator("<>".into()));
        assert_eq!(
            kind("n(1). p(X) :- n(X), X = _."),
            Kind::MisplacedWildcard { wildcard: "_".into(), place: "a constraint" }
        );
        assert!(compile("n(1). p(X) :- n(X), X == 1, X >= 1, X <= 1.").is_ok());
    }

    #[test]
    fn head_wildcards_are_rejected() {
        let err = compile("n(1).\np(_x) :- n(_x).").unwrap_err();
        assert_eq!(err.kind, Kind::MisplacedWildcard { wildcard: "_x".into(), place: "the rule head" });
        assert_eq!(err.position, Some(Position { line: 2, column: 3 }));
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        assert_eq!(
            kind("p(x: 1, x: 2)."),
            Kind::DuplicateField { relation: "p".into(), field: "x".into() }
        );
    }

    #[test]
    fn shapes_must_be_consistent() {
        assert_eq!(
            kind("p(1). p(1, 2)."),
            Kind::ShapeMismatch {
                relation: "p".into(),
                expected: Shape::Ordered(1),
                found: Shape::Ordered(2)
            }
        );
        let err = compile("P(x: 1).\nq(X) :- P(X).").unwrap_err();
        assert!(matches!(err.kind, Kind::ShapeMismatch { ref relation, .. } if relation == "P"));
        assert_eq!(err.position, Some(Position { line: 2, column: 9 }));
        assert!(matches!(kind("P(x: 1). q(X) :- P(y: X)."), Kind::ShapeMismatch { .. }));
    }

    #[test]
    fn unsafe_variables_are_located() {
        let err = compile("n(1).\np(X, Y) :- n(X).").unwrap_err();
        assert_eq!(err.kind, Kind::UnsafeVariable { variable: "Y".into(), place: "the rule head" });
        assert_eq!(err.position, Some(Position { line: 2, column: 6 }));

        let err = compile("n(1). m(1).\np(X) :- n(X), not m(Z).").unwrap_err();
        assert_eq!(err.kind, Kind::UnsafeVariable { variable: "Z".into(), place: "a negated atom" });
        assert_eq!(err.position, Some(Position { line: 2, column: 21 }));

        assert!(matches!(
            kind("n(1). p(X) :- n(X), X < W."),
            Kind::UnsafeVariable { place: "a constraint", .. }
        ));
        assert!(matches!(
            kind("n(1). p(X) :- not n(X)."),
            Kind::UnsafeVariable { place: "the rule head", .. }
        ));
    }

    #[test]
    fn unstratifiable_programs_fail_at_the_rule() {
        let err = compile("q(1).\np(X) :- q(X), not p(X).").unwrap_err();
        assert_eq!(err.kind, Kind::Unstratifiable { relation: "p".into() });
        assert_eq!(err.position, Some(Position { line: 2, column: 1 }));
    }

    #[test]
    fn compilation_is_repeatable() {
        let source = "e(1, 2). p(X) :- e(X, _), not e(_, X). r(Y) :- e(_, Y).";
        let a = compile(source).unwrap();
        let b = compile(source).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.rules()[1].to_string(), "r(Y) :- e(_2, Y).");
    }

    #[test]
    fn fact_only_programs_compile() {
        let rule_set = compile("a(:k, true, null, \"s\", 1.5).").unwrap();
        assert_eq!(rule_set.rules().len(), 0);
        assert_eq!(rule_set.facts()[0].to_string(), "a(:k, true, null, \"s\", 1.5)");
    }
}
