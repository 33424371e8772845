//! Renders the rule model back in source syntax. `Debug` output is the same text,
//! which keeps assertion failures readable.

use crate::{
    Args, AtomOf, CmpOp, ConcreteFact, Constraint, HeadTerm, Rule, RuleSet, Shape, Term, Value,
};
use itertools::Itertools;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};

macro_rules! debug_as_display {
    ($($t:ty),*) => {$(
        impl Debug for $t {
            fn fmt(&self, f: &mut Formatter) -> FmtResult {
                Display::fmt(self, f)
            }
        }
    )*};
}
debug_as_display!(Value, Term, HeadTerm, Constraint, Rule, ConcreteFact);

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => {
                let s = x.to_string();
                if x.is_finite() && !s.contains('.') {
                    write!(f, "{s}.0")
                } else {
                    write!(f, "{s}")
                }
            }
            Self::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '\\' => write!(f, "\\\\")?,
                        '"' => write!(f, "\\\"")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => write!(f, "null"),
            Self::Keyword(k) => write!(f, ":{k}"),
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Constant(c) => Display::fmt(c, f),
            Self::Variable(v) | Self::Wildcard(v) => write!(f, "{v}"),
        }
    }
}

impl Display for HeadTerm {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Constant(c) => Display::fmt(c, f),
            Self::Variable(v) => write!(f, "{v}"),
        }
    }
}

impl<T: Display> Display for Args<T> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Args::Ordered(terms) => write!(f, "({})", terms.iter().join(", ")),
            Args::Named(fields) => {
                let fields = fields.iter().format_with(", ", |(k, t), g| g(&format_args!("{k}: {t}")));
                write!(f, "({fields})")
            }
        }
    }
}
impl<T: Display> Debug for Args<T> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        Display::fmt(self, f)
    }
}

impl<T: Display> Display for AtomOf<T> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}{}", self.relation, self.args)
    }
}
impl<T: Display> Debug for AtomOf<T> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        Display::fmt(self, f)
    }
}

impl Display for CmpOp {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(self.symbol())
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{} {} {}", self.left, self.op, self.right)
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.head)?;
        let mut body = self
            .positive
            .iter()
            .map(|atom| atom.to_string())
            .chain(self.negative.iter().map(|atom| format!("not {atom}")))
            .chain(self.constraints.iter().map(|c| c.to_string()))
            .peekable();
        if body.peek().is_some() {
            write!(f, " :- {}", body.join(", "))?;
        }
        write!(f, ".")
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Shape::Ordered(arity) => write!(f, "ordered/{arity}"),
            Shape::Named(fields) => write!(f, "named {{{}}}", fields.iter().join(", ")),
        }
    }
}

/// Writes `fact` as a ground atom. Facts of a named relation print their field names.
pub fn fmt_fact(f: &mut Formatter, fact: &ConcreteFact, shape: Option<&Shape>) -> FmtResult {
    match shape {
        Some(Shape::Named(fields)) if fields.len() == fact.values.len() => {
            let pairs = fields
                .iter()
                .zip(&fact.values)
                .format_with(", ", |(k, v), g| g(&format_args!("{k}: {v}")));
            write!(f, "{}({pairs})", fact.relation)
        }
        _ => write!(f, "{}({})", fact.relation, fact.values.iter().join(", ")),
    }
}

impl Display for ConcreteFact {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        fmt_fact(f, self, None)
    }
}

impl Display for RuleSet {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        for fact in self.facts() {
            fmt_fact(f, fact, self.shape_of(&fact.relation))?;
            writeln!(f, ".")?;
        }
        for rule in self.rules() {
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Atom, HeadAtom};

    #[test]
    fn values_print_as_literals() {
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        assert_eq!(Value::str("a\"b\n").to_string(), r#""a\"b\n""#);
        assert_eq!(Value::keyword("red").to_string(), ":red");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn rule_prints_as_clause() {
        let rule = Rule {
            head: HeadAtom::named("q", [("a", HeadTerm::var("X"))]),
            positive: vec![Atom::named("point", [("x", Term::var("X")), ("y", Term::constant(2))])],
            negative: vec![Atom::ordered("r", vec![Term::var("X"), Term::Wildcard("_0".into())])],
            constraints: vec![Constraint { left: "X".into(), op: CmpOp::Ge, right: Term::constant(1) }],
        };
        assert_eq!(rule.to_string(), "q(a: X) :- point(x: X, y: 2), not r(X, _0), X >= 1.");
    }

    #[test]
    fn shapes_describe_addressing() {
        assert_eq!(Shape::Ordered(2).to_string(), "ordered/2");
        assert_eq!(Shape::Named(vec!["x".into(), "y".into()]).to_string(), "named {x, y}");
    }

    #[test]
    fn rule_set_prints_named_facts_with_fields() {
        let mut rules = RuleSet::default();
        rules.add_rule(Rule {
            head: HeadAtom::named("p", [("x", HeadTerm::Constant(Value::Int(1)))]),
            positive: vec![],
            negative: vec![],
            constraints: vec![],
        });
        rules.add_fact(ConcreteFact::named("p", [("x", Value::Int(2))]));
        assert_eq!(rules.to_string(), "p(x: 2).\np(x: 1).\n");
    }
}
