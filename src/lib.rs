//! A stratified Datalog engine.
//!
//! Source text is parsed into an [`ast::Program`], compiled into a normalized
//! [`RuleSet`], stratified by its relation-dependency graph and evaluated
//! bottom-up into a closed [`FactStore`].
//!
//! ```
//! let rule_set = stratlog::compile(
//!     "edge(1, 2). edge(2, 3).
//!      path(X, Y) :- edge(X, Y).
//!      path(X, Z) :- path(X, Y), edge(Y, Z).",
//! )
//! .unwrap();
//! let store = stratlog::evaluate(&rule_set).unwrap();
//! assert_eq!(store.count_of("path"), 3);
//! ```

pub mod ast;
pub mod checking;
pub mod compile;
pub mod config;
pub mod debug;
pub mod error;
pub mod hash;
pub mod infer;
pub mod parse;
pub mod pretty;
pub mod store;
pub mod stratify;
pub mod text;
pub mod unify;
pub mod util;
pub mod value;


use std::collections::BTreeMap;

pub use config::{EvalConfig, EVAL_CONFIG};
pub use error::{CompileError, CompileErrorKind, Diagnostic, Error, Position, ResourceError};
pub use store::FactStore;
pub use stratify::{stratify, Stratification, Stratum, StratifyError};
pub use unify::{substitute, unify, Bindings};
use util::VecSet;

pub type Relation = String;
pub type Variable = String;

/// A concrete constant.
#[derive(Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Keyword(String),
}

#[derive(Clone)]
pub enum Term {
    Constant(Value),
    Variable(Variable),
    /// Matches anything and never binds. The name is cosmetic.
    Wildcard(String),
}

/// Terms allowed in a rule head: everything must be ground after substitution.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum HeadTerm {
    Constant(Value),
    Variable(Variable),
}

/// Argument addressing of an atom. Named fields are kept in sorted key order,
/// which is also the positional order of the relation's stored values.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Args<T> {
    Ordered(Vec<T>),
    Named(BTreeMap<String, T>),
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AtomOf<T> {
    pub relation: Relation,
    pub args: Args<T>,
}

pub type Atom = AtomOf<Term>;
pub type HeadAtom = AtomOf<HeadTerm>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub left: Variable,
    pub op: CmpOp,
    pub right: Term,
}

/// Equality and hashing ignore the order of body atoms and constraints.
#[derive(Clone)]
pub struct Rule {
    // invariant: all vars in head, negative and constraints are also in positive
    pub head: HeadAtom,
    pub positive: Vec<Atom>,
    pub negative: Vec<Atom>,
    pub constraints: Vec<Constraint>,
}

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConcreteFact {
    pub relation: Relation,
    pub values: Vec<Value>,
}

/// How a relation addresses its arguments, fixed across a whole program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    Ordered(usize),
    Named(Vec<String>),
}

/// Explicit facts, rules and relation shapes of a compiled program.
/// Equality and hashing ignore insertion order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    facts: VecSet<ConcreteFact>,
    rules: VecSet<Rule>,
    shapes: BTreeMap<Relation, Shape>,
}

impl<T> Args<T> {
    /// Terms in positional order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let (ordered, named) = match self {
            Args::Ordered(terms) => (Some(terms.iter()), None),
            Args::Named(fields) => (None, Some(fields.values())),
        };
        ordered.into_iter().flatten().chain(named.into_iter().flatten())
    }
    pub fn len(&self) -> usize {
        match self {
            Args::Ordered(terms) => terms.len(),
            Args::Named(fields) => fields.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn shape(&self) -> Shape {
        match self {
            Args::Ordered(terms) => Shape::Ordered(terms.len()),
            Args::Named(fields) => Shape::Named(fields.keys().cloned().collect()),
        }
    }
}

impl<T> AtomOf<T> {
    pub fn ordered(relation: impl Into<Relation>, terms: Vec<T>) -> Self {
        Self { relation: relation.into(), args: Args::Ordered(terms) }
    }
    pub fn named<K: Into<String>>(
        relation: impl Into<Relation>,
        fields: impl IntoIterator<Item = (K, T)>,
    ) -> Self {
        let fields = fields.into_iter().map(|(k, t)| (k.into(), t)).collect();
        Self { relation: relation.into(), args: Args::Named(fields) }
    }
    pub fn terms(&self) -> impl Iterator<Item = &T> + '_ {
        self.args.iter()
    }
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl Term {
    pub fn var(name: &str) -> Self {
        Self::Variable(name.into())
    }
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }
}

impl HeadTerm {
    pub fn var(name: &str) -> Self {
        Self::Variable(name.into())
    }
}

impl Shape {
    pub fn arity(&self) -> usize {
        match self {
            Shape::Ordered(arity) => *arity,
            Shape::Named(fields) => fields.len(),
        }
    }
}

impl ConcreteFact {
    pub fn new(relation: impl Into<Relation>, values: impl IntoIterator<Item = Value>) -> Self {
        Self { relation: relation.into(), values: values.into_iter().collect() }
    }
    /// Builds a fact of a named relation; values are stored in field-name order.
    pub fn named<K: Into<String>>(
        relation: impl Into<Relation>,
        fields: impl IntoIterator<Item = (K, Value)>,
    ) -> Self {
        let fields: BTreeMap<String, Value> =
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self { relation: relation.into(), values: fields.into_values().collect() }
    }
}

impl RuleSet {
    pub fn facts(&self) -> &[ConcreteFact] {
        self.facts.as_slice()
    }
    pub fn rules(&self) -> &[Rule] {
        self.rules.as_slice()
    }
    pub fn shapes(&self) -> &BTreeMap<Relation, Shape> {
        &self.shapes
    }
    pub fn shape_of(&self, relation: &str) -> Option<&Shape> {
        self.shapes.get(relation)
    }
    /// Adds an explicit fact. Returns false if it was already present.
    /// A relation seen for the first time is recorded as ordered.
    pub fn add_fact(&mut self, fact: ConcreteFact) -> bool {
        self.shapes
            .entry(fact.relation.clone())
            .or_insert_with(|| Shape::Ordered(fact.values.len()));
        self.facts.insert(fact)
    }
    /// Adds a rule. Returns false if a structurally equal rule was already present.
    /// Relations seen for the first time take the shape of their atom in this rule.
    pub fn add_rule(&mut self, rule: Rule) -> bool {
        self.record_shape(&rule.head.relation, rule.head.args.shape());
        for atom in rule.positive.iter().chain(&rule.negative) {
            self.record_shape(&atom.relation, atom.args.shape());
        }
        self.rules.insert(rule)
    }
    fn record_shape(&mut self, relation: &str, shape: Shape) {
        if !self.shapes.contains_key(relation) {
            self.shapes.insert(relation.to_owned(), shape);
        }
    }
    /// Returns a copy seeded with additional explicit facts.
    pub fn with_facts<'a>(&self, facts: impl IntoIterator<Item = &'a ConcreteFact>) -> Self {
        let mut out = self.clone();
        for fact in facts {
            out.add_fact(fact.clone());
        }
        out
    }
    pub(crate) fn from_parts(
        facts: VecSet<ConcreteFact>,
        rules: VecSet<Rule>,
        shapes: BTreeMap<Relation, Shape>,
    ) -> Self {
        Self { facts, rules, shapes }
    }
}

/// Parses source text into its syntax tree. All syntax errors are reported together.
pub fn parse(source: &str) -> Result<ast::Program<'_>, Error> {
    parse::program(source).map_err(Error::Syntax)
}

/// Parses and compiles source text into a stratifiable [`RuleSet`].
pub fn compile(source: &str) -> Result<RuleSet, Error> {
    let program = parse(source)?;
    Ok(compile::Compiler::new(source).compile_program(&program)?)
}

/// Evaluates a rule set to its fixpoint under the default [`EvalConfig`].
pub fn evaluate(rule_set: &RuleSet) -> Result<FactStore, Error> {
    evaluate_with(rule_set, &EvalConfig::default())
}

pub fn evaluate_with(rule_set: &RuleSet, config: &EvalConfig) -> Result<FactStore, Error> {
    infer::Evaluator::new(rule_set, *config).run()
}
