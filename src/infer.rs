//! Bottom-up, semi-naive evaluation of a stratified rule set.

use crate::error::{CompileError, CompileErrorKind};
use crate::{
    stratify, substitute, Bindings, ConcreteFact, EvalConfig, Error, FactStore, ResourceError,
    Rule, RuleSet, Stratum,
};
use std::collections::HashMap;
use std::ops::Range;

/// Runs one rule set to its least fixpoint.
pub struct Evaluator<'r> {
    rule_set: &'r RuleSet,
    config: EvalConfig,
}

/// Relation lengths at the start of a pass. Since facts are only appended, a
/// length splits a relation into what existed then and what came after.
struct Snapshot<'r> {
    lens: HashMap<&'r str, usize>,
}

impl<'r> Snapshot<'r> {
    fn take(rules: &[&'r Rule], store: &FactStore) -> Self {
        let lens = rules
            .iter()
            .flat_map(|rule| &rule.positive)
            .map(|atom| (atom.relation.as_str(), store.count_of(&atom.relation)))
            .collect();
        Self { lens }
    }
    fn len(&self, relation: &str) -> usize {
        self.lens.get(relation).copied().unwrap_or(0)
    }
}

impl<'r> Evaluator<'r> {
    pub fn new(rule_set: &'r RuleSet, config: EvalConfig) -> Self {
        Self { rule_set, config }
    }

    pub fn run(&self) -> Result<FactStore, Error> {
        self.rule_set.check()?;
        let stratification = stratify(self.rule_set).map_err(|e| CompileError {
            kind: CompileErrorKind::Unstratifiable { relation: e.relation },
            position: None,
        })?;
        let mut store = FactStore::with_shapes(self.rule_set.shapes().clone());
        for fact in self.rule_set.facts() {
            self.admit(&mut store, fact.clone())?;
        }
        for (index, stratum) in stratification.iter().enumerate() {
            self.run_stratum(index + 1, stratum, &mut store)?;
        }
        tracing::debug!(facts = store.len(), strata = stratification.len(), "reached fixpoint");
        Ok(store)
    }

    /// Repeats passes over the stratum's rules until one derives nothing new.
    fn run_stratum(
        &self,
        number: usize,
        stratum: &Stratum,
        store: &mut FactStore,
    ) -> Result<(), ResourceError> {
        let rules: Vec<&Rule> =
            stratum.rules.iter().filter_map(|&r| self.rule_set.rules().get(r)).collect();
        tracing::debug!(
            stratum = number,
            rules = rules.len(),
            recursive = stratum.recursive,
            relations = ?stratum.relations,
            "evaluating stratum"
        );
        let mut previous: Option<Snapshot> = None;
        let mut passes = 0;
        loop {
            if passes == self.config.max_iterations {
                tracing::warn!(stratum = number, limit = passes, "iteration limit reached");
                return Err(ResourceError::IterationLimit { limit: passes, stratum: number });
            }
            passes += 1;
            let current = Snapshot::take(&rules, store);
            let mut derived = vec![];
            for rule in &rules {
                fire(rule, store, previous.as_ref(), &current, &mut derived);
            }
            let mut added = 0;
            for fact in derived {
                if self.admit(store, fact)? {
                    added += 1;
                }
            }
            tracing::trace!(stratum = number, pass = passes, added, "pass complete");
            if added == 0 {
                break;
            }
            previous = Some(current);
        }
        tracing::debug!(stratum = number, passes, facts = store.len(), "stratum closed");
        Ok(())
    }
}

impl Evaluator<'_> {
    /// Adds `fact` unless the store is already full. Returns true iff it was new.
    fn admit(&self, store: &mut FactStore, fact: ConcreteFact) -> Result<bool, ResourceError> {
        if store.contains(&fact) {
            return Ok(false);
        }
        if store.len() >= self.config.max_facts {
            tracing::warn!(limit = self.config.max_facts, relation = %fact.relation, "fact limit reached");
            return Err(ResourceError::FactLimit {
                limit: self.config.max_facts,
                relation: fact.relation,
            });
        }
        Ok(store.add_fact(fact))
    }
}

/// Derives the heads of every match of `rule` that uses at least one fact added
/// since `previous`. Without a previous pass every fact counts as new.
fn fire(
    rule: &Rule,
    store: &FactStore,
    previous: Option<&Snapshot>,
    current: &Snapshot,
    derived: &mut Vec<ConcreteFact>,
) {
    let everything = |relation: &str| 0..current.len(relation);
    match previous {
        None => join(rule, store, |_, relation| everything(relation), derived),
        // rules without positive atoms cannot see anything new
        Some(_) if rule.positive.is_empty() => {}
        Some(previous) => {
            for delta in 0..rule.positive.len() {
                let ranges = |j: usize, relation: &str| {
                    let old = previous.len(relation).min(current.len(relation));
                    match j.cmp(&delta) {
                        std::cmp::Ordering::Less => 0..old,
                        std::cmp::Ordering::Equal => old..current.len(relation),
                        std::cmp::Ordering::Greater => everything(relation),
                    }
                };
                let relation = &rule.positive[delta].relation;
                if previous.len(relation) < current.len(relation) {
                    join(rule, store, ranges, derived);
                }
            }
        }
    }
}

/// Joins the positive atoms left to right, atom `j` reading the facts in
/// `range(j, relation)`, then filters by negated atoms and constraints.
fn join(
    rule: &Rule,
    store: &FactStore,
    range: impl Fn(usize, &str) -> Range<usize>,
    derived: &mut Vec<ConcreteFact>,
) {
    let mut frontier = vec![Bindings::new()];
    for (j, atom) in rule.positive.iter().enumerate() {
        let facts = store.facts_in(&atom.relation, range(j, &atom.relation));
        let mut next = vec![];
        for bindings in &frontier {
            next.extend(facts.iter().filter_map(|fact| atom.unify_fact(fact, bindings)));
        }
        frontier = next;
        if frontier.is_empty() {
            return;
        }
    }
    for bindings in frontier {
        let refuted = rule.negative.iter().any(|atom| match atom.ground(&bindings) {
            Some(fact) => store.contains(&fact),
            None => store.facts_of(&atom.relation).any(|f| atom.unify_fact(f, &bindings).is_some()),
        });
        if refuted || !rule.constraints.iter().all(|c| c.holds(&bindings)) {
            continue;
        }
        match substitute(&rule.head, &bindings) {
            Some(fact) => derived.push(fact),
            None => tracing::trace!(rule = %rule, "head not ground, skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Atom, HeadAtom, HeadTerm, Term, Value};

    fn run(source: &str) -> FactStore {
        crate::evaluate(&crate::compile(source).unwrap()).unwrap()
    }

    fn ints(store: &FactStore, relation: &str) -> Vec<Vec<i64>> {
        let mut rows: Vec<Vec<i64>> = store
            .facts_of(relation)
            .map(|fact| {
                fact.values
                    .iter()
                    .map(|v| match v {
                        Value::Int(i) => *i,
                        other => panic!("not an int: {other}"),
                    })
                    .collect()
            })
            .collect();
        rows.sort();
        rows
    }

    #[test]
    fn transitive_closure() {
        let store = run("edge(1, 2). edge(2, 3).
             path(X, Y) :- edge(X, Y).
             path(X, Z) :- path(X, Y), edge(Y, Z).");
        assert_eq!(ints(&store, "path"), vec![vec![1, 2], vec![1, 3], vec![2, 3]]);
    }

    #[test]
    fn closure_over_a_cycle_terminates() {
        let store = run("e(1, 2). e(2, 3). e(3, 1).
             r(X, Y) :- e(X, Y).
             r(X, Z) :- r(X, Y), r(Y, Z).");
        assert_eq!(store.count_of("r"), 9);
    }

    #[test]
    fn negation_reads_the_closed_lower_stratum() {
        let store = run("a(1). a(2). b(1).
             c(X) :- a(X), not b(X).");
        assert_eq!(ints(&store, "c"), vec![vec![2]]);

        let store = run("e(1, 2). e(2, 3). n(1). n(2). n(3).
             reach(X, Y) :- e(X, Y).
             reach(X, Z) :- reach(X, Y), e(Y, Z).
             source(X) :- n(X), not reach(_, X).");
        assert_eq!(ints(&store, "source"), vec![vec![1]]);
    }

    #[test]
    fn named_atoms() {
        let store = run("Point(x: 1, y: 2). Point(y: 3, x: 4).
             Q(a: X) :- Point(x: X, y: 2).");
        let facts: Vec<_> = store.facts_of("Q").collect();
        assert_eq!(facts.len(), 1);
        assert_eq!(store.field(facts[0], "a"), Some(&Value::Int(1)));
        assert_eq!(store.to_string().lines().last(), Some("Q(a: 1)."));
    }

    #[test]
    fn constraints_filter_bindings() {
        let store = run("n(1). n(2). n(3).
             big(X) :- n(X), X > 1.");
        assert_eq!(ints(&store, "big"), vec![vec![2], vec![3]]);

        let store = run("v(1). v(1.5). v(\"x\"). v(:k).
             lt2(X) :- v(X), X < 2.
             other(X) :- v(X), X != 1.");
        assert_eq!(store.count_of("lt2"), 2);
        assert_eq!(store.count_of("other"), 3);
    }

    #[test]
    fn rules_without_positive_atoms_fire_once() {
        let mut rule_set = RuleSet::default();
        rule_set.add_rule(Rule {
            head: HeadAtom::ordered("seed", vec![HeadTerm::Constant(Value::Int(0))]),
            positive: vec![],
            negative: vec![Atom::ordered("blocked", vec![Term::constant(0)])],
            constraints: vec![],
        });
        let store = crate::evaluate(&rule_set).unwrap();
        assert!(store.contains(&ConcreteFact::new("seed", [Value::Int(0)])));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn fact_limit_is_enforced() {
        let rule_set = crate::compile(
            "e(1, 2). e(2, 3). e(3, 4).
             p(X, Y) :- e(X, Y).
             p(X, Z) :- p(X, Y), e(Y, Z).",
        )
        .unwrap();
        let config = EvalConfig::default().with_max_facts(5);
        let err = crate::evaluate_with(&rule_set, &config).unwrap_err();
        assert_eq!(err, Error::Resource(ResourceError::FactLimit { limit: 5, relation: "p".into() }));
        assert!(crate::evaluate_with(&rule_set, &config.with_max_facts(9)).is_ok());
    }

    #[test]
    fn iteration_limit_is_enforced() {
        let rule_set = crate::compile(
            "e(1, 2). e(2, 3). e(3, 4). e(4, 5).
             p(X, Y) :- e(X, Y).
             p(X, Z) :- p(X, Y), e(Y, Z).",
        )
        .unwrap();
        let config = EvalConfig::default().with_max_iterations(2);
        let err = crate::evaluate_with(&rule_set, &config).unwrap_err();
        assert_eq!(err, Error::Resource(ResourceError::IterationLimit { limit: 2, stratum: 1 }));
        assert!(crate::evaluate_with(&rule_set, &EvalConfig::unbounded()).is_ok());
    }

    #[test]
    fn programmatic_negative_cycle_is_reported() {
        let mut rule_set = RuleSet::default();
        rule_set.add_fact(ConcreteFact::new("q", [Value::Int(1)]));
        rule_set.add_rule(Rule {
            head: HeadAtom::ordered("p", vec![HeadTerm::var("X")]),
            positive: vec![Atom::ordered("q", vec![Term::var("X")])],
            negative: vec![Atom::ordered("p", vec![Term::var("X")])],
            constraints: vec![],
        });
        let err = crate::evaluate(&rule_set).unwrap_err();
        assert_eq!(err.position(), None);
        assert!(err.to_string().contains("unstratifiable"), "{err}");
    }

    #[test]
    fn explicit_facts_count_against_the_fact_limit() {
        let rule_set = crate::compile("n(1). n(2). n(3). m(X) :- n(X).").unwrap();
        let err = crate::evaluate_with(&rule_set, &EvalConfig::default().with_max_facts(2)).unwrap_err();
        assert_eq!(err, Error::Resource(ResourceError::FactLimit { limit: 2, relation: "n".into() }));
        let full = EvalConfig::default().with_max_facts(3);
        let err = crate::evaluate_with(&rule_set, &full).unwrap_err();
        assert_eq!(err, Error::Resource(ResourceError::FactLimit { limit: 3, relation: "m".into() }));
    }

    #[test]
    fn hand_built_rule_sets_are_checked_before_evaluation() {
        let mut rule_set = RuleSet::default();
        rule_set.add_fact(ConcreteFact::new("q", [Value::Int(1)]));
        rule_set.add_rule(Rule {
            head: HeadAtom::ordered("p", vec![HeadTerm::var("Y")]),
            positive: vec![Atom::ordered("q", vec![Term::var("X")])],
            negative: vec![],
            constraints: vec![],
        });
        let err = crate::evaluate(&rule_set).unwrap_err();
        let Error::Compile(e) = &err else { panic!("expected compile error, got {err}") };
        assert_eq!(e.kind, CompileErrorKind::UnsafeVariable { variable: "Y".into(), place: "the rule head" });
        assert_eq!(err.position(), None);

        let mut rule_set = RuleSet::default();
        rule_set.add_fact(ConcreteFact::new("q", [Value::Int(1)]));
        rule_set.add_fact(ConcreteFact::new("q", [Value::Int(1), Value::Int(2)]));
        let err = crate::evaluate(&rule_set).unwrap_err();
        assert!(err.to_string().contains("shape mismatch"), "{err}");
    }
}
