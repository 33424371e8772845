use crate::{RuleSet, Stratification};
use itertools::Itertools;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Pairs a value with the rule set it indexes into, for display.
pub struct Pretty<'a, T> {
    pub t: &'a T,
    pub rule_set: &'a RuleSet,
}

impl Display for Pretty<'_, Stratification> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, stratum) in self.t.iter().enumerate() {
            let kind = if stratum.recursive { "recursive" } else { "non-recursive" };
            writeln!(f, "#{} [{kind}] {}", i + 1, stratum.relations.iter().join(", "))?;
            for rule in stratum.rules.iter().filter_map(|&r| self.rule_set.rules().get(r)) {
                writeln!(f, "  {rule}")?;
            }
        }
        Ok(())
    }
}

#[test]
fn strata_report() {
    let rule_set = crate::compile(
        "e(1, 2).
         p(X, Y) :- e(X, Y).
         p(X, Z) :- p(X, Y), e(Y, Z).
         lone(X) :- e(X, _), not p(_, X).",
    )
    .unwrap();
    let strata = crate::stratify(&rule_set).unwrap();
    let report = Pretty { t: &strata, rule_set: &rule_set }.to_string();
    assert_eq!(
        report,
        "#1 [recursive] p\n  p(X, Y) :- e(X, Y).\n  p(X, Z) :- p(X, Y), e(Y, Z).\n\
         #2 [non-recursive] lone\n  lone(X) :- e(X, _0), not p(_1, X).\n"
    );
}
