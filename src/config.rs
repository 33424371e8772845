/// Resource bounds of one evaluation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Upper bound on the total number of facts in the store.
    pub max_facts: usize,
    /// Upper bound on the number of passes within a single stratum.
    pub max_iterations: usize,
}

pub const EVAL_CONFIG: EvalConfig = EvalConfig { max_facts: 1_000_000, max_iterations: 10_000 };

impl Default for EvalConfig {
    fn default() -> Self {
        EVAL_CONFIG
    }
}

impl EvalConfig {
    pub const fn unbounded() -> Self {
        Self { max_facts: usize::MAX, max_iterations: usize::MAX }
    }
    pub const fn with_max_facts(self, max_facts: usize) -> Self {
        Self { max_facts, ..self }
    }
    pub const fn with_max_iterations(self, max_iterations: usize) -> Self {
        Self { max_iterations, ..self }
    }
}
