//! Orders rules into strata so that negation only reads relations that are
//! already closed.
//!
//! Relations are nodes of a dependency graph with one edge per body atom,
//! pointing from the body relation to the rule's head relation. Each strongly
//! connected component becomes one stratum, in topological order. A negative
//! edge inside a component makes the program unstratifiable.

use crate::text::{Text, TextMap};
use crate::{Relation, RuleSet};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    to: Text,
    polarity: Polarity,
    rule: usize,
}

#[derive(Debug, Default)]
struct DependencyGraph {
    texts: TextMap,
    // outgoing edges, indexed by `Text::index`
    edges: Vec<Vec<Edge>>,
}

/// Rules evaluated together to a fixpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stratum {
    /// Indices into [`RuleSet::rules`], in rule order.
    pub rules: Vec<usize>,
    /// Relations defined by this stratum, in order of first appearance.
    pub relations: Vec<Relation>,
    /// More than one relation, or a relation depending on itself.
    pub recursive: bool,
}

/// Strata in evaluation order: dependencies first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stratification {
    pub strata: Vec<Stratum>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("relation `{relation}` participates in a negative cycle; unstratifiable")]
pub struct StratifyError {
    pub relation: Relation,
    /// Index of the rule carrying the negative edge.
    pub rule: usize,
}

impl DependencyGraph {
    fn node(&mut self, relation: &str) -> Text {
        let text = self.texts.intern(relation);
        if self.edges.len() <= text.index() {
            self.edges.resize_with(text.index() + 1, Vec::new);
        }
        text
    }

    fn from_rule_set(rule_set: &RuleSet) -> Self {
        let mut graph = Self::default();
        for (rule_index, rule) in rule_set.rules().iter().enumerate() {
            let head = graph.node(&rule.head.relation);
            let bodies = rule
                .positive
                .iter()
                .map(|atom| (atom, Polarity::Positive))
                .chain(rule.negative.iter().map(|atom| (atom, Polarity::Negative)));
            for (atom, polarity) in bodies {
                let from = graph.node(&atom.relation);
                graph.edges[from.index()].push(Edge { to: head, polarity, rule: rule_index });
            }
        }
        graph
    }

    fn len(&self) -> usize {
        self.edges.len()
    }

    /// Tarjan's algorithm with an explicit call stack. A component is completed
    /// only after every component reachable from it, so dependents get lower ids.
    fn components(&self) -> (Vec<usize>, usize) {
        const UNVISITED: usize = usize::MAX;
        let n = self.len();
        let mut index = vec![UNVISITED; n];
        let mut lowlink = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut component = vec![0; n];
        let mut count = 0;
        let mut next_index = 0;

        for root in 0..n {
            if index[root] != UNVISITED {
                continue;
            }
            let mut calls = vec![(root, 0)];
            index[root] = next_index;
            lowlink[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;

            while let Some(&mut (v, ref mut next_edge)) = calls.last_mut() {
                if let Some(edge) = self.edges[v].get(*next_edge) {
                    *next_edge += 1;
                    let w = edge.to.index();
                    if index[w] == UNVISITED {
                        index[w] = next_index;
                        lowlink[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        calls.push((w, 0));
                    } else if on_stack[w] {
                        lowlink[v] = lowlink[v].min(index[w]);
                    }
                    continue;
                }
                calls.pop();
                if let Some(&(parent, _)) = calls.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if lowlink[v] == index[v] {
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component[w] = count;
                        if w == v {
                            break;
                        }
                    }
                    count += 1;
                }
            }
        }
        (component, count)
    }
}

/// Partitions the rules of `rule_set` into strata.
pub fn stratify(rule_set: &RuleSet) -> Result<Stratification, StratifyError> {
    let graph = DependencyGraph::from_rule_set(rule_set);
    let (component, count) = graph.components();

    let mut recursive = vec![false; count];
    let mut first_violation: Option<(usize, Text)> = None;
    for (from, edges) in graph.edges.iter().enumerate() {
        for edge in edges {
            if component[from] != component[edge.to.index()] {
                continue;
            }
            recursive[component[from]] = true;
            if edge.polarity == Polarity::Negative
                && first_violation.map_or(true, |(rule, _)| edge.rule < rule)
            {
                first_violation = Some((edge.rule, Text::from_index(from)));
            }
        }
    }
    if let Some((rule, relation)) = first_violation {
        return Err(StratifyError { relation: graph.texts.get_str(relation).to_owned(), rule });
    }

    let mut members = vec![Vec::new(); count];
    for node in 0..graph.len() {
        members[component[node]].push(node);
    }
    let mut rules = vec![Vec::new(); count];
    for (rule_index, rule) in rule_set.rules().iter().enumerate() {
        if let Some(head) = graph.texts.get(&rule.head.relation) {
            rules[component[head.index()]].push(rule_index);
        }
    }

    let mut strata = vec![];
    for c in (0..count).rev() {
        if rules[c].is_empty() {
            continue;
        }
        strata.push(Stratum {
            rules: std::mem::take(&mut rules[c]),
            relations: members[c]
                .iter()
                .map(|&node| graph.texts.get_str(Text::from_index(node)).to_owned())
                .collect(),
            recursive: recursive[c] || members[c].len() > 1,
        });
    }
    Ok(Stratification { strata })
}

impl Stratification {
    pub fn len(&self) -> usize {
        self.strata.len()
    }
    pub fn is_empty(&self) -> bool {
        self.strata.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Stratum> {
        self.strata.iter()
    }
    /// Index of the stratum defining `relation`; `None` for relations defined only by facts.
    pub fn stratum_of(&self, relation: &str) -> Option<usize> {
        self.strata.iter().position(|s| s.relations.iter().any(|r| r == relation))
    }
}
