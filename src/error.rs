use crate::{Relation, Shape, Variable};
use itertools::Itertools;
use std::fmt;
use thiserror::Error;

/// 1-based line and column in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// Position of byte `offset` in `source`. Columns count characters.
    pub fn locate(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A message attached to a place in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub position: Option<Position>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "{position}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileErrorKind {
    #[error("fact contains non-constant term `{term}`")]
    NonConstantFact { term: String },
    #[error("unrecognized comparison operator `{0}`")]
    UnrecognizedOperator(String),
    #[error("left operand must be a variable, found `{0}`")]
    LeftOperandNotVariable(String),
    #[error("wildcard `{wildcard}` is not allowed in {place}")]
    MisplacedWildcard { wildcard: String, place: &'static str },
    #[error("duplicate field `{field}` in atom of relation `{relation}`")]
    DuplicateField { relation: Relation, field: String },
    #[error("unsafe variable `{variable}`: occurs in {place} but in no positive body atom")]
    UnsafeVariable { variable: Variable, place: &'static str },
    #[error("relation shape mismatch for `{relation}`: declared {expected}, used as {found}")]
    ShapeMismatch { relation: Relation, expected: Shape, found: Shape },
    #[error("relation `{relation}` participates in a negative cycle; unstratifiable")]
    Unstratifiable { relation: Relation },
}

/// A structural error found while compiling, with its source position when known.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub position: Option<Position>,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "at {position}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("fact limit of {limit} exceeded while adding to `{relation}`")]
    FactLimit { limit: usize, relation: Relation },
    #[error("iteration limit of {limit} passes exceeded in stratum {stratum}")]
    IterationLimit { limit: usize, stratum: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("syntax error: {}", .0.iter().join("; "))]
    Syntax(Vec<Diagnostic>),
    #[error("compile error {0}")]
    Compile(#[from] CompileError),
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, position: Position) -> Self {
        Self { kind, position: Some(position) }
    }
}

impl Error {
    /// Position of the first problem, if it has one.
    pub fn position(&self) -> Option<Position> {
        match self {
            Self::Syntax(diagnostics) => diagnostics.iter().find_map(|d| d.position),
            Self::Compile(e) => e.position,
            Self::Resource(_) => None,
        }
    }
    /// One diagnostic per reportable problem, for front ends printing `file:line:column`.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            Self::Syntax(diagnostics) => diagnostics.clone(),
            Self::Compile(e) => {
                vec![Diagnostic { message: e.kind.to_string(), position: e.position }]
            }
            Self::Resource(e) => vec![Diagnostic { message: e.to_string(), position: None }],
        }
    }
}
