//! Syntax tree produced by [`crate::parse`]. Every node keeps the slice of source
//! text it came from, so positions can be recovered for diagnostics.

use crate::error::Position;
use crate::Value;

/// A lexeme borrowed from the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub lexeme: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TermNode<'a> {
    Literal { token: Token<'a>, value: Value },
    Identifier(Token<'a>),
    Wildcard(Token<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgsNode<'a> {
    Ordered(Vec<TermNode<'a>>),
    Named(Vec<(Token<'a>, TermNode<'a>)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtomNode<'a> {
    pub relation: Token<'a>,
    pub args: ArgsNode<'a>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralNode<'a> {
    Positive(AtomNode<'a>),
    Negated(AtomNode<'a>),
    Comparison { left: TermNode<'a>, op: Token<'a>, right: TermNode<'a> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClauseNode<'a> {
    Fact(AtomNode<'a>),
    Rule { head: AtomNode<'a>, body: Vec<LiteralNode<'a>> },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program<'a> {
    pub clauses: Vec<ClauseNode<'a>>,
}

impl<'a> Token<'a> {
    pub fn new(lexeme: &'a str) -> Self {
        Self { lexeme }
    }
    /// Byte offset of this token in `source`; 0 if the token is not a slice of it.
    pub fn offset(&self, source: &str) -> usize {
        (self.lexeme.as_ptr() as usize)
            .checked_sub(source.as_ptr() as usize)
            .filter(|&offset| offset <= source.len())
            .unwrap_or(0)
    }
    pub fn position(&self, source: &str) -> Position {
        Position::locate(source, self.offset(source))
    }
}

impl<'a> TermNode<'a> {
    pub fn token(&self) -> Token<'a> {
        match self {
            Self::Literal { token, .. } | Self::Identifier(token) | Self::Wildcard(token) => *token,
        }
    }
}

impl<'a> AtomNode<'a> {
    pub fn terms(&self) -> impl Iterator<Item = &TermNode<'a>> + '_ {
        let (ordered, named) = match &self.args {
            ArgsNode::Ordered(terms) => (Some(terms.iter()), None),
            ArgsNode::Named(fields) => (None, Some(fields.iter().map(|(_, term)| term))),
        };
        ordered.into_iter().flatten().chain(named.into_iter().flatten())
    }
}

impl<'a> ClauseNode<'a> {
    pub fn head(&self) -> &AtomNode<'a> {
        match self {
            Self::Fact(head) | Self::Rule { head, .. } => head,
        }
    }
}
