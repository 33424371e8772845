use crate::ast::{ArgsNode, AtomNode, ClauseNode, LiteralNode, Program, TermNode, Token};
use crate::error::{Diagnostic, Position};
use crate::Value;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while, take_while1},
    character::complete::{char as nomchar, digit1, multispace1, not_line_ending, satisfy},
    combinator::{consumed, cut, map as nommap, map_res, opt, recognize, value},
    error::{context, VerboseError, VerboseErrorKind},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
};
pub type IResult<I, O, E = VerboseError<I>> = Result<(I, O), nom::Err<E>>;

//////////////////////////////////////

type In<'a> = &'a str;

pub fn comment(s: In) -> IResult<In, In> {
    let percent = recognize(pair(nomchar('%'), not_line_ending));
    let slashes = recognize(pair(tag("//"), not_line_ending));
    alt((percent, slashes))(s)
}

/// Whitespace and comments.
pub fn ws(s: In) -> IResult<In, ()> {
    value((), many0(alt((multispace1, comment))))(s)
}

pub fn wsl<'a, F, O>(inner: F) -> impl FnMut(In<'a>) -> IResult<In<'a>, O>
where
    F: FnMut(In<'a>) -> IResult<In<'a>, O>,
{
    preceded(ws, inner)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn identifier(s: In) -> IResult<In, In> {
    recognize(pair(satisfy(char::is_alphabetic), take_while(is_ident_char)))(s)
}

pub fn wildcard(s: In) -> IResult<In, In> {
    recognize(pair(nomchar('_'), take_while(is_ident_char)))(s)
}

pub fn integer(s: In) -> IResult<In, i64> {
    map_res(recognize(pair(opt(nomchar('-')), digit1)), |s: In| s.parse::<i64>())(s)
}

pub fn float(s: In) -> IResult<In, f64> {
    let exponent = tuple((
        alt((nomchar('e'), nomchar('E'))),
        opt(alt((nomchar('+'), nomchar('-')))),
        digit1,
    ));
    let p = recognize(tuple((opt(nomchar('-')), digit1, nomchar('.'), digit1, opt(exponent))));
    map_res(p, |s: In| s.parse::<f64>())(s)
}

pub fn string(s: In) -> IResult<In, String> {
    let escapes = alt((
        value("\\", nomchar('\\')),
        value("\"", nomchar('"')),
        value("\n", nomchar('n')),
        value("\t", nomchar('t')),
    ));
    let body = escaped_transform(is_not("\\\""), '\\', escapes);
    let body = nommap(opt(body), Option::unwrap_or_default);
    delimited(nomchar('"'), body, cut(context("string literal", nomchar('"'))))(s)
}

pub fn keyword(s: In) -> IResult<In, In> {
    preceded(nomchar(':'), identifier)(s)
}

pub fn literal(s: In) -> IResult<In, Value> {
    alt((
        nommap(float, Value::Float),
        nommap(integer, Value::Int),
        nommap(string, Value::Str),
        nommap(keyword, |k: In| Value::Keyword(k.into())),
    ))(s)
}

pub fn term(s: In) -> IResult<In, TermNode> {
    let lit = nommap(consumed(literal), |(lexeme, value)| TermNode::Literal {
        token: Token::new(lexeme),
        value,
    });
    let wil = nommap(wildcard, |lexeme| TermNode::Wildcard(Token::new(lexeme)));
    let ide = nommap(identifier, |lexeme: In| {
        let token = Token::new(lexeme);
        let value = match lexeme {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            _ => return TermNode::Identifier(token),
        };
        TermNode::Literal { token, value }
    });
    wsl(alt((lit, wil, ide)))(s)
}

pub fn named_arg(s: In) -> IResult<In, (Token, TermNode)> {
    let field = nommap(terminated(wsl(identifier), wsl(nomchar(':'))), Token::new);
    pair(field, term)(s)
}

pub fn args(s: In) -> IResult<In, ArgsNode> {
    let named = nommap(separated_list1(wsl(nomchar(',')), named_arg), ArgsNode::Named);
    let ordered = nommap(separated_list0(wsl(nomchar(',')), term), ArgsNode::Ordered);
    alt((named, ordered))(s)
}

pub fn atom(s: In) -> IResult<In, AtomNode> {
    let relation = nommap(wsl(identifier), Token::new);
    let arguments = delimited(wsl(nomchar('(')), args, cut(context("atom", wsl(nomchar(')')))));
    nommap(pair(relation, arguments), |(relation, args)| AtomNode { relation, args })(s)
}

pub fn neg(s: In) -> IResult<In, In> {
    wsl(terminated(tag("not"), multispace1))(s)
}

pub fn negated_atom(s: In) -> IResult<In, AtomNode> {
    preceded(neg, cut(context("negated atom", atom)))(s)
}

pub fn comparison_op(s: In) -> IResult<In, Token> {
    nommap(wsl(take_while1(|c: char| "<>=!".contains(c))), Token::new)(s)
}

pub fn body_literal(s: In) -> IResult<In, LiteralNode> {
    let ne = nommap(negated_atom, LiteralNode::Negated);
    let po = nommap(atom, LiteralNode::Positive);
    let co = nommap(
        tuple((term, comparison_op, cut(context("comparison", term)))),
        |(left, op, right)| LiteralNode::Comparison { left, op, right },
    );
    alt((ne, po, co))(s)
}

pub fn turnstile(s: In) -> IResult<In, In> {
    wsl(tag(":-"))(s)
}

pub fn clause(s: In) -> IResult<In, ClauseNode> {
    let (s, head) = context("clause head", atom)(s)?;
    let body = separated_list1(wsl(nomchar(',')), body_literal);
    let (s, body) = opt(preceded(turnstile, cut(context("rule body", body))))(s)?;
    let (s, _) = cut(context("end of clause", wsl(nomchar('.'))))(s)?;
    let clause = match body {
        Some(body) => ClauseNode::Rule { head, body },
        None => ClauseNode::Fact(head),
    };
    Ok((s, clause))
}

/// Parses a whole program. A clause that fails to parse is reported and skipped up to
/// its terminating `.`, so every malformed clause gets its own diagnostic.
pub fn program(source: &str) -> Result<Program<'_>, Vec<Diagnostic>> {
    let mut clauses = vec![];
    let mut diagnostics = vec![];
    let mut rest = source;
    loop {
        if let Ok((after, ())) = ws(rest) {
            rest = after;
        }
        if rest.is_empty() {
            break;
        }
        match clause(rest) {
            Ok((next, clause)) => {
                clauses.push(clause);
                rest = next;
            }
            Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
                diagnostics.push(diagnostic(source, &e));
                rest = skip_clause(rest);
            }
            Err(nom::Err::Incomplete(_)) => {
                diagnostics.push(Diagnostic {
                    message: "unexpected end of input".into(),
                    position: Some(Position::locate(source, source.len())),
                });
                break;
            }
        }
    }
    if diagnostics.is_empty() {
        Ok(Program { clauses })
    } else {
        Err(diagnostics)
    }
}

/// Skips past the next clause-terminating `.`, i.e. one outside a string literal
/// and not followed by a digit.
fn skip_clause(s: In) -> In {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '.' if !in_string && !s[i + 1..].starts_with(|c: char| c.is_ascii_digit()) => {
                return &s[i + 1..];
            }
            _ => {}
        }
    }
    &s[s.len()..]
}

fn diagnostic(source: &str, error: &VerboseError<In>) -> Diagnostic {
    let at = match error.errors.first() {
        Some((at, _)) => at.trim_start(),
        None => &source[source.len()..],
    };
    let label = error.errors.iter().find_map(|(_, kind)| match kind {
        VerboseErrorKind::Context(label) => Some(*label),
        _ => None,
    });
    let expected = match error.errors.first() {
        Some((_, VerboseErrorKind::Char(c))) => Some(*c),
        _ => None,
    };
    let found = match at.chars().next() {
        Some(c) => format!("`{c}`"),
        None => "end of input".to_string(),
    };
    let message = match (label, expected) {
        (Some(label), Some(c)) => format!("{label}: expected `{c}`, found {found}"),
        (Some(label), None) => format!("{label}: unexpected {found}"),
        (None, Some(c)) => format!("expected `{c}`, found {found}"),
        (None, None) => format!("unexpected {found}"),
    };
    Diagnostic { message, position: Some(Token::new(at).position(source)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexemes(atom: &AtomNode) -> Vec<String> {
        atom.terms().map(|t| t.token().lexeme.to_string()).collect()
    }

    #[test]
    fn parses_facts_rules_and_comments() {
        let source = "% edges\nedge(1, 2). // trailing\npath(X, Z) :- path(X, Y), edge(Y, Z).";
        let program = program(source).unwrap();
        assert_eq!(program.clauses.len(), 2);
        let ClauseNode::Fact(fact) = &program.clauses[0] else { panic!("expected fact") };
        assert_eq!(fact.relation.lexeme, "edge");
        assert_eq!(lexemes(fact), ["1", "2"]);
        let ClauseNode::Rule { head, body } = &program.clauses[1] else { panic!("expected rule") };
        assert_eq!(head.relation.lexeme, "path");
        assert_eq!(body.len(), 2);
        assert_eq!(head.relation.position(source).line, 3);
    }

    #[test]
    fn parses_named_atoms_negation_and_comparisons() {
        let source = "Q(a: X) :- Point(x: X, y: 2), not hidden(X), X >= 1.";
        let program = program(source).unwrap();
        let ClauseNode::Rule { head, body } = &program.clauses[0] else { panic!("expected rule") };
        assert!(matches!(head.args, ArgsNode::Named(ref fields) if fields.len() == 1));
        assert!(matches!(&body[0], LiteralNode::Positive(atom) if atom.relation.lexeme == "Point"));
        assert!(matches!(&body[1], LiteralNode::Negated(atom) if atom.relation.lexeme == "hidden"));
        match &body[2] {
            LiteralNode::Comparison { left, op, right } => {
                assert_eq!(left.token().lexeme, "X");
                assert_eq!(op.lexeme, ">=");
                assert!(matches!(right, TermNode::Literal { value: Value::Int(1), .. }));
            }
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn literal_terms() {
        let (_, t) = term(r#" "a\"b\n""#).unwrap();
        assert!(matches!(t, TermNode::Literal { value: Value::Str(ref s), .. } if s == "a\"b\n"));
        let (_, t) = term(r#""""#).unwrap();
        assert!(matches!(t, TermNode::Literal { value: Value::Str(ref s), .. } if s.is_empty()));
        let (_, t) = term("-2.5").unwrap();
        assert!(matches!(t, TermNode::Literal { value: Value::Float(f), .. } if f == -2.5));
        let (_, t) = term(":red").unwrap();
        assert!(matches!(t, TermNode::Literal { value: Value::Keyword(ref k), .. } if k == "red"));
        let (_, t) = term("null").unwrap();
        assert!(matches!(t, TermNode::Literal { value: Value::Null, .. }));
        let (_, t) = term("_tmp").unwrap();
        assert!(matches!(t, TermNode::Wildcard(token) if token.lexeme == "_tmp"));
        let (_, t) = term("nothing").unwrap();
        assert!(matches!(t, TermNode::Identifier(token) if token.lexeme == "nothing"));
    }

    #[test]
    fn relation_starting_with_not_is_positive() {
        let (_, literal) = body_literal("nothing(X)").unwrap();
        assert!(matches!(literal, LiteralNode::Positive(atom) if atom.relation.lexeme == "nothing"));
    }

    #[test]
    fn batches_syntax_errors_per_clause() {
        let source = "a(1.\nb(2).\nc(X) :- d(X) e(X).\nf(3).";
        let diagnostics = program(source).unwrap_err();
        assert_eq!(diagnostics.len(), 2, "{diagnostics:?}");
        assert_eq!(diagnostics[0].position.map(|p| p.line), Some(1));
        assert_eq!(diagnostics[1].position, Some(Position { line: 3, column: 14 }));
        assert!(diagnostics[1].message.contains("end of clause"), "{}", diagnostics[1]);
    }
}
