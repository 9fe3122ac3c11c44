//! A small SQL lexer for mapping `source` fragments.
//!
//! Mapping sources are plain `SELECT` statements with `{placeholder}` style
//! variables sprinkled in. We never need a full SQL AST here: placeholder
//! extraction, alias detection and filter realignment only look at short token
//! windows. Lexing first keeps string literals and quoted identifiers from
//! leaking into those scans.
//!
//! The lexer is total: any character it does not recognize becomes
//! `SqlToken::Other`, so malformed fragments still produce a token stream.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while, take_while1},
    character::complete::{char as pchar, digit1},
    combinator::{map, opt, recognize, verify},
    multi::many0,
    sequence::{delimited, pair, tuple},
    IResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlToken<'a> {
    /// Bare identifier or keyword (`age`, `SELECT`, `isnan`).
    Ident(&'a str),
    /// Double-quoted identifier; the payload excludes the quotes.
    Quoted(&'a str),
    /// Single-quoted string literal; the payload includes the quotes.
    Str(&'a str),
    Number(&'a str),
    /// Comparison operator (`=`, `<>`, `!=`, `<`, `>`, `<=`, `>=`).
    Op(&'a str),
    /// `{name}` template variable; the payload is the name.
    Placeholder(&'a str),
    Punct(char),
    Other(char),
}

impl<'a> SqlToken<'a> {
    pub fn ident(&self) -> Option<&'a str> {
        match self {
            SqlToken::Ident(s) => Some(s),
            _ => None,
        }
    }

    /// Identifier-like text: bare or quoted identifiers.
    pub fn name(&self) -> Option<&'a str> {
        match self {
            SqlToken::Ident(s) | SqlToken::Quoted(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, SqlToken::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }

    pub fn is_op(&self, op: &str) -> bool {
        matches!(self, SqlToken::Op(s) if *s == op)
    }
}

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub(crate) fn ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_ident_start), take_while(is_ident_continue)))(input)
}

fn quoted_ident(input: &str) -> IResult<&str, &str> {
    delimited(pchar('"'), take_while(|c| c != '"'), pchar('"'))(input)
}

/// `{name}` or `{"column name"}`; a bare name may start with a digit (`{0}`
/// is legal in Ontop templates).
pub(crate) fn placeholder(input: &str) -> IResult<&str, &str> {
    delimited(
        pchar('{'),
        alt((
            verify(quoted_ident, |name: &str| !name.is_empty()),
            take_while1(is_ident_continue),
        )),
        pchar('}'),
    )(input)
}

/// Placeholder at the start of `input`: its name and the text after it.
pub fn placeholder_at(input: &str) -> Option<(&str, &str)> {
    placeholder(input).ok().map(|(rest, name)| (name, rest))
}

/// `{name}` as written into a target, quoted when `name` is not a run of
/// identifier characters so that `placeholder_at` reads the same name back.
/// Names containing `"` are not representable.
pub fn placeholder_text(name: &str) -> String {
    if !name.is_empty() && name.chars().all(is_ident_continue) {
        format!("{{{name}}}")
    } else {
        format!("{{\"{name}\"}}")
    }
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        pchar('\''),
        many0(alt((tag("''"), is_not("'")))),
        pchar('\''),
    ))(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((digit1, opt(pair(pchar('.'), digit1)))))(input)
}

fn operator(input: &str) -> IResult<&str, &str> {
    alt((
        tag("<>"),
        tag("!="),
        tag("<="),
        tag(">="),
        tag("="),
        tag("<"),
        tag(">"),
    ))(input)
}

fn token(input: &str) -> IResult<&str, SqlToken<'_>> {
    alt((
        map(placeholder, SqlToken::Placeholder),
        map(quoted_ident, SqlToken::Quoted),
        map(string_literal, SqlToken::Str),
        map(number, SqlToken::Number),
        map(ident, SqlToken::Ident),
        map(operator, SqlToken::Op),
        map(
            alt((
                pchar(','),
                pchar('('),
                pchar(')'),
                pchar('.'),
                pchar('*'),
                pchar(';'),
            )),
            SqlToken::Punct,
        ),
    ))(input)
}

/// Tokenize a SQL fragment. Whitespace is dropped.
pub fn tokenize(src: &str) -> Vec<SqlToken<'_>> {
    let mut tokens = Vec::new();
    let mut rest = src;
    loop {
        rest = rest.trim_start();
        let Some(first) = rest.chars().next() else {
            break;
        };
        match token(rest) {
            Ok((next, tok)) => {
                tokens.push(tok);
                rest = next;
            }
            Err(_) => {
                tokens.push(SqlToken::Other(first));
                rest = &rest[first.len_utf8()..];
            }
        }
    }
    tokens
}
