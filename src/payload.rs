//! Decoding of the author payloads produced by the upstream classifier.
//!
//! Payloads are Python dict literals such as
//! `{'author_id': 'VERG001', 'score': 0.93}`. They are parsed into a
//! [`Literal`] tree with nom and then checked against the expected shape; no
//! expression evaluation takes place.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace0, one_of},
    combinator::{all_consuming, map, map_res, opt, value},
    error::{Error as NomError, ErrorKind},
    multi::separated_list0,
    number::complete::recognize_float,
    sequence::{delimited, preceded, separated_pair, terminated},
    Finish, IResult,
};
use thiserror::Error;

/// Deepest container nesting accepted in a payload.
pub const MAX_LITERAL_DEPTH: usize = 64;

/// A parsed Python literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    /// Lists and tuples alike.
    List(Vec<Literal>),
    /// Entries in source order; duplicate keys are kept.
    Dict(Vec<(Literal, Literal)>),
}

impl Literal {
    fn type_name(&self) -> &'static str {
        match self {
            Literal::Str(_) => "str",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Bool(_) => "bool",
            Literal::None => "None",
            Literal::List(_) => "list",
            Literal::Dict(_) => "dict",
        }
    }

    /// Value of the last entry whose key is the string `key`, as a Python dict would.
    pub fn get(&self, key: &str) -> Option<&Literal> {
        match self {
            Literal::Dict(entries) => entries
                .iter()
                .rev()
                .find(|(k, _)| matches!(k, Literal::Str(s) if s == key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("syntax error at offset {offset}")]
    Syntax { offset: usize },

    #[error("expected a dict, found {0}")]
    NotADict(&'static str),

    #[error("missing author_id")]
    MissingAuthorId,

    #[error("author_id must be a non-empty str or int, found {0}")]
    InvalidAuthorId(String),

    #[error("containers nested deeper than {} levels", MAX_LITERAL_DEPTH)]
    TooDeep,
}

/// Typed view of an author payload.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorPayload {
    /// `None` when the classifier explicitly reported no author.
    pub author_id: Option<String>,
}

impl AuthorPayload {
    pub fn decode(input: &str) -> Result<Self, PayloadError> {
        Self::try_from(parse_literal(input)?)
    }
}

impl TryFrom<Literal> for AuthorPayload {
    type Error = PayloadError;

    fn try_from(literal: Literal) -> Result<Self, Self::Error> {
        if !matches!(literal, Literal::Dict(_)) {
            return Err(PayloadError::NotADict(literal.type_name()));
        }

        let author_id = match literal.get("author_id") {
            None => return Err(PayloadError::MissingAuthorId),
            Some(Literal::None) => None,
            Some(Literal::Str(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Literal::Int(n)) => Some(n.to_string()),
            Some(Literal::Str(_)) => {
                return Err(PayloadError::InvalidAuthorId("empty str".to_string()))
            }
            Some(other) => return Err(PayloadError::InvalidAuthorId(other.type_name().to_string())),
        };

        Ok(Self { author_id })
    }
}

/// Parse a complete Python literal.
pub fn parse_literal(input: &str) -> Result<Literal, PayloadError> {
    all_consuming(ws(|i| literal(i, 0)))(input)
        .finish()
        .map(|(_, literal)| literal)
        .map_err(|err| match err.code {
            ErrorKind::TooLarge => PayloadError::TooDeep,
            _ => PayloadError::Syntax {
                offset: input.len() - err.input.len(),
            },
        })
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// `depth` counts the containers enclosing `input`; past the cap parsing
/// fails hard instead of recursing further.
fn literal(input: &str, depth: usize) -> IResult<&str, Literal> {
    if depth > MAX_LITERAL_DEPTH {
        return Err(nom::Err::Failure(NomError::new(input, ErrorKind::TooLarge)));
    }
    alt((
        map(quoted_string, Literal::Str),
        keyword,
        number,
        map(|i| sequence('[', ']', i, depth), Literal::List),
        map(|i| sequence('(', ')', i, depth), Literal::List),
        |i| dict(i, depth),
    ))(input)
}

fn keyword(input: &str) -> IResult<&str, Literal> {
    alt((
        value(Literal::Bool(true), tag("True")),
        value(Literal::Bool(false), tag("False")),
        value(Literal::None, tag("None")),
    ))(input)
}

fn number(input: &str) -> IResult<&str, Literal> {
    map_res(recognize_float, |text: &str| {
        if text.contains(['.', 'e', 'E']) {
            text.parse::<f64>().map(Literal::Float)
        } else {
            Ok(text
                .parse::<i64>()
                .map(Literal::Int)
                .unwrap_or_else(|_| Literal::Float(text.parse::<f64>().unwrap_or(f64::NAN))))
        }
    })(input)
}

/// Single- or double-quoted string with Python backslash escapes.
fn quoted_string(input: &str) -> IResult<&str, String> {
    let (rest, quote) = one_of("'\"")(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();

    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    '\\' | '\'' | '"' => out.push(escaped),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            c if c == quote => return Ok((&rest[idx + c.len_utf8()..], out)),
            c => out.push(c),
        }
    }

    Err(nom::Err::Error(NomError::new(input, ErrorKind::Char)))
}

/// Comma-separated literals between `open` and `close`, trailing comma allowed.
fn sequence(open: char, close: char, input: &str, depth: usize) -> IResult<&str, Vec<Literal>> {
    delimited(
        char(open),
        terminated(
            separated_list0(char(','), ws(|i| literal(i, depth + 1))),
            opt(char(',')),
        ),
        preceded(multispace0, char(close)),
    )(input)
}

fn dict(input: &str, depth: usize) -> IResult<&str, Literal> {
    let entry = separated_pair(
        ws(|i| literal(i, depth + 1)),
        char(':'),
        ws(|i| literal(i, depth + 1)),
    );
    map(
        delimited(
            char('{'),
            terminated(separated_list0(char(','), entry), opt(char(','))),
            preceded(multispace0, char('}')),
        ),
        Literal::Dict,
    )(input)
}
