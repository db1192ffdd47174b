//! Small nom parsers used around SQL assembly.
//!
//! - a tokenizer that finds identifier paths (`age`, `Order.id`) in rendered
//!   SQL while skipping string literals and the projection tag, so names can
//!   be rewritten without touching literal text;
//! - the x-expression grammar for projection keys coming from requests:
//!
//! ```text
//! Order->id                    Order.id
//! Order->id.as.oid             Order.id AS oid
//! Order.id:oid                 Order.id AS oid
//! sum[Order->total].as.total   sum(Order.total) AS total
//! ```

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take, take_until, take_while, take_while1},
    character::complete::{char, multispace1, satisfy},
    combinator::{all_consuming, map, not, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::error::{CriteriaError, CriteriaResult};

/// Characters never accepted in x-expression text.
const FORBIDDEN: &[char] = &[' ', '(', ')', '%'];

/// A lexical piece of rendered SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Quoted string literal, quotes included.
    Literal(&'a str),
    /// `${...}` placeholder.
    Tag(&'a str),
    /// Identifier path: `name`, `Entity.property`.
    Path(&'a str),
    /// Anything else, copied through.
    Other(&'a str),
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse an identifier.
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(input)
}

fn path(input: &str) -> IResult<&str, &str> {
    recognize(pair(identifier, many0(pair(char('.'), identifier))))(input)
}

fn literal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        char('\''),
        many0(alt((tag("''"), is_not("'")))),
        char('\''),
    )))(input)
}

fn placeholder(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("${"), take_until("}"), char('}'))))(input)
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        map(literal, Token::Literal),
        map(placeholder, Token::Tag),
        map(path, Token::Path),
        map(
            take_while1(|c: char| !is_ident_start(c) && c != '\'' && c != '$'),
            Token::Other,
        ),
        map(take(1usize), Token::Other),
    ))(input)
}

/// Split SQL text into tokens. Concatenating the tokens yields the input.
pub fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut input = sql;
    while !input.is_empty() {
        match token(input) {
            Ok((rest, tok)) => {
                tokens.push(tok);
                input = rest;
            }
            Err(_) => {
                tokens.push(Token::Other(input));
                break;
            }
        }
    }
    tokens
}

/// Rewrite every identifier path for which `f` returns a replacement.
///
/// The path following an `AS` keyword is an alias and is never passed to `f`.
pub fn rewrite_paths<F>(sql: &str, mut f: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(sql.len());
    let mut after_as = false;
    for tok in tokenize(sql) {
        match tok {
            Token::Path(p) if after_as => {
                out.push_str(p);
                after_as = false;
            }
            Token::Path(p) if p.eq_ignore_ascii_case("AS") => {
                out.push_str(p);
                after_as = true;
            }
            Token::Path(p) => match f(p) {
                Some(replacement) => out.push_str(&replacement),
                None => out.push_str(p),
            },
            Token::Other(s) => {
                out.push_str(s);
                after_as &= s.trim().is_empty();
            }
            Token::Literal(s) | Token::Tag(s) => {
                out.push_str(s);
                after_as = false;
            }
        }
    }
    out
}

/// `(entity, property)` pairs for every two-part path, in order of appearance.
pub fn qualified_refs(sql: &str) -> Vec<(&str, &str)> {
    tokenize(sql)
        .into_iter()
        .filter_map(|tok| match tok {
            Token::Path(p) => p.split_once('.'),
            _ => None,
        })
        .filter(|(_, property)| !property.contains('.'))
        .collect()
}

// ========================================================================
// x-expressions
// ========================================================================

/// Parsed x-expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XExpr {
    pub func: Option<String>,
    pub entity: Option<String>,
    pub property: String,
    pub alias: Option<String>,
}

impl XExpr {
    /// `Entity.property` or the bare property.
    pub fn reference(&self) -> String {
        match &self.entity {
            Some(entity) => format!("{}.{}", entity, self.property),
            None => self.property.clone(),
        }
    }
}

impl fmt::Display for XExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.func {
            Some(func) => write!(f, "{}({})", func, self.reference())?,
            None => write!(f, "{}", self.reference())?,
        }
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

/// `ident` or `ident->ident` or `ident.ident`, not swallowing `.as.`.
fn x_path(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    pair(
        identifier,
        opt(preceded(
            pair(not(tag(".as.")), alt((tag("->"), tag(".")))),
            identifier,
        )),
    )(input)
}

fn x_alias(input: &str) -> IResult<&str, &str> {
    preceded(alt((tag(".as."), tag(":"))), identifier)(input)
}

fn x_body(input: &str) -> IResult<&str, (Option<&str>, (&str, Option<&str>))> {
    alt((
        map(
            pair(identifier, delimited(char('['), x_path, char(']'))),
            |(func, p)| (Some(func), p),
        ),
        map(x_path, |p| (None, p)),
    ))(input)
}

/// Validate and parse an x-expression.
///
/// Text containing a space, `(`, `)` or `%` is rejected outright.
pub fn x_expression(input: &str) -> CriteriaResult<XExpr> {
    if input.is_empty() || input.contains(FORBIDDEN) {
        return Err(CriteriaError::malformed(input));
    }
    let (_, ((func, (first, second)), alias)) =
        all_consuming(pair(x_body, opt(x_alias)))(input)
            .map_err(|_| CriteriaError::malformed(input))?;

    let (entity, property) = match second {
        Some(property) => (Some(first.to_string()), property.to_string()),
        None => (None, first.to_string()),
    };
    Ok(XExpr {
        func: func.map(str::to_string),
        entity,
        property,
        alias: alias.map(str::to_string),
    })
}

// ========================================================================
// Projections
// ========================================================================

fn as_keyword(input: &str) -> IResult<&str, &str> {
    delimited(multispace1, alt((tag("as"), tag("AS"))), multispace1)(input)
}

/// Parse a trusted projection: `Entity.property` or `Entity.property as alias`.
///
/// `->` is accepted as the path separator and normalized to `.`.
pub fn projection(input: &str) -> CriteriaResult<String> {
    let normalized = input.trim().replace("->", ".");
    let (_, (p, alias)) = all_consuming(pair(path, opt(preceded(as_keyword, identifier))))(
        normalized.as_str(),
    )
    .map_err(|_| CriteriaError::malformed(input))?;
    Ok(match alias {
        Some(alias) => format!("{} AS {}", p, alias),
        None => p.to_string(),
    })
}
