//! Canonical text for dimensions, contexts and ops.
//!
//! ```text
//! context   <base+dim:<...>+dim:<...>>
//! op        [marker+base+dim:[...]+dim:<...>]
//! marker    -  clear base   --  clear dims   ---  both
//! base      ~  ^  number  "string"  identifier  #hex  @hex
//! dim       identifier  "string"  integer
//! ```
//!
//! Identifiers used as bases parse as strings; canonical output always quotes
//! string bases. Numbers print in Rust's shortest round-trip form, so every
//! finite number survives a text round trip. NaN and the infinities have no
//! literal and do not.

mod lexer;
mod parser;

use crate::config::Limits;
use crate::context::Context;
use crate::dimension::{CompoundDimension, Dimension};
use crate::error::{IntenseError, Result};
use crate::op::ContextOp;
use lexer::Token;

/// `[A-Za-z_][A-Za-z0-9_]*`: strings that may appear unquoted as dimensions.
pub(crate) fn is_bare_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b == b'_' || b.is_ascii_alphabetic() => {}
        _ => return false,
    }
    bytes.all(|b| b == b'_' || b.is_ascii_alphanumeric())
}

/// Quote `s` as a string literal.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

pub fn parse_dimension(input: &str) -> Result<Dimension> {
    let tokens = lexer::tokenize(input)?;
    match tokens.as_slice() {
        [only] => parser::dimension_literal(&only.token, only.offset)?.ok_or_else(|| {
            IntenseError::parse(only.offset, format!("{} cannot be a dimension", only.token))
        }),
        [] => Err(IntenseError::parse(0, "empty dimension")),
        [_, extra, ..] => Err(IntenseError::parse(extra.offset, format!("unexpected {}", extra.token))),
    }
}

/// Parse `a:b:3`. The empty string is the empty path.
pub fn parse_compound(input: &str) -> Result<CompoundDimension> {
    let tokens = lexer::tokenize(input)?;
    let mut out = CompoundDimension::new();
    let mut expect_dim = true;
    for lexed in &tokens {
        if expect_dim {
            let dim = parser::dimension_literal(&lexed.token, lexed.offset)?.ok_or_else(|| {
                IntenseError::parse(lexed.offset, format!("{} cannot be a dimension", lexed.token))
            })?;
            out.push(dim);
        } else if lexed.token != Token::Colon {
            return Err(IntenseError::parse(lexed.offset, format!("expected ':', found {}", lexed.token)));
        }
        expect_dim = !expect_dim;
    }
    if expect_dim && !tokens.is_empty() {
        return Err(IntenseError::parse(input.len(), "path ends with ':'"));
    }
    Ok(out)
}

pub fn parse_context(input: &str, limits: &Limits) -> Result<Context> {
    let tokens = lexer::tokenize(input)?;
    let op = parser::parse(&tokens, input.len(), parser::Mode::Context, limits)?;
    Ok(Context::from(&op))
}

pub fn parse_op(input: &str, limits: &Limits) -> Result<ContextOp> {
    let tokens = lexer::tokenize(input)?;
    parser::parse(&tokens, input.len(), parser::Mode::Op, limits)
}
