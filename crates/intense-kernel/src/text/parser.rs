//! Explicit-stack parser for canonical op and context text.
//!
//! Every `[` or `<` pushes a frame; the state machine never recurses, so
//! nesting depth is bounded by [`Limits::max_depth`] rather than the call
//! stack.

use super::lexer::{Lexed, Token};
use crate::config::Limits;
use crate::dimension::Dimension;
use crate::error::{IntenseError, Result};
use crate::op::ContextOp;
use crate::value::{BaseValue, BoundValue};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Only `<...>` frames, no clear markers.
    Context,
    Op,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Just opened; a term or the closing delimiter may follow.
    Open,
    /// After `+`; a term must follow.
    Term,
    /// After a term; `+` or the closing delimiter must follow.
    Separator,
    /// After `dim:`; a child frame must follow.
    Child,
}

struct Frame {
    vset: bool,
    state: State,
    base: Option<BaseValue>,
    clear_base: bool,
    clear_dims: bool,
    marked: bool,
    dims: BTreeMap<Dimension, ContextOp>,
    pending: Option<Dimension>,
}

impl Frame {
    fn open(vset: bool) -> Self {
        Self {
            vset,
            state: State::Open,
            base: None,
            clear_base: vset,
            clear_dims: vset,
            marked: false,
            dims: BTreeMap::new(),
            pending: None,
        }
    }

    fn closer(&self) -> Token {
        if self.vset { Token::RAngle } else { Token::RBracket }
    }

    fn finish(self) -> ContextOp {
        ContextOp::from_parts(self.base, self.clear_base, self.clear_dims, self.dims)
    }
}

fn base_literal(token: &Token, offset: usize) -> Result<Option<BaseValue>> {
    let value = match token {
        Token::Alpha => BaseValue::Alpha,
        Token::Omega => BaseValue::Omega,
        Token::Ident(s) | Token::Str(s) => BaseValue::String(s.clone()),
        Token::Number(n) => BaseValue::Number(
            n.parse()
                .map_err(|_| IntenseError::parse(offset, format!("bad number '{n}'")))?,
        ),
        Token::Binary(b) => BaseValue::Binary(b.clone()),
        Token::Bound(b) => BaseValue::Bound(BoundValue::from_packed(b.clone(), None)),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Interpret a token as a dimension, if it can be one.
pub(crate) fn dimension_literal(token: &Token, offset: usize) -> Result<Option<Dimension>> {
    match token {
        Token::Ident(s) => Ok(Some(Dimension::string(s.clone()))),
        Token::Str(s) => Ok(Some(Dimension::quoted(s.clone()))),
        Token::Number(n) => n
            .parse::<i32>()
            .map(|i| Some(Dimension::Integer(i)))
            .map_err(|_| {
                IntenseError::parse(offset, format!("dimension '{n}' is not a 32-bit integer"))
            }),
        _ => Ok(None),
    }
}

pub(crate) fn parse(tokens: &[Lexed], end: usize, mode: Mode, limits: &Limits) -> Result<ContextOp> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut result: Option<ContextOp> = None;
    let mut i = 0;

    while i < tokens.len() {
        let Lexed { token, offset } = &tokens[i];
        let offset = *offset;
        i += 1;

        if result.is_some() {
            return Err(IntenseError::parse(offset, format!("unexpected {token} after end of input")));
        }

        if stack.is_empty() {
            let vset = match token {
                Token::LAngle => true,
                Token::LBracket if mode == Mode::Op => false,
                other => {
                    let expected = if mode == Mode::Op { "'[' or '<'" } else { "'<'" };
                    return Err(IntenseError::parse(offset, format!("expected {expected}, found {other}")));
                }
            };
            stack.push(Frame::open(vset));
            continue;
        }
        let depth = stack.len();
        let Some(frame) = stack.last_mut() else {
            continue;
        };

        match frame.state {
            State::Child => {
                let vset = match token {
                    Token::LAngle => true,
                    Token::LBracket if !frame.vset => false,
                    other => {
                        let expected = if frame.vset { "'<'" } else { "'[' or '<'" };
                        return Err(IntenseError::parse(offset, format!("expected {expected}, found {other}")));
                    }
                };
                if depth >= limits.max_depth {
                    return Err(IntenseError::parse(
                        offset,
                        format!("nesting deeper than {}", limits.max_depth),
                    ));
                }
                stack.push(Frame::open(vset));
            }
            State::Separator => match token {
                Token::Plus => frame.state = State::Term,
                t if *t == frame.closer() => close(&mut stack, &mut result),
                Token::RAngle | Token::RBracket => {
                    return Err(IntenseError::parse(offset, format!("mismatched {token}, expected {}", frame.closer())));
                }
                other => {
                    return Err(IntenseError::parse(offset, format!("expected '+' before {other}")));
                }
            },
            State::Open | State::Term => {
                if *token == frame.closer() {
                    if frame.state == State::Term {
                        return Err(IntenseError::parse(offset, "expected a term after '+'"));
                    }
                    close(&mut stack, &mut result);
                    continue;
                }
                if let Token::Dashes(n) = token {
                    if frame.vset {
                        return Err(IntenseError::parse(offset, "clear markers are not allowed inside '<...>'"));
                    }
                    if frame.marked {
                        return Err(IntenseError::parse(offset, "duplicate clear marker"));
                    }
                    frame.marked = true;
                    frame.clear_base = *n != 2;
                    frame.clear_dims = *n >= 2;
                    frame.state = State::Separator;
                    continue;
                }
                let followed_by_colon = tokens.get(i).is_some_and(|next| next.token == Token::Colon);
                if followed_by_colon {
                    let Some(dim) = dimension_literal(token, offset)? else {
                        return Err(IntenseError::parse(offset, format!("{token} cannot be a dimension")));
                    };
                    if frame.dims.contains_key(&dim) {
                        return Err(IntenseError::parse(offset, format!("duplicate dimension '{dim}'")));
                    }
                    i += 1;
                    frame.pending = Some(dim);
                    frame.state = State::Child;
                    continue;
                }
                match base_literal(token, offset)? {
                    Some(value) => {
                        if frame.base.is_some() {
                            return Err(IntenseError::parse(offset, "duplicate base value"));
                        }
                        frame.base = Some(value);
                        frame.state = State::Separator;
                    }
                    None => {
                        return Err(IntenseError::parse(offset, format!("unexpected {token}")));
                    }
                }
            }
        }
    }

    result.ok_or_else(|| IntenseError::parse(end, "unexpected end of input"))
}

fn close(stack: &mut Vec<Frame>, result: &mut Option<ContextOp>) {
    let Some(frame) = stack.pop() else {
        return;
    };
    let mut node = frame.finish();
    match stack.last_mut() {
        None => {
            node.normalize(false);
            *result = Some(node);
        }
        Some(parent) => {
            if let Some(dim) = parent.pending.take() {
                parent.dims.insert(dim, node);
            }
            parent.state = State::Separator;
        }
    }
}
