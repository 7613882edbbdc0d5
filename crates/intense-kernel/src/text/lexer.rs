//! Tokenizer for canonical context and op text.

use crate::error::{IntenseError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    LAngle,
    RAngle,
    LBracket,
    RBracket,
    Colon,
    Plus,
    /// `-`, `--` or `---`.
    Dashes(u8),
    Alpha,
    Omega,
    Ident(String),
    Str(String),
    /// Raw number text, kept so integer dimensions can be told apart.
    Number(String),
    Binary(Vec<u8>),
    Bound(Vec<u8>),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LAngle => f.write_str("'<'"),
            Self::RAngle => f.write_str("'>'"),
            Self::LBracket => f.write_str("'['"),
            Self::RBracket => f.write_str("']'"),
            Self::Colon => f.write_str("':'"),
            Self::Plus => f.write_str("'+'"),
            Self::Dashes(n) => write!(f, "'{}'", "-".repeat(usize::from(*n))),
            Self::Alpha => f.write_str("'~'"),
            Self::Omega => f.write_str("'^'"),
            Self::Ident(s) => write!(f, "identifier '{s}'"),
            Self::Str(_) => f.write_str("string literal"),
            Self::Number(n) => write!(f, "number {n}"),
            Self::Binary(_) => f.write_str("binary literal"),
            Self::Bound(_) => f.write_str("bound literal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lexed {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Lexed>> {
    let bytes = input.as_bytes();
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let b = bytes[pos];
        let token = match b {
            b' ' | b'\t' | b'\n' | b'\r' => {
                pos += 1;
                continue;
            }
            b'<' => single(&mut pos, Token::LAngle),
            b'>' => single(&mut pos, Token::RAngle),
            b'[' => single(&mut pos, Token::LBracket),
            b']' => single(&mut pos, Token::RBracket),
            b':' => single(&mut pos, Token::Colon),
            b'+' => single(&mut pos, Token::Plus),
            b'~' => single(&mut pos, Token::Alpha),
            b'^' => single(&mut pos, Token::Omega),
            b'-' => {
                let run = bytes[pos..].iter().take_while(|&&c| c == b'-').count();
                let next = bytes.get(pos + run).copied();
                if run == 1 && next.is_some_and(|c| c.is_ascii_digit()) {
                    lex_number(bytes, &mut pos)
                } else if run <= 3 {
                    pos += run;
                    // run is 1..=3 here
                    Token::Dashes(run as u8)
                } else {
                    return Err(IntenseError::parse(start, "too many '-' in clear marker"));
                }
            }
            b'0'..=b'9' => lex_number(bytes, &mut pos),
            b'"' => lex_string(input, &mut pos)?,
            b'#' => Token::Binary(lex_hex(input, &mut pos)?),
            b'@' => Token::Bound(lex_hex(input, &mut pos)?),
            c if c == b'_' || c.is_ascii_alphabetic() => {
                let len = bytes[pos..]
                    .iter()
                    .take_while(|c| **c == b'_' || c.is_ascii_alphanumeric())
                    .count();
                pos += len;
                Token::Ident(input[start..pos].to_owned())
            }
            _ => {
                let ch = input[start..].chars().next().unwrap_or('?');
                return Err(IntenseError::parse(start, format!("unexpected character '{ch}'")));
            }
        };
        out.push(Lexed {
            token,
            offset: start,
        });
    }
    Ok(out)
}

fn single(pos: &mut usize, token: Token) -> Token {
    *pos += 1;
    token
}

fn count_digits(bytes: &[u8], from: usize) -> usize {
    bytes[from..].iter().take_while(|c| c.is_ascii_digit()).count()
}

fn lex_number(bytes: &[u8], pos: &mut usize) -> Token {
    let start = *pos;
    let mut end = start;
    if bytes[end] == b'-' {
        end += 1;
    }
    end += count_digits(bytes, end);
    if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
        end += 1;
        end += count_digits(bytes, end);
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let digits = count_digits(bytes, exp);
        if digits > 0 {
            end = exp + digits;
        }
    }
    *pos = end;
    // number text is pure ASCII
    Token::Number(String::from_utf8_lossy(&bytes[start..end]).into_owned())
}

fn lex_string(input: &str, pos: &mut usize) -> Result<Token> {
    let start = *pos;
    let mut out = String::new();
    let mut chars = input[start + 1..].char_indices();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '"' => {
                *pos = start + 1 + i + 1;
                return Ok(Token::Str(out));
            }
            '\\' => {
                let escaped = match chars.next() {
                    Some((_, '\\')) => '\\',
                    Some((_, '"')) => '"',
                    Some((_, 'n')) => '\n',
                    Some((_, 't')) => '\t',
                    Some((_, 'r')) => '\r',
                    Some((j, other)) => {
                        return Err(IntenseError::parse(
                            start + 1 + j,
                            format!("unknown escape '\\{other}'"),
                        ));
                    }
                    None => break,
                };
                out.push(escaped);
            }
            other => out.push(other),
        }
    }
    Err(IntenseError::parse(start, "unterminated string literal"))
}

fn lex_hex(input: &str, pos: &mut usize) -> Result<Vec<u8>> {
    let start = *pos;
    let len = input.as_bytes()[start + 1..]
        .iter()
        .take_while(|c| c.is_ascii_hexdigit())
        .count();
    let digits = &input[start + 1..start + 1 + len];
    *pos = start + 1 + len;
    hex::decode(digits).map_err(|e| IntenseError::parse(start, format!("bad hex literal: {e}")))
}
