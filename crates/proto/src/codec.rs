//! Codec module - line framing, argument tokenizing and formatting
//!
//! Every line has the shape
//!
//! ```text
//! [ID[@REF]] COMMAND [ARGS...]
//! ```
//!
//! `ID` and `REF` are unsigned decimal numbers, `COMMAND` is ASCII
//! alphanumeric. Lines that do not fit this grammar are dropped by
//! [`decode`] without an answer.
//!
//! Arguments are separated by whitespace. Double quotes group a segment
//! into one argument; inside quotes a backslash escapes the next
//! character (`\n`, `\t`, `\r` and `\xHH` are translated).
//!
//! # Example
//!
//! ```
//! use kgp_proto::codec::{decode, encode, parse, Arg, Target};
//!
//! let line = decode("3@8 set info:name \"deep \\\"blue\\\"\"").unwrap();
//! assert_eq!((line.id, line.reference, line.command), (3, 8, "set"));
//!
//! let (mut key, mut value) = (String::new(), String::new());
//! parse(line.args, &mut [Target::Str(&mut key), Target::Str(&mut value)]).unwrap();
//! assert_eq!(value, "deep \"blue\"");
//!
//! assert_eq!(encode(4, 3, "error", &[Arg::Str("no")]), "4@3 error \"no\"");
//! ```

use std::fmt::{self, Write};
use std::iter::Peekable;
use std::str::Chars;

use arrayvec::ArrayVec;

use crate::core::Board;
use crate::types::State;

/// Upper bound on the number of arguments any command takes.
pub const MAX_ARGS: usize = 8;

/// One decoded input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Sender-chosen id, 0 if absent.
    pub id: u64,
    /// Id this line answers, 0 if absent.
    pub reference: u64,
    pub command: &'a str,
    /// Unparsed remainder, see [`parse`].
    pub args: &'a str,
}

/// Split a raw line into its header and argument string.
///
/// Returns None for lines that do not match the grammar, including ids
/// that overflow `u64`.
pub fn decode(line: &str) -> Option<Line<'_>> {
    let line = line.trim();
    let (head, rest) = split_token(line);

    let (id, reference, command, args) = if is_tag(head) && !rest.is_empty() {
        let (id, reference) = parse_tag(head)?;
        let (command, args) = split_token(rest);
        (id, reference, command, args)
    } else {
        (0, 0, head, rest)
    };

    if command.is_empty() || !command.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }

    Some(Line {
        id,
        reference,
        command,
        args,
    })
}

fn split_token(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_tag(s: &str) -> bool {
    match s.split_once('@') {
        Some((id, reference)) => is_digits(id) && is_digits(reference),
        None => is_digits(s),
    }
}

fn parse_tag(s: &str) -> Option<(u64, u64)> {
    match s.split_once('@') {
        Some((id, reference)) => Some((id.parse().ok()?, reference.parse().ok()?)),
        None => Some((s.parse().ok()?, 0)),
    }
}

/// Errors from assigning arguments to typed slots.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgError {
    #[error("argument mismatch: expected {expected}, found {found}")]
    Mismatch { expected: usize, found: usize },

    #[error("not an unsigned integer: {0:?}")]
    NotUnsigned(String),

    #[error("too many argument slots: {0}")]
    TooMany(usize),
}

/// A typed slot filled by [`parse`].
pub enum Target<'a> {
    Str(&'a mut String),
    Uint(&'a mut u64),
}

/// Tokenize `raw` and assign the tokens positionally to `targets`.
///
/// The token count must match the number of targets exactly, and at most
/// [`MAX_ARGS`] targets can be filled.
pub fn parse(raw: &str, targets: &mut [Target<'_>]) -> Result<(), ArgError> {
    if targets.len() > MAX_ARGS {
        return Err(ArgError::TooMany(targets.len()));
    }

    let mut tokens: ArrayVec<String, MAX_ARGS> = ArrayVec::new();
    let mut found = 0;
    for token in Tokens::new(raw) {
        found += 1;
        // Overflowing tokens are only counted.
        let _ = tokens.try_push(token);
    }

    if found != targets.len() {
        return Err(ArgError::Mismatch {
            expected: targets.len(),
            found,
        });
    }

    for (target, token) in targets.iter_mut().zip(tokens) {
        match target {
            Target::Str(slot) => **slot = token,
            Target::Uint(slot) => {
                **slot = token.parse().map_err(|_| ArgError::NotUnsigned(token))?;
            }
        }
    }
    Ok(())
}

/// Iterator over the whitespace/quote separated arguments of a line.
///
/// A quoted segment always yields a token, even when empty. An
/// unterminated quote runs to the end of the line.
pub struct Tokens<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Tokens<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            chars: raw.chars().peekable(),
        }
    }

    fn quoted(&mut self) -> String {
        let mut token = String::new();
        while let Some(c) = self.chars.next() {
            match c {
                '"' => break,
                '\\' => match self.chars.next() {
                    Some('n') => token.push('\n'),
                    Some('t') => token.push('\t'),
                    Some('r') => token.push('\r'),
                    Some('x') => self.hex(&mut token),
                    Some(other) => token.push(other),
                    None => break,
                },
                c => token.push(c),
            }
        }
        token
    }

    fn hex(&mut self, token: &mut String) {
        let mut digits = String::with_capacity(2);
        while digits.len() < 2 {
            match self.chars.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    digits.push(*c);
                    self.chars.next();
                }
                _ => break,
            }
        }
        match u8::from_str_radix(&digits, 16) {
            Ok(b) if digits.len() == 2 => token.push(char::from(b)),
            _ => {
                token.push('x');
                token.push_str(&digits);
            }
        }
    }
}

impl Iterator for Tokens<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}

        if self.chars.next_if_eq(&'"').is_some() {
            return Some(self.quoted());
        }

        let mut token = String::new();
        while let Some(c) = self.chars.next_if(|c| !c.is_whitespace() && *c != '"') {
            token.push(c);
        }
        (!token.is_empty()).then_some(token)
    }
}

/// An outgoing argument.
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    /// Sent as a quoted literal.
    Str(&'a str),
    Int(u64),
    /// Sent in its canonical form.
    Board(&'a Board),
    /// Sent as its label.
    State(State),
}

impl fmt::Display for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Str(s) => write_quoted(f, s),
            Arg::Int(n) => write!(f, "{n}"),
            Arg::Board(board) => write!(f, "{board}"),
            Arg::State(state) => f.write_str(state.as_str()),
        }
    }
}

fn write_quoted(out: &mut impl Write, s: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\t' => out.write_str("\\t")?,
            '\r' => out.write_str("\\r")?,
            c if c.is_ascii_control() => write!(out, "\\x{:02x}", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

/// Quote `s` the way string arguments are sent.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    // Writing into a String cannot fail.
    let _ = write_quoted(&mut out, s);
    out
}

/// Build `ID[@TO] COMMAND ARG...` without the line terminator.
///
/// `to == 0` omits the reference.
pub fn encode(id: u64, to: u64, command: &str, args: &[Arg<'_>]) -> String {
    let mut line = String::with_capacity(32);
    let _ = write!(line, "{id}");
    if to > 0 {
        let _ = write!(line, "@{to}");
    }
    line.push(' ');
    line.push_str(command);
    for arg in args {
        let _ = write!(line, " {arg}");
    }
    line
}
