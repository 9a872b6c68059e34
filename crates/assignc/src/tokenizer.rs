//! An eager tokenizer for assignment programs.
//!
//! The whole source is consumed before anything is handed to the parser. Runs of
//! letters and runs of digits are grouped with maximal munch by a three-state
//! machine (`Idle`, `InInteger`, `InVariable`); every other accepted character is
//! either a single-character token or whitespace.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Integer,
    Variable,
    Operator,
    Assign,
    Semicolon,
    /// Both `(` and `)`; the token text tells them apart.
    Parenthesis,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Integer => "integer",
            TokenKind::Variable => "variable",
            TokenKind::Operator => "operator",
            TokenKind::Assign => "'='",
            TokenKind::Semicolon => "';'",
            TokenKind::Parenthesis => "parenthesis",
        };
        f.write_str(name)
    }
}

/// Location of a character in the source. `offset` is in bytes, `line` and
/// `column` are 1-based and count characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn advance(&mut self, c: char) {
        self.offset += c.len_utf8();
        self.column += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }

    /// The numeric value of an `Integer` token.
    pub fn integer_value(&self) -> Option<u64> {
        match self.kind {
            TokenKind::Integer => self.text.parse().ok(),
            _ => None,
        }
    }

    pub fn is_opening_parenthesis(&self) -> bool {
        self.kind == TokenKind::Parenthesis && self.text == "("
    }

    pub fn is_closing_parenthesis(&self) -> bool {
        self.kind == TokenKind::Parenthesis && self.text == ")"
    }

    /// Byte range of the lexeme in the source it was read from.
    pub fn span(&self) -> Range<usize> {
        self.position.offset..self.position.offset + self.text.len()
    }
}

// Positions are diagnostic metadata; two tokens are the same token if they
// have the same kind and lexeme.
impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.text == other.text
    }
}

impl Eq for Token {}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.text)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeError {
    #[error("invalid character '{character}' at {position}")]
    InvalidCharacter { character: char, position: Position },
    #[error("integer literal '{text}' at {position} does not fit in 64 bits")]
    NumericOverflow { text: String, position: Position },
}

impl TokenizeError {
    pub fn position(&self) -> Position {
        match self {
            TokenizeError::InvalidCharacter { position, .. }
            | TokenizeError::NumericOverflow { position, .. } => *position,
        }
    }

    /// Byte range of the offending character or literal.
    pub fn span(&self) -> Range<usize> {
        match self {
            TokenizeError::InvalidCharacter {
                character,
                position,
            } => position.offset..position.offset + character.len_utf8(),
            TokenizeError::NumericOverflow { text, position } => {
                position.offset..position.offset + text.len()
            }
        }
    }
}

enum State {
    Idle,
    InInteger { start: Position, text: String },
    InVariable { start: Position, text: String },
}

struct Tokenizer {
    state: State,
    position: Position,
    tokens: Vec<Token>,
}

impl Tokenizer {
    fn new() -> Self {
        Self {
            state: State::Idle,
            position: Position::default(),
            tokens: vec![],
        }
    }

    fn run(mut self, source: &str) -> Result<Vec<Token>, TokenizeError> {
        for c in source.chars() {
            self.step(c)?;
            self.position.advance(c);
        }
        // A literal or name running into the end of input is still a token.
        self.flush()?;
        Ok(self.tokens)
    }

    fn step(&mut self, c: char) -> Result<(), TokenizeError> {
        if c.is_alphabetic() {
            self.push_letter(c)
        } else if c.is_ascii_digit() {
            self.push_digit(c)
        } else {
            self.flush()?;
            self.push_single(c)
        }
    }

    fn push_letter(&mut self, c: char) -> Result<(), TokenizeError> {
        if let State::InVariable { text, .. } = &mut self.state {
            text.push(c);
            return Ok(());
        }
        self.flush()?;
        self.state = State::InVariable {
            start: self.position,
            text: c.to_string(),
        };
        Ok(())
    }

    fn push_digit(&mut self, c: char) -> Result<(), TokenizeError> {
        if let State::InInteger { text, .. } = &mut self.state {
            text.push(c);
            return Ok(());
        }
        self.flush()?;
        self.state = State::InInteger {
            start: self.position,
            text: c.to_string(),
        };
        Ok(())
    }

    /// Emits the lexeme being accumulated, if any, and returns to `Idle`.
    fn flush(&mut self) -> Result<(), TokenizeError> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => {}
            State::InInteger { start, text } => {
                if text.parse::<u64>().is_err() {
                    return Err(TokenizeError::NumericOverflow {
                        text,
                        position: start,
                    });
                }
                self.tokens.push(Token::new(TokenKind::Integer, text, start));
            }
            State::InVariable { start, text } => {
                self.tokens.push(Token::new(TokenKind::Variable, text, start));
            }
        }
        Ok(())
    }

    fn push_single(&mut self, c: char) -> Result<(), TokenizeError> {
        let kind = match c {
            '+' | '-' | '*' | '/' => TokenKind::Operator,
            '=' => TokenKind::Assign,
            ';' => TokenKind::Semicolon,
            '(' | ')' => TokenKind::Parenthesis,
            ' ' | '\n' => return Ok(()),
            _ => {
                return Err(TokenizeError::InvalidCharacter {
                    character: c,
                    position: self.position,
                })
            }
        };
        self.tokens
            .push(Token::new(kind, c.to_string(), self.position));
        Ok(())
    }
}

#[tracing::instrument(level = "trace", skip_all)]
pub fn tokenize(source: &str) -> Result<Vec<Token>, TokenizeError> {
    let tokens = Tokenizer::new().run(source)?;
    trace!(token_count = tokens.len(), "Tokenized source");
    Ok(tokens)
}
