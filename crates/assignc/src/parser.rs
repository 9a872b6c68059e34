use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::tokenizer::{Position, Token, TokenKind};

/// Default bound on how deeply `parse_expression` may recurse. Every operator
/// in a chain adds a level, so this is also the longest accepted chain.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// The statement list at the root of every parse.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Ast {
    pub statements: Vec<Assignment>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub target: String,
    pub value: Expression,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Operator::Add),
            "-" => Some(Operator::Sub),
            "*" => Some(Operator::Mul),
            "/" => Some(Operator::Div),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Expression {
    Integer(u64),
    Variable(String),
    /// `( inner )`. Only the grouping is kept, not the parenthesis tokens.
    Group(Box<Expression>),
    Binary {
        op: Operator,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
}

impl Expression {
    pub fn binary(op: Operator, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn group(inner: Expression) -> Self {
        Expression::Group(Box::new(inner))
    }

    /// Node label: `Integer`, `Variable`, `Expression` for a group, or the
    /// operator symbol.
    pub fn kind(&self) -> &'static str {
        match self {
            Expression::Integer(_) => "Integer",
            Expression::Variable(_) => "Variable",
            Expression::Group(_) => "Expression",
            Expression::Binary { op, .. } => op.symbol(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum nesting of expressions, counting both parenthesized groups and
    /// the right-hand sides of operator chains. `a=1+2+3;` nests three deep.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected end of input{}", expected_suffix(.expected))]
    UnexpectedEndOfInput { expected: Vec<TokenKind> },
    #[error("unexpected {found} at {}, expected {expected}", .found.position)]
    UnexpectedTokenKind { found: Token, expected: TokenKind },
    #[error("parenthesis opened at {opening} is never closed{}", found_suffix(.found))]
    UnmatchedParenthesis {
        opening: Position,
        found: Option<Token>,
    },
    #[error("expected an integer or variable at {}, found {found}", .found.position)]
    InvalidTermToken { found: Token },
    #[error("expression nesting at {position} exceeds the limit of {limit}")]
    MaxNestingExceeded { limit: usize, position: Position },
    #[error("integer literal '{text}' at {position} does not fit in 64 bits")]
    NumericOverflow { text: String, position: Position },
}

fn expected_suffix(expected: &[TokenKind]) -> String {
    if expected.is_empty() {
        return String::new();
    }
    let kinds: Vec<String> = expected.iter().map(ToString::to_string).collect();
    format!(", expected {}", kinds.join(" or "))
}

fn found_suffix(found: &Option<Token>) -> String {
    match found {
        Some(token) => format!(", found {token} at {}", token.position),
        None => ", found end of input".to_string(),
    }
}

impl ParseError {
    /// The token the parser stopped at, when there was one.
    pub fn token(&self) -> Option<&Token> {
        match self {
            ParseError::UnexpectedTokenKind { found, .. }
            | ParseError::InvalidTermToken { found } => Some(found),
            ParseError::UnmatchedParenthesis { found, .. } => found.as_ref(),
            ParseError::UnexpectedEndOfInput { .. }
            | ParseError::MaxNestingExceeded { .. }
            | ParseError::NumericOverflow { .. } => None,
        }
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    depth: usize,
    open_groups: usize,
    options: ParseOptions,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], options: ParseOptions) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
            open_groups: 0,
            options,
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self, expected: &[TokenKind]) -> Result<&'a Token, ParseError> {
        self.tokens
            .get(self.position)
            .ok_or_else(|| ParseError::UnexpectedEndOfInput {
                expected: expected.to_vec(),
            })
    }

    /// What may follow a complete operand: another operator, or whatever ends
    /// the enclosing group or statement.
    fn operand_followers(&self) -> [TokenKind; 2] {
        let closer = if self.open_groups > 0 {
            TokenKind::Parenthesis
        } else {
            TokenKind::Semicolon
        };
        [TokenKind::Operator, closer]
    }

    fn consume(&mut self, expected: Option<TokenKind>) -> Result<&'a Token, ParseError> {
        let token = self
            .tokens
            .get(self.position)
            .ok_or_else(|| ParseError::UnexpectedEndOfInput {
                expected: expected.into_iter().collect(),
            })?;
        if let Some(expected) = expected {
            if token.kind != expected {
                return Err(ParseError::UnexpectedTokenKind {
                    found: token.clone(),
                    expected,
                });
            }
        }
        self.position += 1;
        Ok(token)
    }

    fn parse(mut self) -> Result<Ast, ParseError> {
        let mut ast = Ast::default();
        while let Some(statement) = self.parse_statement()? {
            ast.statements.push(statement);
        }
        Ok(ast)
    }

    fn parse_statement(&mut self) -> Result<Option<Assignment>, ParseError> {
        if self.is_at_end() {
            return Ok(None);
        }
        trace!(cursor = self.position, "Parsing statement");
        self.parse_assignment().map(Some)
    }

    fn parse_assignment(&mut self) -> Result<Assignment, ParseError> {
        let target = self.consume(Some(TokenKind::Variable))?.text.clone();
        self.consume(Some(TokenKind::Assign))?;
        let value = self.parse_expression()?;
        self.consume(Some(TokenKind::Semicolon))?;
        Ok(Assignment { target, value })
    }

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let next = self.peek(&[
            TokenKind::Integer,
            TokenKind::Variable,
            TokenKind::Parenthesis,
        ])?;
        if self.depth >= self.options.max_depth {
            return Err(ParseError::MaxNestingExceeded {
                limit: self.options.max_depth,
                position: next.position,
            });
        }
        trace!(cursor = self.position, depth = self.depth, "Parsing expression");

        self.depth += 1;
        let expression = if next.is_opening_parenthesis() {
            self.parse_parenthesized()
        } else {
            self.parse_chain()
        };
        self.depth -= 1;
        expression
    }

    /// `( Expression ) (Operator Term)?`
    ///
    /// Only a single term may follow the closing parenthesis; `(a)*b*c` stops
    /// after `b`.
    fn parse_parenthesized(&mut self) -> Result<Expression, ParseError> {
        let opening = self.consume(Some(TokenKind::Parenthesis))?;
        self.open_groups += 1;
        let inner = self.parse_expression()?;
        self.open_groups -= 1;

        match self.tokens.get(self.position) {
            Some(token) if token.is_closing_parenthesis() => {
                self.consume(Some(TokenKind::Parenthesis))?;
            }
            found => {
                return Err(ParseError::UnmatchedParenthesis {
                    opening: opening.position,
                    found: found.cloned(),
                })
            }
        }

        let group = Expression::group(inner);
        if self.peek(&self.operand_followers())?.kind == TokenKind::Operator {
            let op = self.parse_operator()?;
            let rhs = self.parse_term()?;
            return Ok(Expression::binary(op, group, rhs));
        }
        Ok(group)
    }

    /// `Term (Operator Expression)?`, which makes chains right-associative.
    fn parse_chain(&mut self) -> Result<Expression, ParseError> {
        let lhs = self.parse_term()?;
        if self.peek(&self.operand_followers())?.kind != TokenKind::Operator {
            return Ok(lhs);
        }
        let op = self.parse_operator()?;
        let rhs = self.parse_expression()?;
        Ok(Expression::binary(op, lhs, rhs))
    }

    fn parse_operator(&mut self) -> Result<Operator, ParseError> {
        let token = self.consume(Some(TokenKind::Operator))?;
        Operator::from_symbol(&token.text).ok_or_else(|| ParseError::UnexpectedTokenKind {
            found: token.clone(),
            expected: TokenKind::Operator,
        })
    }

    fn parse_term(&mut self) -> Result<Expression, ParseError> {
        let token = self.tokens.get(self.position).ok_or_else(|| {
            ParseError::UnexpectedEndOfInput {
                expected: vec![TokenKind::Integer, TokenKind::Variable],
            }
        })?;
        self.position += 1;
        match token.kind {
            TokenKind::Integer => token.integer_value().map(Expression::Integer).ok_or_else(|| {
                ParseError::NumericOverflow {
                    text: token.text.clone(),
                    position: token.position,
                }
            }),
            TokenKind::Variable => Ok(Expression::Variable(token.text.clone())),
            TokenKind::Operator
            | TokenKind::Assign
            | TokenKind::Semicolon
            | TokenKind::Parenthesis => Err(ParseError::InvalidTermToken {
                found: token.clone(),
            }),
        }
    }
}

pub fn parse(tokens: &[Token]) -> Result<Ast, ParseError> {
    parse_with_options(tokens, ParseOptions::default())
}

#[tracing::instrument(level = "trace", skip(tokens))]
pub fn parse_with_options(tokens: &[Token], options: ParseOptions) -> Result<Ast, ParseError> {
    let ast = Parser::new(tokens, options).parse()?;
    trace!(statement_count = ast.statements.len(), "Parsed token stream");
    Ok(ast)
}
