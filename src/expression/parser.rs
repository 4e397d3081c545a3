use core::fmt;
use std::{borrow::Cow, ops::Not, sync::Arc};

use sitefilters_filter_types::Value;

use super::{
    scanner::{Lexeme, Scanner, Token},
    Comparator, Condition, Expression, FilterCall, Primary,
};

#[derive(Debug)]
pub struct Parser<'a> {
    scanner: Scanner<'a>,
}

#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ParseError<'a> {
    UnexpectedToken {
        expected: Vec<Token>,
        got: Lexeme<'a>,
    },
    InvalidNumber(Lexeme<'a>),
}

impl<'a> fmt::Display for ParseError<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedToken { expected, got } => {
                write!(f, "Expected one of {expected:?}, got {got:?}")
            }
            Self::InvalidNumber(lx) => write!(f, "number literal `{}` is out of range", lx.value),
        }
    }
}

impl std::error::Error for ParseError<'_> {}

type Result<'a, T> = std::result::Result<T, ParseError<'a>>;

impl<'a> Parser<'a> {
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            scanner: Scanner::new(input),
        }
    }

    /// Parses the whole input as a value expression, `value | filter: args`.
    pub fn parse_value(mut self) -> Result<'a, Expression> {
        let expression = self.parse_expression()?;
        self.try_eat(Token::Eof)?;
        Ok(expression)
    }

    /// Parses the whole input as a condition, `left [comparator right]`.
    pub fn parse_condition(mut self) -> Result<'a, Condition> {
        let left = self.parse_expression()?;

        let lx = self.scanner.peek_non_whitespace();
        let comparator = match (lx.token, lx.value) {
            (Token::Comparator, "==") => Some(Comparator::Eq),
            (Token::Comparator, "!=" | "<>") => Some(Comparator::Ne),
            (Token::Comparator, "<") => Some(Comparator::Lt),
            (Token::Comparator, ">") => Some(Comparator::Gt),
            (Token::Comparator, "<=") => Some(Comparator::Le),
            (Token::Comparator, ">=") => Some(Comparator::Ge),
            (Token::Id, "contains") => Some(Comparator::Contains),
            _ => None,
        };

        let comparison = match comparator {
            Some(comparator) => {
                self.scanner.eat_token();
                Some((comparator, self.parse_expression()?))
            }
            None => None,
        };

        self.try_eat(Token::Eof)?;
        Ok(Condition { left, comparison })
    }

    fn parse_expression(&mut self) -> Result<'a, Expression> {
        let primary = self.parse_primary()?;
        let mut filters = Vec::new();

        while self.scanner.peek_non_whitespace().token == Token::Pipe {
            self.scanner.eat_token();
            filters.push(self.parse_filter()?);
        }

        Ok(Expression { primary, filters })
    }

    fn parse_filter(&mut self) -> Result<'a, FilterCall> {
        let name = Arc::from(self.try_eat(Token::Id)?.value);
        let mut args = Vec::new();

        if self.scanner.peek_non_whitespace().token == Token::Colon {
            self.scanner.eat_token();
            args.push(self.parse_primary()?);

            while self.scanner.peek_non_whitespace().token == Token::Comma {
                self.scanner.eat_token();
                args.push(self.parse_primary()?);
            }
        }

        Ok(FilterCall { name, args })
    }

    fn parse_primary(&mut self) -> Result<'a, Primary> {
        self.scanner.peek_non_whitespace();
        let lx = self.scanner.eat_token();
        match lx.token {
            Token::String => Ok(Primary::Literal(Value::String(
                parse_string_literal(lx.value).into(),
            ))),
            Token::Float => lx
                .value
                .parse()
                .map(|x| Primary::Literal(Value::Float(x)))
                .map_err(|_| ParseError::InvalidNumber(lx)),
            Token::Int => lx
                .value
                .parse()
                .map(|x| Primary::Literal(Value::Int(x)))
                .map_err(|_| ParseError::InvalidNumber(lx)),
            Token::Id => Ok(match lx.value {
                "true" => Primary::Literal(Value::Bool(true)),
                "false" => Primary::Literal(Value::Bool(false)),
                "nil" | "null" => Primary::Literal(Value::Null),
                "empty" => Primary::Empty,
                "blank" => Primary::Blank,
                root => self.parse_path(root)?,
            }),
            _ => Err(ParseError::UnexpectedToken {
                expected: vec![Token::String, Token::Float, Token::Int, Token::Id],
                got: lx,
            }),
        }
    }

    /// Property segments directly follow the root, without whitespace.
    fn parse_path(&mut self, root: &'a str) -> Result<'a, Primary> {
        let mut keys = Vec::new();

        loop {
            match self.scanner.peek_token().token {
                Token::Dot => {
                    self.scanner.eat_token();
                    let lx = self.scanner.eat_token();
                    match lx.token {
                        Token::Id | Token::Int => keys.push(Arc::from(lx.value)),
                        _ => {
                            return Err(ParseError::UnexpectedToken {
                                expected: vec![Token::Id, Token::Int],
                                got: lx,
                            })
                        }
                    }
                }
                Token::BracketOpen => {
                    self.scanner.eat_token();
                    self.scanner.peek_non_whitespace();
                    let lx = self.scanner.eat_token();
                    match lx.token {
                        Token::Int => keys.push(Arc::from(lx.value)),
                        Token::String => keys.push(parse_string_literal(lx.value).into()),
                        _ => {
                            return Err(ParseError::UnexpectedToken {
                                expected: vec![Token::Int, Token::String],
                                got: lx,
                            })
                        }
                    }
                    self.try_eat(Token::BracketClose)?;
                }
                _ => break,
            }
        }

        Ok(Primary::Path {
            root: root.into(),
            keys,
        })
    }

    #[inline]
    fn try_eat(&mut self, tk: Token) -> Result<'a, Lexeme<'a>> {
        let lx = self.scanner.peek_non_whitespace();
        self.scanner.eat_token();

        if lx.token == tk {
            Ok(lx)
        } else {
            Err(ParseError::UnexpectedToken {
                expected: vec![tk],
                got: lx,
            })
        }
    }
}

/// Strips the quotes (`"` or `'`) from a string literal and resolves `\`
/// escapes to the escaped character.
fn parse_string_literal(s: &str) -> Cow<'_, str> {
    debug_assert!(s.len() >= 2);
    let s = &s[1..s.len() - 1];
    let mut prune = vec![];

    let mut escape_next = false;
    for (i, s) in s.char_indices() {
        if escape_next {
            escape_next = false;
        } else if s == '\\' {
            escape_next = true;
            prune.push(i);
        }
    }

    if prune.is_empty() {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(
            s.char_indices()
                .filter_map(|(i, x)| prune.contains(&i).not().then_some(x))
                .collect(),
        )
    }
}
