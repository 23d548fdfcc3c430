//! Recursive-descent parser producing an [`Expr`] tree.

use super::ExpressionError;
use super::lexer::{Token, TokenKind, tokenize};

/// Deepest nesting of calls and index accessors accepted.
pub const MAX_DEPTH: usize = 64;

/// Parsed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    String(String),
    Integer(i64),
    Call { name: String, args: Vec<Expr> },
    Property { target: Box<Expr>, name: String },
    Index { target: Box<Expr>, index: Box<Expr> },
}

pub(crate) fn parse(input: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };
    let expr = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(ExpressionError::Parse {
            offset: token.offset,
            message: format!("unexpected {}", describe(&token.kind)),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, ExpressionError> {
        let token = self.tokens.get(self.pos).cloned().ok_or(ExpressionError::Parse {
            offset: self.end,
            message: "unexpected end of expression".to_string(),
        })?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|token| &token.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ExpressionError> {
        let token = self.next()?;
        if token.kind == kind {
            Ok(())
        } else {
            Err(ExpressionError::Parse {
                offset: token.offset,
                message: format!(
                    "expected {}, found {}",
                    describe(&kind),
                    describe(&token.kind)
                ),
            })
        }
    }

    fn expression(&mut self) -> Result<Expr, ExpressionError> {
        if self.depth == MAX_DEPTH {
            return Err(ExpressionError::Parse {
                offset: self.peek().map_or(self.end, |token| token.offset),
                message: format!("expression nested deeper than {MAX_DEPTH} levels"),
            });
        }
        self.depth += 1;
        let expr = self.accessors();
        self.depth -= 1;
        expr
    }

    fn accessors(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let token = self.next()?;
                let TokenKind::Ident(name) = token.kind else {
                    return Err(ExpressionError::Parse {
                        offset: token.offset,
                        message: format!("expected property name, found {}", describe(&token.kind)),
                    });
                };
                expr = Expr::Property {
                    target: Box::new(expr),
                    name,
                };
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.expression()?;
                self.expect(TokenKind::RBracket)?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::String(value) => Ok(Expr::String(value)),
            TokenKind::Integer(value) => Ok(Expr::Integer(value)),
            TokenKind::Ident(name) => {
                self.expect(TokenKind::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&TokenKind::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if self.eat(&TokenKind::RParen) {
                            break;
                        }
                        self.expect(TokenKind::Comma)?;
                    }
                }
                Ok(Expr::Call { name, args })
            }
            other => Err(ExpressionError::Parse {
                offset: token.offset,
                message: format!("unexpected {}", describe(&other)),
            }),
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(name) => format!("identifier `{name}`"),
        TokenKind::String(_) => "string literal".to_string(),
        TokenKind::Integer(value) => format!("integer `{value}`"),
        TokenKind::LParen => "`(`".to_string(),
        TokenKind::RParen => "`)`".to_string(),
        TokenKind::LBracket => "`[`".to_string(),
        TokenKind::RBracket => "`]`".to_string(),
        TokenKind::Comma => "`,`".to_string(),
        TokenKind::Dot => "`.`".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn parses_nested_call_with_accessors() {
        let expr = parse("parameters('tags').zones[0]").expect("should parse");
        assert_eq!(
            expr,
            Expr::Index {
                target: Box::new(Expr::Property {
                    target: Box::new(call("parameters", vec![Expr::String("tags".to_string())])),
                    name: "zones".to_string(),
                }),
                index: Box::new(Expr::Integer(0)),
            }
        );
    }

    #[test]
    fn parses_zero_argument_call() {
        assert_eq!(parse("true()").expect("should parse"), call("true", vec![]));
    }

    #[test]
    fn reports_offset_of_trailing_garbage() {
        let err = parse("concat('a'))").expect_err("extra paren");
        assert_eq!(
            err,
            ExpressionError::Parse {
                offset: 11,
                message: "unexpected `)`".to_string(),
            }
        );
    }

    #[test]
    fn nesting_is_bounded() {
        let nested = |depth: usize| {
            format!("{}'x'{}", "toLower(".repeat(depth), ")".repeat(depth))
        };
        assert!(parse(&nested(MAX_DEPTH - 1)).is_ok());

        let err = parse(&nested(50_000)).expect_err("too deep");
        let ExpressionError::Parse { offset, message } = err else {
            panic!("expected a parse error, got {err:?}");
        };
        assert_eq!(offset, "toLower(".len() * MAX_DEPTH);
        assert_eq!(message, format!("expression nested deeper than {MAX_DEPTH} levels"));
    }

    #[test]
    fn bare_identifier_is_not_an_expression() {
        let err = parse("region").expect_err("identifiers must be called");
        assert_eq!(
            err,
            ExpressionError::Parse {
                offset: 6,
                message: "unexpected end of expression".to_string(),
            }
        );
    }
}
