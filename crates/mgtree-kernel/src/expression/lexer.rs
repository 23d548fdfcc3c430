//! Tokenizer for expression bodies.

use super::ExpressionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident(String),
    String(String),
    Integer(i64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let single = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            ',' => Some(TokenKind::Comma),
            '.' => Some(TokenKind::Dot),
            _ => None,
        };
        if let Some(kind) = single {
            chars.next();
            tokens.push(Token { kind, offset });
            continue;
        }

        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '\'' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, c)) = chars.next() {
                if c == '\'' {
                    if matches!(chars.peek(), Some((_, '\''))) {
                        chars.next();
                        value.push('\'');
                        continue;
                    }
                    closed = true;
                    break;
                }
                value.push(c);
            }
            if !closed {
                return Err(ExpressionError::Parse {
                    offset,
                    message: "unterminated string literal".to_string(),
                });
            }
            tokens.push(Token {
                kind: TokenKind::String(value),
                offset,
            });
            continue;
        }

        if c.is_ascii_digit() || c == '-' {
            let mut text = String::new();
            text.push(c);
            chars.next();
            while let Some(&(_, d)) = chars.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                text.push(d);
                chars.next();
            }
            let value = text.parse::<i64>().map_err(|_| ExpressionError::Parse {
                offset,
                message: format!("invalid integer `{text}`"),
            })?;
            tokens.push(Token {
                kind: TokenKind::Integer(value),
                offset,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if !(d.is_alphanumeric() || d == '_') {
                    break;
                }
                ident.push(d);
                chars.next();
            }
            tokens.push(Token {
                kind: TokenKind::Ident(ident),
                offset,
            });
            continue;
        }

        return Err(ExpressionError::Parse {
            offset,
            message: format!("unexpected character `{c}`"),
        });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("input should tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn tokenizes_call_with_escaped_quote() {
        assert_eq!(
            kinds("concat('it''s', -12)"),
            vec![
                TokenKind::Ident("concat".to_string()),
                TokenKind::LParen,
                TokenKind::String("it's".to_string()),
                TokenKind::Comma,
                TokenKind::Integer(-12),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn tokenizes_accessors() {
        assert_eq!(
            kinds("a().b[0]"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Dot,
                TokenKind::Ident("b".to_string()),
                TokenKind::LBracket,
                TokenKind::Integer(0),
                TokenKind::RBracket,
            ]
        );
    }

    #[test]
    fn rejects_stray_characters() {
        let err = tokenize("a(); b").expect_err("semicolon is not a token");
        assert_eq!(
            err,
            ExpressionError::Parse {
                offset: 3,
                message: "unexpected character `;`".to_string()
            }
        );
        assert!(tokenize("'open").is_err());
        assert!(tokenize("-").is_err());
    }
}
