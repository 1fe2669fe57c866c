//! Parser for `A INTERSECT B EXCEPT C` style queries.
//!
//! Grammar (keywords are case-insensitive, both operators share one
//! precedence level and associate to the left):
//!
//! ```text
//! query   := operand (("INTERSECT" | "EXCEPT") operand)+
//! operand := IDENT | "(" expr ")"
//! expr    := operand (("INTERSECT" | "EXCEPT") operand)*
//! ```

use setflow_operators::SetMode;

use crate::ast::SetExpr;
use crate::error::{PlanError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Op(SetMode),
    LParen,
    RParen,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();
    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        match c {
            '(' => {
                chars.next();
                tokens.push((pos, Token::LParen));
            }
            ')' => {
                chars.next();
                tokens.push((pos, Token::RParen));
            }
            c if is_ident_start(c) => {
                let mut end = pos;
                while let Some(&(i, c)) = chars.peek() {
                    if !is_ident_char(c) {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                let word = &src[pos..end];
                let token = if word.eq_ignore_ascii_case("INTERSECT") {
                    Token::Op(SetMode::Intersect)
                } else if word.eq_ignore_ascii_case("EXCEPT") {
                    Token::Op(SetMode::Except)
                } else {
                    Token::Ident(word.to_string())
                };
                tokens.push((pos, token));
            }
            other => return Err(PlanError::parse(pos, format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(_, t)| t)
    }

    fn pos(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .map(|(p, _)| *p)
            .unwrap_or(self.end)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.cursor).map(|(_, t)| t.clone());
        self.cursor += 1;
        t
    }

    fn expr(&mut self) -> Result<SetExpr> {
        let mut left = self.operand()?;
        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.bump();
            let right = self.operand()?;
            left = SetExpr::binary(op, left, right);
        }
        Ok(left)
    }

    fn operand(&mut self) -> Result<SetExpr> {
        let pos = self.pos();
        match self.bump() {
            Some(Token::Ident(name)) => Ok(SetExpr::Relation(name)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(PlanError::parse(pos, "unbalanced '('")),
                }
            }
            Some(Token::Op(op)) => Err(PlanError::parse(pos, format!("missing operand before {op}"))),
            Some(Token::RParen) => Err(PlanError::parse(pos, "unexpected ')'")),
            None => Err(PlanError::parse(pos, "missing operand")),
        }
    }
}

/// Parse a set query into a left-associative tree.
///
/// The top level must contain at least one INTERSECT or EXCEPT.
pub fn parse_set_query(src: &str) -> Result<SetExpr> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(PlanError::parse(0, "empty query"));
    }
    let mut parser = Parser {
        tokens,
        cursor: 0,
        end: src.len(),
    };
    let expr = parser.expr()?;
    if parser.peek().is_some() {
        let pos = parser.pos();
        let msg = match parser.peek() {
            Some(Token::RParen) => "unbalanced ')'",
            _ => "expected INTERSECT or EXCEPT",
        };
        return Err(PlanError::parse(pos, msg));
    }
    if let SetExpr::Relation(name) = &expr {
        return Err(PlanError::parse(
            0,
            format!("query '{name}' has no INTERSECT or EXCEPT"),
        ));
    }
    Ok(expr)
}
