//! Recursive-descent parser for the expression language.

use smol_str::SmolStr;

use crate::error::EvalError;
use crate::snapshot::CapturedValue;

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::tokens::{tokenize, Token};

/// Parse an expression from source text.
pub fn parse_expression(source: &str) -> Result<Expr, EvalError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(EvalError::Parse("empty expression".to_string()));
    }
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    if parser.pos != parser.tokens.len() {
        return Err(EvalError::Parse(format!(
            "unexpected trailing input after expression ({} tokens left)",
            parser.tokens.len() - parser.pos
        )));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), EvalError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(EvalError::Parse(format!("expected {what}")))
        }
    }

    fn expression(&mut self) -> Result<Expr, EvalError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::OrOr) {
            let right = self.and_expr()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.equality()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                _ => break,
            };
            self.pos += 1;
            let right = self.comparison()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let right = self.additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Bang) {
            let expr = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        if self.eat(&Token::Minus) {
            let expr = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let field = self.ident("field name")?;
                expr = Expr::Field {
                    target: Box::new(expr),
                    field,
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.expression()?;
                self.expect(&Token::RBracket, "closing ']'")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        match self.bump() {
            Some(Token::LParen) => {
                let expr = self.expression()?;
                self.expect(&Token::RParen, "closing ')'")?;
                Ok(expr)
            }
            Some(Token::Dollar) => {
                let name = self.ident("variable name after '$'")?;
                Ok(Expr::Name(name))
            }
            Some(Token::Ident(name)) => Ok(Expr::Name(name)),
            Some(Token::True) => Ok(Expr::Literal(CapturedValue::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(CapturedValue::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(CapturedValue::Null)),
            Some(Token::Int(value)) => Ok(Expr::Literal(CapturedValue::Int(value))),
            Some(Token::Float(value)) => Ok(Expr::Literal(CapturedValue::Float(value))),
            Some(Token::Str(value)) => Ok(Expr::Literal(CapturedValue::Str(value))),
            Some(other) => Err(EvalError::Parse(format!("unexpected token {other:?}"))),
            None => Err(EvalError::Parse("unexpected end of expression".to_string())),
        }
    }

    fn ident(&mut self, what: &str) -> Result<SmolStr, EvalError> {
        match self.bump() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(EvalError::Parse(format!("expected {what}"))),
        }
    }
}
