//! Recursive-descent parser with precedence climbing for binary operators.

use loopjit_ir::{BinaryOp, FunctionDef, Literal, Node, Param, Span};

use crate::lexer::{Token, TokenKind};
use crate::ParseError;

pub struct Parser<'src> {
    source: &'src str,
    tokens: &'src [Token],
    pos: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, tokens: &'src [Token]) -> Self {
        Parser {
            source,
            tokens,
            pos: 0,
        }
    }

    // Token cursor

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn eof_span(&self) -> Span {
        let end = u32::try_from(self.source.len()).unwrap_or(u32::MAX);
        Span::new(end, end)
    }

    fn text(&self, token: Token) -> &'src str {
        &self.source[token.span.to_range()]
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::UnexpectedToken {
                expected,
                found: self.text(token).to_owned(),
                span: token.span,
            },
            None => ParseError::UnexpectedEof {
                expected,
                span: self.eof_span(),
            },
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.unexpected(kind.describe())),
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        let token = self.expect(TokenKind::Ident)?;
        Ok(self.text(token).to_owned())
    }

    pub fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(ParseError::TrailingInput { span: token.span }),
        }
    }

    // Items

    /// `fn name(params) { stmts }`
    pub fn function(&mut self) -> Result<FunctionDef, ParseError> {
        self.expect(TokenKind::Fn)?;
        let name = self.ident()?;
        self.expect(TokenKind::LParen)?;
        let params = self.names_until(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.eat(TokenKind::RBrace) {
            if self.peek().is_none() {
                return Err(self.unexpected("`}`"));
            }
            body.push(self.stmt()?);
        }
        Ok(FunctionDef {
            name,
            params: params.into_iter().map(Param::untyped).collect(),
            ret: None,
            body,
        })
    }

    /// Comma-separated identifiers terminated by `close` (consumed).
    fn names_until(&mut self, close: TokenKind) -> Result<Vec<String>, ParseError> {
        let mut names = Vec::new();
        if self.eat(close) {
            return Ok(names);
        }
        loop {
            names.push(self.ident()?);
            if self.eat(close) {
                return Ok(names);
            }
            self.expect(TokenKind::Comma)?;
        }
    }

    // Statements

    fn stmt(&mut self) -> Result<Node, ParseError> {
        if self.eat(TokenKind::Return) {
            if self.eat(TokenKind::Semi) {
                return Ok(Node::ret(None));
            }
            let value = self.expr()?;
            self.expect(TokenKind::Semi)?;
            return Ok(Node::ret(Some(value)));
        }

        let start = self.peek().map_or_else(|| self.eof_span(), |t| t.span);
        let expr = self.expr()?;
        if self.eat(TokenKind::Eq) {
            if !matches!(expr, Node::Symbol(_) | Node::Index { .. }) {
                return Err(ParseError::InvalidAssignTarget { span: start });
            }
            let value = self.expr()?;
            self.expect(TokenKind::Semi)?;
            return Ok(Node::assign(expr, value));
        }
        self.expect(TokenKind::Semi)?;
        Ok(expr)
    }

    // Expressions

    fn expr(&mut self) -> Result<Node, ParseError> {
        self.binary(1)
    }

    fn binary_op(kind: TokenKind) -> Option<BinaryOp> {
        match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Rem),
            _ => None,
        }
    }

    /// Left-associative precedence climbing starting at `min_prec`.
    fn binary(&mut self, min_prec: u8) -> Result<Node, ParseError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek_kind().and_then(Self::binary_op) {
            if op.precedence() < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(op.precedence() + 1)?;
            lhs = Node::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node, ParseError> {
        if self.eat(TokenKind::Minus) {
            let operand = self.unary()?;
            return Ok(match operand {
                Node::Literal(Literal::Int(value)) => Node::int(-value),
                Node::Literal(Literal::Float(value)) => Node::float(-value),
                other => Node::neg(other),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Node, ParseError> {
        let mut node = self.primary()?;
        loop {
            if self.eat(TokenKind::LParen) {
                let args = self.args()?;
                node = Node::Call {
                    callee: Box::new(node),
                    args,
                };
            } else if self.eat(TokenKind::LBracket) {
                let index = self.expr()?;
                self.expect(TokenKind::RBracket)?;
                node = Node::index(node, index);
            } else {
                return Ok(node);
            }
        }
    }

    /// Call arguments after `(`, through the closing `)`.
    fn args(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut args = Vec::new();
        if self.eat(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(TokenKind::RParen) {
                return Ok(args);
            }
            self.expect(TokenKind::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Node, ParseError> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected("expression"));
        };
        match token.kind {
            TokenKind::Int => {
                self.bump();
                let text = self.text(token);
                text.parse::<i64>()
                    .map(Node::int)
                    .map_err(|_| ParseError::InvalidLiteral {
                        text: text.to_owned(),
                        span: token.span,
                    })
            }
            TokenKind::Float => {
                self.bump();
                let text = self.text(token);
                text.parse::<f64>()
                    .map(Node::float)
                    .map_err(|_| ParseError::InvalidLiteral {
                        text: text.to_owned(),
                        span: token.span,
                    })
            }
            TokenKind::Ident => {
                self.bump();
                Ok(Node::sym(self.text(token)))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Pipe => {
                self.bump();
                let params = self.names_until(TokenKind::Pipe)?;
                let body = self.expr()?;
                Ok(Node::lambda(params, body))
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
