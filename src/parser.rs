use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{Error, Span};
use crate::lexer::{Token, TokenKind, TokenValue};

/// Recursive descent parser. Grammar, loosest binding first:
///
/// ```text
/// expr   := term ( (PLUS|MINUS) term )*
/// term   := factor ( (MULTIPLY|DIVIDE) factor )*
/// factor := (PLUS|MINUS) factor | power
/// power  := atom ( POWER atom )*
/// atom   := NUMBER | IDENTIFIER | LPAREN expr RPAREN
/// ```
///
/// `power` folds to the left, so `2 ^ 3 ^ 2` is `(2 ^ 3) ^ 2`.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
}

/// Unary signs plus open parentheses allowed on one path through the tree.
pub const MAX_NESTING: usize = 256;

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        // Token streams built by hand may omit the terminator.
        if tokens.last().map(|token| token.kind) != Some(TokenKind::Eof) {
            let end = tokens.last().map(|token| token.span.end).unwrap_or(0);
            tokens.push(Token::new(
                TokenKind::Eof,
                TokenValue::Text("EOF".to_string()),
                Span::new(end, end),
            ));
        }

        Self {
            tokens,
            current: 0,
            depth: 0,
        }
    }

    /// Parse the entire token stream as one expression.
    pub fn parse(mut self) -> Result<Expr, Error> {
        let expr = self.expression()?;

        if !self.check(TokenKind::Eof) {
            return Err(self.unexpected());
        }

        Ok(expr)
    }

    fn expression(&mut self) -> Result<Expr, Error> {
        let mut expr = self.term()?;

        while self.match_kinds(&[TokenKind::Plus, TokenKind::Minus]) {
            let operator = BinaryOp::from_token(self.previous())?;
            let right = self.term()?;
            expr = binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, Error> {
        let mut expr = self.factor()?;

        while self.match_kinds(&[TokenKind::Multiply, TokenKind::Divide]) {
            let operator = BinaryOp::from_token(self.previous())?;
            let right = self.factor()?;
            expr = binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, Error> {
        if self.match_kinds(&[TokenKind::Plus, TokenKind::Minus]) {
            let operator = UnaryOp::from_token(self.previous())?;
            let start = self.previous().span.start;
            self.enter()?;
            let operand = self.factor();
            self.depth -= 1;
            let operand = operand?;
            let end = operand.span().end;

            return Ok(Expr::Unary {
                operator,
                operand: Box::new(operand),
                span: Span::new(start, end),
            });
        }

        self.power()
    }

    fn power(&mut self) -> Result<Expr, Error> {
        let mut expr = self.atom()?;

        while self.match_kinds(&[TokenKind::Power]) {
            let operator = BinaryOp::from_token(self.previous())?;
            let right = self.atom()?;
            expr = binary(expr, operator, right);
        }

        Ok(expr)
    }

    fn atom(&mut self) -> Result<Expr, Error> {
        let token = self.peek().clone();

        match token.kind {
            TokenKind::Number => {
                self.advance();
                let value = token.number().ok_or_else(|| Error::UnexpectedToken {
                    found: token.kind,
                    span: token.span,
                })?;
                Ok(Expr::Number {
                    value,
                    span: token.span,
                })
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Identifier {
                    name: token.text().to_string(),
                    span: token.span,
                })
            }
            TokenKind::LParen => {
                self.advance();
                self.enter()?;
                let expr = self.expression();
                self.depth -= 1;
                let expr = expr?;
                self.consume(TokenKind::RParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn enter(&mut self) -> Result<(), Error> {
        if self.depth >= MAX_NESTING {
            return Err(Error::NestingTooDeep {
                limit: MAX_NESTING,
                span: self.peek().span,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn match_kinds(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(*kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn consume(&mut self, kind: TokenKind) -> Result<&Token, Error> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let found = self.peek();
            Err(Error::ExpectedTokenMismatch {
                expected: kind,
                found: found.kind,
                span: found.span,
            })
        }
    }

    fn unexpected(&self) -> Error {
        let token = self.peek();
        Error::UnexpectedToken {
            found: token.kind,
            span: token.span,
        }
    }
}

fn binary(left: Expr, operator: BinaryOp, right: Expr) -> Expr {
    let span = Span::new(left.span().start, right.span().end);
    Expr::Binary {
        left: Box::new(left),
        operator,
        right: Box::new(right),
        span,
    }
}

/// Parse a token stream into a single expression tree.
pub fn parse(tokens: &[Token]) -> Result<Expr, Error> {
    let expr = Parser::new(tokens.to_vec()).parse()?;
    tracing::debug!(tree = %expr, "parsed expression");
    Ok(expr)
}
