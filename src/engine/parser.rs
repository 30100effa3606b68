//! Recursive-descent parser producing a [`Program`]
//!
//! Statement positions come straight from the first token of each statement;
//! the debugger snaps breakpoints to exactly these positions.

use std::sync::Arc;

use crate::common::{Error, Result};

use super::ast::{
    BinaryOp, Expr, ExprKind, FunctionDef, ObjectProp, Program, Stmt, StmtKind, UnaryOp,
};
use super::lexer::{tokenize, Token, TokenKind};

/// Parse a complete script.
pub fn parse(source: &str) -> Result<Program> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, idx: 0 };
    let mut body = Vec::new();
    while !parser.at(&TokenKind::Eof) {
        body.push(parser.statement()?);
    }
    Ok(Program { body })
}

/// Parse a single expression (used for conditions, log messages, watches).
pub fn parse_expression(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, idx: 0 };
    let expr = parser.expression()?;
    parser.expect(TokenKind::Eof, "end of expression")?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    idx: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.idx.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.idx < self.tokens.len() - 1 {
            self.idx += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if self.at(&kind) {
            Ok(self.bump())
        } else {
            let token = self.peek();
            Err(Error::parse(
                format!("expected {what}, found {:?}", token.kind),
                token.pos.line,
                token.pos.column,
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String> {
        let token = self.bump();
        match token.kind {
            TokenKind::Ident(name) => Ok(name),
            other => Err(Error::parse(
                format!("expected {what}, found {other:?}"),
                token.pos.line,
                token.pos.column,
            )),
        }
    }

    // === Statements ===

    fn statement(&mut self) -> Result<Stmt> {
        let pos = self.peek().pos;
        let kind = match &self.peek().kind {
            TokenKind::Var => {
                self.bump();
                let decl = self.var_decl()?;
                self.eat(&TokenKind::Semicolon);
                decl
            }
            TokenKind::If => {
                self.bump();
                self.if_stmt()?
            }
            TokenKind::While => {
                self.bump();
                self.expect(TokenKind::LParen, "'('")?;
                let cond = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                let body = self.branch_body()?;
                StmtKind::While { cond, body }
            }
            TokenKind::For => {
                self.bump();
                self.for_stmt()?
            }
            TokenKind::Function => {
                self.bump();
                let name = self.expect_ident("function name")?;
                let def = self.function_rest(Some(name), pos)?;
                StmtKind::FunctionDecl(Arc::new(def))
            }
            TokenKind::Return => {
                self.bump();
                let value = if self.at(&TokenKind::Semicolon)
                    || self.at(&TokenKind::RBrace)
                    || self.at(&TokenKind::Eof)
                {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.eat(&TokenKind::Semicolon);
                StmtKind::Return(value)
            }
            TokenKind::Break => {
                self.bump();
                self.eat(&TokenKind::Semicolon);
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.bump();
                self.eat(&TokenKind::Semicolon);
                StmtKind::Continue
            }
            TokenKind::Debugger => {
                self.bump();
                self.eat(&TokenKind::Semicolon);
                StmtKind::Debugger
            }
            TokenKind::LBrace => {
                self.bump();
                let body = self.block_rest()?;
                StmtKind::Block(body)
            }
            _ => {
                let expr = self.expression()?;
                self.eat(&TokenKind::Semicolon);
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt { pos, kind })
    }

    fn var_decl(&mut self) -> Result<StmtKind> {
        let name = self.expect_ident("variable name")?;
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(StmtKind::VarDecl { name, init })
    }

    fn if_stmt(&mut self) -> Result<StmtKind> {
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        let then_branch = self.branch_body()?;
        let else_branch = if self.eat(&TokenKind::Else) {
            if self.at(&TokenKind::If) {
                let pos = self.peek().pos;
                self.bump();
                let nested = self.if_stmt()?;
                Some(vec![Stmt { pos, kind: nested }])
            } else {
                Some(self.branch_body()?)
            }
        } else {
            None
        };
        Ok(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn for_stmt(&mut self) -> Result<StmtKind> {
        self.expect(TokenKind::LParen, "'('")?;
        let init = if self.at(&TokenKind::Semicolon) {
            self.bump();
            None
        } else {
            let pos = self.peek().pos;
            let kind = if self.eat(&TokenKind::Var) {
                self.var_decl()?
            } else {
                StmtKind::Expr(self.expression()?)
            };
            self.expect(TokenKind::Semicolon, "';'")?;
            Some(Box::new(Stmt { pos, kind }))
        };
        let cond = if self.at(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::Semicolon, "';'")?;
        let update = if self.at(&TokenKind::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.branch_body()?;
        Ok(StmtKind::For {
            init,
            cond,
            update,
            body,
        })
    }

    /// A block or a single statement, normalized to a statement list.
    fn branch_body(&mut self) -> Result<Vec<Stmt>> {
        if self.eat(&TokenKind::LBrace) {
            self.block_rest()
        } else {
            Ok(vec![self.statement()?])
        }
    }

    fn block_rest(&mut self) -> Result<Vec<Stmt>> {
        let mut body = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            body.push(self.statement()?);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(body)
    }

    fn function_rest(
        &mut self,
        name: Option<String>,
        pos: super::ast::Position,
    ) -> Result<FunctionDef> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                params.push(self.expect_ident("parameter name")?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let body = self.block_rest()?;
        Ok(FunctionDef {
            name,
            params,
            body,
            pos,
        })
    }

    // === Expressions ===

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let target = self.logical_or()?;
        if self.at(&TokenKind::Assign) {
            let token = self.bump();
            match target.kind {
                ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. } => {}
                _ => {
                    return Err(Error::parse(
                        "invalid assignment target",
                        token.pos.line,
                        token.pos.column,
                    ))
                }
            }
            let value = self.assignment()?;
            return Ok(Expr {
                pos: target.pos,
                kind: ExprKind::Assign {
                    target: Box::new(target),
                    value: Box::new(value),
                },
            });
        }
        Ok(target)
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut left = self.logical_and()?;
        while self.eat(&TokenKind::OrOr) {
            let right = self.logical_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut left = self.equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut left = self.relational()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEqEq => BinaryOp::EqStrict,
                TokenKind::NotEqEq => BinaryOp::NeStrict,
                TokenKind::EqEq => BinaryOp::EqLoose,
                TokenKind::NotEq => BinaryOp::NeLoose,
                _ => break,
            };
            self.bump();
            let right = self.relational()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn relational(&mut self) -> Result<Expr> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.bump();
            let right = self.additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.bump();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        let pos = self.peek().pos;
        match self.peek().kind {
            TokenKind::Bang => {
                self.bump();
                let operand = self.unary()?;
                Ok(Expr {
                    pos,
                    kind: ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                })
            }
            TokenKind::Minus => {
                self.bump();
                let operand = self.unary()?;
                Ok(Expr {
                    pos,
                    kind: ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                })
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let increment = self.bump().kind == TokenKind::PlusPlus;
                let target = self.unary()?;
                Ok(Expr {
                    pos,
                    kind: ExprKind::Update {
                        target: Box::new(target),
                        increment,
                        prefix: true,
                    },
                })
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.at(&TokenKind::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "')'")?;
                    expr = Expr {
                        pos: expr.pos,
                        kind: ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                    };
                }
                TokenKind::Dot => {
                    self.bump();
                    let property = self.expect_ident("property name")?;
                    expr = Expr {
                        pos: expr.pos,
                        kind: ExprKind::Member {
                            object: Box::new(expr),
                            property,
                        },
                    };
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr {
                        pos: expr.pos,
                        kind: ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let increment = self.bump().kind == TokenKind::PlusPlus;
                    expr = Expr {
                        pos: expr.pos,
                        kind: ExprKind::Update {
                            target: Box::new(expr),
                            increment,
                            prefix: false,
                        },
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.bump();
        let pos = token.pos;
        let kind = match token.kind {
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Null => ExprKind::Null,
            TokenKind::Undefined => ExprKind::Undefined,
            TokenKind::Ident(name) => ExprKind::Ident(name),
            TokenKind::LParen => {
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(expr);
            }
            TokenKind::LBracket => {
                let mut elements = Vec::new();
                if !self.at(&TokenKind::RBracket) {
                    loop {
                        elements.push(self.expression()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket, "']'")?;
                ExprKind::ArrayLit(elements)
            }
            TokenKind::LBrace => self.object_literal()?,
            other => {
                return Err(Error::parse(
                    format!("unexpected token {other:?}"),
                    pos.line,
                    pos.column,
                ))
            }
        };
        Ok(Expr { pos, kind })
    }

    /// Object literal body; `get name() { ... }` defines a getter property.
    fn object_literal(&mut self) -> Result<ExprKind> {
        let mut props = Vec::new();
        if !self.at(&TokenKind::RBrace) {
            loop {
                let token = self.bump();
                match token.kind {
                    TokenKind::Ident(name)
                        if name == "get"
                            && matches!(self.peek().kind, TokenKind::Ident(_)) =>
                    {
                        let prop_name = self.expect_ident("getter name")?;
                        let def = self.function_rest(Some(prop_name.clone()), token.pos)?;
                        props.push(ObjectProp::Getter {
                            name: prop_name,
                            body: Arc::new(def),
                        });
                    }
                    TokenKind::Ident(name) => {
                        self.expect(TokenKind::Colon, "':'")?;
                        let value = self.expression()?;
                        props.push(ObjectProp::Data { name, value });
                    }
                    TokenKind::Str(name) => {
                        self.expect(TokenKind::Colon, "':'")?;
                        let value = self.expression()?;
                        props.push(ObjectProp::Data { name, value });
                    }
                    other => {
                        return Err(Error::parse(
                            format!("expected property name, found {other:?}"),
                            token.pos.line,
                            token.pos.column,
                        ))
                    }
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(ExprKind::ObjectLit(props))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr {
        pos: left.pos,
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ast::Position;

    #[test]
    fn test_statement_positions() {
        let program = parse("var x = 1; var y = 2;").unwrap();
        let positions = program.statement_positions();
        assert_eq!(
            positions,
            vec![Position::new(1, 0), Position::new(1, 11)]
        );
    }

    #[test]
    fn test_for_loop_body_positions() {
        let program = parse("for (var i=0;i<3;i++){ x=i; }").unwrap();
        let positions = program.statement_positions();
        // The `for` statement itself plus the loop body statement.
        assert_eq!(
            positions,
            vec![Position::new(1, 0), Position::new(1, 23)]
        );
    }

    #[test]
    fn test_function_body_positions_collected() {
        let program = parse("function f() { return 1; }\nf();").unwrap();
        let positions = program.statement_positions();
        assert_eq!(
            positions,
            vec![
                Position::new(1, 0),
                Position::new(1, 15),
                Position::new(2, 0)
            ]
        );
    }

    #[test]
    fn test_object_literal_with_getter() {
        let program = parse("var o = { a: 1, get b() { return 2; } };").unwrap();
        let StmtKind::VarDecl { init: Some(init), .. } = &program.body[0].kind else {
            panic!("expected var declaration");
        };
        let ExprKind::ObjectLit(props) = &init.kind else {
            panic!("expected object literal");
        };
        assert_eq!(props.len(), 2);
        assert!(matches!(&props[1], ObjectProp::Getter { name, .. } if name == "b"));
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3 === 7").unwrap();
        let ExprKind::Binary { op, .. } = expr.kind else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinaryOp::EqStrict);
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(parse_expression("1 = 2").is_err());
    }

    #[test]
    fn test_debugger_statement() {
        let program = parse("var x=1; debugger; var y=2;").unwrap();
        assert!(matches!(program.body[1].kind, StmtKind::Debugger));
    }
}
