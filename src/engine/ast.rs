//! Abstract syntax tree for the embedded script language
//!
//! Every statement carries the source position the interpreter reports to
//! debug hooks; those positions are exactly the breakpointable locations.

use std::fmt;
use std::sync::Arc;

/// A source location: 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A parsed script.
#[derive(Debug, Clone)]
pub struct Program {
    pub body: Vec<Stmt>,
}

impl Program {
    /// Collect the statement-granular positions the interpreter will deliver
    /// callbacks at, sorted ascending.
    pub fn statement_positions(&self) -> Vec<Position> {
        let mut positions = Vec::new();
        collect_positions(&self.body, &mut positions);
        positions.sort();
        positions.dedup();
        positions
    }
}

fn collect_positions(stmts: &[Stmt], out: &mut Vec<Position>) {
    for stmt in stmts {
        out.push(stmt.pos);
        match &stmt.kind {
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                collect_positions(then_branch, out);
                if let Some(else_branch) = else_branch {
                    collect_positions(else_branch, out);
                }
            }
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                collect_positions(body, out);
            }
            StmtKind::FunctionDecl(def) => collect_positions(&def.body, out),
            StmtKind::Block(body) => collect_positions(body, out),
            _ => {}
        }
    }
}

/// A statement with its source position.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub pos: Position,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    VarDecl {
        name: String,
        init: Option<Expr>,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// The init statement runs as part of the `for` itself and does not get
    /// its own debug callback.
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Vec<Stmt>,
    },
    FunctionDecl(Arc<FunctionDef>),
    Return(Option<Expr>),
    Break,
    Continue,
    Debugger,
    Block(Vec<Stmt>),
}

/// A function definition (declaration or getter body).
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub pos: Position,
}

/// An expression with its source position.
#[derive(Debug, Clone)]
pub struct Expr {
    pub pos: Position,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// Postfix or prefix `++`/`--`.
    Update {
        target: Box<Expr>,
        increment: bool,
        prefix: bool,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    ObjectLit(Vec<ObjectProp>),
    ArrayLit(Vec<Expr>),
}

/// A property in an object literal.
#[derive(Debug, Clone)]
pub enum ObjectProp {
    Data { name: String, value: Expr },
    Getter { name: String, body: Arc<FunctionDef> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    EqStrict,
    NeStrict,
    EqLoose,
    NeLoose,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ordering() {
        assert!(Position::new(1, 5) < Position::new(1, 9));
        assert!(Position::new(1, 30) < Position::new(2, 0));
        assert!(Position::new(3, 0) >= Position::new(3, 0));
    }
}
