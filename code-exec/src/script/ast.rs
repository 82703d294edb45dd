use std::rc::Rc;

use super::token::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A named function declaration. Shared through `Rc` so function values can
/// point back at their declaration without copying the body.
#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    /// Position of the opening `{`.
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Function(Rc<FunctionDecl>),
    Let {
        name: String,
        value: Expr,
        position: Position,
    },
    Assign {
        name: String,
        value: Expr,
        position: Position,
    },
    Return {
        value: Option<Expr>,
        position: Position,
    },
    If {
        condition: Expr,
        then_branch: Block,
        else_branch: Option<ElseBranch>,
        position: Position,
    },
    While {
        condition: Expr,
        body: Block,
        position: Position,
    },
    /// `for (init; condition; update) { .. }`. A missing condition loops
    /// until `break`.
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Block,
        position: Position,
    },
    Break(Position),
    Continue(Position),
    Block(Block),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    Block(Block),
    If(Box<Stmt>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        position: Position,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        position: Position,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        position: Position,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        position: Position,
    },
    Array {
        elements: Vec<Expr>,
        position: Position,
    },
    Identifier {
        name: String,
        position: Position,
    },
    Number(f64),
    Str(String),
    Bool(bool),
}

impl Expr {
    /// Source position of the expression; literals carry none.
    pub fn position(&self) -> Option<Position> {
        match self {
            Expr::Binary { position, .. }
            | Expr::Unary { position, .. }
            | Expr::Call { position, .. }
            | Expr::Index { position, .. }
            | Expr::Array { position, .. }
            | Expr::Identifier { position, .. } => Some(*position),
            Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) => None,
        }
    }
}
