use std::rc::Rc;

/// A sequence of statements. Shared so that block values and function
/// bodies can be handed around without copying the tree.
pub type Block = Rc<[Statement]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
        }
    }
}

pub type ExprRef = Box<Expr>;

#[derive(Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Reference(String),
    Block(Block),
    Call { callee: ExprRef, args: Vec<Expr> },
    Binary { op: BinaryOp, lhs: ExprRef, rhs: ExprRef },
    Negate(ExprRef),
}

#[derive(Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}

#[derive(Debug, PartialEq)]
pub enum Statement {
    Expr(Expr),
    Let {
        name: String,
        value: Expr,
    },
    Assign {
        name: String,
        value: Expr,
    },
    Function(Rc<FunctionDef>),
    Return(Option<Expr>),
    If {
        condition: Expr,
        then: Block,
        otherwise: Option<Block>,
    },
    Empty,
}
