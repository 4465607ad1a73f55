//! Tree nodes.

use std::fmt;

use crate::types::CType;

/// Binary arithmetic operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub const fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }

    /// Binding power for precedence climbing (higher binds tighter).
    pub const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 2,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_symbol())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
}

/// Numeric literal.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
}

/// Named reference to a function, macro or variable.
///
/// When `ty` is set the symbol is a declaration site (`double acc = ...`);
/// otherwise it is a plain use.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub name: String,
    pub ty: Option<CType>,
}

/// Anonymous function literal: parameters plus a single expression body.
///
/// Only exists in source fragments; the lifter replaces every one of them.
#[derive(Clone, Debug, PartialEq)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Box<Node>,
}

/// A lifted unit: `#define NAME(params) (body)`.
#[derive(Clone, Debug, PartialEq)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Box<Node>,
}

/// Counting loop `for (var = start; var < end; ++var) { body }`.
#[derive(Clone, Debug, PartialEq)]
pub struct ForLoop {
    pub var: String,
    pub start: Box<Node>,
    pub end: Box<Node>,
    pub body: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Param {
    pub name: String,
    /// `None` until the entry function is specialized.
    pub ty: Option<CType>,
}

impl Param {
    pub fn untyped(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            ty: None,
        }
    }

    pub fn typed(name: impl Into<String>, ty: CType) -> Self {
        Param {
            name: name.into(),
            ty: Some(ty),
        }
    }
}

/// Function declaration.
///
/// Captured source functions have untyped parameters and no return type;
/// generated loop functions and the specialized entry function are fully
/// typed.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<CType>,
    pub body: Vec<Node>,
}

/// Statements that must run before an expression, plus the expression
/// that names their result.
///
/// Produced by inline lowering; the fix-up pass hoists `stmts` to the
/// enclosing statement and leaves `result` in place.
#[derive(Clone, Debug, PartialEq)]
pub struct Composite {
    pub stmts: Vec<Node>,
    pub result: Box<Node>,
}

/// A node in a program fragment.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Literal(Literal),
    Symbol(Symbol),
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    /// Buffer element access `base[index]`.
    Index {
        base: Box<Node>,
        index: Box<Node>,
    },
    Lambda(Lambda),
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    For(ForLoop),
    Return(Option<Box<Node>>),
    Function(FunctionDef),
    Define(MacroDef),
    Block(Vec<Node>),
    Composite(Composite),
}

impl Node {
    pub fn int(value: i64) -> Node {
        Node::Literal(Literal::Int(value))
    }

    pub fn float(value: f64) -> Node {
        Node::Literal(Literal::Float(value))
    }

    /// Plain symbol use.
    pub fn sym(name: impl Into<String>) -> Node {
        Node::Symbol(Symbol {
            name: name.into(),
            ty: None,
        })
    }

    /// Typed declaration site.
    pub fn decl(name: impl Into<String>, ty: CType) -> Node {
        Node::Symbol(Symbol {
            name: name.into(),
            ty: Some(ty),
        })
    }

    pub fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Node {
        Node::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn neg(operand: Node) -> Node {
        Node::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(operand),
        }
    }

    /// Call to a function or macro by name.
    pub fn call(name: impl Into<String>, args: Vec<Node>) -> Node {
        Node::Call {
            callee: Box::new(Node::sym(name)),
            args,
        }
    }

    pub fn index(base: Node, index: Node) -> Node {
        Node::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    pub fn assign(target: Node, value: Node) -> Node {
        Node::Assign {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn ret(value: Option<Node>) -> Node {
        Node::Return(value.map(Box::new))
    }

    pub fn lambda(params: Vec<String>, body: Node) -> Node {
        Node::Lambda(Lambda {
            params,
            body: Box::new(body),
        })
    }

    pub fn for_range(var: impl Into<String>, start: Node, end: Node, body: Vec<Node>) -> Node {
        Node::For(ForLoop {
            var: var.into(),
            start: Box::new(start),
            end: Box::new(end),
            body,
        })
    }

    /// Name of a symbol node, `None` for anything else.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Node::Symbol(sym) => Some(&sym.name),
            _ => None,
        }
    }

    /// Name of the callee when this is a call through a bare symbol.
    pub fn callee_name(&self) -> Option<&str> {
        match self {
            Node::Call { callee, .. } => callee.as_symbol(),
            _ => None,
        }
    }

    /// Stable variant name, used in diagnostics and node statistics.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Node::Literal(_) => "literal",
            Node::Symbol(_) => "symbol",
            Node::Unary { .. } => "unary",
            Node::Binary { .. } => "binary",
            Node::Call { .. } => "call",
            Node::Index { .. } => "index",
            Node::Lambda(_) => "lambda",
            Node::Assign { .. } => "assign",
            Node::For(_) => "for",
            Node::Return(_) => "return",
            Node::Function(_) => "function",
            Node::Define(_) => "define",
            Node::Block(_) => "block",
            Node::Composite(_) => "composite",
        }
    }
}
