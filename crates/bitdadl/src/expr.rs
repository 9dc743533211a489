//! Expressions attached to a schema: lengths, occurs counts, discriminator
//! tests and output-value calculations.
//!
//! Expressions are plain syntax trees evaluated by [crate::evaluator::Evaluator]
//! against the record under construction. Build them with the helper
//! constructors and operators:
//!
//! ```
//! use bitdadl::expr::Expr;
//!
//! // self.kind == 2 && count * 8 <= $length
//! let test = Expr::this()
//!     .member("kind")
//!     .equals(Expr::int(2))
//!     .and((Expr::field("count") * Expr::int(8)).at_most(Expr::var("$length")));
//! # let _ = test;
//! ```

use std::ops;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary operators. Arithmetic is checked 64-bit signed integer arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// An expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Expr {
    Int(i64),
    Bool(bool),
    Text(String),
    /// `self`: the value most recently produced in the current scope.
    This,
    /// A field of the record being built, searched outward through enclosing records.
    Field(String),
    /// Field access on a record-valued expression.
    Member(Box<Expr>, String),
    /// A scope variable such as `$length` or `$end`, searched outward.
    Var(String),
    /// Item count of a list, or byte length of text or opaque data.
    Len(Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Int(value)
    }

    pub fn bool(value: bool) -> Self {
        Expr::Bool(value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Expr::Text(value.into())
    }

    pub fn this() -> Self {
        Expr::This
    }

    pub fn field(name: impl Into<String>) -> Self {
        Expr::Field(name.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn member(self, name: impl Into<String>) -> Self {
        Expr::Member(Box::new(self), name.into())
    }

    pub fn len(self) -> Self {
        Expr::Len(Box::new(self))
    }

    pub fn binary(self, op: BinaryOp, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(self), Box::new(rhs))
    }

    pub fn equals(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn not_equals(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Ne, rhs)
    }

    pub fn less_than(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn at_most(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Le, rhs)
    }

    pub fn greater_than(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    pub fn at_least(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Ge, rhs)
    }

    pub fn and(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn or(self, rhs: Expr) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Int(value)
    }
}

macro_rules! impl_binary_ops {
    ($($trait:ident :: $method:ident => $op:ident),* $(,)?) => {
        $(
            impl ops::$trait for Expr {
                type Output = Expr;

                fn $method(self, rhs: Expr) -> Expr {
                    self.binary(BinaryOp::$op, rhs)
                }
            }
        )*
    };
}

impl_binary_ops!(
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
    Div::div => Div,
    Rem::rem => Rem,
);

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary(UnaryOp::Neg, Box::new(self))
    }
}

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Unary(UnaryOp::Not, Box::new(self))
    }
}

#[cfg(feature = "serde")]
impl From<crate::serde::ExprDef> for Expr {
    fn from(value: crate::serde::ExprDef) -> Self {
        match value {
            crate::serde::ExprDef::Int(v) => Expr::Int(v),
            crate::serde::ExprDef::Expr(expr) => expr,
        }
    }
}
