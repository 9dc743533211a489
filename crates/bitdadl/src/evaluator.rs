//! Scope stack and expression evaluation.
//!
//! Every composite node gets its own scope while it is decoded or encoded. A scope
//! holds the record being built (visible to later fields as `Field(name)`), scope
//! variables such as `$length`/`$end`, and `self`, the value most recently
//! produced. Lookups of fields and variables fall back to enclosing scopes.
//!
//! A variable can be *deferred* while its value is not known yet, e.g. `$length`
//! while an encoder sizes a length-prefixed body. Lengths depending on a deferred
//! variable compute to "no length"; any other use of it is an error.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    mem,
};

use crate::{
    errors::ErrorKind,
    expr::{BinaryOp, Expr, UnaryOp},
    node::{Discriminator, TestKind},
    value::{Record, Value},
};

/// Variable holding the byte length read from a length field.
pub const LENGTH_VAR: &str = "$length";

/// Variable holding the bit position at which a length-bounded node ends.
pub const END_VAR: &str = "$end";

#[derive(Debug, Default)]
struct Frame {
    fields: Record,
    variables: BTreeMap<String, Value>,
    deferred: BTreeSet<String>,
    this: Option<Value>,
}

/// Saved scope state, restored when a speculative attempt is abandoned.
#[derive(Debug)]
pub struct Checkpoint {
    depth: usize,
    this: Option<Value>,
}

/// Evaluates schema expressions against a stack of scopes.
///
/// The stack always holds a root scope; [Evaluator::push_scope] and
/// [Evaluator::pop_scope] must be strictly nested.
#[derive(Debug)]
pub struct Evaluator {
    frames: Vec<Frame>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator {
            frames: vec![Frame::default()],
        }
    }

    /// Number of open scopes, including the root scope.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn top(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn push_scope(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Opens a scope whose record starts out with the given fields.
    pub fn push_record(&mut self, record: Record) {
        self.frames.push(Frame {
            fields: record,
            ..Default::default()
        });
    }

    /// Closes the innermost scope and returns the record built in it.
    pub fn pop_scope(&mut self) -> Record {
        if self.frames.len() > 1 {
            self.frames.pop().map(|f| f.fields).unwrap_or_default()
        } else {
            mem::take(&mut self.top_mut().fields)
        }
    }

    pub fn set_self(&mut self, value: Value) {
        self.top_mut().this = Some(value);
    }

    pub fn this(&self) -> Option<&Value> {
        self.top().this.as_ref()
    }

    /// Publishes a field value into the record of the innermost scope.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.top_mut().fields.insert(name, value);
    }

    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|f| f.fields.get(name))
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let frame = self.top_mut();
        frame.deferred.remove(&name);
        frame.variables.insert(name, value);
    }

    /// Marks a variable of the innermost scope as not yet known.
    pub fn defer_variable(&mut self, name: impl Into<String>) {
        let name = name.into();
        let frame = self.top_mut();
        frame.variables.remove(&name);
        frame.deferred.insert(name);
    }

    pub fn get_variable(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|f| f.variables.get(name))
    }

    fn lookup_variable(&self, name: &str) -> Result<Value, ErrorKind> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.variables.get(name) {
                return Ok(value.clone());
            }
            if frame.deferred.contains(name) {
                return Err(ErrorKind::DeferredVariable(name.to_string()));
            }
        }

        Err(ErrorKind::Evaluation(format!("unknown variable `{name}`")))
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            depth: self.frames.len(),
            this: self.top().this.clone(),
        }
    }

    /// Drops scopes opened since `checkpoint` and restores `self`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.frames.truncate(checkpoint.depth.max(1));
        self.top_mut().this = checkpoint.this;
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Value, ErrorKind> {
        match expr {
            Expr::Int(v) => Ok(Value::I64(*v)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Text(s) => Ok(Value::Text(s.clone())),
            Expr::This => self
                .this()
                .cloned()
                .ok_or_else(|| ErrorKind::Evaluation("`self` is not set".to_string())),
            Expr::Field(name) => self
                .get_field(name)
                .cloned()
                .ok_or_else(|| ErrorKind::Evaluation(format!("unknown field `{name}`"))),
            Expr::Member(target, name) => match self.evaluate(target)? {
                Value::Record(record) => record
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ErrorKind::Evaluation(format!("unknown member `{name}`"))),
                other => Err(ErrorKind::Evaluation(format!(
                    "cannot access `{name}` on {}",
                    other.kind_name()
                ))),
            },
            Expr::Var(name) => self.lookup_variable(name),
            Expr::Len(target) => {
                let len = match self.evaluate(target)? {
                    Value::Array(items) => items.len(),
                    Value::Text(s) => s.len(),
                    Value::Bytes(b) => b.len(),
                    other => {
                        return Err(ErrorKind::Evaluation(format!(
                            "{} has no length",
                            other.kind_name()
                        )));
                    }
                };
                i64::try_from(len)
                    .map(Value::I64)
                    .map_err(|_| ErrorKind::Evaluation("length overflow".to_string()))
            }
            Expr::Unary(op, operand) => {
                let value = self.evaluate(operand)?;
                match op {
                    UnaryOp::Neg => as_int(&value)?
                        .checked_neg()
                        .map(Value::I64)
                        .ok_or_else(overflow),
                    UnaryOp::Not => Ok(Value::Bool(!as_bool(&value)?)),
                }
            }
            Expr::Binary(op, lhs, rhs) => self.binary(*op, lhs, rhs),
        }
    }

    fn binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, ErrorKind> {
        match op {
            BinaryOp::And => {
                let result = as_bool(&self.evaluate(lhs)?)? && as_bool(&self.evaluate(rhs)?)?;
                return Ok(Value::Bool(result));
            }
            BinaryOp::Or => {
                let result = as_bool(&self.evaluate(lhs)?)? || as_bool(&self.evaluate(rhs)?)?;
                return Ok(Value::Bool(result));
            }
            _ => {}
        }

        let a = self.evaluate(lhs)?;
        let b = self.evaluate(rhs)?;

        match op {
            BinaryOp::Eq => Ok(Value::Bool(values_equal(&a, &b))),
            BinaryOp::Ne => Ok(Value::Bool(!values_equal(&a, &b))),
            BinaryOp::Lt => compare(&a, &b, Ordering::is_lt),
            BinaryOp::Le => compare(&a, &b, Ordering::is_le),
            BinaryOp::Gt => compare(&a, &b, Ordering::is_gt),
            BinaryOp::Ge => compare(&a, &b, Ordering::is_ge),
            BinaryOp::Add => arithmetic(&a, &b, i64::checked_add),
            BinaryOp::Sub => arithmetic(&a, &b, i64::checked_sub),
            BinaryOp::Mul => arithmetic(&a, &b, i64::checked_mul),
            BinaryOp::Div => arithmetic(&a, &b, i64::checked_div),
            BinaryOp::Rem => arithmetic(&a, &b, i64::checked_rem),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    pub fn evaluate_int(&self, expr: &Expr) -> Result<i64, ErrorKind> {
        as_int(&self.evaluate(expr)?)
    }

    pub fn evaluate_bool(&self, expr: &Expr) -> Result<bool, ErrorKind> {
        as_bool(&self.evaluate(expr)?)
    }

    /// Evaluates an optional length expression to a non-negative count of units.
    ///
    /// A length that depends on a deferred variable is `None`.
    pub fn compute_length(&self, length: Option<&Expr>) -> Result<Option<u64>, ErrorKind> {
        let Some(expr) = length else {
            return Ok(None);
        };

        let value = match self.evaluate_int(expr) {
            Ok(value) => value,
            Err(ErrorKind::DeferredVariable(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        u64::try_from(value)
            .map(Some)
            .map_err(|_| ErrorKind::Evaluation(format!("negative length {value}")))
    }

    /// Tests a discriminator of `owner` against the current scope.
    pub fn check_discriminator(
        &self,
        discriminator: &Discriminator,
        owner: &str,
    ) -> Result<(), ErrorKind> {
        if discriminator.test_kind == TestKind::Pattern {
            return Err(ErrorKind::PatternDiscriminator(owner.to_string()));
        }

        if self.evaluate_bool(&discriminator.test)? {
            return Ok(());
        }

        let message = discriminator
            .message
            .clone()
            .unwrap_or_else(|| format!("discriminator of `{owner}` not satisfied"));
        Err(ErrorKind::DiscriminatorNotSatisfied(message))
    }
}

fn overflow() -> ErrorKind {
    ErrorKind::Evaluation("integer overflow or division by zero".to_string())
}

fn as_int(value: &Value) -> Result<i64, ErrorKind> {
    value.as_i64().ok_or_else(|| {
        ErrorKind::Evaluation(format!("expected integer, got {}", value.kind_name()))
    })
}

fn as_bool(value: &Value) -> Result<bool, ErrorKind> {
    value.as_bool().ok_or_else(|| {
        ErrorKind::Evaluation(format!("expected boolean, got {}", value.kind_name()))
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_i128(), b.as_i128()) {
        (Some(x), Some(y)) => x == y,
        _ => match (a, b) {
            (Value::Text(x) | Value::Enum(x), Value::Text(y) | Value::Enum(y)) => x == y,
            _ => a == b,
        },
    }
}

fn compare(a: &Value, b: &Value, test: fn(Ordering) -> bool) -> Result<Value, ErrorKind> {
    let ordering = match (a.as_i128(), b.as_i128()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => match (a, b) {
            (Value::Text(x), Value::Text(y)) => x.cmp(y),
            _ => {
                return Err(ErrorKind::Evaluation(format!(
                    "cannot compare {} with {}",
                    a.kind_name(),
                    b.kind_name()
                )));
            }
        },
    };

    Ok(Value::Bool(test(ordering)))
}

fn arithmetic(
    a: &Value,
    b: &Value,
    op: fn(i64, i64) -> Option<i64>,
) -> Result<Value, ErrorKind> {
    op(as_int(a)?, as_int(b)?).map(Value::I64).ok_or_else(overflow)
}
