//! Explicit-stack evaluator.
//!
//! Walks the tree with an operation stack and a value stack instead of
//! host-stack recursion, so arbitrarily deep trees evaluate without
//! overflowing. Nodes expand into deferred continuation operations:
//! a binary node pushes its application behind its two children, and
//! the short-circuit operators push a decision point that only
//! schedules the right operand when the left one requires it.
//!
//! The observable semantics are identical to [`eval`](crate::eval::eval)
//! on every well-formed tree, bit for bit.

use crate::context::{VarEnv, VarId};
use crate::eval::{fmod, pow, to_int};
use crate::types::{BinaryOp, Expr, UnaryOp};
use crate::Real;
use alloc::vec::Vec;

const INITIAL_OP_CAPACITY: usize = 32;
const INITIAL_VALUE_CAPACITY: usize = 16;

enum EvalOp<'a> {
    /// Expand a subtree.
    Eval(&'a Expr),
    /// Pop one value, apply a unary operator.
    ApplyUnary(UnaryOp),
    /// Pop the right then the left value, apply a binary operator.
    ApplyBinary(BinaryOp),
    /// Decision point of `&&`: pops the left value.
    AndRight(&'a Expr),
    /// Decision point of `||`: pops the left value.
    OrRight(&'a Expr),
    /// Pop a value, normalize zero: yields the value, or `0` if it
    /// compares equal to zero.
    Truthy,
    /// Pop the assigned value, store it, yield it. `None` when the
    /// assignment target is not a variable (cannot survive parsing).
    Store(Option<VarId>),
}

/// Evaluate a tree with explicit stacks.
///
/// One-shot convenience over [`StackEvaluator`].
pub fn eval_iterative(e: &Expr, env: &VarEnv) -> Real {
    StackEvaluator::new().eval(e, env)
}

/// Reusable explicit-stack evaluator.
///
/// Reusing one evaluator across many [`eval`](StackEvaluator::eval)
/// calls keeps the stack allocations warm.
pub struct StackEvaluator<'a> {
    op_stack: Vec<EvalOp<'a>>,
    value_stack: Vec<Real>,
}

impl<'a> Default for StackEvaluator<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> StackEvaluator<'a> {
    /// Create an evaluator with warm stack capacity.
    pub fn new() -> Self {
        StackEvaluator {
            op_stack: Vec::with_capacity(INITIAL_OP_CAPACITY),
            value_stack: Vec::with_capacity(INITIAL_VALUE_CAPACITY),
        }
    }

    /// Evaluate `root` against `env`.
    pub fn eval(&mut self, root: &'a Expr, env: &VarEnv) -> Real {
        self.op_stack.clear();
        self.value_stack.clear();
        self.op_stack.push(EvalOp::Eval(root));

        while let Some(op) = self.op_stack.pop() {
            match op {
                EvalOp::Eval(e) => self.expand(e, env),
                EvalOp::ApplyUnary(op) => {
                    let value = self.pop_value();
                    self.value_stack.push(apply_unary(op, value));
                }
                EvalOp::ApplyBinary(op) => {
                    // pop into named slots: the child pushed (and
                    // evaluated) first is the left operand
                    let right = self.pop_value();
                    let left = self.pop_value();
                    self.value_stack.push(apply_binary(op, left, right));
                }
                EvalOp::AndRight(rhs) => {
                    let left = self.pop_value();
                    if left != 0.0 {
                        self.op_stack.push(EvalOp::Truthy);
                        self.op_stack.push(EvalOp::Eval(rhs));
                    } else {
                        self.value_stack.push(0.0);
                    }
                }
                EvalOp::OrRight(rhs) => {
                    let left = self.pop_value();
                    if left != 0.0 && !left.is_nan() {
                        self.value_stack.push(left);
                    } else {
                        self.op_stack.push(EvalOp::Truthy);
                        self.op_stack.push(EvalOp::Eval(rhs));
                    }
                }
                EvalOp::Truthy => {
                    let value = self.pop_value();
                    self.value_stack.push(if value != 0.0 { value } else { 0.0 });
                }
                EvalOp::Store(target) => {
                    let value = self.pop_value();
                    if let Some(id) = target {
                        env.set(id, value);
                    }
                    self.value_stack.push(value);
                }
            }
        }

        self.pop_value()
    }

    fn expand(&mut self, e: &'a Expr, env: &VarEnv) {
        match e {
            Expr::Const(value) => self.value_stack.push(*value),
            Expr::Var(id) => self.value_stack.push(env.value(*id)),
            Expr::Unary { op, arg } => {
                self.op_stack.push(EvalOp::ApplyUnary(*op));
                self.op_stack.push(EvalOp::Eval(arg));
            }
            Expr::Binary { op, left, right } => match op {
                BinaryOp::LogicalAnd => {
                    self.op_stack.push(EvalOp::AndRight(right));
                    self.op_stack.push(EvalOp::Eval(left));
                }
                BinaryOp::LogicalOr => {
                    self.op_stack.push(EvalOp::OrRight(right));
                    self.op_stack.push(EvalOp::Eval(left));
                }
                BinaryOp::Assign => {
                    let target = match &**left {
                        Expr::Var(id) => Some(*id),
                        _ => None,
                    };
                    self.op_stack.push(EvalOp::Store(target));
                    self.op_stack.push(EvalOp::Eval(right));
                }
                _ => {
                    self.op_stack.push(EvalOp::ApplyBinary(*op));
                    // the left child must pop first, so it is pushed last
                    self.op_stack.push(EvalOp::Eval(right));
                    self.op_stack.push(EvalOp::Eval(left));
                }
            },
            Expr::Call(call) => self.value_stack.push(call.invoke(env)),
        }
    }

    fn pop_value(&mut self) -> Real {
        self.value_stack.pop().unwrap_or(Real::NAN)
    }
}

fn apply_unary(op: UnaryOp, value: Real) -> Real {
    match op {
        UnaryOp::Negate => -value,
        UnaryOp::LogicalNot => {
            if value == 0.0 {
                1.0
            } else {
                0.0
            }
        }
        UnaryOp::BitwiseNot => !to_int(value) as Real,
    }
}

fn apply_binary(op: BinaryOp, left: Real, right: Real) -> Real {
    use BinaryOp::*;
    match op {
        Power => pow(left, right),
        Multiply => left * right,
        Divide => left / right,
        Remainder => fmod(left, right),
        Plus => left + right,
        Minus => left - right,
        Shl => to_int(left).wrapping_shl(to_int(right) as u32) as Real,
        Shr => to_int(left).wrapping_shr(to_int(right) as u32) as Real,
        Less => (left < right) as i32 as Real,
        LessEq => (left <= right) as i32 as Real,
        Greater => (left > right) as i32 as Real,
        GreaterEq => (left >= right) as i32 as Real,
        Equal => (left == right) as i32 as Real,
        NotEqual => (left != right) as i32 as Real,
        BitAnd => (to_int(left) & to_int(right)) as Real,
        BitOr => (to_int(left) | to_int(right)) as Real,
        BitXor => (to_int(left) ^ to_int(right)) as Real,
        Comma => right,
        // handled before the operands are scheduled
        LogicalAnd | LogicalOr | Assign => Real::NAN,
    }
}
