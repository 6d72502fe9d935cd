//! The compiled expression tree and its operators.
//!
//! An [`Expr`] is a tagged tree: constants and variable references at
//! the leaves, unary/binary operator nodes with owned children, and
//! function-call nodes that own their argument list plus a per-node
//! context buffer. Arity is structural: a binary node always has
//! exactly two children, so the evaluators dispatch exhaustively
//! without re-checking shape.

use crate::context::{FnDescriptor, VarEnv, VarId};
use crate::Real;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

/// Operators with a single operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Numeric negation, `-x`.
    Negate,
    /// Logical not, `!x`: `1` when `x` is zero, else `0`.
    LogicalNot,
    /// Bitwise not on the truncated integer value, `^x`.
    BitwiseNot,
}

impl UnaryOp {
    /// Resolve a unary operator byte (`-`, `!`, `^`).
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "-" => Some(UnaryOp::Negate),
            "!" => Some(UnaryOp::LogicalNot),
            "^" => Some(UnaryOp::BitwiseNot),
            _ => None,
        }
    }
}

/// Operators with two operands, in source form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `**`, right-associative.
    Power,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`, scalar remainder.
    Remainder,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `<<` on truncated integers.
    Shl,
    /// `>>` on truncated integers.
    Shr,
    /// `<`
    Less,
    /// `<=`
    LessEq,
    /// `>`
    Greater,
    /// `>=`
    GreaterEq,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `&` on truncated integers.
    BitAnd,
    /// `|` on truncated integers.
    BitOr,
    /// `^` on truncated integers.
    BitXor,
    /// `&&`, short-circuit.
    LogicalAnd,
    /// `||`, short-circuit.
    LogicalOr,
    /// `=`, right-associative; the left child must be a variable.
    Assign,
    /// `,`, sequencing: evaluate the left, discard, yield the right.
    Comma,
}

impl BinaryOp {
    /// Resolve a binary operator lexeme.
    pub fn from_symbol(s: &str) -> Option<Self> {
        use BinaryOp::*;
        match s {
            "**" => Some(Power),
            "*" => Some(Multiply),
            "/" => Some(Divide),
            "%" => Some(Remainder),
            "+" => Some(Plus),
            "-" => Some(Minus),
            "<<" => Some(Shl),
            ">>" => Some(Shr),
            "<" => Some(Less),
            "<=" => Some(LessEq),
            ">" => Some(Greater),
            ">=" => Some(GreaterEq),
            "==" => Some(Equal),
            "!=" => Some(NotEqual),
            "&" => Some(BitAnd),
            "|" => Some(BitOr),
            "^" => Some(BitXor),
            "&&" => Some(LogicalAnd),
            "||" => Some(LogicalOr),
            "=" => Some(Assign),
            "," => Some(Comma),
            _ => None,
        }
    }

    /// Precedence class; a lower value binds tighter. Unary operators
    /// sit below all of these (class 1).
    pub(crate) fn precedence(self) -> u8 {
        use BinaryOp::*;
        match self {
            Power => 2,
            Multiply | Divide | Remainder => 3,
            Plus | Minus => 4,
            Shl | Shr => 5,
            Less | LessEq | Greater | GreaterEq | Equal | NotEqual => 6,
            BitAnd => 7,
            BitOr => 8,
            BitXor => 9,
            LogicalAnd => 10,
            LogicalOr => 11,
            Assign => 12,
            Comma => 13,
        }
    }

    pub(crate) fn left_assoc(self) -> bool {
        !matches!(self, BinaryOp::Power | BinaryOp::Assign | BinaryOp::Comma)
    }
}

/// A compiled expression.
///
/// Trees are produced by [`create`](crate::engine::create), evaluated
/// with [`eval`](crate::eval::eval) or
/// [`eval_iterative`](crate::eval::iterative::eval_iterative), and
/// released by dropping. Cloning a tree deep-copies it; function-call
/// nodes in the copy receive fresh zero-filled context buffers.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal scalar.
    Const(Real),
    /// A reference to a variable in the environment the tree was
    /// compiled against.
    Var(VarId),
    /// A unary operator applied to one owned child.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        arg: Box<Expr>,
    },
    /// A binary operator applied to two owned children in source order.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// The left operand.
        left: Box<Expr>,
        /// The right operand.
        right: Box<Expr>,
    },
    /// A call to a registered function.
    Call(FuncCall),
}

impl Expr {
    /// Build a unary node.
    pub fn unary(op: UnaryOp, arg: Expr) -> Expr {
        Expr::Unary {
            op,
            arg: Box::new(arg),
        }
    }

    /// Build a binary node.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// A bound function call: the descriptor, the unevaluated argument
/// expressions, and a context buffer of `ctxsz` zero bytes that
/// persists across invocations of this node.
pub struct FuncCall {
    f: Rc<FnDescriptor>,
    /// The argument expressions, in source order.
    pub args: Vec<Expr>,
    context: RefCell<Box<[u8]>>,
}

impl FuncCall {
    pub(crate) fn new(f: Rc<FnDescriptor>, args: Vec<Expr>) -> Self {
        let context = RefCell::new(vec![0u8; f.ctxsz].into_boxed_slice());
        FuncCall { f, args, context }
    }

    /// The descriptor this call is bound to.
    pub fn descriptor(&self) -> &FnDescriptor {
        &self.f
    }

    /// Invoke the function with this node's arguments and context.
    /// The function decides if and when to evaluate the arguments.
    pub fn invoke(&self, env: &VarEnv) -> Real {
        let mut context = self.context.borrow_mut();
        (self.f.invoke)(&self.args, &mut context, env)
    }
}

impl Clone for FuncCall {
    fn clone(&self) -> Self {
        FuncCall::new(self.f.clone(), self.args.clone())
    }
}

impl Drop for FuncCall {
    fn drop(&mut self) {
        if self.f.ctxsz > 0 {
            if let Some(cleanup) = self.f.cleanup {
                cleanup(&mut self.context.borrow_mut());
            }
        }
    }
}

impl fmt::Debug for FuncCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncCall")
            .field("name", &self.f.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
