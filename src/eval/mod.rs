//! Expression evaluation.
//!
//! Two interchangeable evaluators are provided: the recursive one here,
//! which is the reference semantics, and the explicit-stack one in
//! [`iterative`], which trades recursion for heap stacks so that deep
//! trees cannot exhaust the host stack. Both produce bit-identical
//! results on every well-formed tree.
//!
//! Evaluation never fails: undefined operations propagate through the
//! scalar type as NaN or infinity.

pub mod iterative;

use crate::context::VarEnv;
use crate::types::{BinaryOp, Expr, UnaryOp};
use crate::Real;

#[cfg(feature = "f32")]
pub(crate) use libm::{fmodf as fmod, powf as pow};

#[cfg(feature = "f64")]
pub(crate) use libm::{fmod, pow};

/// Truncating conversion used by the bitwise and shift operators.
///
/// NaN maps to `0`; the infinities map to `±i32::MAX`, symmetric
/// around zero. Finite values truncate toward zero, saturating at the
/// integer range.
pub fn to_int(x: Real) -> i32 {
    if x.is_nan() {
        0
    } else if x.is_infinite() {
        if x > 0.0 {
            i32::MAX
        } else {
            -i32::MAX
        }
    } else {
        x as i32
    }
}

/// Evaluate a tree against `env` and return its scalar value.
///
/// Children evaluate strictly left to right; `&&` and `||` skip the
/// right operand when the left one decides the result; `=` stores into
/// its target variable and yields the stored value.
pub fn eval(e: &Expr, env: &VarEnv) -> Real {
    match e {
        Expr::Const(value) => *value,
        Expr::Var(id) => env.value(*id),
        Expr::Unary { op, arg } => match op {
            UnaryOp::Negate => -eval(arg, env),
            UnaryOp::LogicalNot => {
                if eval(arg, env) == 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            UnaryOp::BitwiseNot => !to_int(eval(arg, env)) as Real,
        },
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, env),
        Expr::Call(call) => call.invoke(env),
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, env: &VarEnv) -> Real {
    use BinaryOp::*;
    match op {
        Power => pow(eval(left, env), eval(right, env)),
        Multiply => eval(left, env) * eval(right, env),
        Divide => eval(left, env) / eval(right, env),
        Remainder => fmod(eval(left, env), eval(right, env)),
        Plus => eval(left, env) + eval(right, env),
        Minus => eval(left, env) - eval(right, env),
        Shl => {
            let a = to_int(eval(left, env));
            let b = to_int(eval(right, env));
            a.wrapping_shl(b as u32) as Real
        }
        Shr => {
            let a = to_int(eval(left, env));
            let b = to_int(eval(right, env));
            a.wrapping_shr(b as u32) as Real
        }
        Less => (eval(left, env) < eval(right, env)) as i32 as Real,
        LessEq => (eval(left, env) <= eval(right, env)) as i32 as Real,
        Greater => (eval(left, env) > eval(right, env)) as i32 as Real,
        GreaterEq => (eval(left, env) >= eval(right, env)) as i32 as Real,
        Equal => (eval(left, env) == eval(right, env)) as i32 as Real,
        NotEqual => (eval(left, env) != eval(right, env)) as i32 as Real,
        BitAnd => (to_int(eval(left, env)) & to_int(eval(right, env))) as Real,
        BitOr => (to_int(eval(left, env)) | to_int(eval(right, env))) as Real,
        BitXor => (to_int(eval(left, env)) ^ to_int(eval(right, env))) as Real,
        LogicalAnd => {
            let a = eval(left, env);
            if a != 0.0 {
                let b = eval(right, env);
                if b != 0.0 {
                    b
                } else {
                    0.0
                }
            } else {
                0.0
            }
        }
        LogicalOr => {
            // NaN is not truthy on the left; a NaN right operand
            // passes through unchanged
            let a = eval(left, env);
            if a != 0.0 && !a.is_nan() {
                a
            } else {
                let b = eval(right, env);
                if b != 0.0 {
                    b
                } else {
                    0.0
                }
            }
        }
        Assign => {
            let value = eval(right, env);
            if let Expr::Var(id) = left {
                env.set(*id, value);
            }
            value
        }
        Comma => {
            eval(left, env);
            eval(right, env)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FnRegistry, VarEnv};
    use crate::engine::create;

    fn run(input: &str) -> Real {
        let mut env = VarEnv::new();
        let funcs = FnRegistry::new();
        let tree = create(input, &mut env, &funcs).unwrap();
        eval(&tree, &env)
    }

    #[test]
    fn test_to_int_rules() {
        assert_eq!(to_int(0.0), 0);
        assert_eq!(to_int(2.7), 2);
        assert_eq!(to_int(-2.7), -2);
        assert_eq!(to_int(Real::NAN), 0);
        assert_eq!(to_int(Real::INFINITY), i32::MAX);
        assert_eq!(to_int(Real::NEG_INFINITY), -i32::MAX);
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("2 + 2"), 4.0);
        assert_eq!(run("10 - 3"), 7.0);
        assert_eq!(run("8 / 2"), 4.0);
        assert_eq!(run("10 % 3"), 1.0);
        assert_eq!(run("2 ** 10"), 1024.0);
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(run("1 / 0"), Real::INFINITY);
        assert_eq!(run("-1 / 0"), Real::NEG_INFINITY);
        assert!(run("0 / 0").is_nan());
    }

    #[test]
    fn test_unary() {
        assert_eq!(run("-5"), -5.0);
        assert_eq!(run("!0"), 1.0);
        assert_eq!(run("!7"), 0.0);
        assert_eq!(run("^2.7"), -3.0);
        assert_eq!(run("^0"), -1.0);
    }

    #[test]
    fn test_shifts_and_bitwise() {
        assert_eq!(run("1 << 3"), 8.0);
        assert_eq!(run("16 >> 2"), 4.0);
        assert_eq!(run("6 & 3"), 2.0);
        assert_eq!(run("6 | 3"), 7.0);
        assert_eq!(run("6 ^ 3"), 5.0);
        // operands truncate before the integral operation
        assert_eq!(run("6.9 & 3.9"), 2.0);
        // an infinite operand saturates to INT_MAX first
        assert_eq!(run("(1/0) << 2"), i32::MAX.wrapping_shl(2) as Real);
    }

    #[test]
    fn test_relational() {
        assert_eq!(run("1 < 2"), 1.0);
        assert_eq!(run("2 <= 2"), 1.0);
        assert_eq!(run("3 > 4"), 0.0);
        assert_eq!(run("4 >= 4"), 1.0);
        assert_eq!(run("5 == 5"), 1.0);
        assert_eq!(run("5 != 5"), 0.0);
    }

    #[test]
    fn test_logical_and() {
        // the result is the right operand whenever the left is truthy
        assert_eq!(run("1 && 2"), 2.0);
        assert_eq!(run("2 && 0"), 0.0);
        assert_eq!(run("0 && 2"), 0.0);
        // right side must not run when the left is zero
        assert_eq!(run("0 && (1/0)"), 0.0);
    }

    #[test]
    fn test_logical_or() {
        assert_eq!(run("5 || 0"), 5.0);
        assert_eq!(run("0 || 3"), 3.0);
        assert_eq!(run("0 || 0"), 0.0);
        // NaN on the left is not truthy, NaN on the right passes through
        assert_eq!(run("(0/0) || 7"), 7.0);
        assert!(run("7 || 0").is_finite());
        assert!(run("0 || (0/0)").is_nan());
    }

    #[test]
    fn test_assignment() {
        let mut env = VarEnv::new();
        let funcs = FnRegistry::new();
        let tree = create("x = y = 1", &mut env, &funcs).unwrap();
        assert_eq!(eval(&tree, &env), 1.0);
        let x = env.get("x").unwrap();
        let y = env.get("y").unwrap();
        assert_eq!(env.value(x), 1.0);
        assert_eq!(env.value(y), 1.0);
    }

    #[test]
    fn test_comma_sequencing() {
        assert_eq!(run("1, 2, 3"), 3.0);
        let mut env = VarEnv::new();
        let funcs = FnRegistry::new();
        let tree = create("a = 4, a * a", &mut env, &funcs).unwrap();
        assert_eq!(eval(&tree, &env), 16.0);
    }

    #[test]
    fn test_repeated_eval_is_idempotent_for_pure_trees() {
        let mut env = VarEnv::new();
        let funcs = FnRegistry::new();
        let tree = create("2 ** 3 ** 2 + 1 / 3", &mut env, &funcs).unwrap();
        let first = eval(&tree, &env);
        assert_eq!(eval(&tree, &env), first);
        assert_eq!(first, 512.0 + 1.0 / 3.0);
    }

    #[test]
    fn test_functions_evaluate_arguments_lazily() {
        let mut env = VarEnv::new();
        let mut funcs = FnRegistry::new();
        // evaluates only its first argument
        funcs.register("first", |args, _ctx, env| {
            args.first().map_or(Real::NAN, |a| eval(a, env))
        });
        let tree = create("first(41 + 1, 1/0)", &mut env, &funcs).unwrap();
        assert_eq!(eval(&tree, &env), 42.0);
    }
}
