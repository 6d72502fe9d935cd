#![cfg_attr(not(test), no_std)]
#![doc = r#"
# expr-core

A small, embeddable arithmetic/logic expression engine. An expression
over numbers, named variables, registered functions, and user-defined
macros compiles once into a reusable tree; the tree evaluates against a
live variable environment owned by the host.

## Overview

- **Compile once, evaluate many times.** [`create`] parses a source
  string into an [`Expr`]; [`eval()`] (or the stack-based
  [`eval_iterative`](eval::iterative::eval_iterative)) produces a
  scalar. Assignments in the expression write through the environment,
  so successive evaluations see updated state.
- **Host-extensible.** Functions are registered in a [`FnRegistry`]
  before parsing. A function receives its *unevaluated* argument
  expressions plus a persistent per-call-site context buffer, and
  decides if and when to evaluate the arguments.
- **Macros.** `$(name, body…)` defines a parse-time macro; calls are
  expanded inline into the tree, with arguments bound through the
  `$1…$k` parameter slots.
- **no_std.** The crate only needs `alloc`; `libm` supplies the few
  math routines the evaluator uses.

## Quick start

```rust
use expr_core::{create, eval, FnRegistry, VarEnv};

let mut env = VarEnv::new();
let funcs = FnRegistry::new();

let tree = create("x ** 2 + 1", &mut env, &funcs).unwrap();
let x = env.get("x").unwrap(); // created on first reference, value 0
assert_eq!(eval(&tree, &env), 1.0);

env.set(x, 3.0);
assert_eq!(eval(&tree, &env), 10.0);
```

Registering a function:

```rust
use expr_core::{create, eval, FnRegistry, Real, VarEnv};

let mut env = VarEnv::new();
let mut funcs = FnRegistry::new();
funcs.register("max", |args, _ctx, env| {
    args.iter()
        .map(|a| eval(a, env))
        .fold(Real::NEG_INFINITY, Real::max)
});

let tree = create("max(1, 4, 2)", &mut env, &funcs).unwrap();
assert_eq!(eval(&tree, &env), 4.0);
```

## Grammar

Comments run from `#` to end of line. Newlines at the top level and
inside call parentheses act as statement/argument separators. Numbers
are plain decimals (one optional `.`, no sign, no exponent).

Operators, loosest first: `,` · `=` · `||` · `&&` · `^` (xor) · `|` ·
`&` · comparisons (`< <= > >= == !=`) · shifts (`<< >>`) · `+ -` ·
`* / %` · `**` (right-assoc) · unary `-` `!` `^` (bitwise not).
Shifts and bitwise operators truncate their operands to integers and
widen the result back to a scalar; `&&`/`||` short-circuit and yield
operand values, not canonical booleans.

## Features

- `f32` (default) / `f64`: precision of the [`Real`] scalar. Exactly
  one must be enabled.
"#]

extern crate alloc;

pub mod context;
pub mod engine;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod types;

pub use context::{CleanupFn, FnDescriptor, FnRegistry, NativeFn, VarEnv, VarId};
pub use engine::{create, interp};
pub use error::{ExprError, Result};
pub use eval::iterative::{eval_iterative, StackEvaluator};
pub use eval::{eval, to_int};
pub use types::{BinaryOp, Expr, FuncCall, UnaryOp};

#[cfg(all(feature = "f32", feature = "f64"))]
compile_error!("You must enable only one of the features: 'f32' or 'f64', not both.");

#[cfg(not(any(feature = "f32", feature = "f64")))]
compile_error!("You must enable one of the features: 'f32' or 'f64'.");

/// The scalar type, selected by the `f32`/`f64` features.
#[cfg(feature = "f32")]
pub type Real = f32;

/// The scalar type, selected by the `f32`/`f64` features.
#[cfg(feature = "f64")]
pub type Real = f64;

/// Numeric constants used by the crate and its test suites.
pub mod constants {
    use super::Real;

    /// Comparison tolerance for approximate assertions.
    #[cfg(feature = "f32")]
    pub const TEST_PRECISION: Real = 1e-6;

    /// Comparison tolerance for approximate assertions.
    #[cfg(feature = "f64")]
    pub const TEST_PRECISION: Real = 1e-12;
}

/// Assert that two scalars are approximately equal.
///
/// NaN equals NaN and same-signed infinities are equal, which matches
/// how evaluation results are compared across the two evaluators.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($left, $right, $crate::constants::TEST_PRECISION)
    };
    ($left:expr, $right:expr, $epsilon:expr $(,)?) => {{
        let left_val: $crate::Real = $left;
        let right_val: $crate::Real = $right;
        let eps: $crate::Real = $epsilon;
        if left_val.is_nan() && right_val.is_nan() {
            // NaN == NaN for our purposes
        } else if left_val.is_infinite()
            && right_val.is_infinite()
            && (left_val > 0.0) == (right_val > 0.0)
        {
            // same-signed infinities are equal
        } else {
            assert!(
                (left_val - right_val).abs() < eps,
                "assertion failed: `(left ≈ right)` (left: `{}`, right: `{}`, epsilon: `{}`)",
                left_val,
                right_val,
                eps
            );
        }
    }};
}
