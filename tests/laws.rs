//! Property-based tests for the parser/evaluator laws: literal
//! round-trips, algebraic identities, evaluator agreement, and
//! idempotence of pure expressions.

use expr_core::{create, eval, eval_iterative, FnRegistry, Real, VarEnv};
use proptest::prelude::*;

/// Generate well-formed expression strings over the whole operator
/// surface plus the variables `x` and `y`.
fn expr_strategy() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0u32..1000).prop_map(|n| n.to_string()),
        (0u32..1000, 1u32..100).prop_map(|(a, b)| format!("{a}.{b}")),
        Just("x".to_string()),
        Just("y".to_string()),
    ];
    leaf.prop_recursive(4, 24, 3, |inner| {
        let op = prop::sample::select(vec![
            "+", "-", "*", "/", "%", "**", "<<", ">>", "<", "<=", ">", ">=", "==", "!=", "&",
            "|", "^", "&&", "||",
        ]);
        prop_oneof![
            (inner.clone(), op, inner.clone())
                .prop_map(|(a, op, b)| format!("({a}) {op} ({b})")),
            inner.clone().prop_map(|a| format!("-({a})")),
            inner.clone().prop_map(|a| format!("!({a})")),
            inner.prop_map(|a| format!("^({a})")),
        ]
    })
}

fn eval_with(input: &str, x: Real, y: Real) -> Real {
    let mut env = VarEnv::new();
    let funcs = FnRegistry::new();
    let tree = create(input, &mut env, &funcs).unwrap();
    if let Some(id) = env.get("x") {
        env.set(id, x);
    }
    if let Some(id) = env.get("y") {
        env.set(id, y);
    }
    eval(&tree, &env)
}

fn bits_agree(a: Real, b: Real) -> bool {
    a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
}

proptest! {
    /// Integer literals below the mantissa limit survive a
    /// print-parse-eval round trip exactly.
    #[test]
    fn prop_literal_round_trip(n in -8_388_607i32..8_388_607) {
        let mut env = VarEnv::new();
        let funcs = FnRegistry::new();
        let text = n.to_string();
        let tree = create(&text, &mut env, &funcs).unwrap();
        prop_assert_eq!(eval(&tree, &env), n as Real);
    }

    /// Addition and multiplication commute for finite operands.
    #[test]
    fn prop_commutativity(a in -1.0e30f64..1.0e30, b in -1.0e30f64..1.0e30) {
        let (a, b) = (a as Real, b as Real);
        let sum_xy = eval_with("x + y", a, b);
        let sum_yx = eval_with("y + x", a, b);
        prop_assert!(bits_agree(sum_xy, sum_yx));
        let mul_xy = eval_with("x * y", a, b);
        let mul_yx = eval_with("y * x", a, b);
        prop_assert!(bits_agree(mul_xy, mul_yx));
    }

    /// The recursive and stack evaluators agree on arbitrary
    /// generated expressions, bit for bit.
    #[test]
    fn prop_evaluator_parity(input in expr_strategy(),
                             x in -1.0e6f64..1.0e6,
                             y in -1.0e6f64..1.0e6) {
        let mut env = VarEnv::new();
        let funcs = FnRegistry::new();
        let tree = create(&input, &mut env, &funcs).unwrap();
        if let Some(id) = env.get("x") {
            env.set(id, x as Real);
        }
        if let Some(id) = env.get("y") {
            env.set(id, y as Real);
        }
        let recursive = eval(&tree, &env);
        let iterative = eval_iterative(&tree, &env);
        prop_assert!(
            bits_agree(recursive, iterative),
            "disagreement on {}: {} vs {}", input, recursive, iterative
        );
    }

    /// Pure expressions evaluate to the same bits every time.
    #[test]
    fn prop_pure_expressions_are_idempotent(input in expr_strategy()) {
        let mut env = VarEnv::new();
        let funcs = FnRegistry::new();
        let tree = create(&input, &mut env, &funcs).unwrap();
        let first = eval(&tree, &env);
        let second = eval(&tree, &env);
        prop_assert!(bits_agree(first, second));
    }

    /// Parenthesizing a whole expression never changes its value.
    #[test]
    fn prop_grouping_is_transparent(input in expr_strategy()) {
        let wrapped = format!("({input})");
        let plain = eval_with(&input, 1.5, -2.5);
        let grouped = eval_with(&wrapped, 1.5, -2.5);
        prop_assert!(bits_agree(plain, grouped));
    }
}
