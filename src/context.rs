//! The variable environment and the function registry.
//!
//! Both are owned by the host. The environment is mutable shared state:
//! parsing creates variables in it, assignment during evaluation writes
//! through it, and every reference sees the latest value. The registry
//! is populated before parsing and read-only afterwards.

use crate::lexer::is_first_var_char;
use crate::types::Expr;
use crate::Real;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;

/// A stable handle to a variable in a [`VarEnv`].
///
/// Handles are only meaningful for the environment that produced them
/// and stay valid for that environment's whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarId(usize);

struct Var {
    name: String,
    value: Cell<Real>,
}

/// An insertion-ordered variable environment.
///
/// Variables are created on first reference (during parsing or through
/// [`lookup_or_create`](VarEnv::lookup_or_create)) with an initial
/// value of `0`. Values live in [`Cell`]s, so evaluation mutates them
/// through a shared reference; the engine performs no locking and the
/// environment must not be shared across threads.
///
/// # Examples
///
/// ```
/// use expr_core::VarEnv;
///
/// let mut env = VarEnv::new();
/// let x = env.lookup_or_create("x").unwrap();
/// assert_eq!(env.value(x), 0.0);
/// env.set(x, 3.5);
/// assert_eq!(env.value(x), 3.5);
/// // a second lookup interns to the same handle
/// assert_eq!(env.lookup_or_create("x"), Some(x));
/// ```
#[derive(Default)]
pub struct VarEnv {
    vars: Vec<Var>,
}

impl VarEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        VarEnv { vars: Vec::new() }
    }

    /// Find `name`, creating it with value `0` on first reference.
    ///
    /// Returns `None` when `name` is empty or does not start with a
    /// valid identifier byte. Lookup is by exact byte-wise match.
    pub fn lookup_or_create(&mut self, name: &str) -> Option<VarId> {
        if name.is_empty() || !is_first_var_char(name.as_bytes()[0]) {
            return None;
        }
        if let Some(i) = self.vars.iter().position(|v| v.name == name) {
            return Some(VarId(i));
        }
        self.vars.push(Var {
            name: String::from(name),
            value: Cell::new(0.0),
        });
        Some(VarId(self.vars.len() - 1))
    }

    /// Find `name` without creating it.
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.vars.iter().position(|v| v.name == name).map(VarId)
    }

    /// Current value of a variable.
    pub fn value(&self, id: VarId) -> Real {
        self.vars[id.0].value.get()
    }

    /// Store a value into a variable.
    pub fn set(&self, id: VarId, value: Real) {
        self.vars[id.0].value.set(value);
    }

    /// Name of a variable.
    pub fn name(&self, id: VarId) -> &str {
        &self.vars[id.0].name
    }

    /// Number of variables in the environment.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the environment holds no variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Real)> {
        self.vars.iter().map(|v| (v.name.as_str(), v.value.get()))
    }
}

/// Invocation callback of a registered function.
///
/// The callback receives the call node's unevaluated argument
/// expressions, its zero-initialized context buffer (persistent across
/// calls on the same node), and the environment; it evaluates the
/// arguments if and as it wishes by calling back into
/// [`eval`](crate::eval::eval).
pub type NativeFn = Rc<dyn Fn(&[Expr], &mut [u8], &VarEnv) -> Real>;

/// Cleanup callback, run exactly once per context buffer when the
/// owning call node is destroyed.
pub type CleanupFn = fn(&mut [u8]);

/// A host-registered function.
pub struct FnDescriptor {
    /// Name the parser resolves call sites against.
    pub name: String,
    /// The callable.
    pub invoke: NativeFn,
    /// Size in bytes of the per-node context buffer; `0` for none.
    pub ctxsz: usize,
    /// Optional context finalizer.
    pub cleanup: Option<CleanupFn>,
}

/// The set of functions available to the parser.
///
/// Registration happens before parsing; lookup takes the first
/// registered descriptor with a matching name.
///
/// # Examples
///
/// ```
/// use expr_core::{eval, create, FnRegistry, VarEnv};
///
/// let mut env = VarEnv::new();
/// let mut funcs = FnRegistry::new();
/// funcs.register("add", |args, _ctx, env| {
///     args.iter().map(|a| eval(a, env)).sum()
/// });
///
/// let tree = create("add(1, 2, 3)", &mut env, &funcs).unwrap();
/// assert_eq!(eval(&tree, &env), 6.0);
/// ```
#[derive(Default)]
pub struct FnRegistry {
    funcs: Vec<Rc<FnDescriptor>>,
}

impl FnRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        FnRegistry { funcs: Vec::new() }
    }

    /// Register a function with no per-node context.
    pub fn register<F>(&mut self, name: &str, invoke: F)
    where
        F: Fn(&[Expr], &mut [u8], &VarEnv) -> Real + 'static,
    {
        self.register_with_context(name, 0, None, invoke);
    }

    /// Register a function with a `ctxsz`-byte zero-initialized context
    /// buffer per call node and an optional cleanup hook.
    pub fn register_with_context<F>(
        &mut self,
        name: &str,
        ctxsz: usize,
        cleanup: Option<CleanupFn>,
        invoke: F,
    ) where
        F: Fn(&[Expr], &mut [u8], &VarEnv) -> Real + 'static,
    {
        self.funcs.push(Rc::new(FnDescriptor {
            name: String::from(name),
            invoke: Rc::new(invoke),
            ctxsz,
            cleanup,
        }));
    }

    /// Look up a function by name.
    pub fn lookup(&self, name: &str) -> Option<Rc<FnDescriptor>> {
        self.funcs.iter().find(|f| f.name == name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_or_create_interns() {
        let mut env = VarEnv::new();
        let a = env.lookup_or_create("a").unwrap();
        let b = env.lookup_or_create("b").unwrap();
        assert_ne!(a, b);
        assert_eq!(env.lookup_or_create("a"), Some(a));
        assert_eq!(env.len(), 2);
        assert_eq!(env.value(a), 0.0);
        assert_eq!(env.name(b), "b");
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut env = VarEnv::new();
        assert_eq!(env.lookup_or_create(""), None);
        assert_eq!(env.lookup_or_create("1abc"), None);
        assert_eq!(env.lookup_or_create("^x"), None);
        assert_eq!(env.lookup_or_create("|x"), None);
        // '$' is a valid first byte; it names the macro parameter slots
        assert!(env.lookup_or_create("$1").is_some());
    }

    #[test]
    fn test_set_through_shared_reference() {
        let mut env = VarEnv::new();
        let x = env.lookup_or_create("x").unwrap();
        let shared: &VarEnv = &env;
        shared.set(x, 9.0);
        assert_eq!(shared.value(x), 9.0);
    }

    #[test]
    fn test_insertion_order_iteration() {
        let mut env = VarEnv::new();
        env.lookup_or_create("first").unwrap();
        env.lookup_or_create("second").unwrap();
        let names: Vec<&str> = env.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn test_registry_first_match_wins() {
        let mut funcs = FnRegistry::new();
        funcs.register("f", |_a, _c, _e| 1.0);
        funcs.register("f", |_a, _c, _e| 2.0);
        let f = funcs.lookup("f").unwrap();
        let env = VarEnv::new();
        assert_eq!((f.invoke)(&[], &mut [], &env), 1.0);
        assert!(funcs.lookup("missing").is_none());
    }
}
