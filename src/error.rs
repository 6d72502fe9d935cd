//! Error types for expression compilation.
//!
//! Every error in this crate is produced while compiling an expression;
//! evaluation of a well-formed tree never fails structurally (undefined
//! arithmetic yields NaN or infinity from the scalar type instead).

use core::fmt;
use core::result;

/// Result type used throughout the crate.
pub type Result<T> = result::Result<T, ExprError>;

/// A parse-time failure.
///
/// The tokenizer and parser reject malformed input with one of these
/// kinds; any partially built tree, operator entries, and macro bodies
/// are released before the error reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprError {
    /// A number appeared where an operator was required, or a numeric
    /// literal was malformed (e.g. `2 3`, `2.3.4`).
    UnexpectedNumber,
    /// An identifier appeared in operator position.
    UnexpectedWord,
    /// A parenthesis out of context, or an unbalanced group.
    MismatchedParen,
    /// An operator with no value to apply to (e.g. `2 +`).
    MissingOperand,
    /// Operator bytes that match no known operator.
    UnknownOperator,
    /// `(` after something that cannot be called, or a callable name
    /// not followed by `(`.
    BadCall,
    /// The left-hand side of `=` is not a variable.
    BadAssignment,
    /// A `$(…)` definition whose first argument is not a variable, or
    /// with too few arguments.
    BadMacro,
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprError::UnexpectedNumber => write!(f, "unexpected number"),
            ExprError::UnexpectedWord => write!(f, "unexpected identifier"),
            ExprError::MismatchedParen => write!(f, "mismatched parenthesis"),
            ExprError::MissingOperand => write!(f, "missing operand"),
            ExprError::UnknownOperator => write!(f, "unknown operator"),
            ExprError::BadCall => write!(f, "invalid function call"),
            ExprError::BadAssignment => write!(f, "left side of assignment is not a variable"),
            ExprError::BadMacro => write!(f, "invalid macro definition"),
        }
    }
}
