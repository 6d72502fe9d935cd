//! Expression compilation.
//!
//! [`create`] drives the tokenizer and assembles the expression tree
//! with a shunting-yard parser built on three stacks:
//!
//! - `es`, the output stack of finished subtrees;
//! - `os`, the operator stack, whose entries are resolved operators
//!   plus the `(` and `{` barriers (a `{` marks a call opening, with
//!   the callee name recorded just beneath it);
//! - `frames`, one record per open call, holding the stack depths at
//!   the opening and the argument subtrees collected so far.
//!
//! Macro definitions (`$(name, body…)`) live only for the duration of
//! one `create` call; every macro call site is expanded inline before
//! the tree is returned.

use crate::context::{FnRegistry, VarEnv};
use crate::error::{ExprError, Result};
use crate::eval::eval;
use crate::lexer;
use crate::types::{BinaryOp, Expr, FuncCall, UnaryOp};
use crate::Real;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paren {
    Allowed,
    Expected,
    Forbidden,
}

/// A resolved operator on the operator stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Oper {
    Unary(UnaryOp),
    Binary(BinaryOp),
}

impl Oper {
    fn precedence(self) -> u8 {
        match self {
            // unary operators bind tighter than any binary class
            Oper::Unary(_) => 1,
            Oper::Binary(op) => op.precedence(),
        }
    }

    fn left_assoc(self) -> bool {
        match self {
            Oper::Unary(_) => false,
            Oper::Binary(op) => op.left_assoc(),
        }
    }
}

/// Whether the operator on top of the stack reduces before `incoming`
/// is shifted.
fn reduce_before(incoming: Oper, top: Oper) -> bool {
    (incoming.left_assoc() && incoming.precedence() >= top.precedence())
        || incoming.precedence() > top.precedence()
}

enum OsEntry<'a> {
    Op(Oper),
    /// Grouping barrier.
    Open,
    /// Call barrier; the entry beneath it is the callee [`OsEntry::Name`].
    Brace,
    Name(&'a str),
}

struct CallFrame {
    os_len: usize,
    es_len: usize,
    args: Vec<Expr>,
}

struct Macro {
    name: String,
    body: Vec<Expr>,
}

/// Compile `input` into an expression tree.
///
/// Variables are created in `env` on first reference; call sites are
/// resolved against macros defined so far, then `funcs`. On any error
/// every partially built node is released and the environment keeps
/// whatever variables were already interned.
///
/// Empty input compiles to a constant `0`.
///
/// # Examples
///
/// ```
/// use expr_core::{create, eval, FnRegistry, VarEnv};
///
/// let mut env = VarEnv::new();
/// let funcs = FnRegistry::new();
/// let tree = create("1 + 2 * 3", &mut env, &funcs).unwrap();
/// assert_eq!(eval(&tree, &env), 7.0);
/// ```
pub fn create(input: &str, env: &mut VarEnv, funcs: &FnRegistry) -> Result<Expr> {
    let mut rest = input;
    let mut flags = lexer::TDEFAULT;

    let mut es: Vec<Expr> = Vec::new();
    let mut os: Vec<OsEntry> = Vec::new();
    let mut frames: Vec<CallFrame> = Vec::new();
    let mut macros: Vec<Macro> = Vec::new();

    let mut paren = Paren::Allowed;
    let mut pending: Option<&str> = None;

    loop {
        let n = lexer::next_token(rest, &mut flags)?;
        if n == 0 {
            break;
        }
        let (lexeme, tail) = rest.split_at(n);
        rest = tail;

        let first = lexeme.as_bytes()[0];
        if first == b'#' {
            continue;
        }
        let tok = if first == b'\n' && flags & lexer::COMMA != 0 {
            // a newline at a statement boundary separates like `,`
            flags &= !lexer::COMMA;
            ","
        } else if lexer::is_space(first) {
            continue;
        } else {
            lexeme
        };

        let mut paren_next = Paren::Allowed;

        // an identifier binds according to what follows it: a call
        // when `(` comes next, a variable reference otherwise
        if let Some(id) = pending.take() {
            if tok == "(" {
                let callable = id == "$"
                    || macros.iter().any(|m| m.name == id)
                    || funcs.lookup(id).is_some();
                if !callable {
                    return Err(ExprError::BadCall);
                }
                os.push(OsEntry::Name(id));
                paren = Paren::Expected;
            } else {
                let var = env.lookup_or_create(id).ok_or(ExprError::UnexpectedWord)?;
                es.push(Expr::Var(var));
                paren = Paren::Forbidden;
            }
        }

        if tok == "(" {
            match paren {
                Paren::Expected => {
                    os.push(OsEntry::Brace);
                    frames.push(CallFrame {
                        os_len: os.len(),
                        es_len: es.len(),
                        args: Vec::new(),
                    });
                }
                Paren::Allowed => os.push(OsEntry::Open),
                Paren::Forbidden => return Err(ExprError::BadCall),
            }
        } else if paren == Paren::Expected {
            return Err(ExprError::BadCall);
        } else if tok == ")" {
            close_paren(&mut es, &mut os, &mut frames, &mut macros, env, funcs)?;
            paren_next = Paren::Forbidden;
        } else {
            let num = lexer::parse_number(tok);
            if !num.is_nan() {
                es.push(Expr::Const(num));
                paren_next = Paren::Forbidden;
            } else if let Some(op) = resolve_oper(tok, flags) {
                shift_operator(op, &mut es, &mut os, &mut frames)?;
            } else if !first.is_ascii_digit() {
                pending = Some(tok);
            } else {
                // a digit run that is not a number, e.g. `2.3.4`
                return Err(ExprError::UnexpectedNumber);
            }
        }
        paren = paren_next;
    }

    // a trailing identifier is a variable reference
    if let Some(id) = pending.take() {
        let var = env.lookup_or_create(id).ok_or(ExprError::UnexpectedWord)?;
        es.push(Expr::Var(var));
    }

    while let Some(entry) = os.pop() {
        match entry {
            OsEntry::Op(op) => bind(op, &mut es)?,
            OsEntry::Open | OsEntry::Brace | OsEntry::Name(_) => {
                return Err(ExprError::MismatchedParen)
            }
        }
    }

    Ok(es.pop().unwrap_or(Expr::Const(0.0)))
}

/// Compile and evaluate in one call.
///
/// # Examples
///
/// ```
/// use expr_core::{interp, FnRegistry, VarEnv};
///
/// let mut env = VarEnv::new();
/// let funcs = FnRegistry::new();
/// assert_eq!(interp("2 ** 3 ** 2", &mut env, &funcs).unwrap(), 512.0);
/// ```
pub fn interp(input: &str, env: &mut VarEnv, funcs: &FnRegistry) -> Result<Real> {
    let tree = create(input, env, funcs)?;
    Ok(eval(&tree, env))
}

fn resolve_oper(tok: &str, flags: u8) -> Option<Oper> {
    if flags & lexer::UNARY != 0 {
        UnaryOp::from_symbol(tok).map(Oper::Unary)
    } else {
        BinaryOp::from_symbol(tok).map(Oper::Binary)
    }
}

/// Pop one or two operands and push the bound operator node.
fn bind(op: Oper, es: &mut Vec<Expr>) -> Result<()> {
    match op {
        Oper::Unary(op) => {
            let arg = es.pop().ok_or(ExprError::MissingOperand)?;
            es.push(Expr::unary(op, arg));
        }
        Oper::Binary(op) => {
            let right = es.pop().ok_or(ExprError::MissingOperand)?;
            let left = es.pop().ok_or(ExprError::MissingOperand)?;
            if op == BinaryOp::Assign && !matches!(left, Expr::Var(_)) {
                return Err(ExprError::BadAssignment);
            }
            es.push(Expr::binary(op, left, right));
        }
    }
    Ok(())
}

fn shift_operator(
    op: Oper,
    es: &mut Vec<Expr>,
    os: &mut Vec<OsEntry>,
    frames: &mut Vec<CallFrame>,
) -> Result<()> {
    loop {
        // a `,` directly inside a call moves the finished argument
        // into the frame's collector instead of becoming a node
        if op == Oper::Binary(BinaryOp::Comma) {
            if let Some(OsEntry::Brace) = os.last() {
                let arg = es.pop().ok_or(ExprError::MissingOperand)?;
                frames
                    .last_mut()
                    .ok_or(ExprError::MismatchedParen)?
                    .args
                    .push(arg);
                return Ok(());
            }
        }
        match os.last() {
            Some(OsEntry::Op(top)) if reduce_before(op, *top) => {
                let top = *top;
                os.pop();
                bind(top, es)?;
            }
            _ => {
                os.push(OsEntry::Op(op));
                return Ok(());
            }
        }
    }
}

fn close_paren<'a>(
    es: &mut Vec<Expr>,
    os: &mut Vec<OsEntry<'a>>,
    frames: &mut Vec<CallFrame>,
    macros: &mut Vec<Macro>,
    env: &mut VarEnv,
    funcs: &FnRegistry,
) -> Result<()> {
    // reduce everything above the nearest barrier, but never past the
    // opening depth of the current call frame
    let min_len = frames.last().map_or(0, |f| f.os_len);
    while os.len() > min_len {
        match os.last() {
            Some(OsEntry::Op(top)) => {
                let top = *top;
                os.pop();
                bind(top, es)?;
            }
            _ => break,
        }
    }

    match os.pop() {
        Some(OsEntry::Open) => Ok(()),
        Some(OsEntry::Brace) => {
            let name = match os.pop() {
                Some(OsEntry::Name(name)) => name,
                _ => return Err(ExprError::MismatchedParen),
            };
            let mut frame = frames.pop().ok_or(ExprError::MismatchedParen)?;
            if es.len() > frame.es_len {
                frame.args.extend(es.pop());
            }

            if name == "$" {
                define_macro(frame.args, macros, env)?;
                // a definition evaluates to 0
                es.push(Expr::Const(0.0));
            } else if let Some(i) = macros.iter().rposition(|m| m.name == name) {
                let expansion = expand_macro(&macros[i].body, frame.args, env)?;
                es.push(expansion);
            } else {
                let f = funcs.lookup(name).ok_or(ExprError::BadCall)?;
                es.push(Expr::Call(FuncCall::new(f, frame.args)));
            }
            Ok(())
        }
        _ => Err(ExprError::MismatchedParen),
    }
}

/// Record a `$(name, body…)` definition. The first argument names the
/// macro through the variable it references; the whole argument list
/// becomes the stored body.
fn define_macro(args: Vec<Expr>, macros: &mut Vec<Macro>, env: &VarEnv) -> Result<()> {
    let head = args.first().ok_or(ExprError::BadMacro)?;
    let id = match head {
        Expr::Var(id) => *id,
        _ => return Err(ExprError::BadMacro),
    };
    macros.push(Macro {
        name: String::from(env.name(id)),
        body: args,
    });
    Ok(())
}

/// Expand a macro call inline:
///
/// ```text
/// ( $1 = A1 , ( $2 = A2 , … ( $k = Ak , ( B1 , ( B2 , … Bm ) ) ) ) )
/// ```
///
/// The `$1…$k` parameter slots are ordinary variables in the enclosing
/// environment, shared by every expansion; body nodes are deep-copied,
/// so call nodes in the copy get fresh context buffers. `B0` is the
/// variable that named the macro at definition time and is skipped.
fn expand_macro(body: &[Expr], args: Vec<Expr>, env: &mut VarEnv) -> Result<Expr> {
    let mut tail = Expr::Const(0.0);
    for (i, part) in body.iter().enumerate().skip(1).rev() {
        if i == body.len() - 1 {
            tail = part.clone();
        } else {
            tail = Expr::binary(BinaryOp::Comma, part.clone(), tail);
        }
    }
    for (i, arg) in args.into_iter().enumerate().rev() {
        let slot = env
            .lookup_or_create(&format!("${}", i + 1))
            .ok_or(ExprError::BadMacro)?;
        let assign = Expr::binary(BinaryOp::Assign, Expr::Var(slot), arg);
        tail = Expr::binary(BinaryOp::Comma, assign, tail);
    }
    Ok(tail)
}
