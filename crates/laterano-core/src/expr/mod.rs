//! Safe expression interpreter for template bindings and event handlers.
//!
//! Source text is tokenized and parsed with `chumsky` into a small AST, then
//! walked against an explicit [`Scope`]. Nothing outside what the scope hands out is reachable.
//!
//! Plain identifiers and dotted paths (`user.name`, `items.0.done`) skip the
//! parser entirely and compile to a direct path walk.

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::{AssignOp, BinaryOp, Expr, LogicalOp, Stmt, UnaryOp};
pub use eval::{evaluate, exec, member};
pub use lexer::{identifiers, is_identifier};
pub use parser::{parse_expression, parse_program};

use crate::value::{Value, truthy};

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected character `{ch}` at {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unterminated string starting at {pos}")]
    UnterminatedString { pos: usize },
    #[error("unexpected token {found} at {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("invalid assignment target at {pos}")]
    InvalidAssignTarget { pos: usize },
    #[error("only plain function names can be called (at {pos})")]
    UnsupportedCall { pos: usize },
    #[error("empty expression")]
    Empty,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("`{name}` is not defined")]
    Unbound { name: String },
    #[error("cannot read property `{prop}` of {base}")]
    MemberOfNothing { prop: String, base: &'static str },
    #[error("operator `{op}` cannot be applied to {left} and {right}")]
    Type {
        op: &'static str,
        left: String,
        right: String,
    },
    #[error("`{op}` produced a non-finite number")]
    NonFinite { op: &'static str },
    #[error("condition evaluated to {found}, expected a boolean")]
    NotBoolean { found: String },
    #[error("function calls are not allowed here (`{name}`)")]
    CallNotAllowed { name: String },
    #[error("`{name}` is not a function")]
    UnknownFunction { name: String },
    #[error("`{target}` cannot be assigned here")]
    ReadOnly { target: String },
    #[error("`{name}` failed: {message}")]
    Function { name: String, message: String },
}

/// Name resolution for the evaluator.
///
/// `resolve` returning `None` means the name is not bound at all, which is
/// an error; a bound name may still hold `undefined`, hence the nested
/// `Option`.
pub trait Scope {
    fn resolve(&self, name: &str) -> Option<Option<Value>>;

    fn call(&self, name: &str, _args: Vec<Option<Value>>) -> Result<Option<Value>, EvalError> {
        Err(EvalError::CallNotAllowed {
            name: name.to_string(),
        })
    }

    fn assign(&self, path: &str, _value: Option<Value>) -> Result<(), EvalError> {
        Err(EvalError::ReadOnly {
            target: path.to_string(),
        })
    }
}

/// A JSON object is a scope over its own keys.
impl Scope for Value {
    fn resolve(&self, name: &str) -> Option<Option<Value>> {
        self.as_object()?.get(name).cloned().map(Some)
    }
}

#[derive(Clone, Debug)]
enum Compiled {
    Path(Vec<String>),
    Tree(Expr),
    Invalid(ParseError),
}

/// An expression compiled once and evaluated many times.
#[derive(Clone, Debug)]
pub struct CompiledExpr {
    source: String,
    compiled: Compiled,
}

impl CompiledExpr {
    pub fn compile(source: &str) -> Self {
        let trimmed = source.trim();
        let compiled = match fast_path(trimmed) {
            Some(segs) => Compiled::Path(segs),
            None => match parse_expression(trimmed) {
                Ok(expr) => Compiled::Tree(expr),
                Err(e) => Compiled::Invalid(e),
            },
        };
        Self {
            source: trimmed.to_string(),
            compiled,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parse_error(&self) -> Option<&ParseError> {
        match &self.compiled {
            Compiled::Invalid(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_fast_path(&self) -> bool {
        matches!(self.compiled, Compiled::Path(_))
    }

    /// Dotted key paths the expression reads.
    pub fn paths(&self) -> Vec<String> {
        match &self.compiled {
            Compiled::Path(segs) => match segs.split_last() {
                Some((last, base)) if last == "length" && !base.is_empty() => vec![base.join(".")],
                _ => vec![segs.join(".")],
            },
            Compiled::Tree(expr) => expr.read_paths(),
            Compiled::Invalid(_) => Vec::new(),
        }
    }

    pub fn evaluate(&self, scope: &dyn Scope) -> Result<Option<Value>, EvalError> {
        match &self.compiled {
            Compiled::Path(segs) => {
                let (root, rest) = segs.split_first().ok_or(ParseError::Empty)?;
                let mut cur = scope.resolve(root).ok_or_else(|| EvalError::Unbound {
                    name: root.clone(),
                })?;
                for seg in rest {
                    cur = member(cur.as_ref(), seg)?;
                }
                Ok(cur)
            }
            Compiled::Tree(expr) => evaluate(expr, scope),
            Compiled::Invalid(e) => Err(e.clone().into()),
        }
    }

    /// Evaluates as a condition. Plain paths use truthiness; anything else
    /// must produce a boolean.
    pub fn evaluate_condition(&self, scope: &dyn Scope) -> Result<bool, EvalError> {
        let value = self.evaluate(scope)?;
        if self.is_fast_path() {
            return Ok(truthy(value.as_ref()));
        }
        match value {
            Some(Value::Bool(b)) => Ok(b),
            other => Err(EvalError::NotBoolean {
                found: describe(other.as_ref()),
            }),
        }
    }
}

fn fast_path(src: &str) -> Option<Vec<String>> {
    const KEYWORDS: &[&str] = &["true", "false", "null", "undefined"];
    let segs: Vec<&str> = src.split('.').collect();
    let (first, rest) = segs.split_first()?;
    if !is_identifier(first) || KEYWORDS.contains(first) {
        return None;
    }
    if !rest
        .iter()
        .all(|s| is_identifier(s) || (!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())))
    {
        return None;
    }
    Some(segs.into_iter().map(str::to_string).collect())
}

/// Short human description of a value for error messages.
pub fn describe(v: Option<&Value>) -> String {
    match v {
        None => "undefined".to_string(),
        Some(Value::String(s)) => format!("{s:?}"),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::json;

    #[test]
    fn fast_path_matches_general_path() {
        let state = json!({"user": {"name": "Ada", "tags": ["x", "y"]}});
        for src in ["user.name", "user.tags.1", "user.tags.length", "user.missing"] {
            let fast = CompiledExpr::compile(src);
            assert!(fast.is_fast_path(), "{src}");
            let tree = parse_expression(src).unwrap();
            assert_eq!(fast.evaluate(&state), evaluate(&tree, &state), "{src}");
        }
    }

    #[test]
    fn unknown_name_is_an_error_not_a_panic() {
        let state = json!({"a": 1});
        let e = CompiledExpr::compile("b.c");
        assert_eq!(
            e.evaluate(&state),
            Err(EvalError::Unbound { name: "b".into() })
        );
        let e = CompiledExpr::compile("a + b");
        assert!(e.evaluate(&state).is_err());
    }

    #[test]
    fn conditions_require_booleans_unless_plain_path() {
        let state = json!({"count": 3, "name": ""});
        assert!(CompiledExpr::compile("count").evaluate_condition(&state).unwrap());
        assert!(!CompiledExpr::compile("name").evaluate_condition(&state).unwrap());
        assert!(CompiledExpr::compile("count > 2").evaluate_condition(&state).unwrap());
        assert!(matches!(
            CompiledExpr::compile("count + 1").evaluate_condition(&state),
            Err(EvalError::NotBoolean { .. })
        ));
    }

    #[test]
    fn invalid_source_replays_parse_error() {
        let e = CompiledExpr::compile("a +");
        assert_eq!(e.parse_error(), Some(&ParseError::UnexpectedEnd));
        assert_eq!(
            e.evaluate(&json!({"a": 1})),
            Err(EvalError::Parse(ParseError::UnexpectedEnd))
        );
        assert!(e.paths().is_empty());
    }

    #[test]
    fn paths_of_compound_expressions() {
        let e = CompiledExpr::compile("user.isAdmin && items.length > 0");
        assert_eq!(e.paths(), vec!["user.isAdmin", "items"]);
        assert_eq!(CompiledExpr::compile("todos.length").paths(), vec!["todos"]);
        assert_eq!(CompiledExpr::compile("todos[i].done").paths(), vec!["todos", "i"]);
        assert_eq!(CompiledExpr::compile(" a.b ").paths(), vec!["a.b"]);
    }
}
