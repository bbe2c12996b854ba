use super::ast::{AssignOp, BinaryOp, Expr, LogicalOp, Stmt, UnaryOp};
use super::{EvalError, Scope, describe};
use crate::value::{Value, display, number, truthy};

/// Property read with script semantics: `.length` on arrays and strings,
/// numeric segments on arrays, missing keys are `undefined`, and reading
/// from `undefined`/`null` is an error.
pub fn member(base: Option<&Value>, prop: &str) -> Result<Option<Value>, EvalError> {
    let nothing = |base| EvalError::MemberOfNothing {
        prop: prop.to_string(),
        base,
    };
    Ok(match base {
        None => return Err(nothing("undefined")),
        Some(Value::Null) => return Err(nothing("null")),
        Some(Value::Array(items)) if prop == "length" => Some(Value::from(items.len())),
        Some(Value::String(s)) if prop == "length" => Some(Value::from(s.encode_utf16().count())),
        Some(Value::Array(items)) => prop
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .cloned(),
        Some(Value::Object(map)) => map.get(prop).cloned(),
        Some(_) => None,
    })
}

pub fn evaluate(expr: &Expr, scope: &dyn Scope) -> Result<Option<Value>, EvalError> {
    match expr {
        Expr::Undefined => Ok(None),
        Expr::Literal(v) => Ok(Some(v.clone())),
        Expr::Array(items) => items
            .iter()
            .map(|e| evaluate(e, scope).map(|v| v.unwrap_or(Value::Null)))
            .collect::<Result<Vec<_>, _>>()
            .map(|items| Some(Value::Array(items))),
        Expr::Ident(name) => scope.resolve(name).ok_or_else(|| EvalError::Unbound {
            name: name.clone(),
        }),
        Expr::Member(base, prop) => member(evaluate(base, scope)?.as_ref(), prop),
        Expr::Index(base, index) => {
            let base = evaluate(base, scope)?;
            let prop = match evaluate(index, scope)? {
                Some(Value::String(s)) => s,
                other => display(other.as_ref()),
            };
            member(base.as_ref(), &prop)
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|a| evaluate(a, scope))
                .collect::<Result<Vec<_>, _>>()?;
            scope.call(name, args)
        }
        Expr::Unary(op, operand) => {
            let v = evaluate(operand, scope)?;
            match op {
                UnaryOp::Not => Ok(Some(Value::Bool(!truthy(v.as_ref())))),
                UnaryOp::Neg => Ok(Some(number(-numeric("-", v.as_ref())?))),
                UnaryOp::Plus => Ok(Some(number(numeric("+", v.as_ref())?))),
            }
        }
        Expr::Binary(op, l, r) => {
            let l = evaluate(l, scope)?;
            let r = evaluate(r, scope)?;
            binary(*op, l, r)
        }
        Expr::Logical(op, l, r) => {
            let l = evaluate(l, scope)?;
            match (op, truthy(l.as_ref())) {
                (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(l),
                _ => evaluate(r, scope),
            }
        }
        Expr::Conditional(c, then, otherwise) => {
            if truthy(evaluate(c, scope)?.as_ref()) {
                evaluate(then, scope)
            } else {
                evaluate(otherwise, scope)
            }
        }
    }
}

/// Runs handler statements in order; returns the value of the last one.
pub fn exec(program: &[Stmt], scope: &dyn Scope) -> Result<Option<Value>, EvalError> {
    let mut last = None;
    for stmt in program {
        last = match stmt {
            Stmt::Expr(e) => evaluate(e, scope)?,
            Stmt::Assign { target, op, value } => {
                let rhs = evaluate(value, scope)?;
                let new = match op {
                    AssignOp::Set => rhs,
                    AssignOp::Add => binary(BinaryOp::Add, evaluate(target, scope)?, rhs)?,
                    AssignOp::Sub => binary(BinaryOp::Sub, evaluate(target, scope)?, rhs)?,
                };
                write(target, new.clone(), scope)?;
                new
            }
            Stmt::Update { target, delta } => {
                let current = evaluate(target, scope)?;
                let new = Some(number(numeric("++", current.as_ref())? + delta));
                write(target, new.clone(), scope)?;
                new
            }
        };
    }
    Ok(last)
}

fn write(target: &Expr, value: Option<Value>, scope: &dyn Scope) -> Result<(), EvalError> {
    let path = target.path().ok_or_else(|| EvalError::ReadOnly {
        target: format!("{target:?}"),
    })?;
    scope.assign(&path, value)
}

fn numeric(op: &'static str, v: Option<&Value>) -> Result<f64, EvalError> {
    match v {
        Some(Value::Number(n)) => n.as_f64().ok_or(EvalError::NonFinite { op }),
        Some(Value::String(s)) if op == "+" => s.trim().parse::<f64>().map_err(|_| EvalError::Type {
            op,
            left: describe(v),
            right: "a number".to_string(),
        }),
        other => Err(EvalError::Type {
            op,
            left: describe(other),
            right: "a number".to_string(),
        }),
    }
}

fn concat_text(v: Option<&Value>) -> String {
    match v {
        None => "undefined".to_string(),
        other => display(other),
    }
}

fn binary(op: BinaryOp, l: Option<Value>, r: Option<Value>) -> Result<Option<Value>, EvalError> {
    let (l, r) = (l.as_ref(), r.as_ref());
    let sym = op.symbol();
    let mismatch = || EvalError::Type {
        op: sym,
        left: describe(l),
        right: describe(r),
    };

    match op {
        BinaryOp::Eq => return Ok(Some(Value::Bool(loose_eq(l, r)))),
        BinaryOp::Ne => return Ok(Some(Value::Bool(!loose_eq(l, r)))),
        BinaryOp::Add if matches!(l, Some(Value::String(_))) || matches!(r, Some(Value::String(_))) => {
            return Ok(Some(Value::String(concat_text(l) + &concat_text(r))));
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = match (l, r) {
                (Some(Value::Number(a)), Some(Value::Number(b))) => {
                    a.as_f64().partial_cmp(&b.as_f64())
                }
                (Some(Value::String(a)), Some(Value::String(b))) => Some(a.cmp(b)),
                _ => return Err(mismatch()),
            };
            let Some(ord) = ord else {
                return Ok(Some(Value::Bool(false)));
            };
            let result = match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            };
            return Ok(Some(Value::Bool(result)));
        }
        _ => {}
    }

    let (Some(Value::Number(a)), Some(Value::Number(b))) = (l, r) else {
        return Err(mismatch());
    };
    let (a, b) = (
        a.as_f64().ok_or(EvalError::NonFinite { op: sym })?,
        b.as_f64().ok_or(EvalError::NonFinite { op: sym })?,
    );
    let out = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => return Err(mismatch()),
    };
    if !out.is_finite() {
        return Err(EvalError::NonFinite { op: sym });
    }
    Ok(Some(number(out)))
}

fn loose_eq(l: Option<&Value>, r: Option<&Value>) -> bool {
    match (l, r) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        _ => l == r,
    }
}
