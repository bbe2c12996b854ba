use crate::value::{Value, format_number};

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Undefined,
    Literal(Value),
    Array(Vec<Expr>),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

/// Handler statements. Binding expressions never contain these.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
    },
    Update {
        target: Expr,
        delta: f64,
    },
}

impl Expr {
    /// Dotted key path for identifier/member chains, e.g. `a.b.0`.
    pub fn path(&self) -> Option<String> {
        match self {
            Expr::Ident(name) => Some(name.clone()),
            Expr::Member(base, prop) => Some(format!("{}.{prop}", base.path()?)),
            Expr::Index(base, index) => {
                let seg = match index.as_ref() {
                    Expr::Literal(Value::Number(n)) => format_number(n),
                    Expr::Literal(Value::String(s)) => s.clone(),
                    _ => return None,
                };
                Some(format!("{}.{seg}", base.path()?))
            }
            _ => None,
        }
    }

    /// Key paths this expression reads.
    pub fn read_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths(&self, out: &mut Vec<String>) {
        let read = match self {
            // A length changes with any write under its collection.
            Expr::Member(base, prop) if prop == "length" => base.path(),
            _ => self.path(),
        };
        if let Some(p) = read {
            if !out.contains(&p) {
                out.push(p);
            }
            return;
        }
        match self {
            Expr::Undefined | Expr::Literal(_) | Expr::Ident(_) => {}
            Expr::Member(base, _) => base.collect_paths(out),
            Expr::Index(base, index) => {
                base.collect_paths(out);
                index.collect_paths(out);
            }
            Expr::Array(items) | Expr::Call(_, items) => {
                for e in items {
                    e.collect_paths(out);
                }
            }
            Expr::Unary(_, e) => e.collect_paths(out),
            Expr::Binary(_, l, r) | Expr::Logical(_, l, r) => {
                l.collect_paths(out);
                r.collect_paths(out);
            }
            Expr::Conditional(c, t, e) => {
                c.collect_paths(out);
                t.collect_paths(out);
                e.collect_paths(out);
            }
        }
    }
}
