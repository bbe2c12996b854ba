use crate::expr::{EvalError, ParseError};

/// Failure of an event handler or a `trigger_func` call.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("no function named `{name}`")]
    UnknownFunction { name: String },
    #[error("function `{name}` failed")]
    Function {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Everything the engine recovers from. Each one is logged and kept in the
/// component's diagnostic buffer; none of them stops the component.
#[derive(Debug, thiserror::Error)]
pub enum Diagnostic {
    #[error("failed to evaluate `{expr}`: {error}")]
    Eval { expr: String, error: EvalError },
    #[error("`%{directive}=\"{value}\"` skipped: {reason}")]
    Directive {
        directive: String,
        value: String,
        reason: String,
    },
    #[error("`{expr}` is not a sequence (got {found}); keeping the previous render")]
    NotASequence { expr: String, found: String },
    #[error("`@{event}=\"{handler}\"` failed: {error}")]
    Handler {
        event: String,
        handler: String,
        #[source]
        error: HandlerError,
    },
    #[error("unknown macro `%{name}`")]
    UnknownMacro { name: String },
    #[error("`%for=\"{expr}\"` has no `%key`; items are matched by position")]
    UnkeyedList { expr: String },
    #[error("state `{path}` not found for `%connect`; binding anyway")]
    MissingConnectState { path: String },
    #[error("no function named `{name}`")]
    UnknownFunction { name: String },
}

impl Diagnostic {
    pub fn level(&self) -> log::Level {
        match self {
            Diagnostic::Eval { .. }
            | Diagnostic::Handler { .. }
            | Diagnostic::MissingConnectState { .. }
            | Diagnostic::UnknownFunction { .. } => log::Level::Error,
            Diagnostic::Directive { .. }
            | Diagnostic::NotASequence { .. }
            | Diagnostic::UnknownMacro { .. }
            | Diagnostic::UnkeyedList { .. } => log::Level::Warn,
        }
    }
}
