//! `@event` handlers.
//!
//! Handler text is classified once, when the template is compiled:
//!
//! 1. arrow style, `e => count++` or `(e, x) => { a = 1; b = 2 }`;
//! 2. call style, anything with a parenthesized call such as `add(5)`;
//! 3. the bare name of a declared function, which receives `$event`;
//! 4. otherwise a statement list like `count++` or `name = $event.target.value`.
//!
//! Parse errors surface when the handler fires, one diagnostic per firing.

use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use laterano_dom::{Document, Event, NodeId};

use super::list::ListId;
use crate::component::{ComponentInner, UserFn};
use crate::context::ItemContext;
use crate::error::{Diagnostic, HandlerError};
use crate::expr::{EvalError, ParseError, Scope, Stmt, describe, exec, is_identifier, parse_program};
use crate::value::{Map, Value, json, root_segment};

#[derive(Debug, PartialEq)]
pub(crate) enum HandlerKind {
    Arrow { params: Vec<String> },
    Call,
    Method(String),
    Statement,
}

#[derive(Debug)]
pub(crate) struct CompiledHandler {
    pub(crate) event: String,
    pub(crate) source: String,
    pub(crate) kind: HandlerKind,
    program: Result<Vec<Stmt>, ParseError>,
}

impl CompiledHandler {
    pub(crate) fn compile(event: &str, source: &str, funcs: &IndexMap<String, UserFn>) -> Self {
        let source = source.trim();
        let (kind, program) = if let Some((params, body)) = source.split_once("=>") {
            match arrow_params(params) {
                Ok(params) => (HandlerKind::Arrow { params }, arrow_body(body)),
                Err(e) => (HandlerKind::Arrow { params: Vec::new() }, Err(e)),
            }
        } else if source.contains('(') && source.contains(')') {
            (HandlerKind::Call, parse_program(source))
        } else if funcs.contains_key(source) {
            (HandlerKind::Method(source.to_string()), Ok(Vec::new()))
        } else {
            (HandlerKind::Statement, parse_program(source))
        };
        Self {
            event: event.to_string(),
            source: source.to_string(),
            kind,
            program,
        }
    }
}

fn arrow_params(text: &str) -> Result<Vec<String>, ParseError> {
    let text = text.trim();
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text);
    inner
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            if is_identifier(p) {
                Ok(p.to_string())
            } else {
                Err(ParseError::UnexpectedToken {
                    found: p.to_string(),
                    pos: 0,
                })
            }
        })
        .collect()
}

fn arrow_body(text: &str) -> Result<Vec<Stmt>, ParseError> {
    let text = text.trim();
    let body = text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .unwrap_or(text);
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    parse_program(body)
}

/// Where an item-level handler finds its item context at fire time.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ItemSlot {
    pub(crate) list: ListId,
    pub(crate) root: NodeId,
}

pub(crate) fn attach(
    doc: &mut Document,
    this: &Weak<ComponentInner>,
    funcs: &IndexMap<String, UserFn>,
    element: NodeId,
    event: &str,
    source: &str,
    slot: Option<ItemSlot>,
) {
    let handler = Rc::new(CompiledHandler::compile(event, source, funcs));
    log::debug!("@{event}: {:?}", handler.kind);
    let this = this.clone();
    doc.add_event_listener(
        element,
        event,
        Rc::new(move |e: &Event| {
            if let Some(inner) = this.upgrade() {
                run(&inner, &handler, element, e, slot);
            }
        }),
    );
}

fn run(inner: &ComponentInner, handler: &CompiledHandler, element: NodeId, e: &Event, slot: Option<ItemSlot>) {
    let item = slot.and_then(|slot| {
        let lists = inner.lists.borrow();
        let ctx = lists
            .get(slot.list)
            .and_then(|l| l.items.get(slot.root))
            .map(|b| b.ctx.clone());
        ctx
    });
    let (event, el) = {
        let doc = inner.doc.borrow();
        (event_json(&doc, e), element_json(&doc, element))
    };

    let result = match &handler.kind {
        HandlerKind::Method(name) => inner.call_func(name, &[event]).map(drop),
        HandlerKind::Arrow { params } => execute(inner, handler, params, item, event, el),
        HandlerKind::Call | HandlerKind::Statement => execute(inner, handler, &[], item, event, el),
    };
    if let Err(error) = result {
        inner.report(Diagnostic::Handler {
            event: handler.event.clone(),
            handler: handler.source.clone(),
            error,
        });
    }
}

fn execute(
    inner: &ComponentInner,
    handler: &CompiledHandler,
    params: &[String],
    item: Option<ItemContext>,
    event: Value,
    el: Value,
) -> Result<(), HandlerError> {
    let program = handler.program.as_ref().map_err(|e| e.clone())?;
    let scope = HandlerScope {
        inner,
        params,
        item,
        event,
        el,
    };
    exec(program, &scope)?;
    Ok(())
}

/// `{tagName, value, textContent, attributes}` snapshot of an element.
pub(crate) fn element_json(doc: &Document, id: NodeId) -> Value {
    let attributes: Map<String, Value> = doc
        .attributes(id)
        .iter()
        .map(|a| (a.name.clone(), Value::String(a.value.clone())))
        .collect();
    json!({
        "tagName": doc.tag(id).map(str::to_ascii_uppercase),
        "value": doc.value(id),
        "textContent": doc.text_content(id),
        "attributes": attributes,
    })
}

pub(crate) fn event_json(doc: &Document, e: &Event) -> Value {
    json!({
        "type": e.kind,
        "target": element_json(doc, e.target),
        "currentTarget": element_json(doc, e.current_target),
    })
}

/// Names visible to a handler, innermost first: arrow parameters, item
/// context, `$event`, `$el`, then top-level state keys.
struct HandlerScope<'a> {
    inner: &'a ComponentInner,
    params: &'a [String],
    item: Option<ItemContext>,
    event: Value,
    el: Value,
}

impl HandlerScope<'_> {
    fn is_local(&self, name: &str) -> bool {
        self.params.iter().any(|p| p == name)
            || self.item.as_ref().is_some_and(|c| c.contains(name))
            || name == "$event"
            || name == "$el"
    }

    fn invoke(&self, name: &str, args: &[Value]) -> Result<Option<Value>, EvalError> {
        match self.inner.call_func(name, args) {
            Ok(v) => Ok(Some(v)),
            Err(HandlerError::UnknownFunction { name }) => Err(EvalError::UnknownFunction { name }),
            Err(HandlerError::Function { name, source }) => Err(EvalError::Function {
                name,
                message: format!("{source:#}"),
            }),
            Err(other) => Err(EvalError::Function {
                name: name.to_string(),
                message: other.to_string(),
            }),
        }
    }
}

fn path_arg(func: &'static str, arg: Option<&Option<Value>>) -> Result<String, EvalError> {
    match arg {
        Some(Some(Value::String(path))) => Ok(path.clone()),
        other => Err(EvalError::Type {
            op: func,
            left: describe(other.and_then(Option::as_ref)),
            right: "a key path".to_string(),
        }),
    }
}

impl Scope for HandlerScope<'_> {
    fn resolve(&self, name: &str) -> Option<Option<Value>> {
        if let Some(i) = self.params.iter().position(|p| p == name) {
            return Some(Some(if i == 0 { self.event.clone() } else { Value::Null }));
        }
        if let Some(v) = self.item.as_ref().and_then(|c| c.get(name)) {
            return Some(Some(v.clone()));
        }
        match name {
            "$event" => Some(Some(self.event.clone())),
            "$el" => Some(Some(self.el.clone())),
            _ => self.inner.store.root().resolve(name),
        }
    }

    fn call(&self, name: &str, args: Vec<Option<Value>>) -> Result<Option<Value>, EvalError> {
        match name {
            "setState" => {
                let path = path_arg("setState", args.first())?;
                let value = args.get(1).cloned().flatten().unwrap_or(Value::Null);
                self.inner.store.set(&path, value);
                Ok(None)
            }
            "getState" => {
                let path = path_arg("getState", args.first())?;
                Ok(self.inner.store.get(&path))
            }
            "triggerFunc" => {
                let mut args = args.into_iter();
                let func = match args.next().flatten() {
                    Some(Value::String(func)) => func,
                    other => {
                        return Err(EvalError::Type {
                            op: "triggerFunc",
                            left: describe(other.as_ref()),
                            right: "a function name".to_string(),
                        });
                    }
                };
                let rest: Vec<Value> = args.map(|a| a.unwrap_or(Value::Null)).collect();
                self.invoke(&func, &rest)
            }
            _ => {
                let args: Vec<Value> = args.into_iter().map(|a| a.unwrap_or(Value::Null)).collect();
                self.invoke(name, &args)
            }
        }
    }

    fn assign(&self, path: &str, value: Option<Value>) -> Result<(), EvalError> {
        if self.is_local(root_segment(path)) {
            return Err(EvalError::ReadOnly {
                target: path.to_string(),
            });
        }
        self.inner.store.set(path, value.unwrap_or(Value::Null));
        Ok(())
    }
}
