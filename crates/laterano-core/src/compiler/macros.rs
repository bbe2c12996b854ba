//! `%connect` and `%if`.

use std::rc::Rc;

use laterano_dom::{Document, Event, NodeId};

use super::condition_or_report;
use crate::component::ComponentInner;
use crate::context::BindingScope;
use crate::error::Diagnostic;
use crate::expr::{CompiledExpr, identifiers};
use crate::registry::{ConditionalRecord, ConnectBinding};
use crate::value::{Value, display};

/// Attribute mirroring a connected value on non-control hosts.
pub const CONNECT_ATTRIBUTE: &str = "data-laterano-connect";

fn is_control(tag: Option<&str>) -> bool {
    matches!(tag, Some("input" | "textarea" | "select"))
}

fn apply_connect(doc: &mut Document, binding: &ConnectBinding, value: Option<&Value>) {
    let text = display(value);
    if binding.is_control {
        doc.set_value(binding.element, text);
    } else {
        doc.set_attribute(binding.element, CONNECT_ATTRIBUTE, text);
    }
}

pub(crate) fn setup_connect(inner: &ComponentInner, element: NodeId, path: &str) {
    let binding = ConnectBinding {
        element,
        path: path.to_string(),
        is_control: is_control(inner.doc.borrow().tag(element)),
    };
    match inner.store.peek(path) {
        Some(value) => apply_connect(&mut inner.doc.borrow_mut(), &binding, Some(&value)),
        None => inner.report(Diagnostic::MissingConnectState {
            path: path.to_string(),
        }),
    }
    inner.registry.borrow_mut().connects.push(binding);

    let weak = inner.this.clone();
    let path = path.to_string();
    inner.doc.borrow_mut().add_event_listener(
        element,
        "input",
        Rc::new(move |e: &Event| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let value = inner.doc.borrow().value(e.target).unwrap_or_default().to_string();
            inner.store.set(&path, Value::String(value));
        }),
    );
}

pub(crate) fn setup_conditional(inner: &ComponentInner, element: NodeId, source: &str) {
    let placeholder = {
        let mut doc = inner.doc.borrow_mut();
        let placeholder = doc.create_comment(format!(" %if: {source} "));
        if let Some(parent) = doc.parent(element) {
            doc.insert_before(parent, placeholder, Some(element));
        }
        placeholder
    };
    inner.registry.borrow_mut().conditionals.push(ConditionalRecord {
        element,
        expr: CompiledExpr::compile(source),
        placeholder,
        present: true,
    });
    evaluate_conditional(inner, element);

    for name in identifiers(source) {
        inner.store.depend(&name, element);
    }
}

/// Shows or hides a conditional element. The element is moved, never
/// recreated: showing puts it back right after its placeholder.
pub(crate) fn evaluate_conditional(inner: &ComponentInner, element: NodeId) {
    let mut diags = Vec::new();
    {
        let mut registry = inner.registry.borrow_mut();
        let Some(record) = registry.conditionals.iter_mut().find(|c| c.element == element) else {
            return;
        };
        let show = {
            let state = inner.store.root();
            condition_or_report(&record.expr, &BindingScope::new(&state, None), &mut diags)
        };
        if show != record.present {
            let mut doc = inner.doc.borrow_mut();
            if show {
                doc.insert_after(record.placeholder, element);
            } else {
                doc.detach(element);
            }
            record.present = show;
            log::debug!("%if `{}` -> {show}", record.expr.source());
        }
    }
    inner.report_all(diags);
}

impl ComponentInner {
    pub(crate) fn refresh_connects(&self, path: &str) {
        let value = self.store.peek(path);
        let registry = self.registry.borrow();
        let mut doc = self.doc.borrow_mut();
        for index in registry.connects_for(path) {
            apply_connect(&mut doc, &registry.connects[index], value.as_ref());
        }
    }

    pub(crate) fn refresh_conditionals(&self, path: &str) {
        let elements: Vec<NodeId> = {
            let registry = self.registry.borrow();
            registry
                .conditionals_for(path)
                .into_iter()
                .map(|i| registry.conditionals[i].element)
                .collect()
        };
        for element in elements {
            evaluate_conditional(self, element);
        }
    }
}
