//! Single-pass template compiler.
//!
//! The walk visits the template root and every descendant text and element
//! node once, in document order, and wires each directive into the binding
//! registry:
//!
//! | Syntax              | Binding                                      |
//! |---------------------|----------------------------------------------|
//! | `{{ expr }}`        | text binding on the containing text node     |
//! | `:name="expr"`      | attribute binding                            |
//! | `@event="handler"`  | event listener ([`events`])                  |
//! | `%connect="path"`   | two-way binding ([`macros`])                 |
//! | `%if="expr"`        | conditional, applied after the walk          |
//! | `%for="x in xs"`    | list instance ([`list`]), subtree not walked |
//!
//! `%if` elements are only collected during the walk; detaching them while
//! the walk is in progress would skip their siblings.

pub(crate) mod events;
pub(crate) mod list;
pub(crate) mod macros;

use std::rc::Rc;

use laterano_dom::{Attr, NodeId};

use crate::component::ComponentInner;
use crate::context::BindingScope;
use crate::error::Diagnostic;
use crate::expr::{CompiledExpr, Scope};
use crate::registry::{AttributeBinding, TextBinding, TextTemplate};
use crate::value::{Value, display};

pub(crate) fn compile(inner: &ComponentInner, root: NodeId) {
    let mut conditionals = Vec::new();
    walk(inner, root, &mut conditionals);
    for (element, expr) in conditionals {
        macros::setup_conditional(inner, element, &expr);
    }
}

fn walk(inner: &ComponentInner, node: NodeId, conditionals: &mut Vec<(NodeId, String)>) {
    let (is_text, is_element, for_value) = {
        let doc = inner.doc.borrow();
        (
            doc.is_text(node),
            doc.is_element(node),
            doc.attribute(node, "%for").map(str::to_string),
        )
    };
    if is_text {
        bind_text(inner, node);
        return;
    }
    if !is_element {
        return;
    }
    if let Some(value) = for_value
        && list::setup(inner, node, &value)
    {
        return;
    }

    bind_element(inner, node, conditionals);

    let children = inner.doc.borrow().children(node).to_vec();
    for child in children {
        walk(inner, child, conditionals);
    }
}

/// Evaluates `expr`, turning failures into a diagnostic and `undefined`.
pub(crate) fn eval_or_report(
    expr: &CompiledExpr,
    scope: &dyn Scope,
    diags: &mut Vec<Diagnostic>,
) -> Option<Value> {
    match expr.evaluate(scope) {
        Ok(v) => v,
        Err(error) => {
            diags.push(Diagnostic::Eval {
                expr: expr.source().to_string(),
                error,
            });
            None
        }
    }
}

/// Conditions that fail to evaluate count as false.
pub(crate) fn condition_or_report(
    expr: &CompiledExpr,
    scope: &dyn Scope,
    diags: &mut Vec<Diagnostic>,
) -> bool {
    expr.evaluate_condition(scope).unwrap_or_else(|error| {
        diags.push(Diagnostic::Eval {
            expr: expr.source().to_string(),
            error,
        });
        false
    })
}

/// Splits an element's attributes into `:`, `@` and `%` directives, in
/// that processing order, with the prefix stripped.
pub(crate) fn directives(attrs: &[Attr]) -> [Vec<(String, Attr)>; 3] {
    let mut out: [Vec<(String, Attr)>; 3] = Default::default();
    for a in attrs {
        let slot = match a.name.chars().next() {
            Some(':') => 0,
            Some('@') => 1,
            Some('%') => 2,
            _ => continue,
        };
        out[slot].push((a.name[1..].to_string(), a.clone()));
    }
    out
}

fn bind_text(inner: &ComponentInner, node: NodeId) {
    let template = {
        let doc = inner.doc.borrow();
        match doc.text(node).filter(|t| t.contains("{{")).and_then(TextTemplate::parse) {
            Some(t) => Rc::new(t),
            None => return,
        }
    };
    {
        let mut registry = inner.registry.borrow_mut();
        for (expr_index, expr) in template.exprs().enumerate() {
            registry.texts.push(TextBinding {
                node,
                expr_index,
                template: template.clone(),
            });
            for path in expr.paths() {
                inner.store.depend(&path, node);
            }
        }
    }
    render_text(inner, node, &template);
}

pub(crate) fn render_text(inner: &ComponentInner, node: NodeId, template: &TextTemplate) {
    let mut diags = Vec::new();
    let text = {
        let state = inner.store.root();
        let scope = BindingScope::new(&state, None);
        template.render(|e| display(eval_or_report(e, &scope, &mut diags).as_ref()))
    };
    inner.doc.borrow_mut().set_text(node, text);
    inner.report_all(diags);
}

fn bind_element(inner: &ComponentInner, node: NodeId, conditionals: &mut Vec<(NodeId, String)>) {
    let attrs = inner.doc.borrow().attributes(node).to_vec();
    let [bound, handlers, structural] = directives(&attrs);

    for (name, attr) in bound {
        inner.doc.borrow_mut().remove_attribute(node, &attr.name);
        inner.registry.borrow_mut().attributes.push(AttributeBinding {
            element: node,
            name,
            expr: CompiledExpr::compile(&attr.value),
            raw: attr.value,
        });
        let index = inner.registry.borrow().attributes.len() - 1;
        apply_attribute(inner, index);
    }

    for (event, attr) in handlers {
        let mut doc = inner.doc.borrow_mut();
        doc.remove_attribute(node, &attr.name);
        events::attach(&mut doc, &inner.this, &inner.funcs, node, &event, &attr.value, None);
    }

    for (name, attr) in structural {
        inner.doc.borrow_mut().remove_attribute(node, &attr.name);
        let value = attr.value.trim();
        match name.as_str() {
            "connect" => macros::setup_connect(inner, node, value),
            "if" => conditionals.push((node, value.to_string())),
            // `%key` only means something next to `%for`; a rejected `%for`
            // has already been reported.
            "key" | "for" => {}
            _ => inner.report(Diagnostic::UnknownMacro { name }),
        }
    }
}

fn apply_attribute(inner: &ComponentInner, index: usize) {
    let mut diags = Vec::new();
    {
        let registry = inner.registry.borrow();
        let Some(binding) = registry.attributes.get(index) else {
            return;
        };
        let value = {
            let state = inner.store.root();
            eval_or_report(&binding.expr, &BindingScope::new(&state, None), &mut diags)
        };
        inner
            .doc
            .borrow_mut()
            .set_attribute(binding.element, &binding.name, display(value.as_ref()));
    }
    inner.report_all(diags);
}

impl ComponentInner {
    pub(crate) fn refresh_texts(&self, path: &str) {
        let hits = self.registry.borrow().texts_for(path);
        for (node, template) in hits {
            render_text(self, node, &template);
        }
    }

    pub(crate) fn refresh_attributes(&self, path: &str) {
        let hits = self.registry.borrow().attributes_for(path);
        for index in hits {
            apply_attribute(self, index);
        }
    }
}
