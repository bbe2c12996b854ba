//! `%for` list rendering with keyed reconciliation.
//!
//! Every list owns a detached per-item template and a side table keyed by
//! the root [`NodeId`] of each rendered item. The side table holds the
//! item's context and its binding sites (text, `:attr`, nested `%if`,
//! nested lists), so a reused element is re-bound in place and its event
//! listeners, attached once, read the fresh context when they fire.
//!
//! A render pass:
//!
//! 1. evaluates the collection, giving up (and keeping the old render) if it
//!    is not an array;
//! 2. detaches the rendered items;
//! 3. indexes them by key;
//! 4. walks the collection in order, reusing the element with the same key
//!    or cloning the template, and binds the item context onto it;
//! 5. inserts the new block right after the anchor comment;
//! 6. frees the items nobody claimed.

use std::collections::HashSet;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use laterano_dom::{Document, NodeId};
use slotmap::{SecondaryMap, SlotMap, new_key_type};

use super::events::{self, ItemSlot};
use super::{condition_or_report, directives, eval_or_report};
use crate::component::{ComponentInner, UserFn};
use crate::context::{BindingScope, ItemContext};
use crate::error::Diagnostic;
use crate::expr::{CompiledExpr, describe, identifiers, is_identifier};
use crate::registry::TextTemplate;
use crate::value::{Value, display, key_string, root_segment};

new_key_type! {
    pub struct ListId;
}

pub(crate) type ListArena = SlotMap<ListId, ListInstance>;

/// Parsed `%for` value: `item in items` or `(item, i) in items`.
#[derive(Clone, Debug)]
pub(crate) struct ForDirective {
    pub(crate) source: String,
    pub(crate) item: String,
    pub(crate) index: Option<String>,
    pub(crate) collection: CompiledExpr,
}

impl ForDirective {
    /// On failure returns why the value was rejected.
    pub(crate) fn parse(value: &str) -> Result<Self, String> {
        let source = value.trim();
        let normalized = source.replace(['\t', '\n', '\r'], " ");
        let Some((vars, collection)) = normalized.split_once(" in ") else {
            return Err("expected `item in collection` or `(item, index) in collection`".into());
        };
        let vars = vars.trim();
        let names: Vec<&str> = match vars.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
            Some(inner) => inner.split(',').map(str::trim).collect(),
            None => vec![vars],
        };
        let (item, index) = match names.as_slice() {
            [item] => (*item, None),
            [item, index] => (*item, Some(*index)),
            _ => return Err(format!("expected one or two loop variables, got `{vars}`")),
        };
        for name in std::iter::once(item).chain(index) {
            if !is_identifier(name) {
                return Err(format!("`{name}` is not a valid variable name"));
            }
        }
        let collection = CompiledExpr::compile(collection);
        if let Some(e) = collection.parse_error() {
            return Err(format!("collection `{}`: {e}", collection.source()));
        }
        Ok(Self {
            source: source.to_string(),
            item: item.to_string(),
            index: index.map(str::to_string),
            collection,
        })
    }

    fn locals(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.item.as_str()).chain(self.index.as_deref())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct RenderedItem {
    pub(crate) element: NodeId,
    pub(crate) key: String,
    pub(crate) data: Value,
    pub(crate) index: usize,
}

#[derive(Clone, Debug)]
struct Toggle {
    element: NodeId,
    expr: CompiledExpr,
    /// Authored `style`, restored when shown.
    style: Option<String>,
}

/// Per-item side-table entry.
#[derive(Debug, Default)]
pub(crate) struct ItemBinding {
    pub(crate) ctx: ItemContext,
    texts: Vec<(NodeId, Rc<TextTemplate>)>,
    attrs: Vec<(NodeId, String, CompiledExpr)>,
    toggles: Vec<Toggle>,
    children: Vec<ListId>,
}

#[derive(Debug)]
pub(crate) struct ListInstance {
    pub(crate) anchor: NodeId,
    template: NodeId,
    directive: ForDirective,
    key: Option<CompiledExpr>,
    outer: ItemContext,
    /// Top-level names the template reads; a write whose root segment is
    /// one of them re-renders the list.
    pub(crate) deps: Vec<String>,
    pub(crate) rendered: Vec<RenderedItem>,
    pub(crate) items: SecondaryMap<NodeId, ItemBinding>,
    warned_unkeyed: bool,
    pub(crate) parent: Option<ListId>,
}

/// Turns `element` into a list: the element leaves the tree and becomes the
/// per-item template, and an anchor comment takes its place.
fn create_instance(
    doc: &mut Document,
    lists: &mut ListArena,
    element: NodeId,
    directive: ForDirective,
    parent: Option<ListId>,
) -> ListId {
    doc.remove_attribute(element, "%for");
    let key = doc
        .remove_attribute(element, "%key")
        .map(|k| CompiledExpr::compile(&k));
    let anchor = doc.create_comment(format!(" %for: {} ", directive.source));
    if let Some(p) = doc.parent(element) {
        doc.insert_before(p, anchor, Some(element));
    }
    doc.detach(element);
    let deps = template_deps(doc, element, &directive, key.as_ref());
    log::debug!("%for `{}` depends on {deps:?}", directive.source);
    lists.insert(ListInstance {
        anchor,
        template: element,
        directive,
        key,
        outer: ItemContext::new(),
        deps,
        rendered: Vec::new(),
        items: SecondaryMap::new(),
        warned_unkeyed: false,
        parent,
    })
}

/// Identifiers referenced by the collection, key and every binding in the
/// template, minus the loop variables declared inside it.
fn template_deps(
    doc: &Document,
    template: NodeId,
    directive: &ForDirective,
    key: Option<&CompiledExpr>,
) -> Vec<String> {
    let mut names = identifiers(directive.collection.source());
    if let Some(key) = key {
        names.extend(identifiers(key.source()));
    }
    let mut locals: Vec<String> = directive.locals().map(str::to_string).collect();

    for node in doc.descendants(template) {
        if doc.is_text(node) {
            if let Some(t) = doc.text(node).and_then(TextTemplate::parse) {
                for e in t.exprs() {
                    names.extend(identifiers(e.source()));
                }
            }
            continue;
        }
        for attr in doc.attributes(node) {
            if attr.name == "%for" {
                if let Ok(nested) = ForDirective::parse(&attr.value) {
                    names.extend(identifiers(nested.collection.source()));
                    locals.extend(nested.locals().map(str::to_string));
                }
            } else if attr.name.starts_with(':') || attr.name == "%if" || attr.name == "%key" {
                names.extend(identifiers(&attr.value));
            }
        }
    }

    let mut deps: Vec<String> = Vec::new();
    for n in names {
        if !locals.contains(&n) && !deps.contains(&n) {
            deps.push(n);
        }
    }
    deps
}

/// Sets up `%for` on `element` and renders it once. Returns `false` when
/// the directive is malformed; the element then stays where it is.
pub(crate) fn setup(inner: &ComponentInner, element: NodeId, value: &str) -> bool {
    let parsed = if inner.template_root.get() == Some(element) {
        Err("cannot repeat the template root".to_string())
    } else {
        ForDirective::parse(value)
    };
    let directive = match parsed {
        Ok(d) => d,
        Err(reason) => {
            inner.doc.borrow_mut().remove_attribute(element, "%for");
            inner.report(Diagnostic::Directive {
                directive: "for".into(),
                value: value.to_string(),
                reason,
            });
            return false;
        }
    };
    let id = create_instance(
        &mut inner.doc.borrow_mut(),
        &mut inner.lists.borrow_mut(),
        element,
        directive,
        None,
    );
    render(inner, id);
    true
}

/// Runs a render pass for `id` and everything nested in it.
pub(crate) fn render(inner: &ComponentInner, id: ListId) {
    let diags = {
        let state = inner.store.root();
        let mut doc = inner.doc.borrow_mut();
        let mut lists = inner.lists.borrow_mut();
        let mut pass = ListPass {
            this: &inner.this,
            funcs: &inner.funcs,
            doc: &mut doc,
            lists: &mut lists,
            state: &state,
            diags: Vec::new(),
        };
        pass.render(id);
        pass.diags
    };
    inner.report_all(diags);
}

/// Drops list instances whose anchor is in `freed`, with their detached
/// templates.
pub(crate) fn forget(inner: &ComponentInner, freed: &HashSet<NodeId>) {
    let mut lists = inner.lists.borrow_mut();
    let dead: Vec<ListId> = lists
        .iter()
        .filter(|(_, l)| freed.contains(&l.anchor))
        .map(|(id, _)| id)
        .collect();
    let mut doc = inner.doc.borrow_mut();
    for id in dead {
        if let Some(list) = lists.remove(id) {
            doc.remove_subtree(list.template);
        }
    }
}

impl ComponentInner {
    /// Re-renders top-level lists that read the root segment of `path`.
    /// Nested lists follow their parent item.
    pub(crate) fn refresh_lists(&self, path: &str) {
        let root = root_segment(path);
        let ids: Vec<ListId> = self
            .lists
            .borrow()
            .iter()
            .filter(|(_, l)| l.parent.is_none() && l.deps.iter().any(|d| d == root))
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            render(self, id);
        }
    }
}

struct ListPass<'a> {
    this: &'a Weak<ComponentInner>,
    funcs: &'a IndexMap<String, UserFn>,
    doc: &'a mut Document,
    lists: &'a mut ListArena,
    state: &'a Value,
    diags: Vec<Diagnostic>,
}

impl ListPass<'_> {
    fn render(&mut self, id: ListId) {
        let Some(list) = self.lists.get_mut(id) else {
            return;
        };
        let state = self.state;
        let directive = list.directive.clone();
        let key_expr = list.key.clone();
        let outer = list.outer.clone();
        let template = list.template;
        let anchor = list.anchor;

        let collection = directive.collection.evaluate(&BindingScope::new(state, Some(&outer)));
        let entries = match collection {
            Ok(Some(Value::Array(entries))) => entries,
            Ok(other) => {
                self.diags.push(Diagnostic::NotASequence {
                    expr: directive.collection.source().to_string(),
                    found: describe(other.as_ref()),
                });
                return;
            }
            Err(error) => {
                self.diags.push(Diagnostic::Eval {
                    expr: directive.collection.source().to_string(),
                    error,
                });
                return;
            }
        };
        if key_expr.is_none() && !list.warned_unkeyed {
            list.warned_unkeyed = true;
            self.diags.push(Diagnostic::UnkeyedList {
                expr: directive.source.clone(),
            });
        }

        let previous = std::mem::take(&mut list.rendered);
        for item in &previous {
            self.doc.detach(item.element);
        }
        let mut reuse: IndexMap<String, RenderedItem> = IndexMap::new();
        let mut duplicates = Vec::new();
        for item in previous {
            if reuse.contains_key(&item.key) {
                duplicates.push(item.element);
            } else {
                reuse.insert(item.key.clone(), item);
            }
        }

        let mut block = Vec::with_capacity(entries.len());
        for (index, data) in entries.into_iter().enumerate() {
            let mut local = ItemContext::new().with(directive.item.clone(), data.clone());
            if let Some(name) = &directive.index {
                local = local.with(name.clone(), Value::from(index));
            }
            let ctx = outer.compose(&local);

            let key = match &key_expr {
                Some(k) => match k.evaluate(&BindingScope::new(state, Some(&ctx))) {
                    Ok(v) => key_string(v.as_ref()),
                    Err(error) => {
                        self.diags.push(Diagnostic::Eval {
                            expr: k.source().to_string(),
                            error,
                        });
                        index.to_string()
                    }
                },
                None => index.to_string(),
            };

            let element = match reuse.shift_remove(&key) {
                Some(prev) => {
                    if prev.index != index || prev.data != data {
                        log::trace!("%for `{}`: key {key} {} -> {index}", directive.source, prev.index);
                    }
                    prev.element
                }
                None => match self.instantiate(id, template) {
                    Some(el) => el,
                    None => continue,
                },
            };
            self.bind_item(id, element, ctx);
            block.push(RenderedItem {
                element,
                key,
                data,
                index,
            });
        }

        let mut after = anchor;
        for item in &block {
            self.doc.insert_after(after, item.element);
            after = item.element;
        }
        if let Some(list) = self.lists.get_mut(id) {
            list.rendered = block;
        }

        for (_, stale) in reuse {
            self.free_item(id, stale.element);
        }
        for element in duplicates {
            self.free_item(id, element);
        }
    }

    fn instantiate(&mut self, id: ListId, template: NodeId) -> Option<NodeId> {
        let root = self.doc.clone_subtree(template)?;
        let mut binding = ItemBinding::default();
        self.prepare(id, root, root, &mut binding);
        self.lists.get_mut(id)?.items.insert(root, binding);
        Some(root)
    }

    /// Collects the binding sites of a freshly cloned item and strips its
    /// directive attributes. Listeners are attached here, once per element.
    fn prepare(&mut self, id: ListId, root: NodeId, node: NodeId, binding: &mut ItemBinding) {
        if self.doc.is_text(node) {
            if let Some(t) = self.doc.text(node).and_then(TextTemplate::parse) {
                binding.texts.push((node, Rc::new(t)));
            }
            return;
        }
        if !self.doc.is_element(node) {
            return;
        }

        if node != root
            && let Some(value) = self.doc.attribute(node, "%for").map(str::to_string)
        {
            match ForDirective::parse(&value) {
                Ok(directive) => {
                    let child = create_instance(self.doc, self.lists, node, directive, Some(id));
                    binding.children.push(child);
                    return;
                }
                Err(reason) => {
                    self.doc.remove_attribute(node, "%for");
                    self.diags.push(Diagnostic::Directive {
                        directive: "for".into(),
                        value,
                        reason,
                    });
                }
            }
        }

        let attrs = self.doc.attributes(node).to_vec();
        let [bound, handlers, structural] = directives(&attrs);
        for (name, attr) in bound {
            self.doc.remove_attribute(node, &attr.name);
            binding.attrs.push((node, name, CompiledExpr::compile(&attr.value)));
        }
        for (event, attr) in handlers {
            self.doc.remove_attribute(node, &attr.name);
            events::attach(
                self.doc,
                self.this,
                self.funcs,
                node,
                &event,
                &attr.value,
                Some(ItemSlot { list: id, root }),
            );
        }
        for (name, attr) in structural {
            self.doc.remove_attribute(node, &attr.name);
            match name.as_str() {
                "if" => binding.toggles.push(Toggle {
                    element: node,
                    expr: CompiledExpr::compile(&attr.value),
                    style: self.doc.attribute(node, "style").map(str::to_string),
                }),
                "key" | "for" => {}
                "connect" => self.diags.push(Diagnostic::Directive {
                    directive: name,
                    value: attr.value,
                    reason: "not supported inside list items".into(),
                }),
                _ => self.diags.push(Diagnostic::UnknownMacro { name }),
            }
        }

        for child in self.doc.children(node).to_vec() {
            self.prepare(id, root, child, binding);
        }
    }

    /// Applies `ctx` to every binding site of the item rooted at `element`
    /// and re-renders its nested lists.
    fn bind_item(&mut self, id: ListId, element: NodeId, ctx: ItemContext) {
        // Taken out of the side table while in use so nested passes can
        // borrow the arena.
        let Some(mut binding) = self.lists.get_mut(id).and_then(|l| l.items.remove(element)) else {
            return;
        };
        binding.ctx = ctx;
        let state = self.state;
        let scope = BindingScope::new(state, Some(&binding.ctx));

        for (node, template) in &binding.texts {
            let text = template.render(|e| display(eval_or_report(e, &scope, &mut self.diags).as_ref()));
            self.doc.set_text(*node, text);
        }
        for (node, name, expr) in &binding.attrs {
            let value = eval_or_report(expr, &scope, &mut self.diags);
            self.doc.set_attribute(*node, name, display(value.as_ref()));
        }
        for toggle in &binding.toggles {
            let show = condition_or_report(&toggle.expr, &scope, &mut self.diags);
            match (show, &toggle.style) {
                (true, Some(style)) => self.doc.set_attribute(toggle.element, "style", style.clone()),
                (true, None) => {
                    self.doc.remove_attribute(toggle.element, "style");
                }
                (false, Some(style)) if !style.trim().is_empty() => {
                    let style = style.trim().trim_end_matches(';');
                    self.doc
                        .set_attribute(toggle.element, "style", format!("{style}; display: none"));
                }
                (false, _) => self.doc.set_attribute(toggle.element, "style", "display: none"),
            }
        }
        for child in &binding.children {
            if let Some(list) = self.lists.get_mut(*child) {
                list.outer = binding.ctx.clone();
            }
            self.render(*child);
        }

        if let Some(list) = self.lists.get_mut(id) {
            list.items.insert(element, binding);
        }
    }

    /// Frees an item element, its side-table entry and its nested lists.
    fn free_item(&mut self, id: ListId, element: NodeId) {
        let binding = self.lists.get_mut(id).and_then(|l| l.items.remove(element));
        if let Some(binding) = binding {
            for child in binding.children {
                self.free_list(child);
            }
        }
        self.doc.remove_subtree(element);
    }

    fn free_list(&mut self, id: ListId) {
        let Some(list) = self.lists.remove(id) else {
            return;
        };
        for (element, binding) in list.items {
            for child in binding.children {
                self.free_list(child);
            }
            self.doc.remove_subtree(element);
        }
        self.doc.remove_subtree(list.template);
        self.doc.remove_subtree(list.anchor);
    }
}
