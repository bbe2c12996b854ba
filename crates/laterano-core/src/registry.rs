//! Binding registry: every live text, attribute, conditional and two-way
//! binding created by the template compiler.

use std::collections::HashSet;
use std::rc::Rc;

use laterano_dom::NodeId;

use crate::expr::{CompiledExpr, identifiers};
use crate::value::{paths_related, root_segment};

/// A text node's original content split around `{{ expr }}` markers.
#[derive(Debug)]
pub struct TextTemplate {
    pub source: String,
    pub parts: Vec<TextPart>,
}

#[derive(Debug)]
pub enum TextPart {
    Literal(String),
    Expr(CompiledExpr),
}

impl TextTemplate {
    /// `None` when the text has no complete marker.
    pub fn parse(source: &str) -> Option<Self> {
        let mut parts = Vec::new();
        let mut rest = source;
        let mut any = false;
        while let Some(open) = rest.find("{{") {
            let Some(len) = rest[open + 2..].find("}}") else {
                break;
            };
            if open > 0 {
                parts.push(TextPart::Literal(rest[..open].to_string()));
            }
            let inner = &rest[open + 2..open + 2 + len];
            parts.push(TextPart::Expr(CompiledExpr::compile(inner)));
            any = true;
            rest = &rest[open + 2 + len + 2..];
        }
        if !any {
            return None;
        }
        if !rest.is_empty() {
            parts.push(TextPart::Literal(rest.to_string()));
        }
        Some(Self {
            source: source.to_string(),
            parts,
        })
    }

    pub fn exprs(&self) -> impl Iterator<Item = &CompiledExpr> {
        self.parts.iter().filter_map(|p| match p {
            TextPart::Expr(e) => Some(e),
            TextPart::Literal(_) => None,
        })
    }

    /// Renders with `eval` supplying each marker's display text.
    pub fn render(&self, mut eval: impl FnMut(&CompiledExpr) -> String) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TextPart::Literal(s) => out.push_str(s),
                TextPart::Expr(e) => out.push_str(&eval(e)),
            }
        }
        out
    }
}

/// One `{{ expr }}` marker inside a text node. Markers of the same node
/// share the parsed template.
#[derive(Debug)]
pub struct TextBinding {
    pub node: NodeId,
    pub expr_index: usize,
    pub template: Rc<TextTemplate>,
}

impl TextBinding {
    pub fn expr(&self) -> Option<&CompiledExpr> {
        self.template.exprs().nth(self.expr_index)
    }
}

#[derive(Debug)]
pub struct AttributeBinding {
    pub element: NodeId,
    pub name: String,
    pub expr: CompiledExpr,
    pub raw: String,
}

#[derive(Debug)]
pub struct ConditionalRecord {
    pub element: NodeId,
    pub expr: CompiledExpr,
    pub placeholder: NodeId,
    pub present: bool,
}

/// `%connect` target: keeps a control (or `data-laterano-connect`) in step
/// with a state path.
#[derive(Debug)]
pub struct ConnectBinding {
    pub element: NodeId,
    pub path: String,
    pub is_control: bool,
}

#[derive(Default)]
pub struct BindingRegistry {
    pub texts: Vec<TextBinding>,
    pub attributes: Vec<AttributeBinding>,
    pub conditionals: Vec<ConditionalRecord>,
    pub connects: Vec<ConnectBinding>,
}

fn reads_related(expr: &CompiledExpr, path: &str) -> bool {
    expr.paths().iter().any(|p| paths_related(p, path))
}

impl BindingRegistry {
    /// Text nodes with a marker reading `path` (or a related path), each
    /// listed once with its template.
    pub fn texts_for(&self, path: &str) -> Vec<(NodeId, Rc<TextTemplate>)> {
        let mut out: Vec<(NodeId, Rc<TextTemplate>)> = Vec::new();
        for b in &self.texts {
            if out.iter().any(|(n, _)| *n == b.node) {
                continue;
            }
            if b.expr().is_some_and(|e| reads_related(e, path)) {
                out.push((b.node, b.template.clone()));
            }
        }
        out
    }

    pub fn attributes_for(&self, path: &str) -> Vec<usize> {
        self.attributes
            .iter()
            .enumerate()
            .filter(|(_, b)| reads_related(&b.expr, path))
            .map(|(i, _)| i)
            .collect()
    }

    /// Conditionals to re-evaluate after a write to `path`: the expression
    /// text mentions the path or its root name, or the expression reads a
    /// related path.
    pub fn conditionals_for(&self, path: &str) -> Vec<usize> {
        let root = root_segment(path);
        self.conditionals
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.expr.source().contains(path)
                    || identifiers(c.expr.source()).iter().any(|n| n == root)
                    || reads_related(&c.expr, path)
            })
            .map(|(i, _)| i)
            .collect()
    }

    pub fn connects_for(&self, path: &str) -> Vec<usize> {
        self.connects
            .iter()
            .enumerate()
            .filter(|(_, c)| c.path == path)
            .map(|(i, _)| i)
            .collect()
    }

    /// Drops every binding attached to a node in `freed`. Returns hidden
    /// conditional elements that lost their placeholder; they are detached
    /// and nothing else can reach them.
    pub fn forget(&mut self, freed: &HashSet<NodeId>) -> Vec<NodeId> {
        self.texts.retain(|b| !freed.contains(&b.node));
        self.attributes.retain(|b| !freed.contains(&b.element));
        self.connects.retain(|c| !freed.contains(&c.element));
        let mut orphans = Vec::new();
        self.conditionals.retain(|c| {
            if freed.contains(&c.element) {
                return false;
            }
            if freed.contains(&c.placeholder) {
                if !c.present {
                    orphans.push(c.element);
                }
                return false;
            }
            true
        });
        orphans
    }

    pub fn conditional(&self, element: NodeId) -> Option<&ConditionalRecord> {
        self.conditionals.iter().find(|c| c.element == element)
    }
}
