use smallvec::SmallVec;

use crate::expr::Scope;
use crate::value::Value;

/// Names introduced by list rendering for one item's subtree.
///
/// Composition appends, and lookups scan from the end, so inner names shadow
/// outer ones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemContext {
    vars: SmallVec<[(String, Value); 4]>,
}

impl ItemContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.vars.push((name.into(), value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.iter().rev().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// `inner` layered over `self`.
    pub fn compose(&self, inner: &ItemContext) -> ItemContext {
        let mut vars = self.vars.clone();
        vars.extend(inner.vars.iter().cloned());
        ItemContext { vars }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(|(n, _)| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Read-only scope used by text, attribute, condition and list bindings:
/// item context first, then top-level state keys.
pub struct BindingScope<'a> {
    pub state: &'a Value,
    pub item: Option<&'a ItemContext>,
}

impl<'a> BindingScope<'a> {
    pub fn new(state: &'a Value, item: Option<&'a ItemContext>) -> Self {
        Self { state, item }
    }
}

impl Scope for BindingScope<'_> {
    fn resolve(&self, name: &str) -> Option<Option<Value>> {
        if let Some(v) = self.item.and_then(|ctx| ctx.get(name)) {
            return Some(Some(v.clone()));
        }
        self.state.resolve(name)
    }
}
