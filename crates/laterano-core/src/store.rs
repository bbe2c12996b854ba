//! Observable state store and the dependency ledger.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Weak;

use indexmap::{IndexMap, IndexSet};
use laterano_dom::NodeId;
use slotmap::SecondaryMap;
use smallvec::SmallVec;

use crate::value::{self, Map, Value, paths_related};

/// Receives every successful write, after the value is stored.
pub trait StateObserver {
    fn state_changed(&self, path: &str);
}

/// Key path → elements that read it while rendering, plus the reverse
/// direction so an element can drop stale reads before it re-renders.
#[derive(Default)]
pub struct DependencyLedger {
    edges: IndexMap<String, IndexSet<NodeId>>,
    back: SecondaryMap<NodeId, SmallVec<[String; 4]>>,
}

impl DependencyLedger {
    pub fn record(&mut self, path: &str, node: NodeId) {
        self.edges.entry(path.to_string()).or_default().insert(node);
        if let Some(entry) = self.back.entry(node) {
            let paths = entry.or_default();
            if !paths.iter().any(|p| p == path) {
                paths.push(path.to_string());
            }
        }
    }

    /// Drops every edge recorded for `node`.
    pub fn forget(&mut self, node: NodeId) {
        let Some(paths) = self.back.remove(node) else {
            return;
        };
        for p in paths {
            if let Some(set) = self.edges.get_mut(&p) {
                set.shift_remove(&node);
                if set.is_empty() {
                    self.edges.shift_remove(&p);
                }
            }
        }
    }

    /// Elements registered under `path` or any related path, deduplicated
    /// in registration order.
    pub fn dependents(&self, path: &str) -> Vec<NodeId> {
        let mut out: IndexSet<NodeId> = IndexSet::new();
        for (p, nodes) in &self.edges {
            if paths_related(p, path) {
                out.extend(nodes.iter().copied());
            }
        }
        out.into_iter().collect()
    }

    pub fn paths_of(&self, node: NodeId) -> &[String] {
        self.back.get(node).map_or(&[], |p| p.as_slice())
    }

    /// Number of (path, element) edges.
    pub fn len(&self) -> usize {
        self.edges.values().map(IndexSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Nested JSON state reachable by dot-delimited key paths.
///
/// Every write goes through [`StateStore::set`], which stores the value and
/// then hands the path to the registered [`StateObserver`]. No borrow of
/// the store is held while the observer runs.
pub struct StateStore {
    root: RefCell<Value>,
    ledger: RefCell<DependencyLedger>,
    rendering: Cell<Option<NodeId>>,
    observer: RefCell<Option<Weak<dyn StateObserver>>>,
}

impl StateStore {
    pub fn new(initial: Value) -> Self {
        let root = match initial {
            Value::Object(_) => initial,
            Value::Null => Value::Object(Map::new()),
            other => {
                log::warn!("initial state must be an object, got {other}; starting empty");
                Value::Object(Map::new())
            }
        };
        Self {
            root: RefCell::new(root),
            ledger: RefCell::new(DependencyLedger::default()),
            rendering: Cell::new(None),
            observer: RefCell::new(None),
        }
    }

    pub fn set_observer(&self, observer: Weak<dyn StateObserver>) {
        *self.observer.borrow_mut() = Some(observer);
    }

    /// Reads `path`, registering the element currently rendering (if any)
    /// as a dependent.
    pub fn get(&self, path: &str) -> Option<Value> {
        if let Some(node) = self.rendering.get() {
            self.ledger.borrow_mut().record(path, node);
        }
        self.peek(path)
    }

    /// Reads `path` without dependency tracking.
    pub fn peek(&self, path: &str) -> Option<Value> {
        value::lookup(&self.root.borrow(), path).cloned()
    }

    pub fn set(&self, path: &str, value: Value) {
        log::debug!("set {path} = {value}");
        value::assign(&mut self.root.borrow_mut(), path, value);
        let observer = self.observer.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            observer.state_changed(path);
        }
    }

    /// Borrow of the whole state tree. Must not be held across a `set`.
    pub fn root(&self) -> Ref<'_, Value> {
        self.root.borrow()
    }

    pub fn snapshot(&self) -> Value {
        self.root.borrow().clone()
    }

    /// Runs `f` with `node` as the current rendering element. The node's
    /// previous reads are forgotten first so the ledger reflects only the
    /// most recent render.
    pub fn track<R>(&self, node: NodeId, f: impl FnOnce() -> R) -> R {
        self.ledger.borrow_mut().forget(node);
        let prev = self.rendering.replace(Some(node));
        let out = f();
        self.rendering.set(prev);
        out
    }

    pub fn rendering(&self) -> Option<NodeId> {
        self.rendering.get()
    }

    /// Registers `node` under `path` outside of a render pass.
    pub fn depend(&self, path: &str, node: NodeId) {
        self.ledger.borrow_mut().record(path, node);
    }

    pub fn dependents(&self, path: &str) -> Vec<NodeId> {
        self.ledger.borrow().dependents(path)
    }

    pub fn ledger(&self) -> Ref<'_, DependencyLedger> {
        self.ledger.borrow()
    }

    pub fn forget(&self, node: NodeId) {
        self.ledger.borrow_mut().forget(node);
    }
}
