//! Public component surface: construction, state access, functions,
//! lifecycle adapter and the deferred flush.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use laterano_dom::{Document, NodeId, dispatch_event};
use slotmap::{SecondaryMap, SlotMap};

use crate::compiler::{self, list::ListArena};
use crate::error::{Diagnostic, HandlerError};
use crate::registry::BindingRegistry;
use crate::scheduler::Scheduler;
use crate::store::{StateObserver, StateStore};
use crate::value::{Map, Value};

/// Diagnostics kept per component; older entries are dropped first.
pub const DIAGNOSTIC_CAPACITY: usize = 256;

pub type UserFn = Rc<dyn Fn(&Component, &[Value]) -> anyhow::Result<Value>>;
pub type StateListener = Rc<dyn Fn(&Component, Option<&Value>)>;
pub type LifecycleHook = Rc<dyn Fn(&Component)>;
pub type AttributeHook = Rc<dyn Fn(&Component, &str, Option<&str>, Option<&str>)>;
pub type RenderFn = Rc<dyn Fn(&RenderContext<'_>) -> Rendered>;

/// What a render function produces for its element.
#[derive(Clone, Debug, PartialEq)]
pub enum Rendered {
    /// Parsed and used as the element's new children.
    Markup(String),
    /// Becomes the element's only child.
    Node(NodeId),
    Text(String),
}

/// Handed to render functions. State reads through it are tracked.
pub struct RenderContext<'a> {
    inner: &'a ComponentInner,
    node: NodeId,
}

impl RenderContext<'_> {
    pub fn get_state(&self, path: &str) -> Option<Value> {
        self.inner.store.get(path)
    }

    /// The element being rendered.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Builds detached nodes for [`Rendered::Node`].
    pub fn build<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.inner.doc.borrow_mut())
    }
}

/// Declarative description of a component.
pub struct ComponentOptions {
    pub(crate) tag: String,
    pub(crate) template: String,
    pub(crate) style: Option<String>,
    pub(crate) states: Value,
    pub(crate) state_listeners: HashMap<String, StateListener>,
    pub(crate) funcs: IndexMap<String, UserFn>,
    pub(crate) on_mount: Option<LifecycleHook>,
    pub(crate) on_unmount: Option<LifecycleHook>,
    pub(crate) on_attribute_changed: Option<AttributeHook>,
    pub(crate) observed_attributes: Vec<String>,
}

impl ComponentOptions {
    pub fn new(tag: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            template: template.into(),
            style: None,
            states: Value::Object(Map::new()),
            state_listeners: HashMap::new(),
            funcs: IndexMap::new(),
            on_mount: None,
            on_unmount: None,
            on_attribute_changed: None,
            observed_attributes: vec!["data-attribute".to_string()],
        }
    }

    pub fn style(mut self, css: impl Into<String>) -> Self {
        self.style = Some(css.into());
        self
    }

    pub fn states(mut self, states: Value) -> Self {
        self.states = states;
        self
    }

    /// Called after every write to exactly `path`.
    pub fn state_listener(
        mut self,
        path: impl Into<String>,
        f: impl Fn(&Component, Option<&Value>) + 'static,
    ) -> Self {
        self.state_listeners.insert(path.into(), Rc::new(f));
        self
    }

    pub fn func(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Component, &[Value]) -> anyhow::Result<Value> + 'static,
    ) -> Self {
        self.funcs.insert(name.into(), Rc::new(f));
        self
    }

    pub fn on_mount(mut self, f: impl Fn(&Component) + 'static) -> Self {
        self.on_mount = Some(Rc::new(f));
        self
    }

    pub fn on_unmount(mut self, f: impl Fn(&Component) + 'static) -> Self {
        self.on_unmount = Some(Rc::new(f));
        self
    }

    pub fn on_attribute_changed(
        mut self,
        f: impl Fn(&Component, &str, Option<&str>, Option<&str>) + 'static,
    ) -> Self {
        self.on_attribute_changed = Some(Rc::new(f));
        self
    }

    pub fn observed_attributes<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.observed_attributes = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Counters for tooling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComponentStats {
    pub text_bindings: usize,
    pub attribute_bindings: usize,
    pub conditionals: usize,
    pub connects: usize,
    pub lists: usize,
    pub list_items: usize,
    pub ledger_edges: usize,
    pub pending: usize,
    pub flushes: u64,
    pub rerenders: u64,
}

pub(crate) struct ComponentInner {
    pub(crate) this: Weak<ComponentInner>,
    pub(crate) tag: String,
    pub(crate) doc: Rc<RefCell<Document>>,
    pub(crate) root: NodeId,
    pub(crate) template_root: Cell<Option<NodeId>>,
    pub(crate) store: StateStore,
    pub(crate) registry: RefCell<BindingRegistry>,
    pub(crate) lists: RefCell<ListArena>,
    pub(crate) scheduler: RefCell<Scheduler>,
    renders: RefCell<SecondaryMap<NodeId, RenderFn>>,
    pub(crate) funcs: IndexMap<String, UserFn>,
    state_listeners: HashMap<String, StateListener>,
    on_mount: Option<LifecycleHook>,
    on_unmount: Option<LifecycleHook>,
    on_attribute_changed: Option<AttributeHook>,
    observed_attributes: Vec<String>,
    diagnostics: RefCell<VecDeque<Diagnostic>>,
    connected: Cell<bool>,
    rerenders: Cell<u64>,
}

impl ComponentInner {
    pub(crate) fn handle(&self) -> Option<Component> {
        self.this.upgrade().map(|inner| Component { inner })
    }

    pub(crate) fn report(&self, diagnostic: Diagnostic) {
        log::log!(target: "laterano", diagnostic.level(), "<{}> {diagnostic}", self.tag);
        let mut diags = self.diagnostics.borrow_mut();
        if diags.len() == DIAGNOSTIC_CAPACITY {
            diags.pop_front();
        }
        diags.push_back(diagnostic);
    }

    pub(crate) fn report_all(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for d in diagnostics {
            self.report(d);
        }
    }

    pub(crate) fn schedule(&self, nodes: Vec<NodeId>) {
        if nodes.is_empty() {
            return;
        }
        let request = self.scheduler.borrow_mut().schedule(nodes);
        if let Some(request) = request {
            request();
        }
    }

    pub(crate) fn call_func(&self, name: &str, args: &[Value]) -> Result<Value, HandlerError> {
        let Some(f) = self.funcs.get(name).cloned() else {
            return Err(HandlerError::UnknownFunction {
                name: name.to_string(),
            });
        };
        let Some(component) = self.handle() else {
            return Ok(Value::Null);
        };
        f(&component, args).map_err(|source| HandlerError::Function {
            name: name.to_string(),
            source,
        })
    }

    fn render_element(&self, node: NodeId, render: &RenderFn) {
        let ctx = RenderContext { inner: self, node };
        let result = self.store.track(node, || render(&ctx));
        let freed: HashSet<NodeId> = {
            let mut doc = self.doc.borrow_mut();
            let before = doc.descendants(node);
            match result {
                Rendered::Markup(markup) => doc.set_inner_markup(node, &markup),
                Rendered::Node(child) => {
                    doc.clear_children(node);
                    doc.append_child(node, child);
                }
                Rendered::Text(text) => doc.set_text(node, text),
            }
            before.into_iter().filter(|n| !doc.contains(*n)).collect()
        };
        self.forget_nodes(freed);
        self.rerenders.set(self.rerenders.get() + 1);
    }

    /// Drops bindings, dependency edges, render functions and list
    /// instances that point into `freed`. Hidden conditional elements whose
    /// placeholder went away are freed along with them.
    pub(crate) fn forget_nodes(&self, mut freed: HashSet<NodeId>) {
        if freed.is_empty() {
            return;
        }
        loop {
            let orphans = self.registry.borrow_mut().forget(&freed);
            if orphans.is_empty() {
                break;
            }
            let mut doc = self.doc.borrow_mut();
            for element in orphans {
                freed.extend(doc.descendants(element));
                doc.remove_subtree(element);
            }
        }
        for &node in &freed {
            self.store.forget(node);
        }
        self.renders.borrow_mut().retain(|node, _| !freed.contains(&node));
        compiler::list::forget(self, &freed);
        log::trace!("<{}> forgot {} freed node(s)", self.tag, freed.len());
    }
}

impl StateObserver for ComponentInner {
    fn state_changed(&self, path: &str) {
        // Registry first: deferred dependents, then the immediate tier.
        self.schedule(self.store.dependents(path));
        self.refresh_texts(path);
        self.refresh_attributes(path);
        self.refresh_lists(path);

        self.refresh_connects(path);
        self.refresh_conditionals(path);

        if let Some(listener) = self.state_listeners.get(path).cloned()
            && let Some(component) = self.handle()
        {
            let value = self.store.peek(path);
            listener(&component, value.as_ref());
        }
    }
}

/// A live component instance. Cloning yields another handle to the same
/// instance.
#[derive(Clone)]
pub struct Component {
    inner: Rc<ComponentInner>,
}

impl Component {
    pub fn new(options: ComponentOptions) -> Self {
        let ComponentOptions {
            tag,
            template,
            style,
            states,
            state_listeners,
            funcs,
            on_mount,
            on_unmount,
            on_attribute_changed,
            observed_attributes,
        } = options;

        let doc = Rc::new(RefCell::new(Document::new()));
        let root = doc.borrow_mut().create_fragment();

        let inner = Rc::new_cyclic(|this| ComponentInner {
            this: this.clone(),
            tag,
            doc,
            root,
            template_root: Cell::new(None),
            store: StateStore::new(states),
            registry: RefCell::new(BindingRegistry::default()),
            lists: RefCell::new(SlotMap::with_key()),
            scheduler: RefCell::new(Scheduler::default()),
            renders: RefCell::new(SecondaryMap::new()),
            funcs,
            state_listeners,
            on_mount,
            on_unmount,
            on_attribute_changed,
            observed_attributes,
            diagnostics: RefCell::new(VecDeque::new()),
            connected: Cell::new(false),
            rerenders: Cell::new(0),
        });
        let observer: Weak<dyn StateObserver> = inner.this.clone();
        inner.store.set_observer(observer);

        let template_root = {
            let mut doc = inner.doc.borrow_mut();
            if let Some(css) = style {
                let el = doc.create_element("style");
                doc.set_text(el, css);
                doc.append_child(root, el);
            }
            let template_root = doc.parse_template(&template);
            doc.append_child(root, template_root);
            template_root
        };
        inner.template_root.set(Some(template_root));

        compiler::compile(&inner, template_root);

        let component = Self { inner };
        log::debug!("<{}> compiled: {:?}", component.tag(), component.stats());
        component
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn set_state(&self, path: &str, value: impl Into<Value>) {
        self.inner.store.set(path, value.into());
    }

    /// Current value at `path`; `None` when any segment is missing.
    pub fn get_state(&self, path: &str) -> Option<Value> {
        self.inner.store.get(path)
    }

    /// Copy of the whole state tree.
    pub fn state(&self) -> Value {
        self.inner.store.snapshot()
    }

    /// Invokes a declared function. Unknown names are reported and
    /// returned as an error.
    pub fn trigger_func(&self, name: &str, args: &[Value]) -> Result<Value, HandlerError> {
        let result = self.inner.call_func(name, args);
        if let Err(HandlerError::UnknownFunction { name }) = &result {
            self.inner.report(Diagnostic::UnknownFunction { name: name.clone() });
        }
        result
    }

    /// Attaches a render function to `node` and renders it once, recording
    /// its state reads. Later writes to those paths queue the element for
    /// the next [`tick`](Self::tick).
    pub fn attach_render(&self, node: NodeId, f: impl Fn(&RenderContext<'_>) -> Rendered + 'static) {
        let render: RenderFn = Rc::new(f);
        self.inner.renders.borrow_mut().insert(node, render.clone());
        self.inner.render_element(node, &render);
    }

    /// Flushes the deferred tier: every pending element that owns a render
    /// function and is still attached is re-rendered once. Returns how many
    /// were re-rendered.
    pub fn tick(&self) -> usize {
        let pending = self.inner.scheduler.borrow_mut().take();
        let mut rendered = 0;
        for node in pending {
            if !self.inner.doc.borrow().is_connected_to(node, self.inner.root) {
                continue;
            }
            let render = self.inner.renders.borrow().get(node).cloned();
            if let Some(render) = render {
                self.inner.render_element(node, &render);
                rendered += 1;
            }
        }
        if rendered > 0 {
            log::debug!("<{}> flushed {rendered} element(s)", self.inner.tag);
        }
        rendered
    }

    /// Hook invoked whenever the pending set goes from empty to non-empty.
    pub fn set_frame_requester(&self, f: impl Fn() + 'static) {
        self.inner.scheduler.borrow_mut().set_requester(Some(Rc::new(f)));
    }

    pub fn pending_updates(&self) -> usize {
        self.inner.scheduler.borrow().pending_len()
    }

    /// Dispatches `kind` at `node` with bubbling. Returns the number of
    /// listeners invoked.
    pub fn dispatch_event(&self, node: NodeId, kind: &str) -> usize {
        dispatch_event(&self.inner.doc, node, kind)
    }

    /// Simulates user input: sets the control's value, then fires `input`.
    pub fn input(&self, node: NodeId, value: &str) -> usize {
        self.inner.doc.borrow_mut().set_value(node, value);
        self.dispatch_event(node, "input")
    }

    pub fn connected(&self) {
        self.inner.connected.set(true);
        if let Some(hook) = self.inner.on_mount.clone() {
            hook(self);
        }
    }

    pub fn disconnected(&self) {
        self.inner.connected.set(false);
        if let Some(hook) = self.inner.on_unmount.clone() {
            hook(self);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.get()
    }

    /// Forwards attribute changes for observed attribute names only.
    pub fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>) {
        if !self.inner.observed_attributes.iter().any(|a| a == name) {
            return;
        }
        if let Some(hook) = self.inner.on_attribute_changed.clone() {
            hook(self, name, old, new);
        }
    }

    pub fn observed_attributes(&self) -> &[String] {
        &self.inner.observed_attributes
    }

    pub fn document(&self) -> Rc<RefCell<Document>> {
        self.inner.doc.clone()
    }

    /// The shadow root: a fragment holding the optional `<style>` and the
    /// template.
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    /// The parsed template element as originally instantiated.
    pub fn template_root(&self) -> Option<NodeId> {
        self.inner.template_root.get()
    }

    /// Serialized content of the shadow root.
    pub fn markup(&self) -> String {
        self.inner.doc.borrow().inner_markup(self.inner.root)
    }

    pub fn stats(&self) -> ComponentStats {
        let registry = self.inner.registry.borrow();
        let lists = self.inner.lists.borrow();
        let scheduler = self.inner.scheduler.borrow();
        ComponentStats {
            text_bindings: registry.texts.len(),
            attribute_bindings: registry.attributes.len(),
            conditionals: registry.conditionals.len(),
            connects: registry.connects.len(),
            lists: lists.len(),
            list_items: lists.values().map(|l| l.rendered.len()).sum(),
            ledger_edges: self.inner.store.ledger().len(),
            pending: scheduler.pending_len(),
            flushes: scheduler.flushes(),
            rerenders: self.inner.rerenders.get(),
        }
    }

    /// Removes and returns every recorded diagnostic, oldest first.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.diagnostics.borrow_mut().drain(..).collect()
    }

    /// Finds the first element under the shadow root matching `tag`.
    pub fn find(&self, tag: &str) -> Option<NodeId> {
        self.find_all(tag).into_iter().next()
    }

    /// Every attached element under the shadow root with the given tag, in
    /// document order.
    pub fn find_all(&self, tag: &str) -> Vec<NodeId> {
        let doc = self.inner.doc.borrow();
        doc.descendants(self.inner.root)
            .into_iter()
            .filter(|n| doc.tag(*n) == Some(tag))
            .collect()
    }
}
