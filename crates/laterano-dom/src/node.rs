use slotmap::{SecondaryMap, SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::event::Listener;

new_key_type! {
    /// Stable handle of a node inside a [`Document`].
    pub struct NodeId;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Fragment,
    Element {
        tag: String,
        attrs: Vec<Attr>,
        /// Form-control `value` property (distinct from the attribute).
        value: Option<String>,
    },
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Arena-backed node tree.
///
/// Nodes are never moved in memory; tree shape lives in `parent`/`children`
/// links so detaching and re-inserting keeps a node's identity.
#[derive(Default)]
pub struct Document {
    nodes: SlotMap<NodeId, Node>,
    listeners: SecondaryMap<NodeId, SmallVec<[(String, Listener); 2]>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.insert(Node::new(kind))
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.insert(NodeKind::Element {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            value: None,
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.insert(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, data: impl Into<String>) -> NodeId {
        self.insert(NodeKind::Comment(data.into()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.insert(NodeKind::Fragment)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id).map(|n| &n.kind)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Element { .. }))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Text(_)))
    }

    pub fn is_comment(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Comment(_)))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let idx = siblings.iter().position(|c| *c == id)?;
        siblings.get(idx + 1).copied()
    }

    /// `id` followed by its ancestors up to the tree root.
    pub fn ancestors_inclusive(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.contains(id).then_some(id);
        while let Some(n) = cur {
            out.push(n);
            cur = self.parent(n);
        }
        out
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors_inclusive(id).contains(&ancestor)
    }

    /// Whether `id` is currently attached somewhere under `root`.
    pub fn is_connected_to(&self, id: NodeId, root: NodeId) -> bool {
        self.is_inclusive_ancestor(root, id)
    }

    /// Pre-order list of `id` and all of its descendants.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if !self.contains(n) {
                continue;
            }
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    // ---- mutation -------------------------------------------------------

    /// Removes `child` from its parent, keeping the node alive.
    pub fn detach(&mut self, child: NodeId) -> bool {
        let Some(parent) = self.parent(child) else {
            return false;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
        }
        true
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(child)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` under `parent` before `reference`, or at the end when
    /// `reference` is `None` or not a child of `parent`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> bool {
        if parent == child
            || !self.contains(parent)
            || !self.contains(child)
            || self.is_inclusive_ancestor(child, parent)
        {
            log::warn!("insert_before: rejected invalid insertion");
            return false;
        }
        if reference == Some(child) {
            return true;
        }
        self.detach(child);
        let Some(p) = self.nodes.get_mut(parent) else {
            return false;
        };
        let at = reference
            .and_then(|r| p.children.iter().position(|c| *c == r))
            .unwrap_or(p.children.len());
        p.children.insert(at, child);
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
        true
    }

    /// Inserts `new` directly after `anchor` in the anchor's parent.
    pub fn insert_after(&mut self, anchor: NodeId, new: NodeId) -> bool {
        let Some(parent) = self.parent(anchor) else {
            return false;
        };
        let next = self.next_sibling(anchor);
        self.insert_before(parent, new, next)
    }

    /// Detaches `id` and frees it together with its whole subtree.
    pub fn remove_subtree(&mut self, id: NodeId) {
        self.detach(id);
        for n in self.descendants(id) {
            self.nodes.remove(n);
            self.listeners.remove(n);
        }
    }

    pub fn clear_children(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        for c in children {
            self.remove_subtree(c);
        }
    }

    /// Deep copy of a subtree. Listeners are not copied.
    pub fn clone_subtree(&mut self, id: NodeId) -> Option<NodeId> {
        let kind = self.kind(id)?.clone();
        let copy = self.insert(kind);
        let children = self.children(id).to_vec();
        for c in children {
            if let Some(cc) = self.clone_subtree(c) {
                self.append_child(copy, cc);
            }
        }
        Some(copy)
    }

    // ---- attributes -----------------------------------------------------

    pub fn attributes(&self, id: NodeId) -> &[Attr] {
        match self.kind(id) {
            Some(NodeKind::Element { attrs, .. }) => attrs,
            _ => &[],
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let Some(Node {
            kind: NodeKind::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(id)
        else {
            return;
        };
        let value = value.into();
        match attrs.iter_mut().find(|a| a.name == name) {
            Some(a) => a.value = value,
            None => attrs.push(Attr {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let Some(Node {
            kind: NodeKind::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(id)
        else {
            return None;
        };
        let idx = attrs.iter().position(|a| a.name == name)?;
        Some(attrs.remove(idx).value)
    }

    // ---- text and values ------------------------------------------------

    /// Character data of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(t) | NodeKind::Comment(t) => Some(t),
            _ => None,
        }
    }

    /// `textContent` setter: replaces character data, or all children of a
    /// container with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        let text = text.into();
        if let Some(NodeKind::Text(t) | NodeKind::Comment(t)) =
            self.nodes.get_mut(id).map(|n| &mut n.kind)
        {
            *t = text;
            return;
        }
        if !self.contains(id) {
            return;
        }
        self.clear_children(id);
        if !text.is_empty() {
            let t = self.create_text(text);
            self.append_child(id, t);
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| match self.kind(n) {
                Some(NodeKind::Text(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Form-control value: the property if set, else the `value` attribute.
    pub fn value(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { value: Some(v), .. } => Some(v),
            NodeKind::Element { .. } => self.attribute(id, "value"),
            _ => None,
        }
    }

    pub fn set_value(&mut self, id: NodeId, v: impl Into<String>) {
        if let Some(Node {
            kind: NodeKind::Element { value, .. },
            ..
        }) = self.nodes.get_mut(id)
        {
            *value = Some(v.into());
        }
    }

    // ---- listeners ------------------------------------------------------

    pub fn add_event_listener(&mut self, id: NodeId, kind: impl Into<String>, listener: Listener) {
        if !self.contains(id) {
            return;
        }
        if let Some(entry) = self.listeners.entry(id) {
            entry.or_default().push((kind.into(), listener));
        }
    }

    /// Snapshot of the listeners for `kind`, cloned so the caller can drop
    /// the document borrow before invoking them.
    pub fn listeners_for(&self, id: NodeId, kind: &str) -> Vec<Listener> {
        self.listeners
            .get(id)
            .map(|list| {
                list.iter()
                    .filter(|(k, _)| k == kind)
                    .map(|(_, l)| l.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn listener_count(&self, id: NodeId) -> usize {
        self.listeners.get(id).map_or(0, |l| l.len())
    }
}
