use std::cell::RefCell;
use std::rc::Rc;

use crate::{Document, NodeId};

pub type Listener = Rc<dyn Fn(&Event)>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: String,
    /// Node the event was dispatched on.
    pub target: NodeId,
    /// Node whose listener is currently running.
    pub current_target: NodeId,
}

/// Dispatches `kind` at `target`, bubbling through its ancestors.
///
/// The document borrow is released before every listener call so listeners
/// are free to mutate the tree. Returns the number of listeners invoked.
pub fn dispatch_event(doc: &RefCell<Document>, target: NodeId, kind: &str) -> usize {
    let path = doc.borrow().ancestors_inclusive(target);
    let mut invoked = 0;
    for node in path {
        let listeners = doc.borrow().listeners_for(node, kind);
        for listener in listeners {
            let event = Event {
                kind: kind.to_string(),
                target,
                current_target: node,
            };
            listener(&event);
            invoked += 1;
        }
    }
    invoked
}
