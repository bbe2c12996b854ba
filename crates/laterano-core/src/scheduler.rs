use std::rc::Rc;

use indexmap::IndexSet;
use laterano_dom::NodeId;

/// Invoked when work becomes pending, so a host can request a frame.
pub type FrameRequester = Rc<dyn Fn()>;

/// Deferred element re-renders, deduplicated by element.
///
/// Nothing runs on its own: the host drains the set through
/// `Component::tick`, typically once per frame.
#[derive(Default)]
pub struct Scheduler {
    pending: IndexSet<NodeId>,
    requester: Option<FrameRequester>,
    flushes: u64,
}

impl Scheduler {
    /// Queues `nodes`. Returns the frame requester when the pending set
    /// just became non-empty; the caller invokes it after releasing its
    /// borrow of the scheduler.
    pub fn schedule(&mut self, nodes: impl IntoIterator<Item = NodeId>) -> Option<FrameRequester> {
        let was_idle = self.pending.is_empty();
        self.pending.extend(nodes);
        if was_idle && !self.pending.is_empty() {
            self.requester.clone()
        } else {
            None
        }
    }

    /// Drains the pending set in insertion order.
    pub fn take(&mut self) -> Vec<NodeId> {
        if !self.pending.is_empty() {
            self.flushes += 1;
        }
        self.pending.drain(..).collect()
    }

    pub fn is_pending(&self, node: NodeId) -> bool {
        self.pending.contains(&node)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn set_requester(&mut self, requester: Option<FrameRequester>) {
        self.requester = requester;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use laterano_dom::Document;

    use super::*;

    #[test]
    fn pending_set_deduplicates_and_requests_once() {
        let mut doc = Document::new();
        let (a, b) = (doc.create_element("a"), doc.create_element("b"));
        let requests = Rc::new(Cell::new(0));
        let mut s = Scheduler::default();
        let counter = requests.clone();
        s.set_requester(Some(Rc::new(move || counter.set(counter.get() + 1))));

        for req in [s.schedule([a]), s.schedule([b, a]), s.schedule([a])] {
            if let Some(req) = req {
                req();
            }
        }
        assert_eq!(requests.get(), 1);
        assert_eq!(s.pending_len(), 2);
        assert!(s.is_pending(b));

        assert_eq!(s.take(), vec![a, b]);
        assert!(s.take().is_empty());
        assert_eq!(s.flushes(), 1);

        if let Some(req) = s.schedule([b]) {
            req();
        }
        assert_eq!(requests.get(), 2);
    }
}
