//! Simple event bus for decoupled communication between the coordinator
//! and the presentation layer.
//!
//! The bus is single-threaded (WASM constraint) and uses interior mutability
//! via RefCell. Events are buffered and drained by the presentation layer.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use analyst_types::event::ClientEvent;

/// Shared event bus, cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<RefCell<VecDeque<ClientEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Publish an event. Consecutive duplicates collapse into one.
    pub fn emit(&self, event: ClientEvent) {
        let mut queue = self.inner.borrow_mut();
        if queue.back() == Some(&event) {
            return;
        }
        queue.push_back(event);
    }

    /// Drain all pending events.
    pub fn drain(&self) -> Vec<ClientEvent> {
        self.inner.borrow_mut().drain(..).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.borrow().is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
