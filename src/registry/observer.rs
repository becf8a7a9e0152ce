use rdpdeck_core::RegistryEvent;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Receives registry notifications synchronously, in registration order.
///
/// Observers may publish connection-state changes from `notify` (delivery is
/// deferred until the current dispatch finishes) but must not mutate the tree.
pub trait RegistryObserver {
    fn notify(&self, event: &RegistryEvent);
}

impl<F> RegistryObserver for F
where
    F: Fn(&RegistryEvent),
{
    fn notify(&self, event: &RegistryEvent) {
        self(event)
    }
}

/// Handle returned by `SettingsRegistry::subscribe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Observer that buffers events for a binding to drain on its own loop.
#[derive(Clone, Default)]
pub struct EventQueue {
    events: Rc<RefCell<VecDeque<RegistryEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all pending events, oldest first.
    pub fn drain(&self) -> Vec<RegistryEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl RegistryObserver for EventQueue {
    fn notify(&self, event: &RegistryEvent) {
        self.events.borrow_mut().push_back(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdpdeck_core::TreeId;

    #[test]
    fn queue_drains_in_order() {
        let queue = EventQueue::new();
        let observer: Rc<dyn RegistryObserver> = Rc::new(queue.clone());
        observer.notify(&RegistryEvent::NodeRemoved(TreeId(1)));
        observer.notify(&RegistryEvent::NodeRemoved(TreeId(2)));
        assert_eq!(queue.len(), 2);
        assert_eq!(
            queue.drain(),
            vec![
                RegistryEvent::NodeRemoved(TreeId(1)),
                RegistryEvent::NodeRemoved(TreeId(2)),
            ]
        );
        assert!(queue.is_empty());
    }
}
