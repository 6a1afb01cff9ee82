use serde::{Deserialize, Serialize};

/// Lifecycle notifications fired by the task engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskEvent {
    /// A new number became current (including the first)
    Tick { index: usize, number: u32 },
    /// The engine entered the pause between numbers; show the neutral marker
    Focus { after_index: usize },
    /// The last tick was scored; fired once per run
    Complete { results: usize },
}

/// Something that wants to hear about engine events.
///
/// Implemented for any `FnMut(&TaskEvent) + Send` closure.
pub trait TaskListener: Send {
    fn on_event(&mut self, event: &TaskEvent);
}

impl<F> TaskListener for F
where
    F: FnMut(&TaskEvent) + Send,
{
    fn on_event(&mut self, event: &TaskEvent) {
        self(event)
    }
}

/// Handle returned on subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Listener registry owned by a single engine.
///
/// Delivery is synchronous and in subscription order.
#[derive(Default)]
pub struct EventNotifier {
    next_id: u64,
    listeners: Vec<(ListenerId, Box<dyn TaskListener>)>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<L: TaskListener + 'static>(&mut self, listener: L) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn notify(&mut self, event: TaskEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNotifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
