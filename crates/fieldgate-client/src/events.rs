// File: src/events.rs
// Purpose: Validation lifecycle events with per-field and global listeners

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use tokio::time::Instant;

/// Events kept for inspection by default
pub const DEFAULT_HISTORY: usize = 100;

/// Kind of lifecycle transition a field went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationEventKind {
    /// A request was sent
    Start,
    /// The value was accepted
    Success,
    /// The value was rejected, or the request failed
    Error,
    /// A request or armed timer was dropped without a verdict
    Cancel,
    /// A displayed error was removed
    Clear,
}

impl ValidationEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationEventKind::Start => "validation_start",
            ValidationEventKind::Success => "validation_success",
            ValidationEventKind::Error => "validation_error",
            ValidationEventKind::Cancel => "validation_cancel",
            ValidationEventKind::Clear => "validation_clear",
        }
    }
}

impl fmt::Display for ValidationEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEvent {
    pub field: String,
    pub kind: ValidationEventKind,
    /// Messages for `Error` events, empty otherwise
    pub errors: Vec<String>,
    pub at: Instant,
}

impl ValidationEvent {
    pub fn new(field: impl Into<String>, kind: ValidationEventKind) -> Self {
        Self {
            field: field.into(),
            kind,
            errors: Vec::new(),
            at: Instant::now(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}

type Listener = Rc<dyn Fn(&ValidationEvent)>;

struct Inner {
    listeners: RefCell<HashMap<String, Vec<Listener>>>,
    global: RefCell<Vec<Listener>>,
    history: RefCell<VecDeque<ValidationEvent>>,
    max_history: usize,
}

/// Fan-out of validation events to UI listeners.
///
/// Clones share listeners and history. Listeners run synchronously on the
/// emitting task, after the bus has released its own borrows, so a listener
/// may subscribe or read the history.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<Inner>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("history", &self.inner.history.borrow().len())
            .field("global_listeners", &self.inner.global.borrow().len())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_limit(max_history: usize) -> Self {
        Self {
            inner: Rc::new(Inner {
                listeners: RefCell::new(HashMap::new()),
                global: RefCell::new(Vec::new()),
                history: RefCell::new(VecDeque::new()),
                max_history,
            }),
        }
    }

    /// Listen to one field
    pub fn subscribe(&self, field: impl Into<String>, listener: impl Fn(&ValidationEvent) + 'static) {
        self.inner
            .listeners
            .borrow_mut()
            .entry(field.into())
            .or_default()
            .push(Rc::new(listener));
    }

    /// Listen to every field
    pub fn subscribe_all(&self, listener: impl Fn(&ValidationEvent) + 'static) {
        self.inner.global.borrow_mut().push(Rc::new(listener));
    }

    /// Drop every listener registered for `field`
    pub fn unsubscribe(&self, field: &str) {
        self.inner.listeners.borrow_mut().remove(field);
    }

    pub fn unsubscribe_all(&self) {
        self.inner.global.borrow_mut().clear();
    }

    pub fn has_listeners_for(&self, field: &str) -> bool {
        let field_listeners = self
            .inner
            .listeners
            .borrow()
            .get(field)
            .is_some_and(|l| !l.is_empty());
        field_listeners || !self.inner.global.borrow().is_empty()
    }

    pub fn emit(&self, event: ValidationEvent) {
        {
            let mut history = self.inner.history.borrow_mut();
            history.push_back(event.clone());
            while history.len() > self.inner.max_history {
                history.pop_front();
            }
        }

        let mut targets: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .get(&event.field)
            .cloned()
            .unwrap_or_default();
        targets.extend(self.inner.global.borrow().iter().cloned());

        for listener in targets {
            listener(&event);
        }
    }

    /// Oldest first
    pub fn history(&self) -> Vec<ValidationEvent> {
        self.inner.history.borrow().iter().cloned().collect()
    }

    pub fn events_for(&self, field: &str) -> Vec<ValidationEvent> {
        self.inner
            .history
            .borrow()
            .iter()
            .filter(|e| e.field == field)
            .cloned()
            .collect()
    }

    /// Most recent event kind per field
    pub fn latest(&self) -> HashMap<String, ValidationEventKind> {
        self.inner
            .history
            .borrow()
            .iter()
            .map(|e| (e.field.clone(), e.kind))
            .collect()
    }

    pub fn clear_history(&self) {
        self.inner.history.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    #[test]
    fn test_field_and_global_listeners() {
        let bus = EventBus::new();
        let email_seen = Rc::new(Cell::new(0));
        let all_seen = Rc::new(RefCell::new(Vec::new()));

        let counter = email_seen.clone();
        bus.subscribe("email", move |_| counter.set(counter.get() + 1));
        let sink = all_seen.clone();
        bus.subscribe_all(move |e| sink.borrow_mut().push(e.kind.to_string()));

        bus.emit(ValidationEvent::new("email", ValidationEventKind::Start));
        bus.emit(ValidationEvent::new("name", ValidationEventKind::Clear));

        assert_eq!(email_seen.get(), 1);
        assert_eq!(*all_seen.borrow(), vec!["validation_start", "validation_clear"]);
        assert!(bus.has_listeners_for("phone"));

        bus.unsubscribe_all();
        bus.unsubscribe("email");
        assert!(!bus.has_listeners_for("email"));
    }

    #[test]
    fn test_history_is_bounded() {
        let bus = EventBus::with_history_limit(3);
        for i in 0..5 {
            bus.emit(ValidationEvent::new(format!("f{}", i), ValidationEventKind::Success));
        }

        let fields: Vec<String> = bus.history().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["f2", "f3", "f4"]);
        assert_eq!(EventBus::new().inner.max_history, DEFAULT_HISTORY);
    }

    #[test]
    fn test_latest_and_per_field_history() {
        let bus = EventBus::new();
        bus.emit(ValidationEvent::new("email", ValidationEventKind::Start));
        bus.emit(
            ValidationEvent::new("email", ValidationEventKind::Error).with_errors(vec!["Email is invalid".into()]),
        );
        bus.emit(ValidationEvent::new("name", ValidationEventKind::Start));

        assert_eq!(bus.events_for("email").len(), 2);
        assert_eq!(bus.events_for("email")[1].errors, vec!["Email is invalid".to_string()]);
        let latest = bus.latest();
        assert_eq!(latest.get("email"), Some(&ValidationEventKind::Error));
        assert_eq!(latest.get("name"), Some(&ValidationEventKind::Start));

        bus.clear_history();
        assert!(bus.history().is_empty());
    }

    #[test]
    fn test_listener_may_reenter_bus() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        bus.subscribe_all(move |_| counter.set(inner_bus.history().len()));

        bus.emit(ValidationEvent::new("email", ValidationEventKind::Start));
        assert_eq!(seen.get(), 1);
    }
}
