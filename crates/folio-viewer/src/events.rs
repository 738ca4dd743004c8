//! Events reported to the host.

use std::collections::VecDeque;
use std::fmt;

use folio_common::Message;
use serde::Serialize;
use strum_macros::IntoStaticStr;

/// Something the host may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize, IntoStaticStr)]
#[serde(tag = "type", rename_all = "camelCase")]
#[strum(serialize_all = "lowercase")]
pub enum ViewerEvent {
    /// A spine item finished loading.
    Loaded {
        /// Document URL.
        url: String,
    },
    /// A page was laid out and committed.
    PageLaid {
        /// Spine item.
        spine: usize,
        /// 0-based page index within the spine item.
        page: usize,
    },
    /// The current page changed.
    Nav {
        /// Global 0-based page index.
        page: usize,
        /// EPage of the position shown.
        epage: f64,
        /// CFI of the position shown.
        cfi: String,
        /// Spread side of the page.
        side: String,
    },
    /// A link to outside the loaded documents was followed.
    Hyperlink {
        /// The link as resolved against its document.
        href: String,
        /// The link points into the spine.
        internal: bool,
    },
    /// Pages are being laid out again for a new viewport.
    ResizeStart,
    /// Relayout after a resize reached the page that was shown.
    ResizeEnd,
    /// A task failed; other tasks go on.
    Error {
        /// What went wrong.
        message: String,
    },
    /// A diagnostic from the engine.
    Message {
        /// Level name.
        level: String,
        /// Raising component.
        component: String,
        /// Text.
        text: String,
    },
}

impl From<Message> for ViewerEvent {
    fn from(message: Message) -> Self {
        Self::Message {
            level: message.level.to_string(),
            component: message.component.to_string(),
            text: message.text,
        }
    }
}

impl ViewerEvent {
    /// Short event name (`"nav"`, `"error"`, ...).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// A registered callback.
pub type Listener = Box<dyn FnMut(&ViewerEvent)>;

/// Events waiting to be delivered, and who to deliver them to.
///
/// Events are queued while the viewer works and dispatched in order
/// afterwards, so listeners never run in the middle of a layout task.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
    pending: VecDeque<ViewerEvent>,
}

impl EventBus {
    /// No listeners, no events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for every event.
    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    /// Queue `event`.
    pub fn emit(&mut self, event: ViewerEvent) {
        tracing::trace!(event = event.name(), "queued event");
        self.pending.push_back(event);
    }

    /// Deliver queued events to every listener, oldest first. Returns the
    /// delivered events.
    pub fn dispatch(&mut self) -> Vec<ViewerEvent> {
        let events: Vec<ViewerEvent> = self.pending.drain(..).collect();
        for event in &events {
            for listener in &mut self.listeners {
                listener(event);
            }
        }
        events
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("pending", &self.pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use folio_common::Level;

    use super::*;

    #[test]
    fn test_events_are_delivered_in_order() {
        let seen: Rc<RefCell<Vec<&'static str>>> = Rc::default();
        let mut bus = EventBus::new();
        let sink = Rc::clone(&seen);
        bus.subscribe(Box::new(move |event| sink.borrow_mut().push(event.name())));
        bus.emit(ViewerEvent::ResizeStart);
        bus.emit(ViewerEvent::PageLaid { spine: 0, page: 0 });
        assert!(seen.borrow().is_empty());
        let delivered = bus.dispatch();
        assert_eq!(delivered.len(), 2);
        assert_eq!(*seen.borrow(), vec!["resizestart", "pagelaid"]);
        assert!(bus.dispatch().is_empty());
    }

    #[test]
    fn test_messages_become_events() {
        let event = ViewerEvent::from(Message {
            level: Level::Warn,
            component: "CSS",
            text: "unknown property".to_string(),
        });
        assert_eq!(event.name(), "message");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["level"], "warn");
    }
}
