//! Leveled engine messages with de-duplication.
//!
//! Every document instance owns one [`MessageQueue`]. Components push
//! `debug`/`info`/`warn`/`error` messages into it instead of printing, and the
//! viewer drains the queue and forwards the messages to its listeners. Each
//! push is mirrored to a `tracing` event so a subscriber installed by the host
//! sees the same stream.
//!
//! Repeated warnings are recorded once per queue: a stylesheet that uses the
//! same unsupported property on every rule produces one message, not hundreds.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use strum_macros::{Display, EnumString};

/// Severity of an engine message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    /// Tracing detail, hidden by default.
    Debug,
    /// Progress information (document loaded, page count known).
    Info,
    /// A localized problem the engine recovered from.
    Warn,
    /// A failure that aborted a task.
    Error,
}

/// One message in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Severity.
    pub level: Level,
    /// Subsystem that raised the message (`"CSS"`, `"Layout"`, `"CFI"`, ...).
    pub component: &'static str,
    /// Human-readable text.
    pub text: String,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Message>,
    warned: HashSet<(&'static str, String)>,
    min_level: Option<Level>,
}

/// Shared handle to a document's message queue.
///
/// Cloning the handle is cheap; all clones feed the same queue. The engine is
/// single-threaded so the handle is `Rc`-based.
#[derive(Debug, Clone, Default)]
pub struct MessageQueue {
    state: Rc<RefCell<QueueState>>,
}

impl MessageQueue {
    /// Create an empty queue that records every level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop messages below `level` instead of queueing them. They are still
    /// emitted as `tracing` events.
    pub fn set_min_level(&self, level: Level) {
        self.state.borrow_mut().min_level = Some(level);
    }

    /// Record a message.
    pub fn push(&self, level: Level, component: &'static str, text: impl Into<String>) {
        let text = text.into();
        match level {
            Level::Debug => tracing::debug!(component, "{text}"),
            Level::Info => tracing::info!(component, "{text}"),
            Level::Warn => tracing::warn!(component, "{text}"),
            Level::Error => tracing::error!(component, "{text}"),
        }

        let mut state = self.state.borrow_mut();
        if level == Level::Warn && !state.warned.insert((component, text.clone())) {
            return;
        }
        if state.min_level.is_some_and(|min| level < min) {
            return;
        }
        state.pending.push_back(Message {
            level,
            component,
            text,
        });
    }

    /// Shorthand for [`Level::Debug`].
    pub fn debug(&self, component: &'static str, text: impl Into<String>) {
        self.push(Level::Debug, component, text);
    }

    /// Shorthand for [`Level::Info`].
    pub fn info(&self, component: &'static str, text: impl Into<String>) {
        self.push(Level::Info, component, text);
    }

    /// Shorthand for [`Level::Warn`]. Identical warnings are kept once.
    pub fn warn(&self, component: &'static str, text: impl Into<String>) {
        self.push(Level::Warn, component, text);
    }

    /// Shorthand for [`Level::Error`].
    pub fn error(&self, component: &'static str, text: impl Into<String>) {
        self.push(Level::Error, component, text);
    }

    /// Remove and return every pending message in arrival order.
    #[must_use]
    pub fn drain(&self) -> Vec<Message> {
        self.state.borrow_mut().pending.drain(..).collect()
    }

    /// Number of messages waiting to be drained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// True when nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().pending.is_empty()
    }

    /// Forget which warnings were already reported (call when a new document
    /// replaces the old one).
    pub fn clear_warnings(&self) {
        self.state.borrow_mut().warned.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_are_deduplicated() {
        let queue = MessageQueue::new();
        queue.warn("CSS", "unknown property 'foo'");
        queue.warn("CSS", "unknown property 'foo'");
        queue.warn("CSS", "unknown property 'bar'");

        let messages = queue.drain();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "unknown property 'foo'");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_errors_are_not_deduplicated() {
        let queue = MessageQueue::new();
        queue.error("Layout", "task failed");
        queue.error("Layout", "task failed");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_min_level_filters_queue() {
        let queue = MessageQueue::new();
        queue.set_min_level(Level::Warn);
        queue.debug("Layout", "page 1 committed");
        queue.info("Viewer", "loaded");
        queue.warn("CSS", "dropped rule");

        let messages = queue.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, Level::Warn);
    }

    #[test]
    fn test_clones_share_state() {
        let queue = MessageQueue::new();
        let other = queue.clone();
        other.info("Viewer", "hello");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_clear_warnings_allows_repeat() {
        let queue = MessageQueue::new();
        queue.warn("CSS", "x");
        queue.clear_warnings();
        queue.warn("CSS", "x");
        assert_eq!(queue.drain().len(), 2);
    }

    #[test]
    fn test_level_parses_from_str() {
        assert_eq!("warn".parse::<Level>().ok(), Some(Level::Warn));
        assert_eq!(Level::Error.to_string(), "error");
    }
}
