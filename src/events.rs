//! Structured progress events.
//!
//! The core reports each sub-step and every fallback transition through an
//! [`EventSink`], independent of whether log output is enabled.

use std::cell::RefCell;

use crate::error::Stage;
use crate::git::{Operation, PushOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StepStarted {
        stage: Stage,
        step: String,
    },
    /// The preferred strategy could not start; the fallback ran instead.
    FallbackEngaged {
        operation: Operation,
        from: &'static str,
        to: &'static str,
        reason: String,
    },
    PushCompleted {
        outcome: PushOutcome,
    },
}

pub trait EventSink {
    fn emit(&self, event: &Event);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &Event) {
        match event {
            Event::StepStarted { stage, step } => {
                tracing::debug!(%stage, "{}", step);
            }
            Event::FallbackEngaged {
                operation,
                from,
                to,
                reason,
            } => {
                tracing::debug!(%operation, from, to, %reason, "falling back to {} implementation", to);
            }
            Event::PushCompleted { outcome } => {
                tracing::debug!(?outcome, "push finished");
            }
        }
    }
}

/// Keeps every event in memory, optionally forwarding to another sink.
#[derive(Default)]
pub struct RecordingSink<'a> {
    inner: Option<&'a dyn EventSink>,
    events: RefCell<Vec<Event>>,
}

impl<'a> RecordingSink<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarding(inner: &'a dyn EventSink) -> Self {
        Self {
            inner: Some(inner),
            events: RefCell::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Operations that ran on the fallback strategy, in order.
    pub fn fallbacks(&self) -> Vec<Operation> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::FallbackEngaged { operation, .. } => Some(*operation),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink<'_> {
    fn emit(&self, event: &Event) {
        self.events.borrow_mut().push(event.clone());
        if let Some(inner) = self.inner {
            inner.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_forwards() {
        let outer = RecordingSink::new();
        let tee = RecordingSink::forwarding(&outer);

        tee.emit(&Event::StepStarted {
            stage: Stage::Snapshot,
            step: "stage files".to_string(),
        });
        tee.emit(&Event::FallbackEngaged {
            operation: Operation::Stage,
            from: "git-cli",
            to: "in-process",
            reason: "not found".to_string(),
        });

        assert_eq!(tee.events().len(), 2);
        assert_eq!(outer.events(), tee.events());
        assert_eq!(tee.fallbacks(), vec![Operation::Stage]);
    }
}
