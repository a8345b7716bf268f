//! Drops an error event that repeats the one captured right before it.
//!
//! Errors that are captured once by an instrumentation layer and then again
//! by the code awaiting the same future would otherwise show up twice.

use std::sync::{Mutex, PoisonError};

use crate::protocol::Event;
use crate::{sentry_debug, ClientOptions, Integration};

/// What two events must share to count as the same error.
#[derive(Debug, PartialEq)]
struct Signature {
    message: Option<String>,
    fingerprint: Vec<String>,
    exceptions: Vec<(String, Option<String>)>,
}

impl Signature {
    fn of(event: &Event<'_>) -> Signature {
        Signature {
            message: event.message.clone(),
            fingerprint: event.fingerprint.iter().map(|fp| fp.to_string()).collect(),
            exceptions: event
                .exception
                .values
                .iter()
                .map(|exc| (exc.ty.clone(), exc.value.clone()))
                .collect(),
        }
    }
}

/// The dedupe integration.
///
/// Only the most recent event is remembered, so an error that occurs again
/// after a different one is reported again.
#[derive(Debug, Default)]
pub struct DedupeIntegration {
    previous: Mutex<Option<Signature>>,
}

impl DedupeIntegration {
    /// Creates a new dedupe integration.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Integration for DedupeIntegration {
    fn name(&self) -> &'static str {
        "dedupe"
    }

    fn process_event(
        &self,
        event: Event<'static>,
        _options: &ClientOptions,
    ) -> Option<Event<'static>> {
        if event.exception.values.is_empty() && event.message.is_none() {
            return Some(event);
        }
        let signature = Signature::of(&event);
        let mut previous = self.previous.lock().unwrap_or_else(PoisonError::into_inner);
        if previous.as_ref() == Some(&signature) {
            sentry_debug!("[DedupeIntegration] dropping duplicate of the previous event");
            return None;
        }
        *previous = Some(signature);
        Some(event)
    }
}
