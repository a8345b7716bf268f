//! Outcomes for data that was dropped before it reached Sentry.
//!
//! <https://develop.sentry.dev/sdk/telemetry/client-reports/>

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::protocol::{ClientReport, DataCategory, DiscardReason, DiscardedEvent};
use crate::Envelope;

/// Counts discarded items per reason and data category.
///
/// The client keeps one recorder for drops during event processing, and
/// transports can keep their own for rate limits and network failures.
#[derive(Debug, Default)]
pub struct ClientReportRecorder {
    discarded: Mutex<HashMap<(DiscardReason, DataCategory), u32>>,
}

impl ClientReportRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `quantity` dropped items.
    pub fn record(&self, reason: DiscardReason, category: DataCategory, quantity: u32) {
        if quantity == 0 {
            return;
        }
        let mut discarded = self.discarded.lock().unwrap_or_else(PoisonError::into_inner);
        let count = discarded.entry((reason, category)).or_insert(0);
        *count = count.saturating_add(quantity);
    }

    /// Records every item of a dropped envelope.
    pub fn record_envelope(&self, reason: DiscardReason, envelope: &Envelope) {
        for item in envelope.items() {
            if let Some(category) = item.data_category() {
                self.record(reason, category, item.quantity());
            }
        }
    }

    /// Returns `true` if nothing was recorded since the last `take`.
    pub fn is_empty(&self) -> bool {
        self.discarded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Takes the recorded outcomes, resetting all counters.
    pub fn take(&self) -> Option<ClientReport> {
        let discarded =
            std::mem::take(&mut *self.discarded.lock().unwrap_or_else(PoisonError::into_inner));
        if discarded.is_empty() {
            return None;
        }

        let mut discarded_events: Vec<_> = discarded
            .into_iter()
            .map(|((reason, category), quantity)| DiscardedEvent {
                reason,
                category,
                quantity,
            })
            .collect();
        discarded_events.sort_by_key(|event| (event.reason, event.category));
        Some(ClientReport::new(discarded_events))
    }

    /// Takes the recorded outcomes as an envelope ready to be sent.
    pub fn take_envelope(&self) -> Option<Envelope> {
        let report = self.take()?;
        let mut envelope = Envelope::new();
        envelope.add_item(report);
        Some(envelope)
    }
}
