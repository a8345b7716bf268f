use std::any::type_name;

use crate::protocol::Event;
use crate::ClientOptions;

/// A plugin of the client.
///
/// Integrations are set up once when the client is created and may adjust
/// its options there.  Afterwards every event passes through
/// [`process_event`](Integration::process_event) of each integration, in the
/// order of `ClientOptions::integrations`, before `before_send` runs.
/// Returning `None` drops the event, which is counted as an
/// `event_processor` discard.
pub trait Integration: Sync + Send + 'static {
    /// Name of this integration, as listed in the SDK info of events.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Called once when the integration is attached to a client.
    fn setup(&self, options: &mut ClientOptions) {
        let _ = options;
    }

    /// Inspects, rewrites or drops an event.
    fn process_event(
        &self,
        event: Event<'static>,
        options: &ClientOptions,
    ) -> Option<Event<'static>> {
        let _ = options;
        Some(event)
    }
}
