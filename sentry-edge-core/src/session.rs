//! Release Health Sessions
//!
//! <https://develop.sentry.dev/sdk/sessions/>

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crate::batcher::{Batcher, Pending};
use crate::client::TransportArc;
use crate::clientoptions::SessionMode;
use crate::protocol::{
    EnvelopeItem, Event, Level, SessionAggregateItem, SessionAggregates, SessionAttributes,
    SessionStatus, SessionUpdate, User,
};
use crate::types::Uuid;
use crate::{Client, Envelope};

/// A running session.
///
/// Dropping a session closes it as `exited` and queues the final update.
#[derive(Clone, Debug)]
pub struct Session {
    client: Arc<Client>,
    session_update: SessionUpdate<'static>,
    started: Instant,
    dirty: bool,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close(SessionStatus::Exited);
        if self.dirty {
            self.client.enqueue_session(self.session_update.clone());
        }
    }
}

impl Session {
    /// Starts a new session for `client`.
    ///
    /// Returns `None` when the client has no release configured, as sessions
    /// are meaningless without one.
    pub(crate) fn new(client: &Arc<Client>, user: Option<&User>) -> Option<Self> {
        let options = client.options();
        let distinct_id = user
            .and_then(|user| {
                user.id
                    .as_ref()
                    .or(user.email.as_ref())
                    .or(user.username.as_ref())
            })
            .cloned();
        Some(Self {
            client: client.clone(),
            session_update: SessionUpdate {
                session_id: Uuid::new_v4(),
                distinct_id,
                sequence: None,
                timestamp: None,
                started: SystemTime::now(),
                init: true,
                duration: None,
                status: SessionStatus::Ok,
                errors: 0,
                attributes: SessionAttributes {
                    release: options.release.clone()?,
                    environment: options.environment.clone(),
                    ip_address: None,
                    user_agent: None,
                },
            },
            started: Instant::now(),
            dirty: true,
        })
    }

    pub(crate) fn update_from_event(&mut self, event: &Event<'static>) {
        if self.session_update.status.is_terminal() {
            return;
        }
        let mut has_error = event.level >= Level::Error;
        let mut is_crash = false;
        for exc in event.exception.iter() {
            has_error = true;
            if let Some(false) = exc.mechanism.as_ref().and_then(|m| m.handled) {
                is_crash = true;
                break;
            }
        }

        if is_crash {
            self.session_update.status = SessionStatus::Crashed;
            self.session_update.duration = Some(self.started.elapsed().as_secs_f64());
        }
        if has_error {
            self.session_update.errors += 1;
            self.dirty = true;
        }
    }

    pub(crate) fn close(&mut self, status: SessionStatus) {
        if self.session_update.status.is_terminal() {
            return;
        }
        let status = match status {
            SessionStatus::Ok => SessionStatus::Exited,
            s => s,
        };
        self.session_update.duration = Some(self.started.elapsed().as_secs_f64());
        self.session_update.status = status;
        self.dirty = true;
    }

    /// Returns the pending update, if there is one.
    ///
    /// The first update carries `init: true`, all later ones `init: false`.
    pub(crate) fn create_envelope_item(&mut self) -> Option<EnvelopeItem> {
        if !self.dirty {
            return None;
        }
        let item = self.session_update.clone().into();
        self.session_update.init = false;
        self.dirty = false;
        Some(item)
    }
}

// as defined here: https://develop.sentry.dev/sdk/envelopes/#size-limits
const MAX_SESSION_ITEMS: usize = 100;
const FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Batches session updates and sends them every minute.
pub(crate) type SessionFlusher = Batcher<SessionQueue>;

pub(crate) fn session_flusher(transport: TransportArc, mode: SessionMode) -> SessionFlusher {
    Batcher::new(
        transport,
        "session",
        FLUSH_INTERVAL,
        SessionQueue {
            mode,
            individual: Vec::new(),
            aggregated: None,
        },
    )
}

/// The session updates waiting to be sent.
///
/// In request mode, sessions that end with their first update are only
/// counted per minute they started in.  Everything else is sent as is.
pub(crate) struct SessionQueue {
    mode: SessionMode,
    individual: Vec<SessionUpdate<'static>>,
    aggregated: Option<AggregatedSessions>,
}

impl Pending for SessionQueue {
    type Item = SessionUpdate<'static>;

    fn push(&mut self, session_update: SessionUpdate<'static>) -> bool {
        if self.mode == SessionMode::Application || !session_update.init {
            self.individual.push(session_update);
            return self.individual.len() >= MAX_SESSION_ITEMS;
        }

        let aggregate = self.aggregated.get_or_insert_with(|| AggregatedSessions {
            buckets: HashMap::with_capacity(1),
            attributes: session_update.attributes.clone(),
        });
        let key = AggregationKey {
            started: minute_bucket(session_update.started),
            distinct_id: session_update.distinct_id,
        };
        let bucket = aggregate.buckets.entry(key).or_default();
        match session_update.status {
            SessionStatus::Exited if session_update.errors > 0 => bucket.errored += 1,
            SessionStatus::Exited => bucket.exited += 1,
            SessionStatus::Crashed => bucket.crashed += 1,
            SessionStatus::Abnormal => bucket.abnormal += 1,
            SessionStatus::Ok => {
                sentry_debug!("unreachable: only closed sessions will be enqueued");
            }
        }
        false
    }

    fn take_envelopes(&mut self) -> Vec<Envelope> {
        let mut envelopes = Vec::new();
        if let Some(aggregate) = self.aggregated.take() {
            envelopes.push(EnvelopeItem::from(aggregate).into());
        }
        let individual = std::mem::take(&mut self.individual);
        for chunk in individual.chunks(MAX_SESSION_ITEMS) {
            let mut envelope = Envelope::new();
            for session_update in chunk {
                envelope.add_item(session_update.clone());
            }
            envelopes.push(envelope);
        }
        envelopes
    }
}

struct AggregatedSessions {
    buckets: HashMap<AggregationKey, AggregationCounts>,
    attributes: SessionAttributes<'static>,
}

impl From<AggregatedSessions> for EnvelopeItem {
    fn from(sessions: AggregatedSessions) -> Self {
        let aggregates = sessions
            .buckets
            .into_iter()
            .map(|(key, counts)| SessionAggregateItem {
                started: key.started,
                distinct_id: key.distinct_id,
                exited: counts.exited,
                errored: counts.errored,
                abnormal: counts.abnormal,
                crashed: counts.crashed,
            })
            .collect();

        SessionAggregates {
            aggregates,
            attributes: sessions.attributes,
        }
        .into()
    }
}

#[derive(PartialEq, Eq, Hash)]
struct AggregationKey {
    started: SystemTime,
    distinct_id: Option<String>,
}

#[derive(Default)]
struct AggregationCounts {
    exited: u32,
    errored: u32,
    abnormal: u32,
    crashed: u32,
}

/// Truncates `started` to the start of its minute.
fn minute_bucket(started: SystemTime) -> SystemTime {
    let secs = started
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    SystemTime::UNIX_EPOCH + Duration::from_secs((secs / 60) * 60)
}
