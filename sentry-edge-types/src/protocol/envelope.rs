use std::io::Write;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::v7 as protocol;

use protocol::{
    ClientReport, DataCategory, Event, Feedback, Log, SessionAggregates, SessionUpdate, Span,
    Transaction, LOGS_CONTENT_TYPE,
};

use crate::propagation::DynamicSamplingContext;
use crate::utils::ts_rfc3339_opt;

/// Raised if a envelope cannot be parsed from a given input.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Unexpected end of file
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// Missing envelope header
    #[error("missing envelope header")]
    MissingHeader,
    /// Missing item header
    #[error("missing item header")]
    MissingItemHeader,
    /// Missing newline after header or payload
    #[error("missing newline after header or payload")]
    MissingNewline,
    /// Invalid envelope header
    #[error("invalid envelope header")]
    InvalidHeader(#[source] serde_json::Error),
    /// Invalid item header
    #[error("invalid item header")]
    InvalidItemHeader(#[source] serde_json::Error),
    /// Invalid item payload
    #[error("invalid item payload")]
    InvalidItemPayload(#[source] serde_json::Error),
}

/// The headers of an [`Envelope`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeHeaders {
    /// The id of the event-like item in this envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    /// When the envelope was handed to the transport.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "ts_rfc3339_opt")]
    pub sent_at: Option<SystemTime>,
    /// The dynamic sampling context of the trace the items belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<DynamicSamplingContext>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
enum EnvelopeItemType {
    #[serde(rename = "event")]
    Event,
    #[serde(rename = "session")]
    SessionUpdate,
    #[serde(rename = "sessions")]
    SessionAggregates,
    #[serde(rename = "transaction")]
    Transaction,
    #[serde(rename = "span")]
    Span,
    #[serde(rename = "log")]
    Logs,
    #[serde(rename = "feedback")]
    Feedback,
    #[serde(rename = "client_report")]
    ClientReport,
}

#[derive(Clone, Debug, Deserialize)]
struct EnvelopeItemHeader {
    r#type: EnvelopeItemType,
    length: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct LogsPayload<T> {
    items: T,
}

/// An Envelope Item.
///
/// See the [documentation on Items](https://develop.sentry.dev/sdk/envelopes/#items)
/// for more details.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
#[allow(clippy::large_enum_variant)]
pub enum EnvelopeItem {
    /// An error or message event.
    Event(Event<'static>),
    /// A single session update.
    SessionUpdate(SessionUpdate<'static>),
    /// Pre-aggregated request-mode sessions.
    SessionAggregates(SessionAggregates<'static>),
    /// A finished transaction with its child spans.
    Transaction(Transaction<'static>),
    /// A standalone span.
    Span(Span),
    /// A container of structured logs, sent as one item.
    Logs(Vec<Log>),
    /// User feedback.
    Feedback(Feedback),
    /// Outcomes of locally dropped data.
    ClientReport(ClientReport),
    /// This is a sentinel item used to `filter` raw envelopes.
    Raw,
}

impl EnvelopeItem {
    /// The category this item is rate limited and reported under.
    ///
    /// Client reports are never rate limited and return `None`.
    pub fn data_category(&self) -> Option<DataCategory> {
        Some(match self {
            EnvelopeItem::Event(_) => DataCategory::Error,
            EnvelopeItem::SessionUpdate(_) | EnvelopeItem::SessionAggregates(_) => {
                DataCategory::Session
            }
            EnvelopeItem::Transaction(_) => DataCategory::Transaction,
            EnvelopeItem::Span(_) => DataCategory::Span,
            EnvelopeItem::Logs(_) => DataCategory::LogItem,
            EnvelopeItem::Feedback(_) => DataCategory::Feedback,
            EnvelopeItem::ClientReport(_) | EnvelopeItem::Raw => return None,
        })
    }

    /// The number of individual items this envelope item stands for.
    pub fn quantity(&self) -> u32 {
        match self {
            EnvelopeItem::Logs(logs) => u32::try_from(logs.len()).unwrap_or(u32::MAX),
            _ => 1,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            EnvelopeItem::Event(_) => "event",
            EnvelopeItem::SessionUpdate(_) => "session",
            EnvelopeItem::SessionAggregates(_) => "sessions",
            EnvelopeItem::Transaction(_) => "transaction",
            EnvelopeItem::Span(_) => "span",
            EnvelopeItem::Logs(_) => "log",
            EnvelopeItem::Feedback(_) => "feedback",
            EnvelopeItem::ClientReport(_) => "client_report",
            EnvelopeItem::Raw => "raw",
        }
    }
}

macro_rules! into_item {
    ($kind:ident, $ty:ty) => {
        impl From<$ty> for EnvelopeItem {
            fn from(item: $ty) -> Self {
                EnvelopeItem::$kind(item)
            }
        }
    };
}

into_item!(Event, Event<'static>);
into_item!(SessionUpdate, SessionUpdate<'static>);
into_item!(SessionAggregates, SessionAggregates<'static>);
into_item!(Transaction, Transaction<'static>);
into_item!(Span, Span);
into_item!(Logs, Vec<Log>);
into_item!(Feedback, Feedback);
into_item!(ClientReport, ClientReport);

/// An Iterator over the items of an Envelope.
#[derive(Clone)]
pub struct EnvelopeItemIter<'s> {
    inner: std::slice::Iter<'s, EnvelopeItem>,
}

impl<'s> Iterator for EnvelopeItemIter<'s> {
    type Item = &'s EnvelopeItem;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Items {
    EnvelopeItems(Vec<EnvelopeItem>),
    Raw(Vec<u8>),
}

impl Default for Items {
    fn default() -> Self {
        Self::EnvelopeItems(Default::default())
    }
}

impl Items {
    fn is_empty(&self) -> bool {
        match self {
            Items::EnvelopeItems(items) => items.is_empty(),
            Items::Raw(bytes) => bytes.is_empty(),
        }
    }
}

/// A Sentry Envelope.
///
/// An Envelope is the data format that Sentry uses for Ingestion. It can contain
/// multiple Items, some of which are related, such as Events and their trace.
/// Other Items, such as Sessions are independent.
///
/// See the [documentation on Envelopes](https://develop.sentry.dev/sdk/envelopes/)
/// for more details.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Envelope {
    headers: EnvelopeHeaders,
    items: Items,
}

impl Envelope {
    /// Creates a new empty Envelope.
    pub fn new() -> Envelope {
        Default::default()
    }

    /// Add a new Envelope Item.
    ///
    /// The first event, transaction or feedback determines the `event_id` header.
    pub fn add_item<I>(&mut self, item: I)
    where
        I: Into<EnvelopeItem>,
    {
        let item = item.into();

        let Items::EnvelopeItems(ref mut items) = self.items else {
            return;
        };

        if self.headers.event_id.is_none() {
            self.headers.event_id = match item {
                EnvelopeItem::Event(ref event) => Some(event.event_id),
                EnvelopeItem::Transaction(ref transaction) => Some(transaction.event_id),
                EnvelopeItem::Feedback(ref feedback) => Some(feedback.event_id),
                _ => None,
            };
        }
        items.push(item);
    }

    /// Create an [`Iterator`] over all the [`EnvelopeItem`]s.
    pub fn items(&self) -> EnvelopeItemIter<'_> {
        let inner = match &self.items {
            Items::EnvelopeItems(items) => items.iter(),
            Items::Raw(_) => [].iter(),
        };

        EnvelopeItemIter { inner }
    }

    /// Returns the Envelopes Uuid, if any.
    pub fn uuid(&self) -> Option<&Uuid> {
        self.headers.event_id.as_ref()
    }

    /// Returns the envelope headers.
    pub fn headers(&self) -> &EnvelopeHeaders {
        &self.headers
    }

    /// Attaches the dynamic sampling context of the trace.
    pub fn set_trace(&mut self, dsc: DynamicSamplingContext) {
        self.headers.trace = Some(dsc);
    }

    /// Stamps the envelope with the time it is sent.
    pub fn set_sent_at(&mut self, sent_at: SystemTime) {
        self.headers.sent_at = Some(sent_at);
    }

    /// Returns the [`Event`] contained in this Envelope, if any.
    pub fn event(&self) -> Option<&Event<'static>> {
        let Items::EnvelopeItems(ref items) = self.items else {
            return None;
        };

        items.iter().find_map(|item| match item {
            EnvelopeItem::Event(event) => Some(event),
            _ => None,
        })
    }

    /// Filters the Envelope's [`EnvelopeItem`]s based on a predicate,
    /// and returns a new Envelope containing only the filtered items.
    ///
    /// Retains the [`EnvelopeItem`]s for which the predicate returns `true`.
    /// The `sent_at` and `trace` headers are carried over.
    ///
    /// [`None`] is returned if no items remain in the Envelope after filtering.
    pub fn filter<P>(self, mut predicate: P) -> Option<Self>
    where
        P: FnMut(&EnvelopeItem) -> bool,
    {
        let Items::EnvelopeItems(items) = self.items else {
            return if predicate(&EnvelopeItem::Raw) {
                Some(self)
            } else {
                None
            };
        };

        let mut filtered = Envelope {
            headers: EnvelopeHeaders {
                event_id: None,
                ..self.headers
            },
            items: Items::default(),
        };
        for item in items {
            if predicate(&item) {
                filtered.add_item(item);
            }
        }

        if filtered.items.is_empty() {
            None
        } else {
            Some(filtered)
        }
    }

    /// Serialize the Envelope into the given [`Write`].
    pub fn to_writer<W>(&self, mut writer: W) -> std::io::Result<()>
    where
        W: Write,
    {
        let items = match &self.items {
            Items::Raw(bytes) => return writer.write_all(bytes).map(|_| ()),
            Items::EnvelopeItems(items) => items,
        };

        serde_json::to_writer(&mut writer, &self.headers)?;
        writeln!(writer)?;

        let mut item_buf = Vec::new();
        for item in items {
            // the payload goes to a temporary buffer first, since its length is part of the header
            match item {
                EnvelopeItem::Event(event) => serde_json::to_writer(&mut item_buf, event)?,
                EnvelopeItem::SessionUpdate(session) => {
                    serde_json::to_writer(&mut item_buf, session)?
                }
                EnvelopeItem::SessionAggregates(aggregates) => {
                    serde_json::to_writer(&mut item_buf, aggregates)?
                }
                EnvelopeItem::Transaction(transaction) => {
                    serde_json::to_writer(&mut item_buf, transaction)?
                }
                EnvelopeItem::Span(span) => serde_json::to_writer(&mut item_buf, span)?,
                EnvelopeItem::Logs(logs) => {
                    serde_json::to_writer(&mut item_buf, &LogsPayload { items: logs })?
                }
                EnvelopeItem::Feedback(feedback) => {
                    serde_json::to_writer(&mut item_buf, feedback)?
                }
                EnvelopeItem::ClientReport(report) => {
                    serde_json::to_writer(&mut item_buf, report)?
                }
                EnvelopeItem::Raw => continue,
            }

            write!(
                writer,
                r#"{{"type":"{}","length":{}"#,
                item.type_name(),
                item_buf.len()
            )?;
            if let EnvelopeItem::Logs(logs) = item {
                write!(
                    writer,
                    r#","item_count":{},"content_type":"{}""#,
                    logs.len(),
                    LOGS_CONTENT_TYPE
                )?;
            }
            writeln!(writer, "}}")?;
            writer.write_all(&item_buf)?;
            writeln!(writer)?;
            item_buf.clear();
        }

        Ok(())
    }

    /// Serializes the Envelope into a byte buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // writing into a `Vec` only fails if serialization itself fails
        if self.to_writer(&mut buf).is_err() {
            buf.clear();
        }
        buf
    }

    /// Creates a new Envelope from slice.
    pub fn from_slice(slice: &[u8]) -> Result<Envelope, EnvelopeError> {
        let (headers, offset) = Self::parse_header(slice)?;
        let items = Self::parse_items(slice, offset)?;

        let mut envelope = Envelope {
            headers,
            ..Default::default()
        };

        for item in items {
            envelope.add_item(item);
        }

        Ok(envelope)
    }

    /// Creates a new raw Envelope from the given buffer.
    ///
    /// The bytes are kept verbatim and written out unchanged.
    pub fn from_bytes_raw(bytes: Vec<u8>) -> Result<Self, EnvelopeError> {
        Ok(Self {
            headers: Default::default(),
            items: Items::Raw(bytes),
        })
    }

    fn parse_header(slice: &[u8]) -> Result<(EnvelopeHeaders, usize), EnvelopeError> {
        let mut stream = serde_json::Deserializer::from_slice(slice).into_iter();

        let headers: EnvelopeHeaders = match stream.next() {
            None => return Err(EnvelopeError::MissingHeader),
            Some(Err(error)) => return Err(EnvelopeError::InvalidHeader(error)),
            Some(Ok(headers)) => headers,
        };

        // Each header is terminated by a UNIX newline.
        Self::require_termination(slice, stream.byte_offset())?;

        Ok((headers, stream.byte_offset() + 1))
    }

    fn parse_items(slice: &[u8], mut offset: usize) -> Result<Vec<EnvelopeItem>, EnvelopeError> {
        let mut items = Vec::new();

        while offset < slice.len() {
            let bytes = slice
                .get(offset..)
                .ok_or(EnvelopeError::MissingItemHeader)?;
            let (item, item_size) = Self::parse_item(bytes)?;
            offset += item_size;
            items.push(item);
        }

        Ok(items)
    }

    fn parse_item(slice: &[u8]) -> Result<(EnvelopeItem, usize), EnvelopeError> {
        let mut stream = serde_json::Deserializer::from_slice(slice).into_iter();

        let header: EnvelopeItemHeader = match stream.next() {
            None => return Err(EnvelopeError::UnexpectedEof),
            Some(Err(error)) => return Err(EnvelopeError::InvalidItemHeader(error)),
            Some(Ok(header)) => header,
        };

        // Each header is terminated by a UNIX newline.
        let header_end = stream.byte_offset();
        Self::require_termination(slice, header_end)?;

        // The last header does not require a trailing newline, so `payload_start` may point
        // past the end of the buffer.
        let payload_start = std::cmp::min(header_end + 1, slice.len());
        let payload_end = match header.length {
            Some(len) => {
                let payload_end = payload_start + len;
                if slice.len() < payload_end {
                    return Err(EnvelopeError::UnexpectedEof);
                }

                // Each payload is terminated by a UNIX newline.
                Self::require_termination(slice, payload_end)?;
                payload_end
            }
            None => match slice.get(payload_start..) {
                Some(range) => match range.iter().position(|&b| b == b'\n') {
                    Some(relative_end) => payload_start + relative_end,
                    None => slice.len(),
                },
                None => slice.len(),
            },
        };

        let payload = slice
            .get(payload_start..payload_end)
            .ok_or(EnvelopeError::UnexpectedEof)?;

        let item = match header.r#type {
            EnvelopeItemType::Event => serde_json::from_slice(payload).map(EnvelopeItem::Event),
            EnvelopeItemType::Transaction => {
                serde_json::from_slice(payload).map(EnvelopeItem::Transaction)
            }
            EnvelopeItemType::SessionUpdate => {
                serde_json::from_slice(payload).map(EnvelopeItem::SessionUpdate)
            }
            EnvelopeItemType::SessionAggregates => {
                serde_json::from_slice(payload).map(EnvelopeItem::SessionAggregates)
            }
            EnvelopeItemType::Span => serde_json::from_slice(payload).map(EnvelopeItem::Span),
            EnvelopeItemType::Logs => serde_json::from_slice(payload)
                .map(|logs: LogsPayload<Vec<Log>>| EnvelopeItem::Logs(logs.items)),
            EnvelopeItemType::Feedback => {
                serde_json::from_slice(payload).map(EnvelopeItem::Feedback)
            }
            EnvelopeItemType::ClientReport => {
                serde_json::from_slice(payload).map(EnvelopeItem::ClientReport)
            }
        }
        .map_err(EnvelopeError::InvalidItemPayload)?;

        Ok((item, payload_end + 1))
    }

    fn require_termination(slice: &[u8], offset: usize) -> Result<(), EnvelopeError> {
        match slice.get(offset) {
            Some(&b'\n') | None => Ok(()),
            Some(_) => Err(EnvelopeError::MissingNewline),
        }
    }
}

impl<T> From<T> for Envelope
where
    T: Into<EnvelopeItem>,
{
    fn from(item: T) -> Self {
        let mut envelope = Self::default();
        envelope.add_item(item.into());
        envelope
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;
    use std::time::{Duration, SystemTime};

    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    use super::*;
    use crate::protocol::v7::{
        DiscardReason, DiscardedEvent, FeedbackContext, Level, LogLevel, SessionAttributes,
        SessionStatus,
    };

    fn to_str(envelope: Envelope) -> String {
        let mut vec = Vec::new();
        envelope.to_writer(&mut vec).unwrap();
        String::from_utf8_lossy(&vec).to_string()
    }

    fn timestamp(s: &str) -> SystemTime {
        let dt = OffsetDateTime::parse(s, &Rfc3339).unwrap();
        let secs = dt.unix_timestamp() as u64;
        let nanos = dt.nanosecond();
        let duration = Duration::new(secs, nanos);
        SystemTime::UNIX_EPOCH.checked_add(duration).unwrap()
    }

    fn session() -> SessionUpdate<'static> {
        SessionUpdate {
            session_id: Uuid::parse_str("22d00b3f-d1b1-4b5d-8d20-49d138cd8a9c").unwrap(),
            distinct_id: Some("foo@bar.baz".to_owned()),
            sequence: None,
            timestamp: None,
            started: timestamp("2020-07-20T14:51:14.296Z"),
            init: true,
            duration: Some(1.234),
            status: SessionStatus::Ok,
            errors: 123,
            attributes: SessionAttributes {
                release: "foo-bar@1.2.3".into(),
                environment: Some("production".into()),
                ip_address: None,
                user_agent: None,
            },
        }
    }

    #[test]
    fn test_empty() {
        assert_eq!(to_str(Envelope::new()), "{}\n");
    }

    #[test]
    fn raw_roundtrip() {
        let buf = r#"{"event_id":"22d00b3f-d1b1-4b5d-8d20-49d138cd8a9c"}
{"type":"event","length":74}
{"event_id":"22d00b3fd1b14b5d8d2049d138cd8a9c","timestamp":1595256674.296}
"#;
        let envelope = Envelope::from_bytes_raw(buf.to_string().into_bytes()).unwrap();
        let serialized = to_str(envelope);
        assert_eq!(&serialized, buf);

        let random_invalid_bytes = b"oh stahp!\0\x01\x02";
        let envelope = Envelope::from_bytes_raw(random_invalid_bytes.to_vec()).unwrap();
        let mut serialized = Vec::new();
        envelope.to_writer(&mut serialized).unwrap();
        assert_eq!(&serialized, random_invalid_bytes);
    }

    #[test]
    fn test_event() {
        let event_id = Uuid::parse_str("22d00b3f-d1b1-4b5d-8d20-49d138cd8a9c").unwrap();
        let timestamp = timestamp("2020-07-20T14:51:14.296Z");
        let event = Event {
            event_id,
            timestamp,
            ..Default::default()
        };
        let envelope: Envelope = event.into();
        assert_eq!(
            to_str(envelope),
            r#"{"event_id":"22d00b3f-d1b1-4b5d-8d20-49d138cd8a9c"}
{"type":"event","length":74}
{"event_id":"22d00b3fd1b14b5d8d2049d138cd8a9c","timestamp":1595256674.296}
"#
        )
    }

    #[test]
    fn test_session() {
        let mut envelope = Envelope::new();
        envelope.add_item(session());
        assert_eq!(
            to_str(envelope),
            r#"{}
{"type":"session","length":222}
{"sid":"22d00b3f-d1b1-4b5d-8d20-49d138cd8a9c","did":"foo@bar.baz","started":"2020-07-20T14:51:14.296Z","init":true,"duration":1.234,"status":"ok","errors":123,"attrs":{"release":"foo-bar@1.2.3","environment":"production"}}
"#
        )
    }

    #[test]
    fn test_transaction_with_trace_header() {
        let event_id = Uuid::parse_str("22d00b3f-d1b1-4b5d-8d20-49d138cd8a9c").unwrap();
        let span_id = "d42cee9fc3e74f5c".parse().unwrap();
        let trace_id = "335e53d614474acc9f89e632b776cc28".parse().unwrap();
        let start_timestamp = timestamp("2020-07-20T14:51:14.296Z");
        let spans = vec![Span {
            span_id,
            trace_id,
            start_timestamp,
            ..Default::default()
        }];
        let transaction = Transaction {
            event_id,
            start_timestamp,
            spans,
            ..Default::default()
        };
        let mut envelope: Envelope = transaction.into();
        let mut dsc = DynamicSamplingContext::new();
        dsc.set("trace_id", "335e53d614474acc9f89e632b776cc28");
        dsc.set("public_key", "public");
        dsc.set("sampled", "true");
        envelope.set_trace(dsc);
        assert_eq!(
            to_str(envelope),
            r#"{"event_id":"22d00b3f-d1b1-4b5d-8d20-49d138cd8a9c","trace":{"trace_id":"335e53d614474acc9f89e632b776cc28","public_key":"public","sampled":"true"}}
{"type":"transaction","length":200}
{"event_id":"22d00b3fd1b14b5d8d2049d138cd8a9c","start_timestamp":1595256674.296,"spans":[{"span_id":"d42cee9fc3e74f5c","trace_id":"335e53d614474acc9f89e632b776cc28","start_timestamp":1595256674.296}]}
"#
        )
    }

    #[test]
    fn test_logs_container() {
        let log = Log {
            level: LogLevel::Info,
            body: "hello".into(),
            trace_id: None,
            timestamp: timestamp("2020-07-20T14:51:14.296Z"),
            severity_number: None,
            attributes: Default::default(),
        };
        let envelope: Envelope = vec![log.clone(), log].into();
        assert_eq!(
            to_str(envelope),
            r#"{}
{"type":"log","length":129,"item_count":2,"content_type":"application/vnd.sentry.items.log+json"}
{"items":[{"level":"info","body":"hello","timestamp":1595256674.296},{"level":"info","body":"hello","timestamp":1595256674.296}]}
"#
        );
    }

    #[test]
    fn test_sent_at() {
        let mut envelope = Envelope::new();
        envelope.set_sent_at(timestamp("2020-07-20T14:51:14.296Z"));
        assert_eq!(to_str(envelope), "{\"sent_at\":\"2020-07-20T14:51:14.296Z\"}\n");
    }

    #[test]
    fn test_feedback_sets_event_id() {
        let feedback = Feedback::new(FeedbackContext {
            message: "hi".into(),
            ..Default::default()
        });
        let event_id = feedback.event_id;
        let envelope: Envelope = feedback.into();
        assert_eq!(envelope.uuid(), Some(&event_id));
    }

    #[test]
    fn test_filter() {
        let mut envelope = Envelope::new();
        envelope.add_item(Event::new());
        envelope.add_item(session());
        let mut dsc = DynamicSamplingContext::new();
        dsc.set("release", "1.0");
        envelope.set_trace(dsc.clone());

        let filtered = envelope
            .clone()
            .filter(|item| !matches!(item, EnvelopeItem::Event(_)))
            .unwrap();
        assert_eq!(filtered.items().count(), 1);
        assert_eq!(filtered.uuid(), None);
        assert_eq!(filtered.headers().trace, Some(dsc));

        assert!(envelope.filter(|_| false).is_none());
    }

    #[test]
    fn test_data_categories() {
        assert_eq!(
            EnvelopeItem::from(Event::new()).data_category(),
            Some(DataCategory::Error)
        );
        assert_eq!(
            EnvelopeItem::from(session()).data_category(),
            Some(DataCategory::Session)
        );
        let report = ClientReport::new(vec![DiscardedEvent {
            reason: DiscardReason::QueueOverflow,
            category: DataCategory::Error,
            quantity: 1,
        }]);
        assert_eq!(EnvelopeItem::from(report).data_category(), None);
        assert_eq!(EnvelopeItem::Logs(vec![]).quantity(), 0);
    }

    #[test]
    fn test_deserialize_envelope_empty() {
        // Without terminating newline after header
        let bytes = b"{\"event_id\":\"9ec79c33ec9942ab8353589fcb2e04dc\"}";
        let envelope = Envelope::from_slice(bytes).unwrap();

        let event_id = Uuid::from_str("9ec79c33ec9942ab8353589fcb2e04dc").unwrap();
        assert_eq!(envelope.uuid(), Some(&event_id));
        assert_eq!(envelope.items().count(), 0);
    }

    #[test]
    fn test_deserialize_envelope_implicit_length() {
        let bytes = b"\
             {}\n\
             {\"type\":\"event\"}\n\
             {\"message\":\"hello world\",\"level\":\"warning\"}\n\
             {\"type\":\"event\"}\n\
             {\"message\":\"second\"}\
             ";

        let envelope = Envelope::from_slice(bytes).unwrap();
        assert_eq!(envelope.items().count(), 2);

        let mut items = envelope.items();
        if let Some(EnvelopeItem::Event(event)) = items.next() {
            assert_eq!(event.message.as_deref(), Some("hello world"));
            assert_eq!(event.level, Level::Warning);
        } else {
            panic!("invalid item type");
        }
        if let Some(EnvelopeItem::Event(event)) = items.next() {
            assert_eq!(event.message.as_deref(), Some("second"));
        } else {
            panic!("invalid item type");
        }
    }

    #[test]
    fn test_deserialize_envelope_errors() {
        assert!(matches!(
            Envelope::from_slice(b""),
            Err(EnvelopeError::MissingHeader)
        ));
        assert!(matches!(
            Envelope::from_slice(b"{} {\"type\":\"event\"}"),
            Err(EnvelopeError::MissingNewline)
        ));
        assert!(matches!(
            Envelope::from_slice(b"{}\n{\"type\":\"event\",\"length\":2}\n{}x"),
            Err(EnvelopeError::MissingNewline)
        ));
        assert!(matches!(
            Envelope::from_slice(b"{}\n{\"type\":\"event\",\"length\":20}\n{}\n"),
            Err(EnvelopeError::UnexpectedEof)
        ));
        assert!(matches!(
            Envelope::from_slice(b"{}\n{\"type\":\"bogus\"}\n{}\n"),
            Err(EnvelopeError::InvalidItemHeader(_))
        ));
        assert!(matches!(
            Envelope::from_slice(b"{}\n{\"type\":\"session\"}\n[]\n"),
            Err(EnvelopeError::InvalidItemPayload(_))
        ));
    }

    // Test all possible item types in a single envelope
    #[test]
    fn test_deserialize_serialized() {
        let event = Event {
            event_id: Uuid::parse_str("22d00b3f-d1b1-4b5d-8d20-49d138cd8a9c").unwrap(),
            timestamp: timestamp("2020-07-20T14:51:14.296Z"),
            ..Default::default()
        };

        let transaction = Transaction {
            event_id: Uuid::parse_str("22d00b3f-d1b1-4b5d-8d20-49d138cd8a9d").unwrap(),
            start_timestamp: timestamp("2020-07-20T14:51:14.296Z"),
            spans: vec![Span {
                span_id: "d42cee9fc3e74f5c".parse().unwrap(),
                trace_id: "335e53d614474acc9f89e632b776cc28".parse().unwrap(),
                start_timestamp: timestamp("2020-07-20T14:51:14.296Z"),
                ..Default::default()
            }],
            ..Default::default()
        };

        let mut feedback = Feedback::new(FeedbackContext {
            message: "hi".into(),
            ..Default::default()
        });
        feedback.timestamp = timestamp("2020-07-20T14:51:14.296Z");

        let report = ClientReport {
            timestamp: timestamp("2020-07-20T14:51:14.296Z"),
            discarded_events: vec![DiscardedEvent {
                reason: DiscardReason::SampleRate,
                category: DataCategory::Transaction,
                quantity: 3,
            }],
        };

        let mut envelope: Envelope = Envelope::new();
        envelope.add_item(event);
        envelope.add_item(transaction);
        envelope.add_item(session());
        envelope.add_item(feedback);
        envelope.add_item(report);
        envelope.set_sent_at(timestamp("2020-07-20T14:51:15Z"));

        let serialized = to_str(envelope);
        let deserialized = Envelope::from_slice(serialized.as_bytes()).unwrap();
        assert_eq!(deserialized.items().count(), 5);
        assert_eq!(serialized, to_str(deserialized))
    }
}
