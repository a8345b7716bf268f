//! Trace propagation headers.
//!
//! Three headers carry a trace across service boundaries:
//!
//! - `sentry-trace`: `{trace_id}-{span_id}-{sampled}`
//! - `baggage`: W3C baggage whose `sentry-` prefixed members form the
//!   dynamic sampling context
//! - `traceparent`: the W3C trace context header

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::v7::{SpanId, TraceId};

/// The name of the Sentry trace header.
pub const SENTRY_TRACE_HEADER: &str = "sentry-trace";
/// The name of the W3C baggage header.
pub const BAGGAGE_HEADER: &str = "baggage";
/// The name of the W3C trace context header.
pub const TRACEPARENT_HEADER: &str = "traceparent";

const SENTRY_BAGGAGE_PREFIX: &str = "sentry-";
const MAX_BAGGAGE_LENGTH: usize = 8192;

/// Raised if a `sentry-trace` header cannot be parsed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseSentryTraceError {
    /// The trace id is not 32 hex characters.
    #[error("invalid trace id")]
    InvalidTraceId,
    /// The span id is not 16 hex characters.
    #[error("invalid span id")]
    InvalidSpanId,
    /// The sampled flag is neither `0` nor `1`.
    #[error("invalid sampled flag")]
    InvalidSampled,
}

/// Raised if a `traceparent` header cannot be parsed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseTraceParentError {
    /// The header does not have four dash separated parts.
    #[error("malformed traceparent header")]
    Malformed,
    /// The version is not supported.
    #[error("unsupported traceparent version")]
    UnsupportedVersion,
    /// The trace id is invalid or all zeroes.
    #[error("invalid trace id")]
    InvalidTraceId,
    /// The parent id is invalid or all zeroes.
    #[error("invalid parent id")]
    InvalidParentId,
    /// The flags are not two hex characters.
    #[error("invalid trace flags")]
    InvalidFlags,
}

fn parse_hex_id<T: FromStr>(value: &str, len: usize) -> Option<T> {
    if value.len() != len || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    value.parse().ok()
}

/// The parsed `sentry-trace` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentryTrace {
    trace_id: TraceId,
    span_id: SpanId,
    sampled: Option<bool>,
}

impl SentryTrace {
    /// Creates a new trace header.
    pub fn new(trace_id: TraceId, span_id: SpanId, sampled: Option<bool>) -> Self {
        SentryTrace {
            trace_id,
            span_id,
            sampled,
        }
    }

    /// The trace this header belongs to.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The span that emitted this header, which becomes the parent of the receiving side.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// The upstream sampling decision, if one was made.
    pub fn sampled(&self) -> Option<bool> {
        self.sampled
    }
}

impl FromStr for SentryTrace {
    type Err = ParseSentryTraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, '-');

        let trace_id = parts
            .next()
            .and_then(|id| parse_hex_id(id, 32))
            .ok_or(ParseSentryTraceError::InvalidTraceId)?;
        let span_id = parts
            .next()
            .and_then(|id| parse_hex_id(id, 16))
            .ok_or(ParseSentryTraceError::InvalidSpanId)?;
        let sampled = match parts.next() {
            None | Some("") => None,
            Some("1") => Some(true),
            Some("0") => Some(false),
            Some(_) => return Err(ParseSentryTraceError::InvalidSampled),
        };

        Ok(SentryTrace::new(trace_id, span_id, sampled))
    }
}

impl fmt::Display for SentryTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.trace_id, self.span_id)?;
        match self.sampled {
            Some(true) => f.write_str("-1"),
            Some(false) => f.write_str("-0"),
            None => Ok(()),
        }
    }
}

/// The parsed W3C `traceparent` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceParent {
    trace_id: TraceId,
    parent_id: SpanId,
    sampled: bool,
}

impl TraceParent {
    /// Creates a new `traceparent` header of version `00`.
    pub fn new(trace_id: TraceId, parent_id: SpanId, sampled: bool) -> Self {
        TraceParent {
            trace_id,
            parent_id,
            sampled,
        }
    }

    /// The trace this header belongs to.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The id of the calling span.
    pub fn parent_id(&self) -> SpanId {
        self.parent_id
    }

    /// Whether the `sampled` trace flag is set.
    pub fn sampled(&self) -> bool {
        self.sampled
    }
}

impl FromStr for TraceParent {
    type Err = ParseTraceParentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('-').collect();
        let [version, trace_id, parent_id, flags, ..] = parts[..] else {
            return Err(ParseTraceParentError::Malformed);
        };

        if version.len() != 2 || version.eq_ignore_ascii_case("ff") {
            return Err(ParseTraceParentError::UnsupportedVersion);
        }
        if version == "00" && parts.len() != 4 {
            return Err(ParseTraceParentError::Malformed);
        }

        let trace_id: TraceId =
            parse_hex_id(trace_id, 32).ok_or(ParseTraceParentError::InvalidTraceId)?;
        if trace_id.as_bytes().iter().all(|b| *b == 0) {
            return Err(ParseTraceParentError::InvalidTraceId);
        }
        let parent_id: SpanId =
            parse_hex_id(parent_id, 16).ok_or(ParseTraceParentError::InvalidParentId)?;
        if parent_id.as_bytes().iter().all(|b| *b == 0) {
            return Err(ParseTraceParentError::InvalidParentId);
        }
        if flags.len() != 2 {
            return Err(ParseTraceParentError::InvalidFlags);
        }
        let flags =
            u8::from_str_radix(flags, 16).map_err(|_| ParseTraceParentError::InvalidFlags)?;

        Ok(TraceParent::new(trace_id, parent_id, flags & 0x01 == 0x01))
    }
}

impl fmt::Display for TraceParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "00-{}-{}-{}",
            self.trace_id,
            self.parent_id,
            if self.sampled { "01" } else { "00" }
        )
    }
}

/// The dynamic sampling context (DSC).
///
/// This is the `sentry-` prefixed part of the `baggage` header and the
/// `trace` object in envelope headers. Values are kept as the strings they
/// were received as, so that an incoming context is forwarded unmodified.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicSamplingContext {
    /// The trace id, as 32 hex characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// The public key of the DSN of the head of the trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// The release of the head of the trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    /// The environment of the head of the trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// The transaction name, if it is not a raw URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// The sample rate the head of the trace was sampled with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<String>,
    /// The sampling decision of the head of the trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampled: Option<String>,
    /// The random value in `[0, 1)` every sampling decision of this trace is compared against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rand: Option<String>,
    /// The organization id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Any other `sentry-` keys, forwarded as they are.
    #[serde(flatten)]
    pub other: BTreeMap<String, String>,
}

impl DynamicSamplingContext {
    /// Creates an empty sampling context.
    pub fn new() -> Self {
        Default::default()
    }

    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        Some(match key {
            "trace_id" => &mut self.trace_id,
            "public_key" => &mut self.public_key,
            "release" => &mut self.release,
            "environment" => &mut self.environment,
            "transaction" => &mut self.transaction,
            "sample_rate" => &mut self.sample_rate,
            "sampled" => &mut self.sampled,
            "sample_rand" => &mut self.sample_rand,
            "org_id" => &mut self.org_id,
            _ => return None,
        })
    }

    /// Sets a value by its key without the `sentry-` prefix.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.slot(key) {
            Some(slot) => *slot = Some(value),
            None => {
                self.other.insert(key.to_owned(), value);
            }
        }
    }

    /// Returns a value by its key without the `sentry-` prefix.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Iterates over all present keys (without the `sentry-` prefix) and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let known = [
            ("trace_id", &self.trace_id),
            ("public_key", &self.public_key),
            ("release", &self.release),
            ("environment", &self.environment),
            ("transaction", &self.transaction),
            ("sample_rate", &self.sample_rate),
            ("sampled", &self.sampled),
            ("sample_rand", &self.sample_rand),
            ("org_id", &self.org_id),
        ];
        known
            .into_iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k, v)))
            .chain(self.other.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Returns `true` if no key is set.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// The upstream sampling decision as a boolean.
    pub fn sampled_flag(&self) -> Option<bool> {
        match self.sampled.as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        }
    }

    /// The sample random value, if it is a valid number in `[0, 1)`.
    pub fn sample_rand_value(&self) -> Option<f64> {
        self.sample_rand
            .as_deref()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| (0.0..1.0).contains(v))
    }
}

/// A parsed W3C `baggage` header.
///
/// Members with a `sentry-` prefix are decoded into the
/// [`DynamicSamplingContext`]; all other members are kept verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Baggage {
    sentry: DynamicSamplingContext,
    third_party: Vec<String>,
}

impl Baggage {
    /// Creates an empty baggage.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates baggage that carries only the given sampling context.
    pub fn from_dsc(dsc: DynamicSamplingContext) -> Self {
        Baggage {
            sentry: dsc,
            third_party: Vec::new(),
        }
    }

    /// Parses and merges multiple `baggage` header values.
    pub fn parse_all<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut baggage = Baggage::new();
        for value in values {
            baggage.extend_from_header(value);
        }
        baggage
    }

    fn extend_from_header(&mut self, header: &str) {
        for member in header.split(',') {
            let member = member.trim();
            if member.is_empty() {
                continue;
            }
            let Some(key) = member.strip_prefix(SENTRY_BAGGAGE_PREFIX) else {
                self.third_party.push(member.to_owned());
                continue;
            };
            let Some((key, value)) = key.split_once('=') else {
                continue;
            };
            // member properties (`;prop=value`) carry no meaning for sentry keys
            let value = value.split(';').next().unwrap_or_default().trim();
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_owned());
            self.sentry.set(key.trim(), value);
        }
    }

    /// The sampling context carried in this baggage.
    pub fn dynamic_sampling_context(&self) -> &DynamicSamplingContext {
        &self.sentry
    }

    /// Consumes the baggage and returns the sampling context, if any.
    pub fn into_dynamic_sampling_context(self) -> Option<DynamicSamplingContext> {
        if self.sentry.is_empty() {
            None
        } else {
            Some(self.sentry)
        }
    }

    /// Replaces all `sentry-` members, keeping third party members.
    pub fn set_dynamic_sampling_context(&mut self, dsc: DynamicSamplingContext) {
        self.sentry = dsc;
    }

    /// The members not owned by sentry.
    pub fn third_party_members(&self) -> &[String] {
        &self.third_party
    }

    /// Returns `true` if there are no members at all.
    pub fn is_empty(&self) -> bool {
        self.sentry.is_empty() && self.third_party.is_empty()
    }
}

impl FromStr for Baggage {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Baggage::parse_all([s]))
    }
}

impl fmt::Display for Baggage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sentry = self.sentry.iter().map(|(key, value)| {
            format!(
                "{SENTRY_BAGGAGE_PREFIX}{key}={}",
                urlencoding::encode(value)
            )
        });

        let mut len = 0;
        for member in sentry.chain(self.third_party.iter().cloned()) {
            let separator = usize::from(len > 0);
            // members that would push the header over the limit are dropped
            if len + separator + member.len() > MAX_BAGGAGE_LENGTH {
                continue;
            }
            if separator > 0 {
                f.write_str(",")?;
            }
            f.write_str(&member)?;
            len += separator + member.len();
        }
        Ok(())
    }
}
