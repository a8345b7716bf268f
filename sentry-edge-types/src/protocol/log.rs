use std::time::SystemTime;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::v7::{Map, TraceId, Value};
use crate::utils::ts_seconds_float;

/// An error used when parsing `LogLevel`.
#[derive(Debug, Error)]
#[error("invalid log level")]
pub struct ParseLogLevelError;

/// The severity of a structured log.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Very fine grained tracing output.
    Trace,
    /// Debug output.
    Debug,
    /// Informational output.
    Info,
    /// A warning.
    Warn,
    /// An error.
    Error,
    /// A fatal error.
    Fatal,
}

impl_str_names!(LogLevel, ParseLogLevelError, {
    Trace => "trace",
    Debug => "debug",
    Info => "info",
    Warn => "warn",
    Error => "error",
    Fatal => "fatal",
});
impl_str_serde!(LogLevel);

impl LogLevel {
    /// The lowest OpenTelemetry severity number of this level.
    pub fn severity_number(self) -> i32 {
        match self {
            LogLevel::Trace => 1,
            LogLevel::Debug => 5,
            LogLevel::Info => 9,
            LogLevel::Warn => 13,
            LogLevel::Error => 17,
            LogLevel::Fatal => 21,
        }
    }
}

/// A typed log attribute value.
///
/// Serialized as `{"value": ..., "type": "string" | "integer" | "double" | "boolean"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogAttribute(pub Value);

macro_rules! attribute_from {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for LogAttribute {
                fn from(value: $ty) -> Self {
                    LogAttribute(Value::from(value))
                }
            }
        )+
    };
}

attribute_from!(bool, i32, i64, u32, u64, f64, &str, String, Value);

impl Serialize for LogAttribute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LogAttribute", 2)?;
        match &self.0 {
            Value::Bool(b) => {
                state.serialize_field("value", b)?;
                state.serialize_field("type", "boolean")?;
            }
            Value::Number(n) if n.is_i64() || n.is_u64() => {
                state.serialize_field("value", n)?;
                state.serialize_field("type", "integer")?;
            }
            Value::Number(n) => {
                state.serialize_field("value", n)?;
                state.serialize_field("type", "double")?;
            }
            Value::String(s) => {
                state.serialize_field("value", s)?;
                state.serialize_field("type", "string")?;
            }
            other => {
                state.serialize_field("value", &other.to_string())?;
                state.serialize_field("type", "string")?;
            }
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for LogAttribute {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Typed {
            value: Value,
        }
        Typed::deserialize(deserializer).map(|typed| LogAttribute(typed.value))
    }
}

/// A structured log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Log {
    /// The severity of the log.
    pub level: LogLevel,
    /// The formatted message.
    pub body: String,
    /// The trace the log was emitted in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
    /// When the log was emitted.
    #[serde(with = "ts_seconds_float")]
    pub timestamp: SystemTime,
    /// The OpenTelemetry severity number, derived from `level` if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_number: Option<i32>,
    /// Arbitrary attributes, e.g. `sentry.environment`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, LogAttribute>,
}

/// The content type of a log container item.
pub const LOGS_CONTENT_TYPE: &str = "application/vnd.sentry.items.log+json";
