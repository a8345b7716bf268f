use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::v7::{event, ClientSdkInfo, Context, Map, User};
use crate::utils::ts_seconds_float;

/// The content of a user feedback submission.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FeedbackContext {
    /// What the user wrote.
    pub message: String,
    /// How to reach the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    /// The name of the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The URL the feedback was submitted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// The error event this feedback is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_event_id: Option<Uuid>,
    /// Where the feedback was collected, e.g. `api`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

fn feedback_type() -> String {
    "feedback".to_owned()
}

/// The payload of a `feedback` envelope item.
///
/// This is an event of type `feedback` carrying the submission in
/// `contexts.feedback`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Feedback {
    /// The ID of the feedback event.
    #[serde(default = "event::default_id", serialize_with = "event::serialize_id")]
    pub event_id: Uuid,
    #[serde(rename = "type", default = "feedback_type")]
    ty: String,
    /// When the feedback was submitted.
    #[serde(default = "SystemTime::now", with = "ts_seconds_float")]
    pub timestamp: SystemTime,
    /// A release identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    /// An optional environment identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// The user that submitted the feedback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Tags of the scope the feedback was captured in.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub tags: Map<String, String>,
    /// The feedback itself plus the trace context.
    #[serde(default)]
    pub contexts: Map<String, Context>,
    /// SDK metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk: Option<ClientSdkInfo>,
}

impl Feedback {
    /// Creates a feedback event for the given submission.
    pub fn new(feedback: FeedbackContext) -> Feedback {
        let mut contexts = Map::new();
        contexts.insert("feedback".to_owned(), feedback.into());
        Feedback {
            event_id: event::default_id(),
            ty: feedback_type(),
            timestamp: SystemTime::now(),
            release: None,
            environment: None,
            user: None,
            tags: Map::new(),
            contexts,
            sdk: None,
        }
    }

    /// Returns the submission carried by this event.
    pub fn feedback(&self) -> Option<&FeedbackContext> {
        match self.contexts.get("feedback") {
            Some(Context::Feedback(feedback)) => Some(feedback),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_payload() {
        let event_id = Uuid::parse_str("22d00b3f-d1b1-4b5d-8d20-49d138cd8a9c").unwrap();
        let mut feedback = Feedback::new(FeedbackContext {
            message: "the button is broken".into(),
            contact_email: Some("jane@example.com".into()),
            associated_event_id: Some(event_id),
            ..Default::default()
        });
        feedback.event_id = event_id;
        feedback.timestamp = SystemTime::UNIX_EPOCH;

        assert_eq!(
            serde_json::to_string(&feedback).unwrap(),
            r#"{"event_id":"22d00b3fd1b14b5d8d2049d138cd8a9c","type":"feedback","timestamp":0,"contexts":{"feedback":{"type":"feedback","message":"the button is broken","contact_email":"jane@example.com","associated_event_id":"22d00b3f-d1b1-4b5d-8d20-49d138cd8a9c"}}}"#
        );
        assert_eq!(
            feedback.feedback().map(|f| f.message.as_str()),
            Some("the button is broken")
        );
    }
}
