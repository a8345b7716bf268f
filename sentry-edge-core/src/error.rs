use std::error::Error;
use std::fmt;

use crate::protocol::{Event, Exception, Level, Mechanism};
use crate::types::Uuid;
use crate::utils::parse_type_from_debug;
use crate::Hub;

/// The default number of linked errors added to an event.
pub const DEFAULT_MAX_LINKED_ERRORS: usize = 5;

/// The mechanism type used when the capture site does not provide one.
pub const GENERIC_MECHANISM: &str = "generic";

/// An error that groups several independent errors.
///
/// When captured, every grouped error becomes its own exception linked to
/// this one through `errors[i]`, and this exception is marked as an
/// exception group.
///
/// # Examples
///
/// ```
/// use sentry_edge_core::{event_from_error, AggregateError};
///
/// let err = AggregateError::new(
///     "2 uploads failed",
///     vec![
///         "x".parse::<u8>().unwrap_err().into(),
///         "y".parse::<u8>().unwrap_err().into(),
///     ],
/// );
/// let event = event_from_error(&err);
/// assert_eq!(event.exception.len(), 3);
/// assert_eq!(event.exception[2].ty, "AggregateError");
/// ```
#[derive(Debug)]
pub struct AggregateError {
    message: String,
    errors: Vec<Box<dyn Error + Send + Sync + 'static>>,
}

impl AggregateError {
    /// Creates a new group of errors.
    pub fn new<M: Into<String>>(
        message: M,
        errors: Vec<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        AggregateError {
            message: message.into(),
            errors,
        }
    }

    /// The grouped errors.
    pub fn errors(&self) -> impl Iterator<Item = &(dyn Error + 'static)> {
        self.errors.iter().map(|err| &**err as &(dyn Error + 'static))
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for AggregateError {}

impl Hub {
    /// Capture any `std::error::Error`.
    ///
    /// See the global [`capture_error`] for more documentation.
    pub fn capture_error(&self, error: &(dyn Error + 'static)) -> Uuid {
        self.capture_error_with_mechanism(
            error,
            Mechanism {
                ty: GENERIC_MECHANISM.into(),
                handled: Some(true),
                ..Default::default()
            },
        )
    }

    /// Captures an error with the given mechanism on its root exception.
    ///
    /// Instrumentation uses this to mark errors it observed on their way
    /// back to the caller, e.g. with `{type: "auto.http.server", handled: false}`.
    pub fn capture_error_with_mechanism(
        &self,
        error: &(dyn Error + 'static),
        mechanism: Mechanism,
    ) -> Uuid {
        let Some(client) = self.client() else {
            return Uuid::nil();
        };
        let max_linked_errors = client.options().max_linked_errors;
        let event = event_from_error_with_mechanism(error, mechanism, max_linked_errors);
        self.capture_event(event)
    }
}

/// Captures a `std::error::Error`.
///
/// Creates an event from the given error and sends it to the main hub.
/// The chain of `source()` errors and the members of an [`AggregateError`]
/// are captured as linked exceptions.
///
/// # Examples
/// ```
/// sentry_edge::capture_error(&std::io::Error::last_os_error());
/// ```
pub fn capture_error(error: &(dyn Error + 'static)) -> Uuid {
    Hub::main().capture_error(error)
}

/// Create a sentry `Event` from a `std::error::Error`.
///
/// A chain of errors will be resolved as well, and sorted oldest to newest, as
/// described on <https://develop.sentry.dev/sdk/event-payloads/exception/>.
///
/// # Examples
///
/// ```
/// use thiserror::Error;
///
/// #[derive(Debug, Error)]
/// #[error("inner")]
/// struct InnerError;
///
/// #[derive(Debug, Error)]
/// #[error("outer")]
/// struct OuterError(#[from] InnerError);
///
/// let event = sentry_edge_core::event_from_error(&OuterError(InnerError));
/// assert_eq!(event.level, sentry_edge_core::protocol::Level::Error);
/// assert_eq!(event.exception.len(), 2);
/// assert_eq!(&event.exception[0].ty, "InnerError");
/// assert_eq!(event.exception[0].value, Some("inner".into()));
/// assert_eq!(&event.exception[1].ty, "OuterError");
/// assert_eq!(event.exception[1].value, Some("outer".into()));
/// ```
pub fn event_from_error(err: &(dyn Error + 'static)) -> Event<'static> {
    event_from_error_with_mechanism(
        err,
        Mechanism {
            ty: GENERIC_MECHANISM.into(),
            handled: Some(true),
            ..Default::default()
        },
        DEFAULT_MAX_LINKED_ERRORS,
    )
}

/// Create a sentry `Event` from an error, using `mechanism` for the root
/// exception and adding at most `max_linked_errors` linked exceptions.
///
/// Every exception gets an `exception_id`, the root being `0`.  Linked
/// exceptions point to the exception they were reached from with
/// `parent_id`.  The root exception comes last.
pub fn event_from_error_with_mechanism(
    err: &(dyn Error + 'static),
    mut mechanism: Mechanism,
    max_linked_errors: usize,
) -> Event<'static> {
    if mechanism.ty.is_empty() {
        mechanism.ty = GENERIC_MECHANISM.into();
    }
    mechanism.exception_id = Some(0);

    let mut root = exception_from_error(err);
    root.mechanism = Some(mechanism);

    let mut exceptions = vec![root];
    collect_linked(err, 0, &mut exceptions, max_linked_errors);

    exceptions.reverse();
    Event {
        exception: exceptions.into(),
        level: Level::Error,
        ..Default::default()
    }
}

fn collect_linked(
    err: &(dyn Error + 'static),
    parent_id: u32,
    exceptions: &mut Vec<Exception>,
    limit: usize,
) {
    if let Some(aggregate) = err.downcast_ref::<AggregateError>() {
        let mut any_child = false;
        for (i, child) in aggregate.errors().enumerate() {
            if exceptions.len() > limit {
                break;
            }
            any_child = true;
            let id = push_linked(child, parent_id, format!("errors[{i}]"), exceptions);
            collect_linked(child, id, exceptions, limit);
        }
        if any_child {
            if let Some(mechanism) = exceptions
                .iter_mut()
                .find(|exc| exc.mechanism.as_ref().and_then(|m| m.exception_id) == Some(parent_id))
                .and_then(|exc| exc.mechanism.as_mut())
            {
                mechanism.is_exception_group = Some(true);
            }
        }
    }

    if let Some(source) = err.source() {
        if exceptions.len() > limit {
            return;
        }
        let id = push_linked(source, parent_id, "source".into(), exceptions);
        collect_linked(source, id, exceptions, limit);
    }
}

fn push_linked(
    err: &(dyn Error + 'static),
    parent_id: u32,
    source: String,
    exceptions: &mut Vec<Exception>,
) -> u32 {
    let exception_id = u32::try_from(exceptions.len()).unwrap_or(u32::MAX);
    let mut exception = exception_from_error(err);
    exception.mechanism = Some(Mechanism {
        ty: "chained".into(),
        source: Some(source),
        exception_id: Some(exception_id),
        parent_id: Some(parent_id),
        ..Default::default()
    });
    exceptions.push(exception);
    exception_id
}

fn exception_from_error(err: &(dyn Error + 'static)) -> Exception {
    Exception {
        ty: parse_type_from_debug(err),
        value: Some(err.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("level {0}")]
    struct Nested(u32, #[source] Option<Box<Nested>>);

    fn nested(depth: u32) -> Nested {
        (0..depth).fold(Nested(0, None), |inner, i| Nested(i + 1, Some(Box::new(inner))))
    }

    fn mechanism(exc: &Exception) -> &Mechanism {
        exc.mechanism.as_ref().unwrap()
    }

    #[test]
    fn test_single_error() {
        let err = "NaN".parse::<usize>().unwrap_err();
        let event = event_from_error(&err);
        assert_eq!(event.exception.len(), 1);

        let root = &event.exception[0];
        assert_eq!(root.ty, "ParseIntError");
        assert_eq!(mechanism(root).ty, "generic");
        assert_eq!(mechanism(root).handled, Some(true));
        assert_eq!(mechanism(root).exception_id, Some(0));
        assert_eq!(mechanism(root).parent_id, None);
    }

    #[test]
    fn test_source_chain() {
        let event = event_from_error(&nested(2));
        let values: Vec<_> = event.exception.iter().map(|e| e.value.as_deref()).collect();
        assert_eq!(values, [Some("level 0"), Some("level 1"), Some("level 2")]);

        // oldest first, the root is last
        let ids: Vec<_> = event
            .exception
            .iter()
            .map(|e| (mechanism(e).exception_id, mechanism(e).parent_id))
            .collect();
        assert_eq!(ids, [(Some(2), Some(1)), (Some(1), Some(0)), (Some(0), None)]);

        let linked = mechanism(&event.exception[0]);
        assert_eq!(linked.ty, "chained");
        assert_eq!(linked.source.as_deref(), Some("source"));
    }

    #[test]
    fn test_linked_error_limit() {
        let event = event_from_error_with_mechanism(&nested(10), Mechanism::default(), 3);
        assert_eq!(event.exception.len(), 4);
        assert_eq!(event.exception[3].value.as_deref(), Some("level 10"));

        let event = event_from_error_with_mechanism(&nested(10), Mechanism::default(), 0);
        assert_eq!(event.exception.len(), 1);
    }

    #[test]
    fn test_aggregate_error() {
        let err = AggregateError::new(
            "two failures",
            vec![Box::new(nested(1)), "x".parse::<u8>().unwrap_err().into()],
        );
        let event = event_from_error(&err);

        // root, first child, its source, second child
        assert_eq!(event.exception.len(), 4);
        let by_id = |id: u32| {
            event
                .exception
                .iter()
                .find(|e| mechanism(e).exception_id == Some(id))
                .unwrap()
        };

        let root = by_id(0);
        assert_eq!(root.ty, "AggregateError");
        assert_eq!(mechanism(root).is_exception_group, Some(true));

        let first = by_id(1);
        assert_eq!(first.value.as_deref(), Some("level 1"));
        assert_eq!(mechanism(first).source.as_deref(), Some("errors[0]"));
        assert_eq!(mechanism(first).parent_id, Some(0));

        let first_source = by_id(2);
        assert_eq!(first_source.value.as_deref(), Some("level 0"));
        assert_eq!(mechanism(first_source).source.as_deref(), Some("source"));
        assert_eq!(mechanism(first_source).parent_id, Some(1));

        let second = by_id(3);
        assert_eq!(second.ty, "ParseIntError");
        assert_eq!(mechanism(second).source.as_deref(), Some("errors[1]"));
        assert_eq!(mechanism(second).parent_id, Some(0));

        assert_eq!(event.exception.last().map(|e| e.ty.as_str()), Some("AggregateError"));
    }

    #[test]
    fn test_custom_mechanism() {
        let err = "NaN".parse::<usize>().unwrap_err();
        let event = event_from_error_with_mechanism(
            &err,
            Mechanism {
                ty: "auto.http.client.fetch".into(),
                handled: Some(false),
                ..Default::default()
            },
            DEFAULT_MAX_LINKED_ERRORS,
        );
        assert_eq!(mechanism(&event.exception[0]).ty, "auto.http.client.fetch");
        assert!(event.is_unhandled());
    }
}
