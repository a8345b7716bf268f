use crate::protocol::{Event, Feedback, Level, SessionStatus};
use crate::types::Uuid;
use crate::{Hub, IntoBreadcrumbs, Scope};

/// Captures an event on the main hub.
///
/// The event must already be assembled.  Typically code would instead use
/// the utility methods like [`capture_error`](crate::capture_error).  The
/// return value is the event ID.  In case Sentry is disabled the return
/// value will be the nil UUID (`Uuid::nil`).
///
/// # Example
///
/// ```
/// use sentry_edge::protocol::{Event, Level};
///
/// sentry_edge::capture_event(Event {
///     message: Some("Hello World!".into()),
///     level: Level::Info,
///     ..Default::default()
/// });
/// ```
pub fn capture_event(event: Event<'static>) -> Uuid {
    Hub::main().capture_event(event)
}

/// Captures an arbitrary message.
///
/// This creates an event from the given message and sends it to the main hub.
pub fn capture_message(msg: &str, level: Level) -> Uuid {
    Hub::main().capture_message(msg, level)
}

/// Sends user feedback through the main hub.
pub fn capture_feedback(feedback: Feedback) {
    Hub::main().capture_feedback(feedback)
}

/// Records a breadcrumb by calling a function.
///
/// The total number of breadcrumbs that can be recorded are limited by the
/// configuration on the client.  This function accepts any object that
/// implements `IntoBreadcrumbs` which is implemented for a varienty of
/// common types.  For efficiency reasons you can also pass a closure returning
/// a breadcrumb in which case the closure is only called if the client is
/// enabled.
///
/// The most common implementations that can be passed:
///
/// * `Breadcrumb`: to record a breadcrumb
/// * `Vec<Breadcrumb>`: to record more than one breadcrumb in one go.
/// * `Option<Breadcrumb>`: to record a breadcrumb or not
/// * additionally all of these can also be returned from an `FnOnce()`
///
/// # Example
///
/// ```
/// use sentry_edge::protocol::{Breadcrumb, Map};
///
/// sentry_edge::add_breadcrumb(|| Breadcrumb {
///     ty: "http".into(),
///     category: Some("request".into()),
///     data: {
///         let mut map = Map::new();
///         map.insert("method".into(), "GET".into());
///         map.insert("url".into(), "https://example.com/".into());
///         map
///     },
///     ..Default::default()
/// });
/// ```
pub fn add_breadcrumb<B: IntoBreadcrumbs>(breadcrumb: B) {
    Hub::main().add_breadcrumb(breadcrumb)
}

/// Records a UI event such as a click, debounced per event type and target.
pub fn add_ui_breadcrumb(event_type: &str, target: &str) {
    Hub::main().add_ui_breadcrumb(event_type, target)
}

/// Records a feature flag evaluation on the main hub.
pub fn add_feature_flag(flag: &str, result: bool) {
    Hub::main().add_feature_flag(flag, result)
}

/// Invokes a function that can modify the current scope of the main hub.
///
/// The function is passed a mutable reference to the `Scope` so that modifications
/// can be performed.  Because there might currently not be a client bound
/// it's possible that the callback might not be called at all.  As a result of this
/// the return value of this closure must have a default that is returned in such
/// cases.
///
/// # Example
///
/// ```
/// sentry_edge::configure_scope(|scope| {
///     scope.set_user(Some(sentry_edge::User {
///         username: Some("john_doe".into()),
///         ..Default::default()
///     }));
/// });
/// ```
pub fn configure_scope<F, R>(f: F) -> R
where
    R: Default,
    F: FnOnce(&mut Scope) -> R,
{
    Hub::main().configure_scope(f)
}

/// Invokes a function that can modify the isolation scope of the main hub.
pub fn configure_isolation_scope<F, R>(f: F) -> R
where
    R: Default,
    F: FnOnce(&mut Scope) -> R,
{
    Hub::main().configure_isolation_scope(f)
}

/// Temporarily pushes a scope for a single call optionally reconfiguring it.
///
/// This function takes two arguments: the first is a callback that is passed
/// a scope and can reconfigure it.  The second is callback that then executes
/// in the context of that scope.
///
/// This is useful when extra data should be send with a single capture call
/// for instance a different level or tags:
///
/// ```
/// use sentry_edge::{capture_message, with_scope, Level};
///
/// with_scope(
///     |scope| scope.set_level(Some(Level::Warning)),
///     || capture_message("some error", Level::Info),
/// );
/// ```
pub fn with_scope<C, F, R>(scope_config: C, callback: F) -> R
where
    C: FnOnce(&mut Scope),
    F: FnOnce() -> R,
{
    Hub::main().with_scope(scope_config, callback)
}

/// Returns the last event ID captured on the main hub.
pub fn last_event_id() -> Option<Uuid> {
    Hub::main().last_event_id()
}

/// Start a new session for Release Health on the main hub.
///
/// This is still **experimental** for the moment and is not recommended to be
/// used with a very high volume of sessions (_request-mode_ sessions).
///
/// # Examples
///
/// ```
/// sentry_edge::start_session();
///
/// // capturing any event / error here will update the sessions `errors` count,
/// // up until we call `sentry_edge::end_session`.
///
/// sentry_edge::end_session();
/// ```
pub fn start_session() {
    Hub::main().start_session()
}

/// End the current Release Health Session.
pub fn end_session() {
    end_session_with_status(SessionStatus::Exited)
}

/// End the current Release Health Session with the given [`SessionStatus`].
///
/// By default, the SDK will only consider the `Exited` and `Crashed` status
/// based on the type of events that were captured during the session.
///
/// When an `Abnormal` session should be captured, it has to be done explicitly
/// using this function.
pub fn end_session_with_status(status: SessionStatus) {
    Hub::main().end_session_with_status(status)
}
