use std::time::{Duration, Instant};

use crate::protocol::{Breadcrumb, Map};

/// Identical UI events closer together than this collapse into one breadcrumb.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// A helper trait that converts self into an Iterator of Breadcrumbs.
///
/// This is used for the [`add_breadcrumb`](crate::add_breadcrumb) function.
pub trait IntoBreadcrumbs {
    /// The iterator type for the breadcrumbs.
    type Output: Iterator<Item = Breadcrumb>;

    /// This converts the object into an optional breadcrumb.
    fn into_breadcrumbs(self) -> Self::Output;
}

impl IntoBreadcrumbs for Breadcrumb {
    type Output = std::iter::Once<Breadcrumb>;

    fn into_breadcrumbs(self) -> Self::Output {
        std::iter::once(self)
    }
}

impl IntoBreadcrumbs for Vec<Breadcrumb> {
    type Output = std::vec::IntoIter<Breadcrumb>;

    fn into_breadcrumbs(self) -> Self::Output {
        self.into_iter()
    }
}

impl IntoBreadcrumbs for Option<Breadcrumb> {
    type Output = std::option::IntoIter<Breadcrumb>;

    fn into_breadcrumbs(self) -> Self::Output {
        self.into_iter()
    }
}

impl<F: FnOnce() -> I, I: IntoBreadcrumbs> IntoBreadcrumbs for F {
    type Output = I::Output;

    fn into_breadcrumbs(self) -> Self::Output {
        self().into_breadcrumbs()
    }
}

/// Creates the breadcrumb recorded for a UI event such as a click.
pub fn ui_breadcrumb(event_type: &str, target: &str) -> Breadcrumb {
    let mut data = Map::new();
    data.insert("target".into(), target.into());
    Breadcrumb {
        category: Some(format!("ui.{event_type}")),
        message: Some(target.into()),
        data,
        ..Default::default()
    }
}

#[derive(Debug)]
struct LastEvent {
    event_type: String,
    target: String,
    at: Instant,
}

/// Collapses bursts of identical UI events into one breadcrumb.
///
/// An event is suppressed when it has the same event type and target as the
/// previous one and arrives within [`DEBOUNCE_WINDOW`] of it.  Every
/// suppressed event extends the window, so a continuous burst records only
/// its first event.
#[derive(Debug)]
pub struct BreadcrumbDebouncer {
    window: Duration,
    last: Option<LastEvent>,
}

impl Default for BreadcrumbDebouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

impl BreadcrumbDebouncer {
    /// Creates a debouncer with the given window.
    pub fn new(window: Duration) -> Self {
        BreadcrumbDebouncer { window, last: None }
    }

    /// Returns whether an event seen now should be recorded.
    pub fn should_record(&mut self, event_type: &str, target: &str) -> bool {
        self.should_record_at(event_type, target, Instant::now())
    }

    /// Returns whether an event seen at `now` should be recorded.
    pub fn should_record_at(&mut self, event_type: &str, target: &str, now: Instant) -> bool {
        if let Some(last) = self.last.as_mut() {
            let similar = last.event_type == event_type && last.target == target;
            if similar && now.saturating_duration_since(last.at) < self.window {
                last.at = now;
                return false;
            }
        }
        self.last = Some(LastEvent {
            event_type: event_type.to_owned(),
            target: target.to_owned(),
            at: now,
        });
        true
    }
}
