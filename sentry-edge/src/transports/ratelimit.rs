use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use httpdate::parse_http_date;

use crate::protocol::{DataCategory, DiscardReason, EnvelopeItem};
use crate::{ClientReportRecorder, Envelope};

/// How long to back off after a `429` without a usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// The longest backoff taken from a server response.
const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60 * 24);

/// A Utility that helps with rate limiting sentry requests.
#[derive(Debug, Default)]
pub struct RateLimiter {
    global: Option<SystemTime>,
    categories: HashMap<DataCategory, SystemTime>,
}

impl RateLimiter {
    /// Create a new RateLimiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the RateLimiter from the headers of a response.
    ///
    /// `X-Sentry-Rate-Limits` takes precedence.  `Retry-After` is only
    /// consulted for a `429` response, falling back to 60 seconds.
    pub fn update_from_response(
        &mut self,
        status: u16,
        sentry_header: Option<&str>,
        retry_after: Option<&str>,
    ) {
        if let Some(header) = sentry_header {
            self.update_from_sentry_header(header);
        } else if status == 429 {
            self.update_from_429(retry_after);
        }
    }

    /// Updates the RateLimiter with information from a `Retry-After` header.
    pub fn update_from_retry_after(&mut self, header: &str) {
        if let Some(new_time) = parse_retry_after(header) {
            self.global = Some(new_time);
        }
    }

    /// Updates the RateLimiter after a `429` response.
    pub fn update_from_429(&mut self, retry_after: Option<&str>) {
        self.global = Some(
            retry_after
                .and_then(parse_retry_after)
                .unwrap_or_else(|| SystemTime::now() + DEFAULT_RETRY_AFTER),
        );
    }

    /// Updates the RateLimiter with information from a `X-Sentry-Rate-Limits` header.
    pub fn update_from_sentry_header(&mut self, header: &str) {
        // <rate-limit> = (<group>,)+
        // <group> = <time>:(<category>;)+:<scope>(:<reason>)?

        let mut parse_group = |group: &str| {
            let mut splits = group.split(':');
            let seconds = splits.next()?.parse::<f64>().ok()?;
            let categories = splits.next()?;
            let _scope = splits.next()?;

            let new_time = backoff_until(seconds)?;

            if categories.is_empty() {
                self.global = Some(new_time);
            }

            for category in categories.split(';') {
                // unknown categories are not ours to enforce
                if let Ok(category) = category.parse::<DataCategory>() {
                    self.categories.insert(category, new_time);
                }
            }
            Some(())
        };

        for group in header.split(',') {
            parse_group(group.trim());
        }
    }

    /// Query the RateLimiter for a certain category of event.
    pub fn is_disabled(&self, category: RateLimitingCategory) -> Option<Duration> {
        if let Some(ts) = self.global {
            let time_left = ts.duration_since(SystemTime::now()).ok();
            if time_left.is_some() {
                return time_left;
            }
        }
        let ts = match category {
            RateLimitingCategory::Any => self.global?,
            RateLimitingCategory::Data(category) => *self.categories.get(&category)?,
        };
        ts.duration_since(SystemTime::now()).ok()
    }

    /// Removes all items of rate limited categories from the envelope.
    ///
    /// Every removed item is recorded as `ratelimit_backoff`.  Returns
    /// `None` if nothing is left to send.
    pub fn filter_envelope(
        &self,
        envelope: Envelope,
        reports: Option<&ClientReportRecorder>,
    ) -> Option<Envelope> {
        envelope.filter(|item| {
            let Some(category) = item.data_category() else {
                return true;
            };
            if self.is_disabled(RateLimitingCategory::Data(category)).is_none() {
                return true;
            }
            if let Some(reports) = reports {
                reports.record(DiscardReason::RatelimitBackoff, category, item.quantity());
                // transactions also stand for their spans
                if let EnvelopeItem::Transaction(transaction) = item {
                    let spans = u32::try_from(transaction.spans.len()).unwrap_or(u32::MAX);
                    reports.record(
                        DiscardReason::RatelimitBackoff,
                        DataCategory::Span,
                        spans.saturating_add(1),
                    );
                }
            }
            false
        })
    }
}

fn parse_retry_after(header: &str) -> Option<SystemTime> {
    let header = header.trim();
    match header.parse::<f64>() {
        Ok(seconds) => backoff_until(seconds),
        Err(_) => parse_http_date(header).ok(),
    }
}

/// The end of a backoff of `seconds`, capped at [`MAX_BACKOFF`].
///
/// Values that are not finite are rejected.
fn backoff_until(seconds: f64) -> Option<SystemTime> {
    if !seconds.is_finite() {
        return None;
    }
    let seconds = seconds.clamp(0.0, MAX_BACKOFF.as_secs_f64()).ceil();
    SystemTime::now().checked_add(Duration::from_secs_f64(seconds))
}

/// The Category of payload that a Rate Limit refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RateLimitingCategory {
    /// Rate Limit for any kind of payload.
    Any,
    /// Rate Limit pertaining to one data category.
    Data(DataCategory),
}
