use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::ratelimit::{RateLimiter, RateLimitingCategory};
use crate::protocol::DiscardReason;
use crate::{sentry_debug, ClientReportRecorder, Envelope};

/// How many envelopes may wait for the transport thread.
const QUEUE_SIZE: usize = 30;

enum Task {
    SendEnvelope(Envelope),
    Flush(SyncSender<()>),
    Shutdown,
}

/// A background thread sending envelopes one by one on its own runtime.
///
/// The queue is bounded.  Envelopes that do not fit are dropped and
/// recorded as `queue_overflow`, so sending never blocks the caller.
pub struct TransportThread {
    sender: SyncSender<Task>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    reports: Option<Arc<ClientReportRecorder>>,
}

impl TransportThread {
    /// Spawns the `sentry-transport` thread.
    ///
    /// `send` performs a single request and hands back the rate limiter
    /// updated from the response.  When `reports` is set, dropped items are
    /// counted there and sent as a client report on every flush.
    pub fn new<SendFn, SendFuture>(
        mut send: SendFn,
        reports: Option<Arc<ClientReportRecorder>>,
    ) -> Self
    where
        SendFn: FnMut(Envelope, RateLimiter) -> SendFuture + Send + 'static,
        // NOTE: returning RateLimiter here, otherwise we are in borrow hell
        SendFuture: Future<Output = RateLimiter>,
    {
        let (sender, receiver) = sync_channel(QUEUE_SIZE);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_worker = shutdown.clone();
        let worker_reports = reports.clone();
        let handle = thread::Builder::new()
            .name("sentry-transport".into())
            .spawn(move || {
                // create a runtime on the transport thread
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(err) => {
                        sentry_debug!("Failed to create the transport runtime: {}", err);
                        return;
                    }
                };

                let mut rl = RateLimiter::new();
                let reports = worker_reports.as_deref();

                // and block on an async fn in this runtime/thread
                rt.block_on(async move {
                    for task in receiver.into_iter() {
                        if shutdown_worker.load(Ordering::SeqCst) {
                            return;
                        }
                        let envelope = match task {
                            Task::SendEnvelope(envelope) => envelope,
                            Task::Flush(sender) => {
                                if let Some(report) = reports.and_then(|r| r.take_envelope()) {
                                    if rl.is_disabled(RateLimitingCategory::Any).is_none() {
                                        rl = send(report, rl).await;
                                    }
                                }
                                sender.send(()).ok();
                                continue;
                            }
                            Task::Shutdown => {
                                return;
                            }
                        };

                        if let Some(time_left) = rl.is_disabled(RateLimitingCategory::Any) {
                            sentry_debug!(
                                "Skipping event send because we're disabled due to rate limits for {}s",
                                time_left.as_secs()
                            );
                            if let Some(reports) = reports {
                                reports.record_envelope(DiscardReason::RatelimitBackoff, &envelope);
                            }
                            continue;
                        }
                        match rl.filter_envelope(envelope, reports) {
                            Some(envelope) => {
                                rl = send(envelope, rl).await;
                            }
                            None => {
                                sentry_debug!("Envelope was discarded due to per-item rate limits");
                            }
                        };
                    }
                })
            })
            .map_err(|err| {
                sentry_debug!("Failed to spawn the transport thread: {}", err);
            })
            .ok();

        Self {
            sender,
            shutdown,
            handle,
            reports,
        }
    }

    /// Queues the envelope, dropping it if the queue is full.
    pub fn send(&self, envelope: Envelope) {
        match self.sender.try_send(Task::SendEnvelope(envelope)) {
            Ok(()) => {}
            Err(TrySendError::Full(Task::SendEnvelope(envelope))) => {
                sentry_debug!("Transport queue is full, dropping envelope");
                if let Some(reports) = &self.reports {
                    reports.record_envelope(DiscardReason::QueueOverflow, &envelope);
                }
            }
            Err(_) => {
                sentry_debug!("Transport thread is gone, dropping envelope");
            }
        }
    }

    /// Waits until everything queued before this call was handled.
    ///
    /// Returns `false` if that did not happen within `timeout`.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (sender, receiver) = sync_channel(1);
        if self.sender.send(Task::Flush(sender)).is_err() {
            return false;
        }
        receiver.recv_timeout(timeout).is_ok()
    }
}

impl Drop for TransportThread {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.sender.send(Task::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                sentry_debug!("The transport thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::protocol::{DataCategory, Event};

    fn collecting_thread(
        rate_limits: Option<&'static str>,
        reports: Option<Arc<ClientReportRecorder>>,
    ) -> (TransportThread, Arc<Mutex<Vec<Envelope>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        let thread = TransportThread::new(
            move |envelope, mut rl: RateLimiter| {
                sink.lock().unwrap().push(envelope);
                if let Some(header) = rate_limits {
                    rl.update_from_sentry_header(header);
                }
                async move { rl }
            },
            reports,
        );
        (thread, sent)
    }

    #[test]
    fn test_sends_and_flushes() {
        let (thread, sent) = collecting_thread(None, None);
        thread.send(Event::default().into());
        thread.send(Event::default().into());

        assert!(thread.flush(Duration::from_secs(5)));
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_rate_limited_items_are_recorded() {
        let reports = Arc::new(ClientReportRecorder::new());
        let (thread, sent) = collecting_thread(Some("60:error:project"), Some(reports.clone()));

        thread.send(Event::default().into());
        thread.send(Event::default().into());
        assert!(thread.flush(Duration::from_secs(5)));

        // the first send sets the limit; the flush then ships the report
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].event().is_some());
        let report = sent[1]
            .items()
            .find_map(|item| match item {
                crate::protocol::EnvelopeItem::ClientReport(report) => Some(report.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(report.discarded_events.len(), 1);
        assert_eq!(
            report.discarded_events[0].reason,
            DiscardReason::RatelimitBackoff
        );
        assert_eq!(report.discarded_events[0].category, DataCategory::Error);
        assert!(reports.is_empty());
    }
}
