//! Background batching of envelope items, such as logs and session updates.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::client::{read, TransportArc};
use crate::Envelope;

/// Items waiting to be sent, owned by the worker of a [`Batcher`].
pub(crate) trait Pending: Send + 'static {
    type Item: Send + 'static;

    /// Adds an item.  Returns `true` once the pending items should be sent
    /// without waiting for the interval.
    fn push(&mut self, item: Self::Item) -> bool;

    /// Takes everything pending, as the envelopes to send.
    fn take_envelopes(&mut self) -> Vec<Envelope>;
}

enum Command<T> {
    Item(T),
    Flush(SyncSender<()>),
}

/// Collects items on a worker thread and sends them at least every
/// `interval`.
///
/// Dropping the batcher sends whatever is still pending.
pub(crate) struct Batcher<P: Pending> {
    sender: Option<Sender<Command<P::Item>>>,
    worker: Option<JoinHandle<()>>,
    name: &'static str,
}

impl<P: Pending> Batcher<P> {
    /// Creates a batcher sending through `transport`.
    pub(crate) fn new(
        transport: TransportArc,
        name: &'static str,
        interval: Duration,
        pending: P,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name(format!("sentry-{name}-batcher"))
            .spawn(move || {
                let mut worker = Worker {
                    pending,
                    transport,
                    interval,
                    name,
                };
                worker.run(receiver);
            })
            .map_err(|err| {
                sentry_debug!("[Batcher({name})] failed to spawn worker: {}", err);
            })
            .ok();

        Self {
            sender: worker.is_some().then_some(sender),
            worker,
            name,
        }
    }

    /// Enqueues an item for delayed sending.
    pub(crate) fn enqueue(&self, item: P::Item) {
        let sent = self
            .sender
            .as_ref()
            .is_some_and(|sender| sender.send(Command::Item(item)).is_ok());
        if !sent {
            sentry_debug!("[Batcher({})] worker is gone, dropping item", self.name);
        }
    }

    /// Sends everything enqueued so far and waits until it was handed to the
    /// transport.
    pub(crate) fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (done, wait) = mpsc::sync_channel(1);
        if sender.send(Command::Flush(done)).is_ok() {
            wait.recv().ok();
        }
    }
}

impl<P: Pending> Drop for Batcher<P> {
    fn drop(&mut self) {
        // disconnecting the channel makes the worker send the rest and exit
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            worker.join().ok();
        }
    }
}

struct Worker<P> {
    pending: P,
    transport: TransportArc,
    interval: Duration,
    name: &'static str,
}

impl<P: Pending> Worker<P> {
    fn run(&mut self, receiver: Receiver<Command<P::Item>>) {
        let mut last_flush = Instant::now();
        loop {
            let timeout = self
                .interval
                .checked_sub(last_flush.elapsed())
                .unwrap_or_default();
            match receiver.recv_timeout(timeout) {
                Ok(Command::Item(item)) => {
                    if self.pending.push(item) {
                        self.send();
                        last_flush = Instant::now();
                    }
                }
                Ok(Command::Flush(done)) => {
                    self.send();
                    last_flush = Instant::now();
                    done.send(()).ok();
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.send();
                    last_flush = Instant::now();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.send();
                    return;
                }
            }
        }
    }

    fn send(&mut self) {
        let envelopes = self.pending.take_envelopes();
        if envelopes.is_empty() {
            return;
        }
        sentry_debug!("[Batcher({})] Sending {} envelopes", self.name, envelopes.len());

        let transport = read(&self.transport).clone();
        if let Some(transport) = transport {
            for envelope in envelopes {
                transport.send_envelope(envelope);
            }
        }
    }
}

#[cfg(all(test, feature = "test"))]
mod tests {
    use crate::protocol::EnvelopeItem;
    use crate::test;

    fn count_logs(envelopes: &[crate::Envelope]) -> Vec<usize> {
        envelopes
            .iter()
            .flat_map(|envelope| envelope.items())
            .filter_map(|item| match item {
                EnvelopeItem::Logs(logs) => Some(logs.len()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_full_containers_are_sent_early() {
        let envelopes = test::with_captured_envelopes_options(
            |hub| {
                for i in 0..150 {
                    crate::info!(hub = hub, "cache miss {}", i);
                }
            },
            crate::ClientOptions {
                enable_logs: true,
                ..Default::default()
            },
        );

        assert_eq!(count_logs(&envelopes), vec![100, 50]);
    }

    #[test]
    fn test_pending_items_are_sent_on_flush() {
        let envelopes = test::with_captured_envelopes_options(
            |hub| {
                for i in 0..12 {
                    crate::info!(hub = hub, "cache miss {}", i);
                }
                assert!(hub.client().unwrap().flush(None));
                crate::info!(hub = hub, "after flush");
            },
            crate::ClientOptions {
                enable_logs: true,
                ..Default::default()
            },
        );

        assert_eq!(count_logs(&envelopes), vec![12, 1]);
    }
}
