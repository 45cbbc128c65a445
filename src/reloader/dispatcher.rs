use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::Stream;
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Notification that a reload pass changed the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadEvent {
    /// When the event was recorded.
    pub time: DateTime<Utc>,
    /// Human-readable description of what triggered the reload.
    pub reason: String,
}

/// Pull-style handle on the reload event channel.
///
/// All handles returned by the reloader share one underlying channel, so
/// concurrent consumers compete for events rather than each seeing all of
/// them.
#[derive(Clone, Debug)]
pub struct EventReceiver {
    receiver: Arc<AsyncMutex<mpsc::Receiver<ReloadEvent>>>,
}

impl EventReceiver {
    /// Waits for the next event.
    ///
    /// Returns `None` once the dispatcher has been stopped.
    pub async fn recv(&self) -> Option<ReloadEvent> {
        self.receiver.lock().await.recv().await
    }

    /// Converts the handle into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = ReloadEvent> + Send {
        let events = self;
        async_stream::stream! {
            while let Some(event) = events.recv().await {
                yield event;
            }
        }
    }
}

struct DispatcherShared {
    queue: Mutex<VecDeque<ReloadEvent>>,
    receiver: Mutex<Option<EventReceiver>>,
    wake: Notify,
    shutdown: CancellationToken,
    idle_interval: Duration,
}

impl DispatcherShared {
    fn pop(&self) -> Option<ReloadEvent> {
        lock(&self.queue).pop_front()
    }
}

/// Decouples reload notifications from slow consumers.
///
/// Events are queued without bound and handed to the output channel by a
/// background pump, oldest first. The channel and the pump are created the
/// first time `events` is called; events pushed before that have no consumer
/// and are not recorded.
#[derive(Clone)]
pub(crate) struct EventDispatcher {
    shared: Arc<DispatcherShared>,
}

impl EventDispatcher {
    pub fn new(idle_interval: Duration) -> Self {
        Self {
            shared: Arc::new(DispatcherShared {
                queue: Mutex::new(VecDeque::new()),
                receiver: Mutex::new(None),
                wake: Notify::new(),
                shutdown: CancellationToken::new(),
                idle_interval,
            }),
        }
    }

    /// Returns the shared event channel, creating it and its pump on first use.
    ///
    /// Must be called from within a Tokio runtime the first time.
    pub fn events(&self) -> EventReceiver {
        let mut slot = lock(&self.shared.receiver);

        if let Some(receiver) = slot.as_ref() {
            return receiver.clone();
        }

        let (sender, receiver) = mpsc::channel(1);
        let receiver = EventReceiver {
            receiver: Arc::new(AsyncMutex::new(receiver)),
        };
        *slot = Some(receiver.clone());

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            pump_loop(&shared, sender).await;
        });

        receiver
    }

    /// Records an event for delivery.
    pub fn push(&self, reason: impl Into<String>) {
        let reason = reason.into();

        if lock(&self.shared.receiver).is_none() {
            trace!(%reason, "No event consumer yet, event not recorded");
            return;
        }
        if self.shared.shutdown.is_cancelled() {
            return;
        }

        lock(&self.shared.queue).push_back(ReloadEvent {
            time: Utc::now(),
            reason,
        });
        self.shared.wake.notify_one();
    }

    /// Stops the pump and discards undelivered events.
    ///
    /// An event already handed to the output channel is dropped as well,
    /// unless a consumer is waiting on it at that moment.
    pub fn stop(&self) {
        self.shared.shutdown.cancel();
        lock(&self.shared.queue).clear();

        if let Some(events) = lock(&self.shared.receiver).as_ref() {
            if let Ok(mut receiver) = events.receiver.try_lock() {
                while receiver.try_recv().is_ok() {}
            }
        }
    }
}

/// Moves queued events to the output channel until the dispatcher stops.
///
/// When the queue is empty the pump waits for a push, but never longer than
/// the idle interval before checking again.
async fn pump_loop(shared: &DispatcherShared, sender: mpsc::Sender<ReloadEvent>) {
    loop {
        if shared.shutdown.is_cancelled() {
            break;
        }

        match shared.pop() {
            Some(event) => {
                tokio::select! {
                    _ = shared.shutdown.cancelled() => break,
                    sent = sender.send(event) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            None => {
                tokio::select! {
                    _ = shared.shutdown.cancelled() => break,
                    _ = shared.wake.notified() => {}
                    _ = tokio::time::sleep(shared.idle_interval) => {}
                }
            }
        }
    }

    lock(&shared.queue).clear();
    debug!("Event dispatcher stopped");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
