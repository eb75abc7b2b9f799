use std::{sync::Arc, time::Duration};

use tokio::{runtime::Runtime, sync::broadcast::error::RecvError};
use tracing::{debug, trace};

use crate::{
    CertflowError, Result,
    common::{BroadcastQueue, Shutdown},
    config::ChannelConfig,
    events::{Event, RecordEvent},
    store::StoreIden,
};

#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    /// only events of this collection, every collection when `None`
    pub collection: Option<StoreIden>,

    /// use the glob pattern to match the record id
    /// eg. run1*
    pub id: String,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            collection: None,
            id: "*".to_string(),
        }
    }
}

impl SubscribeOptions {
    pub fn new(
        collection: StoreIden,
        id: &str,
    ) -> Self {
        Self {
            collection: Some(collection),
            id: id.to_string(),
        }
    }

    pub fn with_collection(collection: StoreIden) -> Self {
        Self {
            collection: Some(collection),
            id: "*".to_string(),
        }
    }
}

/// Compiled form of [`SubscribeOptions`].
#[derive(Debug, Clone)]
struct Filter {
    collection: Option<StoreIden>,
    id: globset::GlobMatcher,
}

impl Filter {
    fn new(options: &SubscribeOptions) -> Result<Self> {
        let id = globset::Glob::new(&options.id)
            .map_err(|e| CertflowError::Subscription(format!("invalid id pattern '{}': {}", options.id, e)))?
            .compile_matcher();
        Ok(Self {
            collection: options.collection,
            id,
        })
    }

    fn is_match(
        &self,
        e: &Event<RecordEvent>,
    ) -> bool {
        self.collection.is_none_or(|collection| collection == e.collection) && self.id.is_match(&e.id)
    }
}

/// Realtime fan-out of record events.
#[derive(Clone)]
pub struct Channel {
    event_queue: Arc<BroadcastQueue<Event<RecordEvent>>>,
    subscription_queue_size: usize,

    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl Channel {
    pub(crate) fn new(
        runtime: Arc<Runtime>,
        config: &ChannelConfig,
    ) -> Result<Self> {
        Ok(Self {
            event_queue: BroadcastQueue::new(config.event_queue_size)?,
            subscription_queue_size: config.subscription_queue_size,
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        })
    }

    /// Broadcasts a record event to every matching subscription.
    pub fn publish(
        &self,
        record: RecordEvent,
    ) {
        trace!("channel::publish({}, {}, {})", record.collection.as_ref(), record.action, record.id);
        self.event_queue.send(Event::new(&record));
    }

    /// Starts forwarding matching events into a new [`Subscription`].
    pub fn subscribe(
        &self,
        options: SubscribeOptions,
    ) -> Result<Subscription> {
        if self.shutdown.is_shutdown() {
            return Err(CertflowError::Subscription("channel is shut down".to_string()));
        }

        let filter = Filter::new(&options)?;
        let collection = filter.collection;
        let (sender, receiver) = flume::bounded(self.subscription_queue_size);
        let mut events = self.event_queue.subscribe();
        let closed = self.shutdown.clone();
        let stop = Arc::new(Shutdown::new());
        let stopped = stop.clone();

        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = closed.wait() => break,
                    _ = stopped.wait() => break,
                    received = events.recv() => match received {
                        Ok(e) if filter.is_match(&e) => {
                            tokio::select! {
                                _ = stopped.wait() => break,
                                sent = sender.send_async(e) => if sent.is_err() { break },
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(n)) => trace!("subscription lagged, {} events skipped", n),
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            trace!("subscription {:?} stopped", options);
        });

        debug!("channel::subscribe(collection={:?})", collection);
        Ok(Subscription {
            receiver,
            stop,
        })
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// Handle to a live subscription; dropping it stops delivery.
///
/// Once the subscription stops, whether by [`Subscription::unsubscribe`],
/// drop, or channel shutdown, the receive calls return `None` after the
/// already delivered events are drained.
pub struct Subscription {
    receiver: flume::Receiver<Event<RecordEvent>>,
    stop: Arc<Shutdown>,
}

impl Subscription {
    /// Blocks until the next event.
    pub fn recv(&self) -> Option<Event<RecordEvent>> {
        self.receiver.recv().ok()
    }

    /// Blocks for at most `timeout`.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Option<Event<RecordEvent>> {
        self.receiver.recv_timeout(timeout).ok()
    }

    pub async fn recv_async(&self) -> Option<Event<RecordEvent>> {
        self.receiver.recv_async().await.ok()
    }

    pub fn try_recv(&self) -> Option<Event<RecordEvent>> {
        self.receiver.try_recv().ok()
    }

    pub fn is_active(&self) -> bool {
        !self.stop.is_shutdown() && !self.receiver.is_disconnected()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop.shutdown();
    }
}
