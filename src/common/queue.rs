//! Broadcast queue carrying record events to every subscriber.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::{CertflowError, Result};

/// Broadcast queue for one-to-many message distribution.
///
/// Every live receiver gets every message. Sending with no receivers is not
/// an error; the message is simply dropped.
#[derive(Clone)]
pub struct BroadcastQueue<T> {
    sender: Arc<broadcast::Sender<T>>,
}

impl<T: Clone> BroadcastQueue<T> {
    /// create a new broadcast queue
    pub fn new(cap: usize) -> Result<Arc<Self>> {
        if cap == 0 {
            return Err(CertflowError::Queue("broadcast queue capacity must be positive".to_string()));
        }
        let (tx, _) = broadcast::channel(cap);

        Ok(Arc::new(Self {
            sender: Arc::new(tx),
        }))
    }

    /// send a message, returns the number of receivers it reached
    pub fn send(
        &self,
        msg: T,
    ) -> usize {
        match self.sender.send(msg) {
            Ok(n) => n,
            Err(_) => {
                trace!("broadcast queue has no receivers");
                0
            }
        }
    }

    /// subscribe to the queue
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}
