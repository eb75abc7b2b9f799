use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::runtime::Runtime;
use tracing::{trace, warn};

use crate::{CertflowError, Result, common::Shutdown, model::WorkflowRunModel, runtime::Subscription};

/// Live watch over one workflow run.
///
/// The callback first sees the run as it was when the watch started, then
/// every stored update. The watch stops by itself after delivering a terminal
/// status, and when dropped.
pub struct RunWatch {
    run_id: String,
    finished: Arc<AtomicBool>,
    stop: Arc<Shutdown>,
}

impl RunWatch {
    pub(crate) fn spawn<F>(
        runtime: &Runtime,
        snapshot: WorkflowRunModel,
        subscription: Subscription,
        mut callback: F,
    ) -> Self
    where
        F: FnMut(&WorkflowRunModel) + Send + 'static,
    {
        let finished = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(Shutdown::new());

        let done = finished.clone();
        let stopped = stop.clone();
        let run_id = snapshot.id.clone();
        let id = run_id.clone();
        runtime.spawn(async move {
            callback(&snapshot);
            if !snapshot.status.is_terminal() {
                loop {
                    tokio::select! {
                        _ = stopped.wait() => break,
                        received = subscription.recv_async() => {
                            let Some(e) = received else {
                                break;
                            };
                            match e.record_as::<WorkflowRunModel>() {
                                Ok(run) => {
                                    callback(&run);
                                    if run.status.is_terminal() {
                                        break;
                                    }
                                }
                                Err(err) => warn!("run watch '{}' got an unreadable record: {}", id, err),
                            }
                        }
                    }
                }
            }
            done.store(true, Ordering::Relaxed);
            trace!("run watch '{}' finished", id);
        });

        Self {
            run_id,
            finished,
            stop,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The watch delivered a terminal status or was stopped.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    pub fn cancel(self) {}
}

impl Drop for RunWatch {
    fn drop(&mut self) {
        self.stop.shutdown();
    }
}

/// At most one [`RunWatch`] per run id.
#[derive(Default)]
pub struct RunWatchSet {
    watches: Mutex<HashMap<String, RunWatch>>,
}

impl RunWatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `watch`, stopping any earlier watch on the same run.
    pub fn insert(
        &self,
        watch: RunWatch,
    ) -> Result<()> {
        let mut watches = self.watches.lock().map_err(|e| CertflowError::Console(e.to_string()))?;
        watches.retain(|_, w| !w.is_finished());
        watches.insert(watch.run_id().to_string(), watch);
        Ok(())
    }

    pub fn remove(
        &self,
        run_id: &str,
    ) -> bool {
        self.watches.lock().map(|mut watches| watches.remove(run_id).is_some()).unwrap_or(false)
    }

    pub fn contains(
        &self,
        run_id: &str,
    ) -> bool {
        self.watches.lock().map(|watches| watches.get(run_id).is_some_and(|w| !w.is_finished())).unwrap_or(false)
    }

    /// Number of watches still running.
    pub fn len(&self) -> usize {
        self.watches.lock().map(|watches| watches.values().filter(|w| !w.is_finished()).count()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut watches) = self.watches.lock() {
            watches.clear();
        }
    }
}

/// Escapes glob metacharacters so `id` only matches itself.
pub(crate) fn glob_literal(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '*' | '?' | '[' | '{' | '}' => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out
}
