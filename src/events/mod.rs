//! Record change events.
//!
//! Every successful write through the console is published on the realtime
//! channel as an [`Event`] wrapping a [`RecordEvent`].

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{Result, store::StoreIden, utils};

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
    /// Milliseconds since the epoch when the event was created.
    timestamp: i64,
}

/// Kind of change applied to a record.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordAction {
    Create,
    Update,
    Delete,
}

/// A record that was created, updated or deleted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecordEvent {
    pub collection: StoreIden,
    pub action: RecordAction,
    pub id: String,
    /// The record as stored after the change; the last known state for deletes.
    pub record: JsonValue,
}

impl RecordEvent {
    pub fn new<T: Serialize>(
        collection: StoreIden,
        action: RecordAction,
        id: &str,
        record: &T,
    ) -> Result<Self> {
        Ok(Self {
            collection,
            action,
            id: id.to_string(),
            record: serde_json::to_value(record)?,
        })
    }

    /// Deserializes the carried record.
    pub fn record_as<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.record.clone())?)
    }
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
            timestamp: utils::time::time_millis(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}
