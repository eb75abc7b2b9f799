//! Storage layer for workflows, runs, logs, certificates, accesses and settings.
//!
//! Collections are reached through the type-erased [`Store`] registry. The
//! in-memory [`MemStore`] is the only backend.

mod data;
mod db;
pub mod query;
mod store;

use std::error::Error;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter};

use crate::{CertflowError, Result};

use query::*;

pub use db::MemStore;
pub use store::Store;

/// Maps backend errors to CertflowError.
fn map_db_err(err: impl Error) -> CertflowError {
    CertflowError::Store(err.to_string())
}

/// Identifiers for the storage collections.
#[derive(Debug, Clone, Copy, AsRefStr, PartialEq, Hash, Eq, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StoreIden {
    /// Provider credentials.
    Access,
    /// Issued or uploaded certificates.
    Certificate,
    /// Named settings documents.
    Settings,
    /// Workflow envelopes.
    Workflow,
    /// Workflow executions.
    WorkflowRun,
    /// Per-node execution logs.
    WorkflowLogs,
}

/// One page of a collection query.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PageData<T> {
    /// records matching the conditions, across all pages
    pub count: usize,
    /// 1-based
    pub page_num: usize,
    pub page_count: usize,
    /// 0 when unpaged
    pub page_size: usize,
    pub rows: Vec<T>,
}

/// Record types that live in a known collection.
pub trait DbCollectionIden {
    fn iden() -> StoreIden;
}

/// Typed access to one collection of records.
///
/// `create` fails on an existing id and `update` on a missing one; `delete`
/// reports whether anything was removed.
pub trait DbCollection: Send + Sync {
    type Item;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool>;

    /// Fails when no record has `id`.
    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item>;

    /// Filters, sorts and pages the records.
    fn query(
        &self,
        query: &Query,
    ) -> Result<PageData<Self::Item>>;

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool>;
}

/// A storage backend.
pub trait DbStore {
    /// Registers every collection of the backend.
    fn init(
        &self,
        s: &Store,
    );
}
