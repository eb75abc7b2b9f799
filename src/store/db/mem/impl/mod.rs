use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::{
    CertflowError, Result,
    model::{AccessModel, CertificateModel, SettingsModel, WorkflowLogModel, WorkflowModel, WorkflowRunModel},
    store::db::mem::DbDocument,
};

/// Flattens a record into its top-level JSON fields.
fn to_doc<T: Serialize>(record: &T) -> Result<HashMap<String, JsonValue>> {
    match serde_json::to_value(record)? {
        JsonValue::Object(map) => Ok(map.into_iter().collect()),
        other => Err(CertflowError::Convert(format!("expected a JSON object, got {}", other))),
    }
}

impl DbDocument for AccessModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        to_doc(self)
    }
}

impl DbDocument for CertificateModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        to_doc(self)
    }
}

impl DbDocument for SettingsModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        to_doc(self)
    }
}

impl DbDocument for WorkflowModel {
    fn id(&self) -> &str {
        &self.id
    }

    /// Graphs are left out; nothing filters or sorts on them.
    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        let mut doc = to_doc(self)?;
        doc.remove("content");
        doc.remove("draft");
        Ok(doc)
    }
}

impl DbDocument for WorkflowRunModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        to_doc(self)
    }
}

impl DbDocument for WorkflowLogModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        let mut doc = to_doc(self)?;
        doc.remove("data");
        Ok(doc)
    }
}
