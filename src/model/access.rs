use serde::{Deserialize, Serialize};

/// A stored credential used by issuance, deployment and notification steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessModel {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve: Option<String>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    /// soft-delete marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<String>,
}
