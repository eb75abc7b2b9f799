use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{CertflowError, Result};

/// Well-known settings record names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
pub enum SettingsName {
    #[strum(serialize = "emails")]
    Emails,
    #[strum(serialize = "notifyTemplates")]
    NotifyTemplates,
    #[strum(serialize = "notifyChannels")]
    NotifyChannels,
    #[strum(serialize = "sslProvider")]
    SslProvider,
    #[strum(serialize = "persistence")]
    Persistence,
}

/// Named settings record holding arbitrary JSON content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsModel {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
}

impl SettingsModel {
    /// Decodes `content` into a typed shape.
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.content.clone()).map_err(|e| CertflowError::Convert(format!("invalid settings '{}': {}", self.name, e)))
    }
}

/// Content of the `notifyTemplates` settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotifyTemplatesContent {
    pub notify_templates: Vec<NotifyTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifyTemplate {
    pub subject: String,
    pub message: String,
}

impl Default for NotifyTemplate {
    fn default() -> Self {
        Self {
            subject: "${COUNT} certificate(s) expiring soon".to_string(),
            message: "${COUNT} certificate(s) will expire soon, domains: ${DOMAINS}. Please keep an eye on them!".to_string(),
        }
    }
}

/// Content of the `persistence` settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_runs_max_days_retention: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_certificates_max_days_retention: Option<u32>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_settings_content_as() {
        let settings = SettingsModel {
            name: SettingsName::Persistence.as_ref().to_string(),
            content: json!({ "workflowRunsMaxDaysRetention": 30 }),
            ..Default::default()
        };
        let content: PersistenceContent = settings.content_as().unwrap();
        assert_eq!(content.workflow_runs_max_days_retention, Some(30));
        assert_eq!(content.expired_certificates_max_days_retention, None);
    }

    #[test]
    fn test_settings_content_as_invalid() {
        let settings = SettingsModel {
            name: "notifyTemplates".to_string(),
            content: json!({ "notifyTemplates": "nope" }),
            ..Default::default()
        };
        let err = settings.content_as::<NotifyTemplatesContent>().unwrap_err();
        assert!(err.to_string().contains("notifyTemplates"));
    }
}
