use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time::parse_rfc3339;

/// Where a certificate came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CertificateSource {
    #[default]
    Request,
    Upload,
}

/// Validity bucket used by list filters and the dashboard.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum CertificateState {
    ExpireSoon,
    Expired,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateModel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub source: CertificateSource,
    pub subject_alt_names: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub issuer_org: String,
    #[serde(default)]
    pub key_algorithm: String,
    #[serde(default)]
    pub validity_not_before: String,
    pub validity_not_after: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_ref: Option<String>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    /// soft-delete marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<String>,
}

impl CertificateModel {
    pub fn not_after(&self) -> Option<DateTime<Utc>> {
        parse_rfc3339(&self.validity_not_after)
    }

    /// Whole days left until expiry, negative once expired.
    pub fn days_left(
        &self,
        now: DateTime<Utc>,
    ) -> Option<i64> {
        self.not_after().map(|t| (t - now).num_days())
    }

    /// Bucket for the certificate at `now`; `None` when it is healthy or has no parseable expiry.
    pub fn state(
        &self,
        now: DateTime<Utc>,
        expire_soon_days: i64,
    ) -> Option<CertificateState> {
        let not_after = self.not_after()?;
        if not_after <= now {
            Some(CertificateState::Expired)
        } else if not_after < now + Duration::days(expire_soon_days) {
            Some(CertificateState::ExpireSoon)
        } else {
            None
        }
    }
}
