//! Webhook user payload.
//!
//! The ILS posts `{"action": "USER", "webhook_user": {"method": ..., "user": {...}}}`.
//! Only the fields the synchronizer reads are modelled; everything else is
//! ignored.

use serde::{Deserialize, Serialize};

/// Identifier type carrying the patron barcode.
pub const BARCODE_ID_TYPE: &str = "BARCODE";

/// Patron change method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMethod {
    Create,
    Update,
    Delete,
    Other(String),
}

impl SyncMethod {
    /// Parse a method name, case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CREATE" => SyncMethod::Create,
            "UPDATE" => SyncMethod::Update,
            "DELETE" => SyncMethod::Delete,
            _ => SyncMethod::Other(raw.to_string()),
        }
    }
}

/// `{"value": "...", "desc": "..."}` pair used for coded fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeValue {
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailEntry {
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub preferred: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub email: Vec<EmailEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentifier {
    #[serde(default)]
    pub id_type: CodeValue,
    #[serde(default)]
    pub value: String,
}

/// The patron as sent by the ILS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IlsUser {
    #[serde(default)]
    pub primary_id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub user_group: Option<CodeValue>,
    #[serde(default)]
    pub contact_info: ContactInfo,
    #[serde(default)]
    pub user_identifier: Vec<UserIdentifier>,
}

impl IlsUser {
    /// Barcode identifier, if the ILS already assigned one.
    #[must_use]
    pub fn barcode(&self) -> Option<&str> {
        self.user_identifier
            .iter()
            .find(|id| id.id_type.value.eq_ignore_ascii_case(BARCODE_ID_TYPE))
            .map(|id| id.value.trim())
            .filter(|v| !v.is_empty())
    }

    /// Preferred email, else the first non-empty one.
    #[must_use]
    pub fn preferred_email(&self) -> Option<&str> {
        let emails = &self.contact_info.email;
        emails
            .iter()
            .find(|e| e.preferred && !e.email_address.trim().is_empty())
            .or_else(|| emails.iter().find(|e| !e.email_address.trim().is_empty()))
            .map(|e| e.email_address.trim())
    }

    /// "First Last", or `None` when both are missing.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!name.is_empty()).then_some(name)
    }
}

/// `webhook_user` section of a USER webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookUser {
    pub method: String,
    #[serde(default)]
    pub user: IlsUser,
}

impl WebhookUser {
    #[must_use]
    pub fn method(&self) -> SyncMethod {
        SyncMethod::parse(&self.method)
    }

    #[must_use]
    pub fn external_id(&self) -> &str {
        self.user.primary_id.trim()
    }
}
