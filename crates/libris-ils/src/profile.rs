//! Patron profile as reported by the ILS.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub lines: Vec<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub preferred: bool,
}

/// Dialect-neutral patron profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatronProfile {
    /// ILS primary identifier.
    pub id: String,
    pub barcode: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Email addresses, preferred first.
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub addresses: Vec<Address>,
    /// Patron group or borrower status.
    pub group: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    /// Active block reasons.
    pub blocks: Vec<String>,
    pub loan_history_opt_in: Option<bool>,
    /// Dialect-specific values without a dedicated field.
    pub extra: BTreeMap<String, String>,
}

impl PatronProfile {
    /// Create a profile with only the primary identifier set.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Preferred email address.
    #[must_use]
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    /// "First Last", skipping missing parts.
    #[must_use]
    pub fn display_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check if the account expired before `today`.
    #[must_use]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|d| d < today)
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        !self.blocks.is_empty()
    }
}

/// Fields to write back to the ILS. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub barcode: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Check if there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.barcode.is_none() && self.email.is_none() && self.phone.is_none() && self.password.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let mut profile = PatronProfile::new("6100");
        assert_eq!(profile.display_name(), "");
        profile.last_name = Some("Doe".into());
        assert_eq!(profile.display_name(), "Doe");
        profile.first_name = Some("Jane".into());
        assert_eq!(profile.display_name(), "Jane Doe");
    }

    #[test]
    fn test_expiry() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let mut profile = PatronProfile::new("1");
        assert!(!profile.is_expired(today));
        profile.expiry_date = NaiveDate::from_ymd_opt(2026, 10, 17);
        assert!(!profile.is_expired(today));
        profile.expiry_date = NaiveDate::from_ymd_opt(2026, 10, 16);
        assert!(profile.is_expired(today));
    }

    #[test]
    fn test_profile_update_builder() {
        assert!(ProfileUpdate::default().is_empty());
        let update = ProfileUpdate::default()
            .with_barcode("AB12")
            .with_password("secret");
        assert!(!update.is_empty());
        assert_eq!(update.barcode.as_deref(), Some("AB12"));
        assert!(update.email.is_none());
    }
}
