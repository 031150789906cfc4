//! Item holdings and availability resolution.
//!
//! Drivers decode each copy into a [`RawItem`] and resolve it through the
//! site's [`AvailabilityRules`]. Status strings are compared trimmed and
//! case-insensitively.

use chrono::NaiveDate;
use libris_core::{ConfigError, ConfigSection};
use serde::{Deserialize, Serialize};

/// Resolved circulation status of one copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingStatus {
    Available,
    OnLoan,
    Requested,
    Unavailable,
    Unknown,
}

/// One physical copy of a bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub location_code: String,
    pub location_name: Option<String>,
    pub call_number: Option<String>,
    pub collection_code: Option<String>,
    pub status: HoldingStatus,
    pub due_date: Option<NaiveDate>,
    pub barcode: Option<String>,
    pub is_holdable: bool,
    pub notes: Vec<String>,
    pub summary: Option<String>,
}

impl Holding {
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == HoldingStatus::Available
    }
}

/// A copy as decoded from the wire, before availability rules apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub location_code: String,
    pub location_name: Option<String>,
    pub call_number: Option<String>,
    pub collection_code: Option<String>,
    /// Circulation status text, e.g. "On Shelf".
    pub status: String,
    /// Item policy / item status text, e.g. "Reference Only".
    pub item_status: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub barcode: Option<String>,
    pub request_allowed: bool,
    pub notes: Vec<String>,
    pub summary: Option<String>,
}

/// Site-configured status vocabularies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityRules {
    /// Circulation statuses meaning "on the shelf".
    pub available_statuses: Vec<String>,
    /// Item statuses that are never available, whatever the circulation status.
    pub never_available_item_statuses: Vec<String>,
    pub on_loan_statuses: Vec<String>,
    pub requested_statuses: Vec<String>,
}

impl Default for AvailabilityRules {
    fn default() -> Self {
        Self {
            available_statuses: vec!["On Shelf".into(), "Available".into(), "Item in place".into()],
            never_available_item_statuses: vec!["Missing".into(), "Lost".into()],
            on_loan_statuses: vec!["On Loan".into(), "Loan".into(), "Item not in place".into()],
            requested_statuses: vec!["Requested".into(), "On Hold".into()],
        }
    }
}

impl AvailabilityRules {
    /// Read the four status lists from a driver section. Missing keys keep
    /// the defaults.
    pub fn from_section(section: &ConfigSection) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let list_or = |key: &str, fallback: Vec<String>| {
            let values = section.get_list(key);
            if values.is_empty() {
                fallback
            } else {
                values
            }
        };
        Ok(Self {
            available_statuses: list_or("available_statuses", defaults.available_statuses),
            never_available_item_statuses: list_or(
                "never_available_item_statuses",
                defaults.never_available_item_statuses,
            ),
            on_loan_statuses: list_or("on_loan_statuses", defaults.on_loan_statuses),
            requested_statuses: list_or("requested_statuses", defaults.requested_statuses),
        })
    }

    /// Apply the rules to one raw copy.
    ///
    /// The never-available list wins over the available list. A copy is
    /// holdable only when it is checked out and the ILS allows requests.
    #[must_use]
    pub fn resolve(&self, raw: RawItem) -> Holding {
        let excluded = raw
            .item_status
            .as_deref()
            .is_some_and(|s| contains(&self.never_available_item_statuses, s));
        let available = !excluded && contains(&self.available_statuses, &raw.status);
        let checked_out = !available
            && (raw.due_date.is_some() || contains(&self.on_loan_statuses, &raw.status));

        let status = if available {
            HoldingStatus::Available
        } else if contains(&self.requested_statuses, &raw.status) {
            HoldingStatus::Requested
        } else if checked_out {
            HoldingStatus::OnLoan
        } else if raw.status.trim().is_empty() && !excluded {
            HoldingStatus::Unknown
        } else {
            HoldingStatus::Unavailable
        };

        Holding {
            location_code: raw.location_code,
            location_name: raw.location_name,
            call_number: raw.call_number,
            collection_code: raw.collection_code,
            status,
            due_date: raw.due_date,
            barcode: raw.barcode,
            is_holdable: checked_out && raw.request_allowed,
            notes: raw.notes,
            summary: raw.summary,
        }
    }
}

fn contains(list: &[String], value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && list.iter().any(|s| s.trim().eq_ignore_ascii_case(value))
}
