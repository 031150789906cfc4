//! Grouping of copies by location.

use libris_ils::Holding;
use serde::Serialize;

/// Copies of one record at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldingGroup {
    pub location_code: String,
    /// First non-empty location name seen.
    pub location_name: Option<String>,
    /// Copies in ILS order.
    pub items: Vec<Holding>,
    /// Union of item notes, first-seen order.
    pub notes: Vec<String>,
    /// Union of holdings summaries, first-seen order.
    pub summaries: Vec<String>,
    pub total_items: usize,
}

impl HoldingGroup {
    fn new(location_code: String) -> Self {
        Self {
            location_code,
            location_name: None,
            items: Vec::new(),
            notes: Vec::new(),
            summaries: Vec::new(),
            total_items: 0,
        }
    }

    fn push(&mut self, holding: Holding) {
        if self.location_name.is_none() {
            self.location_name = holding
                .location_name
                .clone()
                .filter(|name| !name.trim().is_empty());
        }
        for note in &holding.notes {
            push_unique(&mut self.notes, note);
        }
        if let Some(summary) = &holding.summary {
            push_unique(&mut self.summaries, summary);
        }
        self.total_items += 1;
        self.items.push(holding);
    }

    /// Number of copies currently on the shelf.
    #[must_use]
    pub fn available_items(&self) -> usize {
        self.items.iter().filter(|h| h.is_available()).count()
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !value.trim().is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Group copies by `location_code`, groups in first-seen order.
#[must_use]
pub fn group_by_location(holdings: Vec<Holding>) -> Vec<HoldingGroup> {
    let mut groups: Vec<HoldingGroup> = Vec::new();
    for holding in holdings {
        let index = match groups
            .iter()
            .position(|g| g.location_code == holding.location_code)
        {
            Some(index) => index,
            None => {
                groups.push(HoldingGroup::new(holding.location_code.clone()));
                groups.len() - 1
            }
        };
        groups[index].push(holding);
    }
    groups
}
