//! Holdings aggregator.
//!
//! Fetches copies through the driver, masks configured fields and groups the
//! result by location. Holdings display is best-effort: a driver failure is
//! logged and yields no groups.

use crate::group::{group_by_location, HoldingGroup};
use crate::masking::MaskingConfig;
use libris_ils::{Holding, IlsDriver, PatronProfile};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Groups of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordHoldings {
    pub record_id: String,
    pub groups: Vec<HoldingGroup>,
}

/// Holdings aggregator service.
#[derive(Clone)]
pub struct HoldingsAggregator {
    driver: Arc<dyn IlsDriver>,
    masking: MaskingConfig,
}

impl HoldingsAggregator {
    #[must_use]
    pub fn new(driver: Arc<dyn IlsDriver>, masking: MaskingConfig) -> Self {
        Self { driver, masking }
    }

    /// Grouped, masked holdings of one record.
    pub async fn holdings_for_record(
        &self,
        record_id: &str,
        patron: Option<&PatronProfile>,
    ) -> Vec<HoldingGroup> {
        match self.driver.fetch_holdings(record_id, patron).await {
            Ok(holdings) => {
                debug!(record_id, count = holdings.len(), "Holdings fetched");
                let masked = holdings.into_iter().map(|h| self.mask(h)).collect();
                group_by_location(masked)
            }
            Err(e) => {
                warn!(record_id, dialect = self.driver.dialect(), error = %e, "Holdings lookup failed");
                Vec::new()
            }
        }
    }

    /// Holdings of several records; a failing record only empties itself.
    pub async fn holdings_for_records(
        &self,
        record_ids: &[String],
        patron: Option<&PatronProfile>,
    ) -> Vec<RecordHoldings> {
        let mut results = Vec::with_capacity(record_ids.len());
        for record_id in record_ids {
            let groups = self.holdings_for_record(record_id, patron).await;
            results.push(RecordHoldings {
                record_id: record_id.clone(),
                groups,
            });
        }
        results
    }

    fn mask(&self, mut holding: Holding) -> Holding {
        if let Some(rule) = &self.masking.call_number {
            holding.call_number = holding.call_number.as_deref().map(|v| rule.apply(v));
        }
        if let Some(rule) = &self.masking.collection_code {
            holding.collection_code = holding.collection_code.as_deref().map(|v| rule.apply(v));
        }
        holding
    }
}
