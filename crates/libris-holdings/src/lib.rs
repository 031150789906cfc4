//! # libris Holdings
//!
//! Groups a record's copies by location for display and masks restricted
//! call numbers and collection codes.

pub mod aggregator;
pub mod group;
pub mod masking;

pub use aggregator::{HoldingsAggregator, RecordHoldings};
pub use group::{group_by_location, HoldingGroup};
pub use masking::{MaskRule, MaskingConfig, DEFAULT_MASK_CHAR};
