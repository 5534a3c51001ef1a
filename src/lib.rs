//! Cadence
//!
//! Cadence prices subscription line items. It evaluates ordered discount phases (percentage,
//! time-based and fixed-amount, applied per cycle, spread or once) against a billing period
//! and reports exact totals alongside a per-cycle breakdown.

pub mod campaigns;
pub mod decimals;
pub mod errors;
pub mod evaluator;
pub mod fixtures;
pub mod items;
pub mod phases;
pub mod prelude;
pub mod schedule;
pub mod subscriptions;
pub mod time_units;
pub mod utils;
