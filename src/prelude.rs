//! Cadence prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    campaigns::{Campaign, DateError, LimitError},
    decimals::{DecimalError, PricingConfig, Rounding, parse_decimal},
    errors::{PricingError, ValidationError},
    evaluator::{PhaseContext, PhaseResult, evaluate_phase},
    fixtures::{Fixture, FixtureError},
    items::{CartItem, LineItemTotals},
    phases::{DiscountApplication, DiscountPhase, DiscountType},
    schedule::{DiscountSchedule, ScheduleError, ScheduleRow},
    subscriptions::SubscriptionInfo,
    time_units::{TimeUnit, UnitConversionError, normalize_duration},
};
