//! Errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    campaigns::{DateError, LimitError},
    decimals::DecimalError,
    phases::DiscountApplication,
    time_units::{TimeUnit, UnitConversionError},
};

/// Every failure the pricing engine can report.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PricingError {
    /// Invalid line item or discount configuration.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Inconsistent campaign dates.
    #[error(transparent)]
    Date(#[from] DateError),

    /// Inconsistent usage limits.
    #[error(transparent)]
    Limit(#[from] LimitError),

    /// A decimal could not be read, converted or computed without overflow.
    #[error(transparent)]
    DecimalParse(#[from] DecimalError),

    /// A duration could not be expressed in billing cycles.
    #[error(transparent)]
    UnitConversion(#[from] UnitConversionError),
}

/// Invalid line item or discount phase configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Quantity below zero.
    #[error("quantity must not be negative, got {0}")]
    NegativeQuantity(i64),

    /// Unit price below zero.
    #[error("unit price must not be negative, got {0}")]
    NegativeUnitPrice(Decimal),

    /// Per-unit discount below zero.
    #[error("discount per discounted unit must not be negative, got {0}")]
    NegativeDiscountPerUnit(Decimal),

    /// Discounted unit count outside `0..=quantity`.
    #[error("discounted units must be between 0 and quantity {quantity}, got {discounted}")]
    DiscountedUnitsOutOfRange {
        /// Requested discounted units
        discounted: i64,
        /// Line item quantity
        quantity: i64,
    },

    /// Subscription line items carry at most one unit.
    #[error("subscription items may have at most one unit, got {0}")]
    SubscriptionQuantity(i64),

    /// The item is flagged as a subscription but has no subscription details.
    #[error("subscription item has no subscription details")]
    MissingSubscription,

    /// Subscription billing period is the `Unknown` sentinel.
    #[error("subscription billing period is unknown")]
    UnknownBillingPeriod,

    /// A trial is set but its unit is the `Unknown` sentinel.
    #[error("trial of {0} periods has an unknown time unit")]
    UnknownTrialPeriodUnit(u32),

    /// Unit price times quantity does not fit in a decimal.
    #[error("gross total of {quantity} x {unit_price} overflows")]
    GrossTotalOverflow {
        /// Line item quantity
        quantity: i64,
        /// Unit price
        unit_price: Decimal,
    },

    /// A subscription priced through phases has none.
    #[error("subscription has no discount phases")]
    MissingDiscountPhases,

    /// Phase discount type is the `Unknown` sentinel.
    #[error("discount type is unknown")]
    UnknownDiscountType,

    /// Phase discount value is zero or negative.
    #[error("discount value must be greater than zero, got {0}")]
    NonPositiveDiscount(Decimal),

    /// Percentage phase above one hundred percent.
    #[error("percentage discount must not exceed 100, got {0}")]
    PercentageAboveHundred(Decimal),

    /// Percentage or time-based phase without a duration unit.
    #[error("discount phase duration unit is unknown")]
    UnknownDurationUnit,

    /// Percentage or time-based phase with zero duration.
    #[error("discount phase duration must be greater than zero")]
    NonPositiveDuration,

    /// Phase application is the `Unknown` sentinel.
    #[error("discount application is unknown")]
    UnknownApplication,

    /// Fixed amount phases run on the billing clock and take no duration unit.
    #[error("fixed amount phase must not set a duration unit, got {0}")]
    FixedAmountDurationUnit(TimeUnit),

    /// Fixed amount phases run on the billing clock and take no duration.
    #[error("fixed amount phase must not set a duration, got {0}")]
    FixedAmountDuration(u32),

    /// Fixed amount phases are either one-time or recurring.
    #[error("fixed amount phase must be one-time or recurring, got {0}")]
    FixedAmountApplication(DiscountApplication),

    /// Fixed amount phase covering no billing cycles.
    #[error("fixed amount phase must apply to at least one billing cycle")]
    NoApplicableBillingCycles,

    /// One-time fixed amount phases cover exactly one billing cycle.
    #[error("one-time fixed amount phase must apply to exactly one billing cycle, got {0}")]
    OneTimeBillingCycles(u32),

    /// Phase measured in a unit coarser than the billing period.
    #[error("duration unit {duration_unit} is longer than billing period {billing_period}")]
    DurationUnitExceedsBillingPeriod {
        /// Phase duration unit
        duration_unit: TimeUnit,
        /// Subscription billing period
        billing_period: TimeUnit,
    },

    /// A recurring phase spanning several cycles must be measured in billing periods.
    #[error(
        "recurring phase of {duration} {duration_unit} spans several {billing_period} cycles; \
         express it in {billing_period} units"
    )]
    BillingCycleSpan {
        /// Phase duration
        duration: u32,
        /// Phase duration unit
        duration_unit: TimeUnit,
        /// Subscription billing period
        billing_period: TimeUnit,
    },
}
