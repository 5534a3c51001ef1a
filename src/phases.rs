//! Discount Phases
//!
//! A phase is one contiguous segment of a subscription timeline during which a single discount
//! rule applies. Phases are plain values: evaluation never mutates one, except when a line item
//! records the outputs of its latest evaluation on it.

use std::{collections::BTreeMap, fmt};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{errors::ValidationError, time_units::TimeUnit};

/// Errors decoding a discount type ordinal.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("no discount type has ordinal {0}")]
pub struct UnknownDiscountTypeOrdinal(pub u8);

/// How a phase's discount value is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DiscountType {
    /// Sentinel for a missing type. Never valid input.
    #[default]
    Unknown,

    /// Percentage points off the unit price.
    Percentage,

    /// The item is free for the phase duration (a 100% percentage discount).
    TimeBased,

    /// Absolute amount off each billing cycle.
    FixedAmount,
}

impl DiscountType {
    /// Canonical lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            DiscountType::Unknown => "unknown",
            DiscountType::Percentage => "percentage",
            DiscountType::TimeBased => "time-based",
            DiscountType::FixedAmount => "fixed-amount",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<DiscountType> for u8 {
    fn from(discount_type: DiscountType) -> Self {
        match discount_type {
            DiscountType::Unknown => 0,
            DiscountType::Percentage => 1,
            DiscountType::TimeBased => 2,
            DiscountType::FixedAmount => 3,
        }
    }
}

impl TryFrom<u8> for DiscountType {
    type Error = UnknownDiscountTypeOrdinal;

    fn try_from(ordinal: u8) -> Result<Self, Self::Error> {
        match ordinal {
            0 => Ok(DiscountType::Unknown),
            1 => Ok(DiscountType::Percentage),
            2 => Ok(DiscountType::TimeBased),
            3 => Ok(DiscountType::FixedAmount),
            other => Err(UnknownDiscountTypeOrdinal(other)),
        }
    }
}

/// How a phase's discount spreads across billing cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscountApplication {
    /// Repeats on every covered cycle.
    Recurring,

    /// Piles onto the first cycle, overflowing into later cycles at the unit price cap.
    Spread,

    /// Applies once.
    OneTime,

    /// Sentinel for a missing application. Never valid input.
    #[default]
    Unknown,
}

impl fmt::Display for DiscountApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiscountApplication::Recurring => "recurring",
            DiscountApplication::Spread => "spread",
            DiscountApplication::OneTime => "one-time",
            DiscountApplication::Unknown => "unknown",
        })
    }
}

/// A discount rule over a segment of the subscription timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscountPhase {
    /// Phase length, measured in `duration_unit`.
    pub duration: u32,

    /// Clock the phase length is measured on.
    pub duration_unit: TimeUnit,

    /// Percentage points, or an amount per cycle for fixed amount phases.
    pub discount_value: Decimal,

    /// How `discount_value` is interpreted.
    pub discount_type: DiscountType,

    /// How the discount spreads across cycles.
    pub application: DiscountApplication,

    /// Maximum number of billing cycles the phase may cover.
    pub applicable_number_of_billing_cycles: u32,

    /// Free text shown to customers.
    pub description: String,

    /// Derivation of the latest evaluation, one step per line.
    pub logs: Vec<String>,

    /// Discount per billing cycle from the latest evaluation, keyed from cycle 1.
    pub discounts_per_billing_cycle: BTreeMap<u32, f64>,
}

impl DiscountPhase {
    /// Percentage points off for `duration` units.
    pub fn percentage(
        discount_value: Decimal,
        duration: u32,
        duration_unit: TimeUnit,
        application: DiscountApplication,
        applicable_number_of_billing_cycles: u32,
    ) -> Self {
        Self {
            duration,
            duration_unit,
            discount_value,
            discount_type: DiscountType::Percentage,
            application,
            applicable_number_of_billing_cycles,
            ..Self::default()
        }
    }

    /// Free for `duration` units.
    pub fn time_based(
        duration: u32,
        duration_unit: TimeUnit,
        application: DiscountApplication,
        applicable_number_of_billing_cycles: u32,
    ) -> Self {
        Self {
            discount_type: DiscountType::TimeBased,
            ..Self::percentage(
                Decimal::ONE_HUNDRED,
                duration,
                duration_unit,
                application,
                applicable_number_of_billing_cycles,
            )
        }
    }

    /// A fixed amount off each of `applicable_number_of_billing_cycles` cycles.
    pub fn fixed_amount(
        discount_value: Decimal,
        application: DiscountApplication,
        applicable_number_of_billing_cycles: u32,
    ) -> Self {
        Self {
            discount_value,
            discount_type: DiscountType::FixedAmount,
            application,
            applicable_number_of_billing_cycles,
            ..Self::default()
        }
    }

    /// Attach a customer-facing description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Discount value used for pricing; time-based phases are always 100% off.
    pub fn effective_discount_value(&self) -> Decimal {
        match self.discount_type {
            DiscountType::TimeBased => Decimal::ONE_HUNDRED,
            _ => self.discount_value,
        }
    }

    /// Check the phase in isolation, according to its discount type.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] the phase violates.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.discount_type {
            DiscountType::Percentage | DiscountType::TimeBased => self.validate_percentage(),
            DiscountType::FixedAmount => self.validate_fixed_amount(),
            DiscountType::Unknown => Err(ValidationError::UnknownDiscountType),
        }
    }

    /// Check the phase against the billing period of the subscription that owns it.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] the phase violates.
    pub fn validate_for(&self, billing_period: TimeUnit) -> Result<(), ValidationError> {
        self.validate()?;

        if self.discount_type != DiscountType::FixedAmount && self.duration_unit > billing_period
        {
            return Err(ValidationError::DurationUnitExceedsBillingPeriod {
                duration_unit: self.duration_unit,
                billing_period,
            });
        }

        Ok(())
    }

    fn validate_percentage(&self) -> Result<(), ValidationError> {
        let value = self.effective_discount_value();

        if value <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveDiscount(value));
        }

        if value > Decimal::ONE_HUNDRED {
            return Err(ValidationError::PercentageAboveHundred(value));
        }

        if !self.duration_unit.is_valid() {
            return Err(ValidationError::UnknownDurationUnit);
        }

        if self.duration == 0 {
            return Err(ValidationError::NonPositiveDuration);
        }

        if self.application == DiscountApplication::Unknown {
            return Err(ValidationError::UnknownApplication);
        }

        Ok(())
    }

    fn validate_fixed_amount(&self) -> Result<(), ValidationError> {
        if self.discount_value <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveDiscount(self.discount_value));
        }

        if self.duration_unit.is_valid() {
            return Err(ValidationError::FixedAmountDurationUnit(self.duration_unit));
        }

        if self.duration != 0 {
            return Err(ValidationError::FixedAmountDuration(self.duration));
        }

        if !matches!(
            self.application,
            DiscountApplication::OneTime | DiscountApplication::Recurring
        ) {
            return Err(ValidationError::FixedAmountApplication(self.application));
        }

        match (self.application, self.applicable_number_of_billing_cycles) {
            (_, 0) => Err(ValidationError::NoApplicableBillingCycles),
            (DiscountApplication::OneTime, cycles) if cycles != 1 => {
                Err(ValidationError::OneTimeBillingCycles(cycles))
            }
            _ => Ok(()),
        }
    }
}
