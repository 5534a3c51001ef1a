//! Subscriptions

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    decimals::checked_product,
    errors::{PricingError, ValidationError},
    phases::DiscountPhase,
    time_units::{TimeUnit, normalize_duration},
};

/// Billing schedule and discount phases of a subscription line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionInfo {
    /// Whether the subscription renews.
    pub is_recurring: bool,

    /// Length of one billing cycle.
    pub billing_period_unit: TimeUnit,

    /// Length of the free trial, in `trial_period_unit`. Zero for no trial.
    pub trial_period: u32,

    /// Clock the trial length is measured on.
    pub trial_period_unit: TimeUnit,

    /// Discount phases, in timeline order.
    pub discount_phases: Vec<DiscountPhase>,
}

impl SubscriptionInfo {
    /// A recurring subscription billed every `billing_period_unit`, without trial or phases.
    pub fn new(billing_period_unit: TimeUnit) -> Self {
        Self {
            is_recurring: true,
            billing_period_unit,
            ..Self::default()
        }
    }

    /// Add a free trial.
    #[must_use]
    pub fn with_trial(mut self, trial_period: u32, trial_period_unit: TimeUnit) -> Self {
        self.trial_period = trial_period;
        self.trial_period_unit = trial_period_unit;
        self
    }

    /// Append a discount phase.
    #[must_use]
    pub fn with_phase(mut self, phase: DiscountPhase) -> Self {
        self.discount_phases.push(phase);
        self
    }

    /// Check the billing period, the trial unit and every phase against the billing period.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, checking phases in order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.billing_period_unit.is_valid() {
            return Err(ValidationError::UnknownBillingPeriod);
        }

        if self.trial_period > 0 && !self.trial_period_unit.is_valid() {
            return Err(ValidationError::UnknownTrialPeriodUnit(self.trial_period));
        }

        if self.is_recurring && self.discount_phases.is_empty() {
            return Err(ValidationError::MissingDiscountPhases);
        }

        self.discount_phases
            .iter()
            .try_for_each(|phase| phase.validate_for(self.billing_period_unit))
    }

    /// Value of the trial: the unit price for every billing cycle the trial covers.
    ///
    /// Reported on its own; it is not part of any phase total.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError::UnitConversion`] if the trial length cannot be expressed in
    /// billing cycles, or [`PricingError::DecimalParse`] if its value overflows.
    pub fn trial_discount(&self, unit_price: Decimal) -> Result<Decimal, PricingError> {
        if self.trial_period == 0 {
            return Ok(Decimal::ZERO);
        }

        let ratio = normalize_duration(
            self.trial_period,
            self.trial_period_unit,
            self.billing_period_unit,
        )?;

        Ok(checked_product(unit_price, ratio)?)
    }
}
