//! Items
//!
//! A cart line item: a SKU bought in some quantity at a unit price, discounted either per unit
//! or, for subscriptions, through an ordered list of discount phases.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::warn;

use crate::{
    decimals::{PricingConfig, checked_difference, checked_sum, parse_decimal},
    errors::{PricingError, ValidationError},
    evaluator::{PhaseContext, PhaseResult, evaluate_phase},
    phases::{DiscountPhase, DiscountType},
    subscriptions::SubscriptionInfo,
};

/// Totals produced by [`CartItem::recompute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineItemTotals {
    /// Unit price times quantity.
    pub gross: Decimal,

    /// Sum of every discount on the line.
    pub discount: Decimal,

    /// Gross minus discount. Negative when a multi-cycle discount exceeds one cycle's gross.
    pub net: Decimal,

    /// Value of the subscription trial, reported apart from `discount`.
    pub trial_discount: Decimal,
}

/// A cart line item.
///
/// Totals are computed on demand. Setters only check their own preconditions; a configuration
/// that is invalid as a whole surfaces from the total getters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CartItem {
    sku_id: String,
    quantity: i64,
    unit_price: Decimal,
    number_of_units_discounted: i64,
    discount_value_per_discounted_unit: Decimal,
    discount_type: DiscountType,
    is_subscription: bool,
    subscription: Option<SubscriptionInfo>,
}

impl CartItem {
    /// A plain line item without discounts.
    pub fn new(sku_id: impl Into<String>, quantity: i64, unit_price: Decimal) -> Self {
        Self {
            sku_id: sku_id.into(),
            quantity,
            unit_price,
            ..Self::default()
        }
    }

    /// A single-unit subscription line item.
    pub fn subscription(
        sku_id: impl Into<String>,
        unit_price: Decimal,
        subscription: SubscriptionInfo,
    ) -> Self {
        Self {
            sku_id: sku_id.into(),
            quantity: 1,
            unit_price,
            is_subscription: true,
            subscription: Some(subscription),
            ..Self::default()
        }
    }

    /// Discount `units` of the line by `value` each, as an amount or as percentage points.
    #[must_use]
    pub fn with_unit_discount(
        mut self,
        units: i64,
        value: Decimal,
        discount_type: DiscountType,
    ) -> Self {
        self.number_of_units_discounted = units;
        self.discount_value_per_discounted_unit = value;
        self.discount_type = discount_type;
        self
    }

    /// SKU of the item.
    pub fn sku_id(&self) -> &str {
        &self.sku_id
    }

    /// Number of units.
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    /// Price of one unit, or of one billing cycle for subscriptions.
    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// Number of units the per-unit discount applies to.
    pub fn number_of_units_discounted(&self) -> i64 {
        self.number_of_units_discounted
    }

    /// Per-unit discount value.
    pub fn discount_value_per_discounted_unit(&self) -> Decimal {
        self.discount_value_per_discounted_unit
    }

    /// How the per-unit discount value is interpreted.
    pub fn discount_type(&self) -> DiscountType {
        self.discount_type
    }

    /// Whether the line is priced as a subscription.
    pub fn is_subscription(&self) -> bool {
        self.is_subscription
    }

    /// Subscription details, if any.
    pub fn subscription_info(&self) -> Option<&SubscriptionInfo> {
        self.subscription.as_ref()
    }

    /// Subscription details, mutably.
    pub fn subscription_info_mut(&mut self) -> Option<&mut SubscriptionInfo> {
        self.subscription.as_mut()
    }

    /// Discount phases, empty for non-subscription items.
    pub fn phases(&self) -> &[DiscountPhase] {
        self.subscription
            .as_ref()
            .map(|info| info.discount_phases.as_slice())
            .unwrap_or_default()
    }

    /// Check every line item and phase invariant. Never mutates.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity < 0 {
            return Err(ValidationError::NegativeQuantity(self.quantity));
        }

        if self.unit_price < Decimal::ZERO {
            return Err(ValidationError::NegativeUnitPrice(self.unit_price));
        }

        if self.discount_value_per_discounted_unit < Decimal::ZERO {
            return Err(ValidationError::NegativeDiscountPerUnit(
                self.discount_value_per_discounted_unit,
            ));
        }

        if !(0..=self.quantity).contains(&self.number_of_units_discounted) {
            return Err(ValidationError::DiscountedUnitsOutOfRange {
                discounted: self.number_of_units_discounted,
                quantity: self.quantity,
            });
        }

        if self
            .unit_price
            .checked_mul(Decimal::from(self.quantity))
            .is_none()
        {
            return Err(ValidationError::GrossTotalOverflow {
                quantity: self.quantity,
                unit_price: self.unit_price,
            });
        }

        if !self.is_subscription {
            return Ok(());
        }

        if self.quantity > 1 {
            return Err(ValidationError::SubscriptionQuantity(self.quantity));
        }

        self.subscription
            .as_ref()
            .ok_or(ValidationError::MissingSubscription)?
            .validate()
    }

    /// Unit price times quantity, never below zero.
    ///
    /// Saturates at [`Decimal::MAX`] when the product overflows; [`CartItem::validate`] rejects
    /// such items.
    pub fn gross_total(&self) -> Decimal {
        let overflow = if (self.unit_price < Decimal::ZERO) == (self.quantity < 0) {
            Decimal::MAX
        } else {
            Decimal::ZERO
        };

        self.unit_price
            .checked_mul(Decimal::from(self.quantity))
            .unwrap_or(overflow)
            .max(Decimal::ZERO)
    }

    /// Total discount with the default rounding policy.
    ///
    /// # Errors
    ///
    /// See [`CartItem::total_discount_with`].
    pub fn total_discount(&self) -> Result<Decimal, PricingError> {
        self.total_discount_with(PricingConfig::default())
    }

    /// Total discount on the line: the per-unit discount, or the sum of every phase.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if validation fails, the subscription has no phases, any
    /// phase fails to evaluate, or the amounts overflow.
    pub fn total_discount_with(&self, config: PricingConfig) -> Result<Decimal, PricingError> {
        self.validate()?;

        if !self.is_subscription {
            return Ok(self.unit_discount(config));
        }

        let results = self.evaluate_phases_with(config)?;

        Ok(checked_sum(results.iter().map(|result| result.total))?)
    }

    /// Net total with the default rounding policy.
    ///
    /// # Errors
    ///
    /// Fails exactly when [`CartItem::total_discount`] fails.
    pub fn net_total(&self) -> Result<Decimal, PricingError> {
        self.net_total_with(PricingConfig::default())
    }

    /// Gross total minus total discount.
    ///
    /// Not clamped: a subscription discount spanning several cycles can exceed the gross total of
    /// a single cycle, and the net total is then negative.
    ///
    /// # Errors
    ///
    /// Fails exactly when [`CartItem::total_discount_with`] fails.
    pub fn net_total_with(&self, config: PricingConfig) -> Result<Decimal, PricingError> {
        let discount = self.total_discount_with(config)?;

        Ok(checked_difference(self.gross_total(), discount)?)
    }

    /// Trial value with the default rounding policy.
    ///
    /// # Errors
    ///
    /// See [`CartItem::trial_discount_with`].
    pub fn trial_discount(&self) -> Result<Decimal, PricingError> {
        self.trial_discount_with(PricingConfig::default())
    }

    /// Value of the subscription trial; zero without a trial or subscription.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError::UnitConversion`] if the trial cannot be expressed in billing
    /// cycles.
    pub fn trial_discount_with(&self, config: PricingConfig) -> Result<Decimal, PricingError> {
        match &self.subscription {
            Some(info) if self.is_subscription => {
                Ok(config.round(info.trial_discount(self.unit_price)?))
            }
            _ => Ok(Decimal::ZERO),
        }
    }

    /// Evaluate every phase without recording anything on the item.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the item is not a subscription with at least one phase,
    /// or if any phase fails to evaluate.
    pub fn evaluate_phases_with(
        &self,
        config: PricingConfig,
    ) -> Result<SmallVec<[PhaseResult; 4]>, PricingError> {
        let (ctx, info) = self.phase_context(config)?;

        info.discount_phases
            .iter()
            .map(|phase| evaluate_phase(phase, &ctx))
            .collect()
    }

    /// Recompute totals with the default rounding policy.
    ///
    /// # Errors
    ///
    /// See [`CartItem::recompute_with`].
    pub fn recompute(&mut self) -> Result<LineItemTotals, PricingError> {
        self.recompute_with(PricingConfig::default())
    }

    /// Compute every total and record each phase's logs and per-cycle discounts on it.
    ///
    /// The trial value is computed first. Phases are then evaluated in order and the first
    /// failure is returned unchanged; phases evaluated before it keep their new outputs.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if validation or any phase evaluation fails.
    #[tracing::instrument(
        name = "items.recompute",
        skip_all,
        fields(sku_id = %self.sku_id, subscription = self.is_subscription)
    )]
    pub fn recompute_with(&mut self, config: PricingConfig) -> Result<LineItemTotals, PricingError> {
        self.validate()?;

        let trial_discount = self.trial_discount_with(config)?;

        let discount = if self.is_subscription {
            let (ctx, _) = self.phase_context(config)?;
            let mut totals: SmallVec<[Decimal; 4]> = SmallVec::new();

            for (index, phase) in self.phases_mut().iter_mut().enumerate() {
                let result = evaluate_phase(phase, &ctx).inspect_err(|err| {
                    warn!(phase = index, error = %err, "discount phase evaluation failed");
                })?;

                result.record_on(phase);
                totals.push(result.total);
            }

            checked_sum(totals)?
        } else {
            self.unit_discount(config)
        };

        let gross = self.gross_total();

        Ok(LineItemTotals {
            gross,
            discount,
            net: checked_difference(gross, discount)?,
            trial_discount,
        })
    }

    /// Set the quantity.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the quantity is negative, exceeds one on a
    /// subscription, or drops below the number of discounted units.
    pub fn set_quantity(&mut self, quantity: i64) -> Result<(), PricingError> {
        if quantity < 0 {
            return Err(ValidationError::NegativeQuantity(quantity).into());
        }

        if self.is_subscription && quantity > 1 {
            return Err(ValidationError::SubscriptionQuantity(quantity).into());
        }

        if self.number_of_units_discounted > quantity {
            return Err(ValidationError::DiscountedUnitsOutOfRange {
                discounted: self.number_of_units_discounted,
                quantity,
            }
            .into());
        }

        self.quantity = quantity;

        Ok(())
    }

    /// Add one unit.
    ///
    /// # Errors
    ///
    /// See [`CartItem::set_quantity`].
    pub fn increment_quantity(&mut self) -> Result<(), PricingError> {
        self.set_quantity(self.quantity.saturating_add(1))
    }

    /// Remove one unit.
    ///
    /// # Errors
    ///
    /// See [`CartItem::set_quantity`].
    pub fn decrement_quantity(&mut self) -> Result<(), PricingError> {
        self.set_quantity(self.quantity.saturating_sub(1))
    }

    /// Set the unit price.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NegativeUnitPrice`] for negative prices.
    pub fn set_unit_price(&mut self, unit_price: Decimal) -> Result<(), PricingError> {
        if unit_price < Decimal::ZERO {
            return Err(ValidationError::NegativeUnitPrice(unit_price).into());
        }

        self.unit_price = unit_price;

        Ok(())
    }

    /// Set the unit price from a decimal literal.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::DecimalParse`] for malformed text, otherwise as
    /// [`CartItem::set_unit_price`].
    pub fn set_unit_price_from_str(&mut self, unit_price: &str) -> Result<(), PricingError> {
        self.set_unit_price(parse_decimal(unit_price)?)
    }

    /// Set the discount applied to each discounted unit.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NegativeDiscountPerUnit`] for negative values.
    pub fn set_discount_amount_per_unit(&mut self, value: Decimal) -> Result<(), PricingError> {
        if value < Decimal::ZERO {
            return Err(ValidationError::NegativeDiscountPerUnit(value).into());
        }

        self.discount_value_per_discounted_unit = value;

        Ok(())
    }

    /// Set the per-unit discount from a decimal literal.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::DecimalParse`] for malformed text, otherwise as
    /// [`CartItem::set_discount_amount_per_unit`].
    pub fn set_discount_amount_per_unit_from_str(
        &mut self,
        value: &str,
    ) -> Result<(), PricingError> {
        self.set_discount_amount_per_unit(parse_decimal(value)?)
    }

    /// Set how many units receive the per-unit discount.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DiscountedUnitsOutOfRange`] unless `0 <= units <= quantity`.
    pub fn set_discounted_unit_quantity(&mut self, units: i64) -> Result<(), PricingError> {
        if !(0..=self.quantity).contains(&units) {
            return Err(ValidationError::DiscountedUnitsOutOfRange {
                discounted: units,
                quantity: self.quantity,
            }
            .into());
        }

        self.number_of_units_discounted = units;

        Ok(())
    }

    /// Set how the per-unit discount value is interpreted.
    pub fn set_discount_type(&mut self, discount_type: DiscountType) {
        self.discount_type = discount_type;
    }

    fn phases_mut(&mut self) -> &mut [DiscountPhase] {
        self.subscription
            .as_mut()
            .map(|info| info.discount_phases.as_mut_slice())
            .unwrap_or_default()
    }

    fn phase_context(
        &self,
        config: PricingConfig,
    ) -> Result<(PhaseContext, &SubscriptionInfo), PricingError> {
        let info = self
            .subscription
            .as_ref()
            .ok_or(ValidationError::MissingSubscription)?;

        if info.discount_phases.is_empty() {
            return Err(ValidationError::MissingDiscountPhases.into());
        }

        let ctx = PhaseContext::new(self.unit_price, info.billing_period_unit).with_config(config);

        Ok((ctx, info))
    }

    /// Per-unit discount on a non-subscription line, capped at the gross total.
    fn unit_discount(&self, config: PricingConfig) -> Decimal {
        if self.number_of_units_discounted == 0 || self.discount_value_per_discounted_unit.is_zero()
        {
            return Decimal::ZERO;
        }

        let units = Decimal::from(self.number_of_units_discounted);

        let discount = match self.discount_type {
            DiscountType::Percentage => (self.discount_value_per_discounted_unit
                / Decimal::ONE_HUNDRED)
                .checked_mul(self.unit_price)
                .and_then(|amount| amount.checked_mul(units)),
            _ => self.discount_value_per_discounted_unit.checked_mul(units),
        };

        // An overflowing discount is above any gross total it is capped to.
        config.round(discount.unwrap_or(Decimal::MAX).min(self.gross_total()))
    }
}
