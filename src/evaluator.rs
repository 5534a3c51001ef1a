//! Discount Phase Evaluator
//!
//! Prices a single [`DiscountPhase`] against the subscription it belongs to. Evaluation is pure:
//! it returns a [`PhaseResult`] holding the phase total, the per-cycle breakdown and a narrative
//! of how both were derived.

use std::collections::BTreeMap;

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use tracing::debug;

use crate::{
    decimals::{PricingConfig, checked_difference, checked_product, to_f64},
    errors::{PricingError, ValidationError},
    phases::{DiscountApplication, DiscountPhase, DiscountType},
    time_units::{TimeUnit, normalize_duration},
};

/// Subscription context a phase is priced against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseContext {
    /// Price of one billing cycle.
    pub unit_price: Decimal,

    /// Length of one billing cycle.
    pub billing_period_unit: TimeUnit,

    /// Rounding applied to the outputs.
    pub config: PricingConfig,
}

impl PhaseContext {
    /// Context with the default rounding policy.
    pub fn new(unit_price: Decimal, billing_period_unit: TimeUnit) -> Self {
        Self {
            unit_price,
            billing_period_unit,
            config: PricingConfig::default(),
        }
    }

    /// Replace the rounding policy.
    #[must_use]
    pub fn with_config(mut self, config: PricingConfig) -> Self {
        self.config = config;
        self
    }
}

/// Outcome of evaluating one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseResult {
    /// Total discount for the phase, rounded.
    pub total: Decimal,

    /// Rounded discount per billing cycle, keyed from cycle 1.
    pub per_cycle: BTreeMap<u32, Decimal>,

    /// How the discount was derived, one step per line.
    pub log: Vec<String>,
}

impl PhaseResult {
    /// Rounded per-cycle discounts as floats, for reporting.
    pub fn per_cycle_f64(&self) -> BTreeMap<u32, f64> {
        self.per_cycle
            .iter()
            .map(|(&cycle, &amount)| (cycle, to_f64(amount)))
            .collect()
    }

    /// Copy the outputs onto the phase they were computed for, replacing earlier outputs.
    pub fn record_on(&self, phase: &mut DiscountPhase) {
        phase.logs.clone_from(&self.log);
        phase.discounts_per_billing_cycle = self.per_cycle_f64();
    }
}

/// Evaluate a phase against its subscription context.
///
/// # Errors
///
/// Returns a [`PricingError`] if:
/// - the phase fails its own validation, or the billing period is unknown;
/// - a recurring percentage phase spans several cycles without being measured in billing
///   periods ([`ValidationError::BillingCycleSpan`]);
/// - the duration cannot be normalised to the billing period (for example `NoBilling`);
/// - an intermediate amount overflows ([`PricingError::DecimalParse`]).
#[tracing::instrument(
    name = "evaluator.evaluate_phase",
    skip_all,
    fields(
        discount_type = %phase.discount_type,
        application = %phase.application,
        billing_period = %ctx.billing_period_unit
    )
)]
pub fn evaluate_phase(
    phase: &DiscountPhase,
    ctx: &PhaseContext,
) -> Result<PhaseResult, PricingError> {
    phase.validate()?;

    if !ctx.billing_period_unit.is_valid() {
        return Err(ValidationError::UnknownBillingPeriod.into());
    }

    let mut ledger = Ledger::default();

    ledger.note(format!("unit price: {}", ctx.unit_price));
    ledger.note(format!(
        "discount type: {}, application: {}",
        phase.discount_type, phase.application
    ));

    let total = match phase.discount_type {
        DiscountType::Percentage | DiscountType::TimeBased => {
            percentage_discount(phase, ctx, &mut ledger)?
        }
        DiscountType::FixedAmount => fixed_amount_discount(phase, ctx, &mut ledger)?,
        DiscountType::Unknown => return Err(ValidationError::UnknownDiscountType.into()),
    };

    let total = ctx.config.round(total);

    ledger.note(format!("phase discount: {total}"));

    debug!(%total, cycles = ledger.cycles.len(), "evaluated discount phase");

    Ok(ledger.finish(total, ctx.config))
}

/// Working state for one evaluation.
#[derive(Debug, Default)]
struct Ledger {
    cycles: BTreeMap<u32, Decimal>,
    log: Vec<String>,
}

impl Ledger {
    fn note(&mut self, line: String) {
        self.log.push(line);
    }

    fn set(&mut self, cycle: u32, amount: Decimal) {
        self.cycles.insert(cycle, amount);
    }

    fn finish(self, total: Decimal, config: PricingConfig) -> PhaseResult {
        PhaseResult {
            total,
            per_cycle: self
                .cycles
                .into_iter()
                .map(|(cycle, amount)| (cycle, config.round(amount)))
                .collect(),
            log: self.log,
        }
    }
}

/// Percentage and time-based phases.
fn percentage_discount(
    phase: &DiscountPhase,
    ctx: &PhaseContext,
    ledger: &mut Ledger,
) -> Result<Decimal, PricingError> {
    let value = phase.effective_discount_value();
    let ratio = normalize_duration(phase.duration, phase.duration_unit, ctx.billing_period_unit)?;

    ledger.note(format!(
        "{} {} is {ratio} {} cycle(s)",
        phase.duration, phase.duration_unit, ctx.billing_period_unit
    ));

    let rate = Percentage::from(value / Decimal::ONE_HUNDRED);
    let per_cycle = rate * ctx.unit_price;

    ledger.note(format!("{value}% of {} is {per_cycle} per cycle", ctx.unit_price));

    if phase.application == DiscountApplication::Recurring {
        recurring_percentage(phase, ctx, ratio, per_cycle, ledger)
    } else {
        spread_percentage(phase, ctx, ratio, rate, per_cycle, ledger)
    }
}

/// The same percentage off every covered cycle, prorated when the phase is shorter than one.
fn recurring_percentage(
    phase: &DiscountPhase,
    ctx: &PhaseContext,
    ratio: Decimal,
    per_cycle: Decimal,
    ledger: &mut Ledger,
) -> Result<Decimal, PricingError> {
    if ratio <= Decimal::ONE {
        let prorated = checked_product(per_cycle, ratio)?;

        ledger.set(1, prorated);
        ledger.note(format!("prorated first cycle discount: {prorated}"));

        return Ok(prorated);
    }

    ensure_billing_cycle_span(phase, ctx.billing_period_unit)?;

    let limit = Decimal::from(phase.applicable_number_of_billing_cycles);
    let cycles = ratio.min(limit);

    if cycles < ratio {
        ledger.note(format!("capped {ratio} cycles to {cycles} applicable cycles"));
    }

    let total = checked_product(per_cycle, cycles)?;

    // Past the span check the phase runs on the billing clock, so `cycles` is whole.
    for cycle in 1..=whole_cycles(cycles) {
        ledger.set(cycle, per_cycle);
    }

    ledger.note(format!("{per_cycle} over {cycles} cycle(s): {total}"));

    Ok(total)
}

/// A recurring phase longer than one cycle must be measured on the billing clock.
fn ensure_billing_cycle_span(
    phase: &DiscountPhase,
    billing_period: TimeUnit,
) -> Result<(), ValidationError> {
    let phase_hours = u64::from(phase.duration_unit.hours()) * u64::from(phase.duration);

    if phase.duration_unit == billing_period || phase_hours <= u64::from(billing_period.hours()) {
        Ok(())
    } else {
        Err(ValidationError::BillingCycleSpan {
            duration: phase.duration,
            duration_unit: phase.duration_unit,
            billing_period,
        })
    }
}

/// Spread and one-time phases: the whole discount lands on the first cycle, then overflows
/// into later cycles once it exceeds the unit price.
fn spread_percentage(
    phase: &DiscountPhase,
    ctx: &PhaseContext,
    ratio: Decimal,
    rate: Percentage,
    per_cycle: Decimal,
    ledger: &mut Ledger,
) -> Result<Decimal, PricingError> {
    let mut discount = checked_product(per_cycle, ratio)?;

    ledger.set(1, discount);
    ledger.note(format!("discount before caps: {discount}"));

    if ratio <= Decimal::ONE {
        return Ok(discount);
    }

    let limit = Decimal::from(phase.applicable_number_of_billing_cycles);
    let remaining = (ratio - limit).max(Decimal::ZERO);

    if remaining > Decimal::ZERO {
        let removed = rate * checked_product(ctx.unit_price, remaining)?;

        discount = checked_difference(discount, removed)?;

        ledger.set(1, discount);
        ledger.note(format!(
            "removed {remaining} cycle(s) beyond the {limit} applicable: {discount}"
        ));
    }

    if ctx.unit_price >= discount {
        return Ok(discount);
    }

    if phase.applicable_number_of_billing_cycles <= 1 {
        ledger.set(1, ctx.unit_price);
        ledger.note(format!("capped single cycle discount to unit price {}", ctx.unit_price));

        return Ok(ctx.unit_price);
    }

    spread_across_cycles(discount, ctx, ledger)?;

    Ok(discount)
}

/// Fill whole cycles at the unit price, then put what is left on the next cycle.
fn spread_across_cycles(
    discount: Decimal,
    ctx: &PhaseContext,
    ledger: &mut Ledger,
) -> Result<(), PricingError> {
    let Some(quotient) = ctx.config.quotient(discount, ctx.unit_price) else {
        return Ok(());
    };

    let mut full = whole_cycles(quotient);
    let mut covered = checked_product(Decimal::from(full), ctx.unit_price)?;

    // Rounding the quotient up must not leave a negative remainder.
    if covered > discount {
        full = full.saturating_sub(1);
        covered = checked_difference(covered, ctx.unit_price)?;
    }

    for cycle in 1..=full {
        ledger.set(cycle, ctx.unit_price);
    }

    let leftover = checked_difference(discount, covered)?;

    if !leftover.is_zero() {
        ledger.set(full.saturating_add(1), leftover);
    }

    ledger.note(format!(
        "spread {discount} as {full} cycle(s) at {} plus {leftover}",
        ctx.unit_price
    ));

    Ok(())
}

/// Fixed amounts run on the billing clock: one duration unit per applicable cycle.
fn fixed_amount_discount(
    phase: &DiscountPhase,
    ctx: &PhaseContext,
    ledger: &mut Ledger,
) -> Result<Decimal, PricingError> {
    let cycles = phase.applicable_number_of_billing_cycles;
    let ratio = normalize_duration(cycles, ctx.billing_period_unit, ctx.billing_period_unit)?;

    ledger.note(format!("{cycles} {} cycle(s) is {ratio} cycle(s)", ctx.billing_period_unit));

    let capped = phase.discount_value.min(ctx.unit_price);

    if capped < phase.discount_value {
        ledger.note(format!(
            "capped {} to unit price {}",
            phase.discount_value, ctx.unit_price
        ));
    }

    if phase.application == DiscountApplication::Recurring {
        let total = checked_product(capped, Decimal::from(cycles))?;

        for cycle in 1..=cycles {
            ledger.set(cycle, capped);
        }

        ledger.note(format!("{capped} on each of {cycles} cycle(s): {total}"));

        Ok(total)
    } else {
        ledger.set(1, capped);
        ledger.note(format!("{capped} once"));

        Ok(capped)
    }
}

fn whole_cycles(cycles: Decimal) -> u32 {
    cycles.floor().to_u32().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::decimals::DecimalError;

    use super::*;

    fn monthly(unit_price: i64) -> PhaseContext {
        PhaseContext::new(Decimal::from(unit_price), TimeUnit::Monthly)
    }

    fn cycle(result: &PhaseResult, cycle: u32) -> Option<Decimal> {
        result.per_cycle.get(&cycle).copied()
    }

    #[test]
    fn recurring_percentage_single_cycle() -> TestResult {
        let phase = DiscountPhase::percentage(
            Decimal::from(20),
            1,
            TimeUnit::Monthly,
            DiscountApplication::Recurring,
            12,
        );

        let result = evaluate_phase(&phase, &monthly(100))?;

        assert_eq!(result.total, Decimal::from(20));
        assert_eq!(cycle(&result, 1), Some(Decimal::from(20)));
        assert_eq!(result.per_cycle.len(), 1);

        Ok(())
    }

    #[test]
    fn recurring_percentage_prorates_partial_cycle() -> TestResult {
        let phase = DiscountPhase::percentage(
            Decimal::from(50),
            2,
            TimeUnit::Daily,
            DiscountApplication::Recurring,
            12,
        );

        let result = evaluate_phase(&phase, &monthly(10))?;

        assert_eq!(result.total, Decimal::new(33, 2));
        assert_eq!(cycle(&result, 1), Some(Decimal::new(33, 2)));

        Ok(())
    }

    #[test]
    fn recurring_percentage_over_several_cycles() -> TestResult {
        let phase = DiscountPhase::percentage(
            Decimal::from(50),
            2,
            TimeUnit::Monthly,
            DiscountApplication::Recurring,
            3,
        );

        let result = evaluate_phase(&phase, &monthly(10))?;

        assert_eq!(result.total, Decimal::TEN);
        assert_eq!(cycle(&result, 1), Some(Decimal::from(5)));
        assert_eq!(cycle(&result, 2), Some(Decimal::from(5)));
        assert_eq!(cycle(&result, 3), None);

        Ok(())
    }

    #[test]
    fn recurring_percentage_caps_to_applicable_cycles() -> TestResult {
        let phase = DiscountPhase::percentage(
            Decimal::from(25),
            6,
            TimeUnit::Monthly,
            DiscountApplication::Recurring,
            4,
        );

        let result = evaluate_phase(&phase, &monthly(20))?;

        assert_eq!(result.total, Decimal::from(20));
        assert_eq!(result.per_cycle.len(), 4);
        assert_eq!(cycle(&result, 4), Some(Decimal::from(5)));

        Ok(())
    }

    #[test]
    fn recurring_percentage_rejects_foreign_clock_spanning_cycles() {
        let phase = DiscountPhase::percentage(
            Decimal::from(10),
            45,
            TimeUnit::Daily,
            DiscountApplication::Recurring,
            3,
        );

        assert_eq!(
            evaluate_phase(&phase, &monthly(10)),
            Err(PricingError::Validation(ValidationError::BillingCycleSpan {
                duration: 45,
                duration_unit: TimeUnit::Daily,
                billing_period: TimeUnit::Monthly,
            }))
        );
    }

    #[test]
    fn time_based_spread_overflows_into_next_cycle() -> TestResult {
        let phase = DiscountPhase::time_based(32, TimeUnit::Daily, DiscountApplication::Spread, 2);

        let result = evaluate_phase(&phase, &monthly(10))?;

        assert_eq!(result.total, Decimal::new(1067, 2));
        assert_eq!(cycle(&result, 1), Some(Decimal::TEN));
        assert_eq!(cycle(&result, 2), Some(Decimal::new(67, 2)));

        Ok(())
    }

    #[test]
    fn spread_caps_single_cycle_to_unit_price() -> TestResult {
        let phase = DiscountPhase::time_based(45, TimeUnit::Daily, DiscountApplication::OneTime, 1);

        let result = evaluate_phase(&phase, &monthly(10))?;

        assert_eq!(result.total, Decimal::TEN);
        assert_eq!(cycle(&result, 1), Some(Decimal::TEN));
        assert_eq!(result.per_cycle.len(), 1);

        Ok(())
    }

    #[test]
    fn spread_removes_cycles_beyond_limit() -> TestResult {
        // 3 months at 50% with two applicable cycles: 15 - 5 = 10, which fits one cycle.
        let phase = DiscountPhase::percentage(
            Decimal::from(50),
            90,
            TimeUnit::Daily,
            DiscountApplication::Spread,
            2,
        );

        let result = evaluate_phase(&phase, &monthly(10))?;

        assert_eq!(result.total, Decimal::TEN);
        assert_eq!(cycle(&result, 1), Some(Decimal::TEN));
        assert_eq!(cycle(&result, 2), None);

        Ok(())
    }

    #[test]
    fn fixed_amount_recurring_repeats_each_cycle() -> TestResult {
        let phase = DiscountPhase::fixed_amount(Decimal::from(5), DiscountApplication::Recurring, 2);

        let result = evaluate_phase(&phase, &monthly(10))?;

        assert_eq!(result.total, Decimal::TEN);
        assert_eq!(cycle(&result, 1), Some(Decimal::from(5)));
        assert_eq!(cycle(&result, 2), Some(Decimal::from(5)));

        Ok(())
    }

    #[test]
    fn fixed_amount_is_capped_to_unit_price() -> TestResult {
        let phase =
            DiscountPhase::fixed_amount(Decimal::from(30), DiscountApplication::Recurring, 3);

        let result = evaluate_phase(&phase, &monthly(10))?;

        assert_eq!(result.total, Decimal::from(30));
        assert!(result.per_cycle.values().all(|amount| *amount == Decimal::TEN));

        Ok(())
    }

    #[test]
    fn fixed_amount_one_time_applies_once() -> TestResult {
        let phase = DiscountPhase::fixed_amount(Decimal::from(30), DiscountApplication::OneTime, 1);

        let result = evaluate_phase(&phase, &monthly(100))?;

        assert_eq!(result.total, Decimal::from(30));
        assert_eq!(cycle(&result, 1), Some(Decimal::from(30)));

        Ok(())
    }

    #[test]
    fn fixed_amount_one_time_over_several_cycles_is_rejected() {
        let phase = DiscountPhase::fixed_amount(Decimal::from(30), DiscountApplication::OneTime, 6);

        assert_eq!(
            evaluate_phase(&phase, &monthly(100)),
            Err(PricingError::Validation(
                ValidationError::OneTimeBillingCycles(6)
            ))
        );
    }

    #[test]
    fn no_billing_period_is_a_conversion_error() {
        let phase = DiscountPhase::fixed_amount(Decimal::from(5), DiscountApplication::Recurring, 2);
        let ctx = PhaseContext::new(Decimal::TEN, TimeUnit::NoBilling);

        assert!(matches!(
            evaluate_phase(&phase, &ctx),
            Err(PricingError::UnitConversion(_))
        ));
    }

    #[test]
    fn unknown_billing_period_is_rejected() {
        let phase = DiscountPhase::fixed_amount(Decimal::from(5), DiscountApplication::Recurring, 2);
        let ctx = PhaseContext::new(Decimal::TEN, TimeUnit::Unknown);

        assert_eq!(
            evaluate_phase(&phase, &ctx),
            Err(PricingError::Validation(
                ValidationError::UnknownBillingPeriod
            ))
        );
    }

    #[test]
    fn recurring_percentage_over_several_cycles_has_no_partial_cycle() -> TestResult {
        let phase = DiscountPhase::percentage(
            Decimal::from(10),
            3,
            TimeUnit::Weekly,
            DiscountApplication::Recurring,
            2,
        );
        let ctx = PhaseContext::new(Decimal::from(30), TimeUnit::Weekly);

        let result = evaluate_phase(&phase, &ctx)?;

        assert_eq!(result.total, Decimal::from(6));
        assert_eq!(result.per_cycle.keys().copied().collect::<Vec<_>>(), [1, 2]);

        Ok(())
    }

    #[test]
    fn overflowing_amounts_are_errors() {
        let ctx = PhaseContext::new(Decimal::MAX, TimeUnit::Hourly);

        let spread = DiscountPhase::time_based(
            u32::MAX,
            TimeUnit::Hourly,
            DiscountApplication::Spread,
            u32::MAX,
        );
        let recurring = DiscountPhase::fixed_amount(
            Decimal::MAX,
            DiscountApplication::Recurring,
            u32::MAX,
        );

        for phase in [spread, recurring] {
            assert!(matches!(
                evaluate_phase(&phase, &ctx),
                Err(PricingError::DecimalParse(DecimalError::ArithmeticOverflow { .. }))
            ));
        }
    }

    #[test]
    fn evaluation_is_deterministic_and_logged() -> TestResult {
        let phase = DiscountPhase::time_based(32, TimeUnit::Daily, DiscountApplication::Spread, 2);
        let ctx = monthly(10);

        let first = evaluate_phase(&phase, &ctx)?;
        let second = evaluate_phase(&phase, &ctx)?;

        assert_eq!(first, second);
        assert!(first.log.iter().any(|line| line.contains("unit price: 10")));
        assert!(first.log.iter().any(|line| line.starts_with("spread")));

        Ok(())
    }

    #[test]
    fn record_on_replaces_phase_outputs() -> TestResult {
        let mut phase =
            DiscountPhase::fixed_amount(Decimal::from(5), DiscountApplication::Recurring, 2);
        phase.logs.push("stale".to_string());

        let result = evaluate_phase(&phase, &monthly(10))?;
        result.record_on(&mut phase);

        assert_eq!(phase.logs, result.log);
        assert_eq!(phase.discounts_per_billing_cycle.len(), 2);
        assert!(
            phase
                .discounts_per_billing_cycle
                .get(&2)
                .is_some_and(|amount| (amount - 5.0).abs() < f64::EPSILON)
        );

        Ok(())
    }
}
