//! Schedule
//!
//! Per-cycle view of a subscription's discounts, rendered as a table.

use std::io;

use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use smallvec::SmallVec;
use tabled::{
    builder::Builder,
    settings::{
        Alignment, Style,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    decimals::{DecimalError, PricingConfig, checked_sum, to_money},
    errors::PricingError,
    items::CartItem,
};

/// Errors that can occur when rendering a schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// An amount could not be shown in the requested currency.
    #[error(transparent)]
    Decimal(#[from] DecimalError),

    /// IO error writing the table
    #[error("Failed to write schedule: {0}")]
    Io(#[from] io::Error),
}

/// One phase's discount on one billing cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRow {
    /// Position of the phase on the subscription timeline, from 1.
    pub phase: usize,

    /// Phase description, possibly empty.
    pub description: String,

    /// Billing cycle within the phase, from 1.
    pub cycle: u32,

    /// Rounded discount.
    pub amount: Decimal,
}

/// Discount schedule of a subscription line item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountSchedule {
    rows: SmallVec<[ScheduleRow; 8]>,
    total: Decimal,
}

impl DiscountSchedule {
    /// Evaluate every phase of `item` and collect the per-cycle discounts.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the item fails validation, any phase fails to evaluate, or
    /// the phase totals overflow.
    pub fn from_item(item: &CartItem, config: PricingConfig) -> Result<Self, PricingError> {
        item.validate()?;

        let results = item.evaluate_phases_with(config)?;

        let rows = item
            .phases()
            .iter()
            .zip(&results)
            .enumerate()
            .flat_map(|(index, (phase, result))| {
                result.per_cycle.iter().map(move |(&cycle, &amount)| ScheduleRow {
                    phase: index + 1,
                    description: phase.description.clone(),
                    cycle,
                    amount,
                })
            })
            .collect();

        Ok(Self {
            rows,
            total: checked_sum(results.iter().map(|result| result.total))?,
        })
    }

    /// Rows in phase order, then cycle order.
    pub fn rows(&self) -> &[ScheduleRow] {
        &self.rows
    }

    /// Sum of the phase totals.
    ///
    /// This is the line item's total discount, which can differ from the sum of the rows by
    /// rounding.
    pub fn total(&self) -> Decimal {
        self.total
    }

    /// Discount on one cycle, summed over every phase that touches it, saturating at
    /// [`Decimal::MAX`].
    pub fn cycle_total(&self, cycle: u32) -> Decimal {
        self.rows
            .iter()
            .filter(|row| row.cycle == cycle)
            .map(|row| row.amount)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Render the schedule as a table followed by the total.
    ///
    /// # Errors
    ///
    /// Returns a [`ScheduleError`] if an amount does not fit the currency or writing fails.
    pub fn write_to(
        &self,
        mut out: impl io::Write,
        currency: &'static Currency,
    ) -> Result<(), ScheduleError> {
        let mut builder = Builder::default();

        builder.push_record(["Phase", "Description", "Cycle", "Discount"]);

        for row in &self.rows {
            builder.push_record([
                row.phase.to_string(),
                row.description.clone(),
                row.cycle.to_string(),
                to_money(row.amount, currency)?.to_string(),
            ]);
        }

        let mut table = builder.build();

        table.with(Style::modern_rounded());
        table.modify(Rows::first(), Alignment::center());
        table.modify(Columns::new(2..4), Alignment::right());

        writeln!(out, "{table}")?;
        writeln!(out, " Total discount: {}", to_money(self.total(), currency)?)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use crate::{
        phases::{DiscountApplication, DiscountPhase},
        subscriptions::SubscriptionInfo,
        time_units::TimeUnit,
    };

    use super::*;

    struct ClosedPipe;

    impl io::Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn two_phase_item() -> CartItem {
        let info = SubscriptionInfo::new(TimeUnit::Monthly)
            .with_phase(
                DiscountPhase::time_based(32, TimeUnit::Daily, DiscountApplication::Spread, 2)
                    .with_description("Free first month"),
            )
            .with_phase(DiscountPhase::fixed_amount(
                Decimal::from(2),
                DiscountApplication::Recurring,
                3,
            ));

        CartItem::subscription("SUB-1", Decimal::TEN, info)
    }

    #[test]
    fn rows_follow_phase_then_cycle_order() -> TestResult {
        let schedule = DiscountSchedule::from_item(&two_phase_item(), PricingConfig::default())?;

        let keys: Vec<_> = schedule
            .rows()
            .iter()
            .map(|row| (row.phase, row.cycle))
            .collect();

        assert_eq!(keys, [(1, 1), (1, 2), (2, 1), (2, 2), (2, 3)]);
        assert_eq!(
            schedule.rows().first().map(|row| row.description.as_str()),
            Some("Free first month")
        );

        Ok(())
    }

    #[test]
    fn totals_match_the_line_item() -> TestResult {
        let item = two_phase_item();
        let schedule = DiscountSchedule::from_item(&item, PricingConfig::default())?;

        assert_eq!(schedule.total(), item.total_discount()?);
        assert_eq!(schedule.total(), Decimal::new(1667, 2));
        assert_eq!(schedule.cycle_total(1), Decimal::from(12));
        assert_eq!(schedule.cycle_total(2), Decimal::new(267, 2));
        assert_eq!(schedule.cycle_total(4), Decimal::ZERO);

        Ok(())
    }

    #[test]
    fn write_to_renders_money_in_currency() -> TestResult {
        let schedule = DiscountSchedule::from_item(&two_phase_item(), PricingConfig::default())?;

        let mut out = Vec::new();
        schedule.write_to(&mut out, GBP)?;

        let rendered = String::from_utf8(out)?;

        assert!(rendered.contains("Free first month"));
        assert!(rendered.contains("£10.00"));
        assert!(rendered.contains("£0.67"));
        assert!(rendered.contains("Total discount: £16.67"));

        Ok(())
    }

    #[test]
    fn write_to_uses_requested_currency() -> TestResult {
        let schedule = DiscountSchedule::from_item(&two_phase_item(), PricingConfig::default())?;

        let mut out = Vec::new();
        schedule.write_to(&mut out, USD)?;

        assert!(String::from_utf8(out)?.contains("$16.67"));

        Ok(())
    }

    #[test]
    fn write_to_keeps_the_io_error() -> TestResult {
        let schedule = DiscountSchedule::from_item(&two_phase_item(), PricingConfig::default())?;

        let result = schedule.write_to(ClosedPipe, GBP);

        assert!(matches!(
            result,
            Err(ScheduleError::Io(err)) if err.kind() == io::ErrorKind::BrokenPipe
        ));

        Ok(())
    }

    #[test]
    fn overflowing_phase_totals_have_no_schedule() {
        let phase = DiscountPhase::fixed_amount(Decimal::MAX, DiscountApplication::Recurring, 1);
        let info = SubscriptionInfo::new(TimeUnit::Monthly)
            .with_phase(phase.clone())
            .with_phase(phase);
        let item = CartItem::subscription("SUB-1", Decimal::MAX, info);

        assert!(matches!(
            DiscountSchedule::from_item(&item, PricingConfig::default()),
            Err(PricingError::DecimalParse(DecimalError::ArithmeticOverflow { .. }))
        ));
    }

    #[test]
    fn invalid_item_has_no_schedule() {
        let item = CartItem::subscription(
            "SUB-1",
            Decimal::TEN,
            SubscriptionInfo::new(TimeUnit::Monthly),
        );

        assert!(DiscountSchedule::from_item(&item, PricingConfig::default()).is_err());
    }
}
