//! Time Units
//!
//! Billing periods and phase durations share one closed set of units. Each unit has a fixed
//! hour count: months are normalised to 30 days and years to 365, so no calendar is involved.

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when converting between time units.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitConversionError {
    /// One side of the conversion was the `Unknown` sentinel.
    #[error("cannot convert {length} {from} to {to}: unknown time unit")]
    UnknownUnit {
        /// Length being converted
        length: u32,
        /// Source unit
        from: TimeUnit,
        /// Target unit
        to: TimeUnit,
    },

    /// The target unit has no hours, so the ratio is undefined.
    #[error("cannot convert {length} {from} to {to}: target unit spans zero hours")]
    ZeroLengthTarget {
        /// Length being converted
        length: u32,
        /// Source unit
        from: TimeUnit,
        /// Target unit
        to: TimeUnit,
    },

    /// No unit is encoded by this ordinal.
    #[error("no time unit has ordinal {0}")]
    UnknownOrdinal(u8),

    /// No unit has this name.
    #[error("no time unit is named {0:?}")]
    UnknownName(String),
}

/// A billing period or phase duration unit.
///
/// Declaration order is significant: a phase's duration unit may not be coarser than the
/// subscription's billing period. `Monthly` and `ThirtyDays` cover the same 720 hours but stay
/// distinct tags.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum TimeUnit {
    /// Sentinel for a missing unit. Never valid input.
    #[default]
    Unknown,
    /// One hour
    Hourly,
    /// 24 hours
    Daily,
    /// 7 days
    Weekly,
    /// 14 days
    BiWeekly,
    /// 30 days
    ThirtyDays,
    /// A month, normalised to 30 days
    Monthly,
    /// Three months, 90 days
    Quarterly,
    /// Half a year, 182.5 days
    BiAnnual,
    /// A year, normalised to 365 days
    Annual,
    /// Two years
    Biennial,
    /// The item is never billed.
    NoBilling,
}

impl TimeUnit {
    /// Every unit in declaration order.
    pub const ALL: [TimeUnit; 12] = [
        TimeUnit::Unknown,
        TimeUnit::Hourly,
        TimeUnit::Daily,
        TimeUnit::Weekly,
        TimeUnit::BiWeekly,
        TimeUnit::ThirtyDays,
        TimeUnit::Monthly,
        TimeUnit::Quarterly,
        TimeUnit::BiAnnual,
        TimeUnit::Annual,
        TimeUnit::Biennial,
        TimeUnit::NoBilling,
    ];

    /// Number of hours in one unit.
    pub const fn hours(self) -> u32 {
        match self {
            TimeUnit::Unknown | TimeUnit::NoBilling => 0,
            TimeUnit::Hourly => 1,
            TimeUnit::Daily => 24,
            TimeUnit::Weekly => 168,
            TimeUnit::BiWeekly => 336,
            TimeUnit::ThirtyDays | TimeUnit::Monthly => 720,
            TimeUnit::Quarterly => 2160,
            TimeUnit::BiAnnual => 4380,
            TimeUnit::Annual => 8760,
            TimeUnit::Biennial => 17520,
        }
    }

    /// Anything but the `Unknown` sentinel.
    pub const fn is_valid(self) -> bool {
        !matches!(self, TimeUnit::Unknown)
    }

    /// Canonical lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            TimeUnit::Unknown => "unknown",
            TimeUnit::Hourly => "hourly",
            TimeUnit::Daily => "daily",
            TimeUnit::Weekly => "weekly",
            TimeUnit::BiWeekly => "bi-weekly",
            TimeUnit::ThirtyDays => "thirty-days",
            TimeUnit::Monthly => "monthly",
            TimeUnit::Quarterly => "quarterly",
            TimeUnit::BiAnnual => "bi-annual",
            TimeUnit::Annual => "annual",
            TimeUnit::Biennial => "biennial",
            TimeUnit::NoBilling => "no-billing",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimeUnit {
    type Err = UnitConversionError;

    /// Names are matched case-insensitively, ignoring `-`, `_` and spaces, so `"BiWeekly"`,
    /// `"bi_weekly"` and `"bi-weekly"` are the same unit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        TimeUnit::ALL
            .into_iter()
            .find(|unit| unit.name().replace('-', "") == wanted)
            .ok_or_else(|| UnitConversionError::UnknownName(s.to_string()))
    }
}

impl From<TimeUnit> for u8 {
    fn from(unit: TimeUnit) -> Self {
        match unit {
            TimeUnit::Unknown => 0,
            TimeUnit::Hourly => 1,
            TimeUnit::Daily => 2,
            TimeUnit::Weekly => 3,
            TimeUnit::BiWeekly => 4,
            TimeUnit::ThirtyDays => 5,
            TimeUnit::Monthly => 6,
            TimeUnit::Quarterly => 7,
            TimeUnit::BiAnnual => 8,
            TimeUnit::Annual => 9,
            TimeUnit::Biennial => 10,
            TimeUnit::NoBilling => 11,
        }
    }
}

impl TryFrom<u8> for TimeUnit {
    type Error = UnitConversionError;

    fn try_from(ordinal: u8) -> Result<Self, Self::Error> {
        TimeUnit::ALL
            .get(usize::from(ordinal))
            .copied()
            .ok_or(UnitConversionError::UnknownOrdinal(ordinal))
    }
}

/// Express `length` units of `from` as a (possibly fractional) count of `to` units.
///
/// Values below one mean the span covers part of a single `to` period; values above one mean
/// it spans several.
///
/// # Errors
///
/// - [`UnitConversionError::UnknownUnit`]: either unit is `Unknown`.
/// - [`UnitConversionError::ZeroLengthTarget`]: `to` has no hours (`NoBilling`).
pub fn normalize_duration(
    length: u32,
    from: TimeUnit,
    to: TimeUnit,
) -> Result<Decimal, UnitConversionError> {
    if !from.is_valid() || !to.is_valid() {
        return Err(UnitConversionError::UnknownUnit { length, from, to });
    }

    let span = Decimal::from(length) * Decimal::from(from.hours());

    span.checked_div(Decimal::from(to.hours()))
        .ok_or(UnitConversionError::ZeroLengthTarget { length, from, to })
}
