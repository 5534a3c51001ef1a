//! Subscription Schedule Example
//!
//! Loads cart items from a fixture set, recomputes them and prints each discount schedule.
//!
//! Use `-f` to load a fixture set by name
//! Use `-i` to show a single item
//! Use `-c` to pick the display currency
//!
//! Set `RUST_LOG=cadence=debug` to trace phase evaluation.

use std::{io, io::Write, time::Instant};

use anyhow::{Context, Result};
use clap::Parser;
use humanize_duration::{Truncate, prelude::DurationExt};
use tracing_subscriber::EnvFilter;

use cadence::{
    decimals::to_money, fixtures::Fixture, schedule::DiscountSchedule,
    utils::ExampleScheduleArgs,
};

/// Subscription Schedule Example
pub fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = ExampleScheduleArgs::parse();

    let currency = args
        .currency()
        .with_context(|| format!("unknown currency code {}", args.currency))?;

    let fixture = Fixture::from_set(&args.fixture)?;
    let config = fixture.config();

    let keys = match args.item.as_deref() {
        Some(key) => vec![key],
        None => fixture.keys(),
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    for key in keys {
        let mut item = fixture.cart_item(key)?;

        writeln!(handle, "\n{key} ({})", item.sku_id())?;

        let start = Instant::now();

        let totals = match item.recompute_with(config) {
            Ok(totals) => totals,
            Err(err) => {
                writeln!(handle, " rejected: {err}")?;

                continue;
            }
        };

        let elapsed = start.elapsed();

        if item.is_subscription() {
            DiscountSchedule::from_item(&item, config)?.write_to(&mut handle, currency)?;
        }

        writeln!(
            handle,
            " Gross: {}  Discount: {}  Net: {}  Trial: {}",
            to_money(totals.gross, currency)?,
            to_money(totals.discount, currency)?,
            to_money(totals.net, currency)?,
            to_money(totals.trial_discount, currency)?,
        )?;

        writeln!(handle, " {}", elapsed.human(Truncate::Nano))?;
    }

    Ok(())
}
