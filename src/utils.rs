//! Utils

use clap::Parser;
use rusty_money::{Findable, iso::Currency};

/// Arguments for the schedule examples
#[derive(Debug, Parser)]
pub struct ExampleScheduleArgs {
    /// Fixture set to load cart items from
    #[clap(short, long, default_value = "subscriptions")]
    pub fixture: String,

    /// Only show this item; every item when omitted
    #[clap(short, long)]
    pub item: Option<String>,

    /// ISO 4217 code used to display amounts
    #[clap(short, long, default_value = "GBP")]
    pub currency: String,
}

impl ExampleScheduleArgs {
    /// Resolve the requested display currency.
    pub fn currency(&self) -> Option<&'static Currency> {
        Currency::find(&self.currency.to_uppercase())
    }
}
