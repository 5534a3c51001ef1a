//! Campaigns
//!
//! The window and usage limit a discount is offered under. Only the consistency rules live
//! here; storing campaigns and issuing codes is left to the host.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::PricingError;

/// Inconsistent campaign dates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateError {
    /// The campaign ends before it starts.
    #[error("campaign ends at {ends_at}, before it starts at {starts_at}")]
    EndBeforeStart {
        /// Start of the campaign
        starts_at: Timestamp,
        /// End of the campaign
        ends_at: Timestamp,
    },

    /// The campaign is not running at the requested time.
    #[error("campaign is not active at {0}")]
    NotActive(Timestamp),
}

/// Inconsistent usage counts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimitError {
    /// More redemptions are recorded than the limit allows.
    #[error("campaign has {redeemed} redemptions but a limit of {limit}")]
    RedeemedExceedsLimit {
        /// Recorded redemptions
        redeemed: u32,
        /// Usage limit
        limit: u32,
    },

    /// Every allowed redemption has been used.
    #[error("campaign usage limit of {0} is exhausted")]
    Exhausted(u32),
}

/// A discount campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    /// Code customers redeem.
    pub code: String,

    /// First instant the campaign runs.
    pub starts_at: Timestamp,

    /// Instant the campaign stops, if it ever does.
    #[serde(default)]
    pub ends_at: Option<Timestamp>,

    /// Maximum number of redemptions, if limited.
    #[serde(default)]
    pub usage_limit: Option<u32>,

    /// Redemptions so far.
    #[serde(default)]
    pub redeemed_count: u32,
}

impl Campaign {
    /// An open-ended, unlimited campaign.
    pub fn new(code: impl Into<String>, starts_at: Timestamp) -> Self {
        Self {
            code: code.into(),
            starts_at,
            ends_at: None,
            usage_limit: None,
            redeemed_count: 0,
        }
    }

    /// Stop the campaign at `ends_at`.
    #[must_use]
    pub fn ending_at(mut self, ends_at: Timestamp) -> Self {
        self.ends_at = Some(ends_at);
        self
    }

    /// Allow at most `limit` redemptions.
    #[must_use]
    pub fn limited_to(mut self, limit: u32) -> Self {
        self.usage_limit = Some(limit);
        self
    }

    /// Check dates and counts are consistent.
    ///
    /// # Errors
    ///
    /// - [`DateError::EndBeforeStart`]: the end precedes the start.
    /// - [`LimitError::RedeemedExceedsLimit`]: more redemptions than the limit allows.
    pub fn validate(&self) -> Result<(), PricingError> {
        if let Some(ends_at) = self.ends_at
            && ends_at < self.starts_at
        {
            return Err(DateError::EndBeforeStart {
                starts_at: self.starts_at,
                ends_at,
            }
            .into());
        }

        if let Some(limit) = self.usage_limit
            && self.redeemed_count > limit
        {
            return Err(LimitError::RedeemedExceedsLimit {
                redeemed: self.redeemed_count,
                limit,
            }
            .into());
        }

        Ok(())
    }

    /// Whether the campaign runs at `at`. The end instant is exclusive.
    pub fn is_active_at(&self, at: Timestamp) -> bool {
        at >= self.starts_at && self.ends_at.is_none_or(|ends_at| at < ends_at)
    }

    /// Redemptions left, or `None` when unlimited.
    pub fn remaining_redemptions(&self) -> Option<u32> {
        self.usage_limit
            .map(|limit| limit.saturating_sub(self.redeemed_count))
    }

    /// Record one redemption at `at`, returning the new redemption count.
    ///
    /// # Errors
    ///
    /// - Any error from [`Campaign::validate`].
    /// - [`DateError::NotActive`]: the campaign is not running at `at`.
    /// - [`LimitError::Exhausted`]: no redemptions are left.
    pub fn redeem(&mut self, at: Timestamp) -> Result<u32, PricingError> {
        self.validate()?;

        if !self.is_active_at(at) {
            return Err(DateError::NotActive(at).into());
        }

        if let Some(limit) = self.usage_limit
            && self.redeemed_count >= limit
        {
            return Err(LimitError::Exhausted(limit).into());
        }

        self.redeemed_count = self.redeemed_count.saturating_add(1);

        Ok(self.redeemed_count)
    }
}
