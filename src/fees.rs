// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Service Fee Schedule
//!
//! Maps the USD notional of a withdrawal to the service fee charged for it.
//! Brackets are half-open `[min, max)` ranges that partition `[0, ∞)`.
//!
//! | Notional (USD) | Fee |
//! |----------------|-----|
//! | `[0, 10k)` | $5 |
//! | `[10k, 20k)` | $7 |
//! | `[20k, 30k)` | $8 |
//! | `[30k, 40k)` | $9 |
//! | `[40k, 100k)` | $10 |
//! | `[100k, ∞)` | 0.003% of notional |

use tracing::error;

/// How a bracket prices the notional that falls into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeeRule {
    /// Flat USD fee regardless of the amount within the bracket.
    Fixed(f64),
    /// Fraction of the notional (`0.00003` = 0.003%).
    Percent(f64),
}

/// One `[min, max)` range of the schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeBracket {
    pub min: f64,
    pub max: f64,
    pub rule: FeeRule,
}

impl FeeBracket {
    const fn fixed(min: f64, max: f64, fee: f64) -> Self {
        Self {
            min,
            max,
            rule: FeeRule::Fixed(fee),
        }
    }

    const fn percent(min: f64, max: f64, fraction: f64) -> Self {
        Self {
            min,
            max,
            rule: FeeRule::Percent(fraction),
        }
    }

    pub fn contains(&self, usd_amount: f64) -> bool {
        usd_amount >= self.min && usd_amount < self.max
    }
}

pub const FEE_BRACKETS: &[FeeBracket] = &[
    FeeBracket::fixed(0.0, 10_000.0, 5.0),
    FeeBracket::fixed(10_000.0, 20_000.0, 7.0),
    FeeBracket::fixed(20_000.0, 30_000.0, 8.0),
    FeeBracket::fixed(30_000.0, 40_000.0, 9.0),
    FeeBracket::fixed(40_000.0, 100_000.0, 10.0),
    FeeBracket::percent(100_000.0, f64::INFINITY, 0.00003),
];

/// Ordered, immutable fee schedule.
#[derive(Debug, Clone, Copy)]
pub struct FeeSchedule {
    brackets: &'static [FeeBracket],
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new(FEE_BRACKETS)
    }
}

impl FeeSchedule {
    pub const fn new(brackets: &'static [FeeBracket]) -> Self {
        Self { brackets }
    }

    pub fn brackets(&self) -> &'static [FeeBracket] {
        self.brackets
    }

    /// The bracket containing `usd_amount`, if any.
    pub fn bracket_for(&self, usd_amount: f64) -> Option<&'static FeeBracket> {
        self.brackets.iter().find(|b| b.contains(usd_amount))
    }

    /// Service fee in USD for a withdrawal worth `usd_amount`.
    pub fn service_fee(&self, usd_amount: f64) -> f64 {
        // also rejects NaN
        if !(usd_amount > 0.0) {
            return 0.0;
        }

        match self.bracket_for(usd_amount) {
            Some(FeeBracket {
                rule: FeeRule::Fixed(fee),
                ..
            }) => *fee,
            Some(FeeBracket {
                rule: FeeRule::Percent(fraction),
                ..
            }) => usd_amount * fraction,
            None => {
                error!(
                    usd_amount,
                    "No fee bracket matched notional; schedule does not cover [0, inf)"
                );
                0.0
            }
        }
    }

    /// Verify the brackets are contiguous from 0 to infinity.
    pub fn check_partition(&self) -> Result<(), String> {
        let mut expected_min = 0.0;
        for (i, bracket) in self.brackets.iter().enumerate() {
            if bracket.min != expected_min {
                return Err(format!(
                    "bracket {i} starts at {} but previous ends at {expected_min}",
                    bracket.min
                ));
            }
            if !(bracket.max > bracket.min) {
                return Err(format!("bracket {i} is empty"));
            }
            expected_min = bracket.max;
        }
        if expected_min != f64::INFINITY {
            return Err(format!("schedule ends at {expected_min}, not infinity"));
        }
        Ok(())
    }
}

/// Service fee under the standard schedule.
pub fn compute_service_fee(usd_amount: f64) -> f64 {
    FeeSchedule::default().service_fee(usd_amount)
}
