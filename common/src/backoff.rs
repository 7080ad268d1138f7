// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Module providing utilities for retrying operations with exponential backoff.
//!
//! The reconciliation engine uses these policies to re-check convergence after
//! an action has run: host-side effects (a udev settle after `pvcreate`, a
//! mount appearing in the device probe) can lag the utility's exit by a short
//! moment, so validation is given a bounded number of increasingly spaced
//! retries before the run is declared failed.

use std::time::Duration;

pub use ::backoff::retry;
pub use ::backoff::Error as BackoffError;
pub use ::backoff::ExponentialBackoff;
pub use ::backoff::ExponentialBackoffBuilder;

/// Parameters from which a validation retry policy is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryParameters {
    pub initial_interval: Duration,
    pub multiplier: u32,
    pub max_retries: u32,
}

impl Default for RetryParameters {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(200),
            multiplier: 2,
            max_retries: 3,
        }
    }
}

/// Return a backoff policy for re-validating a layer after its actions ran.
///
/// Randomisation is disabled so the schedule is deterministic. The effective
/// per-step multiplier is `sqrt(multiplier)`, while the elapsed-time and
/// interval ceilings are computed from the un-rooted multiplier:
///
/// - max elapsed time: `initial * (m^n - 1) / (m - 1)` (geometric series sum)
/// - max interval: `initial * m^(n-1)`
pub fn retry_policy_validation(params: &RetryParameters) -> ExponentialBackoff {
    let m = f64::from(params.multiplier);
    let n = f64::from(params.max_retries);
    let max_elapsed = params
        .initial_interval
        .mul_f64((m.powf(n) - 1.0) / (m - 1.0));
    let max_interval = params.initial_interval.mul_f64(m.powf(n - 1.0));
    ExponentialBackoffBuilder::new()
        .with_initial_interval(params.initial_interval)
        .with_randomization_factor(0.0)
        .with_multiplier(m.sqrt())
        .with_max_interval(max_interval)
        .with_max_elapsed_time(Some(max_elapsed))
        .build()
}
