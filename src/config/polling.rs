// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Polling and rate calibration configuration
//!
//! This module defines the parameters of the two core algorithms: the rate
//! optimizer (where calibration starts, how far and how fast it steps down,
//! how many clean batches certify a candidate) and the steady-state polling
//! scheduler (which simply runs the certified interval).

use serde::{Deserialize, Serialize};

/// Configuration for rate calibration and steady-state polling.
///
/// Calibration starts at `initial_interval_ms`, a value known to be safe on
/// the installation, and steps down by `decrease_step_ms` as long as every
/// candidate passes `trial_batch_count` consecutive all-success batches,
/// stopping at `min_interval_ms`. The certified interval is then frozen for
/// the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Known-safe cycle interval the calibration starts from, in milliseconds.
    ///
    /// Also the value the session falls back to when no faster candidate
    /// ever certifies. Default is 500ms.
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    /// Amount the candidate interval is decreased by after each
    /// certification, in milliseconds. Default is 50ms.
    #[serde(default = "default_decrease_step_ms")]
    pub decrease_step_ms: u64,

    /// Hard floor for the cycle interval, in milliseconds.
    ///
    /// Calibration never tests or returns anything below this. Default is 50ms.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Number of consecutive all-success batches required to certify a
    /// candidate interval. Default is 5.
    #[serde(default = "default_trial_batch_count")]
    pub trial_batch_count: u32,
}

/// Default known-safe starting interval (500ms).
fn default_initial_interval_ms() -> u64 {
    500
}

/// Default calibration step (50ms).
fn default_decrease_step_ms() -> u64 {
    50
}

/// Default interval floor (50ms).
fn default_min_interval_ms() -> u64 {
    50
}

/// Default trial batch count (5 consecutive clean batches).
fn default_trial_batch_count() -> u32 {
    5
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            decrease_step_ms: default_decrease_step_ms(),
            min_interval_ms: default_min_interval_ms(),
            trial_batch_count: default_trial_batch_count(),
        }
    }
}
