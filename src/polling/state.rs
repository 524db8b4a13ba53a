// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Shared polling session state
//!
//! One `PollingState` exists per session. It is mutated only by the phase
//! that currently owns the session; calibration and steady-state polling
//! are strictly sequential and never overlap. Any other task holding the
//! shared handle must treat it as read-only.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::PollingConfig;

/// Lifecycle phase of a polling session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Transport bring-up in progress
    Connecting,
    /// Rate calibration in progress
    Calibrating,
    /// Steady-state polling at the certified interval
    Polling,
}

/// Mutable state of a polling session.
///
/// Invariants:
/// - `current_interval_ms` is monotonically non-increasing during
///   calibration and constant during polling.
/// - `last_certified_interval_ms` only ever holds a value that passed the
///   full trial batch criterion, or the configured initial interval if no
///   faster candidate ever certified.
#[derive(Debug, Clone)]
pub struct PollingState {
    /// Current lifecycle phase
    pub phase: LifecyclePhase,
    /// Interval currently in force, in milliseconds
    pub current_interval_ms: u64,
    /// Fastest interval empirically proven reliable so far, in milliseconds
    pub last_certified_interval_ms: u64,
    /// Calibration step size, in milliseconds
    pub step_size_ms: u64,
    /// Number of completed steady-state cycles
    pub cycles_completed: u64,
}

impl PollingState {
    /// Create the state for a fresh session
    pub fn new(config: &PollingConfig) -> Self {
        Self {
            phase: LifecyclePhase::Connecting,
            current_interval_ms: config.initial_interval_ms,
            last_certified_interval_ms: config.initial_interval_ms,
            step_size_ms: config.decrease_step_ms,
            cycles_completed: 0,
        }
    }
}

/// Shared handle to a session's polling state
pub type SharedPollingState = Arc<RwLock<PollingState>>;

/// Create a shared polling state for a fresh session
pub fn create_shared_polling_state(config: &PollingConfig) -> SharedPollingState {
    Arc::new(RwLock::new(PollingState::new(config)))
}
