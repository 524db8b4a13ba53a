// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Empirical polling rate calibration
//!
//! The optimizer finds the smallest cycle interval at which every configured
//! device still answers reliably. It does not model the bus; it measures it:
//! starting from a known-safe interval, it steps down linearly and exercises
//! every candidate with consecutive trial batches, certifying the candidate
//! only when every read in every batch succeeds.
//!
//! Bus timing is not guaranteed monotonic or smooth near the failure
//! boundary, so the search is a linear step-down rather than a binary
//! search, and a candidate only certifies after several consecutive clean
//! batches rather than one lucky trial.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time;

use crate::config::{DeviceConfig, PollingConfig};
use crate::polling::reader::DeviceReader;
use crate::polling::state::{LifecyclePhase, SharedPollingState};
use crate::polling::ReadError;

/// Outcome of one candidate interval trial
enum TrialOutcome {
    /// Every read in every batch succeeded
    Certified,
    /// A read failed; the batch and all remaining batches were abandoned
    Rejected(ReadError),
    /// Shutdown was requested between batches
    Interrupted,
}

/// Finds the fastest reliable polling interval by trial
pub struct RateOptimizer {
    min_interval_ms: u64,
    trial_batch_count: u32,
}

impl RateOptimizer {
    /// Create an optimizer from the polling configuration
    pub fn new(config: &PollingConfig) -> Self {
        Self {
            min_interval_ms: config.min_interval_ms,
            trial_batch_count: config.trial_batch_count,
        }
    }

    /// Run the calibration search and return the certified interval.
    ///
    /// The result is always a value the bus has empirically proven reliable:
    /// either the fastest candidate that passed all trial batches, or the
    /// initial interval if nothing faster ever certified, including when
    /// the very first candidate is rejected. The search never tests or
    /// returns anything below the configured floor.
    ///
    /// `state.current_interval_ms` only moves when a candidate certifies,
    /// so it decreases monotonically and a rejected candidate is never
    /// observable as the session interval.
    pub async fn optimize(
        &self,
        reader: &mut DeviceReader,
        devices: &[DeviceConfig],
        state: &SharedPollingState,
        running: &Arc<AtomicBool>,
    ) -> u64 {
        let (mut candidate, step) = {
            let mut state = state.write().await;
            state.phase = LifecyclePhase::Calibrating;
            (state.current_interval_ms, state.step_size_ms)
        };

        info!(
            "Starting rate calibration: {} devices, initial interval {} ms, step {} ms, floor {} ms, {} batches per candidate",
            devices.len(),
            candidate,
            step,
            self.min_interval_ms,
            self.trial_batch_count
        );

        loop {
            info!("Trying candidate interval {} ms", candidate);

            match self.run_trial(reader, devices, candidate, running).await {
                TrialOutcome::Certified => {
                    info!("Certified interval {} ms", candidate);
                    {
                        let mut state = state.write().await;
                        state.current_interval_ms = candidate;
                        state.last_certified_interval_ms = candidate;
                    }

                    let next = candidate.saturating_sub(step);
                    if next < self.min_interval_ms {
                        info!(
                            "Next candidate {} ms would cross the {} ms floor, stopping search",
                            next, self.min_interval_ms
                        );
                        break;
                    }
                    candidate = next;
                }
                TrialOutcome::Rejected(err) => {
                    warn!("Candidate interval {} ms rejected: {}", candidate, err);
                    break;
                }
                TrialOutcome::Interrupted => {
                    info!("Calibration interrupted before completion");
                    break;
                }
            }
        }

        let certified = state.read().await.last_certified_interval_ms;
        info!("Optimal polling interval: {} ms", certified);
        certified
    }

    /// Exercise one candidate interval with consecutive trial batches.
    ///
    /// Each batch reads every device once, in configured order, then
    /// suspends for the candidate interval, mirroring the shape of a
    /// steady-state cycle. A single failure anywhere disqualifies the whole
    /// candidate immediately: the remaining devices of the batch and all
    /// remaining batches are skipped.
    async fn run_trial(
        &self,
        reader: &mut DeviceReader,
        devices: &[DeviceConfig],
        candidate_ms: u64,
        running: &Arc<AtomicBool>,
    ) -> TrialOutcome {
        let pause = Duration::from_millis(candidate_ms);

        for batch in 1..=self.trial_batch_count {
            if !running.load(Ordering::SeqCst) {
                return TrialOutcome::Interrupted;
            }

            for device in devices {
                match reader.read(device).await {
                    Ok(reading) => debug!(
                        "calibration read: device {} = {}",
                        reading.device_id, reading.value
                    ),
                    Err(err) => return TrialOutcome::Rejected(err),
                }
            }

            debug!(
                "Batch {}/{} clean at {} ms",
                batch, self.trial_batch_count, candidate_ms
            );
            time::sleep(pause).await;
        }

        TrialOutcome::Certified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polling::drivers::MockBusDriver;
    use crate::polling::state::create_shared_polling_state;

    fn two_devices() -> Vec<DeviceConfig> {
        vec![
            DeviceConfig {
                id: 1,
                data_point: 0,
            },
            DeviceConfig {
                id: 2,
                data_point: 4,
            },
        ]
    }

    fn polling_config(initial: u64, step: u64, floor: u64, batches: u32) -> PollingConfig {
        PollingConfig {
            initial_interval_ms: initial,
            decrease_step_ms: step,
            min_interval_ms: floor,
            trial_batch_count: batches,
        }
    }

    async fn run_optimizer(
        config: &PollingConfig,
        mock_min_turnaround_ms: u64,
    ) -> (u64, SharedPollingState) {
        let driver = MockBusDriver::with_turnaround(mock_min_turnaround_ms, 200);
        let mut reader = DeviceReader::new(Box::new(driver));
        reader.connect().await.unwrap();

        let devices = two_devices();
        let state = create_shared_polling_state(config);
        let running = Arc::new(AtomicBool::new(true));

        let optimizer = RateOptimizer::new(config);
        let certified = optimizer
            .optimize(&mut reader, &devices, &state, &running)
            .await;
        (certified, state)
    }

    #[tokio::test(start_paused = true)]
    async fn test_reliable_bus_certifies_down_to_floor() {
        // Every candidate succeeds, so the search ends at the floor
        let config = polling_config(500, 50, 50, 5);
        let (certified, state) = run_optimizer(&config, 0).await;

        assert_eq!(certified, 50);
        let state = state.read().await;
        assert_eq!(state.current_interval_ms, 50);
        assert_eq!(state.last_certified_interval_ms, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settles_on_last_certified_before_failure() {
        // Reads start failing once the interval reaches 200 ms, so the
        // last certified candidate is 250 ms
        let config = polling_config(500, 50, 50, 5);
        let (certified, state) = run_optimizer(&config, 250).await;

        assert_eq!(certified, 250);
        assert_eq!(state.read().await.current_interval_ms, 250);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_candidate_failure_keeps_initial_interval() {
        // The bus never sustains even the initial interval; the optimizer
        // still reports a usable (if unproven-faster) value: the default
        let config = polling_config(500, 50, 50, 5);
        let (certified, state) = run_optimizer(&config, 600).await;

        assert_eq!(certified, 500);
        let state = state.read().await;
        assert_eq!(state.current_interval_ms, 500);
        assert_eq!(state.last_certified_interval_ms, 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_returns_below_floor() {
        // Step pattern that would jump past the floor: 120 -> 70 -> 20
        let config = polling_config(120, 50, 60, 3);
        let (certified, _state) = run_optimizer(&config, 0).await;

        assert!(certified >= 60);
        assert_eq!(certified, 70);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_short_circuits_on_first_failure() {
        // Device 1 fails unconditionally: the very first batch must stop
        // after device 1 and never reach device 2
        let config = polling_config(100, 50, 50, 5);

        let driver = MockBusDriver::with_turnaround(0, 200);
        let bus = driver.state();
        bus.lock().unwrap().set_failing(1, true);

        let mut reader = DeviceReader::new(Box::new(driver));
        reader.connect().await.unwrap();

        let devices = two_devices();
        let state = create_shared_polling_state(&config);
        let running = Arc::new(AtomicBool::new(true));

        let certified = RateOptimizer::new(&config)
            .optimize(&mut reader, &devices, &state, &running)
            .await;

        assert_eq!(certified, 100);
        let bus = bus.lock().unwrap();
        assert_eq!(bus.read_log(), &[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_certification_requires_all_batches() {
        // Candidates 100 and 50 must each run the full schedule of
        // 3 batches x 2 devices before certifying: 12 exchanges in total
        let config = polling_config(100, 50, 50, 3);

        let driver = MockBusDriver::with_turnaround(0, 200);
        let bus = driver.state();
        let mut reader = DeviceReader::new(Box::new(driver));
        reader.connect().await.unwrap();

        let devices = two_devices();
        let state = create_shared_polling_state(&config);
        let running = Arc::new(AtomicBool::new(true));

        let certified = RateOptimizer::new(&config)
            .optimize(&mut reader, &devices, &state, &running)
            .await;

        assert_eq!(certified, 50);
        assert_eq!(state.read().await.last_certified_interval_ms, 50);
        assert_eq!(bus.lock().unwrap().exchange_count(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_calibration() {
        let config = polling_config(500, 50, 50, 5);

        let driver = MockBusDriver::with_turnaround(0, 200);
        let mut reader = DeviceReader::new(Box::new(driver));
        reader.connect().await.unwrap();

        let devices = two_devices();
        let state = create_shared_polling_state(&config);
        let running = Arc::new(AtomicBool::new(false));

        // Shutdown already requested: no batch runs, result is the default
        let certified = RateOptimizer::new(&config)
            .optimize(&mut reader, &devices, &state, &running)
            .await;
        assert_eq!(certified, 500);
    }
}
