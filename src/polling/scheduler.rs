// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Drift-compensated steady-state polling
//!
//! The scheduler runs the certified interval forever: one sequential pass
//! over every configured device per cycle, then a suspension sized to what
//! is left of the interval after the cycle's work. Cycles therefore never
//! overlap and never run faster than the target cadence; when a cycle's
//! work exceeds the interval the next cycle starts immediately and the
//! schedule runs late rather than doubling up.
//!
//! Failure policy is the opposite of calibration's: a failed device is
//! logged and skipped, the rest of the cycle continues, and the device is
//! queried again next cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info, warn};
use tokio::time::{self, Instant};

use crate::config::DeviceConfig;
use crate::polling::reader::DeviceReader;
use crate::polling::state::{LifecyclePhase, SharedPollingState};

/// Runs the certified polling interval indefinitely
#[derive(Default)]
pub struct PollingScheduler;

impl PollingScheduler {
    /// Create a new scheduler
    pub fn new() -> Self {
        Self
    }

    /// Poll every device once per cycle until `running` is cleared.
    ///
    /// The interval is read from the session state once on entry and stays
    /// constant for the life of the loop; the rate is frozen after
    /// calibration. The shutdown flag is checked at the top of every cycle,
    /// so cancellation never interrupts a cycle midway.
    pub async fn run(
        &self,
        reader: &mut DeviceReader,
        devices: &[DeviceConfig],
        state: &SharedPollingState,
        running: &Arc<AtomicBool>,
    ) -> Result<()> {
        let interval = {
            let mut state = state.write().await;
            state.phase = LifecyclePhase::Polling;
            Duration::from_millis(state.current_interval_ms)
        };

        info!(
            "Entering steady-state polling: {} devices every {} ms",
            devices.len(),
            interval.as_millis()
        );

        while running.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();

            for device in devices {
                match reader.read(device).await {
                    Ok(reading) => info!(
                        "device {} data point {} = {}",
                        reading.device_id, device.data_point, reading.value
                    ),
                    Err(err) => warn!("read failed: {}", err),
                }
            }

            let cycles = {
                let mut state = state.write().await;
                state.cycles_completed += 1;
                state.cycles_completed
            };

            let elapsed = cycle_start.elapsed();
            let delay = interval.saturating_sub(elapsed);
            if delay.is_zero() {
                debug!(
                    "cycle {} work time {} ms exceeded the polling interval",
                    cycles,
                    elapsed.as_millis()
                );
            }
            time::sleep(delay).await;
        }

        info!("Polling scheduler stopped");
        Ok(())
    }
}
