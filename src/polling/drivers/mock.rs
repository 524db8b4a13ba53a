// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Mock field bus driver for simulation and tests
//!
//! This module provides a simulated bus that behaves like a set of RTU field
//! devices without any hardware attached:
//! - Each device serves a register map (seeded on first access, with a
//!   little measurement noise so consecutive readings differ)
//! - A device interrogated again sooner than its minimum turnaround after
//!   the previous exchange stays silent for the whole response timeout,
//!   which is what rate calibration runs into when it steps down too far
//! - Individual devices can be switched to unconditionally failing, to
//!   exercise the failure containment of the steady-state scheduler
//!
//! The internal state lives behind `Arc<Mutex<_>>` so tests can keep a
//! handle, reprogram the simulation mid-run and inspect the exchange log.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use rand::Rng;
use rand::RngExt;
use tokio::time::Instant;

use crate::config::ModbusClientConfig;
use crate::polling::{FieldBusDriver, ReadError};

/// Observable state of the simulated bus
#[derive(Debug, Default)]
pub struct MockBusState {
    /// Register maps keyed by (device address, data point)
    registers: HashMap<(u8, u16), u16>,
    /// Devices currently forced to fail every exchange
    failing: HashSet<u8>,
    /// Minimum reliable per-device turnaround
    min_turnaround: Duration,
    /// Request start time of each device's previous exchange
    last_exchange: HashMap<u8, Instant>,
    /// Device address of every exchange attempted, in bus order
    read_log: Vec<u8>,
}

impl MockBusState {
    /// Preload a register value for a device
    pub fn set_register(&mut self, device_id: u8, data_point: u16, value: u16) {
        self.registers.insert((device_id, data_point), value);
    }

    /// Force (or stop forcing) every exchange with a device to fail
    pub fn set_failing(&mut self, device_id: u8, failing: bool) {
        if failing {
            self.failing.insert(device_id);
        } else {
            self.failing.remove(&device_id);
        }
    }

    /// Total number of exchanges attempted on the bus so far
    pub fn exchange_count(&self) -> usize {
        self.read_log.len()
    }

    /// Device address of every exchange attempted, in bus order
    pub fn read_log(&self) -> &[u8] {
        &self.read_log
    }
}

/// Outcome of an exchange, decided under the state lock
enum ExchangeOutcome {
    Value(u16),
    Silent,
}

/// Mock field bus driver backed by `MockBusState`
pub struct MockBusDriver {
    state: Arc<Mutex<MockBusState>>,
    response_timeout: Duration,
    connected: bool,
}

impl MockBusDriver {
    /// Create a simulated bus from the transport configuration
    pub fn new(config: &ModbusClientConfig) -> Self {
        Self::with_turnaround(
            config.mock_min_turnaround_ms.unwrap_or(0),
            config.response_timeout_ms,
        )
    }

    /// Create a simulated bus with an explicit minimum turnaround
    pub fn with_turnaround(min_turnaround_ms: u64, response_timeout_ms: u64) -> Self {
        let state = MockBusState {
            min_turnaround: Duration::from_millis(min_turnaround_ms),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            response_timeout: Duration::from_millis(response_timeout_ms),
            connected: false,
        }
    }

    /// Handle to the shared bus state, for reprogramming and inspection
    pub fn state(&self) -> Arc<Mutex<MockBusState>> {
        self.state.clone()
    }
}

#[async_trait]
impl FieldBusDriver for MockBusDriver {
    async fn connect(&mut self) -> Result<()> {
        let min_turnaround = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("mock bus state poisoned"))?
            .min_turnaround;
        info!(
            "Mock field bus up (min turnaround {:?}, response timeout {:?})",
            min_turnaround, self.response_timeout
        );
        self.connected = true;
        Ok(())
    }

    async fn read_data_point(&mut self, device_id: u8, data_point: u16) -> Result<u16, ReadError> {
        if !self.connected {
            return Err(ReadError::Bus {
                device_id,
                source: io::Error::new(io::ErrorKind::NotConnected, "mock bus is not connected"),
            });
        }

        let timeout_ms = self.response_timeout.as_millis() as u64;

        // Decide the outcome under the lock, await outside of it
        let outcome = {
            let mut state = self.state.lock().map_err(|_| ReadError::Bus {
                device_id,
                source: io::Error::other("mock bus state poisoned"),
            })?;

            let now = Instant::now();
            state.read_log.push(device_id);

            let rushed = state
                .last_exchange
                .insert(device_id, now)
                .map(|previous| now.duration_since(previous) < state.min_turnaround)
                .unwrap_or(false);

            if rushed || state.failing.contains(&device_id) {
                ExchangeOutcome::Silent
            } else {
                let value = *state
                    .registers
                    .entry((device_id, data_point))
                    .or_insert_with(|| {
                        0x0100u16
                            .wrapping_mul(device_id as u16)
                            .wrapping_add(data_point)
                    });
                // measurement noise so consecutive readings differ
                let jitter: u16 = rand::rng().random_range(0..4);
                ExchangeOutcome::Value(value.wrapping_add(jitter))
            }
        };

        match outcome {
            ExchangeOutcome::Silent => {
                // the bus stays silent for the full response window
                tokio::time::sleep(self.response_timeout).await;
                Err(ReadError::Timeout {
                    device_id,
                    timeout_ms,
                })
            }
            ExchangeOutcome::Value(value) => Ok(value),
        }
    }
}
