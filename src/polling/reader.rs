// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Single-exchange device reading
//!
//! The device reader is the leaf of the polling engine: one call, one
//! request/response exchange on the bus, one `Reading` or one typed
//! `ReadError`. Retry policy belongs to the callers, and neither of them
//! retries: a single failure is significant evidence during calibration and
//! an acceptable per-cycle blemish during steady-state polling.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::DeviceConfig;
use crate::polling::{FieldBusDriver, ReadError};

/// One sampled value from one device.
///
/// Readings are transient: they are logged as soon as they are produced and
/// never retained. Absence of a reading is always a `ReadError`, never a
/// sentinel value, so a legitimate zero stays distinguishable from a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Bus address of the device the value was read from
    pub device_id: u8,
    /// Raw register value
    pub value: u16,
    /// Time the exchange completed
    pub timestamp: DateTime<Utc>,
}

/// Performs single request/response exchanges on the field bus.
///
/// Owns the bus driver for the lifetime of the session: the transport is a
/// shared half-duplex bus, so exactly one exchange can be in flight at a
/// time and both the optimizer and the scheduler borrow the reader
/// sequentially, never concurrently.
pub struct DeviceReader {
    driver: Box<dyn FieldBusDriver + Send>,
}

impl DeviceReader {
    /// Create a reader on top of a bus driver
    pub fn new(driver: Box<dyn FieldBusDriver + Send>) -> Self {
        Self { driver }
    }

    /// Establish the underlying bus connection.
    ///
    /// A failure here is fatal to the session; it is propagated for the
    /// caller to turn into a non-zero process exit.
    pub async fn connect(&mut self) -> Result<()> {
        self.driver.connect().await
    }

    /// Perform exactly one exchange for `device` and return its reading.
    ///
    /// Never retries and never panics on a bus problem: every failure comes
    /// back as a `ReadError` value carrying the device address and cause, so
    /// callers can count failures and apply their own policy.
    pub async fn read(&mut self, device: &DeviceConfig) -> Result<Reading, ReadError> {
        let value = self
            .driver
            .read_data_point(device.id, device.data_point)
            .await?;
        Ok(Reading {
            device_id: device.id,
            value,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polling::drivers::MockBusDriver;

    #[tokio::test]
    async fn test_successful_read_produces_reading() {
        let driver = MockBusDriver::with_turnaround(0, 50);
        let state = driver.state();
        state.lock().unwrap().set_register(4, 2, 742);

        let mut reader = DeviceReader::new(Box::new(driver));
        reader.connect().await.unwrap();

        let device = DeviceConfig {
            id: 4,
            data_point: 2,
        };
        let reading = reader.read(&device).await.unwrap();
        assert_eq!(reading.device_id, 4);
        assert!((742..746).contains(&reading.value));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_read_carries_device_id() {
        let driver = MockBusDriver::with_turnaround(0, 50);
        let state = driver.state();
        state.lock().unwrap().set_failing(11, true);

        let mut reader = DeviceReader::new(Box::new(driver));
        reader.connect().await.unwrap();

        let device = DeviceConfig {
            id: 11,
            data_point: 0,
        };
        let err = reader.read(&device).await.unwrap_err();
        assert_eq!(err.device_id(), 11);
        assert!(matches!(err, ReadError::Timeout { .. }));
    }
}
