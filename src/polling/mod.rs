// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Field device polling core
//!
//! This module provides the polling engine of the application:
//! - Field bus communication (RTU and mock drivers behind one trait)
//! - Single-exchange device reading with typed failures
//! - Empirical rate calibration (linear step-down with trial batches)
//! - Drift-compensated steady-state polling
//!
//! All bus traffic is strictly sequential: the transport is a shared
//! half-duplex serial bus and can only service one exchange at a time.

pub mod drivers;
pub mod optimizer;
pub mod reader;
pub mod scheduler;
pub mod state;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::config::{BusDriverKind, ModbusClientConfig};

/// Field bus driver trait for hardware abstraction
///
/// One implementation speaks Modbus RTU over a real serial port, the other
/// simulates a bus for development and tests. Exactly one request/response
/// exchange happens per `read_data_point` call; the driver never retries.
#[async_trait]
pub trait FieldBusDriver: Send {
    /// Establish the bus connection (open the serial port)
    async fn connect(&mut self) -> Result<()>;

    /// Read one register from one device on the bus
    async fn read_data_point(&mut self, device_id: u8, data_point: u16) -> Result<u16, ReadError>;
}

/// A single failed request/response exchange on the bus.
///
/// Failures are values, not panics: both the rate optimizer and the polling
/// scheduler count them, they just draw different conclusions (the optimizer
/// disqualifies the candidate interval, the scheduler moves on to the next
/// device).
#[derive(Debug, Error)]
pub enum ReadError {
    /// The device did not answer within the response timeout
    #[error("device {device_id}: no response within {timeout_ms} ms")]
    Timeout { device_id: u8, timeout_ms: u64 },

    /// The device answered, but not with a single readable register
    #[error("device {device_id}: malformed response: {details}")]
    Malformed { device_id: u8, details: String },

    /// The device answered with a protocol-level exception
    #[error("device {device_id}: reported exception: {exception}")]
    Exception { device_id: u8, exception: String },

    /// The exchange failed below the protocol layer
    #[error("device {device_id}: bus error: {source}")]
    Bus {
        device_id: u8,
        #[source]
        source: std::io::Error,
    },
}

impl ReadError {
    /// Bus address of the device the failed exchange was addressed to
    pub fn device_id(&self) -> u8 {
        match self {
            ReadError::Timeout { device_id, .. }
            | ReadError::Malformed { device_id, .. }
            | ReadError::Exception { device_id, .. }
            | ReadError::Bus { device_id, .. } => *device_id,
        }
    }
}

/// Create the appropriate field bus driver based on configuration
pub fn create_field_bus_driver(
    config: &ModbusClientConfig,
) -> Result<Box<dyn FieldBusDriver + Send>> {
    match config.driver {
        BusDriverKind::Rtu => Ok(Box::new(drivers::rtu::RtuBusDriver::new(config))),
        BusDriverKind::Mock => Ok(Box::new(drivers::mock::MockBusDriver::new(config))),
    }
}
