// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus RTU driver for serial field buses
//!
//! This module provides the production driver that communicates with field
//! devices over a serial port using the Modbus RTU protocol. One register is
//! read per exchange; the slave address is switched before every request
//! since all devices share the same half-duplex bus.

use std::io;
use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use log::{debug, info};
use tokio::time::timeout;
use tokio_modbus::client::{rtu, Context, Reader};
use tokio_modbus::slave::{Slave, SlaveContext};
use tokio_serial::SerialStream;

use crate::config::ModbusClientConfig;
use crate::polling::{FieldBusDriver, ReadError};

/// Modbus RTU client driver over a serial port
pub struct RtuBusDriver {
    port: String,
    baud_rate: u32,
    response_timeout: Duration,
    ctx: Option<Context>,
}

impl RtuBusDriver {
    /// Create a new RTU driver from the transport configuration.
    ///
    /// The serial port is not opened here; `connect` performs the actual
    /// transport bring-up so that a connection failure surfaces at session
    /// startup, where it is fatal.
    pub fn new(config: &ModbusClientConfig) -> Self {
        Self {
            port: config.port.clone(),
            baud_rate: config.baud_rate,
            response_timeout: Duration::from_millis(config.response_timeout_ms),
            ctx: None,
        }
    }
}

#[async_trait]
impl FieldBusDriver for RtuBusDriver {
    async fn connect(&mut self) -> Result<()> {
        let builder = tokio_serial::new(self.port.as_str(), self.baud_rate);
        let stream = SerialStream::open(&builder)
            .with_context(|| format!("Failed to open serial port {}", self.port))?;

        info!(
            "Field bus serial port {} open at {} baud",
            self.port, self.baud_rate
        );
        self.ctx = Some(rtu::attach(stream));
        Ok(())
    }

    async fn read_data_point(&mut self, device_id: u8, data_point: u16) -> Result<u16, ReadError> {
        let timeout_ms = self.response_timeout.as_millis() as u64;
        let ctx = self.ctx.as_mut().ok_or_else(|| ReadError::Bus {
            device_id,
            source: io::Error::new(io::ErrorKind::NotConnected, "field bus is not connected"),
        })?;

        // All devices share one transport; address the request explicitly
        ctx.set_slave(Slave(device_id));
        debug!("reading device {} data point {}", device_id, data_point);

        let response = match timeout(
            self.response_timeout,
            ctx.read_holding_registers(data_point, 1),
        )
        .await
        {
            Err(_) => {
                return Err(ReadError::Timeout {
                    device_id,
                    timeout_ms,
                })
            }
            Ok(Err(err)) => {
                return Err(ReadError::Bus {
                    device_id,
                    source: io::Error::other(err.to_string()),
                })
            }
            Ok(Ok(Err(exception))) => {
                return Err(ReadError::Exception {
                    device_id,
                    exception: format!("{exception:?}"),
                })
            }
            Ok(Ok(Ok(words))) => words,
        };

        match response.as_slice() {
            [value] => Ok(*value),
            _ => Err(ReadError::Malformed {
                device_id,
                details: format!("expected 1 register, got {}", response.len()),
            }),
        }
    }
}
