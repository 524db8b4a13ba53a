// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus RTU client configuration
//!
//! This module defines the structures for configuring the Modbus RTU client
//! side of the poller: the serial transport, the response timeout and the
//! fixed set of field devices to interrogate.

use serde::{Deserialize, Serialize};

/// Configuration for the Modbus RTU client component.
///
/// This structure contains settings that control how the poller talks to the
/// shared half-duplex serial bus: which serial port to open, at which baud
/// rate, how long to wait for a device response, and the ordered list of
/// devices to poll.
///
/// # Fields
///
/// * `enabled` - Flag to enable or disable the polling client
/// * `driver` - Transport driver selection (`rtu` for real hardware, `mock` for simulation)
/// * `port` - Serial port device path (default: /dev/ttyUSB0)
/// * `baud_rate` - Serial baud rate (default: 9600)
/// * `response_timeout_ms` - Per-request response timeout in milliseconds (default: 200)
/// * `devices` - Ordered list of devices polled once per cycle
///
/// # Example
///
/// ```
/// use rust_fieldbus::config::{DeviceConfig, ModbusClientConfig};
///
/// let modbus_config = ModbusClientConfig {
///     devices: vec![DeviceConfig { id: 1, data_point: 0 }],
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusClientConfig {
    /// Flag to enable or disable the polling client.
    ///
    /// When disabled, no bus connection is opened and no polling session
    /// is started. Default is `true`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Transport driver selection.
    ///
    /// `rtu` opens the configured serial port and speaks Modbus RTU.
    /// `mock` runs against a simulated bus, for development and tests.
    #[serde(default)]
    pub driver: BusDriverKind,

    /// The serial port the bus is attached to.
    ///
    /// A device path such as "/dev/ttyUSB0" on Linux or "COM3" on Windows.
    /// Ignored by the mock driver.
    #[serde(default = "default_port")]
    pub port: String,

    /// Serial baud rate for the bus.
    ///
    /// Must match the rate all devices on the bus are configured for.
    /// Default is 9600, the common rate for RTU field installations.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Per-request response timeout in milliseconds.
    ///
    /// A device that has not answered within this window is counted as a
    /// timeout failure for that exchange. Default is 200ms.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Ordered list of field devices to poll.
    ///
    /// Every cycle reads each device exactly once, in this order. The set is
    /// fixed at startup; there is no runtime discovery.
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceConfig>,

    /// Minimum reliable per-device turnaround for the mock driver, in
    /// milliseconds (only used when `driver` is `mock`).
    ///
    /// The simulated bus times out any device that is interrogated again
    /// sooner than this after its previous exchange, which is what makes
    /// rate calibration observable without hardware.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock_min_turnaround_ms: Option<u64>,
}

/// Transport driver selection for the field bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusDriverKind {
    /// Modbus RTU over a real serial port
    Rtu,
    /// Simulated bus for development and tests
    Mock,
}

impl Default for BusDriverKind {
    fn default() -> Self {
        Self::Rtu
    }
}

/// A single field device on the bus.
///
/// Immutable for the lifetime of the process: the address identifies the
/// device on the shared bus, the data point is the register holding the
/// value of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Bus address of the device (1..=247 per the RTU addressing convention).
    pub id: u8,

    /// Register address of the value to sample on this device.
    pub data_point: u16,
}

/// The polling client is active unless explicitly disabled.
fn default_enabled() -> bool {
    true
}

/// Default serial port for the bus on Linux installations.
fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

/// Default baud rate (9600, the common RTU field rate).
fn default_baud_rate() -> u32 {
    9600
}

/// Default per-request response timeout (200ms).
fn default_response_timeout_ms() -> u64 {
    200
}

/// A single device at address 1 reading register 0, so a freshly generated
/// configuration file is a working starting point to edit.
fn default_devices() -> Vec<DeviceConfig> {
    vec![DeviceConfig {
        id: 1,
        data_point: 0,
    }]
}

impl Default for ModbusClientConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            driver: BusDriverKind::default(),
            port: default_port(),
            baud_rate: default_baud_rate(),
            response_timeout_ms: default_response_timeout_ms(),
            devices: default_devices(),
            mock_min_turnaround_ms: None,
        }
    }
}
