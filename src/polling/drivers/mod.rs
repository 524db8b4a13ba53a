// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Field bus drivers
//!
//! This module provides the field bus driver implementations:
//! - RTU: Modbus RTU client over a real serial port
//! - Mock: Simulated bus for testing and development

pub mod mock;
pub mod rtu;

pub use mock::MockBusDriver;
pub use rtu::RtuBusDriver;
