// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust field bus poller library
//!
//! This library polls a fixed set of field devices over a shared
//! half-duplex serial bus (Modbus RTU), empirically calibrates the fastest
//! reliable polling interval, then holds that cadence indefinitely while
//! logging every reading.

pub mod config;
pub mod daemon;
pub mod polling;
