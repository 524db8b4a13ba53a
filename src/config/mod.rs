// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Configuration Management
//!
//! This module implements configuration handling for the field bus poller.
//! It supports loading, validating, and saving configuration from YAML files
//! using JSON Schema validation for robust error checking.
//!
//! ## Configuration Structure
//!
//! The application's configuration is organized as a nested structure with
//! sections:
//! - `modbus`: serial transport, response timeout and the device list
//! - `polling`: rate calibration parameters and the interval floor
//!
//! ## Usage
//!
//! ```no_run
//! use rust_fieldbus::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("/dev/ttyUSB1".to_string()), // Serial port
//!     Some(19200),                      // Baud rate
//! );
//!
//! // Access configuration values
//! println!("Polling {} devices", config.modbus.devices.len());
//! ```

pub mod modbus;
pub mod polling;
pub mod utils;

pub use modbus::{BusDriverKind, DeviceConfig, ModbusClientConfig};
pub use polling::PollingConfig;
pub use utils::output_config_schema;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs::{self, File},
    io::Write,
    path::Path,
};

/// Root configuration structure for the field bus poller.
///
/// This structure serves as the main container for all configuration
/// sections of the application.
///
/// # Structure
///
/// The configuration is designed to be deserialized from and serialized to
/// YAML using the serde framework. The structure is validated against a JSON
/// schema to ensure all required fields are present and have valid values.
///
/// # Default Values
///
/// Each section uses default values when not explicitly specified in the
/// configuration file, allowing for minimal configuration when custom
/// settings are not required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Modbus RTU client settings: transport, timeout and device list.
    ///
    /// If not specified in the configuration file, default values are used.
    #[serde(default)]
    pub modbus: ModbusClientConfig,

    /// Rate calibration and steady-state polling settings.
    ///
    /// If not specified, default values will be used.
    #[serde(default)]
    pub polling: PollingConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        debug!("Creating sample configuration file at {:?}", path);
        let sample_path = path.with_extension("sample.yaml");

        // Create parent directories if they don't exist
        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                std::fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        let sample_config = Self::default();
        sample_config
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is replaced by a saved default configuration. An
    /// existing file is validated against the embedded JSON schema before
    /// deserialization; on any validation or parse failure a
    /// `*.sample.yaml` with default values is written next to it and an
    /// error is returned.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        // Load and validate with the schema
        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        // Validate before deserializing to Config
        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            // We generate a config.sample.yaml file with the default values
            // for the user to edit
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        // Now that YAML has been validated, deserialize to Config
        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                match Self::create_sample_config(path) {
                    Ok(_) => debug!("Successfully created sample config"),
                    Err(e) => error!("Failed to create sample config: {}", e),
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        // Perform additional specific validations
        if let Err(err) = Self::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values that are explicitly provided will override the existing
    /// configuration.
    ///
    /// # Parameters
    ///
    /// * `port` - Serial port the field bus is attached to
    /// * `baud_rate` - Serial baud rate for the bus
    pub fn apply_args(&mut self, port: Option<String>, baud_rate: Option<u32>) {
        // Only override if command-line arguments are provided
        if let Some(port) = port {
            debug!("Overriding serial port from command line: {}", port);
            self.modbus.port = port;
        }

        if let Some(baud_rate) = baud_rate {
            debug!("Overriding baud rate from command line: {}", baud_rate);
            self.modbus.baud_rate = baud_rate;
        }
    }

    /// Validates the configuration against additional rules that aren't
    /// covered by the JSON schema.
    ///
    /// # Validation Rules
    ///
    /// - **Device list**: must not be empty when polling is enabled, and
    ///   device addresses must be unique on the bus
    /// - **Serial port**: must be non-empty for the RTU driver
    /// - **Calibration bounds**: the starting interval must be at or above
    ///   the floor, and the step and floor must be non-zero so the search
    ///   terminates
    fn validate_specific_rules(config: &Config) -> Result<()> {
        debug!("Performing additional validation checks");

        if config.modbus.enabled && config.modbus.devices.is_empty() {
            anyhow::bail!("Polling is enabled but no devices are configured");
        }

        let mut seen_ids = HashSet::new();
        for device in &config.modbus.devices {
            if !seen_ids.insert(device.id) {
                anyhow::bail!("Duplicate device address on the bus: {}", device.id);
            }
        }

        if config.modbus.driver == BusDriverKind::Rtu && config.modbus.port.is_empty() {
            anyhow::bail!("RTU driver selected but no serial port configured");
        }

        if config.polling.initial_interval_ms < config.polling.min_interval_ms {
            anyhow::bail!(
                "initial_interval_ms ({}) is below min_interval_ms ({})",
                config.polling.initial_interval_ms,
                config.polling.min_interval_ms
            );
        }

        if config.polling.decrease_step_ms == 0 {
            anyhow::bail!("decrease_step_ms must be greater than zero");
        }

        if config.polling.min_interval_ms == 0 {
            anyhow::bail!("min_interval_ms must be greater than zero");
        }

        if config.polling.trial_batch_count == 0 {
            anyhow::bail!("trial_batch_count must be greater than zero");
        }

        if config.modbus.response_timeout_ms == 0 {
            anyhow::bail!("response_timeout_ms must be greater than zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(Config::validate_specific_rules(&config).is_ok());
    }

    #[test]
    fn test_loads_minimal_yaml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            r#"
modbus:
  port: /dev/ttyUSB1
  devices:
    - id: 3
      data_point: 10
    - id: 7
      data_point: 2
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.modbus.port, "/dev/ttyUSB1");
        assert_eq!(config.modbus.baud_rate, 9600);
        assert_eq!(config.modbus.devices.len(), 2);
        assert_eq!(config.modbus.devices[0].id, 3);
        assert_eq!(config.polling.initial_interval_ms, 500);
        assert_eq!(config.polling.trial_batch_count, 5);
    }

    #[test]
    fn test_missing_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let config = Config::from_file(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.modbus.devices.len(), 1);
    }

    #[test]
    fn test_rejects_out_of_range_device_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            r#"
modbus:
  devices:
    - id: 300
      data_point: 0
"#,
        )
        .unwrap();

        let result = Config::from_file(&path);
        assert!(result.is_err());
        // Schema rejection also leaves a sample file behind for the user
        assert!(path.with_extension("sample.yaml").exists());
    }

    #[test]
    fn test_rejects_duplicate_device_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            r#"
modbus:
  devices:
    - id: 5
      data_point: 0
    - id: 5
      data_point: 1
"#,
        )
        .unwrap();

        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_rejects_interval_below_floor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            r#"
polling:
  initial_interval_ms: 20
  min_interval_ms: 50
"#,
        )
        .unwrap();

        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_yaml_round_trip_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = Config::default();
        config.modbus.baud_rate = 19200;
        config.polling.decrease_step_ms = 25;
        config.save_to_file(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.modbus.baud_rate, 19200);
        assert_eq!(reloaded.polling.decrease_step_ms, 25);
    }

    #[test]
    fn test_apply_args_overrides_transport_settings() {
        let mut config = Config::default();
        config.apply_args(Some("/dev/ttyAMA0".to_string()), Some(115200));
        assert_eq!(config.modbus.port, "/dev/ttyAMA0");
        assert_eq!(config.modbus.baud_rate, 115200);

        // Absent arguments leave the configuration untouched
        config.apply_args(None, None);
        assert_eq!(config.modbus.port, "/dev/ttyAMA0");
        assert_eq!(config.modbus.baud_rate, 115200);
    }
}
