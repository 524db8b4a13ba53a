// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Management Module
//!
//! This module provides functionality for running and managing the
//! background tasks of the field bus poller. It handles the lifecycle of the
//! polling session:
//!
//! - Transport bring-up (fatal on failure, no retry)
//! - Rate calibration (always terminates, always yields a usable interval)
//! - Steady-state polling (runs until external termination)
//! - System health monitoring (heartbeat)
//!
//! The daemon system allows for graceful startup and shutdown of these
//! services, with proper error handling and task coordination.
//!
//! ## Architecture
//!
//! The session phases are strictly sequential (connect, then calibrate,
//! then poll) and all bus traffic runs on one logical flow of control
//! because the transport is a shared half-duplex bus. Tokio tasks are used
//! for lifecycle plumbing (the session task and the heartbeat), not for
//! concurrent bus access.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::Config;
use crate::polling::optimizer::RateOptimizer;
use crate::polling::reader::DeviceReader;
use crate::polling::scheduler::PollingScheduler;
use crate::polling::state::{create_shared_polling_state, SharedPollingState};
use crate::polling::create_field_bus_driver;

/// Represents a daemon task manager that coordinates the background services
///
/// This structure maintains a collection of asynchronous tasks and provides
/// methods to start, stop, and monitor them.
///
/// # Fields
///
/// * `tasks` - Collection of handles to running tasks for management and cleanup
/// * `running` - Atomic flag shared between tasks to coordinate shutdown
/// * `polling_state` - Shared session state, populated once the session is launched
///
/// # Thread Safety
///
/// The `running` flag is wrapped in an `Arc` to allow safe sharing between
/// tasks. Each task checks this flag periodically to determine if it should
/// continue running or gracefully terminate. The polling state is mutated
/// only by the session task; other holders must treat it as read-only.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    polling_state: Option<SharedPollingState>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// Initializes a new daemon manager with an empty task list and the
    /// running flag set to `true`.
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            polling_state: None,
        }
    }

    /// Launch all configured tasks based on configuration
    ///
    /// Starts the polling session according to the provided configuration,
    /// plus the heartbeat monitor. The session is only started when the
    /// polling client is enabled in the configuration.
    ///
    /// # Parameters
    ///
    /// * `config` - Application configuration
    ///
    /// # Returns
    ///
    /// * `Result<()>` - Success if all tasks started successfully, or error details
    ///
    /// # Errors
    ///
    /// This function fails if the field bus connection cannot be
    /// established; that failure is fatal to the process and is not retried
    /// here.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        if config.modbus.enabled {
            self.start_polling_session(config).await?;
        } else {
            warn!("Field bus polling is disabled in the configuration");
        }

        // Start heartbeat task for monitoring
        self.start_heartbeat()?;

        Ok(())
    }

    /// Shared session state of the launched polling session, if any
    pub fn get_polling_state(&self) -> Option<SharedPollingState> {
        self.polling_state.clone()
    }

    /// Start the polling session: connect, calibrate, then poll forever
    ///
    /// The transport is brought up here so that a connection failure
    /// surfaces synchronously (and fatally). Calibration and steady-state
    /// polling then run on a dedicated task, strictly in that order; the
    /// session state is threaded through both phases explicitly.
    async fn start_polling_session(&mut self, config: &Config) -> Result<()> {
        info!(
            "Connecting to field bus on {} at {} baud ({} devices)",
            config.modbus.port,
            config.modbus.baud_rate,
            config.modbus.devices.len()
        );

        let state = create_shared_polling_state(&config.polling);
        self.polling_state = Some(state.clone());

        let driver = create_field_bus_driver(&config.modbus)?;
        let mut reader = DeviceReader::new(driver);
        reader
            .connect()
            .await
            .context("Failed to establish field bus connection")?;

        let devices = config.modbus.devices.clone();
        let polling_config = config.polling.clone();
        let running = self.running.clone();

        let task = tokio::spawn(async move {
            let optimizer = RateOptimizer::new(&polling_config);
            let certified = optimizer
                .optimize(&mut reader, &devices, &state, &running)
                .await;

            if !running.load(Ordering::SeqCst) {
                info!("Shutdown requested during calibration, session ends");
                return Ok(());
            }

            info!("Calibration complete, polling every {} ms", certified);
            PollingScheduler::new()
                .run(&mut reader, &devices, &state, &running)
                .await
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs system status periodically
    ///
    /// The heartbeat task runs every 60 seconds and continues until the
    /// daemon's `running` flag is set to `false`. In a production
    /// environment, these messages can be monitored by an external system
    /// to detect if the daemon has stopped functioning properly.
    fn start_heartbeat(&mut self) -> Result<()> {
        info!("Starting heartbeat monitor");

        let running = self.running.clone();
        let task = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                debug!("Daemon heartbeat: running");
                time::sleep(Duration::from_secs(60)).await;
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Signal all tasks to stop
    ///
    /// Tasks check the running flag at their next cancellation point and
    /// terminate gracefully; a polling cycle in progress finishes first.
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for all tasks to complete
    ///
    /// Consumes the daemon and waits for all spawned tasks to finish
    /// execution. This method should be called after `shutdown()` to ensure
    /// a clean application exit.
    ///
    /// If any task panics, the error is logged but this method will still
    /// wait for all other tasks to complete.
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match tokio::time::timeout(Duration::from_secs(5), task).await {
                Ok(result) => {
                    if let Err(e) = result {
                        log::error!("Task panicked: {}", e);
                    }
                }
                Err(_) => {
                    // Task didn't complete within timeout
                    log::warn!("Task did not complete within timeout period, may be hung");
                }
            }
        }
        Ok(())
    }
}
