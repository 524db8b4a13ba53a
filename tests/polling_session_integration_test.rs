// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-fieldbus project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Real-world integration test for the polling session
//!
//! This test runs a full daemon session against the simulated bus: transport
//! bring-up, rate calibration down to the bus's actual limit, and
//! steady-state polling at the certified interval, followed by a clean
//! shutdown. Virtual time keeps the whole session deterministic and fast.

use anyhow::Result;
use rust_fieldbus::{
    config::{BusDriverKind, Config, DeviceConfig, PollingConfig},
    daemon::launch_daemon::Daemon,
    polling::state::LifecyclePhase,
};
use std::time::Duration;
use tokio::time::sleep;

/// Session configuration against a simulated bus that stops answering below
/// a 250 ms per-device turnaround
fn mock_session_config() -> Config {
    let mut config = Config::default();
    config.modbus.enabled = true;
    config.modbus.driver = BusDriverKind::Mock;
    config.modbus.response_timeout_ms = 100;
    config.modbus.mock_min_turnaround_ms = Some(250);
    config.modbus.devices = vec![
        DeviceConfig {
            id: 1,
            data_point: 0,
        },
        DeviceConfig {
            id: 2,
            data_point: 4,
        },
    ];
    config.polling = PollingConfig {
        initial_interval_ms: 500,
        decrease_step_ms: 50,
        min_interval_ms: 50,
        trial_batch_count: 5,
    };
    config
}

/// Integration test that starts a full session over the mock bus and checks
/// calibration outcome, steady-state cadence and clean shutdown
#[tokio::test(start_paused = true)]
async fn test_full_session_over_mock_bus() -> Result<()> {
    // Initialize logging for debugging
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();

    let config = mock_session_config();

    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;

    let state = daemon
        .get_polling_state()
        .expect("launched session exposes its state");

    // Calibration walks 500 -> 250 (certified) and rejects 200, then the
    // session enters steady-state polling; 30s of virtual time is plenty
    sleep(Duration::from_secs(30)).await;

    {
        let state = state.read().await;
        assert_eq!(state.phase, LifecyclePhase::Polling);
        assert_eq!(state.current_interval_ms, 250);
        assert_eq!(state.last_certified_interval_ms, 250);
        assert!(
            state.cycles_completed > 10,
            "expected steady-state cycles, got {}",
            state.cycles_completed
        );
    }

    // The certified rate is frozen: five more seconds bring ~20 more cycles
    let cycles_before = state.read().await.cycles_completed;
    sleep(Duration::from_secs(5)).await;
    let cycles_after = state.read().await.cycles_completed;
    assert!(
        cycles_after >= cycles_before + 15,
        "polling stalled: {} -> {}",
        cycles_before,
        cycles_after
    );
    assert_eq!(state.read().await.current_interval_ms, 250);

    // Clean shutdown
    daemon.shutdown();
    daemon.join().await?;

    Ok(())
}

/// A perfectly reliable bus lets calibration run all the way to the floor
#[tokio::test(start_paused = true)]
async fn test_reliable_bus_calibrates_to_floor() -> Result<()> {
    let mut config = mock_session_config();
    config.modbus.mock_min_turnaround_ms = Some(0);

    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;
    let state = daemon.get_polling_state().unwrap();

    sleep(Duration::from_secs(30)).await;

    {
        let state = state.read().await;
        assert_eq!(state.phase, LifecyclePhase::Polling);
        assert_eq!(state.current_interval_ms, 50);
    }

    daemon.shutdown();
    daemon.join().await?;
    Ok(())
}

/// A transport that cannot be established is fatal at launch, not retried
#[tokio::test]
async fn test_connection_failure_is_fatal() {
    let mut config = mock_session_config();
    config.modbus.driver = BusDriverKind::Rtu;
    config.modbus.port = "/dev/nonexistent-fieldbus-port".to_string();

    let mut daemon = Daemon::new();
    let result = daemon.launch(&config).await;
    assert!(result.is_err());
}

/// A disabled polling client launches nothing but the heartbeat
#[tokio::test(start_paused = true)]
async fn test_disabled_polling_launches_no_session() -> Result<()> {
    let mut config = mock_session_config();
    config.modbus.enabled = false;

    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;
    assert!(daemon.get_polling_state().is_none());

    daemon.shutdown();
    daemon.join().await?;
    Ok(())
}
