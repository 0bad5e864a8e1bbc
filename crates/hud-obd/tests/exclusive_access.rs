//! Concurrent acquisition cycles sharing one adapter link

use std::sync::Arc;
use std::time::Duration;

use hud_core::{AdapterValue, ParameterCatalog, ParameterDescriptor, TextRole, ValueKind};
use hud_obd::adapter::mock::MockDriver;
use hud_obd::{AdapterConfig, ConnectionManager, TelemetryAcquirer};

/// A catalog of text entries whose commands are unique to one session
fn session_catalog(commands: &'static [&'static str]) -> Arc<ParameterCatalog> {
    let descriptors = commands
        .iter()
        .map(|&command| ParameterDescriptor {
            id: command,
            command: Some(command),
            output_key: command,
            unit: None,
            kind: ValueKind::Text(TextRole::Plain),
        })
        .collect();
    Arc::new(ParameterCatalog::from_descriptors(descriptors).unwrap())
}

const SESSION_A: &[&str] = &["A_01", "A_02", "A_03", "A_04", "A_05", "A_06", "A_07", "A_08"];
const SESSION_B: &[&str] = &["B_01", "B_02", "B_03", "B_04", "B_05", "B_06", "B_07", "B_08"];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_never_share_responses() {
    let driver = MockDriver::new();
    // Unscripted commands answer with their own name
    driver.set_echo(true);
    driver.set_latency(Duration::from_millis(2));

    let manager = Arc::new(ConnectionManager::new(
        Arc::new(driver.clone()),
        AdapterConfig::default(),
    ));
    manager.connect().await.unwrap();

    let mut tasks = Vec::new();
    for commands in [SESSION_A, SESSION_B] {
        let manager = manager.clone();
        let acquirer = TelemetryAcquirer::new(session_catalog(commands));
        tasks.push(tokio::spawn(async move {
            let mut cycles = Vec::new();
            for _ in 0..3 {
                let connection = manager.current().unwrap();
                cycles.push(acquirer.acquire(&connection).await);
            }
            cycles
        }));
    }

    for task in tasks {
        for results in task.await.unwrap() {
            assert_eq!(results.len(), 8);
            for result in results {
                assert!(!result.failed);
                assert_eq!(result.value, AdapterValue::Text(result.output_key.to_string()));
            }
        }
    }

    assert_eq!(driver.max_in_flight(), 1);
    assert_eq!(driver.requests().len(), 2 * 3 * 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_cycle_does_not_leak_into_next() {
    let driver = MockDriver::new();
    driver.set_echo(true);
    driver.set_latency(Duration::from_millis(5));

    let manager = ConnectionManager::new(Arc::new(driver.clone()), AdapterConfig::default());
    manager.connect().await.unwrap();
    let connection = manager.current().unwrap();

    let slow = TelemetryAcquirer::new(session_catalog(SESSION_A));
    // Abandon a cycle part-way through
    let _ = tokio::time::timeout(Duration::from_millis(8), slow.acquire(&connection)).await;

    let next = TelemetryAcquirer::new(session_catalog(SESSION_B));
    let results = next.acquire(&connection).await;
    for result in results {
        assert_eq!(result.value, AdapterValue::Text(result.output_key.to_string()));
    }
    assert_eq!(driver.max_in_flight(), 1);
}

#[tokio::test]
async fn test_standard_catalog_against_simulated_vehicle() {
    let config = AdapterConfig::default();
    let driver = hud_obd::create_driver(&config).unwrap();
    let manager = ConnectionManager::new(driver, config);
    manager.connect().await.unwrap();

    let acquirer = TelemetryAcquirer::new(Arc::new(ParameterCatalog::standard()));
    let snapshot = acquirer.snapshot(&manager.current().unwrap()).await;

    assert_eq!(snapshot.status, hud_core::SnapshotStatus::Ok);
    assert_eq!(snapshot.vehicle.make.as_deref(), Some("Chevrolet"));
    assert_eq!(snapshot.dtcs.len(), 2);
    assert!(snapshot.number("rpm").is_some());
    assert!(snapshot.number("boost_pressure").is_some());
    assert_eq!(snapshot.get("hybrid_battery_remaining"), Some(&serde_json::Value::Null));

    manager.close().await;
}
