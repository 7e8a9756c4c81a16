//! End-to-end scheduler tests: real worker processes, real records.

mod common;

use std::time::Duration;

use common::TestRig;
use perfrig::domain::models::{Config, JobField, JobResult, ResourceLimits};
use perfrig::services::Scheduler;

const SUCCESS_COMMAND: &str =
    "printf 'solver started\\niteration 1\\nsolver finished, elapsed 0:00:01\\n'";

fn scheduler_config(rig: &TestRig) -> Config {
    let mut config = rig.config();
    config.scheduler.worker_path = Some(env!("CARGO_BIN_EXE_perfrig-worker").to_string());
    config
}

/// Fields for a record the scheduler can admit and a worker can run.
fn runnable_fields(rig: &TestRig, name: &str, command: &str) -> Vec<(JobField, String)> {
    let input = rig.ws.instances().join("inst");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::write(input.join("data.in"), "payload").unwrap();
    let run_dir = rig.make_run_dir("2024-01-01_00.00.00");

    vec![
        (JobField::Adapter, "blank".to_string()),
        (JobField::Application, "app".to_string()),
        (JobField::Instance, "inst".to_string()),
        (JobField::Cores, "1".to_string()),
        (JobField::Resource, "local".to_string()),
        (JobField::Command, command.to_string()),
        (JobField::LogFile, "run.log".to_string()),
        (JobField::InputDir, input.display().to_string()),
        (JobField::WorkDir, rig.ws.scratch(name).display().to_string()),
        (
            JobField::OutputDir,
            rig.ws.precondition_output("inst", "app").display().to_string(),
        ),
        (JobField::ResultsDir, run_dir.display().to_string()),
        (JobField::Attempts, "0".to_string()),
        (JobField::MaxAttempts, "1".to_string()),
        (JobField::State, "pending".to_string()),
    ]
}

#[tokio::test]
async fn test_drains_pending_record_through_worker() {
    let rig = TestRig::new();
    let name = "inst_app_1_1";
    let fields = runnable_fields(&rig, name, SUCCESS_COMMAND);
    rig.place_record(&rig.ws.pending(), name, &fields).await;

    let limits = ResourceLimits::new("local", 4, 1024);
    let mut scheduler = Scheduler::new(scheduler_config(&rig), limits);
    tokio::time::timeout(Duration::from_secs(60), scheduler.run())
        .await
        .expect("scheduler should drain")
        .expect("scheduler should not error");

    // Both areas empty, record archived as SUCCESS by the worker.
    assert!(rig.record_names(&rig.ws.pending()).is_empty());
    assert!(rig.record_names(&rig.ws.inprogress()).is_empty());
    let archived = rig.archived_record(name).expect("archived record");
    let record = rig.read_record(&archived).await;
    assert_eq!(record.result(), JobResult::Success);
}

#[tokio::test]
async fn test_missing_precondition_keeps_record_pending() {
    let rig = TestRig::new();
    let name = "inst_app_1_1";
    let mut fields = runnable_fields(&rig, name, SUCCESS_COMMAND);
    fields.push((JobField::Precondition, "prepsim".to_string()));
    let path = rig.place_record(&rig.ws.pending(), name, &fields).await;

    let limits = ResourceLimits::new("local", 4, 1024);
    let mut scheduler = Scheduler::new(scheduler_config(&rig), limits);
    // The record can never be admitted, so the loop never drains; stop it
    // after a few cycles and check nothing moved.
    let outcome =
        tokio::time::timeout(Duration::from_secs(4), scheduler.run()).await;
    assert!(outcome.is_err(), "loop must keep polling, not terminate");
    assert!(path.exists(), "record must stay pending");
}

#[tokio::test]
async fn test_foreign_resource_record_is_not_admitted() {
    let rig = TestRig::new();
    let name = "inst_app_1_1";
    let mut fields = runnable_fields(&rig, name, SUCCESS_COMMAND);
    for (field, value) in &mut fields {
        if *field == JobField::Resource {
            *value = "someone-elses-cluster".to_string();
        }
    }
    let path = rig.place_record(&rig.ws.pending(), name, &fields).await;

    let limits = ResourceLimits::new("local", 4, 1024);
    let mut scheduler = Scheduler::new(scheduler_config(&rig), limits);
    let outcome =
        tokio::time::timeout(Duration::from_secs(4), scheduler.run()).await;
    assert!(outcome.is_err());
    assert!(path.exists());
}

#[tokio::test]
async fn test_oversized_record_is_not_admitted() {
    let rig = TestRig::new();
    let name = "inst_app_8_1";
    let mut fields = runnable_fields(&rig, name, SUCCESS_COMMAND);
    for (field, value) in &mut fields {
        if *field == JobField::Cores {
            *value = "8".to_string();
        }
    }
    let path = rig.place_record(&rig.ws.pending(), name, &fields).await;

    // Only 4 cores on this resource: an 8-core job can never fit.
    let limits = ResourceLimits::new("local", 4, 1024);
    let mut scheduler = Scheduler::new(scheduler_config(&rig), limits);
    let outcome =
        tokio::time::timeout(Duration::from_secs(4), scheduler.run()).await;
    assert!(outcome.is_err());
    assert!(path.exists());
}

#[tokio::test]
async fn test_admits_once_precondition_output_appears() {
    let rig = TestRig::new();
    let name = "inst_app_1_1";
    let mut fields = runnable_fields(&rig, name, SUCCESS_COMMAND);
    fields.push((JobField::Precondition, "prepsim".to_string()));
    rig.place_record(&rig.ws.pending(), name, &fields).await;

    // Satisfy the precondition after the scheduler is already polling.
    let output = rig.ws.precondition_output("inst", "prepsim");
    let planter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        std::fs::create_dir_all(&output).unwrap();
    });

    let limits = ResourceLimits::new("local", 4, 1024);
    let mut scheduler = Scheduler::new(scheduler_config(&rig), limits);
    tokio::time::timeout(Duration::from_secs(60), scheduler.run())
        .await
        .expect("scheduler should drain once the precondition appears")
        .expect("scheduler should not error");
    planter.await.unwrap();

    let archived = rig.archived_record(name).expect("archived record");
    assert_eq!(rig.read_record(&archived).await.result(), JobResult::Success);
}
