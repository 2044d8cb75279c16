mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;

use ems_enterprise_ai::lock::MemoryStore;
use ems_enterprise_ai::scheduler::{
    CronRegistrar, FnJob, GateState, JobRegistrar, Scheduler, SchedulerError,
};

#[derive(Default)]
struct CountingRegistrar {
    starts: AtomicUsize,
}

#[async_trait]
impl JobRegistrar for CountingRegistrar {
    async fn start(&self) -> Result<(), SchedulerError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn monthly_registrar() -> CronRegistrar {
    CronRegistrar::new(Tz::Asia__Taipei).with_job(
        "auto_update_model",
        "0 0 0 1 * *",
        Arc::new(FnJob(|| async { anyhow::Ok(()) })),
    )
}

#[tokio::test]
async fn repeated_start_registers_jobs_once() {
    let gate = common::gate_over(Arc::new(MemoryStore::new()));
    let registrar = CountingRegistrar::default();

    assert_eq!(gate.maybe_start(&registrar).await, GateState::Running);
    assert_eq!(gate.maybe_start(&registrar).await, GateState::Running);
    assert_eq!(registrar.starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_start_calls_register_once() {
    let gate = Arc::new(common::gate_over(Arc::new(MemoryStore::new())));
    let registrar = Arc::new(CountingRegistrar::default());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gate = gate.clone();
            let registrar = registrar.clone();
            tokio::spawn(async move { gate.maybe_start(registrar.as_ref()).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), GateState::Running);
    }
    assert_eq!(registrar.starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn only_one_of_two_processes_schedules() {
    let shared = Arc::new(MemoryStore::new());
    let first = common::gate_over(shared.clone());
    let second = common::gate_over(shared);
    let first_jobs = monthly_registrar();
    let second_jobs = monthly_registrar();

    assert_eq!(first.maybe_start(&first_jobs).await, GateState::Running);
    assert_eq!(second.maybe_start(&second_jobs).await, GateState::Idle);

    let registered = first_jobs.jobs().await;
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].schedule.job_id, "auto_update_model");
    assert_eq!(registered[0].schedule.timezone, "Asia/Taipei");
    assert!(second_jobs.jobs().await.is_empty());

    first_jobs.shutdown().await;
}

#[tokio::test]
async fn unreachable_lock_store_leaves_every_process_idle() {
    let gate = common::gate_over(Arc::new(common::DownStore));
    let registrar = CountingRegistrar::default();

    assert_eq!(gate.maybe_start(&registrar).await, GateState::Idle);
    assert_eq!(gate.state(), GateState::Idle);
    assert_eq!(registrar.starts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_job_definition_starts_nothing() {
    let gate = common::gate_over(Arc::new(MemoryStore::new()));
    let registrar = CronRegistrar::new(Tz::UTC)
        .with_job("good", "0 0 0 1 * *", Arc::new(FnJob(|| async { anyhow::Ok(()) })))
        .with_job("bad", "whenever", Arc::new(FnJob(|| async { anyhow::Ok(()) })));

    assert_eq!(gate.maybe_start(&registrar).await, GateState::Idle);
    assert!(registrar.jobs().await.is_empty());
}

#[tokio::test]
async fn failed_tick_does_not_stop_later_ticks() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut scheduler = Scheduler::new(Tz::UTC);
    scheduler
        .add_job(
            "flaky",
            "* * * * * *",
            Arc::new(FnJob(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        anyhow::bail!("first run fails");
                    }
                    Ok(())
                }
            })),
        )
        .unwrap();
    scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let status = scheduler.jobs();
    scheduler.shutdown().await;

    assert!(calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(status[0].failures, 1);
    assert!(status[0].runs >= 2);
}
