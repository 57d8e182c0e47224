//! Job scheduler: runs of one job never overlap, overlapping firings queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use reveal_common::ScheduleConfig;
use reveal_pipeline::testing::MockWorld;
use reveal_pipeline::{build_scheduler, Job, JobKind, JobScheduler};

/// Tracks how many runs are in flight at once across every job sharing it.
#[derive(Default)]
struct Gauge {
    running: AtomicUsize,
    peak: AtomicUsize,
}

struct SlowJob {
    name: &'static str,
    gauge: Arc<Gauge>,
    runs: AtomicUsize,
    fail_first: bool,
}

impl SlowJob {
    fn new(name: &'static str, gauge: Arc<Gauge>) -> Self {
        Self {
            name,
            gauge,
            runs: AtomicUsize::new(0),
            fail_first: false,
        }
    }
}

#[async_trait]
impl Job for SlowJob {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self) -> Result<()> {
        let now = self.gauge.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.gauge.running.fetch_sub(1, Ordering::SeqCst);

        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail_first && run == 0 {
            bail!("first run fails");
        }
        Ok(())
    }
}

#[tokio::test]
async fn overlapping_ticks_of_one_job_queue() {
    let gauge = Arc::new(Gauge::default());
    let job = Arc::new(SlowJob::new("prefilter", gauge.clone()));
    let mut scheduler = JobScheduler::new();
    scheduler.register(job.clone(), "*/30 * * * * *").unwrap();

    let (a, b, c) = tokio::join!(
        scheduler.tick("prefilter"),
        scheduler.tick("prefilter"),
        scheduler.tick("prefilter"),
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(job.runs.load(Ordering::SeqCst), 3, "no firing is dropped");
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 1, "runs never overlap");
}

#[tokio::test]
async fn different_jobs_run_concurrently() {
    let gauge = Arc::new(Gauge::default());
    let mut scheduler = JobScheduler::new();
    scheduler
        .register(Arc::new(SlowJob::new("prefilter", gauge.clone())), "*/30 * * * * *")
        .unwrap();
    scheduler
        .register(Arc::new(SlowJob::new("identify", gauge.clone())), "*/30 * * * * *")
        .unwrap();

    let (a, b) = tokio::join!(scheduler.tick("prefilter"), scheduler.tick("identify"));

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_run_does_not_block_the_next() {
    let gauge = Arc::new(Gauge::default());
    let job = Arc::new(SlowJob {
        fail_first: true,
        ..SlowJob::new("notify-slack", gauge)
    });
    let mut scheduler = JobScheduler::new();
    scheduler.register(job.clone(), "0 * * * * *").unwrap();

    assert!(scheduler.tick("notify-slack").await.is_err());
    assert!(scheduler.tick("notify-slack").await.is_ok());
    assert_eq!(job.runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn started_scheduler_fires_on_schedule() {
    let gauge = Arc::new(Gauge::default());
    let job = Arc::new(SlowJob::new("identify", gauge));
    let mut scheduler = JobScheduler::new();
    scheduler.register(job.clone(), "* * * * * *").unwrap();

    let handles = scheduler.start();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    for handle in handles {
        handle.abort();
    }

    assert!(job.runs.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn pipeline_registers_all_four_jobs() {
    let world = MockWorld::new();
    let scheduler =
        build_scheduler(Arc::new(world.pipeline()), &ScheduleConfig::default()).unwrap();

    let mut names = scheduler.job_names();
    names.sort();
    let mut expected: Vec<&str> = JobKind::ALL.iter().map(|k| k.as_str()).collect();
    expected.sort();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn invalid_cron_expression_is_rejected() {
    let world = MockWorld::new();
    let schedules = ScheduleConfig {
        identify: "every thirty seconds".into(),
        ..ScheduleConfig::default()
    };

    assert!(build_scheduler(Arc::new(world.pipeline()), &schedules).is_err());
}
