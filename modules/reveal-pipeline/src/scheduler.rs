//! Cron driver for the pipeline jobs.
//!
//! Each registered job owns one async mutex. A firing that arrives while the
//! previous run of the same job is still going waits for it (queues) rather
//! than being dropped, and runs of one job never overlap. Different jobs run
//! independently.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<()>;
}

struct ScheduledJob {
    job: Arc<dyn Job>,
    schedule: Schedule,
    lock: Arc<Mutex<()>>,
}

#[derive(Default)]
pub struct JobScheduler {
    jobs: BTreeMap<String, ScheduledJob>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job` to fire on `cron_expression` (seconds-resolution syntax,
    /// e.g. `"*/30 * * * * *"`).
    pub fn register(&mut self, job: Arc<dyn Job>, cron_expression: &str) -> Result<()> {
        let schedule = Schedule::from_str(cron_expression).map_err(|e| {
            anyhow!("invalid cron expression '{cron_expression}' for job {}: {e}", job.name())
        })?;
        let name = job.name().to_string();
        if self.jobs.contains_key(&name) {
            return Err(anyhow!("job {name} is already registered"));
        }
        self.jobs.insert(
            name,
            ScheduledJob {
                job,
                schedule,
                lock: Arc::new(Mutex::new(())),
            },
        );
        Ok(())
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.keys().map(String::as_str).collect()
    }

    /// Run one invocation of `name`, waiting behind any run already in progress.
    pub async fn tick(&self, name: &str) -> Result<()> {
        let scheduled = self
            .jobs
            .get(name)
            .ok_or_else(|| anyhow!("unknown job {name}"))?;
        run_serialized(scheduled.job.clone(), scheduled.lock.clone()).await
    }

    /// Spawn one timer loop per job. Each firing spawns its own task, which
    /// queues on the job's mutex. Abort the handles to stop.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        self.jobs
            .values()
            .map(|scheduled| {
                let job = scheduled.job.clone();
                let lock = scheduled.lock.clone();
                let schedule = scheduled.schedule.clone();
                tokio::spawn(async move {
                    info!(job = job.name(), "Job scheduled");
                    let mut after = Utc::now();
                    loop {
                        let Some(next) = schedule.after(&after).next() else {
                            warn!(job = job.name(), "Schedule has no upcoming firings, stopping");
                            return;
                        };
                        let wait = (next - Utc::now()).to_std().unwrap_or_default();
                        tokio::time::sleep(wait).await;
                        after = next;

                        let job = job.clone();
                        let lock = lock.clone();
                        tokio::spawn(async move {
                            let name = job.name().to_string();
                            if let Err(e) = run_serialized(job, lock).await {
                                error!(job = %name, error = %format!("{e:#}"), "Job run failed");
                            }
                        });
                    }
                })
            })
            .collect()
    }
}

async fn run_serialized(job: Arc<dyn Job>, lock: Arc<Mutex<()>>) -> Result<()> {
    let _guard = lock.lock().await;
    let started = std::time::Instant::now();
    let result = job.run().await;
    info!(
        job = job.name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "Job run finished"
    );
    result
}
