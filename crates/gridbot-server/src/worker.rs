//! Periodic driver for the parse and process jobs.
//!
//! Every tick schedules both jobs. Each job owns a [`JobSlot`] with an
//! explicit `running` flag and a single `pending` flag: a tick that lands
//! while the job is still running only sets `pending`, and when the run
//! finishes exactly one catch-up run follows, however many ticks were
//! missed. The two jobs are independent of each other and run on the
//! blocking pool because the store is synchronous.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gridbot_core::config::RobotConfig;
use gridbot_core::db::RobotDb;
use gridbot_core::executor::process_actions;
use gridbot_core::parser::parse_commands;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

// ---------------------------------------------------------------------------
// JobSlot
// ---------------------------------------------------------------------------

/// Run-state for one job: at most one instance, at most one queued rerun.
#[derive(Debug, Default)]
pub struct JobSlot {
    running: AtomicBool,
    pending: AtomicBool,
}

impl JobSlot {
    /// Claim the slot. Returns `false` if a run is already in flight, in
    /// which case a single catch-up run is recorded instead.
    pub fn try_start(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return true;
        }
        self.pending.store(true, Ordering::Release);
        false
    }

    /// Called when a run ends. Returns `true` if the caller should run
    /// again (a tick was missed), keeping the slot claimed.
    pub fn finish(&self) -> bool {
        if self.pending.swap(false, Ordering::AcqRel) {
            return true;
        }
        self.running.store(false, Ordering::Release);
        // A tick may have set `pending` between the swap and the store.
        if self.pending.load(Ordering::Acquire)
            && self
                .running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.pending.store(false, Ordering::Release);
            return true;
        }
        false
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Parse,
    Process,
}

impl Job {
    pub fn as_str(self) -> &'static str {
        match self {
            Job::Parse => "parse",
            Job::Process => "process",
        }
    }
}

/// Run one instance of `job` on the blocking pool. Errors are logged; the
/// next tick retries from whatever the store has committed.
pub async fn run_job(job: Job, db: Arc<RobotDb>, robot: Arc<RobotConfig>) {
    let outcome = tokio::task::spawn_blocking(move || match job {
        Job::Parse => parse_commands(&db).map(|r| format!("{r:?}")),
        Job::Process => process_actions(&db, &robot).map(|r| format!("{r:?}")),
    })
    .await;

    match outcome {
        Ok(Ok(report)) => debug!(job = job.as_str(), %report, "job finished"),
        Ok(Err(e)) => error!(job = job.as_str(), error = %e, "job failed"),
        Err(e) => error!(job = job.as_str(), error = %e, "job panicked"),
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Schedules the parse and process jobs on a fixed interval.
#[derive(Clone)]
pub struct Driver {
    db: Arc<RobotDb>,
    robot: Arc<RobotConfig>,
    interval: Duration,
    parse: Arc<JobSlot>,
    process: Arc<JobSlot>,
}

impl Driver {
    pub fn new(db: Arc<RobotDb>, robot: RobotConfig, interval: Duration) -> Self {
        Self {
            db,
            robot: Arc::new(robot),
            interval,
            parse: Arc::new(JobSlot::default()),
            process: Arc::new(JobSlot::default()),
        }
    }

    /// Tick forever. The first tick fires immediately.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "worker started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick();
        }
    }

    /// Schedule both jobs once.
    pub fn tick(&self) {
        self.schedule(Job::Parse);
        self.schedule(Job::Process);
    }

    /// `true` while either job has a run in flight.
    pub fn is_busy(&self) -> bool {
        self.parse.is_running() || self.process.is_running()
    }

    fn schedule(&self, job: Job) {
        let slot = match job {
            Job::Parse => self.parse.clone(),
            Job::Process => self.process.clone(),
        };
        if !slot.try_start() {
            debug!(job = job.as_str(), "job still running, catch-up run queued");
            return;
        }

        let db = self.db.clone();
        let robot = self.robot.clone();
        tokio::spawn(async move {
            loop {
                run_job(job, db.clone(), robot.clone()).await;
                if !slot.finish() {
                    break;
                }
                debug!(job = job.as_str(), "running coalesced catch-up");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
