//! The Job Tracker (§4.G): one in-memory slot per robot, coalesced
//! persistence, at-most-once terminal transitions.

use crate::error::Result;
use aetheris_shared::{Job, JobEventKind, JobPhase, JobStatus};
use aetheris_store::EntityStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

/// A decoded `job` stream message, independent of its wire shape (§6,
/// §4.G).
#[derive(Debug, Clone)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub robot_id: String,
    pub job_id: Option<String>,
    pub task_name: Option<String>,
    pub phase: Option<String>,
    pub items_total: Option<u64>,
    pub items_done: Option<u64>,
    pub last_item: Option<String>,
    pub cancel_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

struct RobotSlot {
    job: Option<Job>,
    last_flush: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct JobTrackerConfig {
    pub stale_timeout: Duration,
    pub flush_interval: Duration,
}

impl Default for JobTrackerConfig {
    fn default() -> Self {
        Self {
            stale_timeout: Duration::from_secs(300),
            flush_interval: Duration::from_secs(2),
        }
    }
}

/// Single-writer in-memory job table, keyed by `robot_id`, guarded by one
/// lock per robot so no global lock serialises unrelated robots (§4.G, §5).
pub struct JobTracker {
    store: Arc<EntityStore>,
    table: RwLock<HashMap<String, Arc<Mutex<RobotSlot>>>>,
    config: JobTrackerConfig,
}

fn parse_phase(s: &str) -> JobPhase {
    match s {
        "scanning" => JobPhase::Scanning,
        "searching" => JobPhase::Searching,
        "done" => JobPhase::Done,
        _ => JobPhase::Executing,
    }
}

impl JobTracker {
    pub fn new(store: Arc<EntityStore>, config: JobTrackerConfig) -> Self {
        Self {
            store,
            table: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Loads every `status='active'` row from the Entity Store into memory
    /// (§4.G, §9 durability resolution). Must run before any event is
    /// dispatched.
    pub async fn reconstruct(&self) -> Result<()> {
        let jobs = self.store.list_active_jobs()?;
        let mut table = self.table.write().await;
        for job in jobs {
            table.insert(
                job.robot_id.clone(),
                Arc::new(Mutex::new(RobotSlot {
                    job: Some(job),
                    last_flush: Instant::now(),
                })),
            );
        }
        Ok(())
    }

    async fn slot_for(&self, robot_id: &str) -> Arc<Mutex<RobotSlot>> {
        if let Some(slot) = self.table.read().await.get(robot_id) {
            return slot.clone();
        }
        let mut table = self.table.write().await;
        table
            .entry(robot_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(RobotSlot {
                    job: None,
                    last_flush: Instant::now(),
                }))
            })
            .clone()
    }

    pub async fn handle_event(&self, event: JobEvent) -> Result<()> {
        match event.kind {
            JobEventKind::Start => self.start(event).await,
            JobEventKind::Progress | JobEventKind::Item => self.progress(event).await,
            JobEventKind::Complete => {
                self.terminal(event, JobStatus::Completed, Some(true)).await
            }
            JobEventKind::Cancel => self.terminal(event, JobStatus::Cancelled, None).await,
            JobEventKind::Fail => self.terminal(event, JobStatus::Failed, Some(false)).await,
        }
    }

    /// Creates a new active job, force-cancelling a stale prior job first
    /// if needed. Rejected (silently, per §4.G) if a non-stale job is
    /// already active.
    async fn start(&self, event: JobEvent) -> Result<()> {
        let slot = self.slot_for(&event.robot_id).await;
        let mut slot = slot.lock().await;

        if let Some(existing) = &slot.job {
            if !existing.status.is_terminal() {
                let age = event
                    .timestamp
                    .signed_duration_since(existing.start_time)
                    .to_std()
                    .unwrap_or_default();
                if age < self.config.stale_timeout {
                    debug!(robot_id = %event.robot_id, "job start rejected, an active job is already running");
                    return Ok(());
                }
                let mut superseded = existing.clone();
                superseded.status = JobStatus::Cancelled;
                superseded.end_time = Some(event.timestamp);
                superseded.cancel_reason = Some("superseded".to_string());
                self.store.transition_job_terminal(&superseded).ok();
            }
        }

        let job = Job {
            id: Uuid::new_v4().to_string(),
            robot_id: event.robot_id.clone(),
            task_name: event.task_name.unwrap_or_default(),
            phase: event.phase.as_deref().map(parse_phase).unwrap_or(JobPhase::Scanning),
            status: JobStatus::Active,
            items_total: event.items_total.unwrap_or(0),
            items_done: 0,
            percent_complete: 0.0,
            start_time: event.timestamp,
            end_time: None,
            last_item: None,
            cancel_reason: None,
            success: None,
        };
        self.store.insert_active_job(&job)?;
        slot.last_flush = Instant::now();
        slot.job = Some(job);
        Ok(())
    }

    /// Applies a monotonic progress update. Regressions and events for an
    /// unknown or mismatched job id are silently discarded (§5: tolerate
    /// out-of-order events across streams).
    async fn progress(&self, event: JobEvent) -> Result<()> {
        let slot = self.slot_for(&event.robot_id).await;
        let mut slot = slot.lock().await;

        let Some(job) = slot.job.as_mut() else {
            debug!(robot_id = %event.robot_id, "progress event with no active job, discarding");
            return Ok(());
        };
        if job.status.is_terminal() {
            debug!(robot_id = %event.robot_id, "progress event after job terminal, discarding");
            return Ok(());
        }
        if let Some(job_id) = &event.job_id {
            if job_id != &job.id {
                debug!(robot_id = %event.robot_id, "progress event for stale job id, discarding");
                return Ok(());
            }
        }

        if let Some(items_done) = event.items_done {
            if items_done < job.items_done {
                debug!(robot_id = %event.robot_id, from = job.items_done, to = items_done, "dropping backward items_done step");
            } else {
                job.items_done = items_done;
                job.recompute_percent();
            }
        }
        if let Some(phase) = &event.phase {
            job.phase = parse_phase(phase);
        }
        if let Some(last_item) = event.last_item {
            job.last_item = Some(last_item);
        }

        if slot.last_flush.elapsed() >= self.config.flush_interval {
            let job = slot.job.clone().expect("checked Some above");
            if let Err(e) = self.store.update_job_progress(&job) {
                debug!(error = %e, "progress flush failed, will retry on next coalescing window");
            } else {
                slot.last_flush = Instant::now();
            }
        }
        Ok(())
    }

    /// Transitions to a terminal status. At-most-once: a second terminal
    /// event for an already-terminal job is a silent no-op (§4.G).
    async fn terminal(
        &self,
        event: JobEvent,
        status: JobStatus,
        success: Option<bool>,
    ) -> Result<()> {
        let slot = self.slot_for(&event.robot_id).await;
        let mut slot = slot.lock().await;

        let Some(job) = slot.job.as_mut() else {
            return Ok(());
        };
        if let Some(job_id) = &event.job_id {
            if job_id != &job.id {
                return Ok(());
            }
        }
        if job.status.is_terminal() {
            debug!(robot_id = %event.robot_id, job_id = %job.id, "duplicate terminal event, ignoring");
            return Ok(());
        }

        job.status = status;
        job.end_time = Some(event.timestamp);
        job.cancel_reason = event.cancel_reason;
        job.success = success;
        if let Some(items_done) = event.items_done {
            if items_done >= job.items_done {
                job.items_done = items_done;
                job.recompute_percent();
            }
        }
        self.store.transition_job_terminal(job)?;
        Ok(())
    }

    /// Periodic driver hook: flushes every robot slot whose coalescing
    /// window has elapsed, even if no new event arrived to trigger it
    /// (§4.G: "the next periodic flush retries").
    pub async fn flush_due(&self) {
        let slots: Vec<Arc<Mutex<RobotSlot>>> = self.table.read().await.values().cloned().collect();
        for slot in slots {
            let mut slot = slot.lock().await;
            if slot.last_flush.elapsed() < self.config.flush_interval {
                continue;
            }
            if let Some(job) = slot.job.clone() {
                if job.status.is_terminal() {
                    continue;
                }
                if self.store.update_job_progress(&job).is_ok() {
                    slot.last_flush = Instant::now();
                }
            }
        }
    }

    pub async fn list_active(&self) -> Vec<Job> {
        let table = self.table.read().await;
        let mut jobs = Vec::new();
        for slot in table.values() {
            let slot = slot.lock().await;
            if let Some(job) = &slot.job {
                if !job.status.is_terminal() {
                    jobs.push(job.clone());
                }
            }
        }
        jobs
    }

    pub async fn get_by_robot(&self, robot_id: &str) -> Option<Job> {
        let table = self.table.read().await;
        let slot = table.get(robot_id)?;
        let slot = slot.lock().await;
        slot.job.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> JobTracker {
        JobTracker::new(
            Arc::new(EntityStore::open_in_memory().unwrap()),
            JobTrackerConfig {
                stale_timeout: Duration::from_secs(300),
                flush_interval: Duration::from_secs(2),
            },
        )
    }

    fn event(kind: JobEventKind, robot_id: &str) -> JobEvent {
        JobEvent {
            kind,
            robot_id: robot_id.to_string(),
            job_id: None,
            task_name: Some("pack".to_string()),
            phase: None,
            items_total: Some(10),
            items_done: None,
            last_item: None,
            cancel_reason: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn start_creates_active_job() {
        let tracker = tracker();
        tracker.handle_event(event(JobEventKind::Start, "RV-001")).await.unwrap();
        let job = tracker.get_by_robot("RV-001").await.unwrap();
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.items_total, 10);
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_active() {
        let tracker = tracker();
        tracker.handle_event(event(JobEventKind::Start, "RV-001")).await.unwrap();
        let first_id = tracker.get_by_robot("RV-001").await.unwrap().id;
        tracker.handle_event(event(JobEventKind::Start, "RV-001")).await.unwrap();
        let job = tracker.get_by_robot("RV-001").await.unwrap();
        assert_eq!(job.id, first_id);
    }

    #[tokio::test]
    async fn progress_updates_monotonically() {
        let tracker = tracker();
        tracker.handle_event(event(JobEventKind::Start, "RV-001")).await.unwrap();

        let mut e = event(JobEventKind::Progress, "RV-001");
        e.items_done = Some(5);
        tracker.handle_event(e).await.unwrap();
        assert_eq!(tracker.get_by_robot("RV-001").await.unwrap().items_done, 5);

        let mut e = event(JobEventKind::Progress, "RV-001");
        e.items_done = Some(3);
        tracker.handle_event(e).await.unwrap();
        assert_eq!(
            tracker.get_by_robot("RV-001").await.unwrap().items_done,
            5,
            "backward step must be dropped"
        );
    }

    #[tokio::test]
    async fn complete_is_at_most_once() {
        let tracker = tracker();
        tracker.handle_event(event(JobEventKind::Start, "RV-001")).await.unwrap();
        tracker.handle_event(event(JobEventKind::Complete, "RV-001")).await.unwrap();
        let job = tracker.get_by_robot("RV-001").await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        let end_time = job.end_time;

        // Second complete (or any terminal) is a no-op, end_time unchanged.
        tokio::time::sleep(Duration::from_millis(1)).await;
        tracker.handle_event(event(JobEventKind::Complete, "RV-001")).await.unwrap();
        assert_eq!(tracker.get_by_robot("RV-001").await.unwrap().end_time, end_time);
    }

    #[tokio::test]
    async fn reconstruct_loads_active_jobs_from_store() {
        let store = Arc::new(EntityStore::open_in_memory().unwrap());
        let job = Job {
            id: "job-9".into(),
            robot_id: "RV-009".into(),
            task_name: "scan".into(),
            phase: JobPhase::Scanning,
            status: JobStatus::Active,
            items_total: 4,
            items_done: 1,
            percent_complete: 25.0,
            start_time: Utc::now(),
            end_time: None,
            last_item: None,
            cancel_reason: None,
            success: None,
        };
        store.insert_active_job(&job).unwrap();

        let tracker = JobTracker::new(store, JobTrackerConfig::default());
        tracker.reconstruct().await.unwrap();
        let restored = tracker.get_by_robot("RV-009").await.unwrap();
        assert_eq!(restored.id, "job-9");
        assert_eq!(restored.items_done, 1);
    }
}
