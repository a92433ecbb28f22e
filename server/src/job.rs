//! Registro vivo de cada job. Solo lo tocan su propia tarea y el tracker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{JobId, JobKind, JobSnapshot, JobStatus, ProgressEvent};
use tokio::time::Instant;
use tracing::info;

use crate::tracker::{lock, TrackedJob};

/// Estado, fin y resultado cambian juntos: `end_time` existe sii el estado es terminal.
#[derive(Debug, Clone)]
struct Lifecycle {
    status: JobStatus,
    end_time: Option<DateTime<Utc>>,
    sink_location: Option<String>,
    error: Option<String>,
}

/// Parte común de batch y stream.
#[derive(Debug)]
pub struct JobCore {
    id: JobId,
    start_time: DateTime<Utc>,
    log_count: AtomicU64,
    keep_going: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

impl JobCore {
    fn new(id: JobId) -> Self {
        Self {
            id,
            start_time: Utc::now(),
            log_count: AtomicU64::new(0),
            keep_going: AtomicBool::new(true),
            lifecycle: Mutex::new(Lifecycle {
                status: JobStatus::Active,
                end_time: None,
                sink_location: None,
                error: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        lock(&self.lifecycle).status
    }

    pub fn log_count(&self) -> u64 {
        self.log_count.load(Ordering::SeqCst)
    }

    pub fn add_lines(&self, n: u64) {
        self.log_count.fetch_add(n, Ordering::SeqCst);
    }

    pub fn keep_going(&self) -> bool {
        self.keep_going.load(Ordering::SeqCst)
    }

    /// Pedido cooperativo de corte: la tarea lo ve al inicio de su próxima vuelta.
    /// Devuelve false si ya estaba pedido.
    pub fn request_stop(&self) -> bool {
        self.keep_going.swap(false, Ordering::SeqCst)
    }

    /// La tarea sigue generando mientras esté ACTIVE y nadie haya pedido parar.
    pub fn is_running(&self) -> bool {
        self.keep_going() && self.status() == JobStatus::Active
    }

    /// ACTIVE -> FINALIZING. Devuelve false si el job ya no estaba activo.
    pub fn finalize(&self) -> bool {
        let mut lc = lock(&self.lifecycle);
        if lc.status != JobStatus::Active {
            return false;
        }
        lc.status = JobStatus::Finalizing;
        true
    }

    pub fn complete(&self, location: String) -> bool {
        self.finish(JobStatus::Completed, Some(location), None)
    }

    pub fn fail(&self, error: impl Into<String>) -> bool {
        self.finish(JobStatus::Failed, None, Some(error.into()))
    }

    /// Una vez terminal el job ya no cambia.
    fn finish(&self, status: JobStatus, location: Option<String>, error: Option<String>) -> bool {
        let mut lc = lock(&self.lifecycle);
        if lc.status.is_terminal() {
            return false;
        }
        lc.status = status;
        lc.end_time = Some(Utc::now());
        lc.sink_location = location;
        lc.error = error;
        self.keep_going.store(false, Ordering::SeqCst);
        true
    }

    fn progress(&self) -> ProgressEvent {
        let lc = lock(&self.lifecycle).clone();
        ProgressEvent {
            job_id: self.id.clone(),
            status: lc.status,
            log_count: self.log_count(),
            timestamp: Utc::now(),
            sink_location: lc.sink_location,
        }
    }

    fn snapshot(&self, kind: JobKind) -> JobSnapshot {
        let lc = lock(&self.lifecycle).clone();
        let run_time_secs = match lc.end_time {
            Some(end) => (end - self.start_time).num_seconds(),
            None => (Utc::now() - self.start_time).num_seconds(),
        };

        JobSnapshot {
            job_id: self.id.clone(),
            kind,
            status: lc.status,
            log_count: self.log_count(),
            target_count: None,
            start_time: self.start_time,
            end_time: lc.end_time,
            run_time_secs,
            sink_location: lc.sink_location,
            error: lc.error,
            keep_going: None,
            last_ping_secs_ago: None,
        }
    }
}

#[derive(Debug)]
pub struct BatchJob {
    core: JobCore,
    target: u64,
}

impl BatchJob {
    pub fn new(id: JobId, target: u64) -> Self {
        Self {
            core: JobCore::new(id),
            target,
        }
    }

    pub fn core(&self) -> &JobCore {
        &self.core
    }

    pub fn target(&self) -> u64 {
        self.target
    }
}

impl TrackedJob for BatchJob {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn progress(&self) -> ProgressEvent {
        self.core.progress()
    }

    fn review(&self, _now: Instant) -> bool {
        self.core.log_count() >= self.target
            || !self.core.keep_going()
            || self.core.status().is_terminal()
    }

    fn request_stop(&self) -> bool {
        self.core.request_stop()
    }

    fn keep_going(&self) -> bool {
        self.core.keep_going()
    }

    fn snapshot(&self) -> JobSnapshot {
        let mut snap = self.core.snapshot(JobKind::Batch);
        snap.target_count = Some(self.target);
        snap
    }
}

#[derive(Debug)]
pub struct StreamJob {
    core: JobCore,
    last_ping: Mutex<Instant>,
    timeout: Duration,
}

impl StreamJob {
    pub fn new(id: JobId, timeout: Duration) -> Self {
        Self {
            core: JobCore::new(id),
            last_ping: Mutex::new(Instant::now()),
            timeout,
        }
    }

    pub fn core(&self) -> &JobCore {
        &self.core
    }

    /// Señal de vida del cliente.
    pub fn touch(&self) {
        *lock(&self.last_ping) = Instant::now();
    }

    pub fn last_ping(&self) -> Instant {
        *lock(&self.last_ping)
    }
}

impl TrackedJob for StreamJob {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn progress(&self) -> ProgressEvent {
        self.core.progress()
    }

    fn review(&self, now: Instant) -> bool {
        let expired = self
            .last_ping()
            .checked_add(self.timeout)
            .is_some_and(|deadline| deadline < now);

        if expired && self.core.keep_going() {
            info!(
                "stream {} sin keepalive hace más de {:?}, cortando",
                self.core.id(),
                self.timeout
            );
            self.core.request_stop();
        }

        !self.core.keep_going() || self.core.status().is_terminal()
    }

    fn request_stop(&self) -> bool {
        self.core.request_stop()
    }

    fn keep_going(&self) -> bool {
        self.core.keep_going()
    }

    fn snapshot(&self) -> JobSnapshot {
        let mut snap = self.core.snapshot(JobKind::Stream);
        snap.keep_going = Some(self.core.keep_going());
        snap.last_ping_secs_ago = Some(self.last_ping().elapsed().as_secs());
        snap
    }
}
