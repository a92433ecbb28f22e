//! Registro de jobs por tipo (activos + historial) y el loop de progreso.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use common::{JobId, JobKind, JobSnapshot, ProgressEvent};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::publisher::{job_topic, Publisher};

/// Toma el lock aunque otro hilo haya paniqueado con él tomado.
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lo que el tracker necesita saber de un job.
pub trait TrackedJob: Send + Sync + 'static {
    fn id(&self) -> &str;

    fn progress(&self) -> ProgressEvent;

    /// Aplica las reglas de una pasada; true = sacarlo de activos.
    fn review(&self, now: Instant) -> bool;

    /// Pide el corte; false si ya estaba pedido.
    fn request_stop(&self) -> bool;

    fn keep_going(&self) -> bool;

    fn snapshot(&self) -> JobSnapshot;
}

struct ActiveSet<J> {
    jobs: HashMap<JobId, Arc<J>>,
    loop_running: bool,
}

struct Inner<J> {
    kind: JobKind,
    tick: Duration,
    publisher: Arc<dyn Publisher>,
    // todo lo que está en active también está en history
    active: Mutex<ActiveSet<J>>,
    history: Mutex<HashMap<JobId, Arc<J>>>,
}

pub struct Tracker<J> {
    inner: Arc<Inner<J>>,
}

impl<J> Clone for Tracker<J> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<J: TrackedJob> Tracker<J> {
    pub fn new(kind: JobKind, tick: Duration, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                tick,
                publisher,
                active: Mutex::new(ActiveSet {
                    jobs: HashMap::new(),
                    loop_running: false,
                }),
                history: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Agrega un job nuevo y arranca el loop de progreso si estaba parado.
    pub fn register(&self, job: Arc<J>) {
        let id = job.id().to_string();

        lock(&self.inner.history).insert(id.clone(), job.clone());

        let start_loop = {
            let mut active = lock(&self.inner.active);
            active.jobs.insert(id.clone(), job);
            if active.loop_running {
                false
            } else {
                active.loop_running = true;
                true
            }
        };

        info!("job {} {} registrado", self.inner.kind.as_str(), id);

        if start_loop {
            debug!("arrancando loop de progreso ({})", self.inner.kind.as_str());
            tokio::spawn(run_progress_loop(self.inner.clone()));
        }
    }

    /// Pide el corte de un job activo. false si no existe, ya no está activo
    /// o ya se le había pedido parar.
    pub fn stop(&self, id: &str) -> bool {
        self.with_active(id, |job| job.request_stop())
            .unwrap_or(false)
    }

    /// Ejecuta `f` sobre el job si sigue activo y nadie le pidió parar.
    pub fn with_active<T>(&self, id: &str, f: impl FnOnce(&J) -> T) -> Option<T> {
        let job = lock(&self.inner.active).jobs.get(id).cloned()?;
        if !job.keep_going() {
            return None;
        }
        Some(f(&job))
    }

    /// Busca en el historial (activos incluidos).
    pub fn get(&self, id: &str) -> Option<Arc<J>> {
        lock(&self.inner.history).get(id).cloned()
    }

    pub fn is_active(&self, id: &str) -> bool {
        lock(&self.inner.active).jobs.contains_key(id)
    }

    pub fn active_len(&self) -> usize {
        lock(&self.inner.active).jobs.len()
    }

    pub fn history_len(&self) -> usize {
        lock(&self.inner.history).len()
    }

    pub fn is_loop_running(&self) -> bool {
        lock(&self.inner.active).loop_running
    }

    /// Fotos de todo el historial, ordenadas por inicio.
    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        let jobs: Vec<Arc<J>> = lock(&self.inner.history).values().cloned().collect();
        let mut out: Vec<JobSnapshot> = jobs.iter().map(|j| j.snapshot()).collect();
        out.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        out
    }
}

/// Cada `tick`: publica progreso de los activos y retira los que terminaron.
/// Termina cuando no quedan activos; el próximo `register` lo vuelve a lanzar.
async fn run_progress_loop<J: TrackedJob>(inner: Arc<Inner<J>>) {
    let mut ticker = interval_at(Instant::now() + inner.tick, inner.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if !sweep_once(&inner) {
            debug!("loop de progreso ({}) sin jobs activos, termina", inner.kind.as_str());
            break;
        }
    }
}

/// Una pasada. Devuelve false si ya no quedan jobs activos.
fn sweep_once<J: TrackedJob>(inner: &Inner<J>) -> bool {
    let jobs: Vec<Arc<J>> = {
        let mut active = lock(&inner.active);
        if active.jobs.is_empty() {
            active.loop_running = false;
            return false;
        }
        active.jobs.values().cloned().collect()
    };

    let now = Instant::now();
    let mut retired: Vec<JobId> = Vec::new();

    for job in &jobs {
        inner.publisher.publish(&job_topic(job.id()), job.progress());

        if job.review(now) {
            retired.push(job.id().to_string());
        }
    }

    let mut active = lock(&inner.active);
    for id in retired {
        active.jobs.remove(&id);
        info!("job {} {} retirado de activos", inner.kind.as_str(), id);
    }

    if active.jobs.is_empty() {
        active.loop_running = false;
        return false;
    }
    true
}
