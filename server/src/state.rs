use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use common::{
    validate, AllJobMetrics, GenerationRequest, JobId, JobKind, JobSnapshot, ValidationError,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::job::{BatchJob, StreamJob};
use crate::publisher::Publisher;
use crate::runner::{run_batch_job, run_stream_job, GenerationPlan};
use crate::sink::{HttpSink, Sink, TeeSink};
use crate::tracker::{TrackedJob, Tracker};

/// Por qué no se creó un job.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("la dirección de stream {address} no está disponible: {reason}")]
    AddressUnavailable { address: String, reason: String },
}

/// Dueño de los dos trackers; todo acceso a los jobs pasa por acá.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    batch: Tracker<BatchJob>,
    stream: Tracker<StreamJob>,
    sink: Arc<dyn Sink>,
    http: reqwest::Client,
    // para variar la semilla entre jobs cuando hay LOGGEN_SEED
    job_seq: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: ServerConfig, sink: Arc<dyn Sink>, publisher: Arc<dyn Publisher>) -> Self {
        let tick = config.tick_interval;
        Self {
            config: Arc::new(config),
            batch: Tracker::new(JobKind::Batch, tick, publisher.clone()),
            stream: Tracker::new(JobKind::Stream, tick, publisher),
            sink,
            http: reqwest::Client::new(),
            job_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Valida, registra y lanza un job batch. Devuelve su id.
    pub fn submit_batch(&self, request: GenerationRequest) -> Result<JobId, ValidationError> {
        validate(&request, JobKind::Batch)?;
        let target = request
            .batch_settings
            .as_ref()
            .map(|b| b.number_of_logs)
            .ok_or(ValidationError::MissingBatchSettings)?;

        let job_id = new_job_id();
        let job = Arc::new(BatchJob::new(job_id.clone(), target));
        let plan = Arc::new(GenerationPlan::new(request));

        self.batch.register(job.clone());

        let sink = self.sink.clone();
        let rng = self.job_rng();
        tokio::spawn(async move {
            let id = job.core().id().to_string();
            if let Err(e) = run_batch_job(job, plan, sink, rng).await {
                warn!("batch {} terminó con error: {}", id, e);
            }
        });

        info!("batch {} aceptado (objetivo={})", job_id, target);
        Ok(job_id)
    }

    /// Valida, registra y lanza un job stream. Con `stream_address`, antes de
    /// crear nada manda una línea de prueba y rechaza la dirección si falla.
    pub async fn submit_stream(&self, request: GenerationRequest) -> Result<JobId, SubmitError> {
        validate(&request, JobKind::Stream)?;

        let plan = Arc::new(GenerationPlan::new(request));
        let mut rng = self.job_rng();

        let sink: Arc<dyn Sink> = match plan.request.stream_address() {
            Some(address) => {
                let http = HttpSink::new(self.http.clone(), address);
                if let Err(e) = http.check(&plan.sample_line(&mut rng)).await {
                    warn!("dirección de stream {} rechazada: {}", address, e);
                    return Err(SubmitError::AddressUnavailable {
                        address: address.to_string(),
                        reason: e.to_string(),
                    });
                }

                let live: Arc<dyn Sink> = Arc::new(http);
                if plan.request.save_logs() {
                    Arc::new(TeeSink::new(live, self.sink.clone()))
                } else {
                    live
                }
            }
            None => self.sink.clone(),
        };

        let job_id = new_job_id();
        let job = Arc::new(StreamJob::new(job_id.clone(), self.config.stream_timeout));

        self.stream.register(job.clone());

        tokio::spawn(async move {
            let id = job.core().id().to_string();
            if let Err(e) = run_stream_job(job, plan, sink, rng).await {
                warn!("stream {} terminó con error: {}", id, e);
            }
        });

        info!("stream {} aceptado", job_id);
        Ok(job_id)
    }

    /// Corta un job activo de cualquier tipo. false si no está activo.
    pub fn stop(&self, job_id: &str) -> bool {
        let found = self.batch.stop(job_id) || self.stream.stop(job_id);
        if found {
            info!("stop pedido para job {}", job_id);
        }
        found
    }

    /// Renueva la vida de un stream activo. false si no está activo.
    pub fn keep_alive(&self, job_id: &str) -> bool {
        self.stream.with_active(job_id, |job| job.touch()).is_some()
    }

    pub fn status(&self, job_id: &str) -> Option<JobSnapshot> {
        if let Some(job) = self.batch.get(job_id) {
            return Some(job.snapshot());
        }
        self.stream.get(job_id).map(|job| job.snapshot())
    }

    pub fn list_all(&self) -> AllJobMetrics {
        AllJobMetrics {
            num_active_batch_jobs: self.batch.active_len(),
            num_all_batch_jobs: self.batch.history_len(),
            num_active_stream_jobs: self.stream.active_len(),
            num_all_stream_jobs: self.stream.history_len(),
            batch_jobs: self.batch.snapshots(),
            stream_jobs: self.stream.snapshots(),
        }
    }

    fn job_rng(&self) -> StdRng {
        let seq = self.job_seq.fetch_add(1, Ordering::SeqCst);
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(seq)),
            None => StdRng::from_os_rng(),
        }
    }
}

fn new_job_id() -> JobId {
    uuid::Uuid::new_v4().to_string()
}
