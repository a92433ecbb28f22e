//! Tareas de ejecución: el loop de generación de cada job y la escritura por tandas.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use common::overlay::{master_field_list, strip_excluded_fields};
use common::{compose_line, render_line, should_repeat, GenerationRequest, JobKind};
use rand::rngs::StdRng;
use rand::Rng;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use crate::job::{BatchJob, JobCore, StreamJob};
use crate::sink::{Sink, SinkError, SinkWriter};

/// Líneas que genera un stream entre pausa y pausa
pub const STREAM_CHUNK: usize = 10;
/// Líneas de un batch que se juntan antes de mandarlas al sink
pub const BATCH_CHUNK: usize = 1000;
pub const DEFAULT_LOG_RATE: u32 = 1000;
/// Si el stream se atrasa más que esto, se reinicia el calendario en vez de recuperar
const CATCH_UP_WINDOW: Duration = Duration::from_millis(100);

/// Request ya preprocesado, listo para generar: overlays sin campos
/// excluidos y la lista maestra calculada una sola vez.
#[derive(Debug)]
pub struct GenerationPlan {
    pub request: GenerationRequest,
    pub master_fields: BTreeSet<String>,
}

impl GenerationPlan {
    pub fn new(mut request: GenerationRequest) -> Self {
        strip_excluded_fields(&mut request.custom_overlays, &request.field_settings);
        let master_fields = master_field_list(&request.custom_overlays);
        Self {
            request,
            master_fields,
        }
    }

    /// Genera una línea y, si sale el sorteo, su duplicado.
    /// Devuelve cuántas líneas agregó a la tanda (1 o 2).
    fn emit<R: Rng + ?Sized>(&self, chunk: &mut Vec<String>, rng: &mut R) -> u64 {
        let rendered = render_line(compose_line(&self.request, &self.master_fields, rng));

        if should_repeat(self.request.repeat_probability, rng) {
            chunk.push(rendered.clone());
            chunk.push(rendered);
            return 2;
        }
        chunk.push(rendered);
        1
    }

    /// Una línea suelta, para probar una dirección antes de crear el job.
    pub fn sample_line<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        render_line(compose_line(&self.request, &BTreeSet::new(), rng))
    }
}

/// Loop de un batch: corre hasta el objetivo o hasta que lo paren, mandando
/// al sink tandas de a lo sumo BATCH_CHUNK líneas (más un posible duplicado).
/// Una repetición consume un lugar del objetivo, así que el conteo final
/// puede pasarse por uno.
pub async fn run_batch_job(
    job: Arc<BatchJob>,
    plan: Arc<GenerationPlan>,
    sink: Arc<dyn Sink>,
    mut rng: StdRng,
) -> Result<String, SinkError> {
    let core = job.core();
    let kind = JobKind::Batch;

    let mut writer = match sink.open(kind, core.id()).await {
        Ok(writer) => writer,
        Err(err) => return Err(fail(core, kind, err)),
    };

    let mut count: u64 = 0;
    let mut chunk = Vec::with_capacity(BATCH_CHUNK + 1);

    while count < job.target() && core.is_running() {
        while chunk.len() < BATCH_CHUNK && count < job.target() && core.is_running() {
            let added = plan.emit(&mut chunk, &mut rng);
            count += added;
            core.add_lines(added);
        }

        if let Err(err) = writer.write_chunk(&chunk).await {
            return Err(fail(core, kind, err));
        }
        chunk.clear();
        tokio::task::yield_now().await;
    }

    if core.finalize() {
        info!(
            "batch {} finalizando: {} logs generados, cerrando artefacto",
            core.id(),
            core.log_count()
        );
    }

    finish(core, kind, writer.as_mut()).await
}

/// Loop de un stream: genera tandas de STREAM_CHUNK líneas a `log_rate`
/// líneas por segundo y manda cada una al sink en el momento, hasta que un
/// stop o el timeout bajen `keep_going`.
pub async fn run_stream_job(
    job: Arc<StreamJob>,
    plan: Arc<GenerationPlan>,
    sink: Arc<dyn Sink>,
    mut rng: StdRng,
) -> Result<String, SinkError> {
    let core = job.core();
    let kind = JobKind::Stream;

    // el reloj de vida arranca cuando arranca la generación
    job.touch();

    let mut writer = match sink.open(kind, core.id()).await {
        Ok(writer) => writer,
        Err(err) => return Err(fail(core, kind, err)),
    };

    let rate = plan.request.log_rate().unwrap_or(DEFAULT_LOG_RATE).max(1);
    let pause = Duration::from_secs_f64(STREAM_CHUNK as f64 / rate as f64);
    let mut next_send = Instant::now() + pause;
    let mut chunk = Vec::with_capacity(STREAM_CHUNK + 1);

    while core.is_running() {
        while chunk.len() < STREAM_CHUNK {
            let added = plan.emit(&mut chunk, &mut rng);
            core.add_lines(added);
        }

        let now = Instant::now();
        if now <= next_send {
            sleep_until(next_send).await;
            next_send += pause;
        } else {
            if now - next_send <= CATCH_UP_WINDOW {
                next_send += pause;
            } else {
                next_send = now + pause;
            }
            tokio::task::yield_now().await;
        }

        if let Err(err) = writer.write_chunk(&chunk).await {
            return Err(fail(core, kind, err));
        }
        chunk.clear();
    }

    info!(
        "stream {} detenido con {} logs, cerrando artefacto",
        core.id(),
        core.log_count()
    );

    finish(core, kind, writer.as_mut()).await
}

/// Cierra el artefacto y deja el job en estado terminal. Sin ubicación
/// utilizable el job falla aunque el sink no haya dado error.
async fn finish(
    job: &JobCore,
    kind: JobKind,
    writer: &mut dyn SinkWriter,
) -> Result<String, SinkError> {
    match writer.finish().await {
        Ok(location) if !location.is_empty() => {
            job.complete(location.clone());
            info!("job {} {} completado en {}", kind.as_str(), job.id(), location);
            Ok(location)
        }
        Ok(_) => Err(fail(job, kind, SinkError::EmptyLocation)),
        Err(err) => Err(fail(job, kind, err)),
    }
}

fn fail(job: &JobCore, kind: JobKind, err: SinkError) -> SinkError {
    job.fail(err.to_string());
    warn!("job {} {} FAILED: {}", kind.as_str(), job.id(), err);
    err
}
