use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    Batch,
    Stream,
}

impl JobKind {
    /// Nombre corto, se usa como subdirectorio del sink de archivos
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Batch => "batch",
            JobKind::Stream => "stream",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Active,
    /// Solo batch: ya se alcanzó el objetivo y se está escribiendo el artefacto
    Finalizing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Foto de un job tal como se expone a los clientes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub log_count: u64,

    /// Solo batch
    pub target_count: Option<u64>,

    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub run_time_secs: i64,

    /// Ubicación del artefacto final (ruta, URL...), solo si terminó bien
    pub sink_location: Option<String>,
    pub error: Option<String>,

    /// -------- Solo stream --------
    pub keep_going: Option<bool>,
    pub last_ping_secs_ago: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllJobMetrics {
    pub num_active_batch_jobs: usize,
    pub num_all_batch_jobs: usize,
    pub num_active_stream_jobs: usize,
    pub num_all_stream_jobs: usize,
    pub batch_jobs: Vec<JobSnapshot>,
    pub stream_jobs: Vec<JobSnapshot>,
}

/// Evento de progreso que publica el tracker en cada pasada.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    pub log_count: u64,
    pub timestamp: DateTime<Utc>,
    pub sink_location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
}

/// Respuesta de stop / keepalive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobActionResponse {
    pub job_id: JobId,
    pub found: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_se_serializa_en_mayusculas() {
        let s = serde_json::to_string(&JobStatus::Finalizing).unwrap();
        assert_eq!(s, "\"FINALIZING\"");

        let k: JobKind = serde_json::from_str("\"STREAM\"").unwrap();
        assert_eq!(k, JobKind::Stream);
    }

    #[test]
    fn solo_completed_y_failed_son_terminales() {
        assert!(!JobStatus::Active.is_terminal());
        assert!(!JobStatus::Finalizing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
