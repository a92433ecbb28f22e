use common::ProgressEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Canal de publicación de eventos de progreso.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, event: ProgressEvent);
}

pub fn job_topic(job_id: &str) -> String {
    format!("/topic/job/{}", job_id)
}

/// Pub/sub en proceso sobre un canal broadcast de tokio.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<(String, ProgressEvent)>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(String, ProgressEvent)> {
        self.tx.subscribe()
    }
}

impl Publisher for BroadcastPublisher {
    fn publish(&self, topic: &str, event: ProgressEvent) {
        trace!("publicando en {}: {} logs", topic, event.log_count);
        // sin suscriptores el send falla, y está bien: nadie escucha
        let _ = self.tx.send((topic.to_string(), event));
    }
}
