use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use common::{json_array, ArrayFramer, JobKind};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("error de E/S escribiendo {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error HTTP enviando a {address}: {source}")]
    Http {
        address: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{address} respondió con status {status}")]
    Status { address: String, status: u16 },

    #[error("el sink no devolvió una ubicación para el artefacto")]
    EmptyLocation,
}

/// Destino de las líneas de un job. `open` prepara el destino; después la
/// tarea del job manda tandas a medida que las genera.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn open(&self, kind: JobKind, job_id: &str) -> Result<Box<dyn SinkWriter>, SinkError>;
}

/// Escritura en curso de un job.
#[async_trait]
pub trait SinkWriter: Send {
    async fn write_chunk(&mut self, lines: &[String]) -> Result<(), SinkError>;

    /// Cierra el destino y devuelve dónde quedaron las líneas.
    async fn finish(&mut self) -> Result<String, SinkError>;
}

/// Escribe `{root}/{batch|stream}/{job_id}.json` de a tandas.
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn open(&self, kind: JobKind, job_id: &str) -> Result<Box<dyn SinkWriter>, SinkError> {
        let dir = self.root.join(kind.as_str());
        let path = dir.join(format!("{}.json", job_id));
        let path_str = path.to_string_lossy().to_string();

        let io_err = |source: std::io::Error| SinkError::Io {
            path: path_str.clone(),
            source,
        };

        tokio::fs::create_dir_all(&dir).await.map_err(io_err)?;
        let file = File::create(&path).await.map_err(io_err)?;

        let mut writer = FileWriter {
            path: path_str,
            out: BufWriter::new(file),
            framer: ArrayFramer::new(),
        };
        writer.put(ArrayFramer::OPEN).await?;

        debug!("job {}: artefacto abierto en {}", job_id, writer.path);
        Ok(Box::new(writer))
    }
}

struct FileWriter {
    path: String,
    out: BufWriter<File>,
    framer: ArrayFramer,
}

impl FileWriter {
    fn io_err(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn put(&mut self, text: &str) -> Result<(), SinkError> {
        if let Err(e) = self.out.write_all(text.as_bytes()).await {
            return Err(self.io_err(e));
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if let Err(e) = self.out.flush().await {
            return Err(self.io_err(e));
        }
        Ok(())
    }
}

#[async_trait]
impl SinkWriter for FileWriter {
    async fn write_chunk(&mut self, lines: &[String]) -> Result<(), SinkError> {
        let text = self.framer.frame(lines);
        self.put(&text).await?;
        self.flush().await
    }

    async fn finish(&mut self) -> Result<String, SinkError> {
        self.put(ArrayFramer::CLOSE).await?;
        self.flush().await?;

        debug!("{}: {} líneas escritas", self.path, self.framer.lines());
        Ok(self.path.clone())
    }
}

/// Manda cada tanda por POST (arreglo JSON) a una dirección del usuario.
pub struct HttpSink {
    client: reqwest::Client,
    address: String,
}

impl HttpSink {
    pub fn new(client: reqwest::Client, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
        }
    }

    /// POST de prueba con una sola línea; error si la dirección no la acepta.
    pub async fn check(&self, sample: &str) -> Result<(), SinkError> {
        post_lines(&self.client, &self.address, &[sample.to_string()]).await
    }
}

async fn post_lines(
    client: &reqwest::Client,
    address: &str,
    lines: &[String],
) -> Result<(), SinkError> {
    let resp = client
        .post(address)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(json_array(lines))
        .send()
        .await
        .map_err(|source| SinkError::Http {
            address: address.to_string(),
            source,
        })?;

    if !resp.status().is_success() {
        return Err(SinkError::Status {
            address: address.to_string(),
            status: resp.status().as_u16(),
        });
    }
    Ok(())
}

#[async_trait]
impl Sink for HttpSink {
    async fn open(&self, _kind: JobKind, job_id: &str) -> Result<Box<dyn SinkWriter>, SinkError> {
        Ok(Box::new(HttpWriter {
            client: self.client.clone(),
            address: self.address.clone(),
            job_id: job_id.to_string(),
            sent: 0,
        }))
    }
}

struct HttpWriter {
    client: reqwest::Client,
    address: String,
    job_id: String,
    sent: u64,
}

#[async_trait]
impl SinkWriter for HttpWriter {
    async fn write_chunk(&mut self, lines: &[String]) -> Result<(), SinkError> {
        if lines.is_empty() {
            return Ok(());
        }
        post_lines(&self.client, &self.address, lines).await?;
        self.sent += lines.len() as u64;
        Ok(())
    }

    async fn finish(&mut self) -> Result<String, SinkError> {
        debug!(
            "job {}: {} líneas enviadas a {}",
            self.job_id, self.sent, self.address
        );
        Ok(self.address.clone())
    }
}

/// Manda a `live` y guarda una copia en `archive`; la ubicación final es la
/// de la copia.
pub struct TeeSink {
    live: Arc<dyn Sink>,
    archive: Arc<dyn Sink>,
}

impl TeeSink {
    pub fn new(live: Arc<dyn Sink>, archive: Arc<dyn Sink>) -> Self {
        Self { live, archive }
    }
}

#[async_trait]
impl Sink for TeeSink {
    async fn open(&self, kind: JobKind, job_id: &str) -> Result<Box<dyn SinkWriter>, SinkError> {
        let live = self.live.open(kind, job_id).await?;
        let archive = self.archive.open(kind, job_id).await?;
        Ok(Box::new(TeeWriter { live, archive }))
    }
}

struct TeeWriter {
    live: Box<dyn SinkWriter>,
    archive: Box<dyn SinkWriter>,
}

#[async_trait]
impl SinkWriter for TeeWriter {
    async fn write_chunk(&mut self, lines: &[String]) -> Result<(), SinkError> {
        self.live.write_chunk(lines).await?;
        self.archive.write_chunk(lines).await
    }

    async fn finish(&mut self) -> Result<String, SinkError> {
        self.live.finish().await?;
        self.archive.finish().await
    }
}
