use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::{
    AllJobMetrics, BatchSettings, ErrorResponse, FieldKind, FieldSettings, GenerationRequest,
    JobActionResponse, JobSnapshot, StreamSettings, SubmitResponse,
};
use reqwest::{Client, Response};
use std::env;
use std::path::{Path, PathBuf};

/// - En Docker: LOGGEN_URL=http://server:8080
/// - Local: default http://localhost:8080
fn server_base_url() -> String {
    env::var("LOGGEN_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para hablar con el generador de logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lanza un job batch de N líneas
    Batch {
        /// Cantidad de líneas a generar
        #[arg(long, default_value_t = 1000)]
        count: u64,

        /// Probabilidad de duplicar una línea (0..=1)
        #[arg(long, default_value_t = 0.0)]
        repeat: f64,

        /// Campos incluidos, separados por coma (default: todos)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Request JSON completo; ignora el resto de flags
        #[arg(long, value_name = "ARCHIVO")]
        request: Option<PathBuf>,
    },
    /// Lanza un job stream
    Stream {
        /// Líneas por segundo
        #[arg(long)]
        rate: Option<u32>,

        /// Endpoint HTTP que recibe cada tanda de líneas
        #[arg(long)]
        address: Option<String>,

        /// Con --address: guardar también las líneas en el servidor
        #[arg(long)]
        save: bool,

        #[arg(long, default_value_t = 0.0)]
        repeat: f64,

        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        #[arg(long, value_name = "ARCHIVO")]
        request: Option<PathBuf>,
    },
    /// Pide detener un job
    Stop {
        #[arg(value_name = "JOB_ID")]
        id: String,
    },
    /// Renueva la vida de un stream
    Keepalive {
        #[arg(value_name = "JOB_ID")]
        id: String,
    },
    /// Consulta el estado de un job
    Status {
        #[arg(value_name = "JOB_ID")]
        id: String,
    },
    /// Lista todos los jobs
    List,
}

fn field_settings(names: &[String]) -> Result<FieldSettings> {
    if names.is_empty() {
        return Ok(FieldSettings::including(&FieldKind::ALL));
    }

    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        match FieldKind::from_key(name.trim()) {
            Some(kind) => kinds.push(kind),
            None => bail!("campo desconocido: {}", name),
        }
    }
    Ok(FieldSettings::including(&kinds))
}

fn read_request(path: &Path) -> Result<GenerationRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("no se pudo leer {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("JSON inválido en {}", path.display()))
}

fn batch_request(count: u64, repeat: f64, fields: &[String]) -> Result<GenerationRequest> {
    Ok(GenerationRequest {
        repeat_probability: repeat,
        field_settings: field_settings(fields)?,
        batch_settings: Some(BatchSettings {
            number_of_logs: count,
        }),
        ..Default::default()
    })
}

fn stream_request(
    rate: Option<u32>,
    address: Option<String>,
    save_logs: bool,
    repeat: f64,
    fields: &[String],
) -> Result<GenerationRequest> {
    Ok(GenerationRequest {
        repeat_probability: repeat,
        field_settings: field_settings(fields)?,
        stream_settings: Some(StreamSettings {
            log_rate: rate,
            stream_address: address,
            save_logs,
        }),
        ..Default::default()
    })
}

/// Saca el mensaje de error del server, si lo hay.
async fn error_message(resp: Response) -> String {
    let status = resp.status();
    match resp.json::<ErrorResponse>().await {
        Ok(err) => format!("{} (status {})", err.error, status),
        Err(_) => format!("status {}", status),
    }
}

async fn submit(client: &Client, url: &str, req: &GenerationRequest) -> Result<()> {
    let resp = client.post(url).json(req).send().await?;
    if resp.status().is_success() {
        let submitted: SubmitResponse = resp.json().await?;
        println!("Job creado:");
        println!("  id: {}", submitted.job_id);
    } else {
        println!("Error: request rechazado: {}", error_message(resp).await);
    }
    Ok(())
}

async fn action(client: &Client, url: &str, id: &str) -> Result<()> {
    let resp = client.post(url).send().await?;
    if resp.status().is_success() {
        let r: JobActionResponse = resp.json().await?;
        println!("Job {}: {}", r.job_id, r.message);
    } else {
        println!("No hay job activo con id {id}");
    }
    Ok(())
}

fn print_snapshot(job: &JobSnapshot) {
    println!("Job {}", job.job_id);
    println!("  tipo      : {:?}", job.kind);
    println!("  estado    : {:?}", job.status);
    match job.target_count {
        Some(target) if target > 0 => {
            let pct = (job.log_count as f64 / target as f64) * 100.0;
            println!("  logs      : {} / {} ({:.1}%)", job.log_count, target, pct);
        }
        _ => println!("  logs      : {}", job.log_count),
    }
    println!("  inicio    : {}", job.start_time);
    if let Some(ref end) = job.end_time {
        println!("  fin       : {}", end);
    }
    println!("  duración  : {} s", job.run_time_secs);
    if let Some(ago) = job.last_ping_secs_ago {
        println!("  último ping: {} s", ago);
    }
    if let Some(ref location) = job.sink_location {
        println!("  salida    : {}", location);
    }
    if let Some(ref err) = job.error {
        println!("  error     : {}", err);
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = server_base_url();

    match cli.command {
        Commands::Batch {
            count,
            repeat,
            fields,
            request,
        } => {
            let req = match request {
                Some(path) => read_request(&path)?,
                None => batch_request(count, repeat, &fields)?,
            };
            let url = format!("{}/api/v1/jobs/batch", base_url);
            submit(&client, &url, &req).await?;
        }

        Commands::Stream {
            rate,
            address,
            save,
            repeat,
            fields,
            request,
        } => {
            let req = match request {
                Some(path) => read_request(&path)?,
                None => stream_request(rate, address, save, repeat, &fields)?,
            };
            let url = format!("{}/api/v1/jobs/stream", base_url);
            submit(&client, &url, &req).await?;
        }

        Commands::Stop { id } => {
            let url = format!("{}/api/v1/jobs/{id}/stop", base_url);
            action(&client, &url, &id).await?;
        }

        Commands::Keepalive { id } => {
            let url = format!("{}/api/v1/jobs/{id}/keepalive", base_url);
            action(&client, &url, &id).await?;
        }

        Commands::Status { id } => {
            let url = format!("{}/api/v1/jobs/{id}", base_url);
            let resp = client.get(&url).send().await?;
            if resp.status().is_success() {
                let job: JobSnapshot = resp.json().await?;
                print_snapshot(&job);
            } else {
                println!("No se encontró el job con id {id}");
            }
        }

        Commands::List => {
            let url = format!("{}/api/v1/jobs", base_url);
            let resp = client.get(&url).send().await?;
            if !resp.status().is_success() {
                println!("Error consultando /api/v1/jobs (status {})", resp.status());
                return Ok(());
            }

            let all: AllJobMetrics = resp.json().await?;
            println!(
                "Batch : {} activos de {}",
                all.num_active_batch_jobs, all.num_all_batch_jobs
            );
            println!(
                "Stream: {} activos de {}",
                all.num_active_stream_jobs, all.num_all_stream_jobs
            );

            if all.batch_jobs.is_empty() && all.stream_jobs.is_empty() {
                println!("No hay jobs registrados.");
            }
            for job in all.batch_jobs.iter().chain(all.stream_jobs.iter()) {
                println!();
                print_snapshot(job);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sin_campos_incluye_todos() {
        let settings = field_settings(&[]).unwrap();
        for kind in FieldKind::ALL {
            assert!(settings.is_included(kind));
        }
    }

    #[test]
    fn campos_por_nombre_de_wire() {
        let names = vec!["timeStamp".to_string(), " disposition".to_string()];
        let settings = field_settings(&names).unwrap();

        assert!(settings.is_included(FieldKind::TimeStamp));
        assert!(settings.is_included(FieldKind::Disposition));
        assert!(!settings.is_included(FieldKind::PathToFile));
    }

    #[test]
    fn campo_desconocido_es_error() {
        let err = field_settings(&["nope".to_string()]).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn batch_request_lleva_la_cantidad() {
        let req = batch_request(25, 0.5, &[]).unwrap();
        assert_eq!(req.batch_settings.unwrap().number_of_logs, 25);
        assert_eq!(req.repeat_probability, 0.5);
        assert!(req.stream_settings.is_none());
    }

    #[test]
    fn stream_request_con_direccion_y_guardado() {
        let req = stream_request(
            Some(200),
            Some("http://sink:9000/logs".to_string()),
            true,
            0.0,
            &[],
        )
        .unwrap();

        assert_eq!(req.log_rate(), Some(200));
        assert_eq!(req.stream_address(), Some("http://sink:9000/logs"));
        assert!(req.save_logs());
        assert!(req.batch_settings.is_none());
    }

    #[test]
    fn request_desde_archivo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("req.json");
        std::fs::write(
            &path,
            r#"{ "repeating_loglines_percent": 0.2, "batch_settings": { "number_of_logs": 7 } }"#,
        )
        .unwrap();

        let req = read_request(&path).unwrap();
        assert_eq!(req.repeat_probability, 0.2);
        assert_eq!(req.batch_settings.unwrap().number_of_logs, 7);
    }
}
