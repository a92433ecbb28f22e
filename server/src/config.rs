use std::{env, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_OUTPUT_DIR: &str = "/data/output";
pub const DEFAULT_TICK_MS: u64 = 1000;
pub const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 60;

/// Configuración del servidor, tomada de variables de entorno.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Raíz del sink de archivos (subcarpetas batch/ y stream/)
    pub output_dir: PathBuf,
    /// Cada cuánto el tracker publica progreso y revisa los jobs activos
    pub tick_interval: Duration,
    /// Silencio máximo (sin keepalive) antes de cortar un stream
    pub stream_timeout: Duration,
    /// Si está, el generador de cada job se siembra a partir de acá
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
            stream_timeout: Duration::from_secs(DEFAULT_STREAM_TIMEOUT_SECS),
            seed: None,
        }
    }
}

impl ServerConfig {
    /// - LOGGEN_BIND_ADDR
    /// - LOGGEN_OUTPUT_DIR
    /// - LOGGEN_TICK_MS
    /// - LOGGEN_STREAM_TIMEOUT_SECS
    /// - LOGGEN_SEED
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("LOGGEN_BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            output_dir: env::var("LOGGEN_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            tick_interval: Duration::from_millis(env_or("LOGGEN_TICK_MS", DEFAULT_TICK_MS).max(1)),
            stream_timeout: Duration::from_secs(env_or(
                "LOGGEN_STREAM_TIMEOUT_SECS",
                DEFAULT_STREAM_TIMEOUT_SECS,
            )),
            seed: env::var("LOGGEN_SEED").ok().and_then(|s| s.parse::<u64>().ok()),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_razonables() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.tick_interval, Duration::from_secs(1));
        assert_eq!(cfg.stream_timeout, Duration::from_secs(60));
        assert!(cfg.seed.is_none());
    }

    #[test]
    fn env_or_cae_al_default_si_no_hay_variable() {
        assert_eq!(env_or("LOGGEN_TEST_VARIABLE_QUE_NO_EXISTE", 17u64), 17);
    }
}
