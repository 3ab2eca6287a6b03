//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración con soporte para argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./embedded_http --port 80 --mode sequential --read-timeout 5
//! ./embedded_http --mode pooled --workers 2 --queue 8
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=80 HTTP_MODE=sequential WEB_ROOT=/web ./embedded_http
//! ```

use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Modelo de concurrencia del servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Una conexión a la vez en el thread que acepta
    Sequential,

    /// Pool fijo de workers alimentado por una cola acotada
    Pooled,
}

/// Configuración del servidor HTTP
#[derive(Debug, Clone, Parser)]
#[command(name = "embedded_http")]
#[command(about = "Motor HTTP/1.1 desde cero para dispositivos con recursos limitados")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Host/IP en el que escucha
    #[arg(long, default_value = "0.0.0.0", env = "HTTP_HOST")]
    pub host: String,

    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Modelo de concurrencia
    #[arg(long, value_enum, default_value = "pooled", env = "HTTP_MODE")]
    pub mode: Mode,

    /// Número de workers (modo pooled)
    #[arg(long, default_value = "4", env = "HTTP_WORKERS")]
    pub workers: usize,

    /// Conexiones aceptadas que pueden esperar un worker libre
    #[arg(long = "queue", default_value = "16", env = "HTTP_QUEUE")]
    pub queue_capacity: usize,

    /// Timeout de lectura por conexión en segundos
    #[arg(long = "read-timeout", default_value = "5", env = "HTTP_READ_TIMEOUT")]
    pub read_timeout_secs: u64,

    /// Directorio con plantillas y archivos estáticos
    #[arg(long = "web-root", default_value = "./web", env = "WEB_ROOT")]
    pub web_root: String,

    /// Filtro de logging (sintaxis de `tracing_subscriber::EnvFilter`)
    #[arg(long = "log-level", default_value = "info", env = "RUST_LOG")]
    pub log_level: String,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use embedded_http::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "0.0.0.0:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("Workers must be >= 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("Queue capacity must be >= 1".to_string());
        }
        if self.read_timeout_secs == 0 {
            return Err("Read timeout must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mode: Mode::Pooled,
            workers: 4,
            queue_capacity: 16,
            read_timeout_secs: 5,
            web_root: "./web".to_string(),
            log_level: "info".to_string(),
        }
    }
}
