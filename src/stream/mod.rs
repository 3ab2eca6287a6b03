//! # Helpers de Streaming
//! src/stream/mod.rs
//!
//! Fuentes de body perezosas sobre el sistema de archivos:
//!
//! - `send_file`: envía un archivo en bloques de tamaño fijo
//! - `render_template`: renderiza una plantilla HTML en grupos de 5 líneas
//!
//! Ambas comprueban que el archivo exista cuando el dispatcher pide sus
//! headers. Si no existe, responden una página HTML "File Not Exists" en
//! lugar de fallar.
//!
//! ## Ejemplo
//!
//! ```no_run
//! use embedded_http::stream::{render_template, send_file};
//!
//! let page = render_template("/web/wifi.html").var("ssid", "lab");
//! let logo = send_file("/web/logo.png");
//! let backup = send_file("/data/config.json").as_attachment();
//! ```

pub mod file;
pub mod template;

pub use file::{send_file, SendFile};
pub use template::{render_template, Template};

use crate::http::Headers;
use std::path::Path;
use tracing::warn;

/// Estado de una fuente basada en archivo
#[derive(Debug)]
enum SourceState<R> {
    /// Todavía no se pidieron los headers
    Unchecked,

    /// El archivo no existe: queda por enviar la página de error
    Missing,

    /// El archivo existe pero aún no se abrió
    Pending,

    Open(R),

    Done,
}

/// Comprueba existencia y registra el fallo
fn exists(path: &Path) -> bool {
    if path.is_file() {
        true
    } else {
        warn!(path = %path.display(), "file not found");
        false
    }
}

fn html_headers() -> Headers {
    Headers::from([("Content-Type", "text/html")])
}

fn not_found_page(path: &Path) -> Vec<u8> {
    format!("<h2>File Not Exists: {}</h2>", path.display()).into_bytes()
}
