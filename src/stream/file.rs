//! # Envío de archivos
//! src/stream/file.rs

use super::{exists, html_headers, not_found_page, SourceState};
use crate::http::body::{Body, BodySource};
use crate::http::Headers;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

/// Tamaño de cada bloque leído del archivo
pub const BLOCK_SIZE: usize = 1024;

/// Tipo MIME por defecto cuando la extensión no es conocida
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Infere el tipo MIME a partir de la extensión
///
/// # Ejemplo
/// ```
/// use embedded_http::stream::file::mime_for;
///
/// assert_eq!(mime_for("/web/index.HTML"), "text/html");
/// assert_eq!(mime_for("/web/firmware.bin"), "application/octet-stream");
/// ```
pub fn mime_for(path: impl AsRef<Path>) -> &'static str {
    let extension = path
        .as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("txt") => "text/plain",
        Some("htm") | Some("html") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("js") => "application/javascript",
        Some("xml") => "application/xml",
        Some("xhtml") => "application/xhtml+xml",
        Some("json") => "application/json",
        Some("zip") => "application/zip",
        Some("pdf") => "application/pdf",
        Some("ts") => "application/typescript",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => DEFAULT_MIME,
    }
}

/// Une `relative` a `root` sin salir de `root`
///
/// Solo acepta segmentos normales: rechaza paths absolutos, `..`, `.` y
/// prefijos de unidad. Pensado para capturas `<path>` del router.
///
/// # Ejemplo
/// ```
/// use embedded_http::stream::file::join_under;
///
/// assert!(join_under("/web", "img/logo.png").is_some());
/// assert!(join_under("/web", "/etc/passwd").is_none());
/// assert!(join_under("/web", "../secret").is_none());
/// ```
pub fn join_under(root: impl AsRef<Path>, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let mut components = relative.components().peekable();

    components.peek()?;
    if !components.all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }

    Some(root.as_ref().join(relative))
}

/// Archivo enviado como body en streaming
#[derive(Debug)]
pub struct SendFile {
    path: PathBuf,
    mimetype: Option<String>,
    as_attachment: bool,
    attachment_filename: Option<String>,
    state: SourceState<File>,
}

/// Envía un archivo al cliente
///
/// El `Content-Type` se infiere de la extensión salvo que se indique con
/// `mimetype`. Con `as_attachment` se agrega `Content-Disposition` para
/// que el navegador lo descargue.
pub fn send_file(path: impl AsRef<Path>) -> SendFile {
    SendFile {
        path: path.as_ref().to_path_buf(),
        mimetype: None,
        as_attachment: false,
        attachment_filename: None,
        state: SourceState::Unchecked,
    }
}

impl SendFile {
    pub fn mimetype(mut self, mimetype: &str) -> Self {
        self.mimetype = Some(mimetype.to_string());
        self
    }

    /// Envía el archivo como descarga
    pub fn as_attachment(mut self) -> Self {
        self.as_attachment = true;
        self
    }

    /// Nombre mostrado al descargar (implica `as_attachment`)
    pub fn attachment_filename(mut self, filename: &str) -> Self {
        self.as_attachment = true;
        self.attachment_filename = Some(filename.to_string());
        self
    }

    fn content_headers(&self) -> Headers {
        let mut headers = Headers::new();

        let content_type = self
            .mimetype
            .clone()
            .unwrap_or_else(|| mime_for(&self.path).to_string());
        headers.insert("Content-Type", content_type);

        if self.as_attachment {
            let filename = self.attachment_filename.clone().unwrap_or_else(|| {
                self.path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            headers.insert(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", filename),
            );
        }

        headers
    }
}

impl BodySource for SendFile {
    fn headers(&mut self) -> Headers {
        if exists(&self.path) {
            self.state = SourceState::Pending;
            self.content_headers()
        } else {
            self.state = SourceState::Missing;
            html_headers()
        }
    }

    fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
        loop {
            match &mut self.state {
                SourceState::Unchecked => {
                    self.headers();
                }
                SourceState::Missing => {
                    self.state = SourceState::Done;
                    return Some(Ok(not_found_page(&self.path)));
                }
                SourceState::Pending => match File::open(&self.path) {
                    Ok(file) => self.state = SourceState::Open(file),
                    Err(e) => {
                        self.state = SourceState::Done;
                        return Some(Err(e));
                    }
                },
                SourceState::Open(file) => {
                    let mut block = vec![0u8; BLOCK_SIZE];
                    return match file.read(&mut block) {
                        Ok(0) => {
                            self.state = SourceState::Done;
                            None
                        }
                        Ok(n) => {
                            block.truncate(n);
                            Some(Ok(block))
                        }
                        Err(e) => {
                            self.state = SourceState::Done;
                            Some(Err(e))
                        }
                    };
                }
                SourceState::Done => return None,
            }
        }
    }
}

impl From<SendFile> for Body {
    fn from(file: SendFile) -> Self {
        Body::stream(file)
    }
}
