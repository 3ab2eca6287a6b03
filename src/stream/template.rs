//! # Plantillas HTML
//! src/stream/template.rs
//!
//! Sustitución textual de `{{nombre}}` por el valor de cada variable. La
//! plantilla se lee y se envía en grupos de 5 líneas para no cargarla
//! entera en memoria; un placeholder partido entre dos grupos no se
//! sustituye. No hay escape de HTML ni plantillas anidadas.

use super::{exists, html_headers, not_found_page, SourceState};
use crate::http::body::{Body, BodySource};
use crate::http::Headers;
use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Líneas leídas y enviadas por chunk
pub const LINES_PER_GROUP: usize = 5;

/// Plantilla renderizada en streaming
#[derive(Debug)]
pub struct Template {
    path: PathBuf,
    vars: Vec<(String, String)>,
    state: SourceState<BufReader<File>>,
}

/// Renderiza una plantilla HTML
///
/// # Ejemplo
/// ```no_run
/// use embedded_http::stream::render_template;
///
/// let page = render_template("/web/status.html")
///     .var("ip", "192.168.4.1")
///     .var("rssi", -61);
/// ```
pub fn render_template(path: impl AsRef<Path>) -> Template {
    Template {
        path: path.as_ref().to_path_buf(),
        vars: Vec::new(),
        state: SourceState::Unchecked,
    }
}

impl Template {
    /// Agrega una variable; `{{name}}` se reemplaza por `value.to_string()`
    pub fn var(mut self, name: &str, value: impl Display) -> Self {
        self.vars.push((format!("{{{{{}}}}}", name), value.to_string()));
        self
    }

    fn substitute(&self, mut group: String) -> String {
        for (placeholder, value) in &self.vars {
            if group.contains(placeholder.as_str()) {
                group = group.replace(placeholder.as_str(), value);
            }
        }
        group
    }
}

/// Lee hasta `LINES_PER_GROUP` líneas; vacío al llegar a EOF
fn read_group<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut group = String::new();
    for _ in 0..LINES_PER_GROUP {
        if reader.read_line(&mut group)? == 0 {
            break;
        }
    }
    Ok(group)
}

impl BodySource for Template {
    fn headers(&mut self) -> Headers {
        self.state = if exists(&self.path) {
            SourceState::Pending
        } else {
            SourceState::Missing
        };
        html_headers()
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
                    Ok(file) => self.state = SourceState::Open(BufReader::new(file)),
                    Err(e) => {
                        self.state = SourceState::Done;
                        return Some(Err(e));
                    }
                },
                SourceState::Open(reader) => {
                    return match read_group(reader) {
                        Ok(group) if group.is_empty() => {
                            self.state = SourceState::Done;
                            None
                        }
                        Ok(group) => Some(Ok(self.substitute(group).into_bytes())),
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

impl From<Template> for Body {
    fn from(template: Template) -> Self {
        Body::stream(template)
    }
}
