//! # Cuerpos de respuesta
//! src/http/body.rs
//!
//! `Body` enumera las formas de contenido que un handler puede devolver.
//! Los cuerpos `Stream` se producen de forma perezosa a través de
//! `BodySource`: primero se piden sus headers (una sola vez, antes de
//! escribir cualquier byte de headers al socket) y luego los chunks.

use super::Headers;
use serde_json::Value;
use std::fmt;
use std::io;

/// Fuente perezosa de chunks para respuestas en streaming
pub trait BodySource {
    /// Headers que la fuente aporta (ej: `Content-Type` de un archivo)
    ///
    /// Se llama exactamente una vez, antes del primer `next_chunk`.
    fn headers(&mut self) -> Headers {
        Headers::new()
    }

    /// Siguiente chunk del body; `None` al terminar
    fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>>;
}

/// Contenido de una respuesta
pub enum Body {
    /// Sin contenido
    Empty,

    /// Bytes crudos, se envían tal cual
    Bytes(Vec<u8>),

    /// Texto, se envía como `text/html` en UTF-8
    Text(String),

    /// Valor que se serializa como `application/json`
    Json(Value),

    /// Secuencia perezosa de chunks
    Stream(Box<dyn BodySource>),
}

impl Body {
    /// Envuelve cualquier `BodySource` como body en streaming
    pub fn stream(source: impl BodySource + 'static) -> Self {
        Body::Stream(Box::new(source))
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Empty
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => write!(f, "Empty"),
            Body::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Body::Stream(_) => write!(f, "Stream(..)"),
        }
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Body::Empty
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Body::Bytes(bytes.to_vec())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<Box<dyn BodySource>> for Body {
    fn from(source: Box<dyn BodySource>) -> Self {
        Body::Stream(source)
    }
}

/// Adaptador para usar un iterador de chunks como body
///
/// # Ejemplo
/// ```
/// use embedded_http::http::body::{Body, ChunkIter};
///
/// let chunks = vec![b"uno ".to_vec(), b"dos".to_vec()];
/// let body = Body::stream(ChunkIter::new(chunks));
/// ```
pub struct ChunkIter<I> {
    chunks: I,
    headers: Option<Headers>,
}

impl<I> ChunkIter<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    pub fn new(chunks: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            chunks: chunks.into_iter(),
            headers: None,
        }
    }

    /// Headers a mezclar antes de enviar la cabecera
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }
}

impl<I> BodySource for ChunkIter<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    fn headers(&mut self) -> Headers {
        self.headers.take().unwrap_or_default()
    }

    fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
        self.chunks.next().map(Ok)
    }
}
