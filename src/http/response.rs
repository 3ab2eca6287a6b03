//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! `Response` guarda status, headers, cookies y body. Al enviarse se
//! convierte en una secuencia de chunks (`Chunks`) que el dispatcher
//! escribe al socket uno por uno:
//!
//! ```text
//! HTTP/1.1 200 OK\r\n                 <- status line
//! Content-Type: text/html\r\n         <- headers
//! Set-Cookie: session=abc\r\n         <- cookies
//! \r\n                                <- fin de la cabecera
//! <h1>Hola</h1>                       <- body (uno o varios chunks)
//! ```
//!
//! `Reply` es lo que devuelve un handler: cualquier forma de body, una
//! tupla con status (y headers), o una `Response` ya construida.
//!
//! ## Ejemplo de uso
//!
//! ```
//! use embedded_http::http::Response;
//!
//! let mut response = Response::new("<h1>Hola</h1>");
//! response.set_cookie("session", "abc", Some(3600));
//!
//! let bytes = response.to_bytes().unwrap();
//! assert!(bytes.starts_with(b"HTTP/1.1 200 OK\r\n"));
//! ```

use super::body::{Body, BodySource};
use super::codec::percent_encode;
use super::{Headers, StatusCode};
use crate::stream::{SendFile, Template};
use serde_json::Value;
use std::io;

/// Representa una respuesta HTTP antes de serializarla
#[derive(Debug, Default)]
pub struct Response {
    /// Código de estado HTTP (200 por defecto)
    status_code: StatusCode,

    /// Status literal que reemplaza a "<código> <razón>"
    status: Option<String>,

    /// Headers en orden de inserción
    headers: Headers,

    /// Nombre de cookie → línea `Set-Cookie: ...` ya renderizada
    cookies: Headers,

    body: Body,
}

impl Response {
    /// Crea una respuesta 200 con el body indicado
    pub fn new(body: impl Into<Body>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Página HTML de error usada por el dispatcher (404, 405, 505)
    pub fn error_page(status: StatusCode, message: &str) -> Self {
        Response::new(format!("<h2>Error {}: {}</h2>", status.as_u16(), message))
            .with_status(status)
    }

    /// Cambia el código de estado
    pub fn with_status(mut self, status: impl Into<StatusCode>) -> Self {
        self.status_code = status.into();
        self
    }

    /// Agrega un header (builder)
    ///
    /// # Ejemplo
    /// ```
    /// use embedded_http::http::Response;
    ///
    /// let response = Response::new("ok").with_header("X-Device", "esp32");
    /// assert_eq!(response.headers().get("X-Device"), Some("esp32"));
    /// ```
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Agrega un header a una respuesta existente (versión mutable)
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name, value);
    }

    pub fn set_status(&mut self, status: impl Into<StatusCode>) {
        self.status_code = status.into();
    }

    /// Fija un status literal (ej: `"299 Custom"`) que se envía tal cual
    pub fn set_status_text(&mut self, status: &str) {
        self.status = Some(status.to_string());
    }

    /// Agrega una cookie a la respuesta
    ///
    /// Nombre y valor se codifican con percent-encoding. Una segunda
    /// llamada con el mismo nombre reemplaza la anterior.
    ///
    /// # Ejemplo
    /// ```
    /// use embedded_http::http::Response;
    ///
    /// let mut response = Response::new("ok");
    /// response.set_cookie("user name", "ana", Some(60));
    ///
    /// let text = String::from_utf8(response.to_bytes().unwrap()).unwrap();
    /// assert!(text.contains("Set-Cookie: user%20name=ana; Max-Age=60\r\n"));
    /// ```
    pub fn set_cookie(&mut self, name: &str, value: &str, max_age: Option<u64>) {
        let max_age = max_age
            .map(|secs| format!("; Max-Age={}", secs))
            .unwrap_or_default();
        let line = format!(
            "Set-Cookie: {}={}{}",
            percent_encode(name),
            percent_encode(value),
            max_age
        );
        self.cookies.insert(name, line);
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    pub fn status(&self) -> StatusCode {
        self.status_code
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Status line completa, con `\r\n`
    fn status_line(&self) -> String {
        match &self.status {
            Some(status) => format!("HTTP/1.1 {}\r\n", status),
            None => format!("HTTP/1.1 {}\r\n", self.status_code),
        }
    }

    /// Convierte la respuesta en la secuencia de chunks a escribir
    pub fn into_chunks(self) -> Chunks {
        Chunks {
            stage: Stage::StatusLine,
            response: self,
            stream: None,
        }
    }

    /// Serializa la respuesta completa en memoria
    ///
    /// Útil en tests; el servidor escribe chunk por chunk.
    pub fn to_bytes(self) -> io::Result<Vec<u8>> {
        let mut result = Vec::new();
        for chunk in self.into_chunks() {
            result.extend_from_slice(&chunk?);
        }
        Ok(result)
    }
}

/// Etapas de la serialización
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    StatusLine,
    Head,
    Body,
    Done,
}

/// Iterador de chunks de una respuesta
///
/// Garantiza una sola status line y una sola cabecera, siempre antes de
/// cualquier byte del body.
pub struct Chunks {
    stage: Stage,
    response: Response,
    stream: Option<Box<dyn BodySource>>,
}

impl Chunks {
    /// Prepara el body y construye la cabecera completa
    ///
    /// Los bodies de tamaño fijo se dejan en `response.body` como
    /// `Body::Bytes`; los streams se mueven a `self.stream` después de
    /// mezclar sus headers.
    fn head(&mut self) -> io::Result<Vec<u8>> {
        let response = &mut self.response;

        match std::mem::take(&mut response.body) {
            Body::Empty => {}
            Body::Bytes(bytes) => {
                response.headers.insert_if_absent("Content-Length", bytes.len().to_string());
                response.body = Body::Bytes(bytes);
            }
            Body::Text(text) => {
                response.headers.insert_if_absent("Content-Type", "text/html");
                response.headers.insert_if_absent("Content-Length", text.len().to_string());
                response.body = Body::Bytes(text.into_bytes());
            }
            Body::Json(value) => {
                let bytes = serde_json::to_vec(&value)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                response.headers.insert_if_absent("Content-Type", "application/json");
                response.headers.insert_if_absent("Content-Length", bytes.len().to_string());
                response.body = Body::Bytes(bytes);
            }
            Body::Stream(mut source) => {
                response.headers.merge(source.headers());
                self.stream = Some(source);
            }
        }

        let mut head = String::new();
        for (name, value) in response.headers.iter() {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        for (_, line) in response.cookies.iter() {
            head.push_str(line);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        Ok(head.into_bytes())
    }
}

impl Iterator for Chunks {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stage {
                Stage::StatusLine => {
                    self.stage = Stage::Head;
                    return Some(Ok(self.response.status_line().into_bytes()));
                }
                Stage::Head => {
                    let head = self.head();
                    self.stage = if head.is_ok() { Stage::Body } else { Stage::Done };
                    return Some(head);
                }
                Stage::Body => {
                    if let Some(stream) = self.stream.as_mut() {
                        match stream.next_chunk() {
                            // Los chunks vacíos no se escriben
                            Some(Ok(chunk)) if chunk.is_empty() => continue,
                            Some(Ok(chunk)) => return Some(Ok(chunk)),
                            Some(Err(e)) => {
                                self.stage = Stage::Done;
                                return Some(Err(e));
                            }
                            None => {
                                self.stage = Stage::Done;
                                return None;
                            }
                        }
                    }

                    self.stage = Stage::Done;
                    if let Body::Bytes(bytes) = std::mem::take(&mut self.response.body) {
                        if !bytes.is_empty() {
                            return Some(Ok(bytes));
                        }
                    }
                    return None;
                }
                Stage::Done => return None,
            }
        }
    }
}

/// Valor devuelto por un handler
///
/// Se normaliza con `into_response` en un único `match`.
#[derive(Debug)]
pub enum Reply {
    /// Body suelto: 200 OK sin headers extra
    Raw(Body),

    /// `(contenido, status[, headers])`
    WithStatus {
        body: Body,
        status: StatusCode,
        headers: Headers,
    },

    /// `(Response, status[, headers])`: se aplican sobre la respuesta
    Amend {
        response: Response,
        status: StatusCode,
        headers: Headers,
    },

    /// Respuesta ya construida, se usa tal cual
    Response(Response),
}

impl Reply {
    pub fn into_response(self) -> Response {
        match self {
            Reply::Raw(body) => Response::new(body),
            Reply::WithStatus { body, status, headers } => make_response(body, status, headers),
            Reply::Amend { mut response, status, headers } => {
                response.status_code = status;
                response.headers.merge(headers);
                response
            }
            Reply::Response(response) => response,
        }
    }
}

/// Crea una respuesta con contenido, status y headers
///
/// # Ejemplo
/// ```
/// use embedded_http::http::{make_response, Headers};
///
/// let response = make_response("creado", 201u16, Headers::from([("X-Id", "7")]));
/// assert_eq!(response.status().as_u16(), 201);
/// ```
pub fn make_response(
    content: impl Into<Body>,
    status: impl Into<StatusCode>,
    headers: Headers,
) -> Response {
    Response {
        status_code: status.into(),
        status: None,
        headers,
        cookies: Headers::new(),
        body: content.into(),
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

impl From<(Response, u16)> for Reply {
    fn from((response, status): (Response, u16)) -> Self {
        Reply::Amend {
            response,
            status: status.into(),
            headers: Headers::new(),
        }
    }
}

impl From<(Response, u16, Headers)> for Reply {
    fn from((response, status, headers): (Response, u16, Headers)) -> Self {
        Reply::Amend {
            response,
            status: status.into(),
            headers,
        }
    }
}

/// Conversiones de cada forma de body, sola o en tupla con status/headers
macro_rules! reply_from_body {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Reply {
                fn from(content: $ty) -> Self {
                    Reply::Raw(content.into())
                }
            }

            impl From<($ty, u16)> for Reply {
                fn from((content, status): ($ty, u16)) -> Self {
                    Reply::WithStatus {
                        body: content.into(),
                        status: status.into(),
                        headers: Headers::new(),
                    }
                }
            }

            impl From<($ty, u16, Headers)> for Reply {
                fn from((content, status, headers): ($ty, u16, Headers)) -> Self {
                    Reply::WithStatus {
                        body: content.into(),
                        status: status.into(),
                        headers,
                    }
                }
            }
        )*
    };
}

reply_from_body!(Body, (), &str, String, Vec<u8>, Value, SendFile, Template);
