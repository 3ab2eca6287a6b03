//! # Módulo HTTP
//!
//! Este módulo implementa el protocolo HTTP/1.1 desde cero, sin usar
//! librerías de alto nivel. Incluye:
//!
//! - Percent-encoding para query strings, formularios y cookies
//! - Parsing de requests leídos línea por línea
//! - Respuestas serializadas como secuencia perezosa de chunks
//! - Códigos de estado con su reason phrase
//!
//! ### Formato de Request
//!
//! ```text
//! POST /config?save=1 HTTP/1.1\r\n
//! Host: 192.168.4.1\r\n
//! Content-Length: 19\r\n
//! \r\n
//! ssid=lab&pwd=secret
//! ```
//!
//! ### Formato de Response
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: application/json\r\n
//! Set-Cookie: session=abc; Max-Age=3600\r\n
//! \r\n
//! {"ok":true}
//! ```
//!
//! No hay keep-alive: cada conexión atiende un único request y se cierra.

pub mod body;
pub mod codec;
pub mod headers;
pub mod request;
pub mod response;
pub mod status;

// Re-exportamos los tipos principales para facilitar su uso
pub use body::{Body, BodySource};
pub use headers::Headers;
pub use request::{Request, RequestError};
pub use response::{make_response, Chunks, Reply, Response};
pub use status::StatusCode;
