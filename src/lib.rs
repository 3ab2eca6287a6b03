//! # Embedded HTTP
//! src/lib.rs
//!
//! Motor HTTP/1.1 implementado desde cero para dispositivos con recursos
//! limitados: un request por conexión, bodies enviados en chunks y sin
//! cargar archivos completos en memoria.
//!
//! ## Arquitectura
//!
//! El crate está dividido en módulos especializados:
//! - `http`: Percent-encoding, parsing de requests y serialización de responses
//! - `router`: Tabla de rutas con comodines `<string>` y `<path>`
//! - `stream`: Envío de archivos y plantillas HTML en streaming
//! - `server`: Servidor TCP, modos secuencial y pool de workers
//! - `config`: Configuración por CLI y variables de entorno
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use embedded_http::config::Config;
//! use embedded_http::http::Request;
//! use embedded_http::router::Router;
//! use embedded_http::server::Server;
//!
//! let mut router = Router::new();
//! router.register("/user/<string>", |req: &Request| {
//!     format!("<h1>Hello {}</h1>", req.matched().unwrap_or_default())
//! });
//!
//! let server = Server::new(Config::default(), router);
//! server.run().expect("Error al iniciar servidor");
//! ```

pub mod config;
pub mod http;
pub mod router;
pub mod server;
pub mod stream;
