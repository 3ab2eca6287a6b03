//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Este módulo implementa el servidor TCP que:
//! 1. Escucha en un puerto
//! 2. Acepta conexiones entrantes
//! 3. Lee un request, busca la ruta y ejecuta el handler
//! 4. Escribe la respuesta chunk por chunk y cierra la conexión
//!
//! Las conexiones se atienden en secuencia o en un pool fijo de workers
//! según `Config::mode`.

pub mod error;
pub mod pool;
pub mod tcp;

// Re-exportar para facilitar el uso
pub use error::{ConnectionError, ServerError};
pub use tcp::{handle_connection, Server, StopHandle};
