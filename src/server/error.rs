//! # Errores del Servidor
//! src/server/error.rs

use crate::http::RequestError;
use std::io;
use thiserror::Error;

/// Error al atender una conexión
///
/// Nunca sale del dispatcher: se registra y la conexión se cierra.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("request error: {0}")]
    Request(#[from] RequestError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Panic al atender la conexión (handler, headers o chunks del body)
    #[error("panic while handling connection: {0}")]
    Panic(String),
}

impl ConnectionError {
    /// Errores del transporte (desconexión, timeout, reset)
    ///
    /// Son esperables en redes inestables y se registran en `debug`.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ConnectionError::Io(_) | ConnectionError::Request(RequestError::Io(_))
        )
    }
}

/// Error fatal al arrancar o correr el servidor
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
