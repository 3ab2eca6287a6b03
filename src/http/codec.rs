//! # Codificación de URLs (percent-encoding)
//! src/http/codec.rs
//!
//! Utilidades usadas por el parsing de query strings, formularios y cookies.
//!
//! - `percent_encode`: deja pasar alfanuméricos ASCII y `- . _ ~`, el resto
//!   se codifica byte a byte como `%XX` (hex en mayúsculas).
//! - `percent_decode`: convierte `+` en espacio y decodifica secuencias `%XX`.
//!   Los bytes consecutivos se acumulan en un buffer para poder reconstruir
//!   caracteres UTF-8 de varios bytes (`%E4%B8%AD` → `中`).

use thiserror::Error;

/// Errores de decodificación
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Un `%` sin dos caracteres detrás
    #[error("truncated percent sequence: %{0}")]
    Truncated(String),

    /// Los dos caracteres después de `%` no son hexadecimales
    #[error("invalid hex in percent sequence: %{0}")]
    InvalidHex(String),

    /// Los bytes decodificados no forman UTF-8 válido
    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}

/// Codifica un string para usarlo en URLs o cookies
///
/// # Ejemplo
/// ```
/// use embedded_http::http::codec::percent_encode;
///
/// assert_eq!(percent_encode("a b"), "a%20b");
/// assert_eq!(percent_encode("mañana"), "ma%C3%B1ana");
/// ```
pub fn percent_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());

    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    encoded
}

/// Decodifica un string codificado con `percent_encode` (o por un navegador)
///
/// Si el input no contiene `%` se retorna tal cual (solo con `+` → espacio).
///
/// # Ejemplo
/// ```
/// use embedded_http::http::codec::percent_decode;
///
/// assert_eq!(percent_decode("hola+mundo").unwrap(), "hola mundo");
/// assert_eq!(percent_decode("%E4%B8%AD!").unwrap(), "中!");
/// assert!(percent_decode("100%").is_err());
/// ```
pub fn percent_decode(input: &str) -> Result<String, DecodeError> {
    let input = input.replace('+', " ");
    if !input.contains('%') {
        return Ok(input);
    }

    let mut blocks = input.split('%');
    let mut decoded = blocks.next().unwrap_or_default().to_string();

    // Bytes pendientes: un carácter multibyte llega como varios `%XX` seguidos
    let mut carry: Vec<u8> = Vec::new();

    for block in blocks {
        let (hex, rest) = match (block.get(..2), block.get(2..)) {
            (Some(hex), Some(rest)) => (hex, rest),
            _ => return Err(DecodeError::Truncated(block.to_string())),
        };

        let byte = u8::from_str_radix(hex, 16)
            .map_err(|_| DecodeError::InvalidHex(hex.to_string()))?;
        carry.push(byte);

        if !rest.is_empty() {
            decoded.push_str(&flush(&mut carry)?);
            decoded.push_str(rest);
        }
    }

    decoded.push_str(&flush(&mut carry)?);
    Ok(decoded)
}

/// Convierte los bytes acumulados a texto y vacía el buffer
fn flush(carry: &mut Vec<u8>) -> Result<String, DecodeError> {
    let bytes = std::mem::take(carry);
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
}
