//! # Parsing de Requests HTTP/1.1
//! src/http/request.rs
//!
//! El request se lee línea por línea directamente del socket:
//!
//! ```text
//! GET /user/42?lang=es HTTP/1.1\r\n
//! Host: 192.168.4.1\r\n
//! Cookie: session=abc\r\n
//! \r\n
//! ```
//!
//! ## Componentes
//!
//! 1. **Request Line**: exactamente 3 tokens separados por espacio.
//!    Cualquier otra cantidad cierra la conexión sin respuesta.
//! 2. **Headers**: `Name: Value` hasta la línea vacía, en orden de llegada.
//! 3. **Body**: solo si `Content-Length` existe y es distinto de 0.
//!
//! Los campos derivados (`url`, `json`, `args`, `form`, `cookies`) se
//! calculan la primera vez que se piden y quedan cacheados. Un error de
//! parsing en ellos nunca llega al handler: se traduce en `None` o vacío.

use super::codec::percent_decode;
use super::Headers;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::io::{self, BufRead, Read};
use thiserror::Error;

/// Versiones de protocolo aceptadas
const SUPPORTED_PROTOCOLS: [&str; 2] = ["HTTP/1.0", "HTTP/1.1"];

/// Errores que pueden ocurrir al leer un request
#[derive(Debug, Error)]
pub enum RequestError {
    /// Versión HTTP distinta de HTTP/1.0 y HTTP/1.1
    #[error("unsupported HTTP version: {0}")]
    UnsupportedVersion(String),

    /// `Content-Length` no es un entero no negativo
    #[error("invalid Content-Length header: {0}")]
    InvalidContentLength(String),

    /// La request line o un header no es UTF-8
    #[error("request head is not valid UTF-8")]
    InvalidEncoding,

    /// Error del socket (desconexión, timeout)
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Representa un request HTTP parseado
#[derive(Debug, Clone)]
pub struct Request {
    /// Método HTTP tal como llegó (GET, POST, PUT...)
    method: String,

    /// Target completo, incluyendo la query (ej: "/search?q=rust")
    full_path: String,

    /// Target sin la query (ej: "/search")
    path: String,

    /// "HTTP/1.0" o "HTTP/1.1"
    protocol: String,

    /// Headers en orden de llegada, claves sin normalizar
    headers: Headers,

    /// Body crudo; `None` si no hubo `Content-Length`
    body: Option<Vec<u8>>,

    /// Segmento capturado por una ruta `<string>` o `<path>`
    matched: Option<String>,

    url: OnceCell<Option<String>>,
    json: OnceCell<Option<Value>>,
    args: OnceCell<Option<HashMap<String, String>>>,
    form: OnceCell<Option<HashMap<String, String>>>,
    cookies: OnceCell<HashMap<String, String>>,
}

impl Request {
    /// Crea un request sin headers ni body
    pub fn new(method: &str, full_path: &str, protocol: &str) -> Self {
        let path = full_path
            .split_once('?')
            .map_or(full_path, |(path, _)| path)
            .to_string();

        Self {
            method: method.to_string(),
            full_path: full_path.to_string(),
            path,
            protocol: protocol.to_string(),
            headers: Headers::new(),
            body: None,
            matched: None,
            url: OnceCell::new(),
            json: OnceCell::new(),
            args: OnceCell::new(),
            form: OnceCell::new(),
            cookies: OnceCell::new(),
        }
    }

    /// Lee la request line y los headers
    ///
    /// # Retorna
    ///
    /// * `Ok(Some(Request))` - Cabecera leída, el body sigue en el reader
    /// * `Ok(None)` - Request line malformada: la conexión se cierra en silencio
    /// * `Err(RequestError)` - Versión no soportada, UTF-8 inválido o error de IO
    pub fn read_head<R: BufRead>(reader: &mut R) -> Result<Option<Self>, RequestError> {
        let line = read_line(reader)?;

        let parts: Vec<&str> = line.split(' ').collect();
        let [method, full_path, protocol] = parts.as_slice() else {
            return Ok(None);
        };

        if !SUPPORTED_PROTOCOLS.contains(protocol) {
            return Err(RequestError::UnsupportedVersion(protocol.to_string()));
        }

        let mut request = Request::new(method, full_path, protocol);

        loop {
            let line = read_line(reader)?;
            // Línea vacía (o EOF) marca el fin de los headers
            let Some((name, value)) = line.split_once(':') else {
                break;
            };
            request.headers.insert(name, value.trim_start());
        }

        Ok(Some(request))
    }

    /// Lee exactamente `Content-Length` bytes del reader
    ///
    /// Sin `Content-Length` (o con valor 0) el body queda en `None`. El
    /// buffer crece con los bytes recibidos, no con el valor declarado.
    pub fn read_body<R: Read>(&mut self, reader: &mut R) -> Result<(), RequestError> {
        let size = match self.headers.get("Content-Length") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| RequestError::InvalidContentLength(raw.to_string()))?,
            None => 0,
        };

        if size == 0 {
            self.body = None;
            return Ok(());
        }

        let mut body = Vec::new();
        reader.by_ref().take(size as u64).read_to_end(&mut body)?;
        if body.len() < size {
            return Err(RequestError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("body ended after {} of {} bytes", body.len(), size),
            )));
        }
        self.body = Some(body);
        Ok(())
    }

    /// Parsea un request completo (cabecera + body) desde bytes
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use embedded_http::http::Request;
    ///
    /// let raw = b"GET /user/42?lang=es HTTP/1.1\r\nHost: esp32.local\r\n\r\n";
    /// let request = Request::parse(raw).unwrap().unwrap();
    ///
    /// assert_eq!(request.path(), "/user/42");
    /// assert_eq!(request.arg("lang"), Some("es"));
    /// assert_eq!(request.url(), Some("http://esp32.local/user/42?lang=es"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Option<Self>, RequestError> {
        let mut reader = buffer;
        let Some(mut request) = Self::read_head(&mut reader)? else {
            return Ok(None);
        };
        request.read_body(&mut reader)?;
        Ok(Some(request))
    }

    pub(crate) fn set_match(&mut self, matched: Option<String>) {
        self.matched = matched;
    }

    // === Campos crudos ===

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Target completo incluyendo la query string
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Path sin query string
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Obtiene un header específico (comparación exacta de la clave)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Body crudo, `None` cuando no se declaró `Content-Length`
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Resultado del comodín de la ruta (`/user/<string>` → `"42"`)
    pub fn matched(&self) -> Option<&str> {
        self.matched.as_deref()
    }

    // === Campos derivados ===

    /// Valor del header `Host`
    pub fn host(&self) -> Option<&str> {
        self.headers.get("Host")
    }

    /// URL completa reconstruida con `Host` + target
    pub fn url(&self) -> Option<&str> {
        self.url
            .get_or_init(|| {
                self.host()
                    .map(|host| format!("http://{}{}", host, self.full_path))
            })
            .as_deref()
    }

    /// Body interpretado como JSON
    pub fn json(&self) -> Option<&Value> {
        self.json
            .get_or_init(|| {
                self.body
                    .as_deref()
                    .and_then(|body| serde_json::from_slice(body).ok())
            })
            .as_ref()
    }

    /// Body JSON deserializado a un tipo concreto
    pub fn json_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.json()
            .and_then(|value| T::deserialize(value).ok())
    }

    /// Query parameters (`?a=1&b=2`)
    ///
    /// `None` si no hay query o si algún par no se puede decodificar.
    pub fn args(&self) -> Option<&HashMap<String, String>> {
        self.args
            .get_or_init(|| parse_args(&self.full_path))
            .as_ref()
    }

    /// Obtiene un query parameter específico
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args()
            .and_then(|args| args.get(name))
            .map(|s| s.as_str())
    }

    /// Body interpretado como `application/x-www-form-urlencoded`
    pub fn form(&self) -> Option<&HashMap<String, String>> {
        self.form
            .get_or_init(|| self.body.as_deref().and_then(parse_form))
            .as_ref()
    }

    /// Cookies del header `Cookie`; vacío si no existe o no se puede parsear
    pub fn cookies(&self) -> &HashMap<String, String> {
        self.cookies.get_or_init(|| {
            self.headers
                .get("Cookie")
                .and_then(parse_cookies)
                .unwrap_or_default()
        })
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies().get(name).map(|s| s.as_str())
    }
}

/// Lee una línea y le quita el `\r\n` final
fn read_line<R: BufRead>(reader: &mut R) -> Result<String, RequestError> {
    let mut buffer = Vec::new();
    reader.read_until(b'\n', &mut buffer)?;

    let line = String::from_utf8(buffer).map_err(|_| RequestError::InvalidEncoding)?;
    Ok(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string())
}

fn parse_args(full_path: &str) -> Option<HashMap<String, String>> {
    let (_, query) = full_path.split_once('?')?;
    let query = query.trim_end_matches('&');
    if query.is_empty() {
        return None;
    }

    let mut args = HashMap::new();
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=')?;
        args.insert(percent_decode(key).ok()?, percent_decode(value).ok()?);
    }
    Some(args)
}

fn parse_form(body: &[u8]) -> Option<HashMap<String, String>> {
    let text = std::str::from_utf8(body).ok()?;

    let mut form = HashMap::new();
    for pair in text.split('&') {
        let (key, value) = pair.split_once('=')?;
        form.insert(percent_decode(key).ok()?, percent_decode(value).ok()?);
    }
    Some(form)
}

fn parse_cookies(header: &str) -> Option<HashMap<String, String>> {
    let mut cookies = HashMap::new();
    for item in header.split(';').map(str::trim) {
        if let Some((key, value)) = item.split_once('=') {
            cookies.insert(percent_decode(key).ok()?, percent_decode(value).ok()?);
        }
    }
    Some(cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn parse(raw: &[u8]) -> Request {
        Request::parse(raw).unwrap().unwrap()
    }

    // ==================== Request line ====================

    #[test]
    fn test_parse_simple_get() {
        let request = parse(b"GET / HTTP/1.1\r\n\r\n");

        assert_eq!(request.method(), "GET");
        assert_eq!(request.path(), "/");
        assert_eq!(request.protocol(), "HTTP/1.1");
        assert!(request.headers().is_empty());
        assert!(request.body().is_none());
    }

    #[test]
    fn test_path_strips_query() {
        let request = parse(b"GET /search?q=rust&page=2 HTTP/1.0\r\n\r\n");

        assert_eq!(request.full_path(), "/search?q=rust&page=2");
        assert_eq!(request.path(), "/search");
    }

    #[test]
    fn test_malformed_request_line_is_silent() {
        assert!(Request::parse(b"GET /\r\n\r\n").unwrap().is_none());
        assert!(Request::parse(b"GET / HTTP/1.1 extra\r\n\r\n").unwrap().is_none());
        assert!(Request::parse(b"").unwrap().is_none());
    }

    #[test]
    fn test_unsupported_version() {
        let result = Request::parse(b"GET / HTTP/2.0\r\n\r\n");
        assert!(matches!(result, Err(RequestError::UnsupportedVersion(v)) if v == "HTTP/2.0"));
    }

    #[test]
    fn test_invalid_utf8_request_line() {
        let result = Request::parse(b"GET /\xff HTTP/1.1\r\n\r\n");
        assert!(matches!(result, Err(RequestError::InvalidEncoding)));
    }

    // ==================== Headers ====================

    #[test]
    fn test_headers_keep_order_and_case() {
        let request = parse(b"GET / HTTP/1.1\r\nX-B: 2\r\nHost: h\r\nx-a: 1\r\n\r\n");

        let pairs: Vec<(&str, &str)> = request.headers().iter().collect();
        assert_eq!(pairs, vec![("X-B", "2"), ("Host", "h"), ("x-a", "1")]);
        assert_eq!(request.header("host"), None);
    }

    #[test]
    fn test_header_value_with_colon() {
        let request = parse(b"GET / HTTP/1.1\r\nHost: 10.0.0.1:8080\r\n\r\n");
        assert_eq!(request.host(), Some("10.0.0.1:8080"));
    }

    #[test]
    fn test_headers_end_at_eof() {
        let request = parse(b"GET / HTTP/1.1\r\nHost: h\r\n");
        assert_eq!(request.host(), Some("h"));
    }

    // ==================== Body ====================

    #[test]
    fn test_body_read_by_content_length() {
        let request = parse(b"POST /form HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloEXTRA");
        assert_eq!(request.body(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_zero_content_length_is_absent() {
        let request = parse(b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
        assert!(request.body().is_none());
    }

    #[test]
    fn test_huge_content_length_is_eof_not_allocation() {
        let result = Request::parse(
            b"POST / HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\nname=x",
        );
        match result {
            Err(RequestError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_short_body_is_eof() {
        let result = Request::parse(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc");
        assert!(matches!(result, Err(RequestError::Io(_))));
    }

    #[test]
    fn test_invalid_content_length() {
        let result = Request::parse(b"POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n");
        assert!(matches!(result, Err(RequestError::InvalidContentLength(_))));
    }

    #[test]
    fn test_short_body_is_io_error() {
        let result = Request::parse(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc");
        assert!(matches!(result, Err(RequestError::Io(_))));
    }

    // ==================== Derived fields ====================

    #[test]
    fn test_url_requires_host() {
        let with_host = parse(b"GET /a?b=1 HTTP/1.1\r\nHost: device\r\n\r\n");
        assert_eq!(with_host.url(), Some("http://device/a?b=1"));

        let without_host = parse(b"GET /a HTTP/1.1\r\n\r\n");
        assert_eq!(without_host.url(), None);
    }

    #[test]
    fn test_args_decoded() {
        let request = parse(b"GET /s?text=hello%20world&x=a+b& HTTP/1.1\r\n\r\n");

        assert_eq!(request.arg("text"), Some("hello world"));
        assert_eq!(request.arg("x"), Some("a b"));
        assert_eq!(request.args().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_args_absent_without_query() {
        assert!(parse(b"GET /s HTTP/1.1\r\n\r\n").args().is_none());
        assert!(parse(b"GET /s? HTTP/1.1\r\n\r\n").args().is_none());
    }

    #[test]
    fn test_args_parse_failure_is_absent() {
        assert!(parse(b"GET /s?flag HTTP/1.1\r\n\r\n").args().is_none());
        assert!(parse(b"GET /s?a=%zz HTTP/1.1\r\n\r\n").args().is_none());
    }

    #[test]
    fn test_form() {
        let request = parse(b"POST / HTTP/1.1\r\nContent-Length: 23\r\n\r\nssid=My+Net&pwd=p%40ss1");
        let form = request.form().unwrap();

        assert_eq!(form.get("ssid").map(String::as_str), Some("My Net"));
        assert_eq!(form.get("pwd").map(String::as_str), Some("p@ss1"));
    }

    #[test]
    fn test_form_decodes_keys_and_keeps_empty_values() {
        let request = parse(b"POST / HTTP/1.1\r\nContent-Length: 20\r\n\r\nwifi%20name=lab&pwd=");
        let form = request.form().unwrap();

        assert_eq!(form.get("wifi name").map(String::as_str), Some("lab"));
        assert_eq!(form.get("pwd").map(String::as_str), Some(""));
    }

    #[test]
    fn test_form_absent_without_body() {
        assert!(parse(b"POST / HTTP/1.1\r\n\r\n").form().is_none());
    }

    #[test]
    fn test_json() {
        let request = parse(b"POST / HTTP/1.1\r\nContent-Length: 8\r\n\r\n{\"k\": 1}");
        assert_eq!(request.json(), Some(&serde_json::json!({"k": 1})));
    }

    #[test]
    fn test_json_invalid_is_absent() {
        let request = parse(b"POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\n{no");
        assert!(request.json().is_none());
    }

    #[test]
    fn test_json_as() {
        #[derive(Deserialize)]
        struct Wifi {
            ssid: String,
        }

        let request = parse(b"POST / HTTP/1.1\r\nContent-Length: 15\r\n\r\n{\"ssid\": \"lab\"}");
        let wifi: Wifi = request.json_as().unwrap();
        assert_eq!(wifi.ssid, "lab");
    }

    #[test]
    fn test_cookies() {
        let request = parse(b"GET / HTTP/1.1\r\nCookie: session=abc; theme=dark%20blue; flag\r\n\r\n");

        assert_eq!(request.cookie("session"), Some("abc"));
        assert_eq!(request.cookie("theme"), Some("dark blue"));
        assert_eq!(request.cookies().len(), 2);
    }

    #[test]
    fn test_cookies_missing_or_invalid_is_empty() {
        assert!(parse(b"GET / HTTP/1.1\r\n\r\n").cookies().is_empty());
        assert!(parse(b"GET / HTTP/1.1\r\nCookie: a=%FF\r\n\r\n").cookies().is_empty());
    }

    #[test]
    fn test_derived_fields_are_memoized() {
        let request = parse(b"GET /?a=1 HTTP/1.1\r\n\r\n");
        let first = request.args().unwrap() as *const _;
        let second = request.args().unwrap() as *const _;
        assert_eq!(first, second);
    }
}
