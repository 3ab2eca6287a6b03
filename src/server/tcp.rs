//! # Servidor TCP
//! src/server/tcp.rs
//!
//! Acepta conexiones y las atiende en uno de dos modos:
//!
//! - **Sequential**: el mismo thread que acepta atiende la conexión
//! - **Pooled**: la conexión se encola y la atiende un worker del pool
//!
//! Cada conexión atiende exactamente un request y se cierra. El dispatcher
//! nunca deja escapar un error: se registra y la conexión se descarta.

use super::error::{ConnectionError, ServerError};
use super::pool::WorkerPool;
use crate::config::{Config, Mode};
use crate::http::{Request, RequestError, Response, StatusCode};
use crate::router::{RouteMatch, Router};
use std::any::Any;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Handle para detener el servidor desde otro thread o desde un handler
///
/// Detener el servidor deja de aceptar conexiones nuevas. Las conexiones
/// ya encoladas en el pool se atienden antes de salir de `serve`.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,

    /// Dirección del listener activo, para despertar al `accept`
    local_addr: Arc<Mutex<Option<SocketAddr>>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pide al servidor que se detenga
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let addr = *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // El thread que acepta está bloqueado en accept: una conexión
        // vacía lo despierta para que vea la bandera.
        if let Some(addr) = addr {
            if let Err(e) = TcpStream::connect_timeout(&wake_addr(addr), Duration::from_secs(1)) {
                debug!(error = %e, "could not wake accept loop");
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn bind(&self, addr: SocketAddr) {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(addr);
    }
}

/// Un listener en 0.0.0.0 se alcanza por loopback
fn wake_addr(mut addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        let loopback = match addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
        };
        addr.set_ip(loopback);
    }
    addr
}

/// Servidor HTTP/1.1
pub struct Server {
    config: Config,
    router: Arc<Router>,
    stop: StopHandle,
}

impl Server {
    /// Crea el servidor; las rutas quedan fijas desde este momento
    pub fn new(config: Config, router: Router) -> Self {
        Self {
            config,
            router: Arc::new(router),
            stop: StopHandle::new(),
        }
    }

    /// Usa un handle creado antes del servidor (ej: capturado por un handler)
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Valida la configuración, hace bind y atiende hasta que se detenga
    pub fn run(&self) -> Result<(), ServerError> {
        self.config.validate().map_err(ServerError::InvalidConfig)?;

        let address = self.config.address();
        let listener = TcpListener::bind(&address).map_err(|source| ServerError::Bind {
            addr: address.clone(),
            source,
        })?;

        self.serve(listener)
    }

    /// Atiende conexiones sobre un listener ya creado
    pub fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        self.stop.bind(local_addr);

        // Un stop previo al bind no pudo despertar a nadie
        if self.stop.is_stopped() {
            info!(address = %local_addr, "server stopped before accepting");
            return Ok(());
        }

        info!(
            address = %local_addr,
            mode = ?self.config.mode,
            "server listening"
        );

        match self.config.mode {
            Mode::Sequential => self.serve_sequential(&listener),
            Mode::Pooled => self.serve_pooled(&listener),
        }

        info!("server stopped");
        Ok(())
    }

    fn serve_sequential(&self, listener: &TcpListener) {
        let timeout = self.config.read_timeout();

        for stream in listener.incoming() {
            if self.stop.is_stopped() {
                break;
            }

            match stream {
                Ok(stream) => handle_stream(stream, &self.router, timeout),
                Err(e) => warn!(error = %e, "failed to accept connection"),
            }

            // Un handler pudo haber pedido detener el servidor
            if self.stop.is_stopped() {
                break;
            }
        }
    }

    fn serve_pooled(&self, listener: &TcpListener) {
        let pool = WorkerPool::new(
            self.config.workers,
            self.config.queue_capacity,
            Arc::clone(&self.router),
            self.config.read_timeout(),
        );
        info!(
            workers = pool.size(),
            queue = self.config.queue_capacity,
            "worker pool started"
        );

        for stream in listener.incoming() {
            if self.stop.is_stopped() {
                break;
            }

            match stream {
                Ok(stream) => pool.submit(stream),
                Err(e) => warn!(error = %e, "failed to accept connection"),
            }
        }

        pool.shutdown();
    }
}

/// Socket con un plazo único para todas las lecturas del request
///
/// Antes de cada lectura se ajusta el timeout del socket al tiempo que
/// queda, así un cliente que envía de a poco no extiende el plazo.
struct DeadlineStream<'a> {
    stream: &'a TcpStream,
    deadline: Instant,
}

impl<'a> DeadlineStream<'a> {
    fn new(stream: &'a TcpStream, timeout: Duration) -> Self {
        Self {
            stream,
            deadline: Instant::now() + timeout,
        }
    }
}

impl Read for DeadlineStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "request read deadline expired"));
        }
        self.stream.set_read_timeout(Some(remaining))?;

        let mut stream = self.stream;
        stream.read(buf)
    }
}

impl Write for DeadlineStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut stream = self.stream;
        stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut stream = self.stream;
        stream.flush()
    }
}

/// Atiende una conexión TCP y registra el resultado
///
/// Nunca hace panic: el thread que acepta y los workers sobreviven a
/// cualquier request.
pub fn handle_stream(stream: TcpStream, router: &Router, timeout: Duration) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!(%peer, "connection accepted");

    match handle_connection(DeadlineStream::new(&stream, timeout), router) {
        Ok(()) => debug!(%peer, "connection closed"),
        Err(e) if e.is_transport() => debug!(%peer, error = %e, "connection dropped"),
        Err(e) => warn!(%peer, error = %e, "request failed"),
    }
}

/// Lee un request del stream, lo despacha y escribe la respuesta
///
/// Funciona con cualquier `Read + Write`, lo que permite probar el
/// dispatcher sin sockets. Un panic en cualquier etapa (parsing, handler,
/// headers o chunks del body) se devuelve como `ConnectionError::Panic`.
pub fn handle_connection<S: Read + Write>(
    stream: S,
    router: &Router,
) -> Result<(), ConnectionError> {
    panic::catch_unwind(AssertUnwindSafe(|| respond(stream, router))).unwrap_or_else(|payload| {
        Err(ConnectionError::Panic(panic_message(payload.as_ref())))
    })
}

fn respond<S: Read + Write>(mut stream: S, router: &Router) -> Result<(), ConnectionError> {
    let response = {
        let mut reader = BufReader::new(&mut stream);
        read_and_dispatch(&mut reader, router)?
    };

    // Request line malformada: se cierra sin responder
    let Some(response) = response else {
        return Ok(());
    };

    for chunk in response.into_chunks() {
        stream.write_all(&chunk?)?;
    }
    stream.flush()?;

    Ok(())
}

fn read_and_dispatch<R: BufRead>(
    reader: &mut R,
    router: &Router,
) -> Result<Option<Response>, ConnectionError> {
    let mut request = match Request::read_head(reader) {
        Ok(Some(request)) => request,
        Ok(None) => return Ok(None),
        Err(RequestError::UnsupportedVersion(version)) => {
            debug!(%version, "unsupported HTTP version");
            return Ok(Some(Response::error_page(
                StatusCode::HTTP_VERSION_NOT_SUPPORTED,
                "HTTP version not supported.",
            )));
        }
        Err(e) => return Err(e.into()),
    };

    debug!(method = %request.method(), path = %request.full_path(), "request received");

    let (route, captured) = match router.resolve(request.method(), request.path()) {
        RouteMatch::Found { route, captured } => (route, captured),
        RouteMatch::NotFound => {
            return Ok(Some(Response::error_page(StatusCode::NOT_FOUND, "Page not found.")));
        }
        RouteMatch::MethodNotAllowed => {
            return Ok(Some(Response::error_page(
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed.",
            )));
        }
    };

    // El body solo se lee cuando hay una ruta que lo va a usar
    request.set_match(captured);
    request.read_body(reader)?;

    Ok(Some(route.call(&request).into_response()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
