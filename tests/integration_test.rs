//! Tests de integración para el servidor HTTP
//! tests/integration_test.rs
//!
//! Cada test levanta su propio servidor en un puerto efímero de
//! 127.0.0.1, en modo secuencial o con pool, y lo detiene al terminar.

use embedded_http::config::{Config, Mode};
use embedded_http::http::{Body, BodySource, Request};
use embedded_http::router::Router;
use embedded_http::server::{Server, StopHandle};
use embedded_http::stream::{render_template, send_file};
use serde_json::{json, Value};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Servidor corriendo en un thread de fondo
struct TestServer {
    addr: SocketAddr,
    stop: StopHandle,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start(mode: Mode, router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let config = Config {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
            mode,
            workers: 4,
            queue_capacity: 8,
            read_timeout_secs: 1,
            ..Config::default()
        };

        let server = Server::new(config, router);
        let stop = server.stop_handle();
        let handle = thread::spawn(move || {
            server.serve(listener).expect("server failed");
        });

        Self {
            addr,
            stop,
            handle: Some(handle),
        }
    }

    fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.stop();
        if let Some(handle) = self.handle.take() {
            handle.join().expect("server thread panicked");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

/// Helper: envía bytes crudos y retorna la response completa
fn send_raw(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(raw).unwrap();
    stream.flush().unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    response
}

fn get(addr: SocketAddr, path: &str) -> String {
    let request = format!("GET {} HTTP/1.1\r\nHost: {}\r\n\r\n", path, addr);
    String::from_utf8_lossy(&send_raw(addr, request.as_bytes())).into_owned()
}

/// Helper: extrae el body de una response HTTP
fn extract_body(response: &str) -> &str {
    response
        .split_once("\r\n\r\n")
        .map_or("", |(_, body)| body)
}

fn demo_router() -> Router {
    let mut router = Router::new();
    router.register("/user/<string>", |req: &Request| {
        format!("Hello {}", req.matched().unwrap_or_default())
    });
    router.register("/missing", |_: &Request| (json!({"k": 1}), 404u16));
    router.register_with_methods("/only-get", &["GET"], |_: &Request| "get");
    router.register("/echo", |req: &Request| {
        json!({
            "method": req.method(),
            "args": req.args(),
            "json": req.json(),
            "session": req.cookie("session"),
        })
    });
    router.register("/boom", |_: &Request| -> &'static str { panic!("boom") });
    router.register("/stream-boom", |_: &Request| Body::stream(ExplodingSource));
    router
}

/// Body en streaming que hace panic en el primer chunk
struct ExplodingSource;

impl BodySource for ExplodingSource {
    fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
        panic!("stream exploded")
    }
}

// ==================== Scenarios (both modes) ====================

fn check_basic_routes(mode: Mode) {
    let server = TestServer::start(mode, demo_router());

    let response = get(server.addr, "/user/42");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "got: {}", response);
    assert_eq!(extract_body(&response), "Hello 42");

    let response = get(server.addr, "/not-registered");
    assert!(response.starts_with("HTTP/1.1 404"), "got: {}", response);
    assert_eq!(extract_body(&response), "<h2>Error 404: Page not found.</h2>");

    let response = get(server.addr, "/missing");
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(response.contains("Content-Type: application/json\r\n"));
    assert_eq!(extract_body(&response), "{\"k\":1}");

    let response = send_raw(server.addr, b"DELETE /only-get HTTP/1.1\r\n\r\n");
    assert!(response.starts_with(b"HTTP/1.1 405 Method Not Allowed\r\n"));

    let response = send_raw(server.addr, b"GET /user/1 HTTP/2.0\r\n\r\n");
    assert!(response.starts_with(b"HTTP/1.1 505"));

    let response = send_raw(server.addr, b"GARBAGE\r\n\r\n");
    assert!(response.is_empty());

    server.stop();
}

#[test]
fn test_basic_routes_sequential() {
    check_basic_routes(Mode::Sequential);
}

#[test]
fn test_basic_routes_pooled() {
    check_basic_routes(Mode::Pooled);
}

fn check_panic_is_contained(mode: Mode) {
    let server = TestServer::start(mode, demo_router());

    let response = get(server.addr, "/boom");
    assert!(response.is_empty(), "got: {}", response);

    // Panic después de escribir la cabecera
    let response = get(server.addr, "/stream-boom");
    assert!(!response.contains("stream exploded"));

    let response = get(server.addr, "/stream-boom");
    assert!(!response.contains("stream exploded"));

    // El servidor sigue atendiendo
    let response = get(server.addr, "/user/after");
    assert_eq!(extract_body(&response), "Hello after");

    server.stop();
}

#[test]
fn test_panic_is_contained_sequential() {
    check_panic_is_contained(Mode::Sequential);
}

#[test]
fn test_panic_is_contained_pooled() {
    check_panic_is_contained(Mode::Pooled);
}

fn check_huge_content_length(mode: Mode) {
    let server = TestServer::start(mode, demo_router());
    let raw = b"POST /echo HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\nname=x";

    // Más requests que workers
    for _ in 0..6 {
        let mut stream = TcpStream::connect(server.addr).unwrap();
        stream.write_all(raw).unwrap();
        stream.shutdown(std::net::Shutdown::Write).unwrap();
        let mut response = Vec::new();
        let _ = stream.read_to_end(&mut response);
        assert!(response.is_empty());
    }

    let response = get(server.addr, "/user/alive");
    assert_eq!(extract_body(&response), "Hello alive");

    server.stop();
}

#[test]
fn test_huge_content_length_sequential() {
    check_huge_content_length(Mode::Sequential);
}

#[test]
fn test_huge_content_length_pooled() {
    check_huge_content_length(Mode::Pooled);
}

// ==================== Derived fields ====================

#[test]
fn test_echo_derived_fields() {
    let server = TestServer::start(Mode::Pooled, demo_router());

    let body = r#"{"a":[1,2]}"#;
    let request = format!(
        "POST /echo?q=hola%20mundo&n=1 HTTP/1.1\r\n\
         Cookie: session=abc; theme=dark\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        body.len(),
        body
    );
    let response = String::from_utf8(send_raw(server.addr, request.as_bytes())).unwrap();
    let echo: Value = serde_json::from_str(extract_body(&response)).unwrap();

    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["args"]["q"], "hola mundo");
    assert_eq!(echo["args"]["n"], "1");
    assert_eq!(echo["json"]["a"], json!([1, 2]));
    assert_eq!(echo["session"], "abc");

    server.stop();
}

// ==================== Streaming helpers ====================

#[test]
fn test_send_file_and_template() {
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(dir.path().join("blob.bin"), &data).unwrap();
    std::fs::write(
        dir.path().join("page.html"),
        "<h1>{{title}}</h1>\n<p>{{title}} on {{host}}</p>\n",
    )
    .unwrap();

    let root: PathBuf = dir.path().to_path_buf();
    let mut router = Router::new();
    {
        let root = root.clone();
        router.register("/download/<path>", move |req: &Request| {
            send_file(root.join(req.matched().unwrap_or_default())).as_attachment()
        });
    }
    router.register("/page", move |req: &Request| {
        render_template(root.join("page.html"))
            .var("title", "Status")
            .var("host", req.host().unwrap_or("?"))
    });

    let server = TestServer::start(Mode::Sequential, router);

    let response = send_raw(server.addr, b"GET /download/blob.bin HTTP/1.1\r\n\r\n");
    let split = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("head terminator");
    let head = String::from_utf8_lossy(&response[..split]);
    assert!(head.contains("Content-Type: application/octet-stream"));
    assert!(head.contains("Content-Disposition: attachment; filename=\"blob.bin\""));
    assert_eq!(&response[split + 4..], data.as_slice());

    let response = get(server.addr, "/page");
    assert!(response.contains("Content-Type: text/html\r\n"));
    assert_eq!(
        extract_body(&response),
        format!("<h1>Status</h1>\n<p>Status on {}</p>\n", server.addr)
    );

    let response = get(server.addr, "/download/nothing.bin");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(extract_body(&response).starts_with("<h2>File Not Exists:"));

    server.stop();
}

// ==================== Concurrency ====================

#[test]
fn test_pool_serves_in_parallel() {
    let mut router = Router::new();
    router.register("/slow", |_: &Request| {
        thread::sleep(Duration::from_millis(500));
        "done"
    });
    let server = TestServer::start(Mode::Pooled, router);

    let start = Instant::now();
    let clients: Vec<_> = (0..4)
        .map(|_| {
            let addr = server.addr;
            thread::spawn(move || get(addr, "/slow"))
        })
        .collect();

    for client in clients {
        assert_eq!(extract_body(&client.join().unwrap()), "done");
    }

    // En secuencia tardaría 2 segundos
    assert!(start.elapsed() < Duration::from_millis(1500));

    server.stop();
}

#[test]
fn test_idle_client_times_out() {
    let server = TestServer::start(Mode::Pooled, demo_router());

    let mut idle = TcpStream::connect(server.addr).unwrap();
    idle.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    // Otros clientes no esperan al inactivo
    assert_eq!(extract_body(&get(server.addr, "/user/x")), "Hello x");

    let mut buffer = Vec::new();
    let start = Instant::now();
    let read = idle.read_to_end(&mut buffer);
    assert!(read.map(|n| n == 0).unwrap_or(true));
    assert!(start.elapsed() < Duration::from_secs(4));

    server.stop();
}

#[test]
fn test_slow_client_cannot_hold_sequential_server() {
    let server = TestServer::start(Mode::Sequential, demo_router());
    let addr = server.addr;

    // Un header cada 400ms durante ~4 segundos
    let slow = thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        let _ = stream.write_all(b"GET /user/slow HTTP/1.1\r\n");
        for _ in 0..10 {
            thread::sleep(Duration::from_millis(400));
            if stream.write_all(b"X-Slow: y\r\n").is_err() {
                break;
            }
        }
    });

    thread::sleep(Duration::from_millis(100));
    let start = Instant::now();
    let response = get(addr, "/user/fast");
    let waited = start.elapsed();

    assert_eq!(extract_body(&response), "Hello fast");
    // read_timeout_secs = 1 cubre todo el request del cliente lento
    assert!(waited < Duration::from_millis(2500), "waited {:?}", waited);

    slow.join().unwrap();
    server.stop();
}

#[test]
fn test_stop_before_serve() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let stop = StopHandle::new();
    stop.stop();

    let server = Server::new(Config::default(), demo_router()).with_stop_handle(stop);
    let handle = thread::spawn(move || server.serve(listener));

    let start = Instant::now();
    while !handle.is_finished() && start.elapsed() < Duration::from_secs(3) {
        thread::sleep(Duration::from_millis(20));
    }
    assert!(handle.is_finished(), "serve kept accepting after stop");
    assert!(handle.join().unwrap().is_ok());
}

#[test]
fn test_demo_logo_is_shipped() {
    let logo = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("web").join("logo.png");
    let mut router = Router::new();
    router.register("/logo.png", move |_: &Request| send_file(&logo));
    let server = TestServer::start(Mode::Sequential, router);

    let response = send_raw(server.addr, b"GET /logo.png HTTP/1.1\r\n\r\n");
    let text = String::from_utf8_lossy(&response);
    assert!(text.contains("Content-Type: image/png\r\n"));
    assert!(response.windows(4).any(|w| w == b"\x89PNG"));

    server.stop();
}

#[test]
fn test_stop_from_handler() {
    let stop = StopHandle::new();
    let mut router = Router::new();
    {
        let stop = stop.clone();
        router.register("/stop", move |_: &Request| {
            stop.stop();
            "bye"
        });
    }

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let config = Config {
        mode: Mode::Sequential,
        ..Config::default()
    };
    let server = Server::new(config, router).with_stop_handle(stop.clone());
    let handle = thread::spawn(move || server.serve(listener));

    assert_eq!(extract_body(&get(addr, "/stop")), "bye");
    assert!(handle.join().unwrap().is_ok());
    assert!(stop.is_stopped());
}

#[test]
fn test_run_rejects_invalid_config() {
    let config = Config {
        workers: 0,
        ..Config::default()
    };
    let server = Server::new(config, Router::new());
    assert!(server.run().is_err());
}
