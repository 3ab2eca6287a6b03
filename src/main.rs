//! # Embedded HTTP - Entry Point
//! src/main.rs
//!
//! Aplicación de demostración: una página de estado renderizada desde
//! plantilla, archivos estáticos, descargas y un endpoint que devuelve los
//! campos derivados del request.

use embedded_http::config::Config;
use embedded_http::http::{Request, Response};
use embedded_http::router::Router;
use embedded_http::server::{Server, StopHandle};
use embedded_http::stream::file::join_under;
use embedded_http::stream::{render_template, send_file};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Vista JSON de un request, devuelta por `/echo`
#[derive(Debug, Serialize)]
struct Echo<'a> {
    method: &'a str,
    path: &'a str,
    url: Option<&'a str>,
    args: Option<&'a HashMap<String, String>>,
    form: Option<&'a HashMap<String, String>>,
    json: Option<&'a serde_json::Value>,
    cookies: &'a HashMap<String, String>,
}

fn build_router(web_root: PathBuf, stop: StopHandle) -> Router {
    let visits = Arc::new(AtomicU64::new(0));
    let mut router = Router::new();

    {
        let web_root = web_root.clone();
        router.register_with_methods("/", &["GET"], move |req: &Request| {
            let count = visits.fetch_add(1, Ordering::Relaxed) + 1;
            let mut response = Response::new(
                render_template(web_root.join("index.html"))
                    .var("host", req.host().unwrap_or("unknown"))
                    .var("visits", count),
            );
            response.set_cookie("last_visit", &count.to_string(), Some(3600));
            response
        });
    }

    {
        let web_root = web_root.clone();
        router.register_with_methods("/logo.png", &["GET"], move |_: &Request| {
            send_file(web_root.join("logo.png"))
        });
    }

    router.register("/user/<string>", |req: &Request| {
        format!("<h1>Hello {}</h1>", req.matched().unwrap_or_default())
    });

    router.register_with_methods("/download/<path>", &["GET"], move |req: &Request| {
        match join_under(&web_root, req.matched().unwrap_or_default()) {
            Some(path) => Response::new(send_file(path).as_attachment()),
            None => Response::error_page(403u16.into(), "Forbidden."),
        }
    });

    router.register("/echo", |req: &Request| {
        let echo = Echo {
            method: req.method(),
            path: req.path(),
            url: req.url(),
            args: req.args(),
            form: req.form(),
            json: req.json(),
            cookies: req.cookies(),
        };
        match serde_json::to_value(&echo) {
            Ok(value) => Response::new(value),
            Err(e) => Response::new(format!("<h2>{}</h2>", e)).with_status(500u16),
        }
    });

    router.register("/stop", move |_: &Request| {
        stop.stop();
        "<h2>Server stopping.</h2>"
    });

    router
}

fn main() {
    let config = Config::new();

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }

    info!(
        address = %config.address(),
        mode = ?config.mode,
        web_root = %config.web_root,
        "starting embedded_http"
    );

    let stop = StopHandle::new();
    let router = build_router(PathBuf::from(&config.web_root), stop.clone());
    let server = Server::new(config, router).with_stop_handle(stop);

    // Bloquea hasta que alguien llame a /stop
    if let Err(e) = server.run() {
        error!(error = %e, "server failed");
        std::process::exit(1);
    }
}
