//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Tabla de rutas ordenada. El orden de registro es la prioridad: gana la
//! primera ruta cuyo patrón coincide con el path, no la más específica.
//!
//! ## Gramática de patrones
//!
//! ```text
//! /status            exacto (la "/" final se ignora en ambos lados)
//! /user/<string>     un segmento final      → request.matched() = "42"
//! /download/<path>   uno o más segmentos    → request.matched() = "a/b/c"
//! ```
//!
//! Si el path coincide pero el método no está permitido, la búsqueda
//! termina con 405 aunque una ruta posterior aceptara ese método.

use crate::http::{Reply, Request};

const STRING_WILDCARD: &str = "/<string>";
const PATH_WILDCARD: &str = "/<path>";

/// Métodos permitidos cuando no se indican
pub const DEFAULT_METHODS: [&str; 2] = ["GET", "POST"];

/// Tipo de función handler
///
/// Un handler recibe el Request y retorna cualquier cosa convertible a `Reply`
pub type Handler = Box<dyn Fn(&Request) -> Reply + Send + Sync>;

/// Ruta registrada
pub struct Route {
    pattern: String,
    methods: Vec<String>,
    handler: Handler,
}

impl Route {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn allows(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }

    /// Ejecuta el handler
    pub fn call(&self, request: &Request) -> Reply {
        (self.handler)(request)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

/// Resultado de buscar una ruta
#[derive(Debug)]
pub enum RouteMatch<'a> {
    /// Path y método coinciden
    Found {
        route: &'a Route,
        captured: Option<String>,
    },

    /// El primer patrón que coincide no acepta el método
    MethodNotAllowed,

    /// Ningún patrón coincide
    NotFound,
}

/// Router que mapea patrones de path a handlers
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Crea un nuevo router vacío
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registra una ruta que acepta GET y POST
    ///
    /// # Ejemplo
    /// ```
    /// use embedded_http::router::Router;
    /// use embedded_http::http::Request;
    ///
    /// let mut router = Router::new();
    /// router.register("/user/<string>", |req: &Request| {
    ///     format!("<h1>Hello {}</h1>", req.matched().unwrap_or_default())
    /// });
    /// ```
    pub fn register<F, R>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request) -> R + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.register_with_methods(pattern, &DEFAULT_METHODS, handler)
    }

    /// Registra una ruta con una lista explícita de métodos
    pub fn register_with_methods<F, R>(
        &mut self,
        pattern: &str,
        methods: &[&str],
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&Request) -> R + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.routes.push(Route {
            pattern: pattern.to_string(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            handler: Box::new(move |request: &Request| handler(request).into()),
        });
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Busca la primera ruta cuyo patrón coincide con el path
    ///
    /// # Ejemplo
    /// ```
    /// use embedded_http::router::{Router, RouteMatch};
    /// use embedded_http::http::Request;
    ///
    /// let mut router = Router::new();
    /// router.register("/download/<path>", |_: &Request| "ok");
    ///
    /// match router.resolve("GET", "/download/fw/v2.bin") {
    ///     RouteMatch::Found { captured, .. } => assert_eq!(captured.as_deref(), Some("fw/v2.bin")),
    ///     other => panic!("unexpected {:?}", other),
    /// }
    /// ```
    pub fn resolve(&self, method: &str, path: &str) -> RouteMatch<'_> {
        for route in &self.routes {
            let Some(captured) = match_pattern(&route.pattern, path) else {
                continue;
            };

            if !route.allows(method) {
                return RouteMatch::MethodNotAllowed;
            }
            return RouteMatch::Found { route, captured };
        }

        RouteMatch::NotFound
    }
}

/// Compara un patrón con un path
///
/// # Retorna
///
/// * `None` - No coincide
/// * `Some(None)` - Coincidencia exacta
/// * `Some(Some(captura))` - Coincidencia por comodín
pub fn match_pattern(pattern: &str, path: &str) -> Option<Option<String>> {
    let path = path.trim_end_matches('/');

    if pattern.trim_end_matches('/') == path {
        return Some(None);
    }

    // Todo menos el último segmento: "/a/b/c" → "/a/b"
    let parent = path.rfind('/').map_or("", |i| &path[..i]);

    if let Some(prefix) = pattern.strip_suffix(STRING_WILDCARD) {
        let segment = path.get(prefix.len() + 1..).unwrap_or_default();
        if parent == prefix && !segment.is_empty() {
            return Some(Some(segment.to_string()));
        }
        return None;
    }

    if let Some(prefix) = pattern.strip_suffix(PATH_WILDCARD) {
        let under_prefix = parent == prefix
            || parent
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'));
        let rest = path.get(prefix.len() + 1..).unwrap_or_default();
        if under_prefix && !rest.is_empty() {
            return Some(Some(rest.to_string()));
        }
    }

    None
}
