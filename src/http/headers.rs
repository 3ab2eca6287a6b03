//! # Headers HTTP ordenados
//! src/http/headers.rs
//!
//! Mapa string → string que conserva el orden de inserción y las
//! mayúsculas/minúsculas de las claves tal como llegaron. Insertar una
//! clave existente reemplaza el valor sin moverla de posición.

/// Colección ordenada de headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Crea una colección vacía
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Inserta o reemplaza un header
    ///
    /// # Ejemplo
    /// ```
    /// use embedded_http::http::Headers;
    ///
    /// let mut headers = Headers::new();
    /// headers.insert("Content-Type", "text/plain");
    /// headers.insert("Content-Type", "text/html");
    /// assert_eq!(headers.get("Content-Type"), Some("text/html"));
    /// assert_eq!(headers.len(), 1);
    /// ```
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Inserta solo si la clave no existe
    pub fn insert_if_absent(&mut self, name: &str, value: impl Into<String>) {
        if !self.contains(name) {
            self.entries.push((name.to_string(), value.into()));
        }
    }

    /// Obtiene el valor de un header (comparación exacta de la clave)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Mezcla otra colección encima de esta
    pub fn merge(&mut self, other: Headers) {
        for (name, value) in other.entries {
            self.insert(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Headers {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}
