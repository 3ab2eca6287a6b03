//! # Pool de Workers
//! src/server/pool.rs
//!
//! Número fijo de threads que toman conexiones de una cola acotada. Cuando
//! la cola está llena, el thread que acepta se bloquea en `submit` y deja
//! de aceptar hasta que un worker libere espacio.

use super::tcp::handle_stream;
use crate::router::Router;
use std::collections::VecDeque;
use std::net::TcpStream;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Cola FIFO thread-safe con capacidad máxima
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,

    /// Notifica a los consumidores que hay un elemento (o que se cerró)
    not_empty: Condvar,

    /// Notifica al productor que hay espacio
    not_full: Condvar,

    capacity: usize,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> BoundedQueue<T> {
    /// Crea una cola vacía; una capacidad 0 se trata como 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    // Un worker que hizo panic no invalida la cola
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encola un elemento, bloqueando mientras la cola esté llena
    ///
    /// Si la cola ya fue cerrada, devuelve el elemento en `Err`.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();

        while state.items.len() >= self.capacity && !state.closed {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if state.closed {
            return Err(item);
        }

        state.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Desencola el elemento más antiguo
    ///
    /// Bloquea hasta que haya uno. Retorna `None` cuando la cola está
    /// cerrada y vacía.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Cierra la cola: los elementos pendientes se siguen entregando
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Pool fijo de workers que atienden conexiones
pub struct WorkerPool {
    queue: Arc<BoundedQueue<TcpStream>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Inicia `size` workers compartiendo el router
    pub fn new(size: usize, capacity: usize, router: Arc<Router>, timeout: Duration) -> Self {
        let queue = Arc::new(BoundedQueue::new(capacity));
        let mut workers = Vec::with_capacity(size);

        for i in 0..size {
            let name = format!("http-worker-{}", i);
            let queue = Arc::clone(&queue);
            let router = Arc::clone(&router);

            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || Self::worker_loop(&queue, &router, timeout));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => warn!(worker = %name, error = %e, "failed to spawn worker"),
            }
        }

        Self { queue, workers }
    }

    /// Loop principal del worker
    fn worker_loop(queue: &BoundedQueue<TcpStream>, router: &Router, timeout: Duration) {
        debug!("worker started");

        while let Some(stream) = queue.pop() {
            handle_stream(stream, router, timeout);
        }

        debug!("worker stopped");
    }

    /// Número de workers vivos al crear el pool
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Entrega una conexión al pool; bloquea si la cola está llena
    pub fn submit(&self, stream: TcpStream) {
        if self.queue.push(stream).is_err() {
            debug!("pool closed, dropping connection");
        }
    }

    /// Cierra la cola y espera a que los workers terminen lo pendiente
    pub fn shutdown(self) {
        self.queue.close();
        for worker in self.workers {
            if worker.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}
