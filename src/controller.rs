//! Registry of in-flight generations
//!
//! Each generation is registered under its session id and the id of the
//! assistant message it streams into. Stopping an entry cancels its token;
//! the generation then ends as aborted and removes its own entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellation handles by (session id, message id)
#[derive(Debug, Clone, Default)]
pub struct ControllerPool {
    controllers: Arc<Mutex<HashMap<(String, String), CancellationToken>>>,
}

impl ControllerPool {
    /// Creates an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), CancellationToken>> {
        self.controllers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a generation and returns its token
    ///
    /// # Examples
    ///
    /// ```
    /// use chatweave::controller::ControllerPool;
    ///
    /// let pool = ControllerPool::new();
    /// let token = pool.add("session", "message");
    /// assert!(pool.stop("session", "message"));
    /// assert!(token.is_cancelled());
    /// ```
    pub fn add(&self, session_id: &str, message_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.lock()
            .insert((session_id.to_string(), message_id.to_string()), token.clone());
        token
    }

    /// Cancels a generation; returns false when none is registered
    pub fn stop(&self, session_id: &str, message_id: &str) -> bool {
        let key = (session_id.to_string(), message_id.to_string());
        match self.lock().get(&key) {
            Some(token) => {
                debug!(session_id, message_id, "Stopping generation");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every registered generation
    pub fn stop_all(&self) {
        for token in self.lock().values() {
            token.cancel();
        }
    }

    /// Removes an entry once its generation reached a terminal state
    pub fn remove(&self, session_id: &str, message_id: &str) {
        self.lock()
            .remove(&(session_id.to_string(), message_id.to_string()));
    }

    /// Whether any generation is in flight
    pub fn has_pending(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Number of generations in flight
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
