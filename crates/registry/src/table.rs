//! Name → session map shared by the accept loop, session readers and
//! dispatch calls.
//!
//! The lock is only held for map operations, never across socket I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use projection_protocol::HandshakeError;

use crate::session::RendererSession;

#[derive(Default)]
struct TableState {
    sessions: HashMap<String, Arc<RendererSession>>,
    /// Set while the registry is stopped so late handshakes cannot insert.
    closed: bool,
}

#[derive(Default)]
pub(crate) struct SessionTable {
    state: Mutex<TableState>,
}

impl SessionTable {
    fn lock(&self) -> MutexGuard<'_, TableState> {
        // Every operation leaves the map consistent, so a panic elsewhere
        // while holding the lock does not invalidate it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn open(&self) {
        self.lock().closed = false;
    }

    /// Inserts `session` unless its name is taken or the table is closed.
    pub(crate) fn insert_unique(&self, session: &Arc<RendererSession>) -> Result<(), HandshakeError> {
        let mut state = self.lock();
        if state.closed {
            return Err(HandshakeError::ShuttingDown);
        }
        if state.sessions.contains_key(session.name()) {
            return Err(HandshakeError::NameInUse);
        }
        state
            .sessions
            .insert(session.name().to_string(), Arc::clone(session));
        Ok(())
    }

    /// Removes `name` only if it still maps to the session with `id`.
    ///
    /// A renderer that reconnects under the same name must not be evicted
    /// by the old session's late disconnect.
    pub(crate) fn remove_if_same(&self, name: &str, id: u64) -> bool {
        let mut state = self.lock();
        if state.sessions.get(name).is_some_and(|s| s.id() == id) {
            state.sessions.remove(name);
            true
        } else {
            false
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<RendererSession>> {
        self.lock().sessions.get(name).cloned()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<RendererSession>> {
        self.lock().sessions.values().cloned().collect()
    }

    /// Registered names, sorted.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().sessions.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Closes the table to new inserts and takes every session out.
    pub(crate) fn close_and_drain(&self) -> Vec<Arc<RendererSession>> {
        let mut state = self.lock();
        state.closed = true;
        state.sessions.drain().map(|(_, s)| s).collect()
    }
}
