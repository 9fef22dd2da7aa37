//! Multiple independent machines addressed by id.
//!
//! Each session is an `Arc<Mutex<Machine>>`: callers on different threads
//! can hold different sessions at once, while any one session is only ever
//! stepped by a single holder.

use crate::bits::Word;
use crate::machine::{Machine, MachineConfig, MachineError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Sessions idle for longer than this are dropped by
/// [`SessionManager::prune_idle_default`].
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// A shared handle to one session's machine.
pub type SessionHandle = Arc<Mutex<Machine>>;

struct Entry {
    machine: SessionHandle,
    created: Instant,
    last_activity: Instant,
}

/// What [`SessionManager::list`] reports per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub rom_name: Option<String>,
    pub pc: Word,
    pub cycles: u64,
    pub halted: bool,
    pub instructions_executed: u64,
    /// Seconds since the session was created.
    pub age_secs: u64,
    /// Seconds since the session was last fetched.
    pub idle_secs: u64,
}

/// Owns every live session.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Entry>>,
    next_id: AtomicU64,
    config: MachineConfig,
}

impl SessionManager {
    /// Sessions get the default machine configuration.
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a session. Without an `id` one of the form `session-N` is
    /// generated.
    pub fn create(&self, id: Option<String>) -> Result<String, SessionError> {
        let machine = Machine::new(self.config)?;
        let mut sessions = self.sessions();

        let id = match id {
            Some(id) if sessions.contains_key(&id) => return Err(SessionError::AlreadyExists(id)),
            Some(id) => id,
            None => loop {
                let candidate = format!("session-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
                if !sessions.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let now = Instant::now();
        sessions.insert(
            id.clone(),
            Entry {
                machine: Arc::new(Mutex::new(machine)),
                created: now,
                last_activity: now,
            },
        );
        log::debug!("created session {} ({} live)", id, sessions.len());
        Ok(id)
    }

    /// Fetch a session, marking it active.
    pub fn get(&self, id: &str) -> Result<SessionHandle, SessionError> {
        let mut sessions = self.sessions();
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        entry.last_activity = Instant::now();
        Ok(Arc::clone(&entry.machine))
    }

    /// Lock a session's machine and run `f` on it.
    pub fn with_machine<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Machine) -> Result<R, MachineError>,
    ) -> Result<R, SessionError> {
        let handle = self.get(id)?;
        let mut machine = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut *machine)?)
    }

    /// Summaries of every session, sorted by id.
    pub fn list(&self) -> Vec<SessionSummary> {
        // Snapshot the handles so no machine lock is taken under the map lock.
        let entries: Vec<(String, SessionHandle, Instant, Instant)> = self
            .sessions()
            .iter()
            .map(|(id, e)| (id.clone(), Arc::clone(&e.machine), e.created, e.last_activity))
            .collect();

        let mut summaries: Vec<SessionSummary> = entries
            .into_iter()
            .map(|(id, handle, created, last_activity)| {
                let machine = handle.lock().unwrap_or_else(PoisonError::into_inner);
                let state = machine.state();
                SessionSummary {
                    id,
                    rom_name: machine.rom_name().map(str::to_string),
                    pc: machine.cpu().pc(),
                    cycles: state.cycles,
                    halted: state.halted,
                    instructions_executed: machine.instructions_executed(),
                    age_secs: created.elapsed().as_secs(),
                    idle_secs: last_activity.elapsed().as_secs(),
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Remove a session. Handles already given out stay usable.
    pub fn destroy(&self, id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions();
        sessions
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        log::debug!("destroyed session {} ({} live)", id, sessions.len());
        Ok(())
    }

    /// Drop sessions idle for longer than `timeout`. Returns the removed ids.
    pub fn prune_idle(&self, timeout: Duration) -> Vec<String> {
        let mut sessions = self.sessions();
        let stale: Vec<String> = sessions
            .iter()
            .filter(|(_, e)| e.last_activity.elapsed() > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            sessions.remove(id);
        }
        if !stale.is_empty() {
            log::debug!("pruned {} idle sessions", stale.len());
        }
        stale
    }

    /// [`SessionManager::prune_idle`] with the one-hour default.
    pub fn prune_idle_default(&self) -> Vec<String> {
        self.prune_idle(DEFAULT_IDLE_TIMEOUT)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Errors from the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),

    #[error("session {0} already exists")]
    AlreadyExists(String),

    #[error(transparent)]
    Machine(#[from] MachineError),
}
