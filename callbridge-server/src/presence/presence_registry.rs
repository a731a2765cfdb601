use crate::error::RelayError;
use crate::presence::ConnectionHandle;
use callbridge_core::SessionId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

/// Upper bound on id generation retries before `create` gives up.
pub const MAX_ID_ATTEMPTS: usize = 16;

type IdGenerator = Box<dyn Fn() -> SessionId + Send + Sync>;

/// Single source of truth for which sessions are reachable.
///
/// Only `create` and `remove` mutate it. Every operation is a single sharded-map access,
/// so concurrent connection handlers never wait on each other for long.
pub struct PresenceRegistry {
    sessions: DashMap<SessionId, ConnectionHandle>,
    generator: IdGenerator,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::with_generator(SessionId::generate)
    }

    pub fn with_generator<F>(generator: F) -> Self
    where
        F: Fn() -> SessionId + Send + Sync + 'static,
    {
        Self {
            sessions: DashMap::new(),
            generator: Box::new(generator),
        }
    }

    /// Registers `connection` under a fresh identifier.
    ///
    /// Generated ids that are already taken are discarded and regenerated.
    pub fn create(&self, connection: ConnectionHandle) -> Result<SessionId, RelayError> {
        if !connection.is_open() {
            return Err(RelayError::ConnectionClosed);
        }

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = (self.generator)();
            match self.sessions.entry(id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(connection);
                    info!("Session {} registered", id);
                    return Ok(id);
                }
                Entry::Occupied(_) => debug!("Session id {} already taken, regenerating", id),
            }
        }

        Err(RelayError::IdentifierExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    pub fn get(&self, id: &SessionId) -> Option<ConnectionHandle> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Removing an unknown id is a no-op.
    pub fn remove(&self, id: &SessionId) {
        if self.sessions.remove(id).is_some() {
            info!("Session {} removed", id);
        }
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
