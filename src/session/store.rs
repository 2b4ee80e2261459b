//! Session store
//!
//! Owns the id counter and the id -> record map. Like the device registry it
//! is unsynchronized; the coordinator serializes access.

use std::collections::HashMap;

use super::state::{SessionId, SessionRecord};

/// Map of session ID to session record
#[derive(Debug)]
pub struct SessionStore<P> {
    sessions: HashMap<SessionId, SessionRecord<P>>,
    next_id: SessionId,
}

impl<P> SessionStore<P> {
    /// Create an empty store whose first allocated ID is `first_id`
    pub fn new(first_id: SessionId) -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: first_id,
        }
    }

    /// Allocate the next session ID
    ///
    /// IDs are strictly increasing and never handed out twice.
    pub fn allocate_id(&mut self) -> SessionId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Insert a record
    pub fn insert(&mut self, record: SessionRecord<P>) {
        self.sessions.insert(record.id, record);
    }

    /// Get a mutable session by ID
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut SessionRecord<P>> {
        self.sessions.get_mut(&id)
    }

    /// Remove a session
    pub fn remove(&mut self, id: SessionId) -> Option<SessionRecord<P>> {
        self.sessions.remove(&id)
    }

    /// Iterate over live sessions
    pub fn iter(&self) -> impl Iterator<Item = &SessionRecord<P>> {
        self.sessions.values()
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no live sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
