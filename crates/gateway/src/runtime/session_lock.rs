//! One turn at a time per conversation.
//!
//! Each conversation id maps to a `Semaphore(1)`. A send that finds the
//! permit taken is rejected instead of queued: the client keeps its send
//! control disabled while a reply is pending.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tc_domain::error::{Error, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Default)]
pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the conversation's permit. Hold it for the whole turn; it
    /// releases on drop.
    pub fn try_acquire(&self, conversation_id: &str) -> Result<OwnedSemaphorePermit> {
        let sem = self
            .locks
            .lock()
            .entry(conversation_id.to_owned())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone();
        sem.try_acquire_owned().map_err(|_| {
            Error::SessionBusy(format!("a reply is still pending in conversation {conversation_id}"))
        })
    }

    pub fn is_busy(&self, conversation_id: &str) -> bool {
        self.locks
            .lock()
            .get(conversation_id)
            .is_some_and(|s| s.available_permits() == 0)
    }

    /// Drop semaphores nobody holds.
    pub fn prune_idle(&self) {
        self.locks.lock().retain(|_, sem| sem.available_permits() == 0);
    }
}
