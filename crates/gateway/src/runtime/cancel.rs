//! Per-conversation stop tokens.
//!
//! Each running turn registers a [`CancelToken`]. The stop endpoint flips
//! it; the streaming consumer checks it once per chunk. Cancellation is
//! advisory: in-flight requests are not aborted, further output is simply
//! ignored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone, Debug)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Active tokens keyed by conversation id.
#[derive(Default)]
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token, replacing any stale one.
    pub fn register(&self, conversation_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens
            .lock()
            .insert(conversation_id.to_owned(), token.clone());
        token
    }

    /// Returns true if a running turn was signalled.
    pub fn cancel(&self, conversation_id: &str) -> bool {
        match self.tokens.lock().get(conversation_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, conversation_id: &str) {
        self.tokens.lock().remove(conversation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_reaches_registered_token() {
        let map = CancelMap::new();
        let token = map.register("c1");
        assert!(map.cancel("c1"));
        assert!(token.is_cancelled());

        map.remove("c1");
        assert!(!map.cancel("c1"));
    }

    #[test]
    fn tokens_are_per_conversation() {
        let map = CancelMap::new();
        let a = map.register("a");
        let b = map.register("b");
        map.cancel("a");
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
    }

    #[test]
    fn re_registering_gives_a_fresh_token() {
        let map = CancelMap::new();
        let old = map.register("c");
        old.cancel();
        let fresh = map.register("c");
        assert!(!fresh.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::default();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
