//! Chat runtime: conversation state, turn execution and reply
//! reconciliation.

pub mod cancel;
pub mod conversation;
pub mod reconcile;
pub mod session_lock;
pub mod turn;

pub use cancel::{CancelMap, CancelToken};
pub use conversation::{
    AttachmentContext, AttachmentSlot, Conversation, ConversationMap, ConversationView,
    SelectAction, SessionPhase, SharedConversation,
};
pub use reconcile::{Reconciler, TurnOutcome};
pub use session_lock::SessionLockMap;
pub use turn::{ChatRuntime, TurnEvent};
