//! Turn preparation: attachment processing, intent routing and prompt
//! assembly. Everything here is deterministic and free of I/O apart from
//! the caller-supplied JSON upload.

pub mod attachments;
pub mod builder;
pub mod engagement;
pub mod routing;
pub mod summary;

pub use attachments::{AttachmentKind, AttachmentProcessor, ProcessedCsv, TabularContext};
pub use builder::{assemble, PromptInputs, TurnPrompt};
pub use routing::{route, IntentClassifier, KeywordClassifier, TurnIntent, TurnSignals};
