pub mod google;
pub mod imagen;
pub mod retry;
pub mod traits;
pub(crate) mod sse;
pub(crate) mod util;

// Re-exports for convenience.
pub use google::GoogleProvider;
pub use imagen::ImagenGenerator;
pub use retry::{with_retry, RetryingProvider};
pub use traits::{AnchorImage, ChatProvider, ImageGenerator, ModelMode, TurnRequest, TurnResponse};
pub use util::api_key_from_env;
