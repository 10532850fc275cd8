pub mod ai;
pub mod config;
pub mod gateway;
pub mod imaging;
pub mod state;
pub mod transcript;

// Re-export main types for convenience
pub use ai::GeminiClient;
pub use config::{Config, GatewaySettings};
pub use gateway::{ExchangeRequest, Gateway};
pub use imaging::{InlineImage, MAX_IMAGE_BYTES};
pub use state::{ChatEntry, ChatRole, ImageRef};
pub use transcript::{Exchange, ExchangeTicket, TranscriptController, ERROR_MESSAGE};
