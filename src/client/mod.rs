pub mod controller;
pub mod transcript;
pub mod transport;

pub use controller::{CancelHandle, ChatController, ChatState, TurnOutcome, ERROR_REPLY};
pub use transcript::{format_prompt, ChatMessage, Role, Transcript};
pub use transport::{connect, ChatError, ChatTransport, TextStream};
