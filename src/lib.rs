pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod providers;
pub mod translate;

pub use client::LlmClient;
pub use config::ClientConfig;
pub use error::{LlmError, Result};
pub use logging::SharedJournal;
pub use providers::{ProviderPreset, Vendor};
pub use translate::request::build_request;
pub use translate::streaming::{
    collect_stream, decode_lines, decode_stream, decoder_for, ChunkStream, Completion,
    StreamDecoder,
};
pub use translate::types::{
    FinishReason, GenerateOptions, Message, ReasoningChunk, Role, ToolCall, ToolDefinition,
    UnifiedChunk, Usage,
};
