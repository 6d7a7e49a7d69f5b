//! Request building and stream decoding for every supported vendor.
//!
//! Outbound, [`request`] turns the unified message list into a vendor body.
//! Inbound, one decoder per vendor consumes SSE payload lines and keeps a
//! [`state::UnifiedStreamState`] up to date, yielding [`types::UnifiedChunk`]s.
//! Nothing in here performs I/O.

pub mod anthropic;
pub mod anthropic_types;
pub mod google;
pub mod google_types;
pub mod openai_chat;
pub mod openai_responses;
pub mod openai_types;
pub mod request;
pub mod state;
pub mod streaming;
pub mod types;
