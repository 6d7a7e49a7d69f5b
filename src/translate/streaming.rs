//! Drives a vendor decoder over a sequence of SSE payload lines.
//!
//! The SSE framing (`data: ` prefixes, blank separators) has already been
//! stripped by the line source; each item is one payload string or the
//! literal `[DONE]` sentinel. Decoding is pull-based: one line is read, at
//! most one [`UnifiedChunk`] comes out, and nothing is read ahead.

use std::pin::Pin;

use futures::stream::{Stream, StreamExt};

use super::anthropic::AnthropicDecoder;
use super::google::GoogleDecoder;
use super::openai_chat::OpenAiChatDecoder;
use super::openai_responses::OpenAiResponsesDecoder;
use super::types::{FinishReason, ToolCall, UnifiedChunk, Usage};
use crate::error::Result;
use crate::providers::Vendor;

/// Payload that ends every stream regardless of vendor.
pub const DONE_SENTINEL: &str = "[DONE]";

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<UnifiedChunk>> + Send>>;

/// A per-vendor state machine turning one payload into at most one chunk.
///
/// Implementations swallow malformed payloads (returning `Ok(None)`) and
/// only return `Err` for errors the vendor itself reported mid-stream.
pub trait StreamDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Option<UnifiedChunk>>;
}

impl<D: StreamDecoder + ?Sized> StreamDecoder for Box<D> {
    fn decode_line(&mut self, line: &str) -> Result<Option<UnifiedChunk>> {
        (**self).decode_line(line)
    }
}

/// A fresh decoder (with fresh stream state) for one generation call.
#[must_use]
pub fn decoder_for(vendor: Vendor) -> Box<dyn StreamDecoder + Send> {
    match vendor {
        Vendor::OpenAiChat => Box::new(OpenAiChatDecoder::new()),
        Vendor::OpenAiResponses => Box::new(OpenAiResponsesDecoder::new()),
        Vendor::Anthropic => Box::new(AnthropicDecoder::new()),
        Vendor::Google => Box::new(GoogleDecoder::new()),
    }
}

/// What the driver should do with one raw line.
enum Step {
    Skip,
    Done,
    Emit(UnifiedChunk),
    Fail(crate::error::LlmError),
}

fn step<D: StreamDecoder + ?Sized>(decoder: &mut D, raw: &str) -> Step {
    let line = raw.trim();
    if line.is_empty() {
        return Step::Skip;
    }
    if line == DONE_SENTINEL {
        return Step::Done;
    }
    match decoder.decode_line(line) {
        Ok(Some(chunk)) => Step::Emit(chunk),
        Ok(None) => Step::Skip,
        Err(e) => Step::Fail(e),
    }
}

/// Lazy iterator of chunks decoded from `lines`. Stops at `[DONE]` or after
/// the first error.
pub struct DecodeLines<I, D> {
    lines: I,
    decoder: D,
    finished: bool,
}

impl<I, D> Iterator for DecodeLines<I, D>
where
    I: Iterator,
    I::Item: AsRef<str>,
    D: StreamDecoder,
{
    type Item = Result<UnifiedChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let line = self.lines.next()?;
            match step(&mut self.decoder, line.as_ref()) {
                Step::Skip => {}
                Step::Done => self.finished = true,
                Step::Emit(chunk) => return Some(Ok(chunk)),
                Step::Fail(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

pub fn decode_lines<I, D>(lines: I, decoder: D) -> DecodeLines<I::IntoIter, D>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
    D: StreamDecoder,
{
    DecodeLines {
        lines: lines.into_iter(),
        decoder,
        finished: false,
    }
}

/// Async counterpart of [`decode_lines`] over a fallible line source.
///
/// A line-source error is yielded once and ends the stream, as does a
/// decoder error. Dropping the returned stream drops the decoder state.
pub fn decode_stream<S, D>(lines: S, mut decoder: D) -> ChunkStream
where
    S: Stream<Item = Result<String>> + Send + 'static,
    D: StreamDecoder + Send + 'static,
{
    Box::pin(async_stream::stream! {
        futures::pin_mut!(lines);

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };

            match step(&mut decoder, &line) {
                Step::Skip => {}
                Step::Done => {
                    tracing::debug!("Received [DONE], ending stream");
                    break;
                }
                Step::Emit(chunk) => yield Ok(chunk),
                Step::Fail(e) => {
                    tracing::warn!(error = %e, "Vendor reported an error mid-stream");
                    yield Err(e);
                    break;
                }
            }
        }
    })
}

/// Everything a finished stream produced, folded into one value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub reasoning: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
}

impl Completion {
    pub fn absorb(&mut self, chunk: UnifiedChunk) {
        self.content = chunk.content;
        if let Some(reasoning) = chunk.reasoning {
            self.reasoning = reasoning.content;
        }
        if let Some(calls) = chunk.tool_calls {
            self.tool_calls = calls;
        }
        if chunk.finish_reason.is_some() {
            self.finish_reason = chunk.finish_reason;
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }
    }
}

/// Consume a chunk stream to its end, returning the folded result.
pub async fn collect_stream(mut stream: ChunkStream) -> Result<Completion> {
    let mut completion = Completion::default();
    while let Some(chunk) = stream.next().await {
        completion.absorb(chunk?);
    }
    Ok(completion)
}
