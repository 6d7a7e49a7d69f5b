//! HTTP transport: sends the vendor request and turns the SSE response body
//! into a [`ChunkStream`].

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{LlmError, Result};
use crate::logging::{GenerationRecord, SharedJournal};
use crate::providers::Vendor;
use crate::translate::request::build_request;
use crate::translate::streaming::{collect_stream, decode_stream, decoder_for, ChunkStream, Completion};
use crate::translate::types::{GenerateOptions, Message};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// SSE payload strings, one per event, with framing already removed.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

pub struct LlmClient {
    config: ClientConfig,
    http: reqwest::Client,
    journal: Option<SharedJournal>,
}

impl LlmClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            http,
            journal: None,
        })
    }

    /// Record every finished generation in `journal`.
    ///
    /// A generation is recorded once its stream has been read to the end.
    #[must_use]
    pub fn with_journal(mut self, journal: SharedJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a streaming generation.
    ///
    /// Fails with [`LlmError::Api`] before yielding anything if the vendor
    /// answers with a non-2xx status.
    pub async fn stream(&self, messages: &[Message], options: &GenerateOptions) -> Result<ChunkStream> {
        let vendor = self.config.vendor()?;
        let api_key = self.config.resolve_api_key()?;
        let base_url = self.config.effective_base_url()?;
        let url = endpoint_url(vendor, &base_url, &options.model);
        let body = build_request(vendor, messages, options)?;

        info!(%vendor, model = %options.model, %url, "Starting generation");

        let request = self.http.post(&url).json(&body);
        let response = with_auth(request, vendor, &api_key).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %truncate(&text, 500), "Vendor returned an error status");
            return Err(LlmError::api(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
            ));
        }

        let chunks = decode_stream(sse_lines(response.bytes_stream()), decoder_for(vendor));

        let Some(journal) = self.journal.clone() else {
            return Ok(chunks);
        };
        Ok(journaled(chunks, journal, vendor, options.model.clone()))
    }

    /// Stream a generation to its end and return the folded result.
    pub async fn generate(&self, messages: &[Message], options: &GenerateOptions) -> Result<Completion> {
        let completion = collect_stream(self.stream(messages, options).await?).await?;
        info!(
            finish_reason = ?completion.finish_reason,
            tool_calls = completion.tool_calls.len(),
            "Generation completed"
        );
        Ok(completion)
    }
}

/// Pass `chunks` through, then write one journal record when they run out.
///
/// Chat streams end with a finish chunk followed by a usage trailer, so the
/// outcome is folded over the whole stream rather than taken from the first
/// terminal chunk. Streams that end in an error are not recorded.
fn journaled(mut chunks: ChunkStream, journal: SharedJournal, vendor: Vendor, model: String) -> ChunkStream {
    Box::pin(async_stream::stream! {
        let mut completion = Completion::default();
        let mut failed = false;

        while let Some(item) = chunks.next().await {
            match &item {
                Ok(chunk) => completion.absorb(chunk.clone()),
                Err(_) => failed = true,
            }
            yield item;
        }

        if !failed && (completion.finish_reason.is_some() || completion.usage.is_some()) {
            debug!(finish_reason = ?completion.finish_reason, "Generation finished");
            journal.record(GenerationRecord::new(vendor, model).with_completion(&completion));
        }
    })
}

/// The streaming endpoint for `vendor` under `base_url`.
#[must_use]
pub fn endpoint_url(vendor: Vendor, base_url: &str, model: &str) -> String {
    let base = base_url.trim_end_matches('/');
    match vendor {
        Vendor::OpenAiChat => format!("{base}/chat/completions"),
        Vendor::OpenAiResponses => format!("{base}/responses"),
        Vendor::Anthropic => format!("{base}/v1/messages"),
        Vendor::Google => format!("{base}/models/{model}:streamGenerateContent?alt=sse"),
    }
}

fn with_auth(request: reqwest::RequestBuilder, vendor: Vendor, api_key: &str) -> reqwest::RequestBuilder {
    match vendor {
        Vendor::OpenAiChat | Vendor::OpenAiResponses => request.bearer_auth(api_key),
        Vendor::Anthropic => request
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION),
        Vendor::Google => request.header("x-goog-api-key", api_key),
    }
}

/// Frame a raw SSE byte stream into payload strings.
///
/// Events may span network chunks; `eventsource-stream` buffers until an
/// event is complete. Only the `data` field is kept since every vendor
/// repeats the event type inside the payload.
pub fn sse_lines<S, E>(bytes: S) -> LineStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(bytes.eventsource().map(|event| match event {
        Ok(event) => Ok(event.data),
        Err(e) => Err(LlmError::stream(format!("SSE error: {e}"))),
    }))
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_chunks(parts: &[&'static str]) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
        futures::stream::iter(parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect::<Vec<_>>())
    }

    #[test]
    fn test_sse_lines_reassembles_split_events() {
        let lines = sse_lines(byte_chunks(&[
            "data: {\"a\"",
            ":1}\n\n",
            "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
            "data: [DONE]\n\n",
        ]));
        let lines: Vec<String> = tokio_test::block_on(lines.collect::<Vec<_>>())
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(lines, vec!["{\"a\":1}", "{\"type\":\"message_stop\"}", "[DONE]"]);
    }

    #[test]
    fn test_chat_stream_is_journaled_once_with_usage() {
        let dir = tempfile::TempDir::new().unwrap();
        let journal = SharedJournal::open(dir.path().join("journal.jsonl")).unwrap();

        let lines = sse_lines(byte_chunks(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":2,\"total_tokens\":6}}\n\n",
            "data: [DONE]\n\n",
        ]));
        let chunks = decode_stream(lines, decoder_for(Vendor::OpenAiChat));
        let stream = journaled(chunks, journal.clone(), Vendor::OpenAiChat, "gpt-test".to_string());
        let completion = tokio_test::block_on(collect_stream(stream)).unwrap();
        assert_eq!(completion.content, "Hi");

        let recorded = journal.recent(10);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].model, "gpt-test");
        assert_eq!(recorded[0].usage.as_ref().unwrap().total_tokens, Some(6));
    }

    #[test]
    fn test_failed_stream_is_not_journaled() {
        let dir = tempfile::TempDir::new().unwrap();
        let journal = SharedJournal::open(dir.path().join("journal.jsonl")).unwrap();

        let lines = sse_lines(byte_chunks(&[
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":1}}\n\n",
            "data: {\"type\":\"error\",\"error\":{\"type\":\"api_error\",\"message\":\"boom\"}}\n\n",
        ]));
        let chunks = decode_stream(lines, decoder_for(Vendor::Anthropic));
        let stream = journaled(chunks, journal.clone(), Vendor::Anthropic, "claude".to_string());
        assert!(tokio_test::block_on(collect_stream(stream)).is_err());
        assert!(journal.recent(10).is_empty());
    }

    #[test]
    fn test_endpoint_urls() {
        assert_eq!(
            endpoint_url(Vendor::OpenAiChat, "https://api.openai.com/v1/", "gpt-4o"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint_url(Vendor::OpenAiResponses, "https://api.openai.com/v1", "gpt-4o"),
            "https://api.openai.com/v1/responses"
        );
        assert_eq!(
            endpoint_url(Vendor::Anthropic, "https://api.anthropic.com", "claude"),
            "https://api.anthropic.com/v1/messages"
        );
        assert_eq!(
            endpoint_url(
                Vendor::Google,
                "https://generativelanguage.googleapis.com/v1beta",
                "gemini-2.5-flash"
            ),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("héllo", 2), "h");
    }

    #[test]
    fn test_new_client_keeps_config() {
        let client = LlmClient::new(ClientConfig::for_provider("groq")).unwrap();
        assert_eq!(client.config().provider.name, "groq");
    }
}
