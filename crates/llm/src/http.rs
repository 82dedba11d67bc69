//! Shared HTTP helpers for provider clients.

use crate::client::{LlmStream, LlmStreamChunk};
use futures::StreamExt;
use orgmem_core::{AppResult, ProviderError};
use std::collections::VecDeque;
use std::time::Duration;

/// Default request timeout for provider calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Build a reqwest client with the given timeout.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Transport(format!("Failed to build HTTP client: {}", e)))
}

/// Classify a reqwest transport error.
pub fn classify_reqwest(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else if err.is_decode() {
        ProviderError::InvalidResponse(err.to_string())
    } else if let Some(status) = err.status() {
        ProviderError::from_status(status.as_u16(), err.to_string())
    } else {
        ProviderError::Transport(err.to_string())
    }
}

/// Turn a non-success response into a provider error, consuming the body.
pub async fn error_from_response(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    tracing::warn!(provider, status = status.as_u16(), "Provider returned an error status");
    tracing::debug!(provider, body = %body, "Provider error body");

    ProviderError::from_status(status.as_u16(), format!("{} API error: {}", provider, body))
}

/// Accumulates raw byte fragments and yields complete lines.
///
/// Streaming APIs deliver newline-delimited payloads, but a network chunk may
/// end in the middle of a line or of a multibyte character, so bytes are only
/// decoded once a whole line has arrived.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Feed bytes and return every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, ProviderError> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(line) = decode_line(raw)? {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    /// Return whatever is left once the byte stream ends.
    pub fn finish(&mut self) -> Result<Option<String>, ProviderError> {
        decode_line(std::mem::take(&mut self.pending))
    }
}

fn decode_line(raw: Vec<u8>) -> Result<Option<String>, ProviderError> {
    let line = String::from_utf8(raw)
        .map_err(|e| ProviderError::InvalidResponse(format!("Stream line is not UTF-8: {}", e)))?;
    let line = line.trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}

/// Turn a streaming HTTP body into an `LlmStream`.
///
/// `parse` maps one complete line to a fragment, or `None` to skip it
/// (keep-alives, SSE comments, the `[DONE]` sentinel). A transport error ends
/// the stream after being yielded.
pub fn line_stream<F>(response: reqwest::Response, parse: F) -> LlmStream
where
    F: FnMut(&str) -> Option<AppResult<LlmStreamChunk>> + Send + 'static,
{
    let state = LineState {
        bytes: Box::pin(response.bytes_stream()),
        buffer: LineBuffer::default(),
        ready: VecDeque::new(),
        parse,
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => match state.buffer.push(&bytes) {
                    Ok(lines) => {
                        for line in lines {
                            if let Some(item) = (state.parse)(&line) {
                                state.ready.push_back(item);
                            }
                        }
                    }
                    Err(e) => {
                        state.finished = true;
                        state.ready.push_back(Err(e.into()));
                    }
                },
                Some(Err(e)) => {
                    state.finished = true;
                    state.ready.push_back(Err(classify_reqwest(e).into()));
                }
                None => {
                    state.finished = true;
                    match state.buffer.finish() {
                        Ok(Some(line)) => {
                            if let Some(item) = (state.parse)(&line) {
                                state.ready.push_back(item);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => state.ready.push_back(Err(e.into())),
                    }
                }
            }
        }
    }))
}

struct LineState<S, F> {
    bytes: S,
    buffer: LineBuffer,
    ready: VecDeque<AppResult<LlmStreamChunk>>,
    parse: F,
    finished: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_split_across_chunks() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"{\"a\":").unwrap().is_empty());
        let lines = buffer.push(b"1}\n{\"b\":2}\n{\"c\"").unwrap();
        assert_eq!(lines, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);
        assert_eq!(buffer.finish().unwrap(), Some("{\"c\"".to_string()));
        assert_eq!(buffer.finish().unwrap(), None);
    }

    #[test]
    fn test_line_buffer_skips_blank_lines() {
        let mut buffer = LineBuffer::default();
        let lines = buffer.push(b"data: x\n\n\ndata: y\n").unwrap();
        assert_eq!(lines, vec!["data: x".to_string(), "data: y".to_string()]);
    }

    #[test]
    fn test_line_buffer_keeps_multibyte_char_split_across_chunks() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"data: caf\xC3").unwrap().is_empty());
        let lines = buffer.push(b"\xA9\n").unwrap();
        assert_eq!(lines, vec!["data: café".to_string()]);
        assert_eq!(buffer.finish().unwrap(), None);
    }

    #[test]
    fn test_line_buffer_rejects_invalid_utf8_line() {
        let mut buffer = LineBuffer::default();
        let err = buffer.push(b"data: \xFF\xFE\n").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));

        buffer.push(b"tail \xC3").unwrap();
        assert!(buffer.finish().is_err());
    }
}
