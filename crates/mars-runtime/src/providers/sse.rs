//! Line decoding for streamed HTTP bodies.
//!
//! Both SSE (`data: {...}`) and JSON-lines protocols arrive as a byte
//! stream with no alignment guarantees; this module re-frames them
//! into complete lines.

use std::time::Duration;

use async_stream::try_stream;
use futures::{Stream, StreamExt};

use super::ProviderError;

/// Re-frame a response body into complete lines, stripped of trailing
/// `\r\n`.
pub(crate) fn lines(
    response: reqwest::Response,
) -> impl Stream<Item = Result<String, ProviderError>> {
    try_stream! {
        let mut buf: Vec<u8> = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ProviderError::Stream(e.to_string()))?;
            buf.extend_from_slice(&chunk);
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                yield line;
            }
        }
        if !buf.is_empty() {
            let line = String::from_utf8_lossy(&buf).to_string();
            yield line;
        }
    }
}

/// Payload of an SSE `data:` line, if it is one.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Reject non-success responses, mapping 429 to [`ProviderError::RateLimited`]
/// (honouring `retry-after`) and everything else to [`ProviderError::Api`]
/// with the raw body as the message.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ProviderError::RateLimited { retry_after });
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api { status: status.as_u16(), message });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_data_extraction() {
        assert_eq!(sse_data("data: {\"x\":1}"), Some("{\"x\":1}"));
        assert_eq!(sse_data("data:[DONE]"), Some("[DONE]"));
        assert_eq!(sse_data("event: message_start"), None);
        assert_eq!(sse_data(""), None);
    }
}
