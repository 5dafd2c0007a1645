//! Server-sent-events chat stream.
//!
//! The backend never closes the stream cleanly: the end of an answer shows up
//! as a transport error. Consumers treat any `Err` item as end-of-stream.
//! Dropping the stream closes the underlying connection.

use crate::error::{BackendError, BotError, BotResult};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tracing::debug;

pub type ChatStream = Pin<Box<dyn Stream<Item = BotResult<String>> + Send>>;

/// Incremental SSE parser yielding the `data` payload of each event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    buf: String,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feeds raw bytes; a UTF-8 sequence cut by a chunk boundary waits for
    /// the next chunk.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
        self.pending.drain(..valid);
        self.push(&text)
    }

    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buf.push_str(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buf.find('\n') {
            let line = self.buf[..pos].trim_end_matches('\r').to_string();
            self.buf.drain(..=pos);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }

        events
    }

    /// Flushes an event left open when the connection ends.
    pub fn finish(&mut self) -> Option<String> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            self.push(&format!("{rest}\n"));
        }
        if self.data.is_empty() {
            return None;
        }
        let event = self.data.join("\n");
        self.data.clear();
        Some(event)
    }
}

pub(crate) async fn open_chat_stream(request: reqwest::RequestBuilder) -> BotResult<ChatStream> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::new(body, status.as_u16()).into());
    }

    let mut bytes = response.bytes_stream();
    let stream = async_stream::stream! {
        let mut decoder = SseDecoder::default();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for event in decoder.push_bytes(&chunk) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    debug!("Devana: chat stream ended: {}", e);
                    if let Some(event) = decoder.finish() {
                        yield Ok(event);
                    }
                    yield Err(BotError::from(e));
                    return;
                }
            }
        }
        if let Some(event) = decoder.finish() {
            yield Ok(event);
        }
    };
    Ok(Box::pin(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_events_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push("data: Hel").is_empty());
        assert_eq!(decoder.push("lo\n\ndata: wor"), vec!["Hello".to_string()]);
        assert_eq!(decoder.push("ld\r\n\r\n"), vec!["world".to_string()]);
    }

    #[test]
    fn ignores_comments_and_other_fields() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(": keepalive\nevent: message\nid: 4\ndata: [JSON]{\"a\":1}\n\n");
        assert_eq!(events, vec!["[JSON]{\"a\":1}".to_string()]);
    }

    #[test]
    fn utf8_split_across_chunks_is_preserved() {
        let mut decoder = SseDecoder::default();
        let bytes = "data: café\n\n".as_bytes();
        let cut = bytes.len() - 3;
        assert!(decoder.push_bytes(&bytes[..cut]).is_empty());
        assert_eq!(decoder.push_bytes(&bytes[cut..]), vec!["café".to_string()]);
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push("data: one\ndata: two\n\n");
        assert_eq!(events, vec!["one\ntwo".to_string()]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push("data: tail").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
        assert_eq!(decoder.finish(), None);
    }
}
