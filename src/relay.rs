//! Throttled relay of a streamed answer into chat message updates.
//!
//! Every update carries the whole answer so far, never a delta, so a lost or
//! repeated edit corrects itself on the next one.

use crate::config::DISCORD_MESSAGE_LIMIT;
use crate::devana::stream::ChatStream;
use crate::discord_text::split_message;
use crate::error::BotResult;
use async_trait::async_trait;
use futures::StreamExt;
use poise::serenity_prelude as serenity;
use serenity::{ChannelId, CreateMessage, EditMessage, Http, MessageId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Minimum spacing between two intermediate updates.
pub const UPDATE_INTERVAL: Duration = Duration::from_millis(1500);

/// Stream frames starting with this marker carry structured data, not text.
pub const CONTROL_PREFIX: &str = "[JSON]";

/// Receives the rendered answer as it grows.
#[async_trait]
pub trait RelaySink: Send {
    async fn update(&mut self, text: &str, is_final: bool) -> BotResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The stream ended and the final text was delivered.
    Completed(String),
    Cancelled,
}

pub struct StreamRelay {
    interval: Duration,
    cancel: CancellationToken,
}

impl StreamRelay {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            interval: UPDATE_INTERVAL,
            cancel,
        }
    }

    /// Drives `stream` to its end, pushing throttled updates into `sink`.
    ///
    /// Any `Err` item ends the stream. The stream is dropped, closing its
    /// connection, before this returns.
    pub async fn run<S>(&self, mut stream: ChatStream, sink: &mut S) -> BotResult<RelayOutcome>
    where
        S: RelaySink + ?Sized,
    {
        let mut text = String::new();
        let mut last_emit = Instant::now();
        let mut updates = 0usize;

        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Relay cancelled after {} updates", updates);
                    return Ok(RelayOutcome::Cancelled);
                }
                item = stream.next() => item,
            };

            match item {
                Some(Ok(frame)) => {
                    if frame.starts_with(CONTROL_PREFIX) {
                        continue;
                    }
                    text.push_str(&frame);
                    if last_emit.elapsed() >= self.interval {
                        if let Err(e) = sink.update(&unescape(&text), false).await {
                            warn!("Relay: intermediate update failed: {}", e);
                        }
                        last_emit = Instant::now();
                        updates += 1;
                    }
                }
                Some(Err(e)) => {
                    debug!("Relay: stream closed: {}", e);
                    break;
                }
                None => break,
            }
        }
        drop(stream);

        if self.cancel.is_cancelled() {
            return Ok(RelayOutcome::Cancelled);
        }
        let text = unescape(&text);
        sink.update(&text, true).await?;
        debug!("Relay finished after {} updates", updates + 1);
        Ok(RelayOutcome::Completed(text))
    }
}

/// Turns literal `\n` escape sequences into line breaks.
pub fn unescape(text: &str) -> String {
    text.replace("\\n", "\n")
}

/// Posts the answer as a reply, then edits it in place. Text beyond one
/// message goes into follow-up messages.
pub struct DiscordSink {
    http: Arc<Http>,
    channel_id: ChannelId,
    reply_to: MessageId,
    prefix: Option<String>,
    sent: Vec<(MessageId, String)>,
}

impl DiscordSink {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, reply_to: MessageId) -> Self {
        Self {
            http,
            channel_id,
            reply_to,
            prefix: None,
            sent: Vec::new(),
        }
    }

    /// Text shown above the answer.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn render(&self, text: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}\n\n{}", prefix, text),
            None => text.to_string(),
        }
    }
}

#[async_trait]
impl RelaySink for DiscordSink {
    async fn update(&mut self, text: &str, _is_final: bool) -> BotResult<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let rendered = self.render(text);

        for (index, chunk) in split_message(&rendered, DISCORD_MESSAGE_LIMIT)
            .into_iter()
            .enumerate()
        {
            match self.sent.get_mut(index) {
                Some((_, previous)) if *previous == chunk => {}
                Some((message_id, previous)) => {
                    self.channel_id
                        .edit_message(&self.http, *message_id, EditMessage::new().content(&chunk))
                        .await?;
                    *previous = chunk;
                }
                None => {
                    let mut builder = CreateMessage::new().content(&chunk);
                    if index == 0 {
                        builder = builder.reference_message((self.channel_id, self.reply_to));
                    }
                    let message = self.channel_id.send_message(&self.http, builder).await?;
                    self.sent.push((message.id, chunk));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BackendError, BotError};
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Default)]
    struct RecordingSink {
        started: Option<Instant>,
        updates: Vec<(u128, String, bool)>,
        fail_intermediate: bool,
    }

    #[async_trait]
    impl RelaySink for RecordingSink {
        async fn update(&mut self, text: &str, is_final: bool) -> BotResult<()> {
            let started = *self.started.get_or_insert_with(Instant::now);
            self.updates
                .push((started.elapsed().as_millis(), text.to_string(), is_final));
            if self.fail_intermediate && !is_final {
                return Err(BackendError::new("edit refused", 429).into());
            }
            Ok(())
        }
    }

    fn frame(text: &str) -> BotResult<String> {
        Ok(text.to_string())
    }

    fn closed() -> BotResult<String> {
        Err(BotError::Backend(BackendError::new("connection closed", 500)))
    }

    #[tokio::test(start_paused = true)]
    async fn coalesces_frames_within_interval() {
        let stream: ChatStream = Box::pin(async_stream::stream! {
            yield frame("A");
            sleep(Duration::from_millis(500)).await;
            yield frame("B");
            sleep(Duration::from_millis(1100)).await;
            yield frame("C");
            sleep(Duration::from_millis(100)).await;
            yield closed();
        });
        let mut sink = RecordingSink {
            started: Some(Instant::now()),
            ..Default::default()
        };

        let outcome = StreamRelay::new(CancellationToken::new())
            .run(stream, &mut sink)
            .await
            .unwrap();

        assert_eq!(outcome, RelayOutcome::Completed("ABC".into()));
        assert_eq!(sink.updates.len(), 2);
        assert_eq!(sink.updates[0], (1600, "ABC".to_string(), false));
        assert_eq!(sink.updates[1], (1700, "ABC".to_string(), true));
    }

    #[tokio::test(start_paused = true)]
    async fn control_frames_are_dropped_and_newlines_unescaped() {
        let stream: ChatStream = Box::pin(futures::stream::iter(vec![
            frame("line one\\n"),
            frame("[JSON]{\"sources\":[]}"),
            frame("line two"),
        ]));
        let mut sink = RecordingSink::default();

        let outcome = StreamRelay::new(CancellationToken::new())
            .run(stream, &mut sink)
            .await
            .unwrap();

        assert_eq!(outcome, RelayOutcome::Completed("line one\nline two".into()));
        assert_eq!(sink.updates.len(), 1);
        assert!(sink.updates[0].2);
    }

    #[tokio::test(start_paused = true)]
    async fn final_update_is_sent_for_empty_answer() {
        let stream: ChatStream = Box::pin(futures::stream::iter(vec![closed()]));
        let mut sink = RecordingSink::default();

        StreamRelay::new(CancellationToken::new())
            .run(stream, &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.updates.len(), 1);
        assert_eq!(sink.updates[0].1, "");
    }

    #[tokio::test(start_paused = true)]
    async fn intermediate_failures_do_not_stop_the_relay() {
        let stream: ChatStream = Box::pin(async_stream::stream! {
            sleep(Duration::from_millis(1500)).await;
            yield frame("A");
            sleep(Duration::from_millis(1500)).await;
            yield frame("B");
        });
        let mut sink = RecordingSink {
            fail_intermediate: true,
            ..Default::default()
        };

        let outcome = StreamRelay::new(CancellationToken::new())
            .run(stream, &mut sink)
            .await
            .unwrap();

        assert_eq!(outcome, RelayOutcome::Completed("AB".into()));
        let texts: Vec<_> = sink.updates.iter().map(|u| u.1.as_str()).collect();
        assert_eq!(texts, vec!["A", "AB", "AB"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_updates() {
        let cancel = CancellationToken::new();
        let stream: ChatStream = Box::pin(async_stream::stream! {
            yield frame("A");
            sleep(Duration::from_secs(60)).await;
            yield frame("never");
        });
        let mut sink = RecordingSink::default();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let outcome = StreamRelay::new(cancel).run(stream, &mut sink).await.unwrap();

        assert_eq!(outcome, RelayOutcome::Cancelled);
        assert!(sink.updates.is_empty());
    }
}
