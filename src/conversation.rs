//! The chat turn state machine.
//!
//! This module is UI-agnostic: it owns the transcript and the request gate and
//! hands completion results back through the event channel, so only the task
//! that owns the [`Conversation`] ever mutates it.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::gemini::Completion;
use crate::markup;
use crate::tui::AppEvent;

/// Who a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    Assistant,
}

/// One entry in the transcript. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    origin: Origin,
    text: String,
    rendered_markup: String,
}

impl Message {
    /// User text is shown verbatim, so only escaping and line breaks apply.
    pub fn user(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            origin: Origin::User,
            rendered_markup: markup::plain_markup(&text),
            text,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            origin: Origin::Assistant,
            rendered_markup: markup::to_markup(&text),
            text,
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rendered_markup(&self) -> &str {
        &self.rendered_markup
    }
}

pub struct Conversation {
    transcript: Vec<Message>,
    awaiting_response: bool,
    completion: Arc<dyn Completion>,
    events: UnboundedSender<AppEvent>,
}

impl Conversation {
    pub fn new(completion: Arc<dyn Completion>, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            transcript: Vec::new(),
            awaiting_response: false,
            completion,
            events,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    /// Input is accepted exactly when no request is in flight.
    pub fn input_enabled(&self) -> bool {
        !self.awaiting_response
    }

    /// Start a turn with `raw_text`.
    ///
    /// Returns `false` without side effects if the text is blank or a reply is
    /// still pending. Otherwise appends the user message, closes the gate and
    /// spawns one completion request whose result comes back as
    /// [`AppEvent::Reply`].
    pub fn submit(&mut self, raw_text: &str) -> bool {
        if raw_text.trim().is_empty() {
            return false;
        }
        if self.awaiting_response {
            debug!("submit ignored while a reply is pending");
            return false;
        }

        self.transcript.push(Message::user(raw_text));
        self.awaiting_response = true;

        let prompt = raw_text.to_string();
        let completion = Arc::clone(&self.completion);
        let events = self.events.clone();
        info!(chars = prompt.chars().count(), "dispatching completion request");

        tokio::spawn(async move {
            let reply = match completion.complete(&prompt).await {
                Ok(text) => text,
                Err(err) => {
                    warn!("completion failed: {err:#}");
                    format!("Error: {err:#}")
                }
            };
            if events.send(AppEvent::Reply(reply)).is_err() {
                debug!("event loop closed before the reply arrived");
            }
        });

        true
    }

    /// Apply a reply on the owning task: append it and reopen the gate.
    pub fn deliver(&mut self, reply: String) {
        if !self.awaiting_response {
            warn!("reply delivered with no request in flight");
        }
        self.transcript.push(Message::assistant(reply));
        self.awaiting_response = false;
        info!(messages = self.transcript.len(), "reply delivered");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{mpsc, Notify};

    /// Completion stub that answers with a fixed reply, optionally holding
    /// each request until released.
    pub(crate) struct StubCompletion {
        reply: std::result::Result<String, String>,
        hold: Option<Arc<Notify>>,
        pub calls: AtomicUsize,
        in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl StubCompletion {
        pub(crate) fn ok(text: &str) -> Self {
            Self::with_reply(Ok(text.to_string()))
        }

        pub(crate) fn err(message: &str) -> Self {
            Self::with_reply(Err(message.to_string()))
        }

        fn with_reply(reply: std::result::Result<String, String>) -> Self {
            Self {
                reply,
                hold: None,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        pub(crate) fn held(mut self, release: Arc<Notify>) -> Self {
            self.hold = Some(release);
            self
        }
    }

    #[async_trait]
    impl Completion for StubCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(release) = &self.hold {
                release.notified().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.reply.clone().map_err(|message| anyhow!(message))
        }
    }

    pub(crate) fn conversation_with(
        stub: Arc<StubCompletion>,
    ) -> (Conversation, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Conversation::new(stub, tx), rx)
    }

    async fn next_reply(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> String {
        match rx.recv().await {
            Some(AppEvent::Reply(reply)) => reply,
            other => panic!("expected a reply event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_turn() {
        let stub = Arc::new(StubCompletion::ok("Hi there"));
        let (mut conversation, mut rx) = conversation_with(stub);

        assert!(conversation.submit("Hello"));
        assert!(!conversation.input_enabled());

        let reply = next_reply(&mut rx).await;
        conversation.deliver(reply);

        let transcript = conversation.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].origin(), Origin::User);
        assert_eq!(transcript[0].text(), "Hello");
        assert_eq!(transcript[1].origin(), Origin::Assistant);
        assert_eq!(transcript[1].text(), "Hi there");
        assert!(conversation.input_enabled());
    }

    #[tokio::test]
    async fn test_error_surfaces_as_assistant_message() {
        let stub = Arc::new(StubCompletion::err("timeout"));
        let (mut conversation, mut rx) = conversation_with(stub);

        assert!(conversation.submit("Hello"));
        let reply = next_reply(&mut rx).await;
        conversation.deliver(reply);

        let last = conversation.transcript().last().cloned();
        assert_eq!(last, Some(Message::assistant("Error: timeout")));
        assert!(conversation.input_enabled());
    }

    #[tokio::test]
    async fn test_blank_submit_is_noop() {
        let stub = Arc::new(StubCompletion::ok("unused"));
        let (mut conversation, _rx) = conversation_with(Arc::clone(&stub));

        for blank in ["", "   ", "\n\t "] {
            assert!(!conversation.submit(blank));
        }
        assert!(conversation.transcript().is_empty());
        assert!(conversation.input_enabled());

        tokio::task::yield_now().await;
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_submit_keeps_closed_gate_closed() {
        let release = Arc::new(Notify::new());
        let stub = Arc::new(StubCompletion::ok("done").held(Arc::clone(&release)));
        let (mut conversation, mut rx) = conversation_with(stub);

        assert!(conversation.submit("first"));
        assert!(!conversation.submit("  "));
        assert!(conversation.awaiting_response());
        assert_eq!(conversation.transcript().len(), 1);

        release.notify_one();
        let reply = next_reply(&mut rx).await;
        conversation.deliver(reply);
    }

    #[tokio::test]
    async fn test_single_request_in_flight() {
        let release = Arc::new(Notify::new());
        let stub = Arc::new(StubCompletion::ok("reply").held(Arc::clone(&release)));
        let (mut conversation, mut rx) = conversation_with(Arc::clone(&stub));

        for turn in 0..3 {
            assert!(conversation.submit(&format!("question {turn}")));
            // Further submissions bounce off the closed gate.
            assert!(!conversation.submit("again"));
            assert!(!conversation.submit("and again"));
            assert!(!conversation.input_enabled());

            release.notify_one();
            let reply = next_reply(&mut rx).await;
            assert!(!conversation.input_enabled());
            conversation.deliver(reply);
            assert!(conversation.input_enabled());
        }

        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
        assert_eq!(stub.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(conversation.transcript().len(), 6);
    }

    #[tokio::test]
    async fn test_reply_markup_is_converted() {
        let stub = Arc::new(StubCompletion::ok("**a** *b*"));
        let (mut conversation, mut rx) = conversation_with(stub);

        conversation.submit("style please");
        let reply = next_reply(&mut rx).await;
        conversation.deliver(reply);

        let reply = &conversation.transcript()[1];
        assert_eq!(reply.text(), "**a** *b*");
        assert_eq!(reply.rendered_markup(), "<b>a</b> <i>b</i>");
    }

    #[test]
    fn test_user_message_markup_is_escaped_only() {
        let message = Message::user("*x* < y\nz");
        assert_eq!(message.rendered_markup(), "*x* &lt; y<br>z");
    }
}
