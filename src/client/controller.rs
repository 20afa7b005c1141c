use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::client::transcript::{format_prompt, ChatMessage, Transcript};
use crate::client::transport::ChatTransport;

/// Shown in place of a reply that failed part way.
pub const ERROR_REPLY: &str = "Sorry, I couldn't generate a response. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    AwaitingResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank input or a turn already in flight; nothing changed.
    Ignored,
    Completed,
    Cancelled,
    Failed,
}

/// Stops the turn currently in flight on the controller it came from.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }
}

pub struct ChatController {
    transport: Arc<dyn ChatTransport>,
    transcript: Transcript,
    state: ChatState,
    cancel: Arc<watch::Sender<bool>>,
}

impl ChatController {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            transport,
            transcript: Transcript::new(),
            state: ChatState::Idle,
            cancel: Arc::new(cancel),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: self.cancel.clone(),
        }
    }

    /// Records the user's turn plus an empty assistant placeholder and
    /// returns the prompt to send, or `None` if the input is ignored.
    pub fn begin_turn(&mut self, input: &str) -> Option<String> {
        let input = input.trim();
        if input.is_empty() || self.state == ChatState::AwaitingResponse {
            return None;
        }

        self.transcript.push(ChatMessage::user(input));
        let prompt = format_prompt(self.transcript.messages());
        self.transcript.push(ChatMessage::assistant(""));

        self.state = ChatState::AwaitingResponse;
        self.cancel.send_replace(false);
        Some(prompt)
    }

    /// `text` is the whole reply so far, never a delta.
    pub fn apply_update(&mut self, text: &str) {
        if self.state == ChatState::AwaitingResponse {
            self.transcript.replace_last_assistant(text);
        }
    }

    pub fn finish_turn(&mut self, outcome: TurnOutcome) {
        if self.state != ChatState::AwaitingResponse {
            return;
        }

        match outcome {
            TurnOutcome::Ignored => return,
            TurnOutcome::Completed => {}
            TurnOutcome::Cancelled => {
                self.transcript.pop_last_assistant();
            }
            TurnOutcome::Failed => {
                self.transcript.replace_last_assistant(ERROR_REPLY);
            }
        }
        self.state = ChatState::Idle;
    }

    /// Runs one full turn. `on_update` sees the running reply after every
    /// update; it may call [`CancelHandle::cancel`].
    pub async fn send<F>(&mut self, input: &str, mut on_update: F) -> TurnOutcome
    where
        F: FnMut(&str),
    {
        let Some(prompt) = self.begin_turn(input) else {
            return TurnOutcome::Ignored;
        };

        let cancel_signal = cancelled(self.cancel.subscribe());

        let outcome = tokio::select! {
            biased;
            _ = cancel_signal => TurnOutcome::Cancelled,
            outcome = self.stream_reply(prompt, &mut on_update) => outcome,
        };
        let outcome = match outcome {
            TurnOutcome::Completed if self.cancel_requested() => TurnOutcome::Cancelled,
            outcome => outcome,
        };

        info!("Chat turn finished: {:?}", outcome);
        self.finish_turn(outcome);
        outcome
    }

    fn cancel_requested(&self) -> bool {
        *self.cancel.borrow()
    }

    async fn stream_reply<F>(&mut self, prompt: String, on_update: &mut F) -> TurnOutcome
    where
        F: FnMut(&str),
    {
        let mut stream = match self.transport.open(prompt).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Chat request failed: {}", e);
                return TurnOutcome::Failed;
            }
        };

        while let Some(update) = stream.next().await {
            // Ready items never yield to the select in `send`.
            if self.cancel_requested() {
                return TurnOutcome::Cancelled;
            }
            match update {
                Ok(text) => {
                    self.apply_update(&text);
                    on_update(&text);
                    if self.cancel_requested() {
                        return TurnOutcome::Cancelled;
                    }
                }
                Err(e) => {
                    warn!("Chat stream failed: {}", e);
                    return TurnOutcome::Failed;
                }
            }
        }

        TurnOutcome::Completed
    }
}

async fn cancelled(mut flag: watch::Receiver<bool>) {
    loop {
        if *flag.borrow_and_update() {
            return;
        }
        if flag.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
