mod common;

#[cfg(test)]
mod tests {
    use super::common::ScriptedProvider;
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use parley::client::transport::DirectTransport;
    use parley::client::{
        format_prompt, ChatController, ChatError, ChatMessage, ChatState, ChatTransport, Role,
        TextStream, TurnOutcome, ERROR_REPLY,
    };
    use parley::llm::framing::LineFraming;
    use std::sync::Arc;

    fn direct(provider: Arc<ScriptedProvider>) -> ChatController {
        ChatController::new(Arc::new(DirectTransport::new(provider, LineFraming::Buffered)))
    }

    /// Yields one running-text update and then never finishes.
    struct StallingTransport;

    #[async_trait]
    impl ChatTransport for StallingTransport {
        async fn open(&self, _prompt: String) -> Result<TextStream, ChatError> {
            Ok(stream::iter(vec![Ok("Hel".to_string())])
                .chain(stream::pending())
                .boxed())
        }
    }

    /// Hands over several updates at once, as when one chunk holds many records.
    struct BurstTransport;

    #[async_trait]
    impl ChatTransport for BurstTransport {
        async fn open(&self, _prompt: String) -> Result<TextStream, ChatError> {
            Ok(stream::iter(vec![
                Ok("Hel".to_string()),
                Ok("Hello".to_string()),
                Ok("Hello!".to_string()),
            ])
            .boxed())
        }
    }

    #[test]
    fn test_format_prompt_labels_every_turn() {
        let turns = vec![
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello! How can I help?"),
            ChatMessage::user("Tell me a joke"),
        ];
        let prompt = format_prompt(&turns);

        assert_eq!(
            prompt,
            "User: Hi\n\nAssistant: Hello! How can I help?\n\nUser: Tell me a joke\n\nAssistant:"
        );
        let labelled = prompt
            .split("\n\n")
            .filter(|block| block.starts_with("User: ") || block.starts_with("Assistant: "))
            .count();
        assert_eq!(labelled, turns.len());
        assert!(prompt.ends_with("Assistant:"));

        assert_eq!(format_prompt(&[]), "Assistant:");
    }

    #[tokio::test]
    async fn test_updates_are_cumulative_not_deltas() {
        let provider = ScriptedProvider::with_chunks(vec![
            "",
            "{\"response\":\"Hel\"}\n{\"response\":\"lo\"}\n",
            "{\"response\":\" world\"}\n{\"resp",
            "onse\":\"!\"}\n",
        ]);
        let mut controller = direct(provider.clone());

        let mut seen = Vec::new();
        let outcome = controller.send("  Say hello  ", |text| seen.push(text.to_string())).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(seen, vec!["Hel", "Hello", "Hello world", "Hello world!"]);
        assert_eq!(controller.state(), ChatState::Idle);

        let messages = controller.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::user("Say hello"));
        assert_eq!(messages[1], ChatMessage::assistant("Hello world!"));
        assert_eq!(provider.last_prompt().as_deref(), Some("User: Say hello\n\nAssistant:"));
    }

    #[tokio::test]
    async fn test_prompt_carries_whole_conversation() {
        let provider = ScriptedProvider::with_chunks(vec!["{\"response\":\"Fine.\"}\n"]);
        let mut controller = direct(provider.clone());

        controller.send("How are you?", |_| {}).await;
        controller.send("And today?", |_| {}).await;

        assert_eq!(
            provider.last_prompt().as_deref(),
            Some("User: How are you?\n\nAssistant: Fine.\n\nUser: And today?\n\nAssistant:")
        );
        assert_eq!(controller.transcript().len(), 4);
    }

    #[tokio::test]
    async fn test_blank_input_is_a_no_op() {
        let provider = ScriptedProvider::with_chunks(vec!["{\"response\":\"x\"}\n"]);
        let mut controller = direct(provider.clone());

        assert_eq!(controller.send("", |_| {}).await, TurnOutcome::Ignored);
        assert_eq!(controller.send(" \n\t ", |_| {}).await, TurnOutcome::Ignored);

        assert!(controller.transcript().is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_send_while_awaiting_is_ignored() {
        let provider = ScriptedProvider::with_chunks(vec![]);
        let mut controller = direct(provider.clone());

        assert!(controller.begin_turn("first").is_some());
        assert_eq!(controller.state(), ChatState::AwaitingResponse);
        let before = controller.transcript().messages().to_vec();

        assert!(controller.begin_turn("second").is_none());
        assert_eq!(controller.send("second", |_| {}).await, TurnOutcome::Ignored);

        assert_eq!(controller.transcript().messages(), before.as_slice());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_removes_only_the_placeholder() {
        let mut controller = ChatController::new(Arc::new(StallingTransport));
        let cancel = controller.cancel_handle();

        let mut before_cancel = 0;
        let outcome = controller
            .send("Write an essay", |text| {
                assert_eq!(text, "Hel");
                before_cancel += 1;
                cancel.cancel();
            })
            .await;

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert_eq!(before_cancel, 1);
        assert_eq!(controller.state(), ChatState::Idle);

        let messages = controller.transcript().messages();
        assert_eq!(messages, &[ChatMessage::user("Write an essay")]);
    }

    #[tokio::test]
    async fn test_cancel_wins_over_updates_already_buffered() {
        let mut controller = ChatController::new(Arc::new(BurstTransport));
        let cancel = controller.cancel_handle();

        let mut seen = Vec::new();
        let outcome = controller
            .send("hi", |text| {
                seen.push(text.to_string());
                cancel.cancel();
            })
            .await;

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert_eq!(seen, vec!["Hel"]);
        assert_eq!(controller.state(), ChatState::Idle);
        assert_eq!(controller.transcript().messages(), &[ChatMessage::user("hi")]);
    }

    #[tokio::test]
    async fn test_cancel_on_last_update_still_cancels() {
        let provider = ScriptedProvider::with_chunks(vec!["{\"response\":\"only\"}\n"]);
        let mut controller = direct(provider);
        let cancel = controller.cancel_handle();

        let outcome = controller.send("hi", |_| cancel.cancel()).await;

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert_eq!(controller.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_handle_is_reset_between_turns() {
        let provider = ScriptedProvider::with_chunks(vec!["{\"response\":\"ok\"}\n"]);
        let mut controller = direct(provider);

        // A stale cancel from an idle moment must not kill the next turn.
        controller.cancel_handle().cancel();
        assert_eq!(controller.send("hi", |_| {}).await, TurnOutcome::Completed);
        assert_eq!(controller.transcript().last(), Some(&ChatMessage::assistant("ok")));
    }

    #[tokio::test]
    async fn test_connection_drop_leaves_error_reply_and_recovers() {
        let provider = ScriptedProvider::dropping_after(vec!["{\"response\":\"Hel\"}\n"]);
        let mut controller = direct(provider.clone());

        let outcome = controller.send("Hello?", |_| {}).await;
        assert_eq!(outcome, TurnOutcome::Failed);
        assert_eq!(controller.state(), ChatState::Idle);

        let assistant: Vec<_> = controller
            .transcript()
            .messages()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .collect();
        assert_eq!(assistant.len(), 1);
        assert_eq!(assistant[0].content, ERROR_REPLY);

        // The controller keeps working after a failure.
        assert_eq!(controller.send("Again?", |_| {}).await, TurnOutcome::Failed);
        assert_eq!(controller.transcript().len(), 4);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_the_turn() {
        let mut controller = direct(ScriptedProvider::unreachable());

        assert_eq!(controller.send("Hello?", |_| {}).await, TurnOutcome::Failed);
        assert_eq!(controller.transcript().last(), Some(&ChatMessage::assistant(ERROR_REPLY)));
    }

    #[tokio::test]
    async fn test_unparseable_records_do_not_fail_the_turn() {
        let provider = ScriptedProvider::with_chunks(vec!["{oops}\n{\"response\":\"fine\"}\n"]);
        let mut controller = direct(provider);

        assert_eq!(controller.send("hi", |_| {}).await, TurnOutcome::Completed);
        assert_eq!(controller.transcript().last(), Some(&ChatMessage::assistant("fine")));
    }
}
