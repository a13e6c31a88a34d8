use std::sync::Arc;

use codebuddy::agent::{Agent, PromptBlock, StopReason};
use codebuddy::llm::{AssistantMessage, Message};
use codebuddy::session::{CompactionConfig, compact};
use tempfile::TempDir;

use crate::scripted::{
    RecordingSink, ScriptedProvider, Step, StubTool, context, registry, text_reply, tool_reply,
};

fn exchanges(count: usize) -> Vec<Message> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("question {i}"))
            } else {
                Message::from(AssistantMessage::text_only(format!("answer {i}")))
            }
        })
        .collect()
}

#[tokio::test]
async fn system_plus_nine_messages_stays_uncompacted_on_next_turn() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut history = vec![Message::system("sys")];
    history.extend(exchanges(9));
    history.push(Message::user("one more"));
    assert_eq!(history.len(), 11);

    let config = CompactionConfig::default();
    let result = compact(&provider, history.clone(), 10_000_000, &config).await;

    assert_eq!(result, history);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn turn_below_token_limit_leaves_history_whole() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Reply(
        text_reply("ok").with_usage(150_000, 10),
    )]));
    let agent = Agent::new(context(Arc::clone(&provider), registry(Vec::new())), "sys");
    let session = agent.create_session(tmp.path(), None).await.unwrap();
    session.extend_history(exchanges(30)).await;

    agent
        .submit_turn(
            session.id(),
            &[PromptBlock::text("next")],
            Arc::new(RecordingSink::default()),
        )
        .await
        .unwrap();

    assert_eq!(session.history().await.len(), 33);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn compaction_mid_turn_keeps_tool_pairing_and_tail() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        // Over 80% of the 200K window: triggers compaction after this reply.
        Step::Reply(tool_reply(&[("a", "search")]).with_usage(170_000, 50)),
        // Summarization request.
        Step::Reply(text_reply("We discussed twenty questions.")),
        Step::Reply(text_reply("done").with_usage(20_000, 5)),
    ]));
    let tools = registry(vec![Box::new(StubTool::ok("search", "3 matches"))]);
    let agent = Agent::new(context(Arc::clone(&provider), tools), "sys");
    let session = agent.create_session(tmp.path(), None).await.unwrap();
    session.extend_history(exchanges(20)).await;

    let outcome = agent
        .submit_turn(
            session.id(),
            &[PromptBlock::text("search please")],
            Arc::new(RecordingSink::default()),
        )
        .await
        .unwrap();
    assert_eq!(outcome.stop_reason, StopReason::Completed);
    assert_eq!(outcome.model_calls, 2);

    let history = session.history().await;
    // system + digest + 10 kept + tool result + final reply
    assert_eq!(history.len(), 14);
    assert_eq!(history[0], Message::system("sys"));
    assert!(history[1].is_system());
    let digest = history[1].text();
    assert!(digest.starts_with("[CONVERSATION SUMMARY - Previous 12 messages]"));
    assert!(digest.contains("We discussed twenty questions."));

    // The tail ends with the tool request and its result stays adjacent.
    assert_eq!(history[10], Message::user("search please"));
    assert!(
        history[11]
            .as_assistant()
            .is_some_and(AssistantMessage::has_tool_calls)
    );
    assert_eq!(history[12], Message::tool_result("a", "3 matches"));
    assert_eq!(history[13].text(), "done");

    // The summarization call was a standalone single-message request.
    let seen = provider.seen();
    assert_eq!(seen[1].len(), 1);
    assert!(seen[1][0].text().contains("[User]: question 10"));
    // The follow-up model call saw the compacted history.
    assert_eq!(seen[2].len(), 13);
}

#[tokio::test]
async fn failed_summary_still_compacts() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Reply(text_reply("big").with_usage(190_000, 5)),
        Step::Fail("rate limited".into()),
    ]));
    let agent = Agent::new(context(Arc::clone(&provider), registry(Vec::new())), "sys");
    let session = agent.create_session(tmp.path(), None).await.unwrap();
    session.extend_history(exchanges(14)).await;

    let outcome = agent
        .submit_turn(
            session.id(),
            &[PromptBlock::text("hi")],
            Arc::new(RecordingSink::default()),
        )
        .await
        .unwrap();
    assert_eq!(outcome.stop_reason, StopReason::Completed);

    let history = session.history().await;
    assert_eq!(history.len(), 12);
    assert!(
        history[1]
            .text()
            .contains("[Previous conversation with 6 messages - summarization failed: rate limited]")
    );
    assert_eq!(history[11].text(), "big");
}
