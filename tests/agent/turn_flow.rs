use std::sync::Arc;

use codebuddy::agent::{Agent, PromptBlock, SessionUpdate, StopReason, ToolCallStatus};
use codebuddy::error::{BuddyError, TurnError};
use codebuddy::llm::{ContentBlock, Message};
use tempfile::TempDir;

use crate::scripted::{
    ClosedSink, RecordingSink, ScriptedProvider, Step, StubTool, context, registry, text_reply,
    tool_reply,
};

const ABORTED: &str = "Error: Tool call not executed because the turn was aborted";

fn search_and_write() -> codebuddy::tools::ToolRegistry {
    registry(vec![
        Box::new(StubTool::ok("search", "3 matches")),
        Box::new(StubTool::failing("write", "permission denied")),
    ])
}

#[tokio::test]
async fn tool_failures_become_results_and_the_loop_continues() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Reply(tool_reply(&[("a", "search"), ("b", "write")])),
        Step::Reply(text_reply("done")),
    ]));
    let agent = Agent::new(context(Arc::clone(&provider), search_and_write()), "sys");
    let session = agent.create_session(tmp.path(), None).await.unwrap();
    let sink = Arc::new(RecordingSink::default());

    let outcome = agent
        .submit_turn(session.id(), &[PromptBlock::text("go")], sink.clone())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Completed);
    assert_eq!(outcome.model_calls, 2);

    let history = session.history().await;
    assert_eq!(history.len(), 6);
    assert_eq!(history[0], Message::system("sys"));
    assert_eq!(history[1], Message::user("go"));
    assert_eq!(history[3], Message::tool_result("a", "3 matches"));
    assert_eq!(history[4], Message::tool_result("b", "Error: permission denied"));
    assert_eq!(history[5].text(), "done");

    // The second model call sees both results, in request order.
    let seen = provider.seen();
    assert_eq!(seen[1].len(), 5);
    assert_eq!(seen[1][3], Message::tool_result("a", "3 matches"));
    assert_eq!(seen[1][4], Message::tool_result("b", "Error: permission denied"));
}

#[tokio::test]
async fn updates_follow_tool_lifecycle_order() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Reply(tool_reply(&[("a", "search"), ("b", "write")])),
        Step::Reply(text_reply("done")),
    ]));
    let agent = Agent::new(context(provider, search_and_write()), "sys");
    let session = agent.create_session(tmp.path(), None).await.unwrap();
    let sink = Arc::new(RecordingSink::default());

    agent
        .submit_turn(session.id(), &[PromptBlock::text("go")], sink.clone())
        .await
        .unwrap();

    let updates = sink.updates();
    assert_eq!(updates.len(), 7);

    let mut ids = Vec::new();
    for (round, title) in [(0, "Calling search"), (3, "Calling write")] {
        let SessionUpdate::ToolCall {
            tool_call_id,
            title: got,
            status,
            ..
        } = &updates[round]
        else {
            panic!("expected tool_call at {round}");
        };
        assert_eq!(got, title);
        assert_eq!(*status, ToolCallStatus::Pending);
        assert!(matches!(
            &updates[round + 1],
            SessionUpdate::ToolCallUpdate { tool_call_id: id, status: ToolCallStatus::InProgress, .. }
                if id == tool_call_id
        ));
        assert!(matches!(
            &updates[round + 2],
            SessionUpdate::ToolCallUpdate { tool_call_id: id, status: ToolCallStatus::Completed, .. }
                if id == tool_call_id
        ));
        ids.push(tool_call_id.clone());
    }
    // Client-facing ids are fresh, not the model's.
    assert_ne!(ids[0], ids[1]);
    assert!(ids.iter().all(|id| id.starts_with("tool_")));
    assert!(matches!(updates[6], SessionUpdate::AgentMessageChunk { .. }));
}

#[tokio::test]
async fn reasoning_and_text_stream_before_tools_run() {
    let tmp = TempDir::new().unwrap();
    let mut first = tool_reply(&[("a", "search")]);
    first.content = vec![
        ContentBlock::reasoning("need to look"),
        ContentBlock::text("Searching."),
    ];
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Reply(first),
        Step::Reply(text_reply("found it")),
    ]));
    let agent = Agent::new(context(provider, search_and_write()), "");
    let session = agent.create_session(tmp.path(), None).await.unwrap();
    let sink = Arc::new(RecordingSink::default());

    agent
        .submit_turn(session.id(), &[PromptBlock::text("find")], sink.clone())
        .await
        .unwrap();

    let updates = sink.updates();
    assert!(matches!(updates[0], SessionUpdate::AgentThoughtChunk { .. }));
    assert!(matches!(updates[1], SessionUpdate::AgentMessageChunk { .. }));
    assert!(matches!(updates[2], SessionUpdate::ToolCall { .. }));
    assert!(matches!(updates.last(), Some(SessionUpdate::AgentMessageChunk { .. })));

    // An empty system prompt installs nothing.
    assert_eq!(session.history().await[0], Message::user("find"));
}

#[tokio::test]
async fn unknown_tool_is_reported_to_the_model() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Reply(tool_reply(&[("x", "teleport")])),
        Step::Reply(text_reply("sorry")),
    ]));
    let agent = Agent::new(context(provider, search_and_write()), "sys");
    let session = agent.create_session(tmp.path(), None).await.unwrap();

    let outcome = agent
        .submit_turn(
            session.id(),
            &[PromptBlock::text("go")],
            Arc::new(RecordingSink::default()),
        )
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Completed);
    assert_eq!(
        session.history().await[3],
        Message::tool_result("x", "Error: Unknown tool 'teleport'")
    );
}

#[tokio::test]
async fn model_failure_propagates_and_keeps_history() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Reply(tool_reply(&[("a", "search")])),
        Step::Fail("overloaded".into()),
        Step::Reply(text_reply("back")),
    ]));
    let agent = Agent::new(context(provider, search_and_write()), "sys");
    let session = agent.create_session(tmp.path(), None).await.unwrap();
    let sink = Arc::new(RecordingSink::default());

    let err = agent
        .submit_turn(session.id(), &[PromptBlock::text("go")], sink.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        BuddyError::Turn(TurnError::ModelInvocationFailed(reason)) if reason.contains("overloaded")
    ));

    let history = session.history().await;
    assert_eq!(history.len(), 4);
    assert_eq!(history[3], Message::tool_result("a", "3 matches"));

    // The session still accepts turns.
    let outcome = agent
        .submit_turn(session.id(), &[PromptBlock::text("again")], sink)
        .await
        .unwrap();
    assert_eq!(outcome.stop_reason, StopReason::Completed);
    assert_eq!(session.history().await.len(), 6);
}

#[tokio::test]
async fn emission_failure_ends_turn_with_calls_answered() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Reply(tool_reply(&[
        ("a", "search"),
        ("b", "write"),
    ]))]));
    let agent = Agent::new(context(provider, search_and_write()), "sys");
    let session = agent.create_session(tmp.path(), None).await.unwrap();

    let err = agent
        .submit_turn(session.id(), &[PromptBlock::text("go")], Arc::new(ClosedSink))
        .await
        .unwrap_err();
    assert!(matches!(err, BuddyError::Turn(TurnError::Emission(_))));

    let history = session.history().await;
    assert_eq!(
        &history[3..],
        &[
            Message::tool_result("a", ABORTED),
            Message::tool_result("b", ABORTED),
        ]
    );
}

#[tokio::test]
async fn unknown_session_is_rejected() {
    let provider = Arc::new(ScriptedProvider::new(Vec::new()));
    let agent = Agent::new(context(Arc::clone(&provider), search_and_write()), "sys");

    let err = agent
        .submit_turn(
            "sess_missing",
            &[PromptBlock::text("hi")],
            Arc::new(RecordingSink::default()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "session: session not found: sess_missing");
    assert_eq!(provider.calls(), 0);
}
