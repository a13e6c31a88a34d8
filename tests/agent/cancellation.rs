use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use codebuddy::agent::{
    Agent, AgentContext, PromptBlock, ResourceReader, SessionUpdate, StopReason, ToolCallStatus,
};
use codebuddy::llm::Message;
use codebuddy::session::CancelFlag;
use tempfile::TempDir;

use crate::scripted::{
    RecordingSink, ScriptedProvider, Step, StubTool, context, registry, text_reply, tool_reply,
};

const CANCELLED: &str = "Error: Tool call cancelled before execution";

/// Raises the session's flag while the prompt is being normalized, i.e.
/// after the turn started but before the first model call.
struct CancellingReader {
    flag: Arc<OnceLock<CancelFlag>>,
}

impl ResourceReader for CancellingReader {
    fn read<'a>(
        &'a self,
        _uri: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(flag) = self.flag.get() {
                flag.cancel();
            }
            None
        })
    }
}

#[tokio::test]
async fn cancel_before_first_model_call_appends_only_the_user_message() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Reply(text_reply("never"))]));
    let flag = Arc::new(OnceLock::new());
    let ctx = AgentContext::new(provider.clone(), registry(Vec::new())).with_resource_reader(
        Arc::new(CancellingReader {
            flag: Arc::clone(&flag),
        }),
    );
    let agent = Agent::new(Arc::new(ctx), "sys");
    let session = agent.create_session(tmp.path(), None).await.unwrap();
    flag.set(session.cancel_flag().clone()).unwrap();
    let sink = Arc::new(RecordingSink::default());

    let outcome = agent
        .submit_turn(
            session.id(),
            &[
                PromptBlock::text("hello"),
                PromptBlock::resource_link("file:///unused"),
            ],
            sink.clone(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert_eq!(outcome.model_calls, 0);
    assert_eq!(provider.calls(), 0);
    assert_eq!(
        session.history().await,
        vec![Message::system("sys"), Message::user("hello")]
    );
    assert!(sink.updates().is_empty());
}

#[tokio::test]
async fn stale_cancellation_is_cleared_by_a_new_turn() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Reply(text_reply("hi"))]));
    let agent = Agent::new(context(provider, registry(Vec::new())), "sys");
    let session = agent.create_session(tmp.path(), None).await.unwrap();

    agent.cancel_turn(session.id()).unwrap();
    agent.cancel_turn(session.id()).unwrap();

    let outcome = agent
        .submit_turn(
            session.id(),
            &[PromptBlock::text("hello")],
            Arc::new(RecordingSink::default()),
        )
        .await
        .unwrap();
    assert_eq!(outcome.stop_reason, StopReason::Completed);
}

#[tokio::test]
async fn cancel_after_tool_call_response_answers_every_call() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(Vec::new()));
    let tools = registry(vec![
        Box::new(StubTool::ok("search", "3 matches")),
        Box::new(StubTool::ok("write", "written")),
    ]);
    let agent = Agent::new(context(Arc::clone(&provider), tools), "sys");
    let session = agent.create_session(tmp.path(), None).await.unwrap();
    provider.push(Step::ReplyAndCancel(
        tool_reply(&[("a", "search"), ("b", "write")]),
        session.cancel_flag().clone(),
    ));
    provider.push(Step::Reply(text_reply("fresh start")));
    let sink = Arc::new(RecordingSink::default());

    let outcome = agent
        .submit_turn(session.id(), &[PromptBlock::text("go")], sink.clone())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert_eq!(outcome.model_calls, 1);
    let history = session.history().await;
    assert_eq!(history.len(), 5);
    assert_eq!(
        &history[3..],
        &[
            Message::tool_result("a", CANCELLED),
            Message::tool_result("b", CANCELLED),
        ]
    );
    // Nothing was dispatched or streamed.
    assert!(sink.updates().is_empty());

    // The next turn starts from a history where every call has a result.
    let outcome = agent
        .submit_turn(session.id(), &[PromptBlock::text("again")], sink)
        .await
        .unwrap();
    assert_eq!(outcome.stop_reason, StopReason::Completed);
    let seen = provider.seen();
    assert_eq!(seen[1].len(), 6);
    assert_eq!(seen[1][5], Message::user("again"));
}

#[tokio::test]
async fn cancel_during_tool_execution_is_observed_before_the_next_model_call() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(Vec::new()));
    let flag = Arc::new(OnceLock::new());
    let tools = registry(vec![Box::new(
        StubTool::ok("slow", "finished anyway").cancelling(Arc::clone(&flag)),
    )]);
    let agent = Agent::new(context(Arc::clone(&provider), tools), "sys");
    let session = agent.create_session(tmp.path(), None).await.unwrap();
    flag.set(session.cancel_flag().clone()).unwrap();
    provider.push(Step::Reply(tool_reply(&[("a", "slow")])));
    provider.push(Step::Reply(text_reply("unreachable")));
    let sink = Arc::new(RecordingSink::default());

    let outcome = agent
        .submit_turn(session.id(), &[PromptBlock::text("go")], sink.clone())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.remaining(), 1);
    // The in-flight tool was not interrupted.
    assert_eq!(
        session.history().await.last(),
        Some(&Message::tool_result("a", "finished anyway"))
    );
    assert!(matches!(
        sink.updates().last(),
        Some(SessionUpdate::ToolCallUpdate { status: ToolCallStatus::Completed, .. })
    ));
}
