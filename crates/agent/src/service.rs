//! Conversation service: the entry point used by the CLI and the gateway.
//!
//! A turn is: claim the thread, load its latest checkpoint, append the
//! user message, run the control loop under the turn timeout, and save one
//! checkpoint. A turn that fails at any point saves nothing, so the thread
//! stays at its last completed turn.

use crate::loop_runner::AgentLoop;
use parley_config::AgentConfig;
use parley_core::checkpoint::{CheckpointStore, validate_thread_id};
use parley_core::error::{Error, Result};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::{Conversation, Message, ThreadId};
use parley_core::provider::ToolDefinition;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

pub struct ConversationService {
    agent: AgentLoop,
    store: Arc<dyn CheckpointStore>,
    event_bus: Arc<EventBus>,
    turn_timeout: Duration,
    /// Threads with a turn in flight
    active: Mutex<HashSet<ThreadId>>,
}

/// Marks a thread busy until dropped, including when the turn future is
/// cancelled.
struct TurnGuard<'a> {
    active: &'a Mutex<HashSet<ThreadId>>,
    thread_id: ThreadId,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.thread_id);
        }
    }
}

impl ConversationService {
    pub fn new(agent: AgentLoop, store: Arc<dyn CheckpointStore>, event_bus: Arc<EventBus>) -> Self {
        Self {
            agent,
            store,
            event_bus,
            turn_timeout: Duration::from_secs(300),
            active: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Apply the `[agent]` section: round limit, turn timeout, parallelism
    /// and system prompt.
    pub fn from_config(
        agent: AgentLoop,
        store: Arc<dyn CheckpointStore>,
        event_bus: Arc<EventBus>,
        config: &AgentConfig,
    ) -> Self {
        let mut agent = agent
            .with_max_tool_rounds(config.max_tool_rounds)
            .with_parallel_tools(config.parallel_tools);
        if let Some(prompt) = &config.system_prompt {
            agent = agent.with_system_prompt(prompt);
        }
        Self::new(agent, store, event_bus).with_turn_timeout(Duration::from_secs(config.turn_timeout_secs))
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        self.agent.tool_definitions()
    }

    fn claim(&self, thread_id: &ThreadId) -> Result<TurnGuard<'_>> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| Error::Internal("thread lock poisoned".into()))?;
        if !active.insert(thread_id.clone()) {
            return Err(Error::ThreadBusy(thread_id.to_string()));
        }
        Ok(TurnGuard {
            active: &self.active,
            thread_id: thread_id.clone(),
        })
    }

    /// Send a user message to a thread and return the final answer.
    ///
    /// New thread ids start an empty conversation.
    pub async fn send(&self, thread_id: &ThreadId, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("message cannot be empty".into()));
        }
        validate_thread_id(thread_id).map_err(|e| Error::InvalidInput(e.to_string()))?;

        let _guard = self.claim(thread_id)?;
        match self.run_turn(thread_id, text).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                warn!(thread_id = %thread_id, error = %e, "Turn failed; nothing checkpointed");
                self.event_bus.publish(DomainEvent::TurnFailed {
                    thread_id: thread_id.to_string(),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn run_turn(&self, thread_id: &ThreadId, text: &str) -> Result<String> {
        let mut conversation = match self.store.latest(thread_id).await? {
            Some(checkpoint) => Conversation::resume(thread_id.clone(), checkpoint.messages),
            None => Conversation::new(thread_id.clone()),
        };
        conversation.push(Message::user(text));

        self.event_bus.publish(DomainEvent::TurnStarted {
            thread_id: thread_id.to_string(),
            history_len: conversation.len(),
            timestamp: chrono::Utc::now(),
        });

        // Timing out drops the loop future, which aborts any running tool tasks.
        let answer = tokio::time::timeout(self.turn_timeout, self.agent.process(&mut conversation))
            .await
            .map_err(|_| Error::Timeout {
                secs: self.turn_timeout.as_secs(),
            })??;

        let pending = conversation.pending_tool_calls();
        if !pending.is_empty() {
            return Err(Error::Internal(format!(
                "refusing to checkpoint {} unanswered tool call(s)",
                pending.len()
            )));
        }
        let checkpoint = self.store.save(thread_id, conversation.messages()).await?;
        info!(
            thread_id = %thread_id,
            checkpoint = checkpoint.seq,
            messages = checkpoint.messages.len(),
            "Turn complete"
        );
        self.event_bus.publish(DomainEvent::CheckpointSaved {
            thread_id: thread_id.to_string(),
            seq: checkpoint.seq,
            message_count: checkpoint.messages.len(),
            timestamp: chrono::Utc::now(),
        });

        Ok(answer)
    }

    /// Every thread with at least one checkpoint, sorted.
    pub async fn list_threads(&self) -> Result<Vec<ThreadId>> {
        let mut ids = self.store.list_thread_ids().await?;
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// The messages of a thread's latest checkpoint; empty for unknown threads.
    pub async fn history(&self, thread_id: &ThreadId) -> Result<Vec<Message>> {
        Ok(self
            .store
            .latest(thread_id)
            .await?
            .map(|checkpoint| checkpoint.messages)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use parley_core::error::ProviderError;
    use parley_core::message::Role;
    use parley_core::tool::ToolRegistry;
    use parley_store::InMemoryCheckpointStore;

    struct Harness {
        service: Arc<ConversationService>,
        store: Arc<InMemoryCheckpointStore>,
        provider: Arc<ScriptedProvider>,
    }

    fn harness(script: Vec<std::result::Result<parley_core::ProviderResponse, ProviderError>>) -> Harness {
        let provider = Arc::new(ScriptedProvider::new(script));
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(DelayedEchoTool));
        registry.register(Arc::new(PanickingTool));
        let bus = Arc::new(EventBus::default());
        let agent = AgentLoop::new(provider.clone(), "mock-model", 0.7, Arc::new(registry), bus.clone());
        let service = Arc::new(ConversationService::new(agent, store.clone(), bus));
        Harness {
            service,
            store,
            provider,
        }
    }

    fn echo_call(id: &str, delay_ms: u64) -> parley_core::MessageToolCall {
        call(id, "delayed_echo", serde_json::json!({"text": id, "delay_ms": delay_ms}))
    }

    #[tokio::test]
    async fn send_returns_answer_and_lists_thread() {
        let h = harness(vec![Ok(text_response("Hi there"))]);
        let t = ThreadId::from("t1");

        assert_eq!(h.service.send(&t, "Hello").await.unwrap(), "Hi there");
        assert_eq!(h.service.list_threads().await.unwrap(), vec![t.clone()]);
    }

    #[tokio::test]
    async fn one_checkpoint_per_turn_even_with_tools() {
        let h = harness(vec![
            Ok(tool_response(vec![echo_call("a", 0), echo_call("b", 0)])),
            Ok(tool_response(vec![echo_call("c", 0)])),
            Ok(text_response("all done")),
        ]);
        let t = ThreadId::from("tools");

        h.service.send(&t, "run the tools").await.unwrap();

        let checkpoints = h.store.list(&t).await.unwrap();
        assert_eq!(checkpoints.len(), 1);
        // user, assistant(2 calls), 2 results, assistant(1 call), 1 result, final
        assert_eq!(checkpoints[0].message_count, 7);

        let history = h.service.history(&t).await.unwrap();
        let conv = Conversation::resume(t, history);
        assert!(conv.pending_tool_calls().is_empty());
    }

    #[tokio::test]
    async fn resume_keeps_prior_turns_in_order() {
        let h = harness(vec![Ok(text_response("first answer")), Ok(text_response("second answer"))]);
        let t = ThreadId::from("multi");

        h.service.send(&t, "first question").await.unwrap();
        h.service.send(&t, "second question").await.unwrap();

        let contents: Vec<_> = h
            .service
            .history(&t)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(
            contents,
            vec!["first question", "first answer", "second question", "second answer"]
        );

        // The second model call saw the first turn.
        let second = &h.provider.requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[0].content, "first question");
        assert_eq!(h.store.list(&t).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dangling_tool_call_is_never_checkpointed() {
        let h = harness(vec![Ok(text_response("carrying on"))]);
        let t = ThreadId::from("dangling");
        h.store
            .save(
                &t,
                &[
                    Message::user("echo something"),
                    Message::assistant_tool_calls("", vec![echo_call("lost", 0)]),
                ],
            )
            .await
            .unwrap();

        let err = h.service.send(&t, "hello?").await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(h.store.list(&t).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_turn_writes_no_checkpoint() {
        let h = harness(vec![
            Ok(text_response("fine")),
            Err(ProviderError::RateLimited { retry_after_secs: 5 }),
        ]);
        let t = ThreadId::from("flaky");

        h.service.send(&t, "one").await.unwrap();
        let err = h.service.send(&t, "two").await.unwrap_err();
        assert!(matches!(err, Error::ModelUnavailable(ProviderError::RateLimited { .. })));

        let checkpoints = h.store.list(&t).await.unwrap();
        assert_eq!(checkpoints.len(), 1);
        assert_eq!(h.service.history(&t).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn tool_loop_exceeded_writes_no_checkpoint() {
        let script = (0..20)
            .map(|i| Ok(tool_response(vec![echo_call(&format!("c{i}"), 0)])))
            .collect();
        let h = harness(script);
        let t = ThreadId::from("runaway");

        let err = h.service.send(&t, "loop").await.unwrap_err();
        assert!(matches!(err, Error::ToolLoopExceeded { limit: 10 }));
        assert!(h.store.latest(&t).await.unwrap().is_none());
        assert!(h.service.list_threads().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn turn_timeout_aborts_and_writes_nothing() {
        let h = harness(vec![
            Ok(tool_response(vec![echo_call("slow", 600_000)])),
            Ok(text_response("never reached")),
        ]);
        let service = Arc::try_unwrap(h.service)
            .ok()
            .unwrap()
            .with_turn_timeout(Duration::from_secs(5));
        let t = ThreadId::from("slow");

        let err = service.send(&t, "wait").await.unwrap_err();
        assert!(matches!(err, Error::Timeout { secs: 5 }));
        assert!(h.store.latest(&t).await.unwrap().is_none());

        // The thread is free again.
        let answer = service.send(&t, "again").await.unwrap();
        assert_eq!(answer, "never reached");
        let history = service.history(&t).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_turn_on_same_thread_is_rejected() {
        let h = harness(vec![
            Ok(tool_response(vec![echo_call("slow", 1_000)])),
            Ok(text_response("done")),
        ]);
        let t = ThreadId::from("shared");

        let service = h.service.clone();
        let first = {
            let t = t.clone();
            tokio::spawn(async move { service.send(&t, "first").await })
        };
        // Let the first turn reach its tool call.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = h.service.send(&t, "second").await.unwrap_err();
        assert!(matches!(err, Error::ThreadBusy(_)));

        assert_eq!(first.await.unwrap().unwrap(), "done");
        assert_eq!(h.store.list(&t).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn different_threads_do_not_block_each_other() {
        let h = harness(vec![Ok(text_response("a")), Ok(text_response("b"))]);
        let (ta, tb) = (ThreadId::from("a"), ThreadId::from("b"));
        let (a, b) = tokio::join!(
            h.service.send(&ta, "x"),
            h.service.send(&tb, "y"),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(h.service.list_threads().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let h = harness(vec![]);
        let err = h.service.send(&ThreadId::from("t"), "   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn blank_thread_id_is_rejected() {
        let h = harness(vec![]);
        let err = h.service.send(&ThreadId::from(""), "hi").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn history_of_unknown_thread_is_empty() {
        let h = harness(vec![]);
        assert!(h.service.history(&ThreadId::from("ghost")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn from_config_applies_system_prompt() {
        let provider = Arc::new(ScriptedProvider::answers(vec![text_response("ok")]));
        let bus = Arc::new(EventBus::default());
        let agent = AgentLoop::new(provider.clone(), "m", 0.7, Arc::new(ToolRegistry::new()), bus.clone());
        let config = AgentConfig {
            system_prompt: Some("Be brief.".into()),
            ..AgentConfig::default()
        };
        let service =
            ConversationService::from_config(agent, Arc::new(InMemoryCheckpointStore::new()), bus, &config);

        let t = ThreadId::from("cfg");
        service.send(&t, "hi").await.unwrap();
        assert_eq!(provider.requests()[0].messages[0].role, Role::System);
        assert!(service.history(&t).await.unwrap().iter().all(|m| m.role != Role::System));
    }

    #[tokio::test]
    async fn turn_events_are_published() {
        let h = harness(vec![Ok(text_response("ok"))]);
        let mut rx = h.service.event_bus().subscribe();
        h.service.send(&ThreadId::from("ev"), "hi").await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::TurnStarted { .. } => "started",
                DomainEvent::ResponseGenerated { .. } => "response",
                DomainEvent::CheckpointSaved { .. } => "saved",
                DomainEvent::ToolExecuted { .. } => "tool",
                DomainEvent::TurnFailed { .. } => "failed",
            });
        }
        assert_eq!(kinds, vec!["started", "response", "saved"]);
    }
}
