//! Scripted test doubles for the model client and role agents
//!
//! Shared by unit tests and the integration tests under `tests/`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::agent::loop_state::Observation;
use crate::agent::role_agent::{AgentReply, RoleAgent};
use crate::agent::state::Role;
use crate::core::{CarelinkError, Message, Result, ToolDefinition};
use crate::llm::{GenerateOptions, LLMProvider, LLMResponse};

// Scripted panics must not poison later calls
fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// One request seen by [`ScriptedProvider`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

/// Model client that replays queued responses and records every request.
///
/// Errors once the queue runs dry.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<LLMResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<LLMResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue another response behind the remaining ones
    pub fn push(&self, response: LLMResponse) {
        locked(&self.responses).push_back(response);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        locked(&self.calls).clone()
    }

    fn next(&self, model: &str, messages: &[Message], tools: &[ToolDefinition]) -> Result<LLMResponse> {
        locked(&self.calls).push(RecordedCall {
            model: model.to_string(),
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name().to_string()).collect(),
        });
        locked(&self.responses)
            .pop_front()
            .ok_or_else(|| CarelinkError::ollama("no scripted response left"))
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.next(model, messages, &[])
    }

    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.next(model, messages, tools)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["test-model:latest".to_string()])
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// What a [`ScriptedAgent`] does on one invocation
pub enum Script {
    Reply(AgentReply),
    Fail(String),
    Panic,
}

impl Script {
    pub fn text(text: &str) -> Self {
        Script::Reply(AgentReply {
            text: text.to_string(),
            ..Default::default()
        })
    }

    pub fn with_observations(text: &str, observations: Vec<Observation>) -> Self {
        Script::Reply(AgentReply {
            text: text.to_string(),
            observations,
        })
    }
}

/// Role agent that replays scripted outcomes and counts invocations
pub struct ScriptedAgent {
    role: Role,
    script: Mutex<VecDeque<Script>>,
    invocations: Mutex<Vec<usize>>,
}

impl ScriptedAgent {
    pub fn new(role: Role, script: Vec<Script>) -> Self {
        Self {
            role,
            script: Mutex::new(script.into()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Number of times the agent was invoked
    pub fn invocations(&self) -> usize {
        locked(&self.invocations).len()
    }

    /// History length seen by each invocation
    pub fn history_lengths(&self) -> Vec<usize> {
        locked(&self.invocations).clone()
    }
}

#[async_trait]
impl RoleAgent for ScriptedAgent {
    fn role(&self) -> Role {
        self.role
    }

    async fn invoke(&self, history: &[Message]) -> Result<AgentReply> {
        locked(&self.invocations).push(history.len());
        let next = locked(&self.script).pop_front();
        match next {
            Some(Script::Reply(reply)) => Ok(reply),
            Some(Script::Fail(msg)) => Err(CarelinkError::ollama(msg)),
            Some(Script::Panic) => panic!("scripted agent panic"),
            None => Err(CarelinkError::ollama("no scripted reply left")),
        }
    }
}
