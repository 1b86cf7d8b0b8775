//! Role agents
//!
//! A role agent binds instructions and a restricted tool set to a chat
//! model. Each invocation runs a bounded tool-calling loop over the shared
//! history and returns the final reply plus what the tools observed.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::loop_state::{Observation, ToolLoopState};
use crate::agent::state::{Role, HANDOFF_TO_CLINICAL, HANDOFF_TO_RECEPTIONIST};
use crate::core::{CarelinkError, Message, Result, ToolCategory, ToolDefinition, ToolResult};
use crate::llm::{GenerateOptions, LLMProvider};
use crate::tools::{ToolRegistry, REFERENCE_CITATION, SEARCH_CITATION};

pub const MEDICAL_DISCLAIMER: &str = "NOTE: This is an AI assistant for educational purposes only. \
     Always consult healthcare professionals for medical advice.";

const EMPTY_REPLY: &str = "I apologize, but I couldn't generate a response.";

/// Instructions for the receptionist role
pub fn receptionist_instructions() -> String {
    format!(
        r#"You are the Post-Discharge Receptionist AI. {MEDICAL_DISCLAIMER}

1. Greet the patient and ask for their full name.
2. Retrieve their discharge report with the `lookup_patient` tool, once.
3. After retrieving it, confirm the key details and ask follow-up questions about their recovery.
4. If the patient asks a medical question, reply with exactly '{HANDOFF_TO_CLINICAL}'.
5. Be empathetic and helpful."#
    )
}

/// Instructions for the clinical role
pub fn clinical_instructions() -> String {
    format!(
        r#"You are the Clinical AI Agent specializing in Nephrology. {MEDICAL_DISCLAIMER}

1. ALWAYS use the `query_reference` tool first.
2. If it has no relevant context, use the `web_search` tool.
3. Answers drawn from the reference must cite {REFERENCE_CITATION}.
4. Answers drawn from web search must cite {SEARCH_CITATION}.
5. If the message is not medical in nature, reply with exactly '{HANDOFF_TO_RECEPTIONIST}'."#
    )
}

/// Result of one role agent invocation
#[derive(Debug, Clone, Default)]
pub struct AgentReply {
    /// Final reply text
    pub text: String,
    /// Tool observations in execution order
    pub observations: Vec<Observation>,
}

/// A conversational role driven by the generation capability
#[async_trait]
pub trait RoleAgent: Send + Sync {
    /// Which role this agent plays
    fn role(&self) -> Role;

    /// Produce a reply to the conversation so far
    async fn invoke(&self, history: &[Message]) -> Result<AgentReply>;
}

/// Role agent backed by an [`LLMProvider`] and the tool registry
pub struct LlmRoleAgent {
    role: Role,
    instructions: String,
    categories: Vec<ToolCategory>,
    llm: Arc<dyn LLMProvider>,
    model: String,
    tools: Arc<ToolRegistry>,
    max_rounds: usize,
    temperature: f32,
}

/// Builder for creating LlmRoleAgents
pub struct LlmRoleAgentBuilder {
    role: Role,
    instructions: Option<String>,
    categories: Option<Vec<ToolCategory>>,
    llm: Option<Arc<dyn LLMProvider>>,
    model: Option<String>,
    tools: Option<Arc<ToolRegistry>>,
    max_rounds: usize,
    temperature: f32,
}

impl LlmRoleAgentBuilder {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            instructions: None,
            categories: None,
            llm: None,
            model: None,
            tools: None,
            max_rounds: 5,
            temperature: 0.0,
        }
    }

    /// Override the role's default instructions
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Override the role's default tool categories
    pub fn categories(mut self, categories: Vec<ToolCategory>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn LLMProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the maximum number of tool rounds per invocation
    pub fn max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build the agent. The model client, model name, and registry are required.
    pub fn build(self) -> Result<LlmRoleAgent> {
        let llm = self
            .llm
            .ok_or_else(|| CarelinkError::config("role agent needs a model client"))?;
        let model = self
            .model
            .ok_or_else(|| CarelinkError::config("role agent needs a model name"))?;
        let tools = self
            .tools
            .ok_or_else(|| CarelinkError::config("role agent needs a tool registry"))?;

        let (default_instructions, default_categories) = match self.role {
            Role::Receptionist => (receptionist_instructions(), vec![ToolCategory::Records]),
            Role::Clinical => (
                clinical_instructions(),
                vec![ToolCategory::Reference, ToolCategory::Search],
            ),
        };

        Ok(LlmRoleAgent {
            role: self.role,
            instructions: self.instructions.unwrap_or(default_instructions),
            categories: self.categories.unwrap_or(default_categories),
            llm,
            model,
            tools,
            max_rounds: self.max_rounds,
            temperature: self.temperature,
        })
    }
}

impl LlmRoleAgent {
    pub fn builder(role: Role) -> LlmRoleAgentBuilder {
        LlmRoleAgentBuilder::new(role)
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Tool definitions this role may call
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions_for(&self.categories)
    }

    fn options(&self) -> Option<GenerateOptions> {
        Some(GenerateOptions {
            temperature: Some(self.temperature),
            ..Default::default()
        })
    }

    fn allows(&self, tool_name: &str) -> bool {
        self.tools
            .category_of(tool_name)
            .is_some_and(|c| self.categories.contains(&c))
    }

    async fn execute_tool(&self, call: &crate::core::ToolCall) -> ToolResult {
        if !self.allows(&call.name) {
            return ToolResult::failure(
                &call.name,
                format!("Tool '{}' is not available to the {} role.", call.name, self.role),
            );
        }
        match self.tools.execute(call).await {
            Ok(result) => result,
            Err(e) => ToolResult::failure(&call.name, e.to_string()),
        }
    }
}

#[async_trait]
impl RoleAgent for LlmRoleAgent {
    fn role(&self) -> Role {
        self.role
    }

    async fn invoke(&self, history: &[Message]) -> Result<AgentReply> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(&self.instructions));
        messages.extend(history.iter().cloned());

        let tool_defs = self.tool_definitions();
        let mut state = ToolLoopState::new(self.max_rounds);

        while state.should_continue() {
            let response = self
                .llm
                .chat_with_tools(&self.model, &messages, &tool_defs, self.options())
                .await?;

            if response.tool_calls.is_empty() {
                state.final_answer = Some(response.content);
                break;
            }

            messages.push(Message::assistant_with_tools(
                response.content,
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                let result = self.execute_tool(call).await;
                tracing::info!(
                    role = %self.role,
                    tool = %call.name,
                    success = result.success,
                    "tool invoked"
                );
                messages.push(Message::tool(&result.output));
                state.add_observation(result.into());
            }

            state.next_round();
        }

        let text = match state.final_answer {
            Some(answer) => answer,
            None => {
                // Out of tool rounds, answer from what was observed
                tracing::debug!(role = %self.role, rounds = state.round, "tool rounds exhausted");
                self.llm
                    .chat(&self.model, &messages, self.options())
                    .await?
                    .content
            }
        };
        let text = if text.trim().is_empty() {
            EMPTY_REPLY.to_string()
        } else {
            text
        };

        Ok(AgentReply {
            text,
            observations: state.observations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedProvider;
    use crate::core::ToolCall;
    use crate::llm::LLMResponse;
    use crate::tools::registry::{sample_registry, LOOKUP_PATIENT, WEB_SEARCH};

    fn agent(role: Role, provider: Arc<ScriptedProvider>) -> LlmRoleAgent {
        LlmRoleAgent::builder(role)
            .llm(provider)
            .model("test-model")
            .tools(Arc::new(sample_registry(&["Jane Doe"], "")))
            .max_rounds(2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_client() {
        let result = LlmRoleAgent::builder(Role::Clinical).model("m").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_instructions_carry_contract() {
        assert!(receptionist_instructions().contains(HANDOFF_TO_CLINICAL));
        let clinical = clinical_instructions();
        assert!(clinical.contains(HANDOFF_TO_RECEPTIONIST));
        assert!(clinical.contains("[Source: Internal Nephrology Reference]"));
        assert!(clinical.contains("[Source: General Internet Search]"));
    }

    #[tokio::test]
    async fn test_tool_loop_collects_observations() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            LLMResponse::tools(vec![ToolCall::new(
                LOOKUP_PATIENT,
                serde_json::json!({"patient_name": "Jane Doe"}),
            )]),
            LLMResponse::text("I found your discharge report, Jane."),
        ]));
        let agent = agent(Role::Receptionist, provider.clone());

        let reply = agent.invoke(&[Message::user("I'm Jane Doe")]).await.unwrap();
        assert_eq!(reply.text, "I found your discharge report, Jane.");
        assert_eq!(reply.observations.len(), 1);
        assert!(reply.observations[0].success);

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tool_names, vec![LOOKUP_PATIENT.to_string()]);
        assert!(calls[1].messages.iter().any(|m| m.content.contains("\"patient_name\"")));
    }

    #[tokio::test]
    async fn test_disallowed_tool_is_refused() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            LLMResponse::tools(vec![ToolCall::new(
                WEB_SEARCH,
                serde_json::json!({"query": "kidney"}),
            )]),
            LLMResponse::text("Could you tell me your full name?"),
        ]));
        let reply = agent(Role::Receptionist, provider)
            .invoke(&[Message::user("hello")])
            .await
            .unwrap();
        assert!(!reply.observations[0].success);
        assert!(reply.observations[0].output.contains("not available"));
    }

    #[tokio::test]
    async fn test_rounds_exhausted_asks_without_tools() {
        let lookup = || {
            LLMResponse::tools(vec![ToolCall::new(
                LOOKUP_PATIENT,
                serde_json::json!({"patient_name": "Jane Doe"}),
            )])
        };
        let provider = Arc::new(ScriptedProvider::new(vec![
            lookup(),
            lookup(),
            LLMResponse::text("Here is what I found."),
        ]));
        let reply = agent(Role::Receptionist, provider.clone())
            .invoke(&[Message::user("Jane Doe")])
            .await
            .unwrap();
        assert_eq!(reply.text, "Here is what I found.");
        assert_eq!(reply.observations.len(), 2);
        assert!(provider.calls()[2].tool_names.is_empty());
    }

    #[tokio::test]
    async fn test_empty_reply_replaced() {
        let provider = Arc::new(ScriptedProvider::new(vec![LLMResponse::text("  ")]));
        let reply = agent(Role::Clinical, provider)
            .invoke(&[Message::user("hi")])
            .await
            .unwrap();
        assert_eq!(reply.text, EMPTY_REPLY);
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let result = agent(Role::Clinical, provider)
            .invoke(&[Message::user("hi")])
            .await;
        assert!(result.is_err());
    }
}
