//! Application context
//!
//! Owns the model client, the data services, and the tool registry, and
//! wires them into role agents. Everything is passed in explicitly so tests
//! can swap any piece.

use std::sync::Arc;

use crate::agent::role_agent::{LlmRoleAgent, RoleAgent};
use crate::agent::state::Role;
use crate::agent::workflow::Workflow;
use crate::core::{CarelinkError, Config, Result};
use crate::llm::{LLMProvider, OllamaClient};
use crate::tools::{ExternalSearch, PatientStore, ReferenceIndex, ToolRegistry};

pub struct AppContext {
    config: Config,
    llm: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
}

impl AppContext {
    /// Build everything from configuration.
    ///
    /// Missing data files degrade to an empty store or index.
    pub fn from_config(config: Config) -> Self {
        let store = PatientStore::load_or_empty(&config.data.patient_data);
        let index = ReferenceIndex::load_or_empty(&config.data.reference_file, &config.data);
        let search = ExternalSearch::from_config(&config.search);
        tracing::info!(
            patients = store.len(),
            reference_sections = index.len(),
            web_search = search.is_enabled(),
            "data services ready"
        );

        let tools = ToolRegistry::new(Arc::new(store), Arc::new(index), search);
        let llm: Arc<dyn LLMProvider> = Arc::new(OllamaClient::from_config(&config));
        Self::new(config, llm, Arc::new(tools))
    }

    pub fn new(config: Config, llm: Arc<dyn LLMProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self { config, llm, tools }
    }

    /// Check the model server is reachable and the chat model is pulled
    pub async fn initialize(&self) -> Result<()> {
        let models = self.llm.list_models().await.map_err(|e| {
            tracing::debug!(error = %e, "model server check failed");
            CarelinkError::OllamaNotReachable(self.config.ollama_url(), self.config.models.chat.clone())
        })?;
        tracing::debug!(?models, "available models");

        if !self.llm.is_model_available(&self.config.models.chat).await? {
            return Err(CarelinkError::ModelNotFound(self.config.models.chat.clone()));
        }
        Ok(())
    }

    fn role_agent(&self, role: Role) -> Result<Arc<dyn RoleAgent>> {
        let agent = LlmRoleAgent::builder(role)
            .llm(self.llm.clone())
            .model(&self.config.models.chat)
            .tools(self.tools.clone())
            .max_rounds(self.config.agent.max_tool_rounds)
            .temperature(self.config.agent.temperature)
            .build()?;
        Ok(Arc::new(agent))
    }

    /// Build the handoff workflow over both role agents
    pub fn workflow(&self) -> Result<Workflow> {
        Ok(Workflow::new(
            self.role_agent(Role::Receptionist)?,
            self.role_agent(Role::Clinical)?,
        )
        .with_max_steps(self.config.agent.max_steps)
        .with_completion_threshold(self.config.agent.completion_threshold))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn llm(&self) -> &dyn LLMProvider {
        self.llm.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::ConversationState;
    use crate::agent::testing::ScriptedProvider;
    use crate::core::ToolCall;
    use crate::llm::LLMResponse;
    use crate::tools::registry::{sample_registry, LOOKUP_PATIENT};

    fn context(responses: Vec<LLMResponse>, model: &str) -> (AppContext, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new(responses));
        let mut config = Config::default();
        config.models.chat = model.to_string();
        let ctx = AppContext::new(
            config,
            provider.clone(),
            Arc::new(sample_registry(&["Jane Doe"], "Loop diuretics such as furosemide reduce swelling.")),
        );
        (ctx, provider)
    }

    #[tokio::test]
    async fn test_initialize_checks_model() {
        let (ctx, _) = context(Vec::new(), "test-model");
        assert!(ctx.initialize().await.is_ok());

        let (ctx, _) = context(Vec::new(), "other-model");
        assert!(matches!(ctx.initialize().await, Err(CarelinkError::ModelNotFound(_))));
    }

    #[tokio::test]
    async fn test_receptionist_turn_extracts_record() {
        let (ctx, provider) = context(
            vec![
                LLMResponse::tools(vec![ToolCall::new(
                    LOOKUP_PATIENT,
                    serde_json::json!({"patient_name": "jane doe"}),
                )]),
                LLMResponse::text("Thanks Jane, I have your discharge report here."),
            ],
            "test-model",
        );
        let workflow = ctx.workflow().unwrap();

        let state = workflow.step(ConversationState::new(), "My name is Jane Doe").await;
        assert_eq!(state.extracted_record.unwrap().patient_name, "Jane Doe");
        assert_eq!(state.history.len(), 2);
        assert_eq!(provider.calls()[0].model, "test-model");
    }
}
