//! Tool registry - manages and dispatches tool calls
//!
//! Central hub for registering tools and routing tool calls to the record,
//! reference, and search services.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{Result, ToolCall, ToolCategory, ToolDefinition, ToolResult};
use crate::tools::records::PatientStore;
use crate::tools::reference::ReferenceIndex;
use crate::tools::search::ExternalSearch;

pub const LOOKUP_PATIENT: &str = "lookup_patient";
pub const QUERY_REFERENCE: &str = "query_reference";
pub const WEB_SEARCH: &str = "web_search";

/// Registry of available tools
pub struct ToolRegistry {
    /// Tool definitions indexed by name
    definitions: HashMap<String, ToolDefinition>,
    /// Tool categories
    categories: HashMap<String, ToolCategory>,
    records: Arc<PatientStore>,
    reference: Arc<ReferenceIndex>,
    search: ExternalSearch,
}

impl ToolRegistry {
    /// Create a registry over the given services
    pub fn new(
        records: Arc<PatientStore>,
        reference: Arc<ReferenceIndex>,
        search: ExternalSearch,
    ) -> Self {
        let mut registry = Self {
            definitions: HashMap::new(),
            categories: HashMap::new(),
            records,
            reference,
            search,
        };

        registry.register_record_tools();
        registry.register_clinical_tools();

        registry
    }

    /// Register the patient lookup tool
    fn register_record_tools(&mut self) {
        self.register(
            ToolDefinition::function(
                LOOKUP_PATIENT,
                "Retrieve the complete post-discharge report for a patient given their full name. \
                 Reports an error if the patient is not found or several patients match.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "patient_name": {
                            "type": "string",
                            "description": "The full name of the patient (e.g., 'John Smith')"
                        }
                    },
                    "required": ["patient_name"]
                }),
            ),
            ToolCategory::Records,
        );
    }

    /// Register reference and web search tools
    fn register_clinical_tools(&mut self) {
        self.register(
            ToolDefinition::function(
                QUERY_REFERENCE,
                "Search the internal nephrology reference for passages relevant to a clinical question. \
                 Always try this first.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The clinical question to look up"
                        }
                    },
                    "required": ["query"]
                }),
            ),
            ToolCategory::Reference,
        );

        self.register(
            ToolDefinition::function(
                WEB_SEARCH,
                "Search the web for information outside the internal nephrology reference, \
                 such as recent research. Use only when the reference has no relevant context.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The search query (e.g., 'latest research on SGLT2 inhibitors for kidney disease')"
                        }
                    },
                    "required": ["query"]
                }),
            ),
            ToolCategory::Search,
        );
    }

    /// Register a tool definition
    pub fn register(&mut self, definition: ToolDefinition, category: ToolCategory) {
        let name = definition.function.name.clone();
        self.definitions.insert(name.clone(), definition);
        self.categories.insert(name, category);
    }

    /// Get tool definitions by category
    pub fn definitions_by_category(&self, category: ToolCategory) -> Vec<&ToolDefinition> {
        let mut defs: Vec<&ToolDefinition> = self
            .definitions
            .iter()
            .filter(|(name, _)| self.categories.get(*name) == Some(&category))
            .map(|(_, def)| def)
            .collect();
        defs.sort_by(|a, b| a.name().cmp(b.name()));
        defs
    }

    /// Definitions for a set of categories, in the order given
    pub fn definitions_for(&self, categories: &[ToolCategory]) -> Vec<ToolDefinition> {
        categories
            .iter()
            .flat_map(|c| self.definitions_by_category(*c))
            .cloned()
            .collect()
    }

    pub fn category_of(&self, name: &str) -> Option<ToolCategory> {
        self.categories.get(name).copied()
    }

    pub fn records(&self) -> &PatientStore {
        &self.records
    }

    pub fn reference(&self) -> &ReferenceIndex {
        &self.reference
    }

    pub fn search(&self) -> &ExternalSearch {
        &self.search
    }

    /// Execute a tool call
    pub async fn execute(&self, tool_call: &ToolCall) -> Result<ToolResult> {
        match self.category_of(&tool_call.name) {
            Some(ToolCategory::Records) => self.execute_lookup(tool_call),
            Some(ToolCategory::Reference) => self.execute_reference(tool_call),
            Some(ToolCategory::Search) => Ok(self.execute_search(tool_call).await),
            None => Ok(ToolResult::failure(
                &tool_call.name,
                format!("Unknown tool: {}", tool_call.name),
            )),
        }
    }

    fn execute_lookup(&self, tool_call: &ToolCall) -> Result<ToolResult> {
        let Some(name) = tool_call.text_argument("patient_name") else {
            return Ok(ToolResult::failure(
                LOOKUP_PATIENT,
                "ERROR: patient_name is required.",
            ));
        };

        let outcome = self.records.find(&name);
        Ok(ToolResult {
            tool_name: LOOKUP_PATIENT.to_string(),
            success: outcome.record().is_some(),
            output: outcome.render(),
            data: Some(serde_json::to_value(&outcome)?),
        })
    }

    fn execute_reference(&self, tool_call: &ToolCall) -> Result<ToolResult> {
        let Some(query) = tool_call.text_argument("query") else {
            return Ok(ToolResult::failure(QUERY_REFERENCE, "ERROR: query is required."));
        };

        let outcome = self.reference.query(&query);
        Ok(ToolResult::success_with_data(
            QUERY_REFERENCE,
            outcome.render(),
            serde_json::json!({ "matched": outcome.is_match() }),
        ))
    }

    async fn execute_search(&self, tool_call: &ToolCall) -> ToolResult {
        match tool_call.text_argument("query") {
            Some(query) => ToolResult::success(WEB_SEARCH, self.search.search(&query).await),
            None => ToolResult::failure(WEB_SEARCH, "ERROR: query is required."),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_registry(names: &[&str], reference_text: &str) -> ToolRegistry {
    use crate::core::config::DataConfig;

    ToolRegistry::new(
        Arc::new(crate::tools::records::sample_store(names)),
        Arc::new(ReferenceIndex::from_text(reference_text, &DataConfig::default())),
        ExternalSearch::disabled(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::records::LookupOutcome;

    #[test]
    fn test_categories() {
        let registry = sample_registry(&["Jane Doe"], "");
        let names: Vec<String> = registry
            .definitions_for(&[ToolCategory::Reference, ToolCategory::Search])
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec![QUERY_REFERENCE, WEB_SEARCH]);
        assert_eq!(registry.definitions_for(&[ToolCategory::Records]).len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_carries_tagged_outcome() {
        let registry = sample_registry(&["Jane Doe", "John Smith"], "");
        let call = ToolCall::new(LOOKUP_PATIENT, serde_json::json!({"patient_name": "jane doe"}));
        let result = registry.execute(&call).await.unwrap();
        assert!(result.success);
        let outcome: LookupOutcome = serde_json::from_value(result.data.unwrap()).unwrap();
        assert_eq!(outcome.record().unwrap().patient_name, "Jane Doe");

        let call = ToolCall::new(LOOKUP_PATIENT, serde_json::json!({"patient_name": "Zzqx"}));
        let result = registry.execute(&call).await.unwrap();
        assert!(!result.success);
        assert!(result.output.contains("not found"));
    }

    #[tokio::test]
    async fn test_reference_no_match_and_unknown_tool() {
        let registry = sample_registry(&[], "Potassium restriction matters in stage 4 CKD.");
        let call = ToolCall::new(QUERY_REFERENCE, serde_json::json!({"query": "potassium"}));
        let result = registry.execute(&call).await.unwrap();
        assert!(result.output.contains("[Section 1]"));

        let call = ToolCall::new(QUERY_REFERENCE, serde_json::json!({"query": "astrophysics"}));
        let result = registry.execute(&call).await.unwrap();
        assert_eq!(result.data.unwrap()["matched"], false);

        let call = ToolCall::new("schedule_appointment", serde_json::json!({}));
        let result = registry.execute(&call).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_search_disabled_is_text() {
        let registry = sample_registry(&[], "");
        let call = ToolCall::new(WEB_SEARCH, serde_json::json!({"query": "dialysis"}));
        let result = registry.execute(&call).await.unwrap();
        assert!(result.output.starts_with("WEB SEARCH ERROR"));
    }
}
