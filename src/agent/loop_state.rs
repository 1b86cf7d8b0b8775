//! Tool loop state management
//!
//! Tracks one role agent invocation: model rounds used so far and the
//! observations collected from tool executions.

use serde::{Deserialize, Serialize};

use crate::core::ToolResult;

/// State of a role agent's tool loop
#[derive(Debug, Clone)]
pub struct ToolLoopState {
    /// Current round number (0-indexed)
    pub round: usize,
    /// Maximum allowed model rounds that may request tools
    pub max_rounds: usize,
    /// Observations collected from tool executions
    pub observations: Vec<Observation>,
    /// Final answer once the model stops calling tools
    pub final_answer: Option<String>,
}

impl ToolLoopState {
    /// Create a new loop state with the given round budget
    pub fn new(max_rounds: usize) -> Self {
        Self {
            round: 0,
            max_rounds,
            observations: Vec::new(),
            final_answer: None,
        }
    }

    /// Check if the loop should continue
    pub fn should_continue(&self) -> bool {
        self.round < self.max_rounds && self.final_answer.is_none()
    }

    pub fn add_observation(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    /// Increment the round counter
    pub fn next_round(&mut self) {
        self.round += 1;
    }
}

/// An observation from a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Name of the tool that produced this observation
    pub tool_name: String,
    /// Whether the tool execution was successful
    pub success: bool,
    /// Text the model saw
    pub output: String,
    /// Optional structured data from the tool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl From<ToolResult> for Observation {
    fn from(result: ToolResult) -> Self {
        Self {
            tool_name: result.tool_name,
            success: result.success,
            output: result.output,
            data: result.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_state_new() {
        let state = ToolLoopState::new(5);
        assert_eq!(state.round, 0);
        assert_eq!(state.max_rounds, 5);
        assert!(state.observations.is_empty());
        assert!(state.final_answer.is_none());
    }

    #[test]
    fn test_should_continue() {
        let mut state = ToolLoopState::new(2);
        assert!(state.should_continue());

        state.next_round();
        assert!(state.should_continue());

        state.next_round();
        assert!(!state.should_continue());

        let mut state = ToolLoopState::new(2);
        state.final_answer = Some("done".to_string());
        assert!(!state.should_continue());
    }

    #[test]
    fn test_observation_from_tool_result() {
        let result = ToolResult::success_with_data(
            "lookup_patient",
            "{...}",
            serde_json::json!({"status": "found"}),
        );
        let obs = Observation::from(result);
        assert!(obs.success);
        assert_eq!(obs.data.unwrap()["status"], "found");
    }
}
