//! Handoff workflow
//!
//! Drives one user turn through the receptionist and clinical nodes until a
//! reply is complete or the step budget runs out.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::agent::nodes::{clinical_node, receptionist_node, NodeOutput};
use crate::agent::role_agent::RoleAgent;
use crate::agent::state::{handoff_target, ConversationState, Role};
use crate::core::config::AgentConfig;

/// Where the workflow goes after a node has run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Run the node for this role next
    Node(Role),
    /// The turn is over
    End,
}

/// Whether a reply is long enough to end the turn
pub fn is_complete_answer(text: &str, threshold: usize) -> bool {
    text.chars().count() > threshold
}

/// Route after `producer` emitted `message`.
///
/// A handoff sentinel wins over the length check. Short replies without a
/// sentinel go back to the same role.
pub fn route(message: &str, producer: Role, threshold: usize) -> Route {
    if let Some(target) = handoff_target(message, producer) {
        return Route::Node(target);
    }
    if is_complete_answer(message, threshold) {
        Route::End
    } else {
        Route::Node(producer)
    }
}

/// The two-role state machine
#[derive(Clone)]
pub struct Workflow {
    receptionist: Arc<dyn RoleAgent>,
    clinical: Arc<dyn RoleAgent>,
    max_steps: usize,
    completion_threshold: usize,
}

impl Workflow {
    pub fn new(receptionist: Arc<dyn RoleAgent>, clinical: Arc<dyn RoleAgent>) -> Self {
        let defaults = AgentConfig::default();
        Self {
            receptionist,
            clinical,
            max_steps: defaults.max_steps,
            completion_threshold: defaults.completion_threshold,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_completion_threshold(mut self, threshold: usize) -> Self {
        self.completion_threshold = threshold;
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    async fn run_node(&self, role: Role, state: &ConversationState) -> NodeOutput {
        match role {
            Role::Receptionist => receptionist_node(state, self.receptionist.as_ref()).await,
            Role::Clinical => clinical_node(state, self.clinical.as_ref()).await,
        }
    }

    /// Run nodes starting from the active role until the turn ends.
    ///
    /// Never fails. A panicking node leaves the incoming state untouched.
    pub async fn run(&self, state: ConversationState, max_steps: usize) -> ConversationState {
        let incoming = state.clone();
        match AssertUnwindSafe(self.run_steps(state, max_steps))
            .catch_unwind()
            .await
        {
            Ok(state) => state,
            Err(_) => {
                tracing::error!("workflow node panicked, keeping incoming state");
                incoming
            }
        }
    }

    async fn run_steps(&self, mut state: ConversationState, max_steps: usize) -> ConversationState {
        let mut current = state.active_role;

        for step in 1..=max_steps {
            tracing::info!(role = %current, step, "role activated");
            let output = self.run_node(current, &state).await;

            let next = route(&output.message, current, self.completion_threshold);
            state.push_assistant(output.message);
            state.active_role = output.role;
            state.extracted_record = output.extracted_record;

            match next {
                Route::End => return state,
                Route::Node(role) => {
                    if role != current {
                        tracing::info!(from = %current, to = %role, "handoff");
                    }
                    current = role;
                }
            }
        }

        tracing::warn!(steps = max_steps, "step budget exhausted");
        state
    }

    /// Append the user's message and run one turn with the configured budget
    pub async fn step(&self, mut state: ConversationState, user_text: &str) -> ConversationState {
        state.push_user(user_text);
        self.run(state, self.max_steps).await
    }
}
