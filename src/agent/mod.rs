//! Agent module - role agents and the handoff workflow
//!
//! Contains the two conversational roles, the nodes that run them, and the
//! state machine that routes a user turn between them.

pub mod context;
pub mod loop_state;
pub mod nodes;
pub mod role_agent;
pub mod state;
pub mod workflow;

#[doc(hidden)]
pub mod testing;

pub use context::AppContext;
pub use loop_state::{Observation, ToolLoopState};
pub use nodes::{clinical_node, receptionist_node, NodeOutput};
pub use role_agent::{AgentReply, LlmRoleAgent, LlmRoleAgentBuilder, RoleAgent, MEDICAL_DISCLAIMER};
pub use state::{ConversationState, Role, HANDOFF_TO_CLINICAL, HANDOFF_TO_RECEPTIONIST};
pub use workflow::{is_complete_answer, route, Route, Workflow};
