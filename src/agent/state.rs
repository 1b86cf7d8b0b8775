//! Conversation state shared by both roles
//!
//! One `ConversationState` per session, owned by whoever drives the turns.

use serde::{Deserialize, Serialize};

use crate::core::Message;
use crate::tools::records::PatientRecord;

/// Marker a reply carries to pass the conversation to the clinical role
pub const HANDOFF_TO_CLINICAL: &str = "HANDOFF_TO_CLINICAL";

/// Marker a reply carries to pass the conversation back to the receptionist
pub const HANDOFF_TO_RECEPTIONIST: &str = "HANDOFF_TO_RECEPTIONIST";

/// The two conversational roles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Receptionist,
    Clinical,
}

impl Role {
    pub fn other(&self) -> Role {
        match self {
            Role::Receptionist => Role::Clinical,
            Role::Clinical => Role::Receptionist,
        }
    }

    /// The sentinel that hands the conversation to this role
    pub fn handoff_sentinel(&self) -> &'static str {
        match self {
            Role::Receptionist => HANDOFF_TO_RECEPTIONIST,
            Role::Clinical => HANDOFF_TO_CLINICAL,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Receptionist => "Receptionist Agent",
            Role::Clinical => "Clinical Agent",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Receptionist => write!(f, "receptionist"),
            Role::Clinical => write!(f, "clinical"),
        }
    }
}

/// The role `text` hands off to, if it was produced by `from`.
///
/// Only the sentinel naming the other role counts.
pub fn handoff_target(text: &str, from: Role) -> Option<Role> {
    let other = from.other();
    text.contains(other.handoff_sentinel()).then_some(other)
}

/// Mutable per-session conversation state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// User and assistant messages in chronological order
    pub history: Vec<Message>,
    /// Role that produced the last assistant message
    pub active_role: Role,
    /// Last patient record the receptionist retrieved
    pub extracted_record: Option<PatientRecord>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.history.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.history.push(Message::assistant(content));
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.history.iter().rev().find(|m| m.is_user())
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.history.iter().rev().find(|m| m.is_assistant())
    }

    /// The extracted record as pretty JSON
    pub fn record_json(&self) -> Option<String> {
        self.extracted_record.as_ref().map(|r| r.to_pretty_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = ConversationState::new();
        assert!(state.history.is_empty());
        assert_eq!(state.active_role, Role::Receptionist);
        assert!(state.extracted_record.is_none());
    }

    #[test]
    fn test_handoff_target_only_names_other_role() {
        assert_eq!(
            handoff_target("HANDOFF_TO_CLINICAL", Role::Receptionist),
            Some(Role::Clinical)
        );
        assert_eq!(
            handoff_target("ok HANDOFF_TO_RECEPTIONIST", Role::Clinical),
            Some(Role::Receptionist)
        );
        assert_eq!(handoff_target("HANDOFF_TO_CLINICAL", Role::Clinical), None);
        assert_eq!(handoff_target("Your follow-up is next week.", Role::Receptionist), None);
    }

    #[test]
    fn test_last_messages() {
        let mut state = ConversationState::new();
        state.push_user("My name is Jane Doe");
        state.push_assistant("Hello Jane");
        state.push_user("When is my follow-up?");

        assert_eq!(state.last_user_message().unwrap().content, "When is my follow-up?");
        assert_eq!(state.last_assistant_message().unwrap().content, "Hello Jane");
    }
}
