//! Receptionist and clinical nodes
//!
//! A node runs its role agent once over the conversation and decides which
//! role holds the conversation next. Nodes never fail: agent errors become
//! apology messages and the state fields are carried forward.

use crate::agent::loop_state::Observation;
use crate::agent::role_agent::RoleAgent;
use crate::agent::state::{ConversationState, Role, HANDOFF_TO_CLINICAL, HANDOFF_TO_RECEPTIONIST};
use crate::tools::records::{LookupOutcome, PatientRecord};
use crate::tools::registry::LOOKUP_PATIENT;

/// Words in a user message that send it straight to the clinical role
pub const MEDICAL_KEYWORDS: &[&str] = &[
    "swelling",
    "pain",
    "shortness of breath",
    "symptom",
    "medication",
    "side effect",
    "diet",
    "dizziness",
    "fever",
    "blood",
    "urine",
    "rash",
];

pub const RECEPTIONIST_APOLOGY: &str =
    "I'm sorry, I ran into a problem while looking into that. Please try again in a moment.";

pub const CLINICAL_APOLOGY: &str =
    "I'm sorry, I couldn't process that medical question right now. Please try again in a moment.";

/// What a node hands back to the workflow
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    /// Assistant message to append to the history
    pub message: String,
    /// Role that should hold the conversation next
    pub role: Role,
    pub extracted_record: Option<PatientRecord>,
}

/// Case-insensitive substring check against [`MEDICAL_KEYWORDS`]
pub fn mentions_medical_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    MEDICAL_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Latest patient record found by a lookup, if any
fn extract_record(observations: &[Observation]) -> Option<PatientRecord> {
    observations
        .iter()
        .filter(|obs| obs.tool_name == LOOKUP_PATIENT)
        .filter_map(|obs| {
            obs.data
                .clone()
                .and_then(|data| serde_json::from_value::<LookupOutcome>(data).ok())
                .and_then(|outcome| outcome.record().cloned())
                .or_else(|| PatientRecord::from_embedded_json(&obs.output))
        })
        .last()
}

pub async fn receptionist_node(state: &ConversationState, agent: &dyn RoleAgent) -> NodeOutput {
    let held = state.extracted_record.clone();

    let medical = state
        .last_user_message()
        .is_some_and(|m| mentions_medical_keyword(&m.content));
    if medical {
        tracing::debug!("medical keyword in user message");
        return NodeOutput {
            message: HANDOFF_TO_CLINICAL.to_string(),
            role: Role::Clinical,
            extracted_record: held,
        };
    }

    match agent.invoke(&state.history).await {
        Ok(reply) => {
            let extracted_record = match extract_record(&reply.observations) {
                Some(record) => {
                    tracing::info!(patient = %record.patient_name, "record extracted");
                    Some(record)
                }
                None => held,
            };
            let role = if reply.text.contains(HANDOFF_TO_CLINICAL) {
                Role::Clinical
            } else {
                Role::Receptionist
            };
            NodeOutput {
                message: reply.text,
                role,
                extracted_record,
            }
        }
        Err(e) => {
            tracing::error!(role = %agent.role(), error = %e, "node error");
            NodeOutput {
                message: RECEPTIONIST_APOLOGY.to_string(),
                role: Role::Receptionist,
                extracted_record: held,
            }
        }
    }
}

pub async fn clinical_node(state: &ConversationState, agent: &dyn RoleAgent) -> NodeOutput {
    let extracted_record = state.extracted_record.clone();

    match agent.invoke(&state.history).await {
        Ok(reply) => {
            let role = if reply.text.contains(HANDOFF_TO_RECEPTIONIST) {
                Role::Receptionist
            } else {
                Role::Clinical
            };
            NodeOutput {
                message: reply.text,
                role,
                extracted_record,
            }
        }
        Err(e) => {
            tracing::error!(role = %agent.role(), error = %e, "node error");
            NodeOutput {
                message: CLINICAL_APOLOGY.to_string(),
                role: Role::Clinical,
                extracted_record,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{Script, ScriptedAgent};
    use crate::core::ToolResult;
    use crate::tools::records::sample_store;

    fn lookup_observation(name: &str) -> Observation {
        lookup_observation_in(&["Jane Doe", "John Smith"], name)
    }

    fn lookup_observation_in(names: &[&str], query: &str) -> Observation {
        let outcome = sample_store(names).find(query);
        ToolResult {
            tool_name: LOOKUP_PATIENT.to_string(),
            success: outcome.record().is_some(),
            output: outcome.render(),
            data: Some(serde_json::to_value(&outcome).unwrap()),
        }
        .into()
    }

    fn state_with(user: &str) -> ConversationState {
        let mut state = ConversationState::new();
        state.push_user(user);
        state
    }

    #[test]
    fn test_keyword_matching() {
        assert!(mentions_medical_keyword("My legs have SWELLING"));
        assert!(mentions_medical_keyword("is this a side effect?"));
        assert!(!mentions_medical_keyword("When is my follow-up appointment?"));
    }

    #[tokio::test]
    async fn test_keyword_short_circuits_agent() {
        let agent = ScriptedAgent::new(Role::Receptionist, vec![]);
        let output = receptionist_node(&state_with("I have swelling in my legs"), &agent).await;
        assert_eq!(output.message, HANDOFF_TO_CLINICAL);
        assert_eq!(output.role, Role::Clinical);
        assert_eq!(agent.invocations(), 0);
    }

    #[tokio::test]
    async fn test_lookup_sets_record() {
        let agent = ScriptedAgent::new(
            Role::Receptionist,
            vec![Script::with_observations(
                "Thanks Jane, I found your report.",
                vec![lookup_observation("Jane Doe")],
            )],
        );
        let output = receptionist_node(&state_with("I'm Jane Doe"), &agent).await;
        assert_eq!(output.role, Role::Receptionist);
        assert_eq!(output.extracted_record.unwrap().patient_name, "Jane Doe");
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_previous_record() {
        let mut state = state_with("Actually I'm Zzqx");
        state.extracted_record = sample_store(&["Jane Doe"]).find("Jane Doe").record().cloned();

        let agent = ScriptedAgent::new(
            Role::Receptionist,
            vec![Script::with_observations(
                "I couldn't find that name.",
                vec![lookup_observation("Zzqx")],
            )],
        );
        let output = receptionist_node(&state, &agent).await;
        assert_eq!(output.extracted_record, state.extracted_record);
    }

    #[tokio::test]
    async fn test_new_lookup_replaces_record() {
        let mut state = state_with("Sorry, this is John Smith on Jane's phone");
        state.extracted_record = sample_store(&["Jane Doe"]).find("Jane Doe").record().cloned();

        let agent = ScriptedAgent::new(
            Role::Receptionist,
            vec![Script::with_observations(
                "Thanks John, I found your report.",
                vec![lookup_observation("John Smith")],
            )],
        );
        let output = receptionist_node(&state, &agent).await;
        assert_eq!(output.extracted_record.unwrap().patient_name, "John Smith");
    }

    #[tokio::test]
    async fn test_ambiguous_lookup_keeps_previous_record() {
        let mut state = state_with("It's Smith");
        state.extracted_record = sample_store(&["Jane Doe"]).find("Jane Doe").record().cloned();

        let ambiguous = lookup_observation_in(&["John Smith", "Jane Smithers"], "Smith");
        assert!(!ambiguous.success);
        assert!(ambiguous.output.starts_with("ERROR: Multiple patients found"));

        let agent = ScriptedAgent::new(
            Role::Receptionist,
            vec![Script::with_observations(
                "More than one patient matches. What is your full name?",
                vec![ambiguous],
            )],
        );
        let output = receptionist_node(&state, &agent).await;
        assert_eq!(output.extracted_record.unwrap().patient_name, "Jane Doe");
    }

    #[tokio::test]
    async fn test_record_from_output_text() {
        let mut obs = lookup_observation("Jane Doe");
        obs.data = None;
        let agent = ScriptedAgent::new(
            Role::Receptionist,
            vec![Script::with_observations("Found you, Jane.", vec![obs])],
        );
        let output = receptionist_node(&state_with("Jane Doe"), &agent).await;
        assert_eq!(output.extracted_record.unwrap().patient_name, "Jane Doe");
    }

    #[tokio::test]
    async fn test_receptionist_sentinel_hands_off() {
        let agent = ScriptedAgent::new(Role::Receptionist, vec![Script::text(HANDOFF_TO_CLINICAL)]);
        let output = receptionist_node(&state_with("Is my kidney okay?"), &agent).await;
        assert_eq!(output.role, Role::Clinical);
    }

    #[tokio::test]
    async fn test_receptionist_error_apologizes() {
        let mut state = state_with("hello");
        state.extracted_record = sample_store(&["Jane Doe"]).find("Jane Doe").record().cloned();
        let agent = ScriptedAgent::new(Role::Receptionist, vec![Script::Fail("boom".into())]);

        let output = receptionist_node(&state, &agent).await;
        assert_eq!(output.message, RECEPTIONIST_APOLOGY);
        assert_eq!(output.role, Role::Receptionist);
        assert_eq!(output.extracted_record, state.extracted_record);
    }

    #[tokio::test]
    async fn test_clinical_node() {
        let agent = ScriptedAgent::new(
            Role::Clinical,
            vec![
                Script::text("Limit potassium intake. [Source: Internal Nephrology Reference]"),
                Script::text(HANDOFF_TO_RECEPTIONIST),
                Script::Fail("timeout".into()),
            ],
        );
        let state = state_with("What should I eat?");

        let output = clinical_node(&state, &agent).await;
        assert_eq!(output.role, Role::Clinical);

        let output = clinical_node(&state, &agent).await;
        assert_eq!(output.role, Role::Receptionist);

        let output = clinical_node(&state, &agent).await;
        assert_eq!(output.message, CLINICAL_APOLOGY);
        assert_eq!(output.role, Role::Clinical);
    }
}
