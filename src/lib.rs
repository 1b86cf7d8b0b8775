//! Carelink - Post-Discharge Care Assistant
//!
//! A terminal assistant for recently discharged nephrology patients. A
//! receptionist role identifies the patient and retrieves their discharge
//! report; a clinical role answers medical questions from an internal
//! reference, falling back to web search. Control passes between the two
//! through handoff sentinels in their replies.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, logging, and error handling
//! - **LLM**: LLM provider abstraction with Ollama implementation
//! - **Tools**: Patient lookup, reference query, web search, and the registry
//! - **Agent**: Role agents, nodes, and the handoff workflow
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use carelink::{AppContext, Config, ConversationState};
//!
//! #[tokio::main]
//! async fn main() -> carelink::Result<()> {
//!     let context = AppContext::from_config(Config::load());
//!     context.initialize().await?;
//!
//!     let workflow = context.workflow()?;
//!     let state = workflow.step(ConversationState::new(), "My name is John Smith").await;
//!     println!("{}", state.last_assistant_message().map(|m| m.content.as_str()).unwrap_or(""));
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use agent::{AppContext, ConversationState, Role, Workflow};
pub use cli::Repl;
pub use core::{CarelinkError, Config, Result};
