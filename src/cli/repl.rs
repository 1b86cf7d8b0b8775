//! Interactive REPL for Carelink
//!
//! Provides the main patient interaction loop.

use std::io::{self, BufRead, Write};

use crate::agent::{
    AppContext, ConversationState, Role, Workflow, HANDOFF_TO_CLINICAL, HANDOFF_TO_RECEPTIONIST,
    MEDICAL_DISCLAIMER,
};
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, Result};

/// Opening message shown before the first turn. Not part of the history.
pub const GREETING: &str = "Hello! I'm your post-discharge care assistant. I'm here to help with \
     questions about your medications, discharge instructions, and general health guidance.\n\n\
     To get started, please tell me your full name.";

const NO_REPLY: &str = "I'm sorry, something went wrong on my side. Could you say that again?";

fn is_handoff_marker(text: &str) -> bool {
    let text = text.trim();
    text == HANDOFF_TO_CLINICAL || text == HANDOFF_TO_RECEPTIONIST
}

/// One patient conversation: the workflow plus its state
pub struct Session {
    context: AppContext,
    workflow: Workflow,
    state: ConversationState,
}

impl Session {
    pub fn new(context: AppContext) -> Result<Self> {
        let workflow = context.workflow()?;
        Ok(Self {
            context,
            workflow,
            state: ConversationState::new(),
        })
    }

    /// Run one user turn and return the reply to show
    pub async fn send(&mut self, input: &str) -> String {
        let before = self.state.history.len();
        let state = std::mem::take(&mut self.state);
        self.state = self.workflow.step(state, input).await;

        // A turn that appended nothing beyond the user message has no reply
        if self.state.history.len() <= before + 1 {
            return NO_REPLY.to_string();
        }
        // Routing markers are never shown to the patient
        match self.state.last_assistant_message() {
            Some(m) if !is_handoff_marker(&m.content) => m.content.clone(),
            _ => NO_REPLY.to_string(),
        }
    }

    /// Start a fresh conversation
    pub fn reset(&mut self) {
        self.state = ConversationState::new();
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn config(&self) -> &Config {
        self.context.config()
    }
}

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    session: Session,
}

impl Repl {
    /// Create a REPL with custom configuration
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self {
            session: Session::new(AppContext::from_config(config))?,
        })
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        print!("Checking model server...");
        io::stdout().flush()?;

        match self.session.context().initialize().await {
            Ok(()) => println!(" ready.\n"),
            Err(e) => {
                tracing::error!(error = %e, "model check failed");
                println!("\n\nWarning: {}\nReplies will fail until this is fixed.\n", e);
            }
        }

        println!("{}: {}\n", Role::Receptionist.display_name(), GREETING);

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("You: ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();

            if input.is_empty() {
                continue;
            }

            match handle_command(input, &mut self.session).await {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Clear) => {
                    println!("Conversation cleared.\n");
                    println!("{}: {}\n", Role::Receptionist.display_name(), GREETING);
                }
                Ok(CommandResult::Handled(output)) => {
                    println!("{}\n", output);
                }
                Ok(CommandResult::Continue(input)) => {
                    let reply = self.session.send(&input).await;
                    let speaker = self.session.state().active_role.display_name();
                    println!("\n{}: {}\n", speaker, reply);
                }
                Err(e) => {
                    eprintln!("Command error: {}\n", e);
                }
            }
        }

        Ok(())
    }

    fn print_banner(&self) {
        let config = self.session.config();

        println!();
        println!("Carelink - Post-Discharge Care Assistant");
        println!("{}", MEDICAL_DISCLAIMER);
        println!();
        println!("Ollama: {}", config.ollama_url());
        println!("Model:  {}", config.models.chat);
        println!(
            "Data:   {} patient(s), {} reference section(s), web search {}",
            self.session.context().tools().records().len(),
            self.session.context().tools().reference().len(),
            if self.session.context().tools().search().is_enabled() {
                "on"
            } else {
                "off"
            }
        );
        println!();
        println!("Commands: help, status, record, clear, config, logs, exit");
        println!("────────────────────────────────────────────────────────");
    }
}

#[cfg(test)]
pub(crate) fn scripted_session(responses: Vec<crate::llm::LLMResponse>) -> Session {
    use std::sync::Arc;

    use crate::agent::testing::ScriptedProvider;
    use crate::tools::registry::sample_registry;

    let mut config = Config::default();
    config.models.chat = "test-model".to_string();
    config.logging.file = None;
    let context = AppContext::new(
        config,
        Arc::new(ScriptedProvider::new(responses)),
        Arc::new(sample_registry(&["Jane Doe"], "")),
    );
    Session::new(context).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMResponse;

    #[tokio::test]
    async fn test_send_returns_reply() {
        let mut session =
            scripted_session(vec![LLMResponse::text("Could you tell me your full name?")]);
        let reply = session.send("hello").await;
        assert_eq!(reply, "Could you tell me your full name?");
        assert_eq!(session.state().history.len(), 2);

        session.reset();
        assert!(session.state().history.is_empty());
    }

    #[tokio::test]
    async fn test_handoff_loop_never_shows_marker() {
        let responses = (0..10)
            .map(|_| LLMResponse::text(HANDOFF_TO_RECEPTIONIST))
            .collect();
        let mut session = scripted_session(responses);

        let reply = session.send("When do I pick up my medication refill?").await;
        assert_eq!(reply, NO_REPLY);
        assert_eq!(
            session.state().last_assistant_message().unwrap().content,
            HANDOFF_TO_RECEPTIONIST
        );
    }

    #[tokio::test]
    async fn test_send_degrades_to_apology() {
        let mut session = scripted_session(Vec::new());
        let reply = session.send("hello").await;
        assert_eq!(reply, crate::agent::nodes::RECEPTIONIST_APOLOGY);
    }
}
