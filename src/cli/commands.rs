//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use std::path::Path;

use crate::cli::repl::Session;
use crate::core::{Config, Result};

const DEFAULT_LOG_LINES: usize = 20;

/// Result of parsing a command
pub enum CommandResult {
    /// Continue processing as normal input
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// Conversation state was reset
    Clear,
}

/// Parse and handle special commands
pub async fn handle_command(input: &str, session: &mut Session) -> Result<CommandResult> {
    let input = input.trim();
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    // Commands are single words; anything longer is a patient message
    if parts.len() > 1 && !matches!(cmd.as_str(), "logs" | "config") {
        return Ok(CommandResult::Continue(input.to_string()));
    }

    match cmd.as_str() {
        "exit" | "quit" => Ok(CommandResult::Exit),

        "clear" | "reset" => {
            session.reset();
            Ok(CommandResult::Clear)
        }

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "status" => Ok(CommandResult::Handled(status_text(session))),

        "record" => Ok(CommandResult::Handled(
            session
                .state()
                .record_json()
                .unwrap_or_else(|| "No patient record retrieved yet.".to_string()),
        )),

        "config" => match args {
            "save" => {
                let path = session.config().save()?;
                Ok(CommandResult::Handled(format!(
                    "Configuration saved to {}",
                    path.display()
                )))
            }
            "" => Ok(CommandResult::Handled(format!(
                "# {}\n{}",
                Config::config_file().display(),
                session.config().to_toml()
            ))),
            "default" => Ok(CommandResult::Handled(Config::default_config_toml())),
            _ => Ok(CommandResult::Handled(
                "Usage: config [save|default]".to_string(),
            )),
        },

        "logs" => {
            let lines = args.parse().unwrap_or(DEFAULT_LOG_LINES);
            Ok(CommandResult::Handled(match &session.config().logging.file {
                Some(path) => tail_file(path, lines)?,
                None => "File logging is disabled.".to_string(),
            }))
        }

        _ => Ok(CommandResult::Continue(input.to_string())),
    }
}

fn status_text(session: &Session) -> String {
    let state = session.state();
    format!(
        "Carelink Status:\n\
         ─────────────────────────────\n\
         Active role:  {}\n\
         Patient:      {}\n\
         History:      {} messages\n\
         Model:        {}\n\
         Step budget:  {}\n\
         Debug:        {}",
        state.active_role.display_name(),
        state
            .extracted_record
            .as_ref()
            .map(|r| r.patient_name.as_str())
            .unwrap_or("(not identified)"),
        state.history.len(),
        session.config().models.chat,
        session.config().agent.max_steps,
        if session.config().agent.debug {
            "on"
        } else {
            "off"
        }
    )
}

/// Last `lines` lines of a text file
fn tail_file(path: &Path, lines: usize) -> Result<String> {
    if !path.exists() {
        return Ok(format!("No log file at {}", path.display()));
    }
    let content = std::fs::read_to_string(path)?;
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    Ok(all[start..].join("\n"))
}

/// Generate help text
fn help_text() -> String {
    r#"Carelink Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit       Exit Carelink
  clear, reset     Start a new conversation
  status           Show the active role and patient
  record           Show the retrieved discharge report
  config [save]    Show or save the configuration
  config default   Show the default configuration
  logs [n]         Show the last n lines of the log file

Keyboard Shortcuts:
  Ctrl+C           Cancel current operation
  Ctrl+D           Exit Carelink

Tips:
  - Start by telling the assistant your full name
  - Medical questions are answered by the clinical agent
─────────────────────────────────────────────"#
        .to_string()
}
