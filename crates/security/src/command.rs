//! Command allowlisting for the command sandbox.

/// Which shell commands the agent may run.
///
/// An empty allowlist permits everything; otherwise the first word of the
/// command must be listed. Command chaining is refused under an allowlist,
/// since `git status; rm -rf ~` would otherwise pass as `git`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandPolicy {
    allowed_commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandDenied {
    #[error("command '{0}' is not in the allowlist")]
    NotAllowed(String),

    #[error("command chaining and substitution are not allowed with an allowlist")]
    Chained,

    #[error("command is empty")]
    Empty,
}

const CHAIN_TOKENS: &[&str] = &[";", "&&", "||", "|", "`", "$(", "\n", ">", "<"];

impl CommandPolicy {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self { allowed_commands }
    }

    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allowed_commands.is_empty() || self.allowed_commands.iter().any(|c| c == "*")
    }

    pub fn check(&self, command: &str) -> Result<(), CommandDenied> {
        let base_cmd = command.split_whitespace().next().unwrap_or("").trim();
        if base_cmd.is_empty() {
            return Err(CommandDenied::Empty);
        }
        if self.is_unrestricted() {
            return Ok(());
        }
        if CHAIN_TOKENS.iter().any(|t| command.contains(t)) {
            return Err(CommandDenied::Chained);
        }
        if self.allowed_commands.iter().any(|a| a == base_cmd) {
            Ok(())
        } else {
            Err(CommandDenied::NotAllowed(base_cmd.to_string()))
        }
    }
}
