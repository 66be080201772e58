//! CLI error types and exit codes

use thiserror::Error;

use shadowlink_core::ShadowlinkError;
use shadowlink_sync::ReconciliationError;

use crate::config::ConfigError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error (I/O, incomplete pass, broken link)
/// - 2: Configuration error (unknown kind, bad settings)
/// - 3: Repository error
/// - 4: Validation error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Data file error: {0}")]
    DataFile(String),

    #[error("Reconciliation finished with {failed} failed action(s)")]
    Incomplete { failed: u32 },

    #[error("Reconciliation was cancelled; run it again to finish")]
    Cancelled,

    #[error("Link of {record} is {state}")]
    LinkBroken { record: String, state: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Repository(_) => 3,
            CliError::Validation(_) | CliError::NotFound(_) => 4,
            CliError::Io(_)
            | CliError::DataFile(_)
            | CliError::Incomplete { .. }
            | CliError::Cancelled
            | CliError::LinkBroken { .. } => 1,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Incomplete { .. } => {
                Some("Fix the failing records and run 'shadowlink sync' again.")
            }
            CliError::LinkBroken { .. } => Some("Run 'shadowlink sync' to repair the link."),
            CliError::DataFile(_) => Some("Point SHADOWLINK_DATA at a shadowlink snapshot file."),
            _ => None,
        }
    }
}

impl From<ShadowlinkError> for CliError {
    fn from(e: ShadowlinkError) -> Self {
        match e {
            ShadowlinkError::Configuration { message } => CliError::Config(message),
            ShadowlinkError::Repository { message, .. } => CliError::Repository(message),
            other @ ShadowlinkError::Validation { .. } => CliError::Validation(other.to_string()),
            other @ ShadowlinkError::NotFound { .. } => CliError::NotFound(other.to_string()),
        }
    }
}

impl From<ReconciliationError> for CliError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::Configuration(msg) => CliError::Config(msg),
            ReconciliationError::Cancelled => CliError::Cancelled,
            ReconciliationError::Scan { .. } | ReconciliationError::Aborted { .. } => {
                match e.cause().map(ShadowlinkError::kind) {
                    Some("validation") => CliError::Validation(e.to_string()),
                    _ => CliError::Repository(e.to_string()),
                }
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::DataFile(format!("JSON error: {}", e))
    }
}
