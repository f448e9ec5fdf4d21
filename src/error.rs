use thiserror::Error;
use tracing::{error, warn};

/// Error severity for status display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,    // informational
    Warning, // recoverable
    Error,   // launch failed
}

/// Domain-specific errors for script launching.
///
/// None of these are fatal to the launcher itself; every variant maps to
/// a status message and the launcher stays usable afterwards.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Interpreter not found: {path}")]
    InterpreterNotFound { path: String },

    #[error("Process spawn failed: {0}")]
    ProcessSpawn(String),

    #[error("Script exited with code {exit_code}")]
    NonZeroExit {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("No supported terminal emulator found")]
    TerminalUnavailable,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LaunchError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InterpreterNotFound { .. } => ErrorSeverity::Error,
            Self::ProcessSpawn(_) => ErrorSeverity::Error,
            Self::NonZeroExit { .. } => ErrorSeverity::Error,
            Self::TerminalUnavailable => ErrorSeverity::Error,
            Self::Config(_) => ErrorSeverity::Warning,
        }
    }

    /// Message suitable for the status surface.
    pub fn user_message(&self) -> String {
        match self {
            Self::InterpreterNotFound { path } => {
                format!("Interpreter not found: {}", path)
            }
            Self::ProcessSpawn(msg) => format!("Could not start process: {}", msg),
            Self::NonZeroExit {
                exit_code,
                stdout,
                stderr,
            } => {
                let detail = if !stderr.trim().is_empty() {
                    stderr.trim()
                } else {
                    stdout.trim()
                };
                if detail.is_empty() {
                    format!("Script failed with exit code {}", exit_code)
                } else {
                    format!("Script failed with exit code {}:\n{}", exit_code, detail)
                }
            }
            Self::TerminalUnavailable => "No supported terminal found".to_string(),
            Self::Config(msg) => format!("Configuration issue: {}", msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the user doesn't need to know.
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        let err = LaunchError::InterpreterNotFound {
            path: "/missing/python".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Error);
        assert_eq!(
            LaunchError::Config("bad json".to_string()).severity(),
            ErrorSeverity::Warning
        );
    }

    #[test]
    fn test_non_zero_exit_message_prefers_stderr() {
        let err = LaunchError::NonZeroExit {
            exit_code: 2,
            stdout: "some output".to_string(),
            stderr: "Traceback: boom".to_string(),
        };
        let msg = err.user_message();
        assert!(msg.contains("exit code 2"));
        assert!(msg.contains("Traceback: boom"));
        assert!(!msg.contains("some output"));
    }

    #[test]
    fn test_non_zero_exit_message_falls_back_to_stdout() {
        let err = LaunchError::NonZeroExit {
            exit_code: 1,
            stdout: "printed before dying".to_string(),
            stderr: "   ".to_string(),
        };
        assert!(err.user_message().contains("printed before dying"));
    }

    #[test]
    fn test_log_err_returns_option() {
        let ok: std::result::Result<u32, String> = Ok(7);
        assert_eq!(ok.log_err(), Some(7));
        let bad: std::result::Result<u32, String> = Err("nope".to_string());
        assert_eq!(bad.log_err(), None);
    }
}
