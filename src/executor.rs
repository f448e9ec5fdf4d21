//! Background script execution.
//!
//! Spawns the resolved interpreter with the script path as its sole
//! argument, working directory set to the script's folder, and captures
//! stdout/stderr plus the exit code. The wait is blocking; callers that
//! must stay interactive use [`run_in_background`], which moves the
//! blocking wait onto its own thread and delivers the outcome through a
//! callback.

use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::error::LaunchError;
use crate::resolver::ExecutionDecision;

/// Result of a completed background run.
#[derive(Clone, Debug)]
pub struct ExecutionOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl ExecutionOutcome {
    /// Short status line for the user surface.
    pub fn status_line(&self) -> String {
        if self.success {
            if self.stdout.trim().is_empty() {
                "Success (no output)".to_string()
            } else {
                format!("Success:\n{}", self.stdout.trim_end())
            }
        } else {
            format!("Failed with exit code {}", self.exit_code)
        }
    }
}

/// Run a decision to completion, blocking the calling thread.
///
/// A spawn failure is an error; a non-zero exit is not — the script ran
/// and the outcome reports how it went.
#[instrument(skip_all, fields(script = %decision.script.display()))]
pub fn run_blocking(decision: &ExecutionDecision) -> Result<ExecutionOutcome, LaunchError> {
    let start = Instant::now();
    debug!(
        interpreter = %decision.interpreter.display(),
        working_dir = %decision.working_dir.display(),
        "Spawning background script process"
    );

    let output = Command::new(&decision.interpreter)
        .arg(&decision.script)
        .current_dir(&decision.working_dir)
        .env("PYTHONUNBUFFERED", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            error!(error = %e, interpreter = %decision.interpreter.display(), "Process spawn failed");
            LaunchError::ProcessSpawn(format!(
                "Failed to spawn '{}': {}",
                decision.interpreter.display(),
                e
            ))
        })?;

    let outcome = ExecutionOutcome {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
    };

    info!(
        duration_ms = start.elapsed().as_millis() as u64,
        exit_code = outcome.exit_code,
        stdout_bytes = outcome.stdout.len(),
        stderr_bytes = outcome.stderr.len(),
        "Background script completed"
    );

    Ok(outcome)
}

/// Run a decision on a worker thread, delivering the outcome through
/// `on_done`. Join the returned handle to wait for completion; there is
/// no cancellation once spawned.
pub fn run_in_background<F>(decision: ExecutionDecision, on_done: F) -> JoinHandle<()>
where
    F: FnOnce(Result<ExecutionOutcome, LaunchError>) + Send + 'static,
{
    std::thread::spawn(move || {
        let result = run_blocking(&decision);
        on_done(result);
    })
}
