//! Execution resolver.
//!
//! Merges parsed header metadata with user settings and platform
//! fallbacks into a final [`ExecutionDecision`]: which interpreter to
//! run, whether to attach a terminal, and where to run it.

use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::config::Settings;
use crate::error::LaunchError;
use crate::metadata::ScriptMetadata;

/// Platform tag used by `#pqr` directives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Mac,
    Win,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else if cfg!(target_os = "windows") {
            Platform::Win
        } else {
            Platform::Linux
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Platform::Mac => "mac",
            Platform::Win => "win",
            Platform::Linux => "linux",
        }
    }

    /// Interpreter of last resort when neither the script nor the user
    /// configured one.
    fn fallback_interpreter(&self) -> &'static str {
        match self {
            Platform::Win => "python",
            Platform::Mac | Platform::Linux => "/usr/bin/python3",
        }
    }
}

/// Final, ephemeral launch decision. Consumed immediately by the
/// executor or terminal launcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionDecision {
    pub interpreter: PathBuf,
    pub run_in_terminal: bool,
    pub working_dir: PathBuf,
    pub script: PathBuf,
}

/// Resolve an execution decision for a script.
///
/// Interpreter precedence, highest first: metadata entry for the current
/// platform, metadata `def`, the user-configured default, then the
/// platform fallback. The first candidate that exists on disk (bare
/// names are resolved through PATH) wins; if the winning candidate does
/// not exist the resolution fails with `InterpreterNotFound` and nothing
/// is spawned.
#[instrument(skip_all, fields(script = %script.display(), platform = platform.tag()))]
pub fn resolve(
    script: &Path,
    meta: &ScriptMetadata,
    platform: Platform,
    settings: &Settings,
) -> Result<ExecutionDecision, LaunchError> {
    let candidate = meta
        .interpreter_for(platform)
        .or(meta.interp_default.as_deref())
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            let configured = settings.interpreter_path.trim();
            (!configured.is_empty()).then_some(configured)
        })
        .unwrap_or_else(|| platform.fallback_interpreter());

    let interpreter = locate_interpreter(candidate).ok_or_else(|| {
        LaunchError::InterpreterNotFound {
            path: candidate.to_string(),
        }
    })?;

    // Scripts always run from their own directory, not the launcher's.
    let working_dir = script
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let run_in_terminal = meta
        .terminal_override
        .unwrap_or(settings.use_terminal);

    debug!(
        interpreter = %interpreter.display(),
        run_in_terminal = run_in_terminal,
        working_dir = %working_dir.display(),
        "Resolved execution decision"
    );

    Ok(ExecutionDecision {
        interpreter,
        run_in_terminal,
        working_dir,
        script: script.to_path_buf(),
    })
}

/// Locate an interpreter candidate on disk.
///
/// Leading `~` is expanded first. Bare names (no path separator) go
/// through a PATH lookup; anything else must exist as given.
fn locate_interpreter(candidate: &str) -> Option<PathBuf> {
    let expanded = shellexpand::tilde(candidate);
    let path = Path::new(expanded.as_ref());

    if path.components().count() > 1 {
        return path.exists().then(|| path.to_path_buf());
    }
    which::which(expanded.as_ref()).ok()
}
