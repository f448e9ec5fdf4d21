//! Launch orchestration and the per-invocation state machine.
//!
//! A single launch moves through:
//!
//! ```text
//! Idle -> Resolving -> Launching -> Running -> Succeeded | Failed
//!                   \-> Failed (InterpreterNotFound)
//! Launching -> Detached            (terminal mode, fire-and-forget)
//! ```
//!
//! The [`Launcher`] resolves a script, dispatches it, and publishes
//! [`LaunchEvent`]s to subscribers. Launches are independent; there is
//! no shared mutable resolver state, no cancellation, and no timeout.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, instrument};

use crate::config::Settings;
use crate::error::{LaunchError, Result};
use crate::executor;
use crate::logging;
use crate::metadata;
use crate::resolver::{self, Platform};
use crate::terminal;

/// Observable states of a single script invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaunchState {
    Idle,
    Resolving,
    Launching,
    Running,
    Succeeded,
    /// Terminal-mode launches detach here; the launcher has no further
    /// visibility into the script.
    Detached,
    Failed,
}

/// Status notification delivered to subscribers.
#[derive(Clone, Debug)]
pub struct LaunchEvent {
    pub script: PathBuf,
    pub state: LaunchState,
    pub message: String,
}

/// How a launch was dispatched.
#[derive(Debug)]
pub enum Dispatch {
    /// Terminal mode: the script lives in its own window now.
    Detached,
    /// Background mode: join the handle to wait for completion; the
    /// outcome arrives as events.
    Background(JoinHandle<()>),
}

type Listener = Box<dyn Fn(&LaunchEvent) + Send + Sync>;

/// Resolves and dispatches scripts, notifying subscribers of progress.
///
/// Explicit subscribe/notify stands in for the platform reactivity the
/// GUI front ends used; the listener list is the only shared state and
/// each launch is otherwise independent.
pub struct Launcher {
    settings: Settings,
    platform: Platform,
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl Launcher {
    pub fn new(settings: Settings) -> Self {
        Self::with_platform(settings, Platform::current())
    }

    pub fn with_platform(settings: Settings, platform: Platform) -> Self {
        Launcher {
            settings,
            platform,
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Register a status listener. Listeners receive every event for
    /// every launch, including those emitted from worker threads.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&LaunchEvent) + Send + Sync + 'static,
    {
        self.listeners.lock().push(Box::new(listener));
    }

    /// Resolve and dispatch one script.
    ///
    /// Resolution failures return the error after a `Failed` event; once
    /// dispatch succeeds, background failures surface only as events.
    #[instrument(skip(self), fields(script = %script.display()))]
    pub fn launch(&self, script: &Path) -> Result<Dispatch> {
        notify(
            &self.listeners,
            script,
            LaunchState::Resolving,
            format!("Resolving {}", display_name(script)),
        );

        let meta = metadata::parse_header_file(script);
        let decision = match resolver::resolve(script, &meta, self.platform, &self.settings) {
            Ok(decision) => decision,
            Err(e) => {
                notify(&self.listeners, script, LaunchState::Failed, e.user_message());
                return Err(e);
            }
        };

        notify(
            &self.listeners,
            script,
            LaunchState::Launching,
            format!("Using: {}", decision.interpreter.display()),
        );

        if decision.run_in_terminal {
            return match terminal::launch(&decision) {
                Ok(()) => {
                    info!(script = %script.display(), "Terminal launch detached");
                    notify(
                        &self.listeners,
                        script,
                        LaunchState::Detached,
                        "Launched in terminal".to_string(),
                    );
                    Ok(Dispatch::Detached)
                }
                Err(e) => {
                    notify(&self.listeners, script, LaunchState::Failed, e.user_message());
                    Err(e)
                }
            };
        }

        let listeners = Arc::clone(&self.listeners);
        let script_path = script.to_path_buf();
        notify(
            &self.listeners,
            script,
            LaunchState::Running,
            format!("Running {}", display_name(script)),
        );

        let handle = executor::run_in_background(decision, move |result| match result {
            Ok(outcome) if outcome.success => {
                notify(
                    &listeners,
                    &script_path,
                    LaunchState::Succeeded,
                    outcome.status_line(),
                );
            }
            Ok(outcome) => {
                let err = LaunchError::NonZeroExit {
                    exit_code: outcome.exit_code,
                    stdout: outcome.stdout,
                    stderr: outcome.stderr,
                };
                notify(&listeners, &script_path, LaunchState::Failed, err.user_message());
            }
            Err(e) => {
                notify(&listeners, &script_path, LaunchState::Failed, e.user_message());
            }
        });

        Ok(Dispatch::Background(handle))
    }
}

fn notify(
    listeners: &Arc<Mutex<Vec<Listener>>>,
    script: &Path,
    state: LaunchState,
    message: String,
) {
    let event = LaunchEvent {
        script: script.to_path_buf(),
        state,
        message,
    };
    logging::record_status(&format!("{}: {}", display_name(script), event.message));
    for listener in listeners.lock().iter() {
        listener(&event);
    }
}

fn display_name(script: &Path) -> String {
    script
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| script.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    // /bin/sh stands in for a Python interpreter throughout; the launch
    // pipeline only cares that argv[1] is the script path.
    fn launcher_with(use_terminal: bool) -> Launcher {
        let settings = Settings {
            interpreter_path: "/bin/sh".to_string(),
            use_terminal,
            ..Default::default()
        };
        Launcher::with_platform(settings, Platform::Linux)
    }

    fn record_events(launcher: &Launcher) -> Arc<Mutex<Vec<(LaunchState, String)>>> {
        let events: Arc<Mutex<Vec<(LaunchState, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        launcher.subscribe(move |event| {
            sink.lock().push((event.state.clone(), event.message.clone()));
        });
        events
    }

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn join(dispatch: Dispatch) {
        match dispatch {
            Dispatch::Background(handle) => handle.join().unwrap(),
            Dispatch::Detached => panic!("expected background dispatch"),
        }
    }

    #[test]
    fn test_successful_background_launch_state_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "ok.py", "#pqr term=false\necho fine\n");

        let launcher = launcher_with(false);
        let events = record_events(&launcher);
        join(launcher.launch(&script).unwrap());

        let states: Vec<LaunchState> =
            events.lock().iter().map(|(s, _)| s.clone()).collect();
        assert_eq!(
            states,
            vec![
                LaunchState::Resolving,
                LaunchState::Launching,
                LaunchState::Running,
                LaunchState::Succeeded,
            ]
        );
    }

    #[test]
    fn test_non_zero_exit_reports_failed() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "bad.py", "echo oops >&2\nexit 7\n");

        let launcher = launcher_with(false);
        let events = record_events(&launcher);
        join(launcher.launch(&script).unwrap());

        let events = events.lock();
        let (state, message) = events.last().unwrap();
        assert_eq!(*state, LaunchState::Failed);
        assert!(message.contains("exit code 7"));
        assert!(message.contains("oops"));
    }

    #[test]
    fn test_interpreter_not_found_blocks_launch() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "orphan.py",
            "#pqr linux=/nonexistent/bin/python9\n",
        );

        let launcher = launcher_with(false);
        let events = record_events(&launcher);
        let err = launcher.launch(&script).unwrap_err();
        assert!(matches!(err, LaunchError::InterpreterNotFound { .. }));

        let events = events.lock();
        let (state, message) = events.last().unwrap();
        assert_eq!(*state, LaunchState::Failed);
        assert!(message.contains("/nonexistent/bin/python9"));
        // Resolving happened, Launching never did.
        assert!(!events.iter().any(|(s, _)| *s == LaunchState::Launching));
    }

    #[test]
    fn test_metadata_terminal_false_overrides_terminal_default() {
        // User default says terminal, script says background: the
        // script must run in the background pipeline (and succeed).
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "quiet.py", "#pqr term=false\necho quiet\n");

        let launcher = launcher_with(true);
        let events = record_events(&launcher);
        join(launcher.launch(&script).unwrap());

        let states: Vec<LaunchState> =
            events.lock().iter().map(|(s, _)| s.clone()).collect();
        assert!(states.contains(&LaunchState::Succeeded));
        assert!(!states.contains(&LaunchState::Detached));
    }

    #[test]
    fn test_terminal_directive_never_dispatches_to_background() {
        // User default says background, script says terminal: the
        // launch must route to the terminal branch. In a headless
        // environment that branch may fail for want of an emulator,
        // but it must never fall back to a background run.
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "windowed.py", "#pqr term=true\necho hi\n");

        let launcher = launcher_with(false);
        let events = record_events(&launcher);

        match launcher.launch(&script) {
            Ok(Dispatch::Detached) => {}
            Err(LaunchError::TerminalUnavailable) => {}
            Ok(Dispatch::Background(_)) => panic!("term=true script dispatched to background"),
            Err(other) => panic!("unexpected error: {other:?}"),
        }

        let states: Vec<LaunchState> =
            events.lock().iter().map(|(s, _)| s.clone()).collect();
        assert!(states.contains(&LaunchState::Launching));
        assert!(!states.contains(&LaunchState::Running));
        assert!(!states.contains(&LaunchState::Succeeded));
    }

    #[test]
    fn test_concurrent_launches_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_script(dir.path(), "a.py", "echo a\n");
        let b = write_script(dir.path(), "b.py", "echo b\n");

        let launcher = launcher_with(false);
        let events = record_events(&launcher);

        let da = launcher.launch(&a).unwrap();
        let db = launcher.launch(&b).unwrap();
        join(da);
        join(db);

        let events = events.lock();
        let success_count = events
            .iter()
            .filter(|(s, _)| *s == LaunchState::Succeeded)
            .count();
        assert_eq!(success_count, 2);
    }

    #[test]
    fn test_launcher_usable_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let broken = write_script(dir.path(), "broken.py", "#pqr linux=/missing/python\n");
        let fine = write_script(dir.path(), "fine.py", "echo ok\n");

        let launcher = launcher_with(false);
        let events = record_events(&launcher);

        assert!(launcher.launch(&broken).is_err());
        join(launcher.launch(&fine).unwrap());

        let states: Vec<LaunchState> =
            events.lock().iter().map(|(s, _)| s.clone()).collect();
        assert!(states.contains(&LaunchState::Failed));
        assert!(states.contains(&LaunchState::Succeeded));
    }
}
