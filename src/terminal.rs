//! Visible-terminal launches.
//!
//! Builds one composed command line per platform family (POSIX sh vs
//! cmd.exe) that changes into the working directory, invokes the
//! interpreter with the quoted script path, echoes the exit status, and
//! holds the window open. The launch is fire-and-forget: once the
//! terminal spawns, the launcher has no further visibility into the
//! script's fate.

use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::error::LaunchError;
use crate::resolver::ExecutionDecision;

/// Platform family the composed command targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShellFamily {
    Posix,
    Cmd,
}

impl ShellFamily {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            ShellFamily::Cmd
        } else {
            ShellFamily::Posix
        }
    }
}

/// Terminal emulators probed on Linux, in preference order. Each entry
/// is (binary, args preceding the command string).
const LINUX_TERMINALS: &[(&str, &[&str])] = &[
    ("gnome-terminal", &["--", "bash", "-c"]),
    ("konsole", &["-e", "bash", "-c"]),
    ("xfce4-terminal", &["-x", "bash", "-c"]),
    ("xterm", &["-e", "bash", "-c"]),
];

/// Compose the full in-terminal command line for a decision.
pub fn compose_command(decision: &ExecutionDecision, family: ShellFamily) -> String {
    let dir = decision.working_dir.display().to_string();
    let interp = decision.interpreter.display().to_string();
    let script = decision.script.display().to_string();

    match family {
        ShellFamily::Posix => format!(
            "cd {dir} && {interp} {script}; echo; echo \"Exit Code: $?\"; read -p 'Press Enter to exit...'",
            dir = sh_quote(&dir),
            interp = sh_quote(&interp),
            script = sh_quote(&script),
        ),
        ShellFamily::Cmd => format!(
            "cd /d \"{dir}\" && \"{interp}\" \"{script}\" & echo. & echo Exit Code: %ERRORLEVEL% & pause"
        ),
    }
}

/// Single-quote a string for POSIX sh, escaping embedded quotes.
fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Open a terminal window running the decision's command line.
///
/// Errors only when no emulator is available or the emulator itself
/// fails to spawn; after that the launch is detached.
pub fn launch(decision: &ExecutionDecision) -> Result<(), LaunchError> {
    #[cfg(target_os = "macos")]
    {
        launch_macos(decision)
    }
    #[cfg(target_os = "windows")]
    {
        launch_windows(decision)
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        launch_linux(decision)
    }
}

#[cfg(target_os = "macos")]
fn launch_macos(decision: &ExecutionDecision) -> Result<(), LaunchError> {
    let command_line = compose_command(decision, ShellFamily::Posix);
    // AppleScript string literal: escape backslashes then quotes.
    let escaped = command_line.replace('\\', "\\\\").replace('"', "\\\"");
    let source = format!("tell application \"Terminal\" to do script \"{}\"", escaped);

    debug!(source = %source, "Launching Terminal.app via osascript");
    Command::new("osascript")
        .arg("-e")
        .arg(&source)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| LaunchError::ProcessSpawn(format!("osascript: {}", e)))?;

    info!(script = %decision.script.display(), "Detached terminal launch");
    Ok(())
}

#[cfg(target_os = "windows")]
fn launch_windows(decision: &ExecutionDecision) -> Result<(), LaunchError> {
    use std::os::windows::process::CommandExt;

    let command_line = compose_command(decision, ShellFamily::Cmd);
    debug!(command_line = %command_line, "Launching cmd.exe console");

    Command::new("cmd.exe")
        .raw_arg(format!("/k {}", command_line))
        .spawn()
        .map_err(|e| LaunchError::ProcessSpawn(format!("cmd.exe: {}", e)))?;

    info!(script = %decision.script.display(), "Detached terminal launch");
    Ok(())
}

#[cfg(all(unix, not(target_os = "macos")))]
fn launch_linux(decision: &ExecutionDecision) -> Result<(), LaunchError> {
    let command_line = compose_command(decision, ShellFamily::Posix);

    for (binary, prefix_args) in LINUX_TERMINALS {
        let Ok(emulator) = which::which(binary) else {
            continue;
        };
        debug!(emulator = %emulator.display(), "Found terminal emulator");

        match Command::new(&emulator)
            .args(*prefix_args)
            .arg(&command_line)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(_) => {
                info!(
                    emulator = %emulator.display(),
                    script = %decision.script.display(),
                    "Detached terminal launch"
                );
                return Ok(());
            }
            Err(e) => {
                warn!(emulator = %emulator.display(), error = %e, "Emulator failed to spawn, trying next");
            }
        }
    }

    warn!("No supported terminal emulator found on PATH");
    Err(LaunchError::TerminalUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn decision() -> ExecutionDecision {
        ExecutionDecision {
            interpreter: PathBuf::from("/usr/bin/python3"),
            run_in_terminal: true,
            working_dir: PathBuf::from("/home/user/my tools"),
            script: PathBuf::from("/home/user/my tools/report.py"),
        }
    }

    #[test]
    fn test_posix_command_shape() {
        let cmd = compose_command(&decision(), ShellFamily::Posix);
        assert!(cmd.starts_with("cd '/home/user/my tools' && "));
        assert!(cmd.contains("'/usr/bin/python3' '/home/user/my tools/report.py'"));
        assert!(cmd.contains("Exit Code: $?"));
        assert!(cmd.contains("read -p"));
    }

    #[test]
    fn test_cmd_command_shape() {
        let cmd = compose_command(&decision(), ShellFamily::Cmd);
        assert!(cmd.starts_with("cd /d \"/home/user/my tools\""));
        assert!(cmd.contains("%ERRORLEVEL%"));
        assert!(cmd.contains("pause"));
    }

    #[cfg(unix)]
    #[test]
    fn test_current_family_on_unix() {
        assert_eq!(ShellFamily::current(), ShellFamily::Posix);
    }

    #[test]
    fn test_sh_quote_escapes_single_quotes() {
        assert_eq!(sh_quote("it's"), r"'it'\''s'");
        assert_eq!(sh_quote("plain"), "'plain'");
    }

    #[test]
    fn test_posix_quoting_survives_awkward_paths() {
        let mut d = decision();
        d.script = PathBuf::from("/tmp/o'brien.py");
        let cmd = compose_command(&d, ShellFamily::Posix);
        assert!(cmd.contains(r"'/tmp/o'\''brien.py'"));
    }
}
