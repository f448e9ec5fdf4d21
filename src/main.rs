//! pqrun command-line interface.

use anyhow::Context;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

use pqrun::config::Settings;
use pqrun::launch::{Dispatch, LaunchState, Launcher};
use pqrun::logging;
use pqrun::metadata;
use pqrun::scripts::{self, ALL_CATEGORY};

#[derive(Parser)]
#[command(
    name = "pqrun",
    about = "Quick launcher for Python scripts with #pqr header directives",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve and run a script (background unless directed otherwise)
    Run {
        script: PathBuf,
        /// Force a visible terminal window
        #[arg(long, conflicts_with = "background")]
        terminal: bool,
        /// Force a background run
        #[arg(long)]
        background: bool,
        /// Override the configured default interpreter
        #[arg(long)]
        interpreter: Option<String>,
    },
    /// List scripts discovered in registered folders
    List {
        /// Restrict to one category
        #[arg(long, default_value = ALL_CATEGORY)]
        category: String,
        /// Case-insensitive name filter
        #[arg(long, default_value = "")]
        search: String,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Manage registered script folders
    Folders {
        #[command(subcommand)]
        action: FolderAction,
    },
    /// Find a virtualenv interpreter inside a project folder
    DetectVenv { dir: PathBuf },
    /// Rewrite a script's #pqr header directive
    Annotate {
        script: PathBuf,
        #[arg(long)]
        cat: Option<String>,
        #[arg(long)]
        mac: Option<String>,
        #[arg(long)]
        win: Option<String>,
        #[arg(long)]
        linux: Option<String>,
        #[arg(long)]
        def: Option<String>,
        #[arg(long)]
        term: Option<bool>,
    },
    /// Open a script's folder in the system file manager
    Reveal { script: PathBuf },
    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum FolderAction {
    Add { path: String },
    Remove { path: String },
    List,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print current settings as JSON
    Show,
    /// Set the default interpreter path
    SetInterpreter { path: String },
    /// Set the default run mode (true = terminal)
    SetTerminal {
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let _guard = logging::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            script,
            terminal,
            background,
            interpreter,
        } => cmd_run(script, terminal, background, interpreter),
        Command::List {
            category,
            search,
            json,
        } => cmd_list(&category, &search, json),
        Command::Folders { action } => cmd_folders(action),
        Command::DetectVenv { dir } => cmd_detect_venv(&dir),
        Command::Annotate {
            script,
            cat,
            mac,
            win,
            linux,
            def,
            term,
        } => cmd_annotate(&script, cat, mac, win, linux, def, term),
        Command::Reveal { script } => cmd_reveal(&script),
        Command::Config { action } => cmd_config(action),
    }
}

fn cmd_run(
    script: PathBuf,
    terminal: bool,
    background: bool,
    interpreter: Option<String>,
) -> anyhow::Result<()> {
    let mut settings = Settings::load();
    if let Some(interpreter) = interpreter {
        settings.interpreter_path = interpreter;
    }
    if terminal {
        settings.use_terminal = true;
    }
    if background {
        settings.use_terminal = false;
    }

    let launcher = Launcher::new(settings);
    let failed = Arc::new(Mutex::new(false));
    let failed_sink = Arc::clone(&failed);
    launcher.subscribe(move |event| {
        println!("[{:?}] {}", event.state, event.message);
        if event.state == LaunchState::Failed {
            *failed_sink.lock() = true;
        }
    });

    match launcher.launch(&script) {
        Ok(Dispatch::Detached) => {}
        Ok(Dispatch::Background(handle)) => {
            // Single-shot CLI invocation: wait for the worker thread.
            if handle.join().is_err() {
                anyhow::bail!("launch worker panicked");
            }
        }
        // Already surfaced as a Failed event.
        Err(_) => std::process::exit(1),
    }

    if *failed.lock() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_list(category: &str, search: &str, json: bool) -> anyhow::Result<()> {
    let settings = Settings::load();
    let catalog = scripts::scan_folders(&settings.registered_folders);

    if json {
        let items = catalog.filtered(category, search);
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if catalog.is_empty() {
        println!("No scripts found. Register folders with: pqrun folders add <path>");
        return Ok(());
    }

    for cat in catalog.categories() {
        if category != ALL_CATEGORY && cat != category {
            continue;
        }
        let items = catalog.filtered(cat, search);
        if items.is_empty() {
            continue;
        }
        println!("{}:", cat);
        for item in items {
            let mut tags = Vec::new();
            if item.metadata.terminal_override == Some(true) {
                tags.push("terminal");
            }
            if item.metadata.interpreter_for(pqrun::resolver::Platform::current()).is_some()
                || item.metadata.interp_default.is_some()
            {
                tags.push("custom interpreter");
            }
            let suffix = if tags.is_empty() {
                String::new()
            } else {
                format!("  ({})", tags.join(", "))
            };
            println!("  {}{}", item.name, suffix);
        }
    }
    Ok(())
}

fn cmd_folders(action: FolderAction) -> anyhow::Result<()> {
    let mut settings = Settings::load();
    match action {
        FolderAction::Add { path } => {
            if settings.add_folder(&path) {
                settings.save().context("saving settings")?;
                println!("Registered: {}", path);
            } else {
                println!("Already registered: {}", path);
            }
        }
        FolderAction::Remove { path } => {
            if settings.remove_folder(&path) {
                settings.save().context("saving settings")?;
                println!("Removed: {}", path);
            } else {
                println!("Not registered: {}", path);
            }
        }
        FolderAction::List => {
            if settings.registered_folders.is_empty() {
                println!("No folders registered.");
            }
            for folder in &settings.registered_folders {
                println!("{}", folder);
            }
        }
    }
    Ok(())
}

fn cmd_detect_venv(dir: &std::path::Path) -> anyhow::Result<()> {
    match scripts::detect_venv(dir) {
        Some(interpreter) => {
            println!("{}", interpreter.display());
            Ok(())
        }
        None => {
            println!("No virtualenv found in {}", dir.display());
            std::process::exit(1);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_annotate(
    script: &std::path::Path,
    cat: Option<String>,
    mac: Option<String>,
    win: Option<String>,
    linux: Option<String>,
    def: Option<String>,
    term: Option<bool>,
) -> anyhow::Result<()> {
    let mut meta = metadata::parse_header_file(script);
    if let Some(cat) = cat {
        meta.category = cat;
    }
    if mac.is_some() {
        meta.interp_mac = mac;
    }
    if win.is_some() {
        meta.interp_win = win;
    }
    if linux.is_some() {
        meta.interp_linux = linux;
    }
    if def.is_some() {
        meta.interp_default = def;
    }
    if term.is_some() {
        meta.terminal_override = term;
    }

    metadata::write_directive(script, &meta)
        .with_context(|| format!("updating header of {}", script.display()))?;
    println!("Updated {}", script.display());
    Ok(())
}

fn cmd_reveal(script: &std::path::Path) -> anyhow::Result<()> {
    let target = script.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(script);
    open::that(target).with_context(|| format!("opening {}", target.display()))?;
    Ok(())
}

fn cmd_config(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let settings = Settings::load();
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ConfigAction::SetInterpreter { path } => {
            let mut settings = Settings::load();
            settings.interpreter_path = path;
            settings.save().context("saving settings")?;
            println!("Default interpreter: {}", settings.interpreter_path);
        }
        ConfigAction::SetTerminal { value } => {
            let mut settings = Settings::load();
            settings.use_terminal = value;
            settings.save().context("saving settings")?;
            println!(
                "Default run mode: {}",
                if value { "terminal" } else { "background" }
            );
        }
    }
    Ok(())
}
