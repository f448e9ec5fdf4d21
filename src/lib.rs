//! pqrun - quick launcher core for Python scripts.
//!
//! Scans registered folders for scripts, parses `#pqr` header
//! directives, resolves an interpreter and run mode against user
//! settings, and executes the script in the background or in a visible
//! terminal window.

pub mod config;
pub mod error;
pub mod executor;
pub mod launch;
pub mod logging;
pub mod metadata;
pub mod resolver;
pub mod scripts;
pub mod terminal;
