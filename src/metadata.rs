//! `#pqr` header directive parser.
//!
//! Scripts opt into launcher behavior by embedding comment directives in
//! their first lines. Two grammars coexist:
//!
//! - Key=value: `#pqr cat=Tools; mac=/usr/bin/python3; term=true`
//! - Legacy: `#pqr cat "Tools"`, `#pqr mac /usr/bin/python3`,
//!   `#pqr terminal true`
//!
//! Parsing never fails. Malformed fields are skipped, unreadable files
//! degrade to all-default metadata, and later lines overwrite earlier
//! ones per field.

use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::resolver::Platform;

/// Directive lines are only honored within this many lines of the file.
pub const HEADER_SCAN_LINES: usize = 20;

/// Category assigned to scripts that never set `cat`.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

const DIRECTIVE_MARKER: &str = "#pqr";

/// Launcher metadata extracted from a script header.
///
/// Produced fresh on every scan; the comment lines in the script file
/// are the source of truth and the last parse wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScriptMetadata {
    pub category: String,
    pub interp_mac: Option<String>,
    pub interp_win: Option<String>,
    pub interp_linux: Option<String>,
    /// Platform-independent `def` interpreter, consulted after the
    /// platform-specific entries.
    pub interp_default: Option<String>,
    /// Explicit `term=` / `terminal true` override. `None` defers to the
    /// user-configured run mode.
    pub terminal_override: Option<bool>,
}

impl Default for ScriptMetadata {
    fn default() -> Self {
        ScriptMetadata {
            category: DEFAULT_CATEGORY.to_string(),
            interp_mac: None,
            interp_win: None,
            interp_linux: None,
            interp_default: None,
            terminal_override: None,
        }
    }
}

impl ScriptMetadata {
    /// Interpreter path declared for the given platform, if any.
    pub fn interpreter_for(&self, platform: Platform) -> Option<&str> {
        let entry = match platform {
            Platform::Mac => &self.interp_mac,
            Platform::Win => &self.interp_win,
            Platform::Linux => &self.interp_linux,
        };
        entry.as_deref()
    }

    /// True when any field differs from its default.
    pub fn has_directives(&self) -> bool {
        *self != ScriptMetadata::default()
    }
}

/// Parse directives out of script content.
///
/// Only the first [`HEADER_SCAN_LINES`] lines are inspected; the marker
/// match is case-insensitive. Never returns an error.
pub fn parse_header(content: &str) -> ScriptMetadata {
    let mut meta = ScriptMetadata::default();

    for line in content.lines().take(HEADER_SCAN_LINES) {
        let trimmed = line.trim();
        let Some(prefix) = trimmed.get(..DIRECTIVE_MARKER.len()) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case(DIRECTIVE_MARKER) {
            continue;
        }
        let rest = &trimmed[DIRECTIVE_MARKER.len()..];

        // The two grammars never mix on a single line: any `=` selects
        // the key=value form.
        if rest.contains('=') {
            apply_key_value_fields(rest, &mut meta);
        } else {
            apply_legacy_line(rest, &mut meta);
        }
    }

    meta
}

/// Parse directives from a script file on disk.
///
/// An unreadable file is not an error; it yields all-default metadata.
pub fn parse_header_file(path: &Path) -> ScriptMetadata {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_header(&content),
        Err(e) => {
            debug!(
                error = %e,
                path = %path.display(),
                "Could not read script header, using defaults"
            );
            ScriptMetadata::default()
        }
    }
}

/// `key=value; key=value` fields after the marker.
fn apply_key_value_fields(rest: &str, meta: &mut ScriptMetadata) {
    for field in rest.split(';') {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "cat" => meta.category = value.to_string(),
            "mac" => meta.interp_mac = Some(value.to_string()),
            "win" => meta.interp_win = Some(value.to_string()),
            "linux" | "ubuntu" => meta.interp_linux = Some(value.to_string()),
            "def" => meta.interp_default = Some(value.to_string()),
            "term" => {
                if let Some(flag) = parse_bool_token(value) {
                    meta.terminal_override = Some(flag);
                } else {
                    debug!(value = %value, "Unrecognized term token, override left unset");
                }
            }
            _ => debug!(key = %key, "Ignoring unknown directive key"),
        }
    }
}

/// Legacy directives: `cat "value"`, `mac /path`, `terminal true`.
///
/// Keyed forms are dispatched on the first word after the marker, so a
/// quoted value containing "terminal true" stays a value.
fn apply_legacy_line(rest: &str, meta: &mut ScriptMetadata) {
    let rest = rest.trim();
    let Some((key, remainder)) = rest.split_once(char::is_whitespace) else {
        return;
    };
    let key = key.to_ascii_lowercase();
    let remainder = remainder.trim();

    match key.as_str() {
        // Category values are quoted in the legacy grammar.
        "cat" => {
            if let Some(value) = quoted_value(remainder) {
                meta.category = value.to_string();
            }
        }
        // Interpreter paths were written both quoted and bare across
        // legacy variants; accept either.
        "mac" => apply_legacy_path(remainder, &mut meta.interp_mac),
        "win" => apply_legacy_path(remainder, &mut meta.interp_win),
        "linux" | "ubuntu" => apply_legacy_path(remainder, &mut meta.interp_linux),
        "terminal" => {
            if remainder.to_ascii_lowercase().contains("true") {
                meta.terminal_override = Some(true);
            }
        }
        _ => debug!(key = %key, "Ignoring unknown legacy directive"),
    }
}

fn apply_legacy_path(remainder: &str, slot: &mut Option<String>) {
    let value = quoted_value(remainder).unwrap_or(remainder);
    if !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

/// Substring strictly between the first and last double-quote, if the
/// text carries a quoted value.
fn quoted_value(text: &str) -> Option<&str> {
    let first = text.find('"')?;
    let last = text.rfind('"')?;
    if last <= first {
        return None;
    }
    Some(&text[first + 1..last])
}

fn parse_bool_token(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Rewrite a script's `#pqr` header to a single canonical key=value line.
///
/// Existing directive lines are removed (first one replaced, duplicates
/// dropped). When the script has none, the directive is inserted at the
/// top, after a shebang if present.
pub fn write_directive(path: &Path, meta: &ScriptMetadata) -> std::io::Result<()> {
    let content = std::fs::read_to_string(path)?;
    let directive = canonical_directive(meta);

    let mut new_lines: Vec<&str> = Vec::new();
    let mut replaced = false;

    for line in content.lines() {
        let trimmed = line.trim();
        let is_directive = trimmed
            .get(..DIRECTIVE_MARKER.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(DIRECTIVE_MARKER));
        if is_directive {
            if !replaced {
                new_lines.push(&directive);
                replaced = true;
            }
            continue;
        }
        new_lines.push(line);
    }

    if !replaced {
        let at = match new_lines.first() {
            Some(first) if first.trim_start().starts_with("#!") => 1,
            _ => 0,
        };
        new_lines.insert(at, &directive);
    }

    debug!(path = %path.display(), directive = %directive, "Rewriting script header");
    std::fs::write(path, new_lines.join("\n") + "\n")
}

/// Canonical key=value rendering of the metadata, omitting unset fields.
fn canonical_directive(meta: &ScriptMetadata) -> String {
    let mut fields = vec![format!("cat={}", meta.category)];
    if let Some(ref mac) = meta.interp_mac {
        fields.push(format!("mac={}", mac));
    }
    if let Some(ref win) = meta.interp_win {
        fields.push(format!("win={}", win));
    }
    if let Some(ref linux) = meta.interp_linux {
        fields.push(format!("linux={}", linux));
    }
    if let Some(ref def) = meta.interp_default {
        fields.push(format!("def={}", def));
    }
    if let Some(term) = meta.terminal_override {
        fields.push(format!("term={}", term));
    }
    format!("{} {}", DIRECTIVE_MARKER, fields.join("; "))
}
