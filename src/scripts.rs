//! Script catalog: folder scanning, category grouping, search.
//!
//! Registered folders are enumerated for `.py` entries, each header is
//! parsed, and the results are grouped by category. Categories sort
//! alphabetically with "Uncategorized" forced last.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

use crate::metadata::{self, ScriptMetadata, DEFAULT_CATEGORY};

/// Pseudo-category selecting every script.
pub const ALL_CATEGORY: &str = "All";

/// One launchable script discovered in a registered folder.
#[derive(Clone, Debug, Serialize)]
pub struct ScriptItem {
    /// File stem, shown to the user.
    pub name: String,
    pub path: PathBuf,
    pub category: String,
    pub metadata: ScriptMetadata,
}

/// Snapshot of all discovered scripts, grouped by category.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ScriptCatalog {
    categories: Vec<String>,
    by_category: BTreeMap<String, Vec<ScriptItem>>,
}

impl ScriptCatalog {
    /// Sorted category names, "Uncategorized" last when present.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scripts in one category (or all of them for [`ALL_CATEGORY`]),
    /// name-sorted case-insensitively, optionally filtered by a
    /// case-insensitive substring search.
    pub fn filtered(&self, category: &str, search: &str) -> Vec<&ScriptItem> {
        let mut items: Vec<&ScriptItem> = if category == ALL_CATEGORY {
            self.by_category.values().flatten().collect()
        } else {
            self.by_category
                .get(category)
                .map(|v| v.iter().collect())
                .unwrap_or_default()
        };

        items.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.path.cmp(&b.path))
        });

        if !search.is_empty() {
            let needle = search.to_lowercase();
            items.retain(|item| item.name.to_lowercase().contains(&needle));
        }

        items
    }
}

/// Scan registered folders and build a fresh catalog.
///
/// Unreadable folders are skipped with a warning; non-`.py` entries and
/// subdirectories are ignored.
#[instrument(skip_all, fields(folder_count = folders.len()))]
pub fn scan_folders(folders: &[String]) -> ScriptCatalog {
    let mut by_category: BTreeMap<String, Vec<ScriptItem>> = BTreeMap::new();
    let mut category_set: BTreeSet<String> = BTreeSet::new();

    for folder in folders {
        let expanded = shellexpand::tilde(folder);
        let dir = Path::new(expanded.as_ref());

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, folder = %dir.display(), "Skipping unreadable folder");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !is_python_script(&path) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let meta = metadata::parse_header_file(&path);
            let category = meta.category.clone();
            debug!(script = %path.display(), category = %category, "Discovered script");

            category_set.insert(category.clone());
            by_category.entry(category.clone()).or_default().push(ScriptItem {
                name: name.to_string(),
                path,
                category,
                metadata: meta,
            });
        }
    }

    let mut categories: Vec<String> = category_set.into_iter().collect();
    // BTreeSet iteration is already sorted; only Uncategorized moves.
    if let Some(idx) = categories.iter().position(|c| c == DEFAULT_CATEGORY) {
        let uncategorized = categories.remove(idx);
        categories.push(uncategorized);
    }

    ScriptCatalog {
        categories,
        by_category,
    }
}

fn is_python_script(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("py"))
}

/// Look for a standard virtualenv interpreter inside a project folder.
///
/// Checks `.venv`, `venv`, and `env` layouts, returning the first
/// interpreter that exists.
pub fn detect_venv(project_dir: &Path) -> Option<PathBuf> {
    #[cfg(not(target_os = "windows"))]
    const CANDIDATES: &[&str] = &[
        ".venv/bin/python",
        ".venv/bin/python3",
        "venv/bin/python",
        "venv/bin/python3",
        "env/bin/python",
    ];
    #[cfg(target_os = "windows")]
    const CANDIDATES: &[&str] = &[
        ".venv\\Scripts\\python.exe",
        "venv\\Scripts\\python.exe",
        "env\\Scripts\\python.exe",
    ];

    for candidate in CANDIDATES {
        let path = project_dir.join(candidate);
        if path.exists() {
            debug!(interpreter = %path.display(), "Auto-detected virtualenv interpreter");
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_script(dir: &Path, name: &str, header: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("{header}\nprint('x')\n")).unwrap();
        path
    }

    #[test]
    fn test_scan_groups_by_category() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "alpha.py", "#pqr cat=Tools");
        write_script(dir.path(), "beta.py", "#pqr cat=Tools");
        write_script(dir.path(), "gamma.py", "#pqr cat=Data");
        write_script(dir.path(), "plain.py", "# no directives");
        write_script(dir.path(), "notes.txt", "#pqr cat=Ignored");

        let catalog = scan_folders(&[dir.path().display().to_string()]);
        assert_eq!(catalog.len(), 4);
        assert_eq!(
            catalog.categories(),
            &["Data", "Tools", DEFAULT_CATEGORY]
        );
        assert_eq!(catalog.filtered("Tools", "").len(), 2);
        assert_eq!(catalog.filtered("Data", "").len(), 1);
        assert_eq!(catalog.filtered(DEFAULT_CATEGORY, "").len(), 1);
    }

    #[test]
    fn test_uncategorized_sorts_last() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "a.py", "# nothing");
        write_script(dir.path(), "b.py", "#pqr cat=Zebra");

        let catalog = scan_folders(&[dir.path().display().to_string()]);
        assert_eq!(catalog.categories(), &["Zebra", DEFAULT_CATEGORY]);
    }

    #[test]
    fn test_all_category_and_name_sort() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "Banana.py", "#pqr cat=A");
        write_script(dir.path(), "apple.py", "#pqr cat=B");
        write_script(dir.path(), "Cherry.py", "#pqr cat=A");

        let catalog = scan_folders(&[dir.path().display().to_string()]);
        let names: Vec<&str> = catalog
            .filtered(ALL_CATEGORY, "")
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["apple", "Banana", "Cherry"]);
    }

    #[test]
    fn test_search_filter_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "backup_db.py", "#pqr cat=Ops");
        write_script(dir.path(), "report.py", "#pqr cat=Ops");

        let catalog = scan_folders(&[dir.path().display().to_string()]);
        let hits = catalog.filtered(ALL_CATEGORY, "BACK");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "backup_db");
    }

    #[test]
    fn test_unknown_category_is_empty() {
        let catalog = scan_folders(&[]);
        assert!(catalog.is_empty());
        assert!(catalog.filtered("Nope", "").is_empty());
    }

    #[test]
    fn test_unreadable_folder_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "real.py", "#pqr cat=Here");

        let folders = vec![
            "/nonexistent/scripts".to_string(),
            dir.path().display().to_string(),
        ];
        let catalog = scan_folders(&folders);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_metadata_carried_on_items() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "term.py", "#pqr cat=Ops; term=true");

        let catalog = scan_folders(&[dir.path().display().to_string()]);
        let items = catalog.filtered("Ops", "");
        assert_eq!(items[0].metadata.terminal_override, Some(true));
    }

    #[test]
    fn test_detect_venv_prefers_dot_venv() {
        let dir = tempfile::tempdir().unwrap();
        let dot_venv = dir.path().join(".venv/bin");
        let venv = dir.path().join("venv/bin");
        fs::create_dir_all(&dot_venv).unwrap();
        fs::create_dir_all(&venv).unwrap();
        fs::write(dot_venv.join("python"), "").unwrap();
        fs::write(venv.join("python"), "").unwrap();

        let found = detect_venv(dir.path()).unwrap();
        assert_eq!(found, dir.path().join(".venv/bin/python"));
    }

    #[test]
    fn test_detect_venv_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_venv(dir.path()), None);
    }
}
