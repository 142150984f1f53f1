//! Sources of legacy help texts for the HLP instruction.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Read access to legacy help files, by language and relative path.
pub trait HelpSource: Send + Sync {
    /// Text of the help file, `None` when it does not exist or cannot be read.
    fn read(&self, lang: &str, path: &str) -> Option<String>;
}

/// Shared handle to a help source.
pub type SharedHelpSource = Arc<dyn HelpSource>;

/// Whether a relative path stays below the directory it is joined to.
fn is_contained(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Help files checked out on disk as `<root>/<lang>_utf8/help/<path>`.
#[derive(Debug, Clone)]
pub struct DirHelpSource {
    root: PathBuf,
}

impl DirHelpSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, lang: &str, path: &str) -> Option<PathBuf> {
        if !is_contained(path) || !is_contained(lang) {
            return None;
        }
        Some(self.root.join(format!("{}_utf8", lang)).join("help").join(path))
    }
}

impl HelpSource for DirHelpSource {
    fn read(&self, lang: &str, path: &str) -> Option<String> {
        let Some(file) = self.file_path(lang, path) else {
            tracing::debug!(lang, path, "refusing help path outside the help root");
            return None;
        };
        fs::read_to_string(file).ok()
    }
}

/// Help files held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryHelpSource {
    files: HashMap<(String, String), String>,
}

impl MemoryHelpSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, lang: impl Into<String>, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert((lang.into(), path.into()), text.into());
    }
}

impl HelpSource for MemoryHelpSource {
    fn read(&self, lang: &str, path: &str) -> Option<String> {
        if !is_contained(path) {
            return None;
        }
        self.files.get(&(lang.to_string(), path.to_string())).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dir_source_layout() {
        let dir = TempDir::new().unwrap();
        let help = dir.path().join("cs_utf8").join("help").join("forum");
        fs::create_dir_all(&help).unwrap();
        fs::write(help.join("posting.html"), "<h1>Psaní</h1>\n<p>Text</p>").unwrap();

        let source = DirHelpSource::new(dir.path());
        assert_eq!(
            source.read("cs", "forum/posting.html").as_deref(),
            Some("<h1>Psaní</h1>\n<p>Text</p>")
        );
        assert!(source.read("de", "forum/posting.html").is_none());
    }

    #[test]
    fn test_parent_paths_are_refused() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("secret"), "x").unwrap();
        fs::create_dir_all(dir.path().join("cs_utf8").join("help")).unwrap();

        let source = DirHelpSource::new(dir.path());
        assert!(source.read("cs", "../../secret").is_none());
        assert!(source.read("..", "secret").is_none());
        assert!(source.read("cs", "/etc/passwd").is_none());

        let mut memory = MemoryHelpSource::new();
        memory.insert("cs", "../x", "y");
        assert!(memory.read("cs", "../x").is_none());
    }
}
