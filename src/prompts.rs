//! Prompt files for batch mode.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::Error;
use crate::Result;

/// Named prompts in the order they will run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptBatch {
    prompts: Vec<(String, String)>,
}

impl PromptBatch {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prompts.iter().map(|(n, t)| (n.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.prompts.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// Load prompts from a single file or from every regular file in a
/// directory, sorted by file name.
pub fn load_prompts(path: &Path) -> Result<PromptBatch> {
    if !path.exists() {
        return Err(Error::Prompt(format!(
            "Prompt path not found: {}",
            path.display()
        )));
    }

    if path.is_file() {
        let text = read_trimmed(path)?;
        if text.is_empty() {
            return Err(Error::Prompt(format!(
                "Prompt file is empty: {}",
                path.display()
            )));
        }
        return Ok(PromptBatch {
            prompts: vec![(file_name(path), text)],
        });
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        // `is_file` follows symlinks.
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by_key(|p| file_name(p));

    let mut prompts = Vec::with_capacity(files.len());
    for file in files {
        let text = read_trimmed(&file)?;
        if text.is_empty() {
            warn!("Skipping empty prompt file {}", file.display());
            continue;
        }
        prompts.push((file_name(&file), text));
    }

    if prompts.is_empty() {
        return Err(Error::Prompt(format!(
            "No prompts found in {}",
            path.display()
        )));
    }

    debug!("Loaded {} prompts from {}", prompts.len(), path.display());
    Ok(PromptBatch { prompts })
}

fn read_trimmed(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Prompt(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(text.trim().to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_directory_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "list tables\n").unwrap();
        fs::write(dir.path().join("a.txt"), "  count rows  ").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let batch = load_prompts(dir.path()).unwrap();
        let items: Vec<(&str, &str)> = batch.iter().collect();
        assert_eq!(items, vec![("a.txt", "count rows"), ("b.txt", "list tables")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_included() {
        let shared = tempfile::tempdir().unwrap();
        let target = shared.path().join("count.txt");
        fs::write(&target, "count rows").unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("a.txt")).unwrap();
        fs::write(dir.path().join("b.txt"), "list tables").unwrap();

        let batch = load_prompts(dir.path()).unwrap();
        let items: Vec<(&str, &str)> = batch.iter().collect();
        assert_eq!(items, vec![("a.txt", "count rows"), ("b.txt", "list tables")]);
    }

    #[test]
    fn test_empty_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("01.sql"), "   \n").unwrap();
        fs::write(dir.path().join("02.sql"), "top 10 users").unwrap();

        let batch = load_prompts(dir.path()).unwrap();
        assert_eq!(batch.names(), vec!["02.sql"]);
    }

    #[test]
    fn test_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("question.txt");
        fs::write(&path, "How many failed logins yesterday?\n").unwrap();

        let batch = load_prompts(&path).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch.iter().next(),
            Some(("question.txt", "How many failed logins yesterday?"))
        );
    }

    #[test]
    fn test_errors() {
        let dir = tempfile::tempdir().unwrap();

        let err = load_prompts(&dir.path().join("missing")).unwrap_err();
        assert!(err.to_string().contains("Prompt path not found"));
        assert!(err.is_startup());

        // Directory with nothing usable.
        assert!(matches!(load_prompts(dir.path()), Err(Error::Prompt(_))));

        let empty = dir.path().join("empty.txt");
        fs::write(&empty, "").unwrap();
        assert!(matches!(load_prompts(&empty), Err(Error::Prompt(_))));
    }
}
