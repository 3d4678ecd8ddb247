//! Python language support.

use super::SyntaxTree;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const SKIP_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "node_modules",
    "build",
    "dist",
];

/// Python language handler.
pub struct PythonLanguage;

impl PythonLanguage {
    pub fn find_source_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        if path.is_file() {
            if is_python_file(path) {
                files.push(path.to_path_buf());
            }
            return Ok(files);
        }

        if !path.is_dir() {
            return Ok(files);
        }

        let root = path.to_path_buf();
        for entry in walkdir::WalkDir::new(path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == root {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                !name.starts_with('.') && !SKIP_DIRS.contains(&name.as_ref())
            })
        {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() && is_python_file(path) {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }

    pub fn parse(&self, source: &str) -> Result<SyntaxTree> {
        let mut parser = tree_sitter::Parser::new();
        let language = tree_sitter_python::LANGUAGE;
        parser
            .set_language(&language.into())
            .context("Failed to load the Python grammar")?;

        let tree = parser
            .parse(source, None)
            .context("Failed to parse Python source")?;

        Ok(SyntaxTree::new(source.to_string(), tree))
    }
}

fn is_python_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "py")
}
