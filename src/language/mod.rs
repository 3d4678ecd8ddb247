//! Language abstraction layer.
//!
//! This module owns the syntax-tree side of mutation testing: finding the
//! source modules of a project, parsing them into trees, walking those trees
//! in a stable order, and rendering a tree back to source text with a set of
//! edits applied.

mod python;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Tree, TreeCursor};

pub use python::PythonLanguage;

/// Supported programming languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
}

impl Language {
    /// Human-readable name for the language.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
        }
    }

    /// Find all source files under `path` (or `path` itself if it is a file),
    /// sorted so that scans are repeatable.
    pub fn find_source_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self {
            Language::Python => PythonLanguage.find_source_files(path),
        }
    }

    /// Parse source text into a syntax tree.
    pub fn parse(&self, source: &str) -> Result<SyntaxTree> {
        match self {
            Language::Python => PythonLanguage.parse(source),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Replacement of one byte range of the source with new text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub start_byte: usize,
    pub end_byte: usize,
    pub replacement: String,
}

/// A parsed module together with the text it was parsed from.
pub struct SyntaxTree {
    source: String,
    tree: Tree,
}

impl SyntaxTree {
    pub(crate) fn new(source: String, tree: Tree) -> Self {
        Self { source, tree }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Depth-first, child-order traversal of every node in the tree.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder::new(self.root())
    }

    /// Render the tree back to source text with `edits` applied.
    ///
    /// Edits are addressed against the pristine source, so they compose no
    /// matter what order they were collected in. Overlapping edits are
    /// rejected because their combined result is undefined.
    pub fn render(&self, edits: &[TextEdit]) -> Result<String> {
        let mut sorted: Vec<&TextEdit> = edits.iter().collect();
        sorted.sort_by_key(|e| (e.start_byte, e.end_byte));

        for pair in sorted.windows(2) {
            if pair[1].start_byte < pair[0].end_byte {
                anyhow::bail!(
                    "Overlapping edits at bytes {}..{} and {}..{}",
                    pair[0].start_byte,
                    pair[0].end_byte,
                    pair[1].start_byte,
                    pair[1].end_byte
                );
            }
        }

        let mut rendered = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for edit in sorted {
            if edit.end_byte > self.source.len() || edit.start_byte > edit.end_byte {
                anyhow::bail!(
                    "Edit {}..{} is outside of the source ({} bytes)",
                    edit.start_byte,
                    edit.end_byte,
                    self.source.len()
                );
            }
            rendered.push_str(&self.source[cursor..edit.start_byte]);
            rendered.push_str(&edit.replacement);
            cursor = edit.end_byte;
        }
        rendered.push_str(&self.source[cursor..]);

        Ok(rendered)
    }
}

/// Text of a node within `source`.
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// Pre-order iterator over a subtree, driven by a tree cursor.
pub struct Preorder<'t> {
    cursor: TreeCursor<'t>,
    done: bool,
}

impl<'t> Preorder<'t> {
    pub fn new(root: Node<'t>) -> Self {
        Self {
            cursor: root.walk(),
            done: false,
        }
    }
}

impl<'t> Iterator for Preorder<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Node<'t>> {
        if self.done {
            return None;
        }
        let node = self.cursor.node();

        if self.cursor.goto_first_child() {
            return Some(node);
        }
        loop {
            if self.cursor.goto_next_sibling() {
                return Some(node);
            }
            if !self.cursor.goto_parent() {
                self.done = true;
                return Some(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_language_name() {
        assert_eq!(Language::Python.name(), "Python");
        assert_eq!(format!("{}", Language::Python), "Python");
    }

    #[test]
    fn test_find_source_files_through_language() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.py"), "x = 1\n").unwrap();
        let files = Language::Python.find_source_files(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_preorder_visits_parents_before_children() {
        let tree = Language::Python.parse("x = 1\n").unwrap();
        let kinds: Vec<&str> = tree.preorder().map(|n| n.kind()).collect();
        assert_eq!(kinds[0], "module");
        let assignment = kinds.iter().position(|k| *k == "assignment").unwrap();
        let integer = kinds.iter().position(|k| *k == "integer").unwrap();
        assert!(assignment < integer);
    }

    #[test]
    fn test_preorder_is_repeatable() {
        let source = "def f(a, b):\n    return a + b * 2\n";
        let first: Vec<(usize, usize)> = Language::Python
            .parse(source)
            .unwrap()
            .preorder()
            .map(|n| (n.start_byte(), n.end_byte()))
            .collect();
        let second: Vec<(usize, usize)> = Language::Python
            .parse(source)
            .unwrap()
            .preorder()
            .map(|n| (n.start_byte(), n.end_byte()))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_without_edits_is_identity() {
        let source = "if True and False: pass\n";
        let tree = Language::Python.parse(source).unwrap();
        assert_eq!(tree.render(&[]).unwrap(), source);
    }

    #[test]
    fn test_render_applies_edits_in_any_order() {
        let tree = Language::Python.parse("a = 1 + 2\n").unwrap();
        let edits = vec![
            TextEdit {
                start_byte: 8,
                end_byte: 9,
                replacement: "3".to_string(),
            },
            TextEdit {
                start_byte: 6,
                end_byte: 7,
                replacement: "-".to_string(),
            },
        ];
        assert_eq!(tree.render(&edits).unwrap(), "a = 1 - 3\n");
    }

    #[test]
    fn test_render_rejects_overlapping_edits() {
        let tree = Language::Python.parse("a = 1 + 2\n").unwrap();
        let edits = vec![
            TextEdit {
                start_byte: 4,
                end_byte: 9,
                replacement: "0".to_string(),
            },
            TextEdit {
                start_byte: 6,
                end_byte: 7,
                replacement: "-".to_string(),
            },
        ];
        assert!(tree.render(&edits).is_err());
    }
}
