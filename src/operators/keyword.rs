//! Replacement of keyword constants and control-flow keywords.

use super::{Example, Operator, Site};
use crate::mutation::OperatorArgs;
use tree_sitter::Node;

/// Replaces a node of one kind, or one operator token of it, with fixed text.
pub struct KeywordReplacer {
    name: &'static str,
    kind: &'static str,
    /// When set, only the `operator` token with this kind is replaced.
    token: Option<&'static str>,
    replacement: &'static str,
    example: (&'static str, &'static str),
}

pub fn operators() -> Vec<KeywordReplacer> {
    vec![
        KeywordReplacer {
            name: "core/ReplaceTrueWithFalse",
            kind: "true",
            token: None,
            replacement: "False",
            example: ("x = True\n", "x = False\n"),
        },
        KeywordReplacer {
            name: "core/ReplaceFalseWithTrue",
            kind: "false",
            token: None,
            replacement: "True",
            example: ("x = False\n", "x = True\n"),
        },
        KeywordReplacer {
            name: "core/ReplaceAndWithOr",
            kind: "boolean_operator",
            token: Some("and"),
            replacement: "or",
            example: ("x = a and b\n", "x = a or b\n"),
        },
        KeywordReplacer {
            name: "core/ReplaceOrWithAnd",
            kind: "boolean_operator",
            token: Some("or"),
            replacement: "and",
            example: ("x = a or b\n", "x = a and b\n"),
        },
        KeywordReplacer {
            name: "core/ReplaceBreakWithContinue",
            kind: "break_statement",
            token: None,
            replacement: "continue",
            example: ("while x:\n    break\n", "while x:\n    continue\n"),
        },
        KeywordReplacer {
            name: "core/ReplaceContinueWithBreak",
            kind: "continue_statement",
            token: None,
            replacement: "break",
            example: ("while x:\n    continue\n", "while x:\n    break\n"),
        },
    ]
}

impl Operator for KeywordReplacer {
    fn name(&self) -> &str {
        self.name
    }

    fn sites(&self, node: Node<'_>, _source: &str, _args: &OperatorArgs) -> Vec<Site> {
        if node.kind() != self.kind {
            return Vec::new();
        }
        let target = match self.token {
            None => Some(node),
            Some(token) => node
                .child_by_field_name("operator")
                .filter(|op| op.kind() == token),
        };
        target
            .map(|t| vec![Site::replace(t, self.replacement)])
            .unwrap_or_default()
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(self.example.0, self.example.1)]
    }
}
