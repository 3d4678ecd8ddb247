//! Mutation operator catalog.
//!
//! Every operator answers two questions about a syntax-tree node: where could
//! it mutate this node (`mutation_positions`), and what does the node look
//! like after mutating site `index` (`mutate`). Positions must be
//! deterministic for a given tree; that is what lets an occurrence number
//! recorded during a scan be re-found by an independent walk later on.

mod add_not;
mod binary;
mod comparison;
mod decorator;
mod for_loop;
mod keyword;
mod noop;
mod number;
mod unary;

use crate::language::{node_text, Language, TextEdit};
use crate::mutation::{OperatorArgs, Position};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tree_sitter::Node;

pub use noop::NOOP_OPERATOR;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperatorError {
    #[error("{operator}: no mutation sites at this node")]
    NotApplicable { operator: String },
    #[error("{operator}: site index {index} out of range ({available} sites at this node)")]
    IndexOutOfRange {
        operator: String,
        index: usize,
        available: usize,
    },
}

/// Location of a candidate mutation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn of(node: Node<'_>) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start: Position::new(start.row + 1, start.column),
            end: Position::new(end.row + 1, end.column),
        }
    }
}

/// A candidate site together with the text that replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub span: Span,
    pub replacement: String,
}

impl Site {
    pub fn replace(node: Node<'_>, replacement: impl Into<String>) -> Self {
        Self {
            span: Span::of(node),
            replacement: replacement.into(),
        }
    }

    fn into_edit(self) -> TextEdit {
        TextEdit {
            start_byte: self.span.start_byte,
            end_byte: self.span.end_byte,
            replacement: self.replacement,
        }
    }
}

/// A worked example of an operator: `pre` mutated at `occurrence` renders as `post`.
#[derive(Debug, Clone)]
pub struct Example {
    pub pre: String,
    pub post: String,
    pub occurrence: usize,
    pub args: OperatorArgs,
}

impl Example {
    pub fn new(pre: impl Into<String>, post: impl Into<String>) -> Self {
        Self {
            pre: pre.into(),
            post: post.into(),
            occurrence: 0,
            args: OperatorArgs::new(),
        }
    }

    pub fn at(mut self, occurrence: usize) -> Self {
        self.occurrence = occurrence;
        self
    }

    pub fn with_args(mut self, args: OperatorArgs) -> Self {
        self.args = args;
        self
    }
}

/// A mutation operator.
///
/// Implementors provide `sites`; the two contract methods are derived from it
/// so that positions and mutations can never disagree.
pub trait Operator: Send + Sync {
    fn name(&self) -> &str;

    /// Candidate sites at exactly `node` (not its descendants), in a stable order.
    fn sites(&self, node: Node<'_>, source: &str, args: &OperatorArgs) -> Vec<Site>;

    /// Canonical examples used to check the operator against its own contract.
    fn examples(&self) -> Vec<Example>;

    /// Whether the scan at session initialization should enumerate this operator.
    fn enumerable(&self) -> bool {
        true
    }

    fn mutation_positions(&self, node: Node<'_>, source: &str, args: &OperatorArgs) -> Vec<Span> {
        self.sites(node, source, args)
            .into_iter()
            .map(|site| site.span)
            .collect()
    }

    fn mutate(
        &self,
        node: Node<'_>,
        source: &str,
        index: usize,
        args: &OperatorArgs,
    ) -> Result<TextEdit, OperatorError> {
        let mut sites = self.sites(node, source, args);
        let available = sites.len();
        if available == 0 {
            return Err(OperatorError::NotApplicable {
                operator: self.name().to_string(),
            });
        }
        if index >= available {
            return Err(OperatorError::IndexOutOfRange {
                operator: self.name().to_string(),
                index,
                available,
            });
        }
        Ok(sites.swap_remove(index).into_edit())
    }
}

/// Registry of operators keyed by name.
pub struct OperatorCatalog {
    operators: BTreeMap<String, Arc<dyn Operator>>,
}

impl OperatorCatalog {
    pub fn new() -> Self {
        Self {
            operators: BTreeMap::new(),
        }
    }

    /// Catalog with every built-in operator registered.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for op in binary::operators() {
            catalog.register(op);
        }
        for op in comparison::operators() {
            catalog.register(op);
        }
        for op in unary::operators() {
            catalog.register(op);
        }
        for op in keyword::operators() {
            catalog.register(op);
        }
        catalog.register(add_not::AddNot);
        catalog.register(number::NumberReplacer);
        catalog.register(for_loop::ZeroIterationForLoop);
        catalog.register(decorator::RemoveDecorator);
        catalog.register(noop::NoOp);
        catalog
    }

    pub fn register(&mut self, operator: impl Operator + 'static) {
        self.operators
            .insert(operator.name().to_string(), Arc::new(operator));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operator>> {
        self.operators.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    /// Operators that take part in scans, in name order.
    pub fn enumerable(&self) -> impl Iterator<Item = &Arc<dyn Operator>> {
        self.operators.values().filter(|op| op.enumerable())
    }

    /// Run every operator against its worked examples.
    ///
    /// Returns one message per example that does not render as documented.
    pub fn check_examples(&self) -> Vec<String> {
        let mut failures = Vec::new();
        for (name, op) in &self.operators {
            let examples = op.examples();
            if examples.is_empty() {
                failures.push(format!("{}: no examples", name));
            }
            for example in examples {
                let rendered = crate::mutation::analyzer::mutate_source(
                    Language::Python,
                    &example.pre,
                    op.as_ref(),
                    example.occurrence,
                    &example.args,
                );
                match rendered {
                    Ok(Some(post)) if post == example.post => {}
                    Ok(other) => failures.push(format!(
                        "{}: occurrence {} of {:?} rendered {:?}, expected {:?}",
                        name, example.occurrence, example.pre, other, example.post
                    )),
                    Err(e) => failures.push(format!("{}: {:#}", name, e)),
                }
            }
        }
        failures
    }

}

impl Default for OperatorCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// Node kinds that bind tighter than any operator, so they never need parentheses.
pub(crate) fn is_primary(kind: &str) -> bool {
    matches!(
        kind,
        "identifier"
            | "integer"
            | "float"
            | "string"
            | "concatenated_string"
            | "true"
            | "false"
            | "none"
            | "call"
            | "attribute"
            | "subscript"
            | "parenthesized_expression"
            | "list"
            | "dictionary"
            | "set"
            | "tuple"
    )
}

/// Text of `node`, parenthesized unless it is a primary expression.
pub(crate) fn grouped(node: Node<'_>, source: &str) -> String {
    let text = node_text(node, source);
    if is_primary(node.kind()) {
        text.to_string()
    } else {
        format!("({})", text)
    }
}

/// Whether a node is a numeric literal, including a signed one such as `-1`.
pub(crate) fn is_numeric_literal(node: Node<'_>) -> bool {
    match node.kind() {
        "integer" | "float" => true,
        "unary_operator" => node
            .child_by_field_name("argument")
            .is_some_and(is_numeric_literal),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::analyzer::{mutate_source, mutation_positions};

    #[test]
    fn test_standard_catalog_contents() {
        let catalog = OperatorCatalog::standard();
        for name in [
            "core/ReplaceBinaryOperator_Add_Sub",
            "core/ReplaceComparisonOperator_Lt_GtE",
            "core/ReplaceUnaryOperator_USub_UAdd",
            "core/ReplaceUnaryOperator_Not_Delete",
            "core/ReplaceTrueWithFalse",
            "core/ReplaceFalseWithTrue",
            "core/ReplaceAndWithOr",
            "core/ReplaceOrWithAnd",
            "core/AddNot",
            "core/NumberReplacer",
            "core/ReplaceBreakWithContinue",
            "core/ReplaceContinueWithBreak",
            "core/ZeroIterationForLoop",
            "core/RemoveDecorator",
            "core/NoOp",
        ] {
            assert!(catalog.get(name).is_some(), "missing {}", name);
        }
        assert!(catalog.get("core/ReplaceBinaryOperator_Add_Add").is_none());
    }

    #[test]
    fn test_noop_is_not_enumerable() {
        let catalog = OperatorCatalog::standard();
        assert!(catalog.enumerable().all(|op| op.name() != NOOP_OPERATOR));
        assert_eq!(catalog.enumerable().count(), catalog.names().count() - 1);
    }

    #[test]
    fn test_check_examples_passes_for_standard_catalog() {
        assert_eq!(OperatorCatalog::standard().check_examples(), Vec::<String>::new());
    }

    #[test]
    fn test_every_operator_honours_its_examples() {
        let catalog = OperatorCatalog::standard();
        for name in catalog.names() {
            let op = catalog.get(name).unwrap();
            let examples = op.examples();
            assert!(!examples.is_empty(), "{} has no examples", name);
            for example in examples {
                let mutated = mutate_source(
                    Language::Python,
                    &example.pre,
                    op.as_ref(),
                    example.occurrence,
                    &example.args,
                )
                .unwrap();
                assert_eq!(
                    mutated.as_deref(),
                    Some(example.post.as_str()),
                    "{} occurrence {} on {:?}",
                    name,
                    example.occurrence,
                    example.pre
                );
            }
        }
    }

    #[test]
    fn test_examples_render_valid_python() {
        let catalog = OperatorCatalog::standard();
        for name in catalog.names() {
            let op = catalog.get(name).unwrap();
            for example in op.examples() {
                let tree = Language::Python.parse(&example.post).unwrap();
                assert!(
                    !tree.root().has_error(),
                    "{} produced unparseable code: {:?}",
                    name,
                    example.post
                );
            }
        }
    }

    #[test]
    fn test_positions_are_deterministic_for_every_operator() {
        let source = "@cache\ndef f(a, b):\n    if a < b and not a:\n        return -a + 1.5\n    for i in range(3):\n        if i == None:\n            break\n        continue\n    while a is not b or True:\n        a = ~b // 2\n    return False\n";
        let catalog = OperatorCatalog::standard();
        for op in catalog.enumerable() {
            let first = mutation_positions(
                &Language::Python.parse(source).unwrap(),
                op.as_ref(),
                &OperatorArgs::new(),
            );
            let second = mutation_positions(
                &Language::Python.parse(source).unwrap(),
                op.as_ref(),
                &OperatorArgs::new(),
            );
            assert_eq!(first, second, "{} is not deterministic", op.name());
        }
    }

    #[test]
    fn test_mutate_out_of_range_index() {
        let tree = Language::Python.parse("x = True\n").unwrap();
        let op = keyword::operators()
            .into_iter()
            .find(|o| o.name() == "core/ReplaceTrueWithFalse")
            .unwrap();
        let node = tree.preorder().find(|n| n.kind() == "true").unwrap();
        let err = op
            .mutate(node, tree.source(), 1, &OperatorArgs::new())
            .unwrap_err();
        assert!(matches!(err, OperatorError::IndexOutOfRange { index: 1, available: 1, .. }));

        let other = tree.preorder().find(|n| n.kind() == "identifier").unwrap();
        let err = op
            .mutate(other, tree.source(), 0, &OperatorArgs::new())
            .unwrap_err();
        assert!(matches!(err, OperatorError::NotApplicable { .. }));
    }

    #[test]
    fn test_grouped_wraps_compound_expressions() {
        let tree = Language::Python.parse("x = a + b\ny = c\n").unwrap();
        let sum = tree.preorder().find(|n| n.kind() == "binary_operator").unwrap();
        let name = tree
            .preorder()
            .find(|n| n.kind() == "identifier" && node_text(*n, tree.source()) == "c")
            .unwrap();
        assert_eq!(grouped(sum, tree.source()), "(a + b)");
        assert_eq!(grouped(name, tree.source()), "c");
    }
}
