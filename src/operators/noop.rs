//! The identity operator used for baselines.

use super::{Example, Operator, Site};
use crate::language::node_text;
use crate::mutation::OperatorArgs;
use tree_sitter::Node;

pub const NOOP_OPERATOR: &str = "core/NoOp";

/// Offers a site at every node and replaces it with its own text.
///
/// Running a work item through this operator exercises the whole
/// mutate-and-test cycle while leaving the code unchanged.
pub struct NoOp;

impl Operator for NoOp {
    fn name(&self) -> &str {
        NOOP_OPERATOR
    }

    fn sites(&self, node: Node<'_>, source: &str, _args: &OperatorArgs) -> Vec<Site> {
        if node.start_byte() == node.end_byte() {
            return Vec::new();
        }
        vec![Site::replace(node, node_text(node, source))]
    }

    fn examples(&self) -> Vec<Example> {
        vec![
            Example::new("x = a + 1\n", "x = a + 1\n"),
            Example::new("x = a + 1\n", "x = a + 1\n").at(3),
        ]
    }

    fn enumerable(&self) -> bool {
        false
    }
}
