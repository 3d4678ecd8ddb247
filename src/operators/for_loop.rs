use super::{Example, Operator, Site};
use crate::mutation::OperatorArgs;
use tree_sitter::Node;

/// Makes a `for` loop iterate over nothing.
pub struct ZeroIterationForLoop;

impl Operator for ZeroIterationForLoop {
    fn name(&self) -> &str {
        "core/ZeroIterationForLoop"
    }

    fn sites(&self, node: Node<'_>, _source: &str, _args: &OperatorArgs) -> Vec<Site> {
        if node.kind() != "for_statement" {
            return Vec::new();
        }
        node.child_by_field_name("right")
            .map(|iterable| vec![Site::replace(iterable, "[]")])
            .unwrap_or_default()
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "for x in range(3):\n    pass\n",
            "for x in []:\n    pass\n",
        )]
    }
}
