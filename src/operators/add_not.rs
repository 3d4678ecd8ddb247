use super::{grouped, Example, Operator, Site};
use crate::mutation::OperatorArgs;
use tree_sitter::Node;

/// Negates the condition of `if`, `elif` and `while`.
pub struct AddNot;

impl Operator for AddNot {
    fn name(&self) -> &str {
        "core/AddNot"
    }

    fn sites(&self, node: Node<'_>, source: &str, _args: &OperatorArgs) -> Vec<Site> {
        if !matches!(node.kind(), "if_statement" | "elif_clause" | "while_statement") {
            return Vec::new();
        }
        node.child_by_field_name("condition")
            .map(|cond| vec![Site::replace(cond, format!("not {}", grouped(cond, source)))])
            .unwrap_or_default()
    }

    fn examples(&self) -> Vec<Example> {
        vec![
            Example::new("if x:\n    pass\n", "if not x:\n    pass\n"),
            Example::new("while a < b:\n    pass\n", "while not (a < b):\n    pass\n"),
            Example::new(
                "if a:\n    pass\nelif b:\n    pass\n",
                "if a:\n    pass\nelif not b:\n    pass\n",
            )
            .at(1),
        ]
    }
}
