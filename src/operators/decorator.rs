use super::{Example, Operator, Site, Span};
use crate::mutation::OperatorArgs;
use tree_sitter::Node;

/// Removes a single decorator line.
pub struct RemoveDecorator;

impl Operator for RemoveDecorator {
    fn name(&self) -> &str {
        "core/RemoveDecorator"
    }

    fn sites(&self, node: Node<'_>, _source: &str, _args: &OperatorArgs) -> Vec<Site> {
        if node.kind() != "decorator" {
            return Vec::new();
        }
        // Keep the trailing newline so the line structure is preserved.
        let Some(expr) = node.named_child(0) else {
            return Vec::new();
        };
        let (decorator, expr) = (Span::of(node), Span::of(expr));
        vec![Site {
            span: Span {
                end_byte: expr.end_byte,
                end: expr.end,
                ..decorator
            },
            replacement: String::new(),
        }]
    }

    fn examples(&self) -> Vec<Example> {
        vec![
            Example::new("@cache\ndef f():\n    pass\n", "\ndef f():\n    pass\n"),
            Example::new(
                "@a\n@b\ndef f():\n    pass\n",
                "@a\n\ndef f():\n    pass\n",
            )
            .at(1),
        ]
    }
}
