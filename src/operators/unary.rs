//! Unary operator replacement and deletion.

use super::{grouped, is_numeric_literal, Example, Operator, Site};
use crate::language::node_text;
use crate::mutation::OperatorArgs;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    UAdd,
    USub,
    Invert,
    Not,
}

const ALL: [UnaryOp; 4] = [UnaryOp::UAdd, UnaryOp::USub, UnaryOp::Invert, UnaryOp::Not];

impl UnaryOp {
    fn token(self) -> &'static str {
        match self {
            Self::UAdd => "+",
            Self::USub => "-",
            Self::Invert => "~",
            Self::Not => "not",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::UAdd => "UAdd",
            Self::USub => "USub",
            Self::Invert => "Invert",
            Self::Not => "Not",
        }
    }
}

/// What a unary operator is replaced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryTarget {
    Op(UnaryOp),
    /// Drop the operator and keep its operand.
    Delete,
}

impl UnaryTarget {
    fn name(self) -> &'static str {
        match self {
            Self::Op(op) => op.name(),
            Self::Delete => "Delete",
        }
    }
}

pub struct ReplaceUnaryOperator {
    from: UnaryOp,
    to: UnaryTarget,
    name: String,
}

impl ReplaceUnaryOperator {
    pub fn new(from: UnaryOp, to: UnaryTarget) -> Self {
        Self {
            from,
            to,
            name: format!("core/ReplaceUnaryOperator_{}_{}", from.name(), to.name()),
        }
    }

    /// The operand, if `node` is an application of `self.from`.
    fn operand<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        let matches = match self.from {
            UnaryOp::Not => node.kind() == "not_operator",
            op => {
                node.kind() == "unary_operator"
                    && node
                        .child_by_field_name("operator")
                        .is_some_and(|t| t.kind() == op.token())
            }
        };
        if matches {
            node.child_by_field_name("argument")
        } else {
            None
        }
    }
}

pub fn operators() -> Vec<ReplaceUnaryOperator> {
    let mut ops = Vec::new();
    for from in ALL {
        for to in ALL.iter().filter(|to| **to != from) {
            ops.push(ReplaceUnaryOperator::new(from, UnaryTarget::Op(*to)));
        }
        ops.push(ReplaceUnaryOperator::new(from, UnaryTarget::Delete));
    }
    ops
}

impl Operator for ReplaceUnaryOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn sites(&self, node: Node<'_>, source: &str, _args: &OperatorArgs) -> Vec<Site> {
        let Some(arg) = self.operand(node) else {
            return Vec::new();
        };

        let replacement = match (self.from, self.to) {
            // `+1` and `1` are the same value.
            (UnaryOp::UAdd, UnaryTarget::Delete) if is_numeric_literal(arg) => return Vec::new(),
            (_, UnaryTarget::Delete) => node_text(arg, source).to_string(),
            (UnaryOp::Not, UnaryTarget::Op(to)) => format!("{}{}", to.token(), grouped(arg, source)),
            (_, UnaryTarget::Op(UnaryOp::Not)) => format!("(not {})", node_text(arg, source)),
            (_, UnaryTarget::Op(to)) => match node.child_by_field_name("operator") {
                Some(token) => return vec![Site::replace(token, to.token())],
                None => return Vec::new(),
            },
        };
        vec![Site::replace(node, replacement)]
    }

    fn examples(&self) -> Vec<Example> {
        let pre = match self.from {
            UnaryOp::Not => "x = not a\n".to_string(),
            op => format!("x = {}a\n", op.token()),
        };
        let post = match (self.from, self.to) {
            (_, UnaryTarget::Delete) => "x = a\n".to_string(),
            (_, UnaryTarget::Op(UnaryOp::Not)) => "x = (not a)\n".to_string(),
            (_, UnaryTarget::Op(to)) => format!("x = {}a\n", to.token()),
        };
        vec![Example::new(pre, post)]
    }
}
