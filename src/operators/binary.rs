//! Binary operator replacement (`a + b` -> `a - b`, ...).

use super::{Example, Operator, Site};
use crate::mutation::OperatorArgs;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitXor,
}

const ALL: [BinaryOp; 12] = [
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::Div,
    BinaryOp::FloorDiv,
    BinaryOp::Mod,
    BinaryOp::Pow,
    BinaryOp::LShift,
    BinaryOp::RShift,
    BinaryOp::BitAnd,
    BinaryOp::BitOr,
    BinaryOp::BitXor,
];

impl BinaryOp {
    pub fn token(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
            Self::Div => "Div",
            Self::FloorDiv => "FloorDiv",
            Self::Mod => "Mod",
            Self::Pow => "Pow",
            Self::LShift => "LShift",
            Self::RShift => "RShift",
            Self::BitAnd => "BitAnd",
            Self::BitOr => "BitOr",
            Self::BitXor => "BitXor",
        }
    }
}

/// Replaces one binary operator with another everywhere it appears.
pub struct ReplaceBinaryOperator {
    from: BinaryOp,
    to: BinaryOp,
    name: String,
}

impl ReplaceBinaryOperator {
    pub fn new(from: BinaryOp, to: BinaryOp) -> Self {
        Self {
            from,
            to,
            name: format!("core/ReplaceBinaryOperator_{}_{}", from.name(), to.name()),
        }
    }
}

/// One operator per ordered pair of distinct binary operators.
pub fn operators() -> Vec<ReplaceBinaryOperator> {
    ALL.iter()
        .flat_map(|from| {
            ALL.iter()
                .filter(move |to| *to != from)
                .map(move |to| ReplaceBinaryOperator::new(*from, *to))
        })
        .collect()
}

impl Operator for ReplaceBinaryOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn sites(&self, node: Node<'_>, _source: &str, _args: &OperatorArgs) -> Vec<Site> {
        if node.kind() != "binary_operator" {
            return Vec::new();
        }
        match node.child_by_field_name("operator") {
            Some(op) if op.kind() == self.from.token() => vec![Site::replace(op, self.to.token())],
            _ => Vec::new(),
        }
    }

    fn examples(&self) -> Vec<Example> {
        vec![
            Example::new(
                format!("x = a {} b\n", self.from.token()),
                format!("x = a {} b\n", self.to.token()),
            ),
            Example::new(
                format!("x = (a {0} b) {0} c\n", self.from.token()),
                format!("x = (a {0} b) {1} c\n", self.from.token(), self.to.token()),
            ),
        ]
    }
}
