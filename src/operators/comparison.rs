//! Comparison operator replacement (`a < b` -> `a <= b`, ...).
//!
//! Replacements that cannot change behaviour, or that only produce warnings,
//! are pruned by looking at the right-hand operand:
//! - against `None` only identity flips that change the result are offered
//! - against a number only the ordering/equality operators are offered
//! - against other literals `is` and `is not` are never offered

use super::{is_numeric_literal, Example, Operator, Site};
use crate::mutation::OperatorArgs;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
}

const ALL: [ComparisonOp; 8] = [
    ComparisonOp::Eq,
    ComparisonOp::NotEq,
    ComparisonOp::Lt,
    ComparisonOp::LtE,
    ComparisonOp::Gt,
    ComparisonOp::GtE,
    ComparisonOp::Is,
    ComparisonOp::IsNot,
];

impl ComparisonOp {
    pub fn token(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Eq => "Eq",
            Self::NotEq => "NotEq",
            Self::Lt => "Lt",
            Self::LtE => "LtE",
            Self::Gt => "Gt",
            Self::GtE => "GtE",
            Self::Is => "Is",
            Self::IsNot => "IsNot",
        }
    }

    fn is_identity(self) -> bool {
        matches!(self, Self::Is | Self::IsNot)
    }
}

/// Whether replacing `from` with `to` is meaningful for this right-hand operand.
fn allowed(from: ComparisonOp, to: ComparisonOp, rhs: Option<Node<'_>>) -> bool {
    let Some(rhs) = rhs else {
        return true;
    };
    match rhs.kind() {
        "none" => matches!(
            (from, to),
            (ComparisonOp::Eq, ComparisonOp::IsNot)
                | (ComparisonOp::NotEq, ComparisonOp::Is)
                | (ComparisonOp::Is, ComparisonOp::IsNot)
                | (ComparisonOp::IsNot, ComparisonOp::Is)
        ),
        _ if is_numeric_literal(rhs) => !to.is_identity(),
        "string" | "concatenated_string" | "true" | "false" => !to.is_identity(),
        _ => true,
    }
}

/// Replaces one comparison operator with another.
pub struct ReplaceComparisonOperator {
    from: ComparisonOp,
    to: ComparisonOp,
    name: String,
}

impl ReplaceComparisonOperator {
    pub fn new(from: ComparisonOp, to: ComparisonOp) -> Self {
        Self {
            from,
            to,
            name: format!(
                "core/ReplaceComparisonOperator_{}_{}",
                from.name(),
                to.name()
            ),
        }
    }
}

/// One operator per ordered pair of distinct comparison operators.
pub fn operators() -> Vec<ReplaceComparisonOperator> {
    ALL.iter()
        .flat_map(|from| {
            ALL.iter()
                .filter(move |to| *to != from)
                .map(move |to| ReplaceComparisonOperator::new(*from, *to))
        })
        .collect()
}

impl Operator for ReplaceComparisonOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn sites(&self, node: Node<'_>, _source: &str, _args: &OperatorArgs) -> Vec<Site> {
        if node.kind() != "comparison_operator" {
            return Vec::new();
        }

        // Chained comparisons (`a < b < c`) carry one operator token per link.
        let mut sites = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.is_named() || child.kind() != self.from.token() {
                continue;
            }
            if allowed(self.from, self.to, child.next_named_sibling()) {
                sites.push(Site::replace(child, self.to.token()));
            }
        }
        sites
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            format!("if a {} b: pass\n", self.from.token()),
            format!("if a {} b: pass\n", self.to.token()),
        )]
    }
}
