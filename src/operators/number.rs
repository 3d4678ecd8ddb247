//! Numeric literal replacement.
//!
//! Arguments: `offsets`, a list of numbers added to the literal (default
//! `[1, -1]`). Every offset is a separate site on the same literal, so a
//! literal with the default arguments has two occurrences.

use super::{Example, Operator, Site};
use crate::language::node_text;
use crate::mutation::OperatorArgs;
use serde_json::{json, Value};
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Offset {
    Int(i64),
    Float(f64),
}

fn offsets(args: &OperatorArgs) -> Vec<Offset> {
    match args.get("offsets") {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| match v.as_i64() {
                Some(i) => Some(Offset::Int(i)),
                None => v.as_f64().map(Offset::Float),
            })
            .collect(),
        _ => vec![Offset::Int(1), Offset::Int(-1)],
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Literal {
    Int(i128),
    Float(f64),
}

fn parse_literal(kind: &str, text: &str) -> Option<Literal> {
    let text = text.replace('_', "");
    // Imaginary literals are left alone.
    if text.ends_with(['j', 'J']) {
        return None;
    }
    if kind == "float" {
        return text.parse::<f64>().ok().map(Literal::Float);
    }
    let lower = text.to_ascii_lowercase();
    let value = if let Some(hex) = lower.strip_prefix("0x") {
        i128::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i128::from_str_radix(oct, 8).ok()?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i128::from_str_radix(bin, 2).ok()?
    } else {
        lower.parse::<i128>().ok()?
    };
    Some(Literal::Int(value))
}

/// Python source text for `literal + offset`, or `None` if there is no sensible result.
fn shifted(literal: Literal, offset: Offset) -> Option<String> {
    let text = match (literal, offset) {
        (_, Offset::Int(0)) => return None,
        (Literal::Int(value), Offset::Int(delta)) => value.checked_add(i128::from(delta))?.to_string(),
        (literal, offset) => {
            let base = match literal {
                Literal::Int(v) => v as f64,
                Literal::Float(v) => v,
            };
            let delta = match offset {
                Offset::Int(d) => d as f64,
                Offset::Float(d) => d,
            };
            if delta == 0.0 {
                return None;
            }
            let value = base + delta;
            if !value.is_finite() {
                return None;
            }
            format!("{:?}", value)
        }
    };
    if text.starts_with('-') {
        Some(format!("({})", text))
    } else {
        Some(text)
    }
}

pub struct NumberReplacer;

impl Operator for NumberReplacer {
    fn name(&self) -> &str {
        "core/NumberReplacer"
    }

    fn sites(&self, node: Node<'_>, source: &str, args: &OperatorArgs) -> Vec<Site> {
        if !matches!(node.kind(), "integer" | "float") {
            return Vec::new();
        }
        let Some(literal) = parse_literal(node.kind(), node_text(node, source)) else {
            return Vec::new();
        };
        offsets(args)
            .into_iter()
            .filter_map(|offset| shifted(literal, offset))
            .map(|text| Site::replace(node, text))
            .collect()
    }

    fn examples(&self) -> Vec<Example> {
        let halves = match json!({ "offsets": [0.5] }) {
            Value::Object(map) => map,
            _ => OperatorArgs::new(),
        };
        vec![
            Example::new("x = 1\n", "x = 2\n"),
            Example::new("x = 1\n", "x = 0\n").at(1),
            Example::new("x = 0\n", "x = (-1)\n").at(1),
            Example::new("x = 1.5\n", "x = 2.0\n").with_args(halves),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::mutation::analyzer::{mutate_source, mutation_positions};

    #[test]
    fn test_default_offsets_give_two_sites_per_literal() {
        let tree = Language::Python.parse("x = 10 + 2.5\n").unwrap();
        let positions = mutation_positions(&tree, &NumberReplacer, &OperatorArgs::new());
        assert_eq!(positions.len(), 4);
        assert_eq!(positions[0], positions[1]);
    }

    #[test]
    fn test_hex_literal_is_rendered_in_decimal() {
        let mutated = mutate_source(Language::Python, "x = 0x10\n", &NumberReplacer, 0, &OperatorArgs::new())
            .unwrap();
        assert_eq!(mutated.as_deref(), Some("x = 17\n"));
    }

    #[test]
    fn test_float_literal() {
        let mutated = mutate_source(Language::Python, "x = 2.5\n", &NumberReplacer, 1, &OperatorArgs::new())
            .unwrap();
        assert_eq!(mutated.as_deref(), Some("x = 1.5\n"));
    }

    #[test]
    fn test_imaginary_literals_are_skipped() {
        assert_eq!(parse_literal("integer", "3j"), None);
        assert_eq!(parse_literal("float", "1.5J"), None);
    }

    #[test]
    fn test_custom_offsets() {
        let args = match json!({ "offsets": [5, 0] }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let tree = Language::Python.parse("x = 1\n").unwrap();
        // A zero offset is not a mutation.
        assert_eq!(mutation_positions(&tree, &NumberReplacer, &args).len(), 1);
        let mutated = mutate_source(Language::Python, "x = 1\n", &NumberReplacer, 0, &args).unwrap();
        assert_eq!(mutated.as_deref(), Some("x = 6\n"));
    }

    #[test]
    fn test_shifted_parenthesizes_negative_results() {
        assert_eq!(shifted(Literal::Int(0), Offset::Int(-2)).as_deref(), Some("(-2)"));
        assert_eq!(shifted(Literal::Float(1.0), Offset::Float(f64::INFINITY)), None);
    }
}
