//! Site enumeration and addressing.
//!
//! An occurrence number is the index of a site in the pre-order walk of a
//! module's syntax tree, counting every site the operator reports at every
//! node. Scans and mutations both go through the same walk, so an occurrence
//! recorded in one process is re-found by another.

use crate::language::{Language, SyntaxTree, TextEdit};
use crate::mutation::{MutationSpec, OperatorArgs};
use crate::operators::{Operator, Span};
use anyhow::Result;
use std::path::Path;

/// Every site `operator` offers in `tree`, in occurrence order.
pub fn mutation_positions(
    tree: &SyntaxTree,
    operator: &dyn Operator,
    args: &OperatorArgs,
) -> Vec<Span> {
    tree.preorder()
        .flat_map(|node| operator.mutation_positions(node, tree.source(), args))
        .collect()
}

/// The edit for site number `occurrence`, or `None` if the tree has fewer sites.
pub fn locate(
    tree: &SyntaxTree,
    operator: &dyn Operator,
    occurrence: usize,
    args: &OperatorArgs,
) -> Result<Option<TextEdit>> {
    let mut remaining = occurrence;
    for node in tree.preorder() {
        let available = operator.mutation_positions(node, tree.source(), args).len();
        if remaining < available {
            let edit = operator.mutate(node, tree.source(), remaining, args)?;
            return Ok(Some(edit));
        }
        remaining -= available;
    }
    Ok(None)
}

/// Parse `source`, apply one mutation and render the result.
pub fn mutate_source(
    language: Language,
    source: &str,
    operator: &dyn Operator,
    occurrence: usize,
    args: &OperatorArgs,
) -> Result<Option<String>> {
    let tree = language.parse(source)?;
    match locate(&tree, operator, occurrence, args)? {
        Some(edit) => Ok(Some(tree.render(&[edit])?)),
        None => Ok(None),
    }
}

/// One first-order mutation spec per site of `operator` in a module.
pub fn find_mutation_specs(
    module_path: &Path,
    tree: &SyntaxTree,
    operator: &dyn Operator,
    args: &OperatorArgs,
) -> Vec<MutationSpec> {
    mutation_positions(tree, operator, args)
        .into_iter()
        .enumerate()
        .filter_map(|(occurrence, span)| {
            match MutationSpec::new(
                module_path,
                operator.name(),
                occurrence,
                span.start,
                span.end,
                args.clone(),
            ) {
                Ok(spec) => Some(spec),
                Err(e) => {
                    // Zero-width sites cannot be told apart by position; skip them.
                    tracing::debug!("Skipping site in {}: {}", module_path.display(), e);
                    None
                }
            }
        })
        .collect()
}
