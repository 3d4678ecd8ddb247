//! Hooks that may veto work items before they are ever dispatched.

use crate::config::Config;
use crate::mutation::{WorkItem, WorkResult};

/// A pre-dispatch hook. Returning a reason marks the item `SKIPPED`.
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;

    fn intercept(&self, item: &WorkItem) -> Option<String>;
}

/// Skips every work item that uses an operator matching one of the patterns.
pub struct OperatorsFilter {
    exclude: Vec<String>,
}

impl OperatorsFilter {
    pub fn new(exclude: Vec<String>) -> Self {
        Self { exclude }
    }
}

impl Interceptor for OperatorsFilter {
    fn name(&self) -> &str {
        "operators_filter"
    }

    fn intercept(&self, item: &WorkItem) -> Option<String> {
        item.mutations().iter().find_map(|spec| {
            self.exclude
                .iter()
                .find(|pattern| glob_match::glob_match(pattern, spec.operator_name()))
                .map(|pattern| {
                    format!(
                        "operator {} excluded by pattern '{}'",
                        spec.operator_name(),
                        pattern
                    )
                })
        })
    }
}

/// Interceptors enabled by the configuration.
pub fn from_config(config: &Config) -> Vec<Box<dyn Interceptor>> {
    let mut interceptors: Vec<Box<dyn Interceptor>> = Vec::new();
    let filter = &config.interceptors.operators_filter;
    if !filter.exclude.is_empty() {
        interceptors.push(Box::new(OperatorsFilter::new(filter.exclude.clone())));
    }
    interceptors
}

/// `SKIPPED` results for every item some interceptor vetoes (first veto wins).
pub fn apply(interceptors: &[Box<dyn Interceptor>], items: &[WorkItem]) -> Vec<(String, WorkResult)> {
    items
        .iter()
        .filter_map(|item| {
            interceptors.iter().find_map(|interceptor| {
                interceptor.intercept(item).map(|reason| {
                    tracing::debug!("{} skipped {}: {}", interceptor.name(), item.job_id(), reason);
                    (
                        item.job_id().to_string(),
                        WorkResult::skipped(format!("{}: {}", interceptor.name(), reason)),
                    )
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{MutationSpec, OperatorArgs, Position, WorkerOutcome};

    fn item(job_id: &str, operators: &[&str]) -> WorkItem {
        let mutations = operators
            .iter()
            .enumerate()
            .map(|(i, op)| {
                MutationSpec::new(
                    "m.py",
                    *op,
                    0,
                    Position::new(i + 1, 0),
                    Position::new(i + 1, 3),
                    OperatorArgs::new(),
                )
                .unwrap()
            })
            .collect();
        WorkItem::new(job_id, mutations).unwrap()
    }

    #[test]
    fn test_operators_filter_matches_any_mutation() {
        let filter = OperatorsFilter::new(vec!["core/ReplaceComparisonOperator_*".into()]);
        assert!(filter.intercept(&item("a", &["core/AddNot"])).is_none());
        let reason = filter
            .intercept(&item(
                "b",
                &["core/AddNot", "core/ReplaceComparisonOperator_Lt_Gt"],
            ))
            .unwrap();
        assert!(reason.contains("core/ReplaceComparisonOperator_Lt_Gt"));
    }

    #[test]
    fn test_apply_marks_vetoed_items_skipped() {
        let interceptors: Vec<Box<dyn Interceptor>> =
            vec![Box::new(OperatorsFilter::new(vec!["core/RemoveDecorator".into()]))];
        let items = vec![
            item("a", &["core/RemoveDecorator"]),
            item("b", &["core/AddNot"]),
        ];
        let skipped = apply(&interceptors, &items);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, "a");
        assert_eq!(skipped[0].1.worker_outcome(), WorkerOutcome::Skipped);
        assert!(skipped[0].1.output().starts_with("operators_filter"));
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::new("pkg", "pytest");
        assert!(from_config(&config).is_empty());
        config.interceptors.operators_filter.exclude = vec!["core/NumberReplacer".into()];
        let interceptors = from_config(&config);
        assert_eq!(interceptors.len(), 1);
        assert_eq!(interceptors[0].name(), "operators_filter");
    }
}
