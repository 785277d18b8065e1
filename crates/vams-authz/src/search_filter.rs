//! Search-engine filter translation.
//!
//! # Purpose
//! Search results are filtered up front instead of enforcing per hit. This
//! module renders the constraints granted to a set of roles as a
//! `query_string` filter and as a per-permission `filters` aggregation.
//!
//! # Key invariants
//! - Only constraints whose `groupPermissions` reference one of the roles
//!   contribute.
//! - Only `contains`, `does_not_contain`, `is_one_of` and `is_not_one_of`
//!   translate; other operators contribute nothing to the query.
//!
//! # Common pitfalls
//! - `is_one_of` values are comma-separated lists here, while the enforcer
//!   treats the value as one element.
use crate::{Constraint, Criterion, Operator};
use serde_json::{Map, Value, json};
use std::collections::HashSet;

/// Permission buckets reported by the aggregation, in output order.
pub const AGGREGATED_PERMISSIONS: [&str; 3] = ["Read", "Edit", "Admin"];

/// Constraints whose group permissions reference any of `groups`.
pub fn constraints_for_groups<'a>(
    constraints: &'a [Constraint],
    groups: &HashSet<String>,
) -> Vec<&'a Constraint> {
    constraints
        .iter()
        .filter(|constraint| grants_any(constraint, groups))
        .collect()
}

fn grants_any(constraint: &Constraint, groups: &HashSet<String>) -> bool {
    constraint
        .group_permissions
        .iter()
        .any(|entry| groups.contains(&entry.group_id))
}

fn one_of_clause(criterion: &Criterion) -> String {
    let values: Vec<String> = criterion
        .value
        .split(',')
        .map(|value| format!("\"{}\"", value.trim()))
        .collect();
    format!("{}:({})", criterion.field, values.join(" OR "))
}

fn criterion_clause(criterion: &Criterion) -> Option<String> {
    match criterion.operator {
        Operator::Contains => Some(format!("{}:({})", criterion.field, criterion.value)),
        Operator::DoesNotContain => Some(format!("-{}:({})", criterion.field, criterion.value)),
        Operator::IsOneOf => Some(one_of_clause(criterion)),
        Operator::IsNotOneOf => Some(format!("-{}", one_of_clause(criterion))),
        _ => None,
    }
}

fn query_for<'a>(
    constraints: impl IntoIterator<Item = &'a Constraint>,
    groups: &HashSet<String>,
) -> String {
    let clauses: Vec<String> = constraints
        .into_iter()
        .filter(|constraint| grants_any(constraint, groups))
        .map(|constraint| {
            let predicates: Vec<String> = constraint
                .all_and_criteria()
                .iter()
                .filter_map(criterion_clause)
                .collect();
            format!("({})", predicates.join(" AND "))
        })
        .collect();
    clauses.join(" OR ")
}

/// `{"query": {"query_string": {"query": ...}}}` for the given roles.
pub fn to_query_filter(constraints: &[Constraint], groups: &HashSet<String>) -> Value {
    json!({
        "query": {
            "query_string": {
                "query": query_for(constraints, groups),
            }
        }
    })
}

/// Per-permission `filters` aggregation; empty buckets are omitted.
pub fn to_permission_aggregation(constraints: &[Constraint], groups: &HashSet<String>) -> Value {
    let mut buckets = Map::new();
    for permission in AGGREGATED_PERMISSIONS {
        let granted = constraints.iter().filter(|constraint| {
            constraint
                .group_permissions
                .iter()
                .any(|entry| groups.contains(&entry.group_id) && entry.permission == permission)
        });
        let query = query_for(granted, groups);
        if query.is_empty() {
            continue;
        }
        buckets.insert(
            permission.to_string(),
            json!({ "query_string": { "query": query } }),
        );
    }
    json!({
        "aggs": {
            "permissions": {
                "filters": {
                    "filters": Value::Object(buckets),
                }
            }
        }
    })
}
