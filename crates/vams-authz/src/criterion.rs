//! Criterion compiler: declarative comparisons to typed predicates.
//!
//! # Purpose
//! Turns each stored `(field, operator, value)` comparison into a [`Predicate`]
//! that evaluates directly against a [`ResourceObject`].
//!
//! # How it fits
//! The policy compiler groups predicates into AND / OR [`PredicateGroup`]s,
//! one per constraint, and attaches them to casbin rules by id.
//!
//! # Key invariants
//! - Compilation is pure: the same criterion always yields the same predicate.
//! - Values are regex fragments. A value must parse as a regex on its own
//!   before it is wrapped in `(?:...)` and anchored, so neither alternation
//!   nor unbalanced group syntax can escape the anchors.
//! - An invalid value yields [`Predicate::Invalid`], whose evaluation is an
//!   error. Callers deny rather than guess whether the rule held.
//! - Unrecognized operators are dropped.
//!
//! # Security considerations
//! - Values and field names are data. The rendered policy text quotes values
//!   as escaped string literals and nothing rendered is ever evaluated.
//!
//! # Examples
//! ```rust
//! use vams_authz::{Criterion, Operator, Predicate, ResourceObject};
//!
//! let criterion = Criterion::new("databaseId", Operator::Equals, "db1");
//! let predicate = Predicate::compile(&criterion).expect("known operator");
//! let asset = ResourceObject::new("asset").with("databaseId", "db1");
//! assert!(predicate.evaluate(&asset).unwrap());
//! ```
use crate::{AttrValue, AuthzError, AuthzResult, ResourceObject};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a stored criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    Contains,
    DoesNotContain,
    StartsWith,
    EndsWith,
    IsOneOf,
    IsNotOneOf,
    #[serde(other)]
    Unrecognized,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::DoesNotContain => "does_not_contain",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::IsOneOf => "is_one_of",
            Self::IsNotOneOf => "is_not_one_of",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// One stored comparison inside a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

impl Criterion {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Executable form of a [`Criterion`].
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Regex test against a text field (any element for list fields).
    Pattern {
        field: String,
        regex: Regex,
        negated: bool,
    },
    /// Literal element test; scalar fields count as a one-element set.
    Membership {
        field: String,
        value: String,
        negated: bool,
    },
    /// A criterion whose value could not be compiled.
    Invalid { field: String, reason: String },
}

impl Predicate {
    /// Compile one criterion, or `None` for an unrecognized operator.
    pub fn compile(criterion: &Criterion) -> Option<Self> {
        let field = criterion.field.clone();
        let value = criterion.value.as_str();
        let (pattern, negated) = match criterion.operator {
            Operator::Equals => (format!("^(?:{value})$"), false),
            Operator::Contains => (format!("(?:{value})"), false),
            Operator::DoesNotContain => (format!("(?:{value})"), true),
            Operator::StartsWith => (format!("^(?:{value})"), false),
            Operator::EndsWith => (format!("(?:{value})$"), false),
            Operator::IsOneOf | Operator::IsNotOneOf => {
                return Some(Self::Membership {
                    field,
                    value: value.to_string(),
                    negated: criterion.operator == Operator::IsNotOneOf,
                });
            }
            Operator::Unrecognized => return None,
        };
        if let Err(err) = Regex::new(value) {
            return Some(Self::invalid(field, &err));
        }
        Some(Self::pattern(field, &pattern, negated))
    }

    /// Exact, literal match on `field` (no regex interpretation of `value`).
    pub fn exact(field: &str, value: &str) -> Self {
        let pattern = format!("^{}$", regex::escape(value));
        Self::pattern(field.to_string(), &pattern, false)
    }

    fn pattern(field: String, pattern: &str, negated: bool) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => Self::Pattern {
                field,
                regex,
                negated,
            },
            Err(err) => Self::invalid(field, &err),
        }
    }

    fn invalid(field: String, err: &regex::Error) -> Self {
        tracing::warn!(
            field = %field,
            error = %err,
            "criterion value is not a valid pattern"
        );
        Self::Invalid {
            field,
            reason: err.to_string(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::Pattern { field, .. }
            | Self::Membership { field, .. }
            | Self::Invalid { field, .. } => field,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    /// Evaluate against a (widened) resource.
    ///
    /// # Errors
    /// - [`AuthzError::MissingField`] when the referenced field is absent.
    /// - [`AuthzError::InvalidCriterion`] for a value that did not compile.
    pub fn evaluate(&self, resource: &ResourceObject) -> AuthzResult<bool> {
        let (negated, hit) = match self {
            Self::Invalid { field, reason } => {
                return Err(AuthzError::InvalidCriterion {
                    field: field.clone(),
                    reason: reason.clone(),
                });
            }
            Self::Pattern {
                field,
                regex,
                negated,
            } => {
                let hit = match lookup(resource, field)? {
                    AttrValue::Text(text) => regex.is_match(text),
                    AttrValue::List(items) => items.iter().any(|item| regex.is_match(item)),
                };
                (*negated, hit)
            }
            Self::Membership {
                field,
                value,
                negated,
            } => {
                let hit = match lookup(resource, field)? {
                    AttrValue::Text(text) => text == value,
                    AttrValue::List(items) => items.iter().any(|item| item == value),
                };
                (*negated, hit)
            }
        };
        Ok(hit != negated)
    }

    /// The invalid-criterion error for this predicate, if any.
    pub fn error(&self) -> Option<AuthzError> {
        match self {
            Self::Invalid { field, reason } => Some(AuthzError::InvalidCriterion {
                field: field.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

fn lookup<'a>(resource: &'a ResourceObject, field: &str) -> AuthzResult<&'a AttrValue> {
    resource
        .get(field)
        .ok_or_else(|| AuthzError::MissingField(field.to_string()))
}

fn quote(value: &str) -> String {
    // Debug formatting escapes quotes, backslashes and control characters.
    format!("{value:?}")
}

fn field_ref(field: &str) -> String {
    let identifier = !field.is_empty()
        && field
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if identifier {
        format!("r.obj.{field}")
    } else {
        format!("r.obj[{}]", quote(field))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern {
                field,
                regex,
                negated,
            } => {
                let bang = if *negated { "!" } else { "" };
                write!(
                    f,
                    "{bang}regexMatch({}, {})",
                    field_ref(field),
                    quote(regex.as_str())
                )
            }
            Self::Membership {
                field,
                value,
                negated,
            } => {
                if *negated {
                    write!(f, "!({} in {})", quote(value), field_ref(field))
                } else {
                    write!(f, "{} in {}", quote(value), field_ref(field))
                }
            }
            Self::Invalid { field, .. } => write!(f, "invalid({})", field_ref(field)),
        }
    }
}

/// Compile a criteria list, dropping unrecognized operators.
pub fn compile_criteria(criteria: &[Criterion]) -> Vec<Predicate> {
    criteria
        .iter()
        .filter_map(|criterion| {
            let predicate = Predicate::compile(criterion);
            if predicate.is_none() {
                tracing::warn!(
                    field = %criterion.field,
                    "dropping criterion with unrecognized operator"
                );
            }
            predicate
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Junction {
    All,
    Any,
}

/// Predicates joined by AND (`All`) or OR (`Any`).
#[derive(Debug, Clone)]
pub struct PredicateGroup {
    junction: Junction,
    predicates: Vec<Predicate>,
}

impl PredicateGroup {
    pub fn all(predicates: Vec<Predicate>) -> Self {
        Self {
            junction: Junction::All,
            predicates,
        }
    }

    pub fn any(predicates: Vec<Predicate>) -> Self {
        Self {
            junction: Junction::Any,
            predicates,
        }
    }

    pub fn junction(&self) -> Junction {
        self.junction
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Evaluate the group. An empty group never matches.
    pub fn evaluate(&self, resource: &ResourceObject) -> AuthzResult<bool> {
        if self.predicates.is_empty() {
            return Ok(false);
        }
        for predicate in &self.predicates {
            let hit = predicate.evaluate(resource)?;
            match (self.junction, hit) {
                (Junction::All, false) => return Ok(false),
                (Junction::Any, true) => return Ok(true),
                _ => {}
            }
        }
        Ok(self.junction == Junction::All)
    }
}

impl fmt::Display for PredicateGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.predicates.iter().map(ToString::to_string).collect();
        match self.junction {
            Junction::All => f.write_str(&parts.join(" && ")),
            Junction::Any => write!(f, "({})", parts.join(" || ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(database_id: &str) -> ResourceObject {
        ResourceObject::new("asset").with("databaseId", database_id)
    }

    fn check(operator: Operator, value: &str, resource: &ResourceObject) -> bool {
        let criterion = Criterion::new("databaseId", operator, value);
        Predicate::compile(&criterion)
            .expect("known operator")
            .evaluate(resource)
            .expect("field present")
    }

    #[test]
    fn equals_is_anchored() {
        assert!(check(Operator::Equals, "db1", &asset("db1")));
        assert!(!check(Operator::Equals, "db1", &asset("db10")));
        assert!(!check(Operator::Equals, "db1", &asset("xdb1")));
    }

    #[test]
    fn alternation_cannot_escape_anchors() {
        // Unwrapped, "^db1|db2$" would accept "xdb2".
        assert!(check(Operator::Equals, "db1|db2", &asset("db2")));
        assert!(!check(Operator::Equals, "db1|db2", &asset("xdb2")));
        assert!(!check(Operator::StartsWith, "db1|db2", &asset("xdb2")));
    }

    #[test]
    fn substring_and_affix_operators() {
        let resource = asset("defense-assets");
        assert!(check(Operator::Contains, "fense", &resource));
        assert!(!check(Operator::Contains, "offense", &resource));
        assert!(check(Operator::DoesNotContain, "offense", &resource));
        assert!(!check(Operator::DoesNotContain, "fense", &resource));
        assert!(check(Operator::StartsWith, "defense", &resource));
        assert!(!check(Operator::StartsWith, "assets", &resource));
        assert!(check(Operator::EndsWith, "assets", &resource));
        assert!(!check(Operator::EndsWith, "defense", &resource));
    }

    #[test]
    fn wildcard_value_matches_everything() {
        assert!(check(Operator::Contains, ".*", &asset("anything")));
        assert!(check(Operator::Equals, ".*", &asset("")));
    }

    #[test]
    fn membership_on_lists_and_scalars() {
        let tagged = ResourceObject::new("asset").with("tags", vec!["cad", "draft"]);
        let is_one_of = Predicate::compile(&Criterion::new("tags", Operator::IsOneOf, "cad"))
            .expect("known");
        let is_not_one_of = Predicate::compile(&Criterion::new("tags", Operator::IsNotOneOf, "cad"))
            .expect("known");
        assert!(is_one_of.evaluate(&tagged).unwrap());
        assert!(!is_not_one_of.evaluate(&tagged).unwrap());

        let untagged = ResourceObject::new("asset").with("tags", Vec::<String>::new());
        assert!(!is_one_of.evaluate(&untagged).unwrap());
        assert!(is_not_one_of.evaluate(&untagged).unwrap());

        // membership is literal, not a pattern
        assert!(check(Operator::IsOneOf, "db1", &asset("db1")));
        assert!(!check(Operator::IsOneOf, "db.", &asset("db1")));
    }

    #[test]
    fn text_operators_on_lists_match_any_element() {
        let tagged = ResourceObject::new("asset").with("tags", vec!["cad", "draft"]);
        let contains = Predicate::compile(&Criterion::new("tags", Operator::Contains, "raf"))
            .expect("known");
        let not_contains =
            Predicate::compile(&Criterion::new("tags", Operator::DoesNotContain, "raf"))
                .expect("known");
        assert!(contains.evaluate(&tagged).unwrap());
        assert!(!not_contains.evaluate(&tagged).unwrap());
    }

    #[test]
    fn invalid_pattern_is_an_evaluation_error() {
        let resource = asset("db1");
        for operator in [Operator::Equals, Operator::DoesNotContain] {
            let predicate =
                Predicate::compile(&Criterion::new("databaseId", operator, "(db1")).expect("known");
            assert!(predicate.is_invalid());
            assert!(predicate.error().is_some());
            assert!(matches!(
                predicate.evaluate(&resource),
                Err(AuthzError::InvalidCriterion { .. })
            ));
        }
    }

    #[test]
    fn group_closing_value_is_rejected() {
        let operators = [
            Operator::Equals,
            Operator::Contains,
            Operator::DoesNotContain,
            Operator::StartsWith,
            Operator::EndsWith,
        ];
        for value in ["db1)|(?:", ")|(", "db1)"] {
            for operator in operators {
                let criterion = Criterion::new("databaseId", operator, value);
                let predicate = Predicate::compile(&criterion).expect("known");
                assert!(predicate.is_invalid(), "{value} / {}", operator.as_str());
                assert!(predicate.evaluate(&asset("db1-anything-else")).is_err());
            }
        }
    }

    #[test]
    fn invalid_member_decides_an_undetermined_group() {
        let compile = |value: &str| {
            Predicate::compile(&Criterion::new("databaseId", Operator::Equals, value))
                .expect("known")
        };
        let resource = asset("db1");

        let all = PredicateGroup::all(vec![compile("db1"), compile("(db1")]);
        assert!(all.evaluate(&resource).is_err());
        let any = PredicateGroup::any(vec![compile("db2"), compile("(db1")]);
        assert!(any.evaluate(&resource).is_err());

        // a group already decided never reaches the invalid member
        let any = PredicateGroup::any(vec![compile("db1"), compile("(db1")]);
        assert!(any.evaluate(&resource).expect("eval"));
        let all = PredicateGroup::all(vec![compile("db2"), compile("(db1")]);
        assert!(!all.evaluate(&resource).expect("eval"));
    }

    #[test]
    fn unrecognized_operator_is_dropped() {
        let criterion: Criterion = serde_json::from_str(
            r#"{"field":"databaseId","operator":"is_greater_than","value":"1"}"#,
        )
        .expect("criterion");
        assert_eq!(criterion.operator, Operator::Unrecognized);
        let compiled = compile_criteria(&[
            criterion,
            Criterion::new("databaseId", Operator::Equals, "db1"),
        ]);
        assert_eq!(compiled.len(), 1);
    }

    #[test]
    fn missing_field_is_reported() {
        let predicate =
            Predicate::compile(&Criterion::new("assetId", Operator::Equals, "a1")).expect("known");
        let err = predicate
            .evaluate(&ResourceObject::new("asset"))
            .expect_err("missing");
        assert!(matches!(err, AuthzError::MissingField(field) if field == "assetId"));
    }

    #[test]
    fn exact_escapes_metacharacters() {
        let predicate = Predicate::exact("object_type", "asset.*");
        assert!(predicate.evaluate(&ResourceObject::new("asset.*")).unwrap());
        assert!(!predicate.evaluate(&ResourceObject::new("asset-x")).unwrap());
    }

    #[test]
    fn rendering_quotes_values() {
        let predicate = Predicate::compile(&Criterion::new(
            "databaseId",
            Operator::IsOneOf,
            r#"x") || true || ("#,
        ))
        .expect("known");
        let text = predicate.to_string();
        assert_eq!(text, r#""x\") || true || (" in r.obj.databaseId"#);

        let odd_field = Predicate::compile(&Criterion::new("a b", Operator::Equals, "1"))
            .expect("known");
        assert!(odd_field.to_string().starts_with(r#"regexMatch(r.obj["a b"]"#));
    }

    #[test]
    fn groups_join_with_and_or() {
        let resource = asset("db1");
        let all = PredicateGroup::all(compile_criteria(&[
            Criterion::new("databaseId", Operator::StartsWith, "db"),
            Criterion::new("databaseId", Operator::EndsWith, "2"),
        ]));
        let any = PredicateGroup::any(compile_criteria(&[
            Criterion::new("databaseId", Operator::Equals, "db2"),
            Criterion::new("databaseId", Operator::Equals, "db1"),
        ]));
        assert!(!all.evaluate(&resource).unwrap());
        assert!(any.evaluate(&resource).unwrap());
        assert!(!PredicateGroup::all(Vec::new()).evaluate(&resource).unwrap());
        assert!(all.to_string().contains(" && "));
        assert!(any.to_string().starts_with('('));
    }
}
