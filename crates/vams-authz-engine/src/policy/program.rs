//! Compiled per-principal policy program.
//!
//! # Purpose
//! A [`PolicyProgram`] is the typed result of compiling one principal's roles
//! and constraints: role assignments, the rule conditions (typed predicate
//! groups) and the permission rules that reference them by id.
//!
//! # How it fits
//! The enforcer loads role assignments and rules into casbin, with each rule's
//! object set to its condition id. At decision time the conditions are
//! evaluated against the resource and the matching ids become the request
//! object.
//!
//! # Key invariants
//! - The rendered text is computed once at build time and never changes, so a
//!   cached text always describes the program it was rendered from.
//! - Role assignments precede permission rules; rules follow constraint order,
//!   group entries before user entries, AND rule before OR rule.
use std::fmt;
use vams_authz::{
    AuthzResult, Constraint, OBJECT_TYPE_FIELD, PermissionType, Predicate, PredicateGroup,
    PrincipalId, ResourceObject, compile_criteria, role_subject, user_subject,
};

/// Casbin object pattern that only an empty request object could match.
pub const NEVER_PATTERN: &str = "^$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub principal: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub enum RuleCondition {
    Criteria {
        object_type: Predicate,
        group: PredicateGroup,
    },
    Never,
}

/// A rule condition and the id rules use to reference it.
#[derive(Debug, Clone)]
pub struct Condition {
    pub id: String,
    pub condition: RuleCondition,
}

impl Condition {
    /// `regexMatch` pattern selecting this condition from a request object.
    pub fn object_pattern(&self) -> String {
        match self.condition {
            RuleCondition::Criteria { .. } => format!(",{},", self.id),
            RuleCondition::Never => NEVER_PATTERN.to_string(),
        }
    }

    pub fn evaluate(&self, resource: &ResourceObject) -> AuthzResult<bool> {
        match &self.condition {
            RuleCondition::Never => Ok(false),
            RuleCondition::Criteria { object_type, group } => {
                if !object_type.evaluate(resource)? {
                    return Ok(false);
                }
                group.evaluate(resource)
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.condition {
            RuleCondition::Never => write!(f, "[{}] false", self.id),
            RuleCondition::Criteria { object_type, group } => {
                write!(f, "[{}] {object_type} && {group}", self.id)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRule {
    pub subject: String,
    pub condition: usize,
    pub action: String,
    pub effect: PermissionType,
}

#[derive(Debug, Clone)]
pub struct PolicyProgram {
    principal: PrincipalId,
    role_assignments: Vec<RoleAssignment>,
    conditions: Vec<Condition>,
    rules: Vec<PermissionRule>,
    deny_all: bool,
    text: String,
}

impl PolicyProgram {
    /// Program that denies every request: no roles and one rule that cannot
    /// match any subject or action.
    pub fn deny_all(principal: &PrincipalId) -> Self {
        let conditions = vec![Condition {
            id: "never".to_string(),
            condition: RuleCondition::Never,
        }];
        let rules = vec![PermissionRule {
            subject: String::new(),
            condition: 0,
            action: String::new(),
            effect: PermissionType::Deny,
        }];
        Self::assemble(principal.clone(), Vec::new(), conditions, rules, true)
    }

    fn assemble(
        principal: PrincipalId,
        role_assignments: Vec<RoleAssignment>,
        conditions: Vec<Condition>,
        rules: Vec<PermissionRule>,
        deny_all: bool,
    ) -> Self {
        let mut lines = Vec::with_capacity(role_assignments.len() + rules.len());
        for assignment in &role_assignments {
            lines.push(format!("g, {}, {}", assignment.principal, assignment.role));
        }
        for rule in &rules {
            lines.push(format!(
                "p, {}, {}, {}, {}",
                rule.subject,
                conditions[rule.condition],
                rule.action,
                rule.effect.as_str()
            ));
        }
        Self {
            principal,
            role_assignments,
            conditions,
            rules,
            deny_all,
            text: lines.join("\n"),
        }
    }

    pub fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    pub fn role_assignments(&self) -> &[RoleAssignment] {
        &self.role_assignments
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn rules(&self) -> &[PermissionRule] {
        &self.rules
    }

    pub fn condition_of(&self, rule: &PermissionRule) -> &Condition {
        &self.conditions[rule.condition]
    }

    pub fn is_deny_all(&self) -> bool {
        self.deny_all
    }

    /// Newline-joined policy text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Request object for casbin: `,id1,id2,` over the conditions that hold,
    /// or empty when none do.
    ///
    /// # Errors
    /// - Propagates [`vams_authz::AuthzError::MissingField`] and
    ///   [`vams_authz::AuthzError::InvalidCriterion`] from evaluation. A condition
    ///   that cannot be decided fails the whole request, so an undecidable deny
    ///   never lets an allow through.
    pub fn request_object(&self, resource: &ResourceObject) -> AuthzResult<String> {
        let mut matched = Vec::new();
        for condition in &self.conditions {
            if condition.evaluate(resource)? {
                matched.push(condition.id.as_str());
            }
        }
        if matched.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(",{},", matched.join(",")))
    }
}

impl fmt::Display for PolicyProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Accumulates roles and constraints for one principal.
#[derive(Debug)]
pub struct ProgramBuilder {
    principal: PrincipalId,
    roles: Vec<String>,
    constraints: Vec<Constraint>,
}

impl ProgramBuilder {
    pub fn new(principal: PrincipalId) -> Self {
        Self {
            principal,
            roles: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn role(&mut self, role_name: &str) -> &mut Self {
        self.roles.push(role_name.to_string());
        self
    }

    pub fn constraint(&mut self, constraint: Constraint) -> &mut Self {
        self.constraints.push(constraint);
        self
    }

    pub fn build(self) -> PolicyProgram {
        let subject = self.principal.subject();
        let role_assignments = self
            .roles
            .iter()
            .map(|role| RoleAssignment {
                principal: subject.clone(),
                role: role_subject(role),
            })
            .collect();

        let mut conditions = Vec::new();
        let mut rules = Vec::new();
        for (index, constraint) in self.constraints.iter().enumerate() {
            let object_type = Predicate::exact(OBJECT_TYPE_FIELD, &constraint.object_type);
            let and_group = PredicateGroup::all(compile_criteria(&constraint.all_and_criteria()));
            let or_group = PredicateGroup::any(compile_criteria(&constraint.criteria_or));

            let mut ids = Vec::with_capacity(2);
            for (suffix, group) in [("a", and_group), ("o", or_group)] {
                if group.is_empty() {
                    continue;
                }
                ids.push(conditions.len());
                conditions.push(Condition {
                    id: format!("c{index}{suffix}"),
                    condition: RuleCondition::Criteria {
                        object_type: object_type.clone(),
                        group,
                    },
                });
            }

            let group_grants = constraint.group_permissions.iter().map(|entry| {
                let subject = role_subject(&entry.group_id);
                (subject, entry.permission.as_str(), entry.permission_type)
            });
            let user_grants = constraint.user_permissions.iter().map(|entry| {
                let subject = user_subject(&entry.user_id);
                (subject, entry.permission.as_str(), entry.permission_type)
            });
            let grants = group_grants.chain(user_grants);
            for (grant_subject, action, effect) in grants {
                for condition in &ids {
                    rules.push(PermissionRule {
                        subject: grant_subject.clone(),
                        condition: *condition,
                        action: action.to_string(),
                        effect,
                    });
                }
            }
        }

        PolicyProgram::assemble(self.principal, role_assignments, conditions, rules, false)
    }
}
