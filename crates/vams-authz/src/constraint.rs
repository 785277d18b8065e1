//! Stored authorization records: roles, role assignments and constraints.
//!
//! These types mirror the documents held by the role and constraint stores.
//! They are read-only to the engine and deserialize from the stores' camelCase
//! JSON shape.
use crate::Criterion;
use serde::{Deserialize, Deserializer, Serialize};

/// Named role; `mfa_required` roles only apply to MFA sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub role_name: String,
    #[serde(default)]
    pub mfa_required: bool,
}

impl Role {
    pub fn new(role_name: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
            mfa_required: false,
        }
    }

    pub fn requiring_mfa(mut self) -> Self {
        self.mfa_required = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoleAssignment {
    pub user_id: String,
    pub role_name: String,
}

impl UserRoleAssignment {
    pub fn new(user_id: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role_name: role_name.into(),
        }
    }
}

/// Effect of a permission entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    #[default]
    Allow,
    Deny,
}

impl PermissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl<'de> Deserialize<'de> for PermissionType {
    // Null and "" both mean allow; matching is case-insensitive.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(Self::Allow),
            Some(value) if value.eq_ignore_ascii_case("allow") => Ok(Self::Allow),
            Some(value) if value.eq_ignore_ascii_case("deny") => Ok(Self::Deny),
            Some(other) => Err(serde::de::Error::unknown_variant(other, &["allow", "deny"])),
        }
    }
}

/// Grant or denial for a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPermission {
    pub group_id: String,
    pub permission: String,
    #[serde(default)]
    pub permission_type: PermissionType,
}

impl GroupPermission {
    pub fn allow(group_id: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            permission: permission.into(),
            permission_type: PermissionType::Allow,
        }
    }

    pub fn deny(group_id: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            permission_type: PermissionType::Deny,
            ..Self::allow(group_id, permission)
        }
    }
}

/// Grant or denial for a single principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermission {
    pub user_id: String,
    pub permission: String,
    #[serde(default)]
    pub permission_type: PermissionType,
}

impl UserPermission {
    pub fn allow(user_id: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            permission: permission.into(),
            permission_type: PermissionType::Allow,
        }
    }

    pub fn deny(user_id: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            permission_type: PermissionType::Deny,
            ..Self::allow(user_id, permission)
        }
    }
}

/// Legacy `criteria` field: older documents hold one criterion or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyCriteria {
    One(Criterion),
    Many(Vec<Criterion>),
}

impl LegacyCriteria {
    fn as_slice(&self) -> &[Criterion] {
        match self {
            Self::One(criterion) => std::slice::from_ref(criterion),
            Self::Many(criteria) => criteria,
        }
    }
}

/// Attribute-based permission: a predicate over one object type plus the
/// subjects and actions it grants or denies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    #[serde(default)]
    pub constraint_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub object_type: String,
    #[serde(default)]
    pub criteria_and: Vec<Criterion>,
    #[serde(default)]
    pub criteria_or: Vec<Criterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<LegacyCriteria>,
    #[serde(default)]
    pub group_permissions: Vec<GroupPermission>,
    #[serde(default)]
    pub user_permissions: Vec<UserPermission>,
}

impl Constraint {
    pub fn new(constraint_id: impl Into<String>, object_type: impl Into<String>) -> Self {
        let constraint_id = constraint_id.into();
        Self {
            name: constraint_id.clone(),
            constraint_id,
            description: String::new(),
            object_type: object_type.into(),
            criteria_and: Vec::new(),
            criteria_or: Vec::new(),
            criteria: None,
            group_permissions: Vec::new(),
            user_permissions: Vec::new(),
        }
    }

    pub fn with_and(mut self, criterion: Criterion) -> Self {
        self.criteria_and.push(criterion);
        self
    }

    pub fn with_or(mut self, criterion: Criterion) -> Self {
        self.criteria_or.push(criterion);
        self
    }

    pub fn with_group_permission(mut self, permission: GroupPermission) -> Self {
        self.group_permissions.push(permission);
        self
    }

    pub fn with_user_permission(mut self, permission: UserPermission) -> Self {
        self.user_permissions.push(permission);
        self
    }

    /// `criteria_and` followed by any legacy `criteria` members.
    pub fn all_and_criteria(&self) -> Vec<Criterion> {
        let mut criteria = self.criteria_and.clone();
        if let Some(legacy) = &self.criteria {
            criteria.extend_from_slice(legacy.as_slice());
        }
        criteria
    }

    pub fn references_group(&self, group_id: &str) -> bool {
        self.group_permissions
            .iter()
            .any(|entry| entry.group_id == group_id)
    }

    pub fn references_user(&self, user_id: &str) -> bool {
        self.user_permissions
            .iter()
            .any(|entry| entry.user_id == user_id)
    }
}
