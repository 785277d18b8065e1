//! Identity claims consumed by the facade.
//!
//! Only the canonical principal (`tokens[0]`) and the MFA flag affect
//! decisions. Roles and external attributes are carried for callers.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vams_authz::PrincipalId;

pub const TOKENS_CLAIM: &str = "vams:tokens";
pub const ROLES_CLAIM: &str = "vams:roles";
pub const EXTERNAL_ATTRIBUTES_CLAIM: &str = "vams:externalAttributes";
pub const MFA_ENABLED_CLAIM: &str = "vams:mfaEnabled";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    #[serde(default)]
    pub tokens: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub external_attributes: Vec<String>,
    #[serde(default)]
    pub mfa_enabled: bool,
}

impl Claims {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            tokens: vec![user_id.into()],
            ..Self::default()
        }
    }

    pub fn with_mfa(mut self, mfa_enabled: bool) -> Self {
        self.mfa_enabled = mfa_enabled;
        self
    }

    /// Canonical principal, or `None` when no token was supplied.
    pub fn principal(&self) -> Option<PrincipalId> {
        self.tokens
            .first()
            .filter(|token| !token.is_empty())
            .map(PrincipalId::new)
    }

    /// Read claims from an HTTP authorizer event.
    ///
    /// Looks under `requestContext.authorizer.jwt.claims`, then
    /// `requestContext.authorizer.lambda`. List claims are JSON-encoded
    /// arrays; a plain JSON array is accepted too. `vams:mfaEnabled` may be a
    /// boolean or the string `"true"`; anything else, including absence,
    /// means no MFA.
    pub fn from_request_event(event: &Value) -> Self {
        let authorizer = event.pointer("/requestContext/authorizer");
        let source = authorizer.and_then(|authorizer| {
            authorizer
                .pointer("/jwt/claims")
                .or_else(|| authorizer.get("lambda"))
        });
        let Some(source) = source else {
            return Self::default();
        };
        Self {
            tokens: string_list(source.get(TOKENS_CLAIM)),
            roles: string_list(source.get(ROLES_CLAIM)),
            external_attributes: string_list(source.get(EXTERNAL_ATTRIBUTES_CLAIM)),
            mfa_enabled: flag(source.get(MFA_ENABLED_CLAIM)),
        }
    }
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(enabled)) => *enabled,
        Some(Value::String(text)) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    let parsed;
    let array = match value {
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(encoded) {
            Ok(decoded) => {
                parsed = decoded;
                &parsed
            }
            Err(err) => {
                tracing::warn!(error = %err, "claim is not a JSON-encoded list");
                return Vec::new();
            }
        },
        Some(value) => value,
        None => return Vec::new(),
    };
    array
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
