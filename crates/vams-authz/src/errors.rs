use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid resource object: {0}")]
    InvalidResource(String),
    #[error("resource is missing field referenced by policy: {0}")]
    MissingField(String),
    #[error("invalid criterion on field {field}: {reason}")]
    InvalidCriterion { field: String, reason: String },
    #[error("casbin error: {0}")]
    Casbin(#[from] casbin::Error),
}

pub type AuthzResult<T> = Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        let errors = vec![
            AuthzError::InvalidResource("not an object".to_string()),
            AuthzError::MissingField("assetId".to_string()),
            AuthzError::InvalidCriterion {
                field: "databaseId".to_string(),
                reason: "unclosed group".to_string(),
            },
        ];

        for error in errors {
            let rendered = error.to_string();
            assert!(!rendered.is_empty());
        }
    }

    #[test]
    fn missing_field_names_the_field() {
        let err = AuthzError::MissingField("assetId".to_string());
        assert!(err.to_string().contains("assetId"));
    }
}
