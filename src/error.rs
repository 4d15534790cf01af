use thiserror::Error;

/// Errors surfaced by the API client and the token store.
///
/// Each variant maps to a distinct fallback in the views: auth failures ask
/// the user to log in again, validation failures show the first message, and
/// network/server failures degrade to an empty-state display.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// No access token is stored and the API rejected the request.
    #[error("not logged in")]
    Unauthenticated,

    /// The refresh token was rejected; stored tokens have been cleared.
    #[error("session expired, log in again")]
    SessionExpired,

    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response with a body.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    /// Field-keyed validation errors; only the first field's first message is kept.
    #[error("{message}")]
    Validation { field: String, message: String },

    /// A 2xx body that did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Persistent token storage could not be read or written.
    #[error("token storage error: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn server(status: u16, body: impl Into<String>) -> Self {
        Self::Server {
            status,
            body: body.into(),
        }
    }

    /// True for errors that are recovered by logging in again.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::SessionExpired)
    }

    /// True for failures that should degrade to an empty-state display.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Server { .. } | Self::Decode(_)
        )
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Extracts the first field's first message from a field-keyed error body
/// such as `{"username": ["A user with that username already exists."]}`.
///
/// Bodies that are a bare list or a bare string are reported under
/// `non_field_errors`.
pub fn first_validation_message(body: &str) -> Option<(String, String)> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value {
        serde_json::Value::Object(map) => {
            let (field, messages) = map.into_iter().next()?;
            let message = match messages {
                serde_json::Value::Array(items) => items.into_iter().next()?,
                other => other,
            };
            let message = match message {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
            Some((field, message))
        }
        serde_json::Value::Array(items) => match items.into_iter().next()? {
            serde_json::Value::String(text) => Some(("non_field_errors".to_string(), text)),
            other => Some(("non_field_errors".to_string(), other.to_string())),
        },
        serde_json::Value::String(text) => Some(("non_field_errors".to_string(), text)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_field_first_message() {
        let body = r#"{"username": ["A user with that username already exists.", "second"]}"#;
        let (field, message) = first_validation_message(body).unwrap();
        assert_eq!(field, "username");
        assert_eq!(message, "A user with that username already exists.");
    }

    #[test]
    fn bare_list_is_non_field_error() {
        let body = r#"["You cannot delete your own account."]"#;
        let (field, message) = first_validation_message(body).unwrap();
        assert_eq!(field, "non_field_errors");
        assert_eq!(message, "You cannot delete your own account.");
    }

    #[test]
    fn non_json_body_yields_none() {
        assert!(first_validation_message("<html>oops</html>").is_none());
    }

    #[test]
    fn classification_helpers() {
        assert!(ApiError::SessionExpired.is_auth());
        assert!(ApiError::Unauthenticated.is_auth());
        assert!(ApiError::Network("reset".into()).is_degradable());
        assert!(ApiError::server(500, "boom").is_degradable());
        assert!(!ApiError::server(500, "boom").is_auth());
    }
}
