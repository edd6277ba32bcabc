//! Error types for the remote chat and search client.
//!
//! Each error variant carries a stable error code (SCREAMING_SNAKE_CASE)
//! that is included in the Display output and accessible via [`LlmError::code()`].

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Authentication failed (invalid/missing API key).
    pub const AUTH_FAILED: &str = "AUTH_FAILED";

    /// Request to the provider failed.
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";

    /// The provider answered with something we could not interpret.
    pub const RESPONSE_INVALID: &str = "RESPONSE_INVALID";

    /// Request timed out.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";

    /// Provider-specific error not covered by other variants.
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";
}

/// Errors produced by the remote chat/search client.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    ConfigError(String),

    /// Authentication failed (invalid/missing API key).
    #[error("[{}] {}", error_codes::AUTH_FAILED, .0)]
    AuthError(String),

    /// Request to the provider failed.
    #[error("[{}] {}", error_codes::REQUEST_FAILED, .0)]
    RequestError(String),

    /// Response body could not be interpreted.
    #[error("[{}] {}", error_codes::RESPONSE_INVALID, .0)]
    ResponseError(String),

    /// Request timed out.
    #[error("[{}] {}", error_codes::TIMEOUT_ERROR, .0)]
    TimeoutError(String),

    /// Provider-specific error not covered by other variants.
    #[error("[{}] {}", error_codes::PROVIDER_ERROR, .0)]
    ProviderError(String),
}

impl LlmError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => error_codes::CONFIG_INVALID,
            Self::AuthError(_) => error_codes::AUTH_FAILED,
            Self::RequestError(_) => error_codes::REQUEST_FAILED,
            Self::ResponseError(_) => error_codes::RESPONSE_INVALID,
            Self::TimeoutError(_) => error_codes::TIMEOUT_ERROR,
            Self::ProviderError(_) => error_codes::PROVIDER_ERROR,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::ConfigError(m)
            | Self::AuthError(m)
            | Self::RequestError(m)
            | Self::ResponseError(m)
            | Self::TimeoutError(m)
            | Self::ProviderError(m) => m,
        }
    }

    /// Returns true if this error represents a transient failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConfigError(_) | Self::AuthError(_) | Self::ResponseError(_) => false,
            Self::RequestError(_) | Self::TimeoutError(_) | Self::ProviderError(_) => true,
        }
    }

    /// Whether the error means the stored credential is unusable.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::AuthError(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::TimeoutError(format!("request timed out: {e}"))
        } else if e.is_decode() {
            Self::ResponseError(format!("cannot decode response: {e}"))
        } else {
            Self::RequestError(format!("request failed: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_prefix() {
        let err = LlmError::AuthError("API key not valid".into());
        let display = format!("{err}");
        assert!(display.starts_with("[AUTH_FAILED]"));
        assert!(display.contains("API key not valid"));
    }

    #[test]
    fn message_returns_inner_text() {
        let err = LlmError::ResponseError("no candidates".into());
        assert_eq!(err.message(), "no candidates");
        assert_eq!(err.code(), "RESPONSE_INVALID");
    }

    #[test]
    fn all_codes_are_screaming_snake_case() {
        let errors = [
            LlmError::ConfigError("x".into()),
            LlmError::AuthError("x".into()),
            LlmError::RequestError("x".into()),
            LlmError::ResponseError("x".into()),
            LlmError::TimeoutError("x".into()),
            LlmError::ProviderError("x".into()),
        ];
        for err in &errors {
            let code = err.code();
            assert!(
                code.chars().all(|c| c.is_ascii_uppercase() || c == '_'),
                "code {code:?} is not SCREAMING_SNAKE_CASE"
            );
        }
    }

    #[test]
    fn retryability() {
        assert!(!LlmError::AuthError("x".into()).is_retryable());
        assert!(!LlmError::ConfigError("x".into()).is_retryable());
        assert!(LlmError::TimeoutError("x".into()).is_retryable());
        assert!(LlmError::ProviderError("503".into()).is_retryable());
    }

    #[test]
    fn only_auth_errors_are_credential_errors() {
        assert!(LlmError::AuthError("x".into()).is_credential_error());
        assert!(!LlmError::RequestError("x".into()).is_credential_error());
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmError>();
    }
}
