//! Error taxonomy for the matching, ranking, and caching engine.
//!
//! Commands and config loading return [`anyhow::Result`]; everything below
//! them reports a [`FoodError`] so the orchestrator can tell transient
//! provider failures apart from bad input and storage faults.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FoodError {
    /// Raw ingredient text that does not survive normalization.
    #[error("invalid ingredient '{raw}': {reason}")]
    InvalidIngredient { raw: String, reason: String },

    /// Network failure, timeout, or 5xx from the recipe provider.
    #[error("recipe provider unavailable: {message}")]
    ProviderUnavailable { message: String },

    /// Rate limit or daily quota exhausted.
    #[error("recipe provider quota exceeded: {message}")]
    ProviderQuota { message: String },

    /// The provider refused the request (bad key, bad parameters).
    #[error("recipe provider rejected the request ({status}): {message}")]
    ProviderRejected { status: u16, message: String },

    /// No provider is configured; only cached queries can be answered.
    #[error("recipe provider is disabled; '{query}' is not cached")]
    ProviderDisabled { query: String },

    /// A provider record that could not be validated into a meal.
    #[error("malformed provider record: {message}")]
    MalformedRecord { message: String },

    #[error("failed to write cache record: {message}")]
    StoreWrite { message: String },

    #[error("failed to read cache record: {message}")]
    StoreRead { message: String },

    #[error("translation of '{text}' failed: {message}")]
    Translation { text: String, message: String },
}

impl FoodError {
    pub fn invalid_ingredient(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIngredient {
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            message: message.into(),
        }
    }

    pub fn provider_quota(message: impl Into<String>) -> Self {
        Self::ProviderQuota {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: message.into(),
        }
    }

    pub fn store_write(err: impl std::fmt::Display) -> Self {
        Self::StoreWrite {
            message: err.to_string(),
        }
    }

    pub fn store_read(err: impl std::fmt::Display) -> Self {
        Self::StoreRead {
            message: err.to_string(),
        }
    }

    pub fn translation(text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Translation {
            text: text.into(),
            message: message.into(),
        }
    }

    /// Whether the orchestrator may retry the failed provider call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. } | Self::ProviderQuota { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_provider_errors_retry() {
        assert!(FoodError::provider_unavailable("timeout").is_retryable());
        assert!(FoodError::provider_quota("429").is_retryable());
        assert!(!FoodError::ProviderRejected {
            status: 401,
            message: "bad key".to_string()
        }
        .is_retryable());
        assert!(!FoodError::invalid_ingredient("!!", "empty").is_retryable());
        assert!(!FoodError::store_write("disk full").is_retryable());
    }

    #[test]
    fn test_messages_name_the_input() {
        let err = FoodError::invalid_ingredient("$$$", "nothing left after stripping");
        assert!(err.to_string().contains("$$$"));
    }
}
