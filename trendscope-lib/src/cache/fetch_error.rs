use std::sync::Arc;

/// Failures reported by the cache layer.
///
/// Cloneable so that a single outcome can be handed to every caller waiting on
/// the same fetch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The storage backend could not be read or written.
    #[error("storage unavailable: {0:#}")]
    StorageUnavailable(Arc<ohno::AppError>),

    /// The producer for a key failed, timed out, or was cancelled.
    #[error("producer failed for '{key}': {cause:#}")]
    ProducerFailure { key: String, cause: Arc<ohno::AppError> },

    /// The key's parameters cannot be turned into a fingerprint.
    #[error("malformed cache key: {0}")]
    MalformedKey(String),

    /// A value could not be converted to or from its stored form.
    #[error("could not convert value for '{key}': {message}")]
    Serialization { key: String, message: String },
}

impl FetchError {
    pub(crate) fn storage(error: ohno::AppError) -> Self {
        Self::StorageUnavailable(Arc::new(error))
    }

    pub(crate) fn producer(key: impl Into<String>, error: ohno::AppError) -> Self {
        Self::ProducerFailure {
            key: key.into(),
            cause: Arc::new(error),
        }
    }

    pub(crate) fn serialization(key: impl Into<String>, error: &serde_json::Error) -> Self {
        Self::Serialization {
            key: key.into(),
            message: error.to_string(),
        }
    }

    /// Whether this failure came from the storage medium rather than the data itself.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    #[must_use]
    pub const fn is_producer_failure(&self) -> bool {
        matches!(self, Self::ProducerFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ohno::app_err;

    #[test]
    fn clones_share_the_producer_error() {
        let error = FetchError::producer("reddit:2024-05-01", app_err!("request timed out"));
        let copy = error.clone();

        match (&error, &copy) {
            (FetchError::ProducerFailure { cause: a, .. }, FetchError::ProducerFailure { cause: b, .. }) => {
                assert!(Arc::ptr_eq(a, b));
            }
            _ => panic!("expected producer failures"),
        }
        assert!(copy.to_string().contains("request timed out"));
        assert!(copy.to_string().contains("reddit:2024-05-01"));
    }

    #[test]
    fn classification() {
        assert!(FetchError::storage(app_err!("disk full")).is_storage());
        assert!(!FetchError::MalformedKey("x".into()).is_storage());
        assert!(FetchError::producer("k", app_err!("boom")).is_producer_failure());
    }
}
