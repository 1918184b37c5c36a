use thiserror::Error;

/// Failure taxonomy for the resolution + search pipeline.
///
/// None of these escape the core as panics or unhandled errors: backend and
/// parameter failures are folded into a degraded `SearchResult`, and model
/// failures are consumed by the resolver's fallback policy. The variants
/// carry strings rather than source errors so results stay `Clone`able and
/// comparable in tests.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("search backend unreachable: {0}")]
    BackendUnavailable(String),
    #[error("search backend returned status {status}: {detail}")]
    BackendError { status: u16, detail: String },
    #[error("language model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl SearchError {
    /// True when the failure came from the search backend transport layer,
    /// as opposed to bad input or a missing document.
    pub fn is_backend_fault(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::BackendError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::SearchError;

    #[test]
    fn backend_faults_are_classified() {
        assert!(SearchError::BackendUnavailable("connection refused".to_owned())
            .is_backend_fault());
        assert!(SearchError::BackendError { status: 503, detail: "overloaded".to_owned() }
            .is_backend_fault());
        assert!(!SearchError::NotFound("은하수".to_owned()).is_backend_fault());
        assert!(!SearchError::InvalidParameters("no price bound".to_owned()).is_backend_fault());
    }

    #[test]
    fn display_includes_status_for_backend_errors() {
        let error = SearchError::BackendError { status: 502, detail: "bad gateway".to_owned() };
        assert_eq!(error.to_string(), "search backend returned status 502: bad gateway");
    }
}
