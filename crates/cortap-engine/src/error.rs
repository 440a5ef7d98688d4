use thiserror::Error;

/// Errors surfaced by the routing and dispatch core.
///
/// `EntityNotFound` and `AmbiguousEntity` are recoverable: the engine
/// downgrades to a semantic route or reclassifies as multi-entity. Backend
/// failures propagate so callers can distinguish "no data" from "could not
/// query" — a zero count is never synthesized for a failed query.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no compliance records found for codes: {}", codes.join(", "))]
    EntityNotFound { codes: Vec<String> },

    #[error("'{phrase}' maps to multiple unrelated areas: {}", codes.join(", "))]
    AmbiguousEntity { phrase: String, codes: Vec<String> },

    #[error("structured store unavailable: {0}")]
    BackendUnavailable(String),

    #[error("semantic backend error: {0}")]
    SemanticBackend(String),
}

impl EngineError {
    /// Whether the engine should retry the request through the semantic
    /// backend before surfacing the failure.
    pub fn semantic_fallback_eligible(&self) -> bool {
        matches!(
            self,
            EngineError::EntityNotFound { .. } | EngineError::BackendUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ambiguous() -> EngineError {
        EngineError::AmbiguousEntity {
            phrase: "safety".to_string(),
            codes: vec!["PTASP1".to_string(), "DA1".to_string()],
        }
    }

    #[test]
    fn test_fallback_eligibility() {
        let not_found = EngineError::EntityNotFound {
            codes: vec!["XYZ99".to_string()],
        };
        let unavailable = EngineError::BackendUnavailable("connection refused".to_string());
        assert!(not_found.semantic_fallback_eligible());
        assert!(unavailable.semantic_fallback_eligible());
        // Ambiguity is resolved by reclassification, not by a generative
        // retry; semantic failures are never retried internally.
        assert!(!ambiguous().semantic_fallback_eligible());
        assert!(!EngineError::SemanticBackend("timeout".to_string()).semantic_fallback_eligible());
    }

    #[test]
    fn test_ambiguous_entity_display_lists_codes() {
        assert_eq!(
            ambiguous().to_string(),
            "'safety' maps to multiple unrelated areas: PTASP1, DA1"
        );
    }
}
