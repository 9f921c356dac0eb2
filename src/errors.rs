//! Typed error hierarchy for the Mindshift engine.
//!
//! Three top-level enums cover the three subsystems:
//! - `CatalogError` — script catalog defects and template rendering failures
//! - `StoreError` — session persistence failures
//! - `EngineError` — state machine and session lifecycle failures

use thiserror::Error;

/// Errors from the script catalog: authoring defects caught by lint,
/// plus template rendering against a context that lacks a referenced field.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog has no script for modality {modality}")]
    UnknownModality { modality: String },

    #[error("Script for {modality} declares no phases or steps")]
    EmptyScript { modality: String },

    #[error("Modality {modality} has no step '{step}'")]
    UnknownStep { modality: String, step: String },

    #[error("Step '{step}' in {modality} transitions to unknown step '{target}'")]
    UnknownTransitionTarget {
        modality: String,
        step: String,
        target: String,
    },

    #[error("Duplicate step id '{step}' in {modality}")]
    DuplicateStep { modality: String, step: String },

    #[error("Step '{step}' references unknown placeholder '{{{placeholder}}}'")]
    UnknownPlaceholder { step: String, placeholder: String },

    #[error("Modality {modality} has no terminal step")]
    MissingTerminal { modality: String },

    #[error("Terminal step '{step}' in {modality} is unreachable from the initial step")]
    UnreachableTerminal { modality: String, step: String },

    #[error("Modality {modality} declares cycle cap 0")]
    ZeroCycleCap { modality: String },

    #[error("Fallback step '{step}' in {modality} is not a known step")]
    UnknownFallback { modality: String, step: String },

    #[error("Prompt for step '{step}' references '{{{placeholder}}}' but the context has no value for it")]
    UnrenderedField { step: String, placeholder: String },
}

/// Errors from the session persistence adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session {session_id} not found in store")]
    NotFound { session_id: String },

    #[error("Session record failed to (de)serialize: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Errors from the treatment engine and session lifecycle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Session {session_id} not found")]
    SessionNotFound { session_id: String },

    #[error("Session {session_id} already exists")]
    SessionExists { session_id: String },

    #[error("Session {session_id} is {status} and accepts no further input")]
    SessionTerminal { session_id: String, status: String },

    #[error("Session {session_id} has no snapshot to undo")]
    NothingToUndo { session_id: String },

    #[error("Session {session_id} was recorded against a different script catalog")]
    CatalogMismatch { session_id: String },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_error_unknown_step_carries_ids() {
        let err = CatalogError::UnknownStep {
            modality: "problem_shifting".to_string(),
            step: "body_sense".to_string(),
        };
        match &err {
            CatalogError::UnknownStep { modality, step } => {
                assert_eq!(modality, "problem_shifting");
                assert_eq!(step, "body_sense");
            }
            _ => panic!("Expected UnknownStep variant"),
        }
        assert!(err.to_string().contains("body_sense"));
    }

    #[test]
    fn catalog_error_unrendered_field_names_placeholder() {
        let err = CatalogError::UnrenderedField {
            step: "body_sense".to_string(),
            placeholder: "statement".to_string(),
        };
        assert!(err.to_string().contains("{statement}"));
    }

    #[test]
    fn store_error_not_found_is_matchable() {
        let err = StoreError::NotFound {
            session_id: "abc".to_string(),
        };
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn store_error_converts_from_serde_json() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json");
        let err: StoreError = bad.unwrap_err().into();
        assert!(matches!(err, StoreError::Codec(_)));
    }

    #[test]
    fn engine_error_terminal_carries_status() {
        let err = EngineError::SessionTerminal {
            session_id: "abc".to_string(),
            status: "completed".to_string(),
        };
        match &err {
            EngineError::SessionTerminal { status, .. } => assert_eq!(status, "completed"),
            _ => panic!("Expected SessionTerminal"),
        }
        assert!(err.to_string().contains("completed"));
    }

    #[test]
    fn engine_error_converts_from_catalog_error() {
        let inner = CatalogError::MissingTerminal {
            modality: "reality_shifting".to_string(),
        };
        let err: EngineError = inner.into();
        match &err {
            EngineError::Catalog(CatalogError::MissingTerminal { modality }) => {
                assert_eq!(modality, "reality_shifting");
            }
            _ => panic!("Expected EngineError::Catalog(MissingTerminal)"),
        }
    }

    #[test]
    fn engine_error_converts_from_store_error() {
        let inner = StoreError::NotFound {
            session_id: "s1".to_string(),
        };
        let err: EngineError = inner.into();
        assert!(matches!(err, EngineError::Store(StoreError::NotFound { .. })));
    }

    #[test]
    fn engine_error_variants_are_distinct() {
        let not_found = EngineError::SessionNotFound {
            session_id: "x".to_string(),
        };
        let exists = EngineError::SessionExists {
            session_id: "x".to_string(),
        };
        assert!(matches!(not_found, EngineError::SessionNotFound { .. }));
        assert!(!matches!(not_found, EngineError::SessionExists { .. }));
        assert!(matches!(exists, EngineError::SessionExists { .. }));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        let catalog_err = CatalogError::ZeroCycleCap {
            modality: "trauma_shifting".to_string(),
        };
        assert_std_error(&catalog_err);
        let store_err = StoreError::NotFound {
            session_id: "s".to_string(),
        };
        assert_std_error(&store_err);
        let engine_err = EngineError::NothingToUndo {
            session_id: "s".to_string(),
        };
        assert_std_error(&engine_err);
    }
}
