//! Query routing and hybrid execution engine for the FTA compliance corpus.
//!
//! Decides, per question, whether the answer comes from the structured
//! relational store (exact counts, lists, lookups), from semantic
//! retrieval + generation (open-ended answers), or from both, then merges
//! the result into one deterministic response.

pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod format;
pub mod resolver;
pub mod semantic;
pub mod synonyms;
pub mod types;

// Re-export primary types for convenience
pub use classifier::{GetView, QueryClassifier, QueryRoute};
pub use config::EngineConfig;
pub use dispatch::{DispatchEntry, DispatchResult, Dispatcher, MemoryStore, StructuredStore};
pub use engine::HybridEngine;
pub use error::EngineError;
pub use format::AnswerMetadata;
pub use resolver::{EntityResolver, MatchOrigin, ResolvedEntities};
pub use semantic::{HttpSemanticRetriever, RankedPassage, SemanticAnswer, SemanticRetriever};
pub use synonyms::SynonymTable;
pub use types::{
    AnswerResponse, AnswerSource, ChildItem, ChildKind, ComplianceArea, HistoryTurn, Operation,
    QuestionRecord, Role, Route,
};

// Re-export common types
pub use anyhow::{Error, Result};
