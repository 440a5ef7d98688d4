//! Hybrid query engine — orchestrates routing and execution across the
//! structured store and the semantic backend.
//!
//! Each request runs the same sequential pipeline: resolve entities,
//! classify, dispatch to the chosen backend(s), format. The semantic
//! backend is invoked at most once per request, including fallback paths.

use anyhow::{Context, Result};
use std::sync::Arc;
use uuid::Uuid;

use crate::classifier::QueryClassifier;
use crate::config::EngineConfig;
use crate::dispatch::{Dispatcher, StructuredStore};
use crate::error::EngineError;
use crate::format::{format_semantic, format_structured, AnswerMetadata};
use crate::resolver::EntityResolver;
use crate::semantic::SemanticRetriever;
use crate::synonyms::SynonymTable;
use crate::types::{AnswerResponse, HistoryTurn, Operation, Route};

/// Process-scoped context object holding the pipeline collaborators.
/// All dependencies are injected; nothing global, so tests substitute
/// fixture tables, stores, and backends freely.
pub struct HybridEngine {
    resolver: EntityResolver,
    classifier: QueryClassifier,
    dispatcher: Dispatcher,
    semantic: Arc<dyn SemanticRetriever>,
    config: EngineConfig,
}

impl HybridEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn StructuredStore>,
        semantic: Arc<dyn SemanticRetriever>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!(e))
            .context("Invalid engine configuration")?;

        let table = match &config.synonym_file {
            Some(path) => SynonymTable::from_file(path)
                .map_err(|e| anyhow::anyhow!(e))
                .context("Failed to load synonym table")?,
            None => SynonymTable::default(),
        };

        tracing::info!(
            synonyms = table.len(),
            semantic_endpoint = %config.semantic.endpoint,
            "Hybrid engine initialized"
        );

        Ok(Self {
            resolver: EntityResolver::new(table),
            classifier: QueryClassifier::new(),
            dispatcher: Dispatcher::new(store),
            semantic,
            config,
        })
    }

    /// Answer one question. Returns within whatever timeout the caller
    /// enforces; no partial or streamed output.
    pub async fn answer(
        &self,
        question: &str,
        history: &[HistoryTurn],
    ) -> Result<AnswerResponse> {
        let start = std::time::Instant::now();
        let request_id = Uuid::new_v4();

        let entities = self.resolver.resolve(question);
        let route = self.classifier.classify(question, &entities);

        tracing::info!(
            %request_id,
            route = route.route.as_str(),
            operation = ?route.operation.map(|o| o.as_str()),
            rule = route.rule,
            confidence = route.confidence,
            entities = ?route.matched_entities,
            reasoning = %route.reasoning,
            "Classified query"
        );

        let (answer_text, metadata) = match route.route {
            Route::Semantic => {
                let answer = self
                    .semantic
                    .retrieve_and_generate(question, history)
                    .await
                    .context("Semantic backend failed")?;
                format_semantic(
                    &route,
                    &answer,
                    self.config.classifier.low_confidence_threshold,
                    false,
                )
            }
            Route::Structured | Route::Combined => {
                // Every structured/combined rule sets an operation; GET is
                // the safe superset if one ever arrives without it.
                let operation = route.operation.unwrap_or(Operation::Get);
                match self
                    .dispatcher
                    .dispatch(operation, &route.matched_entities, route.child_kind)
                    .await
                {
                    Ok(result) => format_structured(
                        &route,
                        &result,
                        self.config.classifier.low_confidence_threshold,
                    ),
                    Err(err) if err.semantic_fallback_eligible() => {
                        self.semantic_fallback(question, history, &route, err)
                            .await?
                    }
                    Err(err) => return Err(err).context("Structured dispatch failed"),
                }
            }
        };

        let response = AnswerResponse {
            answer_text,
            route: metadata.route,
            operation: metadata.operation,
            matched_entities: metadata.matched_entities,
            confidence: metadata.confidence,
            low_confidence: metadata.low_confidence,
            source: metadata.source,
            execution_time_ms: start.elapsed().as_millis() as u64,
            child_item_counts: metadata.child_item_counts,
            answered_at: chrono::Utc::now(),
        };

        tracing::info!(
            %request_id,
            route = response.route.as_str(),
            low_confidence = response.low_confidence,
            execution_time_ms = response.execution_time_ms,
            "Answered query"
        );

        Ok(response)
    }

    /// Retry a failed structured request once through the semantic backend.
    /// The final route is reported as SEMANTIC with the low-confidence flag
    /// set; the original error surfaces only if the fallback also fails.
    async fn semantic_fallback(
        &self,
        question: &str,
        history: &[HistoryTurn],
        route: &crate::classifier::QueryRoute,
        original: EngineError,
    ) -> Result<(String, AnswerMetadata)> {
        tracing::warn!(
            error = %original,
            entities = ?route.matched_entities,
            "Structured dispatch failed, falling back to semantic route"
        );

        match self.semantic.retrieve_and_generate(question, history).await {
            Ok(answer) => Ok(format_semantic(
                route,
                &answer,
                self.config.classifier.low_confidence_threshold,
                true,
            )),
            Err(fallback_err) => {
                tracing::error!(
                    original = %original,
                    fallback = %fallback_err,
                    "Semantic fallback failed after structured dispatch failure"
                );
                Err(original).context(format!(
                    "semantic fallback also failed: {}",
                    fallback_err
                ))
            }
        }
    }
}
