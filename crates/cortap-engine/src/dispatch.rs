//! Structured Query Dispatcher
//!
//! Executes COUNT/LIST/GET/AGGREGATE/COMPARE against the relational store
//! boundary. The store is opaque beyond "entity → question → ordered child
//! items"; anything richer stays behind the `StructuredStore` trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EngineError;
use crate::types::{ChildItem, ChildKind, Operation, QuestionRecord};

/// Relational store boundary. Implementations must return records in the
/// order the codes were requested — output order is a hard contract.
#[async_trait]
pub trait StructuredStore: Send + Sync {
    /// Fetch the question records for the given codes, preserving request
    /// order and silently skipping codes with no record.
    async fn question_records(&self, codes: &[String]) -> Result<Vec<QuestionRecord>, EngineError>;

    /// Every question record in the corpus, in stored area/position order.
    /// Substrate for corpus-wide aggregate totals.
    async fn all_records(&self) -> Result<Vec<QuestionRecord>, EngineError>;
}

/// One entity's slice of a dispatch result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEntry {
    pub code: String,
    pub question_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_requirement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_guidance: Option<String>,
    /// Child items of the requested kind, in stored ordinal order.
    pub items: Vec<ChildItem>,
}

/// Operation-specific transient result. For COUNT and AGGREGATE, `total`
/// equals the sum of per-entry item counts — the central consistency
/// invariant of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub operation: Operation,
    pub child_kind: ChildKind,
    pub entries: Vec<DispatchEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl DispatchResult {
    /// Per-entity child item counts, in entry order.
    pub fn item_counts(&self) -> HashMap<String, usize> {
        self.entries
            .iter()
            .map(|e| (e.code.clone(), e.items.len()))
            .collect()
    }
}

pub struct Dispatcher {
    store: Arc<dyn StructuredStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn StructuredStore>) -> Self {
        Self { store }
    }

    /// Run one structured operation over the resolved entity codes.
    ///
    /// Fails with `EntityNotFound` when none of the codes resolve — callers
    /// treat that as a signal to fall back to the semantic route. An empty
    /// code list is only legal for AGGREGATE (corpus-wide totals).
    pub async fn dispatch(
        &self,
        operation: Operation,
        codes: &[String],
        child_kind: ChildKind,
    ) -> Result<DispatchResult, EngineError> {
        let records = if codes.is_empty() && operation == Operation::Aggregate {
            self.store.all_records().await?
        } else {
            self.store.question_records(codes).await?
        };

        if records.is_empty() {
            return Err(EngineError::EntityNotFound {
                codes: codes.to_vec(),
            });
        }

        tracing::debug!(
            operation = operation.as_str(),
            requested = codes.len(),
            found = records.len(),
            child_kind = ?child_kind,
            "Dispatching structured query"
        );

        let entries: Vec<DispatchEntry> = records
            .iter()
            .map(|r| to_entry(r, child_kind))
            .collect();

        let total = match operation {
            // Aggregate shares the COUNT substrate: count per entry, then
            // sum — never an independent query path — so the grand total
            // always equals the sum of per-entity counts. For COUNT the sum
            // is a convenience; callers decide whether to present it or the
            // itemized breakdown.
            Operation::Count | Operation::Aggregate => {
                Some(entries.iter().map(|e| e.items.len()).sum())
            }
            Operation::List | Operation::Get | Operation::Compare => None,
        };

        Ok(DispatchResult {
            operation,
            child_kind,
            entries,
            total,
        })
    }
}

fn to_entry(record: &QuestionRecord, kind: ChildKind) -> DispatchEntry {
    DispatchEntry {
        code: record.code.clone(),
        question_text: record.text.clone(),
        basic_requirement: record.basic_requirement.clone(),
        applicability: record.applicability.clone(),
        reviewer_guidance: record.reviewer_guidance.clone(),
        items: record.children(kind).to_vec(),
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Reference-data store held in memory. Loaded once at startup from the
/// ingestion pipeline's output; never mutated afterwards, so concurrent
/// requests share it freely.
pub struct MemoryStore {
    records: Vec<QuestionRecord>,
    by_code: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new(mut records: Vec<QuestionRecord>) -> Self {
        records.sort_by(|a, b| {
            a.area_code
                .cmp(&b.area_code)
                .then_with(|| a.position.cmp(&b.position))
        });
        let by_code = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.code.clone(), i))
            .collect();
        Self { records, by_code }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl StructuredStore for MemoryStore {
    async fn question_records(&self, codes: &[String]) -> Result<Vec<QuestionRecord>, EngineError> {
        let mut seen = std::collections::HashSet::new();
        Ok(codes
            .iter()
            .filter(|c| seen.insert(c.as_str()))
            .filter_map(|c| self.by_code.get(c.as_str()))
            .map(|&i| self.records[i].clone())
            .collect())
    }

    async fn all_records(&self) -> Result<Vec<QuestionRecord>, EngineError> {
        Ok(self.records.clone())
    }
}
