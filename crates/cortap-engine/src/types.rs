use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of child record owned by a question. Tagged explicitly so the
/// formatter never has to guess result shape from field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    Indicator,
    Deficiency,
}

impl ChildKind {
    /// Noun used in rendered answers ("3 indicators of compliance").
    pub fn noun(&self) -> &'static str {
        match self {
            ChildKind::Indicator => "indicators of compliance",
            ChildKind::Deficiency => "potential deficiencies",
        }
    }
}

/// A single indicator or deficiency under a question record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildItem {
    pub kind: ChildKind,
    /// Stable letter or code label ("a", "TVI3-D1").
    pub code: String,
    pub text: String,
    /// Ordinal position within the owning question. Output order contract.
    pub position: u32,
}

/// A compliance question within an area, with its owned child items.
/// Read-mostly reference data; populated by an out-of-scope ingestion step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Stable question code ("TVI3", "L1", "5307:1").
    pub code: String,
    /// Canonical code of the owning compliance area ("TVI", "L").
    pub area_code: String,
    pub text: String,
    pub position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_requirement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_guidance: Option<String>,
    pub indicators: Vec<ChildItem>,
    pub deficiencies: Vec<ChildItem>,
}

impl QuestionRecord {
    /// Children of the requested kind, in stored ordinal order.
    pub fn children(&self, kind: ChildKind) -> &[ChildItem] {
        match kind {
            ChildKind::Indicator => &self.indicators,
            ChildKind::Deficiency => &self.deficiencies,
        }
    }
}

/// A top-level review topic grouping related questions. Immutable reference
/// data, loaded at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceArea {
    pub code: String,
    pub name: String,
    pub synonyms: Vec<String>,
}

/// Which backend(s) a classified query executes against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    Structured,
    Semantic,
    Combined,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Structured => "STRUCTURED",
            Route::Semantic => "SEMANTIC",
            Route::Combined => "COMBINED",
        }
    }
}

/// Structured action requested within STRUCTURED/COMBINED routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Count,
    List,
    Get,
    Aggregate,
    Compare,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Count => "COUNT",
            Operation::List => "LIST",
            Operation::Get => "GET",
            Operation::Aggregate => "AGGREGATE",
            Operation::Compare => "COMPARE",
        }
    }
}

/// Speaker role in pass-through conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One prior conversation turn. The engine never interprets these; they are
/// forwarded opaquely to the semantic backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

/// Where the rendered answer text came from. Deterministic database answers
/// must stay distinguishable from generative ones downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Database,
    Generative,
}

/// Final response returned to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer_text: String,
    pub route: Route,
    pub operation: Option<Operation>,
    pub matched_entities: Vec<String>,
    pub confidence: f32,
    /// Set when classification confidence fell below the configured
    /// threshold, or when a structured route was downgraded to semantic.
    pub low_confidence: bool,
    pub source: AnswerSource,
    pub execution_time_ms: u64,
    /// Per-entity child item counts for structured answers.
    pub child_item_counts: HashMap<String, usize>,
    pub answered_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(kind: ChildKind, code: &str, pos: u32) -> ChildItem {
        ChildItem {
            kind,
            code: code.to_string(),
            text: format!("item {}", code),
            position: pos,
        }
    }

    #[test]
    fn test_children_selects_by_kind() {
        let record = QuestionRecord {
            code: "TVI3".to_string(),
            area_code: "TVI".to_string(),
            text: "q".to_string(),
            position: 3,
            basic_requirement: None,
            applicability: None,
            reviewer_guidance: None,
            indicators: vec![item(ChildKind::Indicator, "a", 1)],
            deficiencies: vec![
                item(ChildKind::Deficiency, "TVI3-D1", 1),
                item(ChildKind::Deficiency, "TVI3-D2", 2),
            ],
        };
        assert_eq!(record.children(ChildKind::Indicator).len(), 1);
        assert_eq!(record.children(ChildKind::Deficiency).len(), 2);
    }

    #[test]
    fn test_route_serializes_screaming() {
        let json = serde_json::to_string(&Route::Combined).unwrap();
        assert_eq!(json, "\"COMBINED\"");
    }
}
