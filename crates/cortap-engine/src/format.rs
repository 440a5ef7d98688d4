//! Result Merger/Formatter
//!
//! Converts dispatcher output (and, for semantic routes, the generated
//! answer) into one hierarchical display text plus structured metadata.
//! The formatter never re-orders entities or child items relative to their
//! stored ordinal position — fixtures assert on literal output order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::classifier::{GetView, QueryRoute};
use crate::dispatch::{DispatchEntry, DispatchResult};
use crate::semantic::SemanticAnswer;
use crate::types::{AnswerSource, Operation, Route};

/// Structured metadata accompanying every rendered answer, so downstream
/// consumers can distinguish deterministic answers from generative ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerMetadata {
    pub route: Route,
    pub operation: Option<Operation>,
    pub matched_entities: Vec<String>,
    pub confidence: f32,
    pub low_confidence: bool,
    pub source: AnswerSource,
    pub child_item_counts: HashMap<String, usize>,
}

/// Render a structured dispatch result for the given route.
pub fn format_structured(
    route: &QueryRoute,
    result: &DispatchResult,
    low_confidence_threshold: f32,
) -> (String, AnswerMetadata) {
    let text = match result.operation {
        Operation::Count => format_count(result),
        Operation::List => format_list(result),
        Operation::Get => format_get(result, route.get_view),
        Operation::Aggregate => format_aggregate(result),
        Operation::Compare => format_compare(result),
    };

    let metadata = AnswerMetadata {
        route: route.route,
        operation: Some(result.operation),
        matched_entities: result.entries.iter().map(|e| e.code.clone()).collect(),
        confidence: route.confidence,
        low_confidence: route.confidence < low_confidence_threshold,
        source: AnswerSource::Database,
        child_item_counts: result.item_counts(),
    };

    (text, metadata)
}

/// Pass the generated answer through unchanged; only metadata marks the
/// route as semantic.
pub fn format_semantic(
    route: &QueryRoute,
    answer: &SemanticAnswer,
    low_confidence_threshold: f32,
    downgraded: bool,
) -> (String, AnswerMetadata) {
    let metadata = AnswerMetadata {
        route: Route::Semantic,
        operation: None,
        matched_entities: route.matched_entities.clone(),
        confidence: route.confidence,
        low_confidence: downgraded || route.confidence < low_confidence_threshold,
        source: AnswerSource::Generative,
        child_item_counts: HashMap::new(),
    };

    (answer.answer_text.clone(), metadata)
}

// ---------------------------------------------------------------------------
// Per-operation rendering
// ---------------------------------------------------------------------------

fn format_count(result: &DispatchResult) -> String {
    let noun = result.child_kind.noun();
    let total = result.total.unwrap_or(0);

    // Singular total, no itemization.
    if let [entry] = result.entries.as_slice() {
        format!(
            "**{}**: {}\n\nThere are **{} {}** for this question.",
            entry.code, entry.question_text, total, noun
        )
    } else {
        let breakdown = per_entity_breakdown(&result.entries);
        format!(
            "There are **{} {}** across {} questions ({}).",
            total,
            noun,
            result.entries.len(),
            breakdown
        )
    }
}

fn format_list(result: &DispatchResult) -> String {
    let noun = result.child_kind.noun();
    let mut out = String::new();
    for entry in &result.entries {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!(
            "**{}**: {}\n\nThere are **{} {}**:\n",
            entry.code,
            entry.question_text,
            entry.items.len(),
            noun
        ));
        push_items(&mut out, entry);
    }
    out
}

fn format_get(result: &DispatchResult, view: GetView) -> String {
    let mut out = String::new();
    for entry in &result.entries {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("**{}**: {}\n", entry.code, entry.question_text));

        if view == GetView::Applicability {
            match &entry.applicability {
                Some(text) => out.push_str(&format!("\n**Applicability**: {}\n", text)),
                None => out.push_str("\nNo applicability information recorded.\n"),
            }
            continue;
        }

        if let Some(req) = &entry.basic_requirement {
            out.push_str(&format!("\n**Basic Requirement**: {}\n", req));
        }
        if let Some(app) = &entry.applicability {
            out.push_str(&format!("\n**Applicability**: {}\n", app));
        }
        if let Some(guidance) = &entry.reviewer_guidance {
            out.push_str(&format!("\n**Reviewer Guidance**: {}\n", guidance));
        }

        out.push_str(&format!(
            "\n**{}** ({}):\n",
            capitalize(result.child_kind.noun()),
            entry.items.len()
        ));
        push_items(&mut out, entry);
    }
    out
}

fn format_aggregate(result: &DispatchResult) -> String {
    let noun = result.child_kind.noun();
    let total = result.total.unwrap_or(0);
    format!(
        "There are **{} total {}** across {} questions ({}).",
        total,
        noun,
        result.entries.len(),
        per_entity_breakdown(&result.entries)
    )
}

fn format_compare(result: &DispatchResult) -> String {
    let noun = result.child_kind.noun();
    let mut out = String::new();
    // One heading block per entity, concatenated in first-match order.
    for entry in &result.entries {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!(
            "### {}\n{}\n\n{} {}:\n",
            entry.code,
            entry.question_text,
            entry.items.len(),
            noun
        ));
        push_items(&mut out, entry);
    }
    out
}

/// "(L1: 3, L2: 3, L3: 2)" contribution breakdown, in entry order.
fn per_entity_breakdown(entries: &[DispatchEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}", e.code, e.items.len()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_items(out: &mut String, entry: &DispatchEntry) {
    for item in &entry.items {
        out.push_str(&format!("  {}. {}\n", item.code, item.text));
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChildItem, ChildKind};

    fn entry(code: &str, items: usize) -> DispatchEntry {
        let letters = ["a", "b", "c", "d"];
        DispatchEntry {
            code: code.to_string(),
            question_text: format!("Question {}", code),
            basic_requirement: Some("Keep records".to_string()),
            applicability: Some("All recipients".to_string()),
            reviewer_guidance: None,
            items: (0..items)
                .map(|i| ChildItem {
                    kind: ChildKind::Indicator,
                    code: letters[i].to_string(),
                    text: format!("{} item {}", code, letters[i]),
                    position: i as u32 + 1,
                })
                .collect(),
        }
    }

    fn route(op: Operation) -> QueryRoute {
        QueryRoute {
            route: Route::Structured,
            operation: Some(op),
            matched_entities: vec!["TVI3".to_string()],
            child_kind: ChildKind::Indicator,
            get_view: GetView::Full,
            confidence: 0.9,
            reasoning: "test".to_string(),
            rule: "test",
        }
    }

    fn result(op: Operation, entries: Vec<DispatchEntry>) -> DispatchResult {
        let total = matches!(op, Operation::Count | Operation::Aggregate)
            .then(|| entries.iter().map(|e| e.items.len()).sum());
        DispatchResult {
            operation: op,
            child_kind: ChildKind::Indicator,
            entries,
            total,
        }
    }

    #[test]
    fn test_count_phrase() {
        let (text, meta) = format_structured(
            &route(Operation::Count),
            &result(Operation::Count, vec![entry("TVI3", 4)]),
            0.6,
        );
        assert!(text.contains("There are **4 indicators of compliance** for this question."));
        assert!(!text.contains("a. "));
        assert_eq!(meta.source, AnswerSource::Database);
        assert_eq!(meta.child_item_counts["TVI3"], 4);
    }

    #[test]
    fn test_aggregate_breakdown() {
        let entries = vec![entry("L1", 3), entry("L2", 3), entry("L3", 2)];
        let (text, _) = format_structured(
            &route(Operation::Aggregate),
            &result(Operation::Aggregate, entries),
            0.6,
        );
        assert!(text.contains("**8 total indicators of compliance**"));
        assert!(text.contains("(L1: 3, L2: 3, L3: 2)"));
    }

    #[test]
    fn test_list_nesting_and_order() {
        let (text, _) = format_structured(
            &route(Operation::List),
            &result(Operation::List, vec![entry("L1", 3)]),
            0.6,
        );
        let a = text.find("a. L1 item a").unwrap();
        let b = text.find("b. L1 item b").unwrap();
        let c = text.find("c. L1 item c").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_compare_blocks_in_order() {
        let (text, _) = format_structured(
            &route(Operation::Compare),
            &result(Operation::Compare, vec![entry("TVI3", 2), entry("L1", 3)]),
            0.6,
        );
        let tvi = text.find("### TVI3").unwrap();
        let l1 = text.find("### L1").unwrap();
        assert!(tvi < l1);
    }

    #[test]
    fn test_get_full_view() {
        let (text, _) = format_structured(
            &route(Operation::Get),
            &result(Operation::Get, vec![entry("CB1", 2)]),
            0.6,
        );
        assert!(text.contains("**Basic Requirement**: Keep records"));
        assert!(text.contains("**Applicability**: All recipients"));
        assert!(text.contains("**Indicators of compliance** (2):"));
    }

    #[test]
    fn test_get_applicability_view() {
        let mut r = route(Operation::Get);
        r.get_view = GetView::Applicability;
        let (text, _) =
            format_structured(&r, &result(Operation::Get, vec![entry("CB1", 2)]), 0.6);
        assert!(text.contains("**Applicability**: All recipients"));
        assert!(!text.contains("Basic Requirement"));
        assert!(!text.contains("a. CB1 item a"));
    }

    #[test]
    fn test_semantic_passthrough() {
        let answer = SemanticAnswer {
            answer_text: "Title VI prohibits discrimination.".to_string(),
            ranked_passages: Vec::new(),
        };
        let r = QueryRoute {
            route: Route::Semantic,
            operation: None,
            matched_entities: Vec::new(),
            child_kind: ChildKind::Indicator,
            get_view: GetView::Full,
            confidence: 0.85,
            reasoning: "test".to_string(),
            rule: "test",
        };
        let (text, meta) = format_semantic(&r, &answer, 0.6, false);
        assert_eq!(text, "Title VI prohibits discrimination.");
        assert_eq!(meta.route, Route::Semantic);
        assert_eq!(meta.source, AnswerSource::Generative);
        assert!(!meta.low_confidence);
    }

    #[test]
    fn test_downgraded_semantic_flags_low_confidence() {
        let answer = SemanticAnswer {
            answer_text: "fallback".to_string(),
            ranked_passages: Vec::new(),
        };
        let (_, meta) = format_semantic(&route(Operation::Get), &answer, 0.6, true);
        assert!(meta.low_confidence);
    }

    #[test]
    fn test_low_confidence_threshold_flag() {
        let mut r = route(Operation::Count);
        r.confidence = 0.5;
        let (_, meta) = format_structured(
            &r,
            &result(Operation::Count, vec![entry("TVI3", 4)]),
            0.6,
        );
        assert!(meta.low_confidence);
    }
}
