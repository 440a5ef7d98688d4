//! Query Classifier
//!
//! Assigns each question a route (STRUCTURED, SEMANTIC, COMBINED) and an
//! operation within the structured routes. The decision tree from the
//! original keyword chains is restructured as an explicit ordered list of
//! predicate → route rules: first match wins, and rule precedence is an
//! inspectable data structure rather than implicit nesting.

use serde::{Deserialize, Serialize};

use crate::resolver::ResolvedEntities;
use crate::types::{ChildKind, Operation, Route};

/// Sub-view for GET: a question about applicability renders the
/// applicability text instead of the full record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GetView {
    Full,
    Applicability,
}

/// Transient classification result. Produced fresh per request, never
/// cached; deterministic for a fixed synonym table and input.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRoute {
    pub route: Route,
    pub operation: Option<Operation>,
    pub matched_entities: Vec<String>,
    pub child_kind: ChildKind,
    pub get_view: GetView,
    pub confidence: f32,
    pub reasoning: String,
    /// Name of the rule that fired, for observability.
    pub rule: &'static str,
}

struct RuleContext<'a> {
    question: String,
    entities: &'a ResolvedEntities,
}

/// One routing rule: returns `Some` when it claims the query.
struct RouteRule {
    name: &'static str,
    apply: fn(&RuleContext) -> Option<QueryRoute>,
}

pub struct QueryClassifier {
    rules: Vec<RouteRule>,
}

impl QueryClassifier {
    pub fn new() -> Self {
        // Order matters: the patterns intentionally overlap, and conceptual
        // intent must win over entity presence so "what is the purpose of
        // Title VI" is not misrouted to a structured lookup.
        Self {
            rules: vec![
                RouteRule { name: "conceptual", apply: rule_conceptual },
                RouteRule { name: "multi_entity", apply: rule_multi_entity },
                RouteRule { name: "single_entity_operation", apply: rule_single_entity_operation },
                RouteRule { name: "single_entity_default", apply: rule_single_entity_default },
                RouteRule { name: "corpus_total", apply: rule_corpus_total },
                RouteRule { name: "semantic_fallback", apply: rule_semantic_fallback },
            ],
        }
    }

    /// Pure function of `(question, entities)` for a fixed rule set.
    pub fn classify(&self, question: &str, entities: &ResolvedEntities) -> QueryRoute {
        let ctx = RuleContext {
            question: question.to_lowercase(),
            entities,
        };

        for rule in &self.rules {
            if let Some(route) = (rule.apply)(&ctx) {
                return route;
            }
        }

        // The fallback rule always claims the query; this is unreachable for
        // the shipped rule list but keeps the pipeline total.
        rule_semantic_fallback(&ctx).unwrap_or_else(|| QueryRoute {
            route: Route::Semantic,
            operation: None,
            matched_entities: Vec::new(),
            child_kind: ChildKind::Indicator,
            get_view: GetView::Full,
            confidence: 0.5,
            reasoning: "No rule matched".to_string(),
            rule: "none",
        })
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Keyword predicates
// ---------------------------------------------------------------------------

fn is_conceptual(q: &str) -> bool {
    let patterns = [
        "explain", "why", "purpose", "describe", "rationale", "best practice",
        "how does", "relate",
    ];
    patterns.iter().any(|p| q.contains(p))
}

fn has_count_keyword(q: &str) -> bool {
    let patterns = ["how many", "count", "number of", "total number", "how much"];
    patterns.iter().any(|p| q.contains(p))
}

fn has_list_keyword(q: &str) -> bool {
    let patterns = ["list", "show"];
    patterns.iter().any(|p| q.contains(p))
}

fn has_applicability_keyword(q: &str) -> bool {
    let patterns = ["applicability", "applicable", "applies to", "apply to"];
    patterns.iter().any(|p| q.contains(p))
}

fn has_total_keyword(q: &str) -> bool {
    let patterns = ["total", "sum", "overall", "altogether", "how many", "count"];
    patterns.iter().any(|p| q.contains(p))
}

fn has_compare_keyword(q: &str) -> bool {
    let patterns = [
        "compare", "difference", "differentiate", "contrast", "versus", " vs ", " vs.",
    ];
    patterns.iter().any(|p| q.contains(p))
}

fn has_operation_keyword(q: &str) -> bool {
    has_count_keyword(q) || has_list_keyword(q) || has_applicability_keyword(q)
}

fn child_noun_present(q: &str) -> bool {
    q.contains("indicator") || q.contains("deficienc") || q.contains("question")
}

/// Which child type the question asks about. Defaults to indicators, as the
/// original did.
pub fn requested_child_kind(question: &str) -> ChildKind {
    if question.to_lowercase().contains("deficienc") {
        ChildKind::Deficiency
    } else {
        ChildKind::Indicator
    }
}

// ---------------------------------------------------------------------------
// Rules, in precedence order
// ---------------------------------------------------------------------------

/// Conceptual phrasing with no operation keyword routes semantic regardless
/// of whether entities matched.
fn rule_conceptual(ctx: &RuleContext) -> Option<QueryRoute> {
    if !is_conceptual(&ctx.question) || has_operation_keyword(&ctx.question) {
        return None;
    }
    let codes = ctx.entities.codes();
    let (confidence, reasoning) = if codes.is_empty() {
        (0.85, "Conceptual question with no specific sections. Pure semantic retrieval.".to_string())
    } else {
        (
            0.75,
            format!(
                "Conceptual question about {}. Intent outranks entity presence; semantic retrieval.",
                codes.join(", ")
            ),
        )
    };
    Some(QueryRoute {
        route: Route::Semantic,
        operation: None,
        matched_entities: codes,
        child_kind: requested_child_kind(&ctx.question),
        get_view: GetView::Full,
        confidence,
        reasoning,
        rule: "conceptual",
    })
}

/// More than one matched code means cross-entity work: COMPARE when the
/// question differentiates, AGGREGATE when it asks for a total. The
/// tie-break checks explicit total/count language first; when intent stays
/// ambiguous, COMPARE wins — showing detail beats silently summing.
fn rule_multi_entity(ctx: &RuleContext) -> Option<QueryRoute> {
    let codes = ctx.entities.codes();
    if codes.len() <= 1 {
        return None;
    }

    let compare = has_compare_keyword(&ctx.question);
    let total = has_total_keyword(&ctx.question);
    let operation = if compare && !total {
        Operation::Compare
    } else if total {
        Operation::Aggregate
    } else if has_list_keyword(&ctx.question) {
        Operation::List
    } else {
        Operation::Compare
    };

    let mut confidence: f32 = 0.8;
    if ctx.entities.has_coded_match() {
        confidence += 0.05;
    }
    if child_noun_present(&ctx.question) && (compare || total) {
        confidence += 0.05;
    }

    Some(QueryRoute {
        route: Route::Combined,
        operation: Some(operation),
        matched_entities: codes.clone(),
        child_kind: requested_child_kind(&ctx.question),
        get_view: GetView::Full,
        confidence: confidence.min(0.95),
        reasoning: format!(
            "Multiple sections detected: {}. Requires cross-section {}.",
            codes.join(", "),
            operation.as_str()
        ),
        rule: "multi_entity",
    })
}

/// Exactly one matched code plus an operation keyword.
fn rule_single_entity_operation(ctx: &RuleContext) -> Option<QueryRoute> {
    let codes = ctx.entities.codes();
    if codes.len() != 1 || !has_operation_keyword(&ctx.question) {
        return None;
    }

    let (operation, get_view) = if has_count_keyword(&ctx.question) {
        (Operation::Count, GetView::Full)
    } else if has_applicability_keyword(&ctx.question) {
        (Operation::Get, GetView::Applicability)
    } else {
        (Operation::List, GetView::Full)
    };

    let mut confidence: f32 = if ctx.entities.has_coded_match() { 0.9 } else { 0.8 };
    if child_noun_present(&ctx.question) {
        confidence += 0.05;
    }

    Some(QueryRoute {
        route: Route::Structured,
        operation: Some(operation),
        matched_entities: codes.clone(),
        child_kind: requested_child_kind(&ctx.question),
        get_view,
        confidence: confidence.min(0.95),
        reasoning: format!(
            "Section query ({}) for {}. Direct database path.",
            operation.as_str(),
            codes[0]
        ),
        rule: "single_entity_operation",
    })
}

/// One code, no operation keyword: full-record GET is the safest default —
/// it carries count and list information as a superset.
fn rule_single_entity_default(ctx: &RuleContext) -> Option<QueryRoute> {
    let codes = ctx.entities.codes();
    if codes.len() != 1 {
        return None;
    }
    let confidence = if ctx.entities.has_coded_match() { 0.85 } else { 0.75 };
    Some(QueryRoute {
        route: Route::Structured,
        operation: Some(Operation::Get),
        matched_entities: codes.clone(),
        child_kind: requested_child_kind(&ctx.question),
        get_view: GetView::Full,
        confidence,
        reasoning: format!(
            "Single section query for {}. Full-record lookup suitable.",
            codes[0]
        ),
        rule: "single_entity_default",
    })
}

/// Count language with a child noun but no section scope is a corpus-wide
/// aggregate. An empty entity list tells the dispatcher to total over every
/// area.
fn rule_corpus_total(ctx: &RuleContext) -> Option<QueryRoute> {
    if !ctx.entities.is_empty()
        || !has_count_keyword(&ctx.question)
        || !child_noun_present(&ctx.question)
    {
        return None;
    }
    Some(QueryRoute {
        route: Route::Combined,
        operation: Some(Operation::Aggregate),
        matched_entities: Vec::new(),
        child_kind: requested_child_kind(&ctx.question),
        get_view: GetView::Full,
        confidence: 0.8,
        reasoning: "Corpus-wide count with no specific sections. Aggregating over every area."
            .to_string(),
        rule: "corpus_total",
    })
}

/// No entities, no conceptual pattern: pure semantic retrieval.
fn rule_semantic_fallback(ctx: &RuleContext) -> Option<QueryRoute> {
    Some(QueryRoute {
        route: Route::Semantic,
        operation: None,
        matched_entities: Vec::new(),
        child_kind: requested_child_kind(&ctx.question),
        get_view: GetView::Full,
        confidence: 0.85,
        reasoning: "No sections matched. Semantic retrieval over the corpus.".to_string(),
        rule: "semantic_fallback",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::EntityResolver;
    use crate::synonyms::SynonymTable;

    fn classify(question: &str) -> QueryRoute {
        let resolver = EntityResolver::new(SynonymTable::default());
        let entities = resolver.resolve(question);
        QueryClassifier::new().classify(question, &entities)
    }

    #[test]
    fn test_count_single_code() {
        let route = classify("How many indicators are in TVI3?");
        assert_eq!(route.route, Route::Structured);
        assert_eq!(route.operation, Some(Operation::Count));
        assert_eq!(route.matched_entities, vec!["TVI3"]);
        assert!(route.confidence >= 0.9);
    }

    #[test]
    fn test_aggregate_over_synonym_group() {
        let route = classify("How many indicators are in the Legal section?");
        assert_eq!(route.route, Route::Combined);
        assert_eq!(route.operation, Some(Operation::Aggregate));
        assert_eq!(route.matched_entities, vec!["L1", "L2", "L3"]);
    }

    #[test]
    fn test_conceptual_beats_entity_presence() {
        let route = classify("What is the purpose of Title VI?");
        assert_eq!(route.route, Route::Semantic);
        assert_eq!(route.operation, None);
        // Entities still reported for observability
        assert_eq!(route.matched_entities.len(), 10);
    }

    #[test]
    fn test_compare_two_codes() {
        let route = classify("Compare TVI3 and L1");
        assert_eq!(route.route, Route::Combined);
        assert_eq!(route.operation, Some(Operation::Compare));
        assert_eq!(route.matched_entities, vec!["TVI3", "L1"]);
    }

    #[test]
    fn test_multi_entity_list_without_count_keyword() {
        let route = classify("List all indicators for Title VI");
        assert_eq!(route.route, Route::Combined);
        assert_eq!(route.operation, Some(Operation::List));
        assert_eq!(route.matched_entities.len(), 10);
    }

    #[test]
    fn test_aggregate_wins_tie_with_compare() {
        // Explicit total language outranks the compare keyword.
        let route = classify("Compare the total indicators across TVI3 and L1");
        assert_eq!(route.operation, Some(Operation::Aggregate));
    }

    #[test]
    fn test_single_entity_default_get() {
        let route = classify("TVI3 requirements");
        assert_eq!(route.route, Route::Structured);
        assert_eq!(route.operation, Some(Operation::Get));
    }

    #[test]
    fn test_applicability_subview() {
        let route = classify("What is the applicability of L1?");
        assert_eq!(route.operation, Some(Operation::Get));
        assert_eq!(route.get_view, GetView::Applicability);
    }

    #[test]
    fn test_corpus_total_without_sections() {
        let route = classify("How many total indicators are there?");
        assert_eq!(route.route, Route::Combined);
        assert_eq!(route.operation, Some(Operation::Aggregate));
        assert!(route.matched_entities.is_empty());
    }

    #[test]
    fn test_corpus_total_needs_child_noun() {
        let route = classify("How many are there?");
        assert_eq!(route.rule, "semantic_fallback");
    }

    #[test]
    fn test_no_entities_no_concept_is_semantic() {
        let route = classify("What records must a grantee keep?");
        assert_eq!(route.route, Route::Semantic);
        assert_eq!(route.rule, "semantic_fallback");
    }

    #[test]
    fn test_deficiency_child_kind() {
        let route = classify("List deficiencies in CB1");
        assert_eq!(route.child_kind, ChildKind::Deficiency);
        assert_eq!(route.operation, Some(Operation::List));
    }

    #[test]
    fn test_coded_match_scores_higher_than_synonym() {
        let coded = classify("How many indicators are in TVI3?");
        let synonym = classify("How many indicators are in cybersecurity?");
        assert!(coded.confidence > synonym.confidence);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let a = classify("Compare TVI3 and L1");
        let b = classify("Compare TVI3 and L1");
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.operation, b.operation);
        assert_eq!(a.reasoning, b.reasoning);
    }
}
