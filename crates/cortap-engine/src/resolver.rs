//! Entity Resolver
//!
//! Maps free-text mentions of compliance areas — coded identifiers like
//! `TVI3` or natural-language names like "Title VI" — to canonical question
//! codes. Structural regex matching and synonym matching run independently
//! and their results are unioned in mention order.

use std::sync::LazyLock;

use crate::synonyms::SynonymTable;

/// Recognizes every question code format in the corpus:
/// TVI3, TVI10-1, ADA-GEN12, ADA-CPT8, TC-PjM4, TC-AM2, TC-PrgM3,
/// generic prefixes (L1, F9, CB1, PTASP5, DBE12), and numeric 5307:1 forms.
/// Word-boundary anchored so codes inside longer tokens do not fire.
static CODE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)\b(TVI\d+(?:-\d+)?|ADA-(?:GEN|CPT)\d+|TC-(?:PjM|AM|PrgM)\d+|\d{4}:\d+|[A-Z]{1,6}\d+(?:-\d+)?)\b",
    )
    .expect("code regex is valid")
});

/// How an entity mention was recognized. Coded identifiers carry more
/// classification confidence than synonym phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOrigin {
    Code,
    Synonym,
}

/// One recognized mention: a coded identifier resolves to a single-code
/// group, a synonym phrase may expand to a whole area's worth of codes.
/// Groups from unrelated areas are kept distinct (not flattened) so the
/// classifier can make COMPARE/AGGREGATE decisions.
#[derive(Debug, Clone)]
pub struct EntityGroup {
    /// The matched surface form ("TVI3", "legal").
    pub label: String,
    pub codes: Vec<String>,
    pub origin: MatchOrigin,
    /// Mention offset in the normalized question. Both match strategies
    /// report offsets in this one space so sorting across them is valid.
    offset: usize,
}

/// Ordered resolution result for one question.
#[derive(Debug, Clone, Default)]
pub struct ResolvedEntities {
    pub groups: Vec<EntityGroup>,
}

impl ResolvedEntities {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// All canonical codes, order-preserving and de-duplicated across groups.
    pub fn codes(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for group in &self.groups {
            for code in &group.codes {
                if seen.insert(code.clone()) {
                    out.push(code.clone());
                }
            }
        }
        out
    }

    pub fn has_coded_match(&self) -> bool {
        self.groups.iter().any(|g| g.origin == MatchOrigin::Code)
    }
}

pub struct EntityResolver {
    table: SynonymTable,
}

impl EntityResolver {
    pub fn new(table: SynonymTable) -> Self {
        Self { table }
    }

    /// Resolve all compliance-area mentions in the question. Structural and
    /// synonym matches are unioned; duplicate codes keep their first
    /// position; the whole result is ordered by mention offset.
    pub fn resolve(&self, question: &str) -> ResolvedEntities {
        let mut groups: Vec<EntityGroup> = Vec::new();

        for m in CODE_RE.find_iter(question) {
            let code = canonicalize_code(m.as_str());
            if groups
                .iter()
                .any(|g| g.origin == MatchOrigin::Code && g.codes[0] == code)
            {
                continue;
            }
            // Synonym offsets index the normalized question, where separator
            // runs collapse. Normalizing the prefix maps the raw regex
            // position into that same space.
            let offset = crate::synonyms::normalize(&question[..m.start()]).len();
            groups.push(EntityGroup {
                label: code.clone(),
                codes: vec![code],
                origin: MatchOrigin::Code,
                offset,
            });
        }

        // A synonym phrase that is itself part of a matched code ("5307"
        // inside "5307:2") adds nothing — the structural match is more
        // specific and already carries the area.
        let code_labels: Vec<String> = groups
            .iter()
            .map(|g| crate::synonyms::normalize(&g.codes[0]))
            .collect();

        for m in self.table.matches(question) {
            if code_labels.iter().any(|c| c.contains(&m.entry.phrase)) {
                continue;
            }
            // Same if the synonym's expansion already covers a directly
            // mentioned code ("section 5307" alongside "5307:2").
            let covers_code = groups.iter().any(|g| {
                g.origin == MatchOrigin::Code && m.entry.codes.contains(&g.codes[0])
            });
            if covers_code {
                continue;
            }
            groups.push(EntityGroup {
                label: m.entry.phrase.clone(),
                codes: m.entry.codes.clone(),
                origin: MatchOrigin::Synonym,
                offset: m.offset,
            });
        }

        groups.sort_by_key(|g| g.offset);

        tracing::debug!(
            groups = groups.len(),
            codes = ?groups.iter().map(|g| g.label.as_str()).collect::<Vec<_>>(),
            "Resolved entity mentions"
        );

        ResolvedEntities { groups }
    }
}

/// Upper-case an extracted code while restoring the stored casing of the
/// mixed-case technical-capacity prefixes (TC-PjM, TC-PrgM).
fn canonicalize_code(raw: &str) -> String {
    let upper = raw.to_uppercase();
    if let Some(rest) = upper.strip_prefix("TC-PJM") {
        return format!("TC-PjM{}", rest);
    }
    if let Some(rest) = upper.strip_prefix("TC-PRGM") {
        return format!("TC-PrgM{}", rest);
    }
    upper
}
