//! Synonym table for compliance area names.
//!
//! Maps normalized natural-language phrases ("title vi", "legal section")
//! to the canonical question codes they expand to. The table is immutable
//! and injected at startup — tests substitute fixture tables without
//! touching process-wide state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::types::ComplianceArea;

/// One phrase → codes mapping. Phrases are stored pre-normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynonymEntry {
    pub phrase: String,
    pub codes: Vec<String>,
}

/// A phrase that matched somewhere in a question.
#[derive(Debug, Clone)]
pub struct SynonymMatch<'a> {
    pub entry: &'a SynonymEntry,
    /// Byte offset of the first occurrence in the normalized question.
    /// Used to keep entity mention order stable downstream.
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct SynonymTable {
    /// Sorted longest-phrase-first so a specific synonym ("ada paratransit")
    /// shadows a shorter one ("ada") contained within it.
    entries: Vec<SynonymEntry>,
}

/// Lower-case and strip punctuation so phrase containment is robust to
/// hyphenation and casing ("Drug-Free Workplace" == "drug free workplace").
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == ':' {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

impl SynonymTable {
    pub fn from_entries(raw: Vec<(String, Vec<String>)>) -> Self {
        let mut entries: Vec<SynonymEntry> = raw
            .into_iter()
            .map(|(phrase, codes)| SynonymEntry {
                phrase: normalize(&phrase),
                codes,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.phrase
                .len()
                .cmp(&a.phrase.len())
                .then_with(|| a.phrase.cmp(&b.phrase))
        });
        Self { entries }
    }

    /// Build from area reference data: each area contributes its display
    /// name and synonyms, all expanding to that area's question codes.
    /// Areas absent from `question_codes` contribute nothing.
    pub fn from_areas(
        areas: &[ComplianceArea],
        question_codes: &HashMap<String, Vec<String>>,
    ) -> Self {
        let mut raw = Vec::new();
        for area in areas {
            let Some(codes) = question_codes.get(&area.code) else {
                continue;
            };
            raw.push((area.name.clone(), codes.clone()));
            for synonym in &area.synonyms {
                raw.push((synonym.clone(), codes.clone()));
            }
        }
        Self::from_entries(raw)
    }

    /// Load a versioned synonym file: a JSON object of phrase → code list.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read synonym file: {}", e))?;
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse synonym file: {}", e))?;
        Ok(Self::from_entries(raw.into_iter().collect()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find all synonym entries contained in the question, longest phrase
    /// first. A shorter phrase that is a substring of an already-accepted
    /// longer phrase is suppressed — "ada paratransit indicators" must not
    /// also fire the generic "ada" group.
    pub fn matches<'a>(&'a self, question: &str) -> Vec<SynonymMatch<'a>> {
        let normalized = normalize(question);
        let mut accepted: Vec<SynonymMatch<'a>> = Vec::new();

        for entry in &self.entries {
            let Some(offset) = find_phrase(&normalized, &entry.phrase) else {
                continue;
            };
            let shadowed = accepted
                .iter()
                .any(|m| m.entry.phrase.contains(entry.phrase.as_str()));
            if !shadowed {
                accepted.push(SynonymMatch { entry, offset });
            }
        }

        accepted.sort_by_key(|m| m.offset);
        accepted
    }
}

/// Substring containment with word boundaries on both ends, so "law" does
/// not fire inside "bylaws".
fn find_phrase(haystack: &str, phrase: &str) -> Option<usize> {
    if phrase.is_empty() {
        return None;
    }
    let mut search_from = 0;
    while let Some(rel) = haystack[search_from..].find(phrase) {
        let start = search_from + rel;
        let end = start + phrase.len();
        let before_ok = start == 0
            || haystack[..start]
                .chars()
                .next_back()
                .is_some_and(|c| !c.is_alphanumeric());
        let after_ok = end == haystack.len()
            || haystack[end..]
                .chars()
                .next()
                .is_some_and(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return Some(start);
        }
        search_from = end;
    }
    None
}

/// Expand "PFX" + 1..=n into ["PFX1", ..., "PFXn"].
fn expand(prefix: &str, count: u32) -> Vec<String> {
    (1..=count).map(|i| format!("{}{}", prefix, i)).collect()
}

impl Default for SynonymTable {
    /// Compiled-in table mirroring the shipped section mappings. Serves as
    /// the fallback when no synonym file is configured.
    fn default() -> Self {
        let mut raw: Vec<(String, Vec<String>)> = Vec::new();
        let mut add = |phrases: &[&str], codes: Vec<String>| {
            for p in phrases {
                raw.push((p.to_string(), codes.clone()));
            }
        };

        add(
            &["legal", "law", "legal matters", "legal requirements", "legal section"],
            expand("L", 3),
        );
        add(
            &["financial", "finance", "financial management", "financial capacity", "budget"],
            expand("F", 9),
        );
        add(
            &["technical capacity award", "award management", "tc award"],
            expand("TC-AM", 5),
        );
        add(
            &["technical capacity program", "program management", "subrecipient oversight"],
            expand("TC-PrgM", 7),
        );
        add(
            &["technical capacity project", "project management", "tc project"],
            expand("TC-PjM", 4),
        );
        add(
            &["transit asset", "asset management", "tam"],
            expand("TAM", 8),
        );
        add(
            &["continuing control", "scc", "satisfactory control"],
            expand("SCC", 13),
        );
        add(&["maintenance", "vehicle maintenance"], expand("M", 5));
        // P3 was retired from the guide; the range intentionally skips it.
        let procurement: Vec<String> = (1..=21).filter(|i| *i != 3).map(|i| format!("P{}", i)).collect();
        add(&["procurement", "purchasing", "contracting"], procurement);
        add(
            &["dbe", "disadvantaged business", "dbe program"],
            expand("DBE", 13),
        );
        add(
            &["title vi", "title 6", "civil rights", "nondiscrimination"],
            expand("TVI", 10),
        );
        add(
            &["ada", "ada general", "americans with disabilities", "accessibility", "disabilities"],
            expand("ADA-GEN", 14),
        );
        add(
            &["paratransit", "ada paratransit", "complementary paratransit"],
            expand("ADA-CPT", 8),
        );
        add(
            &["eeo", "equal employment", "employment opportunity"],
            expand("EEO", 5),
        );
        add(&["school bus", "school transportation"], expand("SB", 4));
        add(
            &["charter bus", "charter service", "charter operations"],
            expand("CB", 3),
        );
        add(
            &["drug free", "drug-free workplace", "dfwa"],
            expand("DFWA", 3),
        );
        add(
            &["drug and alcohol", "drug alcohol program", "substance abuse"],
            expand("DA", 5),
        );
        add(
            &["5307", "section 5307", "urbanized area"],
            expand("5307:", 5),
        );
        add(
            &["5310", "section 5310", "elderly and disabled"],
            expand("5310:", 5),
        );
        add(
            &["5311", "section 5311", "rural area", "rural transit"],
            expand("5311:", 4),
        );
        add(
            &["ptasp", "safety plan", "agency safety plan"],
            expand("PTASP", 6),
        );
        add(
            &["cybersecurity", "cyber security", "information security"],
            vec!["C1".to_string()],
        );

        Self::from_entries(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize("Drug-Free  Workplace!"), "drug free workplace");
        assert_eq!(normalize("Title VI?"), "title vi");
    }

    #[test]
    fn test_longest_phrase_wins() {
        let table = SynonymTable::default();
        let matches = table.matches("list ada paratransit indicators");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].entry.phrase, "ada paratransit");
        assert!(matches[0].entry.codes[0].starts_with("ADA-CPT"));
    }

    #[test]
    fn test_short_synonym_fires_alone() {
        let table = SynonymTable::default();
        let matches = table.matches("how many ada indicators are there");
        assert_eq!(matches.len(), 1);
        assert!(matches[0].entry.codes[0].starts_with("ADA-GEN"));
    }

    #[test]
    fn test_word_boundary_containment() {
        let table = SynonymTable::from_entries(vec![(
            "law".to_string(),
            vec!["L1".to_string()],
        )]);
        assert!(table.matches("questions about bylaws").is_empty());
        assert_eq!(table.matches("questions about the law").len(), 1);
    }

    #[test]
    fn test_legal_expands_to_three_codes() {
        let table = SynonymTable::default();
        let matches = table.matches("how many indicators in the legal section");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].entry.codes, vec!["L1", "L2", "L3"]);
    }

    #[test]
    fn test_matches_ordered_by_mention() {
        let table = SynonymTable::default();
        let matches = table.matches("compare charter bus and school bus requirements");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].entry.codes[0], "CB1");
        assert_eq!(matches[1].entry.codes[0], "SB1");
    }

    #[test]
    fn test_from_areas_maps_name_and_synonyms() {
        let areas = vec![ComplianceArea {
            code: "TVI".to_string(),
            name: "Title VI".to_string(),
            synonyms: vec!["civil rights".to_string()],
        }];
        let codes: HashMap<String, Vec<String>> =
            [("TVI".to_string(), vec!["TVI1".to_string(), "TVI2".to_string()])]
                .into_iter()
                .collect();
        let table = SynonymTable::from_areas(&areas, &codes);
        assert_eq!(table.len(), 2);
        assert_eq!(table.matches("title vi reporting")[0].entry.codes.len(), 2);
        assert_eq!(table.matches("civil rights review")[0].entry.codes.len(), 2);
    }

    #[test]
    fn test_from_file_round_trip() {
        let dir = std::env::temp_dir().join("cortap-syn-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("synonyms.json");
        std::fs::write(&path, r#"{"legal": ["L1", "L2"]}"#).unwrap();
        let table = SynonymTable::from_file(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.matches("legal stuff")[0].entry.codes.len(), 2);
    }
}
