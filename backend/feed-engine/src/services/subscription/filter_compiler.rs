// ============================================
// Subscription Filter Compiler
// ============================================
//
// Stored filters -> store predicate.
//
//   keywords: OR over whitespace-split terms x searchable text fields
//   tags:     OR over TagContains
//   authors:  OR over AuthorContains
//
// Present families are AND-ed. An absent or empty family is left out of the
// conjunction, so a subscription without filters matches the whole family.
//
// Multi-word keywords are split into independent terms: "graph neural"
// matches items containing "graph" OR "neural". This favours recall and can
// let loosely related items through.

use crate::error::{EngineError, Result};
use crate::models::{ContentType, SubscriptionFilters};
use crate::store::Predicate;
use std::collections::HashSet;

/// Parsed filter lists, keywords already split into terms
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterTerms {
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub authors: Vec<String>,
}

impl FilterTerms {
    pub fn parse(filters: &SubscriptionFilters) -> Result<Self> {
        let keywords = parse_list("keywords", filters.keywords.as_deref())?;
        Ok(Self {
            keywords: split_terms(&keywords),
            tags: parse_list("tags", filters.tags.as_deref())?,
            authors: parse_list("authors", filters.authors.as_deref())?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.tags.is_empty() && self.authors.is_empty()
    }
}

/// Reject filters whose lists are not JSON string arrays
pub fn validate(filters: &SubscriptionFilters) -> Result<()> {
    FilterTerms::parse(filters).map(|_| ())
}

/// Compile `filters` into the predicate for one content family.
///
/// Only active items match.
pub fn compile(content_type: ContentType, filters: &SubscriptionFilters) -> Result<Predicate> {
    let terms = FilterTerms::parse(filters)?;
    Ok(compile_terms(content_type, &terms))
}

pub fn compile_terms(content_type: ContentType, terms: &FilterTerms) -> Predicate {
    let mut families = vec![Predicate::active()];

    if !terms.keywords.is_empty() {
        let fields = content_type.searchable_fields();
        families.push(Predicate::or(
            terms
                .keywords
                .iter()
                .flat_map(|term| {
                    fields.iter().map(move |field| Predicate::TextContains {
                        field: *field,
                        term: term.clone(),
                    })
                })
                .collect(),
        ));
    }

    if !terms.tags.is_empty() {
        families.push(Predicate::or(
            terms.tags.iter().cloned().map(Predicate::TagContains).collect(),
        ));
    }

    if !terms.authors.is_empty() {
        families.push(Predicate::or(
            terms
                .authors
                .iter()
                .cloned()
                .map(Predicate::AuthorContains)
                .collect(),
        ));
    }

    Predicate::and(families)
}

/// `None`, `""` and `"null"` are absent; anything else must be a JSON string array
fn parse_list(field: &str, raw: Option<&str>) -> Result<Vec<String>> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Vec::new()),
        Some(raw) => raw,
    };

    let values: Option<Vec<String>> = serde_json::from_str(raw)
        .map_err(|e| EngineError::InvalidFilter(format!("{}: {}", field, e)))?;

    Ok(values
        .unwrap_or_default()
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect())
}

/// Whitespace-split every keyword; duplicates (case-insensitive) dropped
fn split_terms(keywords: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .iter()
        .flat_map(|k| k.split_whitespace())
        .filter(|term| seen.insert(term.to_lowercase()))
        .map(str::to_string)
        .collect()
}
