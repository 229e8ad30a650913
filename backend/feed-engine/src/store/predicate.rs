use crate::models::{ContentItem, ContentStatus, TextField};
use chrono::{DateTime, Utc};

/// Filter language understood by every content store adapter.
///
/// Text, tag and author predicates are case-insensitive substring matches.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches everything
    All,
    And(Vec<Predicate>),
    /// An empty `Or` matches nothing
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    TextContains { field: TextField, term: String },
    TagContains(String),
    AuthorContains(String),
    IdIn(Vec<String>),
    /// Published (or, lacking that, updated) at or after the instant
    PublishedSince(DateTime<Utc>),
    StatusIs(ContentStatus),
}

impl Predicate {
    /// Conjunction that drops `All` terms and collapses single-term lists
    pub fn and(terms: Vec<Predicate>) -> Predicate {
        let mut terms: Vec<Predicate> = terms
            .into_iter()
            .filter(|p| !matches!(p, Predicate::All))
            .collect();
        match terms.len() {
            0 => Predicate::All,
            1 => terms.remove(0),
            _ => Predicate::And(terms),
        }
    }

    pub fn or(mut terms: Vec<Predicate>) -> Predicate {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Predicate::Or(terms)
        }
    }

    pub fn negate(inner: Predicate) -> Predicate {
        Predicate::Not(Box::new(inner))
    }

    /// Excludes the given ids; a no-op for an empty list
    pub fn exclude_ids(ids: Vec<String>) -> Predicate {
        if ids.is_empty() {
            Predicate::All
        } else {
            Predicate::negate(Predicate::IdIn(ids))
        }
    }

    pub fn active() -> Predicate {
        Predicate::StatusIs(ContentStatus::Active)
    }

    /// Reference semantics for adapters that evaluate filters in memory
    pub fn matches(&self, item: &ContentItem) -> bool {
        match self {
            Predicate::All => true,
            Predicate::And(terms) => terms.iter().all(|p| p.matches(item)),
            Predicate::Or(terms) => terms.iter().any(|p| p.matches(item)),
            Predicate::Not(inner) => !inner.matches(item),
            Predicate::TextContains { field, term } => contains_ci(item.text(*field), term),
            Predicate::TagContains(tag) => item.tags.iter().any(|t| contains_ci(t, tag)),
            Predicate::AuthorContains(author) => {
                item.authors.iter().any(|a| contains_ci(a, author))
            }
            Predicate::IdIn(ids) => ids.iter().any(|id| id == &item.id),
            Predicate::PublishedSince(since) => item
                .published_at
                .or(item.updated_at)
                .map(|ts| ts >= *since)
                .unwrap_or(false),
            Predicate::StatusIs(status) => item.status == *status,
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
