pub mod profile_builder;
pub mod selector;

pub use profile_builder::{ProfileBuilder, UserSignals};
pub use selector::PersonalizationSelector;

use crate::models::{ContentItem, DegradeReason};

/// Result of personalized selection. Degradation is a value, not an error,
/// so callers can observe how often it happens.
#[derive(Debug, Clone)]
pub enum PersonalizedOutcome {
    Personalized(Vec<ContentItem>),
    /// Latest content served in place of personalized results
    Degraded {
        items: Vec<ContentItem>,
        reason: DegradeReason,
    },
}

impl PersonalizedOutcome {
    pub fn items(&self) -> &[ContentItem] {
        match self {
            PersonalizedOutcome::Personalized(items) => items,
            PersonalizedOutcome::Degraded { items, .. } => items,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PersonalizedOutcome::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&DegradeReason> {
        match self {
            PersonalizedOutcome::Personalized(_) => None,
            PersonalizedOutcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn into_parts(self) -> (Vec<ContentItem>, Option<DegradeReason>) {
        match self {
            PersonalizedOutcome::Personalized(items) => (items, None),
            PersonalizedOutcome::Degraded { items, reason } => (items, Some(reason)),
        }
    }
}
