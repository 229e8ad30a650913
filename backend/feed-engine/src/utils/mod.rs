// Pagination and ordering helpers shared by the composers

use crate::models::{ContentItem, ContentKey};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;

/// Equal per-family share of `count`, rounded up
pub fn per_type_share(count: usize, types: usize) -> usize {
    if types == 0 {
        return 0;
    }
    count.div_ceil(types)
}

/// Keep the first occurrence of each `(type, id)` pair, preserving order
pub fn dedupe_by_key(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut seen: HashSet<ContentKey> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.key()))
        .collect()
}

/// Plain `[skip, skip + take)` slice
pub fn paginate<T>(items: Vec<T>, skip: usize, take: usize) -> Vec<T> {
    items.into_iter().skip(skip).take(take).collect()
}

/// How the composed window is permuted before slicing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleMode {
    /// Thread-local RNG, a fresh order on every request
    Random,
    /// Reproducible order for tests and debugging
    Seeded(u64),
    /// Leave bucket order untouched
    Disabled,
}

impl ShuffleMode {
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map(ShuffleMode::Seeded).unwrap_or(ShuffleMode::Random)
    }

    pub fn shuffle<T>(&self, items: &mut [T]) {
        match self {
            ShuffleMode::Random => items.shuffle(&mut rand::thread_rng()),
            ShuffleMode::Seeded(seed) => items.shuffle(&mut StdRng::seed_from_u64(*seed)),
            ShuffleMode::Disabled => {}
        }
    }
}

/// Per-source window for an outer page spread over several sources.
///
/// Outer page `skip / take` maps to the same page index inside each source,
/// each source contributing `ceil(take / sources)` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerWindow {
    pub skip: usize,
    pub take: usize,
}

impl InnerWindow {
    pub fn for_page(skip: usize, take: usize, sources: usize) -> Self {
        if take == 0 || sources == 0 {
            return Self { skip: 0, take: 0 };
        }
        let inner_take = per_type_share(take, sources);
        let page_index = skip / take;
        Self {
            skip: page_index * inner_take,
            take: inner_take,
        }
    }

    pub fn end(&self) -> usize {
        self.skip.saturating_add(self.take)
    }
}
