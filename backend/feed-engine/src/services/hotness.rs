// ============================================
// Hotness Scorer
// ============================================
//
// score = Σ(weight_i × counter_i) × decay(published_at, half_life)
//
// Weight tables load from `FEED_ENGINE_WEIGHTS_PATH` when set. Equal scores
// keep the order the store returned them in; no secondary key is applied.

use super::decay::decay_factor;
use crate::error::{EngineError, Result};
use crate::models::{ContentItem, ContentType, EngagementCounters};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use tracing::debug;

/// Counter weights and half-life for one content family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeWeights {
    pub view: f64,
    pub like: f64,
    pub favorite: f64,
    pub comment: f64,
    pub share: f64,
    pub play: f64,
    pub citation: f64,
    pub stars: f64,
    pub forks: f64,
    pub downloads: f64,
    pub half_life_days: f64,
}

impl Default for TypeWeights {
    fn default() -> Self {
        Self {
            view: 0.0,
            like: 0.0,
            favorite: 0.0,
            comment: 0.0,
            share: 0.0,
            play: 0.0,
            citation: 0.0,
            stars: 0.0,
            forks: 0.0,
            downloads: 0.0,
            half_life_days: 30.0,
        }
    }
}

impl TypeWeights {
    /// Weighted counter sum, before decay
    pub fn engagement(&self, c: &EngagementCounters) -> f64 {
        self.view * c.view_count as f64
            + self.like * c.like_count as f64
            + self.favorite * c.favorite_count as f64
            + self.comment * c.comment_count as f64
            + self.share * c.share_count as f64
            + self.play * c.play_count as f64
            + self.citation * c.citation_count as f64
            + self.stars * c.stars_count as f64
            + self.forks * c.forks_count as f64
            + self.downloads * c.downloads as f64
    }

    fn values(&self) -> [(&'static str, f64); 10] {
        [
            ("view", self.view),
            ("like", self.like),
            ("favorite", self.favorite),
            ("comment", self.comment),
            ("share", self.share),
            ("play", self.play),
            ("citation", self.citation),
            ("stars", self.stars),
            ("forks", self.forks),
            ("downloads", self.downloads),
        ]
    }
}

/// Weight tables for every family plus the cross-family fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotnessWeights {
    pub paper: TypeWeights,
    pub video: TypeWeights,
    pub repo: TypeWeights,
    pub model: TypeWeights,
    pub job: TypeWeights,
    pub post: TypeWeights,
    pub news: TypeWeights,
    /// Used when heterogeneous families share one ranked list
    pub generic: TypeWeights,
}

impl Default for HotnessWeights {
    fn default() -> Self {
        Self {
            paper: TypeWeights {
                citation: 0.4,
                favorite: 0.3,
                like: 0.2,
                view: 0.1,
                half_life_days: 30.0,
                ..TypeWeights::default()
            },
            video: TypeWeights {
                play: 0.5,
                like: 0.3,
                favorite: 0.15,
                comment: 0.05,
                half_life_days: 14.0,
                ..TypeWeights::default()
            },
            repo: TypeWeights {
                stars: 0.5,
                forks: 0.3,
                favorite: 0.1,
                view: 0.1,
                half_life_days: 60.0,
                ..TypeWeights::default()
            },
            model: TypeWeights {
                downloads: 0.5,
                like: 0.3,
                favorite: 0.1,
                view: 0.1,
                half_life_days: 45.0,
                ..TypeWeights::default()
            },
            job: TypeWeights {
                view: 0.6,
                favorite: 0.4,
                half_life_days: 7.0,
                ..TypeWeights::default()
            },
            post: TypeWeights {
                like: 0.4,
                comment: 0.3,
                favorite: 0.2,
                view: 0.1,
                half_life_days: 7.0,
                ..TypeWeights::default()
            },
            news: TypeWeights {
                view: 0.5,
                like: 0.3,
                favorite: 0.2,
                half_life_days: 7.0,
                ..TypeWeights::default()
            },
            generic: TypeWeights {
                view: 0.1,
                like: 0.3,
                favorite: 0.3,
                comment: 0.2,
                share: 0.2,
                stars: 0.05,
                downloads: 0.01,
                citation: 0.1,
                half_life_days: 30.0,
                ..TypeWeights::default()
            },
        }
    }
}

impl HotnessWeights {
    pub fn for_type(&self, content_type: ContentType) -> &TypeWeights {
        match content_type {
            ContentType::Paper => &self.paper,
            ContentType::Video => &self.video,
            ContentType::Repo => &self.repo,
            ContentType::Model => &self.model,
            ContentType::Job => &self.job,
            ContentType::Post => &self.post,
            ContentType::News => &self.news,
        }
    }

    /// Load weight overrides from a JSON file; families left out keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let weights: HotnessWeights = serde_json::from_str(&raw).map_err(|e| {
            EngineError::Config(format!("invalid weights in {}: {}", path.display(), e))
        })?;
        weights.validate()?;
        Ok(weights)
    }

    /// Negative weights or non-positive half-lives would break score monotonicity
    pub fn validate(&self) -> Result<()> {
        let tables = [
            ("paper", &self.paper),
            ("video", &self.video),
            ("repo", &self.repo),
            ("model", &self.model),
            ("job", &self.job),
            ("post", &self.post),
            ("news", &self.news),
            ("generic", &self.generic),
        ];
        for (family, table) in tables {
            if !(table.half_life_days > 0.0) {
                return Err(EngineError::Config(format!(
                    "{}.half_life_days must be positive",
                    family
                )));
            }
            for (counter, weight) in table.values() {
                if !(weight >= 0.0) {
                    return Err(EngineError::Config(format!(
                        "{}.{} weight must be non-negative",
                        family, counter
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Per-family hotness scoring
#[derive(Debug, Clone, Default)]
pub struct HotnessScorer {
    weights: HotnessWeights,
}

impl HotnessScorer {
    pub fn new(weights: HotnessWeights) -> Self {
        Self { weights }
    }

    /// Hotness of an item using its own family's table
    pub fn score(&self, item: &ContentItem, now: DateTime<Utc>) -> f64 {
        let table = self.weights.for_type(item.content_type);
        Self::apply(table, item, now)
    }

    /// Hotness on the common cross-family scale
    pub fn score_generic(&self, item: &ContentItem, now: DateTime<Utc>) -> f64 {
        Self::apply(&self.weights.generic, item, now)
    }

    fn apply(table: &TypeWeights, item: &ContentItem, now: DateTime<Utc>) -> f64 {
        let engagement = table.engagement(&item.counters);
        let decay = decay_factor(item.published_at, table.half_life_days, now);
        (engagement * decay).max(0.0)
    }

    /// Attach family scores and sort descending. Ties keep their input order.
    pub fn rank(&self, items: Vec<ContentItem>, now: DateTime<Utc>) -> Vec<ContentItem> {
        self.rank_with(items, |item| self.score(item, now))
    }

    /// Attach generic scores and sort descending
    pub fn rank_generic(&self, items: Vec<ContentItem>, now: DateTime<Utc>) -> Vec<ContentItem> {
        self.rank_with(items, |item| self.score_generic(item, now))
    }

    fn rank_with<F>(&self, items: Vec<ContentItem>, score: F) -> Vec<ContentItem>
    where
        F: Fn(&ContentItem) -> f64,
    {
        let mut scored: Vec<ContentItem> = items
            .into_iter()
            .map(|mut item| {
                item.score = Some(score(&item));
                item
            })
            .collect();

        sort_by_score(&mut scored);
        debug!(count = scored.len(), "Hotness ranking applied");
        scored
    }
}

/// Stable descending sort on the attached score
pub fn sort_by_score(items: &mut [ContentItem]) {
    items.sort_by(|a, b| {
        b.score
            .unwrap_or(0.0)
            .partial_cmp(&a.score.unwrap_or(0.0))
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn paper(id: &str, age_days: i64, citations: u64, now: DateTime<Utc>) -> ContentItem {
        let mut item = ContentItem::new(ContentType::Paper, id, id);
        item.published_at = Some(now - Duration::days(age_days));
        item.counters.citation_count = citations;
        item
    }

    #[test]
    fn test_paper_example_score() {
        let now = Utc::now();
        let scorer = HotnessScorer::default();
        let score = scorer.score(&paper("p1", 30, 10, now), now);
        assert!((score - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_each_family_uses_its_dominant_counter() {
        let now = Utc::now();
        let scorer = HotnessScorer::default();

        let mut video = ContentItem::new(ContentType::Video, "v1", "v");
        video.published_at = Some(now);
        video.counters.play_count = 100;
        assert!((scorer.score(&video, now) - 50.0).abs() < 1e-9);

        let mut repo = ContentItem::new(ContentType::Repo, "r1", "r");
        repo.published_at = Some(now);
        repo.counters.stars_count = 100;
        assert!((scorer.score(&repo, now) - 50.0).abs() < 1e-9);

        let mut job = ContentItem::new(ContentType::Job, "j1", "j");
        job.published_at = Some(now);
        job.counters.view_count = 10;
        job.counters.favorite_count = 5;
        // Not in the job table
        job.counters.stars_count = 1000;
        assert!((scorer.score(&job, now) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_strictly_decreases_with_age() {
        let now = Utc::now();
        let scorer = HotnessScorer::default();
        let fresh = scorer.score(&paper("a", 1, 50, now), now);
        let week = scorer.score(&paper("b", 7, 50, now), now);
        let month = scorer.score(&paper("c", 30, 50, now), now);
        assert!(fresh > week);
        assert!(week > month);
        assert!(month > 0.0);
    }

    #[test]
    fn test_generic_scale_counts_stars_and_downloads() {
        let now = Utc::now();
        let scorer = HotnessScorer::default();

        let mut model = ContentItem::new(ContentType::Model, "m1", "m");
        model.published_at = Some(now);
        model.counters.downloads = 1000;
        model.counters.stars_count = 100;
        assert!((scorer.score_generic(&model, now) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let now = Utc::now();
        let scorer = HotnessScorer::default();
        let items = vec![
            paper("first", 5, 10, now),
            paper("hot", 5, 100, now),
            paper("second", 5, 10, now),
        ];
        let ranked = scorer.rank(items, now);
        let ids: Vec<&str> = ranked.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["hot", "first", "second"]);
        assert!(ranked.iter().all(|i| i.score.is_some()));
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut weights = HotnessWeights::default();
        weights.post.like = -1.0;
        assert!(weights.validate().is_err());

        let mut weights = HotnessWeights::default();
        weights.repo.half_life_days = 0.0;
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_partial_json_override_keeps_defaults() {
        let weights: HotnessWeights =
            serde_json::from_str(r#"{"job": {"view": 1.0, "half_life_days": 3.0}}"#).unwrap();
        assert_eq!(weights.job.view, 1.0);
        assert_eq!(weights.job.favorite, 0.0);
        assert_eq!(weights.paper, HotnessWeights::default().paper);
    }
}
