// ============================================
// Time Decay
// ============================================
//
// Half-life decay shared by every hotness scorer:
//
//   decay = 2^(-days_since / half_life_days), floored at 0.1

use chrono::{DateTime, Utc};

/// Lowest factor an item can decay to
pub const DECAY_FLOOR: f64 = 0.1;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Decay factor in `[0.1, 1.0]` for an item published at `published_at`.
///
/// Missing timestamps get the floor; timestamps at or after `now` get `1.0`.
pub fn decay_factor(
    published_at: Option<DateTime<Utc>>,
    half_life_days: f64,
    now: DateTime<Utc>,
) -> f64 {
    let Some(published_at) = published_at else {
        return DECAY_FLOOR;
    };

    let elapsed_ms = (now - published_at).num_milliseconds();
    if elapsed_ms <= 0 {
        return 1.0;
    }
    if !(half_life_days > 0.0) {
        return DECAY_FLOOR;
    }

    let days_since = elapsed_ms as f64 / MILLIS_PER_DAY;
    2f64.powf(-days_since / half_life_days).clamp(DECAY_FLOOR, 1.0)
}
