use chrono::{DateTime, Utc};

use crate::models::{ContentType, Item};

use super::profiles::UserProfile;

/// Fixed feature-vector width: eight scalars plus the content-type one-hot
/// block.
pub const FEATURE_DIM: usize = 8 + ContentType::COUNT;

/// Item-side inputs to feature extraction.
///
/// Inference-time lookups and synthetic negatives both funnel through this
/// shape, so a placeholder item (zero rating, zero views, published "now")
/// is expressible without faking a catalog entry.
#[derive(Debug, Clone)]
pub struct ItemSignals {
    pub category: String,
    pub content_type: ContentType,
    pub rating: f64,
    pub view_count: i64,
    pub publish_ts: DateTime<Utc>,
}

impl ItemSignals {
    pub fn from_item(item: &Item) -> Self {
        Self {
            category: item.category.clone(),
            content_type: item.content_type,
            rating: item.rating,
            view_count: item.view_count,
            publish_ts: item.publish_ts,
        }
    }

    /// Placeholder used for synthetic negative examples: an unknown-category
    /// video with no engagement, published at `now`.
    pub fn placeholder(now: DateTime<Utc>) -> Self {
        Self {
            category: "unknown".to_string(),
            content_type: ContentType::Video,
            rating: 0.0,
            view_count: 0,
            publish_ts: now,
        }
    }
}

/// Builds the fixed-length feature vector for one (user, item, dwell) triple.
///
/// Layout (order is part of the trained-model contract):
/// `[interaction_count, avg_dwell, avg_rating, item_rating, log1p(views),
/// log1p(max(hours_since_publish, 0)), category_affinity, dwell_seconds,
/// one-hot(content_type)...]`
///
/// Absent inputs impute to 0; `None` is reserved for unrecoverable input
/// corruption, and callers must exclude (not fail on) such rows.
pub fn extract(
    profile: &UserProfile,
    item: &ItemSignals,
    dwell_seconds: i64,
    now: DateTime<Utc>,
) -> Option<Vec<f64>> {
    let hours_since_publish = (now - item.publish_ts).num_seconds() as f64 / 3600.0;

    let mut features = Vec::with_capacity(FEATURE_DIM);
    features.push(profile.interaction_count as f64);
    features.push(profile.avg_dwell);
    features.push(profile.avg_rating);
    features.push(item.rating);
    features.push((item.view_count.max(0) as f64).ln_1p());
    features.push(hours_since_publish.max(0.0).ln_1p());
    features.push(profile.category_affinity(&item.category));
    features.push(dwell_seconds as f64);

    let mut one_hot = [0.0; ContentType::COUNT];
    one_hot[item.content_type.index()] = 1.0;
    features.extend_from_slice(&one_hot);

    debug_assert_eq!(features.len(), FEATURE_DIM);
    if features.iter().any(|f| !f.is_finite()) {
        return None;
    }
    Some(features)
}
