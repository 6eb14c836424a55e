use std::collections::HashMap;

use crate::models::{ContentType, Interaction, Item};

/// Per-user summary of historical interactions, joined with item metadata.
///
/// Derived and ephemeral: rebuilt on every training cycle, never persisted.
/// A user with no qualifying interactions is represented by
/// [`UserProfile::default`] (all counts and averages at zero).
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    /// Occurrence count of each interacted item's category.
    pub categories: HashMap<String, u32>,
    /// Occurrence count of each interacted item's content type.
    pub content_types: HashMap<ContentType, u32>,
    /// Flattened occurrence count of interacted items' tags.
    pub tags: HashMap<String, u32>,
    /// Mean dwell over interactions with dwell > 0.
    pub avg_dwell: f64,
    /// Mean rating over interactions carrying a rating.
    pub avg_rating: f64,
    pub interaction_count: u64,
}

impl UserProfile {
    /// Share of this user's interactions that touched `category`, in [0, 1].
    pub fn category_affinity(&self, category: &str) -> f64 {
        let count = self.categories.get(category).copied().unwrap_or(0);
        count as f64 / (self.interaction_count.max(1)) as f64
    }
}

/// Aggregates the full interaction log into one profile per user.
///
/// Interactions referencing items absent from the catalog snapshot still
/// count toward `interaction_count`, dwell, and rating, but contribute no
/// category/content-type/tag evidence.
pub fn build_profiles(
    interactions: &[Interaction],
    items: &HashMap<String, Item>,
) -> HashMap<String, UserProfile> {
    struct Accumulator {
        profile: UserProfile,
        dwell_sum: f64,
        dwell_count: u64,
        rating_sum: f64,
        rating_count: u64,
    }

    let mut by_user: HashMap<String, Accumulator> = HashMap::new();
    for interaction in interactions {
        let acc = by_user
            .entry(interaction.user_id.clone())
            .or_insert_with(|| Accumulator {
                profile: UserProfile::default(),
                dwell_sum: 0.0,
                dwell_count: 0,
                rating_sum: 0.0,
                rating_count: 0,
            });

        acc.profile.interaction_count += 1;
        if interaction.dwell_seconds > 0 {
            acc.dwell_sum += interaction.dwell_seconds as f64;
            acc.dwell_count += 1;
        }
        if let Some(rating) = interaction.rating {
            acc.rating_sum += rating;
            acc.rating_count += 1;
        }

        if let Some(item) = items.get(&interaction.item_id) {
            *acc.profile.categories.entry(item.category.clone()).or_insert(0) += 1;
            *acc.profile.content_types.entry(item.content_type).or_insert(0) += 1;
            for tag in &item.tags {
                *acc.profile.tags.entry(tag.clone()).or_insert(0) += 1;
            }
        }
    }

    by_user
        .into_iter()
        .map(|(user_id, acc)| {
            let mut profile = acc.profile;
            if acc.dwell_count > 0 {
                profile.avg_dwell = acc.dwell_sum / acc.dwell_count as f64;
            }
            if acc.rating_count > 0 {
                profile.avg_rating = acc.rating_sum / acc.rating_count as f64;
            }
            (user_id, profile)
        })
        .collect()
}
