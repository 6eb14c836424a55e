use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::models::{Interaction, InteractionType, Item};

use super::features::{self, ItemSignals};
use super::profiles::UserProfile;

/// Interaction types eligible as positive training examples.
pub const POSITIVE_INTERACTION_TYPES: [InteractionType; 4] = [
    InteractionType::View,
    InteractionType::Like,
    InteractionType::Purchase,
    InteractionType::Bookmark,
];

/// Dwell floor for a positive example.
const MIN_POSITIVE_DWELL: i64 = 10;

/// Dwell above which a plain view counts as a full-quality positive.
const HIGH_QUALITY_DWELL: i64 = 60;

const MAX_POSITIVE_EXAMPLES: usize = 10_000;
const MAX_NEGATIVE_EXAMPLES: usize = 5_000;

/// One labeled row for the ranking model. Labels are 1.0 or 0.7 for real
/// interactions; 0.0 only for synthetic negatives.
pub struct TrainingExample {
    pub features: Vec<f64>,
    pub label: f64,
}

/// Label for a qualifying positive interaction: explicit-intent types score
/// 1.0, as do long views; shorter views score 0.7.
pub fn positive_label(interaction: &Interaction) -> f64 {
    match interaction.interaction_type {
        InteractionType::Like | InteractionType::Purchase | InteractionType::Bookmark => 1.0,
        _ if interaction.dwell_seconds > HIGH_QUALITY_DWELL => 1.0,
        _ => 0.7,
    }
}

fn is_positive(interaction: &Interaction) -> bool {
    POSITIVE_INTERACTION_TYPES.contains(&interaction.interaction_type)
        && interaction.dwell_seconds > MIN_POSITIVE_DWELL
}

/// Assembles the labeled training set.
///
/// Positives are qualifying interactions joined with their item's metadata,
/// capped at 10 000. Negatives are uniformly sampled (user, item) pairs with
/// zero dwell and placeholder item signals; a sampled pair may coincide with
/// a real interaction, which is accepted label noise rather than corrected.
/// Rows whose feature extraction fails are dropped, never fatal.
pub fn build_training_set(
    interactions: &[Interaction],
    items: &HashMap<String, Item>,
    profiles: &HashMap<String, UserProfile>,
    user_ids: &[String],
    item_ids: &[String],
    now: DateTime<Utc>,
    rng: &mut StdRng,
) -> Vec<TrainingExample> {
    let zero_profile = UserProfile::default();
    let mut examples = Vec::new();

    let mut positive_count = 0;
    for interaction in interactions.iter().filter(|i| is_positive(i)) {
        if positive_count >= MAX_POSITIVE_EXAMPLES {
            break;
        }
        // Positives require real item metadata; skip dangling item ids.
        let Some(item) = items.get(&interaction.item_id) else {
            continue;
        };
        let profile = profiles.get(&interaction.user_id).unwrap_or(&zero_profile);
        let signals = ItemSignals::from_item(item);
        if let Some(features) =
            features::extract(profile, &signals, interaction.dwell_seconds, now)
        {
            examples.push(TrainingExample { features, label: positive_label(interaction) });
            positive_count += 1;
        }
    }

    if user_ids.is_empty() || item_ids.is_empty() {
        return examples;
    }

    let negative_count = positive_count.min(MAX_NEGATIVE_EXAMPLES);
    let placeholder = ItemSignals::placeholder(now);
    for _ in 0..negative_count {
        let (Some(user_id), Some(_item_id)) = (user_ids.choose(rng), item_ids.choose(rng)) else {
            break;
        };
        // The sampled item id only picks the pair; negatives carry
        // placeholder item signals, matching the synthetic zero-engagement
        // construction.
        let profile = profiles.get(user_id).unwrap_or(&zero_profile);
        if let Some(features) = features::extract(profile, &placeholder, 0, now) {
            examples.push(TrainingExample { features, label: 0.0 });
        }
    }

    examples
}
