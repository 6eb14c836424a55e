use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

/// Kind of content an item carries.
///
/// Declaration order is part of the trained-model contract: the ranking
/// model's one-hot feature block is indexed by [`ContentType::index`], so
/// reordering variants invalidates any previously fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Movie,
    Article,
    Product,
    Music,
    Podcast,
    Course,
    Game,
}

impl ContentType {
    /// All variants in feature-layout order.
    pub const ALL: [ContentType; 8] = [
        ContentType::Video,
        ContentType::Movie,
        ContentType::Article,
        ContentType::Product,
        ContentType::Music,
        ContentType::Podcast,
        ContentType::Course,
        ContentType::Game,
    ];

    /// Number of variants (width of the one-hot feature block).
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this variant in the one-hot feature block.
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|&ct| ct == self).unwrap_or(0)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Video => "video",
            ContentType::Movie => "movie",
            ContentType::Article => "article",
            ContentType::Product => "product",
            ContentType::Music => "music",
            ContentType::Podcast => "podcast",
            ContentType::Course => "course",
            ContentType::Game => "game",
        }
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|ct| ct.as_str() == s)
            .ok_or_else(|| format!("invalid content type: {s}"))
    }
}

/// Kind of user interaction recorded in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    View,
    Like,
    Dislike,
    Share,
    Click,
    Purchase,
    Bookmark,
    Comment,
}

impl InteractionType {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::Like => "like",
            InteractionType::Dislike => "dislike",
            InteractionType::Share => "share",
            InteractionType::Click => "click",
            InteractionType::Purchase => "purchase",
            InteractionType::Bookmark => "bookmark",
            InteractionType::Comment => "comment",
        }
    }
}

impl Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(InteractionType::View),
            "like" => Ok(InteractionType::Like),
            "dislike" => Ok(InteractionType::Dislike),
            "share" => Ok(InteractionType::Share),
            "click" => Ok(InteractionType::Click),
            "purchase" => Ok(InteractionType::Purchase),
            "bookmark" => Ok(InteractionType::Bookmark),
            "comment" => Ok(InteractionType::Comment),
            _ => Err(format!("invalid interaction type: {s}")),
        }
    }
}

/// A piece of recommendable content. Owned by the store; the engine only
/// reads snapshots of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub title: String,
    pub content_type: ContentType,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail_url: String,
    pub publish_ts: DateTime<Utc>,
    /// Average user rating, 0.0-5.0.
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub view_count: i64,
}

impl Item {
    /// Concatenated text fields used by the item text index.
    pub fn text_features(&self) -> String {
        let mut text = format!("{} {} {}", self.title, self.description, self.category);
        if !self.tags.is_empty() {
            text.push(' ');
            text.push_str(&self.tags.join(" "));
        }
        text
    }
}

/// A single recorded user-item interaction. Immutable once stored; the
/// engine treats the full set as an append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub interaction_id: String,
    pub user_id: String,
    pub item_id: String,
    pub interaction_type: InteractionType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub dwell_seconds: i64,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl Interaction {
    pub fn new(
        user_id: String,
        item_id: String,
        interaction_type: InteractionType,
        timestamp: DateTime<Utc>,
        dwell_seconds: i64,
        rating: Option<f64>,
        context: serde_json::Value,
    ) -> Self {
        Self {
            interaction_id: Uuid::new_v4().to_string(),
            user_id,
            item_id,
            interaction_type,
            timestamp,
            dwell_seconds,
            rating,
            context,
        }
    }

    /// Validates ranges that the ingestion boundary must reject.
    pub fn validate(&self) -> Result<(), String> {
        if self.dwell_seconds < 0 {
            return Err("dwell_seconds must be non-negative".to_string());
        }
        if let Some(r) = self.rating {
            if !(0.0..=5.0).contains(&r) {
                return Err("rating must be within 0.0-5.0".to_string());
            }
        }
        Ok(())
    }
}

/// One ranked entry in a recommendation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedItem {
    pub item_id: String,
    pub title: String,
    pub content_type: ContentType,
    pub category: String,
    pub description: String,
    pub thumbnail_url: String,
    pub rating: f64,
    pub view_count: i64,
    /// Learned-model score; 0.0 on the popularity fallback path.
    pub ml_score: f64,
    pub tags: Vec<String>,
}

impl RecommendedItem {
    /// Builds a response entry from item metadata and a model score.
    pub fn from_item(item: &Item, ml_score: f64) -> Self {
        Self {
            item_id: item.item_id.clone(),
            title: item.title.clone(),
            content_type: item.content_type,
            category: item.category.clone(),
            description: item.description.clone(),
            thumbnail_url: item.thumbnail_url.clone(),
            rating: item.rating,
            view_count: item.view_count,
            ml_score,
            tags: item.tags.clone(),
        }
    }
}
