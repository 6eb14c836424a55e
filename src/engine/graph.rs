use std::collections::HashMap;

use crate::models::{Interaction, InteractionType};

/// Interaction types that contribute co-visitation evidence.
pub const GRAPH_INTERACTION_TYPES: [InteractionType; 3] = [
    InteractionType::View,
    InteractionType::Click,
    InteractionType::Like,
];

/// Gap between consecutive interactions that closes a session, in seconds.
const SESSION_GAP_SECONDS: i64 = 3600;

/// How many subsequent session items each item pairs with.
const LOOK_AHEAD: usize = 5;

/// Undirected weighted adjacency of items interacted with close together in
/// time. Symmetric by construction: every edge update touches both
/// directions. Rebuilt wholesale on each training cycle.
#[derive(Debug, Clone, Default)]
pub struct CoVisitationGraph {
    edges: HashMap<String, HashMap<String, u32>>,
}

impl CoVisitationGraph {
    /// Builds the graph from the full interaction log.
    ///
    /// Interactions are grouped by user and ordered by timestamp; a new
    /// session starts whenever the gap between consecutive interactions
    /// exceeds one hour. Within each session of at least two items, every
    /// ordered pair within the look-ahead window adds weight 1 to both
    /// directions of the edge. Identical input yields an identical graph.
    pub fn build(interactions: &[Interaction]) -> Self {
        let mut by_user: HashMap<&str, Vec<&Interaction>> = HashMap::new();
        for interaction in interactions {
            if GRAPH_INTERACTION_TYPES.contains(&interaction.interaction_type) {
                by_user
                    .entry(interaction.user_id.as_str())
                    .or_default()
                    .push(interaction);
            }
        }

        let mut graph = Self::default();
        for ordered in by_user.values_mut() {
            ordered.sort_by_key(|i| i.timestamp);

            let mut session: Vec<&str> = Vec::new();
            let mut last_ts: Option<chrono::DateTime<chrono::Utc>> = None;
            for interaction in ordered.iter() {
                if let Some(last) = last_ts {
                    let gap = (interaction.timestamp - last).num_seconds();
                    if gap > SESSION_GAP_SECONDS {
                        graph.add_session(&session);
                        session.clear();
                    }
                }
                session.push(interaction.item_id.as_str());
                last_ts = Some(interaction.timestamp);
            }
            graph.add_session(&session);
        }
        graph
    }

    fn add_session(&mut self, session: &[&str]) {
        if session.len() < 2 {
            return;
        }
        for (i, &item_a) in session.iter().enumerate() {
            for &item_b in session.iter().skip(i + 1).take(LOOK_AHEAD) {
                // Repeated views of the same item within a window are not
                // self-edges.
                if item_a == item_b {
                    continue;
                }
                self.bump(item_a, item_b);
                self.bump(item_b, item_a);
            }
        }
    }

    fn bump(&mut self, from: &str, to: &str) {
        *self
            .edges
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_insert(0) += 1;
    }

    /// Edge weight between two items; 0 when they never co-occurred.
    pub fn weight(&self, a: &str, b: &str) -> u32 {
        self.edges
            .get(a)
            .and_then(|neighbors| neighbors.get(b))
            .copied()
            .unwrap_or(0)
    }

    /// Up to `limit` co-items of `item_id`, highest weight first, ties
    /// broken by item id so the order is stable across rebuilds.
    pub fn neighbors(&self, item_id: &str, limit: usize) -> Vec<String> {
        let Some(adjacent) = self.edges.get(item_id) else {
            return Vec::new();
        };
        let mut ranked: Vec<(&String, u32)> =
            adjacent.iter().map(|(id, &w)| (id, w)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.into_iter().take(limit).map(|(id, _)| id.clone()).collect()
    }

    /// Number of items with at least one edge.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
