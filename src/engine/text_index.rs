use std::collections::HashMap;

use crate::models::Item;

/// Bounded vocabulary size for the item text index.
const MAX_VOCABULARY: usize = 1000;

/// Common English words excluded from the vocabulary.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "he",
    "her", "his", "if", "in", "into", "is", "it", "its", "more", "no", "not", "of", "on", "or",
    "our", "she", "so", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "to", "was", "we", "were", "what", "when", "which", "who", "will", "with", "you",
    "your",
];

/// Sparse TF-IDF representation of every item's text, rebuilt wholesale on
/// each training cycle.
///
/// Vectors are L2-normalized at fit time so pairwise cosine similarity is a
/// plain sparse dot product.
#[derive(Debug, Clone, Default)]
pub struct TextIndex {
    /// item id -> sorted sparse vector of (term index, weight).
    vectors: HashMap<String, Vec<(u32, f64)>>,
    /// Item ids in sorted order, for deterministic scans.
    item_ids: Vec<String>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() > 1 && !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

impl TextIndex {
    /// Fits the vectorizer over the whole item corpus and stores one vector
    /// per item.
    ///
    /// Vocabulary is capped at [`MAX_VOCABULARY`] terms, selected by document
    /// frequency with a lexicographic tie-break so refitting the same corpus
    /// yields the same index.
    pub fn fit(items: &[Item]) -> Self {
        let documents: Vec<(String, Vec<String>)> = items
            .iter()
            .map(|item| (item.item_id.clone(), tokenize(&item.text_features())))
            .collect();

        // Document frequency per term.
        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        for (_, tokens) in &documents {
            let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(&str, usize)> =
            document_frequency.iter().map(|(&t, &df)| (t, df)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(MAX_VOCABULARY);

        let n_docs = documents.len() as f64;
        // Smoothed idf, as if one extra document contained every term.
        let idfs: Vec<f64> = ranked
            .iter()
            .map(|&(_, df)| ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0)
            .collect();
        let vocabulary: HashMap<&str, u32> = ranked
            .iter()
            .enumerate()
            .map(|(idx, &(term, _))| (term, idx as u32))
            .collect();

        let mut vectors = HashMap::with_capacity(documents.len());
        let mut item_ids = Vec::with_capacity(documents.len());
        for (item_id, tokens) in &documents {
            let mut term_counts: HashMap<u32, f64> = HashMap::new();
            for token in tokens {
                if let Some(&idx) = vocabulary.get(token.as_str()) {
                    *term_counts.entry(idx).or_insert(0.0) += 1.0;
                }
            }

            let mut vector: Vec<(u32, f64)> = term_counts
                .into_iter()
                .map(|(idx, tf)| (idx, tf * idfs[idx as usize]))
                .collect();
            vector.sort_by_key(|&(idx, _)| idx);

            let norm = vector.iter().map(|&(_, w)| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                for entry in &mut vector {
                    entry.1 /= norm;
                }
            }

            vectors.insert(item_id.clone(), vector);
            item_ids.push(item_id.clone());
        }
        item_ids.sort();

        Self { vectors, item_ids }
    }

    /// Cosine similarity between two indexed items; `None` when either has
    /// no vector.
    pub fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        let va = self.vectors.get(a)?;
        let vb = self.vectors.get(b)?;
        Some(sparse_dot(va, vb))
    }

    /// Up to `limit` other item ids ordered by descending similarity to
    /// `item_id`, ties broken by item id. Empty when `item_id` was not part
    /// of the fitted corpus.
    pub fn similar_items(&self, item_id: &str, limit: usize) -> Vec<String> {
        let Some(reference) = self.vectors.get(item_id) else {
            return Vec::new();
        };

        let mut scored: Vec<(&String, f64)> = self
            .item_ids
            .iter()
            .filter(|id| id.as_str() != item_id)
            .map(|id| (id, sparse_dot(reference, &self.vectors[id])))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        scored.into_iter().take(limit).map(|(id, _)| id.clone()).collect()
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

fn sparse_dot(a: &[(u32, f64)], b: &[(u32, f64)]) -> f64 {
    let mut dot = 0.0;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}
