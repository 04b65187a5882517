use crate::catalog::{RelatedTransformed, MAX_RELATED};
use crate::error::AppResult;

use super::{cosine_similarity, EmbeddingBackend};

#[derive(Debug, Clone)]
pub struct EmbeddedTitle {
    pub title: String,
    pub embedding: Vec<f32>,
}

/// Embeds every unique title in a single batched call.
pub async fn rank_titles<B: EmbeddingBackend + ?Sized>(
    backend: &B,
    titles: &[String],
) -> AppResult<Vec<EmbeddedTitle>> {
    if titles.is_empty() {
        return Ok(Vec::new());
    }
    let vectors = backend.embed(titles).await?;
    Ok(titles
        .iter()
        .cloned()
        .zip(vectors)
        .map(|(title, embedding)| EmbeddedTitle { title, embedding })
        .collect())
}

/// Related titles for `items[current]`: stable descending sort by cosine
/// score (ties keep original relative order), keep the top 11, drop the
/// current title if it slipped in, cap at MAX_RELATED.
pub fn top_related(items: &[EmbeddedTitle], current: usize) -> Vec<String> {
    let current_item = &items[current];

    let mut scored: Vec<(usize, f32)> = items
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != current)
        .map(|(j, item)| (j, cosine_similarity(&current_item.embedding, &item.embedding)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(MAX_RELATED + 1)
        .map(|(j, _)| items[j].title.clone())
        .filter(|title| title != &current_item.title)
        .take(MAX_RELATED)
        .collect()
}

/// The full deterministic pipeline output: one transformed record per
/// embedded title, in input order.
pub fn related_for_all(items: &[EmbeddedTitle]) -> Vec<RelatedTransformed> {
    (0..items.len())
        .map(|i| RelatedTransformed {
            c: items[i].title.clone(),
            r: top_related(items, i),
        })
        .collect()
}
