use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Hard cap on related entries per record.
pub const MAX_RELATED: usize = 10;

/// One store collection title with its position in the run's ordered
/// title list. Indices are dense, zero-based, and stable for the
/// duration of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub index: usize,
    pub title: String,
}

/// Builds the category index space from raw titles. Duplicate titles
/// collapse to the first-seen index.
pub fn build_catalog<I>(titles: I) -> Vec<Category>
where
    I: IntoIterator<Item = String>,
{
    let unique: IndexSet<String> = titles.into_iter().collect();
    unique
        .into_iter()
        .enumerate()
        .map(|(index, title)| Category { index, title })
        .collect()
}

/// Insertion-ordered title -> index mapping, serialized into the priming
/// payload so later batch questions can reference indices alone.
pub fn title_index_map(categories: &[Category]) -> IndexMap<&str, usize> {
    categories
        .iter()
        .map(|category| (category.title.as_str(), category.index))
        .collect()
}

/// One category's related indices as produced by a generation batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationRecord {
    pub c: usize,
    pub r: Vec<usize>,
}

/// A relation record with indices resolved back to titles. This is the
/// unit persisted to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelatedTransformed {
    pub c: String,
    pub r: Vec<String>,
}

/// Wire shape of one batch answer.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationPayload {
    #[serde(default)]
    pub data: Vec<RelationRecord>,
}
