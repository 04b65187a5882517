use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::{Category, GenerationPayload, RelatedTransformed, RelationRecord, MAX_RELATED};
use crate::error::{AppError, AppResult};

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub fn collapse_whitespace(text: &str) -> String {
    RE_WS.replace_all(text, " ").trim().to_string()
}

/// Any parse failure is `false`; this never errors.
pub fn is_valid_json(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

/// Parses one batch answer. Empty content, non-JSON content, and an
/// unexpected payload shape are all fatal to the batch; an empty `data`
/// list is not (the batch just contributes nothing).
pub fn parse_generation_payload(raw: &str) -> AppResult<Vec<RelationRecord>> {
    let cleaned = collapse_whitespace(raw);
    if cleaned.is_empty() {
        return Err(AppError::MalformedGeneration(
            "empty completion content".to_string(),
        ));
    }
    if !is_valid_json(&cleaned) {
        return Err(AppError::MalformedGeneration(
            "completion content is not valid JSON".to_string(),
        ));
    }

    let payload: GenerationPayload = serde_json::from_str(&cleaned)
        .map_err(|e| AppError::MalformedGeneration(format!("unexpected payload shape: {e}")))?;

    Ok(sanitize_records(payload.data))
}

/// Enforces the record invariants: the source index never appears in its
/// own related list, related indices are unique (first occurrence kept),
/// and at most MAX_RELATED survive.
pub fn sanitize_records(records: Vec<RelationRecord>) -> Vec<RelationRecord> {
    records
        .into_iter()
        .map(|record| {
            let mut seen = HashSet::new();
            let r = record
                .r
                .into_iter()
                .filter(|&i| i != record.c && seen.insert(i))
                .take(MAX_RELATED)
                .collect();
            RelationRecord { c: record.c, r }
        })
        .collect()
}

/// Pure index-to-title mapping over the batch-local category universe.
/// Out-of-range indices are dropped here with a warning; the original
/// system deferred that filtering to its display layer.
pub fn transform(categories: &[Category], records: &[RelationRecord]) -> Vec<RelatedTransformed> {
    records
        .iter()
        .filter_map(|record| {
            let Some(source) = categories.get(record.c) else {
                tracing::warn!(
                    "source index {} outside the category universe, dropping record",
                    record.c
                );
                return None;
            };
            let r = record
                .r
                .iter()
                .filter_map(|&i| match categories.get(i) {
                    Some(category) => Some(category.title.clone()),
                    None => {
                        tracing::warn!(
                            "related index {i} outside the category universe, dropping entry"
                        );
                        None
                    }
                })
                .collect();
            Some(RelatedTransformed {
                c: source.title.clone(),
                r,
            })
        })
        .collect()
}
