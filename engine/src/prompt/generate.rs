use anyhow::Context;
use futures::future::try_join_all;
use indoc::{formatdoc, indoc};

use crate::app_config::GenerationConfig;
use crate::catalog::{self, Category, RelatedTransformed, RelationRecord};
use crate::error::AppResult;

use super::chat::{ChatMessage, CompletionBackend, ConversationState};
use super::splitter;
use super::validate;

pub const SYSTEM_PROMPT: &str = indoc! {r#"
    You are an online store assistant. I will provide you with a list of shop categories with keys representing their category name and values representing their indices.

    For example:
    {"Computer": 0, "Gardening": 1, "Keyboard": 2, "Soil": 3}

    After that, I will give you a list of categories from that mapping. Your task is to return the top 10 (if there are enough categories) related categories for each, based on the semantic distance of the category name to them.

    Please note the following guidelines for your response:
    1. Exclude Current Title: Do not include the current category index in the related results indices.
    2. Ensure Valid JSON Format: Your response must be a valid JSON object without any additional comments or text, consisting of a "data" array of objects where each object has a category index (c) and an array of related category indices (r).
    3. Always return the top 10 indices in (r): Provide the top 10 items that are closest in semantic meaning to the category's name.
    4. No duplicate indices in (r): Each related index for a category must be unique.

    Here's an example of the expected format:
    { "data": [
      { "c": 0, "r": [2] },
      { "c": 1, "r": [3] },
      { "c": 2, "r": [0] },
      { "c": 3, "r": [1] }
    ]}

    In the example above, Computer is related to Keyboard while Gardening is related to Soil.

    Please ensure that the related categories returned are semantically meaningful and relevant to the given category key."#};

/// Batch request scheduler. Primes one conversation with the full
/// category universe, then asks for relations in fixed-size batches with
/// bounded concurrency. Strict reduction: one malformed batch aborts the
/// whole call, because relation indices are only meaningful against this
/// run's exact category ordering.
pub struct RelatedGenerator<B: CompletionBackend> {
    backend: B,
    config: GenerationConfig,
}

impl<B: CompletionBackend> RelatedGenerator<B> {
    pub fn new(backend: B, config: GenerationConfig) -> Self {
        Self { backend, config }
    }

    /// Entry point for a whole catalog. Inputs beyond the halving
    /// threshold run as two sequential passes over the same universe so
    /// a single pass never grows unbounded.
    pub async fn generate_all(
        &self,
        categories: &[Category],
    ) -> AppResult<Vec<RelatedTransformed>> {
        if categories.len() > self.config.halving_threshold {
            let half = categories.len().div_ceil(2);
            tracing::info!(
                "{} categories exceed the halving threshold, generating in two passes",
                categories.len()
            );
            let mut results = self.generate(categories, &categories[..half]).await?;
            results.extend(self.generate(categories, &categories[half..]).await?);
            Ok(results)
        } else {
            self.generate(categories, categories).await
        }
    }

    /// One generation pass: `all_categories` primes the conversation,
    /// `categories` is the slice actually asked about. No partial results
    /// are returned on failure.
    pub async fn generate(
        &self,
        all_categories: &[Category],
        categories: &[Category],
    ) -> AppResult<Vec<RelatedTransformed>> {
        let serialized = serde_json::to_string(&catalog::title_index_map(all_categories))
            .context("serializing the category index map")?;

        tracing::info!(
            "priming conversation with {} categories ({} chars)",
            all_categories.len(),
            serialized.len()
        );
        let primed =
            splitter::prime_conversation(SYSTEM_PROMPT, &serialized, self.config.chunk_threshold);

        let batches: Vec<&[Category]> = categories.chunks(self.config.batch_size).collect();
        let total_batches = batches.len();
        tracing::info!(
            "dispatching {} batches in groups of {}",
            total_batches,
            self.config.concurrency
        );

        // Static group boundaries: group i+1 never starts until every
        // batch in group i has settled. Accumulation order follows
        // dispatch order, not completion order.
        let mut records: Vec<RelationRecord> = Vec::new();
        for (group_index, group) in batches.chunks(self.config.concurrency).enumerate() {
            let group_results =
                try_join_all(group.iter().map(|batch| self.run_batch(&primed, batch))).await?;
            for batch_records in group_results {
                records.extend(batch_records);
            }
            tracing::info!(
                "group {} settled, {} records accumulated",
                group_index + 1,
                records.len()
            );
        }

        // Titles resolve against the batch-local universe, not the full one.
        Ok(validate::transform(categories, &records))
    }

    async fn run_batch(
        &self,
        primed: &ConversationState,
        batch: &[Category],
    ) -> AppResult<Vec<RelationRecord>> {
        let queries = batch
            .iter()
            .map(|category| format!("- {}", category.title))
            .collect::<Vec<_>>()
            .join("\n");
        let question = formatdoc! {"
            What are the related categories for these:
            {queries}"};

        let conversation = primed.with(ChatMessage::user(question));
        let content = self.backend.complete(&conversation).await?;
        validate::parse_generation_payload(&content)
    }
}
