//! End-to-end runs: fetch the catalog, generate related collections and
//! write them back as metafields.

use crate::app_config::{ApplyConfig, GenerationConfig};
use crate::apply::{self, ApplyOutcome};
use crate::catalog::{build_catalog, Category, RelatedTransformed};
use crate::embed::{similarity, EmbeddingBackend};
use crate::error::AppResult;
use crate::prompt::chat::CompletionBackend;
use crate::prompt::generate::RelatedGenerator;
use crate::rate_limiters::RateLimiters;
use crate::storefront::client::{get_all_collections, AdminClient, Collection, MetafieldDefinition};
use crate::storefront::metafields::initialize_metafields;

#[derive(Debug)]
pub struct RunSummary {
    pub collections: usize,
    pub categories: usize,
    pub results: usize,
    pub outcomes: Vec<ApplyOutcome>,
}

impl RunSummary {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }
}

struct Prepared {
    collections: Vec<Collection>,
    target: MetafieldDefinition,
    categories: Vec<Category>,
}

/// Shared run preamble: drain the collection listing, make sure the
/// write destination exists, and build the deduplicated catalog.
async fn prepare<C: AdminClient + ?Sized>(client: &C) -> AppResult<Prepared> {
    let collections = get_all_collections(client).await?;
    let target = initialize_metafields(client).await?;
    let titles: Vec<String> = collections.iter().map(|c| c.title.clone()).collect();
    let categories = build_catalog(titles);
    tracing::info!(
        "{} collections, {} unique categories",
        collections.len(),
        categories.len()
    );
    Ok(Prepared {
        collections,
        target,
        categories,
    })
}

/// Writes results back in chunks. Outcomes accumulate per record; a
/// chunk with failures stops the run after its own outcomes are logged,
/// and earlier chunks stay committed.
async fn apply_results<C: AdminClient + ?Sized>(
    client: &C,
    target: &MetafieldDefinition,
    collections: &[Collection],
    results: &[RelatedTransformed],
    config: &ApplyConfig,
) -> AppResult<Vec<ApplyOutcome>> {
    let mapped = apply::map_to_collection_ids(collections, results);
    let chunks = apply::chunk_recommendations(mapped, config.chunk_size);
    let total_chunks = chunks.len();
    let limiter = RateLimiters::new(config.max_rps);

    let mut outcomes = Vec::new();
    for (index, chunk) in chunks.iter().enumerate() {
        let chunk_outcomes = apply::apply_batch(client, &limiter, target, chunk).await;
        let applied = chunk_outcomes.iter().filter(|o| o.is_applied()).count();
        tracing::info!(
            "apply chunk {}/{total_chunks}: {applied} of {} applied",
            index + 1,
            chunk_outcomes.len()
        );
        let error = apply::aggregate_error(&chunk_outcomes);
        outcomes.extend(chunk_outcomes);
        if let Some(error) = error {
            return Err(error);
        }
    }

    Ok(outcomes)
}

/// Prompt pipeline: batched completion requests against a primed
/// conversation, then write-back.
pub async fn run_prompt_pipeline<C, B>(
    client: &C,
    backend: B,
    generation: GenerationConfig,
    apply_config: ApplyConfig,
) -> AppResult<RunSummary>
where
    C: AdminClient + ?Sized,
    B: CompletionBackend,
{
    let prepared = prepare(client).await?;
    if prepared.categories.is_empty() {
        tracing::warn!("no collections to relate, nothing to do");
        return Ok(RunSummary {
            collections: prepared.collections.len(),
            categories: 0,
            results: 0,
            outcomes: Vec::new(),
        });
    }

    let generator = RelatedGenerator::new(backend, generation);
    let results = generator.generate_all(&prepared.categories).await?;

    let outcomes = apply_results(
        client,
        &prepared.target,
        &prepared.collections,
        &results,
        &apply_config,
    )
    .await?;

    Ok(RunSummary {
        collections: prepared.collections.len(),
        categories: prepared.categories.len(),
        results: results.len(),
        outcomes,
    })
}

/// Embedding pipeline: one batched embedding call, deterministic cosine
/// ranking, then write-back.
pub async fn run_embedding_pipeline<C, B>(
    client: &C,
    backend: &B,
    apply_config: ApplyConfig,
) -> AppResult<RunSummary>
where
    C: AdminClient + ?Sized,
    B: EmbeddingBackend + ?Sized,
{
    let prepared = prepare(client).await?;
    if prepared.categories.is_empty() {
        tracing::warn!("no collections to relate, nothing to do");
        return Ok(RunSummary {
            collections: prepared.collections.len(),
            categories: 0,
            results: 0,
            outcomes: Vec::new(),
        });
    }

    let titles: Vec<String> = prepared
        .categories
        .iter()
        .map(|c| c.title.clone())
        .collect();
    let embedded = similarity::rank_titles(backend, &titles).await?;
    let results = similarity::related_for_all(&embedded);

    let outcomes = apply_results(
        client,
        &prepared.target,
        &prepared.collections,
        &results,
        &apply_config,
    )
    .await?;

    Ok(RunSummary {
        collections: prepared.collections.len(),
        categories: prepared.categories.len(),
        results: results.len(),
        outcomes,
    })
}
