use anyhow::anyhow;
use futures::future::join_all;

use crate::catalog::RelatedTransformed;
use crate::error::{is_auth_marker, AppError};
use crate::rate_limiters::RateLimiters;
use crate::storefront::client::{AdminClient, Collection, MetafieldDefinition};

/// One write task: the owning collection and the related ids to persist.
/// Either side may be missing; the apply phase skips those rather than
/// erroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRecommendation {
    pub collection_id: Option<String>,
    pub related_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { collection_id: String },
    Skipped { reason: String },
    Failed { collection_id: String, message: String },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

/// Resolves transformed titles back to collection ids. Every fetched
/// collection gets an entry; collections without a relation record carry
/// no related ids and are later skipped. Related titles that no longer
/// resolve to a collection are dropped.
pub fn map_to_collection_ids(
    collections: &[Collection],
    results: &[RelatedTransformed],
) -> Vec<MappedRecommendation> {
    collections
        .iter()
        .map(|collection| {
            let record = results.iter().find(|r| r.c == collection.title);
            let related_ids = record.map(|record| {
                record
                    .r
                    .iter()
                    .filter_map(|title| {
                        collections
                            .iter()
                            .find(|c| &c.title == title)
                            .map(|c| c.id.clone())
                    })
                    .collect()
            });
            MappedRecommendation {
                collection_id: Some(collection.id.clone()),
                related_ids,
            }
        })
        .collect()
}

/// Splits mapped records into independently submitted groups, so a
/// failure in one group never loses progress committed by earlier ones.
pub fn chunk_recommendations(
    records: Vec<MappedRecommendation>,
    chunk_size: usize,
) -> Vec<Vec<MappedRecommendation>> {
    if chunk_size == 0 {
        return vec![records];
    }
    records
        .chunks(chunk_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Dispatches one metafield write per record through the token gate.
/// Dispatch starts are spaced by the limiter; completions land in any
/// order but outcomes are returned per record, in input order. Nothing
/// is rolled back on failure.
pub async fn apply_batch<C: AdminClient + ?Sized>(
    client: &C,
    limiter: &RateLimiters,
    target: &MetafieldDefinition,
    records: &[MappedRecommendation],
) -> Vec<ApplyOutcome> {
    let tasks = records.iter().map(|record| async move {
        let Some(collection_id) = &record.collection_id else {
            return ApplyOutcome::Skipped {
                reason: "missing collection id".to_string(),
            };
        };
        let Some(related_ids) = &record.related_ids else {
            return ApplyOutcome::Skipped {
                reason: format!("no related collections for {collection_id}"),
            };
        };
        if target.namespace.is_empty() {
            return ApplyOutcome::Skipped {
                reason: "missing metafield namespace".to_string(),
            };
        }

        limiter.acquire_one().await;
        match client
            .set_related_metafield(&target.namespace, collection_id, related_ids)
            .await
        {
            Ok(()) => ApplyOutcome::Applied {
                collection_id: collection_id.clone(),
            },
            Err(e) => {
                tracing::error!("write failed for {collection_id}: {e}");
                ApplyOutcome::Failed {
                    collection_id: collection_id.clone(),
                    message: e.to_string(),
                }
            }
        }
    });

    join_all(tasks).await
}

/// Collapses one batch's outcomes into a single error, preferring the
/// auth-expired copy when any failure carries an auth marker.
pub fn aggregate_error(outcomes: &[ApplyOutcome]) -> Option<AppError> {
    let failures: Vec<(&str, &str)> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            ApplyOutcome::Failed {
                collection_id,
                message,
            } => Some((collection_id.as_str(), message.as_str())),
            _ => None,
        })
        .collect();

    if failures.is_empty() {
        return None;
    }
    if failures.iter().any(|(_, message)| is_auth_marker(message)) {
        return Some(AppError::AuthExpired);
    }

    let (first_id, first_message) = failures[0];
    Some(AppError::Internal(anyhow!(
        "{} of {} writes failed; first failure ({first_id}): {first_message}",
        failures.len(),
        outcomes.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::common::MockAdmin;
    use tokio::time::Duration;

    fn target() -> MetafieldDefinition {
        MetafieldDefinition {
            id: "gid://shopify/MetafieldDefinition/1".to_string(),
            key: "imp_related_collections".to_string(),
            namespace: "custom".to_string(),
        }
    }

    fn record(i: usize) -> MappedRecommendation {
        MappedRecommendation {
            collection_id: Some(format!("gid://shopify/Collection/{i}")),
            related_ids: Some(vec![format!("gid://shopify/Collection/{}", i + 1)]),
        }
    }

    #[test]
    fn test_mapping_resolves_titles_to_ids() {
        let collections = vec![
            Collection {
                id: "id-a".to_string(),
                title: "A".to_string(),
            },
            Collection {
                id: "id-b".to_string(),
                title: "B".to_string(),
            },
        ];
        let results = vec![RelatedTransformed {
            c: "A".to_string(),
            r: vec!["B".to_string(), "Gone".to_string()],
        }];

        let mapped = map_to_collection_ids(&collections, &results);

        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped[0].collection_id.as_deref(), Some("id-a"));
        assert_eq!(mapped[0].related_ids, Some(vec!["id-b".to_string()]));
        // B has no relation record and must be skipped, not invented.
        assert_eq!(mapped[1].related_ids, None);
    }

    #[test]
    fn test_650_records_chunk_into_two_groups() {
        let records: Vec<MappedRecommendation> = (0..650).map(record).collect();
        let chunks = chunk_recommendations(records, 600);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 600);
        assert_eq!(chunks[1].len(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_in_second_group_leaves_first_group_untouched() {
        let records: Vec<MappedRecommendation> = (0..650).map(record).collect();
        let chunks = chunk_recommendations(records, 600);
        let limiter = RateLimiters::new(1000);

        let admin = MockAdmin::default();
        let first = apply_batch(&admin, &limiter, &target(), &chunks[0]).await;
        assert!(first.iter().all(ApplyOutcome::is_applied));
        assert!(aggregate_error(&first).is_none());
        let written_after_first = admin.written().len();
        assert_eq!(written_after_first, 600);

        let failing =
            MockAdmin::default().with_failing_writes(vec!["gid://shopify/Collection/620".into()]);
        let second = apply_batch(&failing, &limiter, &target(), &chunks[1]).await;
        assert_eq!(second.iter().filter(|o| o.is_applied()).count(), 49);
        assert!(aggregate_error(&second).is_some());

        // First group's confirmations are independent of the second.
        assert!(first.iter().all(ApplyOutcome::is_applied));
        assert_eq!(admin.written().len(), written_after_first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_thirty_writes_at_ten_rps_take_at_least_2900_ms() {
        let records: Vec<MappedRecommendation> = (0..30).map(record).collect();
        let limiter = RateLimiters::new(10);
        let admin = MockAdmin::default();

        let start = tokio::time::Instant::now();
        let outcomes = apply_batch(&admin, &limiter, &target(), &records).await;
        let elapsed = start.elapsed();

        assert!(outcomes.iter().all(ApplyOutcome::is_applied));
        assert!(elapsed >= Duration::from_millis(2900), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_incomplete_records_are_skipped_without_consuming_tokens() {
        let records = vec![
            MappedRecommendation {
                collection_id: None,
                related_ids: Some(vec![]),
            },
            MappedRecommendation {
                collection_id: Some("id-1".to_string()),
                related_ids: None,
            },
            record(2),
        ];
        let limiter = RateLimiters::new(10);
        let admin = MockAdmin::default();

        let outcomes = apply_batch(&admin, &limiter, &target(), &records).await;

        assert!(matches!(outcomes[0], ApplyOutcome::Skipped { .. }));
        assert!(matches!(outcomes[1], ApplyOutcome::Skipped { .. }));
        assert!(outcomes[2].is_applied());
        assert_eq!(admin.written().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_namespace_skips_every_write() {
        let empty_namespace = MetafieldDefinition {
            namespace: String::new(),
            ..target()
        };
        let limiter = RateLimiters::new(10);
        let admin = MockAdmin::default();

        let outcomes = apply_batch(&admin, &limiter, &empty_namespace, &[record(1)]).await;
        assert!(matches!(outcomes[0], ApplyOutcome::Skipped { .. }));
        assert!(admin.written().is_empty());
    }

    #[test]
    fn test_aggregate_error_prefers_auth_copy() {
        let outcomes = vec![
            ApplyOutcome::Applied {
                collection_id: "a".to_string(),
            },
            ApplyOutcome::Failed {
                collection_id: "b".to_string(),
                message: "Request failed with status 401 Unauthorized".to_string(),
            },
        ];
        assert!(matches!(
            aggregate_error(&outcomes),
            Some(AppError::AuthExpired)
        ));
    }
}
