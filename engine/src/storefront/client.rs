use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Duration;
use url::Url;

use crate::app_config::cfg;
use crate::error::{is_auth_marker, AppError, AppResult};
use crate::HttpClient;

use super::queries;

/// Fixed pause between page fetches; the listing endpoint trips its own
/// rate limit without it.
const PAGE_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Collection {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionPage {
    pub collections: Vec<Collection>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MetafieldDefinition {
    pub id: String,
    pub key: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionInput {
    pub key: String,
    pub name: String,
    pub description: String,
    pub pin: bool,
}

/// Seam to the storefront Admin API.
#[async_trait]
pub trait AdminClient: Send + Sync {
    async fn collections_page(&self, after: Option<&str>) -> AppResult<CollectionPage>;
    async fn metafield_definitions(&self) -> AppResult<Vec<MetafieldDefinition>>;
    async fn pinned_definition_count(&self) -> AppResult<usize>;
    async fn create_metafield_definition(
        &self,
        input: &DefinitionInput,
    ) -> AppResult<Option<MetafieldDefinition>>;
    async fn set_related_metafield(
        &self,
        namespace: &str,
        collection_id: &str,
        related_ids: &[String],
    ) -> AppResult<()>;
}

#[async_trait]
impl<T: AdminClient + ?Sized> AdminClient for Arc<T> {
    async fn collections_page(&self, after: Option<&str>) -> AppResult<CollectionPage> {
        (**self).collections_page(after).await
    }

    async fn metafield_definitions(&self) -> AppResult<Vec<MetafieldDefinition>> {
        (**self).metafield_definitions().await
    }

    async fn pinned_definition_count(&self) -> AppResult<usize> {
        (**self).pinned_definition_count().await
    }

    async fn create_metafield_definition(
        &self,
        input: &DefinitionInput,
    ) -> AppResult<Option<MetafieldDefinition>> {
        (**self).create_metafield_definition(input).await
    }

    async fn set_related_metafield(
        &self,
        namespace: &str,
        collection_id: &str,
        related_ids: &[String],
    ) -> AppResult<()> {
        (**self)
            .set_related_metafield(namespace, collection_id, related_ids)
            .await
    }
}

/// Drains the cursor-paginated listing into one in-memory list. Strictly
/// sequential: each page fetch depends on the previous page's cursor.
pub async fn get_all_collections<C: AdminClient + ?Sized>(
    client: &C,
) -> AppResult<Vec<Collection>> {
    let mut all_collections = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = client.collections_page(cursor.as_deref()).await?;
        all_collections.extend(page.collections);
        if !page.has_next_page {
            break;
        }
        cursor = page.end_cursor;
        tokio::time::sleep(PAGE_DELAY).await;
    }

    tracing::info!("fetched {} collections", all_collections.len());
    Ok(all_collections)
}

pub struct ShopifyAdminClient {
    http_client: HttpClient,
    endpoint: Url,
    access_token: String,
}

impl ShopifyAdminClient {
    pub fn from_config(http_client: HttpClient) -> Self {
        Self {
            http_client,
            endpoint: cfg.storefront.admin_endpoint(),
            access_token: cfg.storefront.access_token.clone(),
        }
    }

    async fn graphql(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> AppResult<serde_json::Value> {
        let resp = self
            .http_client
            .post(self.endpoint.clone())
            .header("X-Shopify-Access-Token", &self.access_token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(AppError::AuthExpired);
        }

        let body = resp.json::<serde_json::Value>().await?;
        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            let text = errors.to_string();
            if is_auth_marker(&text) {
                return Err(AppError::AuthExpired);
            }
            return Err(anyhow!("Admin API error: {text}").into());
        }

        Ok(body)
    }
}

fn nodes<T: for<'de> Deserialize<'de>>(edges: &serde_json::Value) -> Vec<T> {
    edges
        .as_array()
        .map(|edges| {
            edges
                .iter()
                .filter_map(|edge| serde_json::from_value(edge["node"].clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl AdminClient for ShopifyAdminClient {
    async fn collections_page(&self, after: Option<&str>) -> AppResult<CollectionPage> {
        let body = self
            .graphql(queries::GET_COLLECTIONS, json!({ "after": after }))
            .await?;
        let data = &body["data"]["collections"];

        Ok(CollectionPage {
            collections: nodes(&data["edges"]),
            has_next_page: data["pageInfo"]["hasNextPage"].as_bool().unwrap_or(false),
            end_cursor: data["pageInfo"]["endCursor"].as_str().map(str::to_string),
        })
    }

    async fn metafield_definitions(&self) -> AppResult<Vec<MetafieldDefinition>> {
        let body = self
            .graphql(queries::GET_APP_METAFIELDS, json!({}))
            .await?;
        Ok(nodes(&body["data"]["metafieldDefinitions"]["edges"]))
    }

    async fn pinned_definition_count(&self) -> AppResult<usize> {
        let body = self
            .graphql(queries::GET_PINNED_METAFIELDS, json!({}))
            .await?;
        Ok(body["data"]["metafieldDefinitions"]["edges"]
            .as_array()
            .map(|edges| edges.len())
            .unwrap_or(0))
    }

    async fn create_metafield_definition(
        &self,
        input: &DefinitionInput,
    ) -> AppResult<Option<MetafieldDefinition>> {
        let body = self
            .graphql(
                queries::CREATE_METAFIELD_DEFINITION,
                json!({
                    "definition": {
                        "key": input.key,
                        "name": input.name,
                        "description": input.description,
                        "access": {
                            "admin": "MERCHANT_READ_WRITE",
                            "storefront": "PUBLIC_READ",
                        },
                        "type": "list.collection_reference",
                        "ownerType": "COLLECTION",
                        "pin": input.pin,
                    }
                }),
            )
            .await?;

        let created = &body["data"]["metafieldDefinitionCreate"]["createdDefinition"];
        Ok(serde_json::from_value(created.clone()).ok())
    }

    async fn set_related_metafield(
        &self,
        namespace: &str,
        collection_id: &str,
        related_ids: &[String],
    ) -> AppResult<()> {
        let value = serde_json::to_string(related_ids)
            .map_err(|e| AppError::Internal(e.into()))?;
        self.graphql(
            queries::SET_METAFIELD,
            json!({
                "metafields": [{
                    "key": super::metafields::RELATED_COLLECTIONS_KEY,
                    "namespace": namespace,
                    "ownerId": collection_id,
                    "type": "list.collection_reference",
                    "value": value,
                }]
            }),
        )
        .await?;
        Ok(())
    }
}
