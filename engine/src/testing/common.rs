//! Shared in-memory doubles for the completion, embedding and Admin API
//! seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::embed::EmbeddingBackend;
use crate::error::AppResult;
use crate::prompt::chat::{CompletionBackend, ConversationState};
use crate::storefront::client::{
    AdminClient, Collection, CollectionPage, DefinitionInput, MetafieldDefinition,
};

pub type Responder = Box<dyn Fn(&ConversationState) -> AppResult<String> + Send + Sync>;

/// Scripted completion backend. `gated` variants park every call on a
/// semaphore after bumping the call counter, so tests can observe which
/// calls have started before letting any of them finish.
pub struct MockCompletion {
    responder: Responder,
    gate: Option<Semaphore>,
    calls: AtomicUsize,
    questions: Mutex<Vec<String>>,
    context_lens: Mutex<Vec<usize>>,
}

impl MockCompletion {
    pub fn new(responder: Responder) -> Self {
        Self {
            responder,
            gate: None,
            calls: AtomicUsize::new(0),
            questions: Mutex::new(Vec::new()),
            context_lens: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(responder: Responder) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(responder)
        }
    }

    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The final user message of each call, in call order.
    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    /// The conversation depth of each call, in call order.
    pub fn context_lens(&self) -> Vec<usize> {
        self.context_lens.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for MockCompletion {
    async fn complete(&self, conversation: &ConversationState) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.context_lens.lock().unwrap().push(conversation.len());
        if let Some(last_user) = conversation
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == "user")
        {
            self.questions.lock().unwrap().push(last_user.content.clone());
        }

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| anyhow!("gate closed: {e}"))?;
            permit.forget();
        }

        (self.responder)(conversation)
    }
}

/// Builds a responder that answers any "- Title" batch question with a
/// well-formed payload: each asked title relates to the next two titles
/// in the given universe.
pub fn relation_responder(titles: Vec<String>) -> Responder {
    Box::new(move |conversation| {
        let question = &conversation
            .messages()
            .last()
            .ok_or_else(|| anyhow!("empty conversation"))?
            .content;
        let n = titles.len();
        let data: Vec<serde_json::Value> = question
            .lines()
            .filter_map(|line| line.strip_prefix("- "))
            .filter_map(|title| titles.iter().position(|t| t == title))
            .map(|i| serde_json::json!({ "c": i, "r": [(i + 1) % n, (i + 2) % n] }))
            .collect();
        Ok(serde_json::json!({ "data": data }).to_string())
    })
}

/// Embedding backend backed by a fixed title-to-vector table. Unknown
/// titles embed to the empty vector.
#[derive(Default)]
pub struct MockEmbeddings {
    vectors: HashMap<String, Vec<f32>>,
}

impl MockEmbeddings {
    pub fn new(vectors: HashMap<String, Vec<f32>>) -> Self {
        Self { vectors }
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddings {
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| self.vectors.get(text).cloned().unwrap_or_default())
            .collect())
    }
}

/// In-memory Admin API double. Pages are served in order; definition
/// creates and metafield writes are logged for assertions.
#[derive(Default)]
pub struct MockAdmin {
    pages: Vec<CollectionPage>,
    page_index: AtomicUsize,
    cursors: Mutex<Vec<Option<String>>>,
    definitions: Vec<MetafieldDefinition>,
    pinned_count: usize,
    created: Mutex<Vec<DefinitionInput>>,
    written: Mutex<Vec<(String, Vec<String>)>>,
    failing_writes: Vec<String>,
}

impl MockAdmin {
    pub fn with_pages(pages: Vec<CollectionPage>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn with_definitions(mut self, definitions: Vec<MetafieldDefinition>) -> Self {
        self.definitions = definitions;
        self
    }

    pub fn with_pinned_count(mut self, pinned_count: usize) -> Self {
        self.pinned_count = pinned_count;
        self
    }

    pub fn with_failing_writes(mut self, collection_ids: Vec<String>) -> Self {
        self.failing_writes = collection_ids;
        self
    }

    /// The cursor passed to each page fetch, in fetch order.
    pub fn cursors(&self) -> Vec<Option<String>> {
        self.cursors.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<DefinitionInput> {
        self.created.lock().unwrap().clone()
    }

    /// Committed writes as (collection id, related ids) pairs.
    pub fn written(&self) -> Vec<(String, Vec<String>)> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl AdminClient for MockAdmin {
    async fn collections_page(&self, after: Option<&str>) -> AppResult<CollectionPage> {
        self.cursors
            .lock()
            .unwrap()
            .push(after.map(str::to_string));
        let index = self.page_index.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }

    async fn metafield_definitions(&self) -> AppResult<Vec<MetafieldDefinition>> {
        Ok(self.definitions.clone())
    }

    async fn pinned_definition_count(&self) -> AppResult<usize> {
        Ok(self.pinned_count)
    }

    async fn create_metafield_definition(
        &self,
        input: &DefinitionInput,
    ) -> AppResult<Option<MetafieldDefinition>> {
        self.created.lock().unwrap().push(input.clone());
        Ok(Some(MetafieldDefinition {
            id: format!("gid://shopify/MetafieldDefinition/{}", input.key),
            key: input.key.clone(),
            namespace: "custom".to_string(),
        }))
    }

    async fn set_related_metafield(
        &self,
        _namespace: &str,
        collection_id: &str,
        related_ids: &[String],
    ) -> AppResult<()> {
        if self.failing_writes.iter().any(|id| id == collection_id) {
            return Err(anyhow!("metafieldsSet rejected {collection_id}").into());
        }
        self.written
            .lock()
            .unwrap()
            .push((collection_id.to_string(), related_ids.to_vec()));
        Ok(())
    }
}

/// Collections "Collection 0".."Collection {n-1}" as a single page.
pub fn collection_fixture(n: usize) -> Vec<Collection> {
    (0..n)
        .map(|i| Collection {
            id: format!("gid://shopify/Collection/{i}"),
            title: format!("Collection {i}"),
        })
        .collect()
}
