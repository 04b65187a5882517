use anyhow::Context;

use crate::error::AppResult;

use super::client::{AdminClient, DefinitionInput, MetafieldDefinition};

pub const RELATED_COLLECTIONS_KEY: &str = "imp_related_collections";
pub const EXCLUDED_COLLECTIONS_KEY: &str = "imp_excluded_collections";
pub const ADDITIONAL_COLLECTIONS_KEY: &str = "imp_additional_collections";

/// The platform pin-slot ceiling is ~20; staying at or below 17 existing
/// pins leaves headroom for all three definitions.
const PIN_SLOT_HEADROOM: usize = 17;

struct DefinitionSpec {
    key: &'static str,
    name: &'static str,
    description: &'static str,
}

const DEFINITIONS: [DefinitionSpec; 3] = [
    DefinitionSpec {
        key: RELATED_COLLECTIONS_KEY,
        name: "Related Collections",
        description: "Do not edit. These collections are added automatically and will be overridden when new related collections are generated.",
    },
    DefinitionSpec {
        key: EXCLUDED_COLLECTIONS_KEY,
        name: "Excluded Collections",
        description: "Edit this metafield if you wish to exclude a particular collection added by the AI from the Related collections metafield.",
    },
    DefinitionSpec {
        key: ADDITIONAL_COLLECTIONS_KEY,
        name: "Additional Collections",
        description: "If you wish to add more related collections, you can manually add them here.",
    },
];

/// Resolves the write destination, creating any of the three definitions
/// that do not exist yet. Returns the related-collections definition; it
/// is resolved once per run and reused for every write.
pub async fn initialize_metafields<C: AdminClient + ?Sized>(
    client: &C,
) -> AppResult<MetafieldDefinition> {
    let existing = client.metafield_definitions().await?;

    let missing: Vec<&DefinitionSpec> = DEFINITIONS
        .iter()
        .filter(|spec| !existing.iter().any(|def| def.key == spec.key))
        .collect();

    if missing.is_empty() {
        return existing
            .into_iter()
            .find(|def| def.key == RELATED_COLLECTIONS_KEY)
            .context("related collections definition missing despite all keys present")
            .map_err(Into::into);
    }

    let pinned = client.pinned_definition_count().await?;
    let pin = pinned <= PIN_SLOT_HEADROOM;
    tracing::info!(
        "creating {} metafield definitions (pin: {pin}, {pinned} already pinned)",
        missing.len()
    );

    let mut created_related: Option<MetafieldDefinition> = None;
    for spec in missing {
        let created = client
            .create_metafield_definition(&DefinitionInput {
                key: spec.key.to_string(),
                name: spec.name.to_string(),
                description: spec.description.to_string(),
                pin,
            })
            .await?;
        if spec.key == RELATED_COLLECTIONS_KEY {
            created_related = created;
        }
    }

    if let Some(def) = existing
        .into_iter()
        .find(|def| def.key == RELATED_COLLECTIONS_KEY)
    {
        return Ok(def);
    }

    created_related
        .context("related collections definition was not created")
        .map_err(Into::into)
}
