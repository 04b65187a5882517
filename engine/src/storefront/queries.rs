//! Admin GraphQL documents used by the storefront client.

pub const GET_COLLECTIONS: &str = r#"
query GetCollections($after: String) {
  collections(first: 200, after: $after) {
    pageInfo {
      hasNextPage
      endCursor
    }
    edges {
      cursor
      node {
        id
        title
      }
    }
  }
}"#;

pub const GET_APP_METAFIELDS: &str = r#"
query appCollectionsMetafields {
  metafieldDefinitions(first: 20, query: "key:imp_*", ownerType: COLLECTION) {
    edges {
      node {
        id
        key
        namespace
      }
    }
  }
}"#;

pub const GET_PINNED_METAFIELDS: &str = r#"
query pinnedCollectionsMetafields {
  metafieldDefinitions(first: 20, pinnedStatus: PINNED, ownerType: COLLECTION) {
    edges {
      node {
        id
        key
      }
    }
  }
}"#;

pub const CREATE_METAFIELD_DEFINITION: &str = r#"
mutation metafieldDefinitionCreate($definition: MetafieldDefinitionInput!) {
  metafieldDefinitionCreate(definition: $definition) {
    createdDefinition {
      id
      key
      namespace
    }
  }
}"#;

pub const SET_METAFIELD: &str = r#"
mutation metafieldsSet($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    metafields {
      key
    }
  }
}"#;
