use config::Config;
use lazy_static::lazy_static;
use serde::Deserialize;
use std::{env, path::Path};
use url::Url;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    Prompt,
    Embedding,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub pipeline: PipelineKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub key: String,
    pub chat_endpoint: String,
    pub embeddings_endpoint: String,
    pub embedding_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub frequency_penalty: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorefrontConfig {
    pub shop_domain: String,
    pub access_token: String,
    pub api_version: String,
}

impl StorefrontConfig {
    pub fn admin_endpoint(&self) -> Url {
        let raw = format!(
            "https://{}/admin/api/{}/graphql.json",
            self.shop_domain, self.api_version
        );
        Url::parse(&raw).expect("storefront shop_domain is invalid")
    }
}

/// Generation-phase knobs. Passed explicitly into the scheduler rather
/// than read from global state.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Categories per completion request.
    pub batch_size: usize,
    /// In-flight requests per dispatch group.
    pub concurrency: usize,
    /// Character threshold for splitting the priming payload.
    pub chunk_threshold: usize,
    /// Inputs larger than this are generated in two sequential halves.
    pub halving_threshold: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            concurrency: 13,
            chunk_threshold: 10_000,
            halving_threshold: 800,
        }
    }
}

/// Write-back knobs.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Ceiling on metafield writes per second.
    pub max_rps: usize,
    /// Mapped records per independently submitted apply group.
    pub chunk_size: usize,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            max_rps: 10,
            chunk_size: 600,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    settings: Settings,
    api: ApiConfig,
    model: ModelConfig,
    storefront: StorefrontConfig,
    #[serde(default)]
    generation: GenerationConfig,
    #[serde(default)]
    apply: ApplyConfig,
}

#[derive(Debug)]
pub struct AppConfig {
    pub settings: Settings,
    pub api: ApiConfig,
    pub model: ModelConfig,
    pub storefront: StorefrontConfig,
    pub generation: GenerationConfig,
    pub apply: ApplyConfig,
}

lazy_static! {
    pub static ref cfg: AppConfig = {
        let root = env::var("APP_DIR").unwrap_or_else(|_| {
            let dir =
                env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR or APP_DIR is required");
            let dir = Path::new(&dir).parent().unwrap().display().to_string();
            format!("{}/config", dir)
        });
        let path = format!("{root}/config.toml");
        let cfg_file: ConfigFile = Config::builder()
            .add_source(config::File::with_name(&path))
            .build()
            .expect("config.toml is required")
            .try_deserialize()
            .expect("config.toml is invalid");

        let ConfigFile {
            settings,
            mut api,
            model,
            mut storefront,
            generation,
            apply,
        } = cfg_file;

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            api.key = key;
        }
        if let Ok(token) = env::var("SHOPIFY_ACCESS_TOKEN") {
            storefront.access_token = token;
        }

        AppConfig {
            settings,
            api,
            model,
            storefront,
            generation,
            apply,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_defaults() {
        let generation = GenerationConfig::default();
        assert_eq!(generation.batch_size, 50);
        assert_eq!(generation.concurrency, 13);
        assert_eq!(generation.chunk_threshold, 10_000);
        assert_eq!(generation.halving_threshold, 800);

        let apply = ApplyConfig::default();
        assert_eq!(apply.max_rps, 10);
        assert_eq!(apply.chunk_size, 600);
    }

    #[test]
    fn test_admin_endpoint() {
        let storefront = StorefrontConfig {
            shop_domain: "demo.myshopify.com".to_string(),
            access_token: "shpat_test".to_string(),
            api_version: "2024-07".to_string(),
        };
        assert_eq!(
            storefront.admin_endpoint().as_str(),
            "https://demo.myshopify.com/admin/api/2024-07/graphql.json"
        );
    }
}
