mod app_config;
mod apply;
mod catalog;
mod embed;
mod error;
mod pipeline;
mod prompt;
mod rate_limiters;
mod storefront;
#[cfg(test)]
mod testing;

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app_config::{cfg, PipelineKind};
use embed::OpenAiEmbeddings;
use prompt::chat::OpenAiBackend;
use storefront::client::ShopifyAdminClient;

pub type HttpClient = reqwest::Client;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let http_client = reqwest::Client::new();
    let admin = ShopifyAdminClient::from_config(http_client.clone());

    let run = match cfg.settings.pipeline {
        PipelineKind::Prompt => {
            tracing::info!("running the prompt pipeline with model {}", cfg.model.id);
            pipeline::run_prompt_pipeline(
                &admin,
                OpenAiBackend::new(http_client),
                cfg.generation,
                cfg.apply,
            )
            .await
        }
        PipelineKind::Embedding => {
            tracing::info!(
                "running the embedding pipeline with model {}",
                cfg.api.embedding_model
            );
            pipeline::run_embedding_pipeline(&admin, &OpenAiEmbeddings::new(http_client), cfg.apply)
                .await
        }
    };

    match run {
        Ok(summary) => {
            tracing::info!(
                "done: {} collections, {} results, {} metafields written",
                summary.collections,
                summary.results,
                summary.applied()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("{}", err.user_message());
            ExitCode::FAILURE
        }
    }
}
