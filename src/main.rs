use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use dermatik::api::server::start_server;
use dermatik::api::types::ApiContext;
use dermatik::config::AppConfig;
use dermatik::pipeline::model::OpenAiChatClient;
use dermatik::pipeline::retry::BackoffPolicy;
use dermatik::pipeline::synthesis::DiagnosisSynthesizer;
use dermatik::pipeline::vision::VisionAnalysisClient;
use dermatik::store::memory::InMemoryBackend;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dermatik=info,tower_http=info")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set; analysis requests will fail with a configuration error");
    }
    if config.service_key_hash.is_none() {
        tracing::warn!("DERMATIK_SERVICE_KEY not set; service authentication disabled");
    }

    let backoff = BackoffPolicy::new(Duration::from_millis(config.backoff_base_ms));

    let photo_model = Arc::new(OpenAiChatClient::new(
        &config.openai_base_url,
        config.openai_api_key.clone(),
        config.photo.timeout_secs,
    )?);
    let diagnosis_model = Arc::new(OpenAiChatClient::new(
        &config.openai_base_url,
        config.openai_api_key.clone(),
        config.diagnosis.timeout_secs,
    )?);

    let vision = Arc::new(VisionAnalysisClient::new(
        photo_model,
        config.photo.clone(),
        config.max_retries,
        backoff,
    ));
    let synthesizer = Arc::new(DiagnosisSynthesizer::new(
        diagnosis_model,
        config.diagnosis.clone(),
        config.max_retries,
        backoff,
    ));

    let backend = Arc::new(InMemoryBackend::new());
    let ctx = ApiContext {
        store: backend.clone(),
        storage: backend.clone(),
        sessions: backend,
        vision,
        synthesizer,
        config: config.clone(),
    };

    let mut server = start_server(ctx, config.bind_addr).await?;
    tracing::info!(addr = %server.addr, "dermatik listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    server.shutdown();
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
