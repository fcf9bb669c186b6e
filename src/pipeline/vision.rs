//! Photo analysis pipeline: vision model call wrapped in guards, retry
//! and provenance measurement. Fallback to the mock generator is decided
//! by the caller, not here.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::cost::estimate_photo_cost;
use super::model::{ChatModel, ModelRequest};
use super::prompt::{build_photo_prompt, DERMATOLOGY_SYSTEM_PROMPT, PHOTO_PROMPT_VERSION};
use super::retry::{call_with_retry, BackoffPolicy};
use super::schema::{parse_photo_report, PhotoAnalysisReport};
use super::{AiError, context::ClinicalContext};
use crate::config::ModelParams;

/// Inclusive bounds on images per analysis request.
pub const MIN_IMAGES: usize = 1;
pub const MAX_IMAGES: usize = 5;

/// Where a returned report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Model,
    Mock,
}

/// Per-request model overrides. All optional; defaults come from config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    #[serde(alias = "maxTokens")]
    pub max_tokens: Option<u32>,
}

/// A completed photo analysis with its provenance.
#[derive(Debug, Clone)]
pub struct PhotoAnalysis {
    pub report: PhotoAnalysisReport,
    pub model: String,
    pub prompt_version: &'static str,
    pub latency_ms: u64,
    pub cost_usd: f64,
    /// Outbound attempts made, including the successful one.
    pub attempts: u32,
}

/// Vision model front end for the photo analysis endpoint.
pub struct VisionAnalysisClient {
    model: Arc<dyn ChatModel>,
    params: ModelParams,
    max_retries: u32,
    backoff: BackoffPolicy,
}

impl VisionAnalysisClient {
    pub fn new(
        model: Arc<dyn ChatModel>,
        params: ModelParams,
        max_retries: u32,
        backoff: BackoffPolicy,
    ) -> Self {
        Self { model, params, max_retries, backoff }
    }

    /// Analyse `image_urls` against the clinical context.
    ///
    /// The image count guard runs before any outbound call; a rejected
    /// request costs nothing. Latency covers the full retry loop.
    pub async fn analyze(
        &self,
        image_urls: &[String],
        context: &ClinicalContext,
        clinical_text: Option<&serde_json::Value>,
        options: &AnalysisOptions,
    ) -> Result<PhotoAnalysis, AiError> {
        if image_urls.len() < MIN_IMAGES || image_urls.len() > MAX_IMAGES {
            return Err(AiError::ImageCount(image_urls.len()));
        }

        let model_name = options
            .model
            .clone()
            .unwrap_or_else(|| self.params.model.clone());
        let request = ModelRequest {
            model: model_name.clone(),
            system: DERMATOLOGY_SYSTEM_PROMPT.to_string(),
            user_text: build_photo_prompt(context, clinical_text),
            image_urls: image_urls.to_vec(),
            temperature: options.temperature.unwrap_or(self.params.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.params.max_tokens),
        };

        let started = Instant::now();
        let outcome = call_with_retry(
            self.model.as_ref(),
            &request,
            self.max_retries,
            self.backoff,
            parse_photo_report,
        )
        .await?;

        Ok(PhotoAnalysis {
            report: outcome.value,
            model: model_name,
            prompt_version: PHOTO_PROMPT_VERSION,
            latency_ms: started.elapsed().as_millis() as u64,
            cost_usd: estimate_photo_cost(image_urls.len()),
            attempts: outcome.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::model::{ScriptedChatModel, ScriptedResponse};
    use crate::pipeline::schema::tests::sample_photo_json;
    use std::time::Duration;

    fn client(model: Arc<ScriptedChatModel>) -> VisionAnalysisClient {
        VisionAnalysisClient::new(
            model,
            ModelParams {
                model: "gpt-4o".into(),
                temperature: 0.2,
                max_tokens: 1200,
                timeout_secs: 25,
            },
            2,
            BackoffPolicy::new(Duration::ZERO),
        )
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://img.example/{i}.jpg")).collect()
    }

    #[tokio::test]
    async fn zero_images_rejected_without_any_call() {
        let model = Arc::new(ScriptedChatModel::always_ok(sample_photo_json()));
        let err = client(model.clone())
            .analyze(&[], &ClinicalContext::default(), None, &AnalysisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::ImageCount(0)));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn six_images_rejected_without_any_call() {
        let model = Arc::new(ScriptedChatModel::always_ok(sample_photo_json()));
        let err = client(model.clone())
            .analyze(&urls(6), &ClinicalContext::default(), None, &AnalysisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::ImageCount(6)));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn successful_analysis_carries_provenance() {
        let model = Arc::new(ScriptedChatModel::always_ok(sample_photo_json()));
        let analysis = client(model.clone())
            .analyze(&urls(2), &ClinicalContext::default(), None, &AnalysisOptions::default())
            .await
            .unwrap();
        assert_eq!(analysis.model, "gpt-4o");
        assert_eq!(analysis.prompt_version, "derm-v1");
        assert_eq!(analysis.attempts, 1);
        assert!((analysis.cost_usd - 0.025).abs() < 1e-9);

        let recorded = model.recorded_requests();
        assert_eq!(recorded[0].image_urls.len(), 2);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_then_succeeds() {
        let model = Arc::new(ScriptedChatModel::fail_times_then(
            1,
            ScriptedResponse::Timeout,
            sample_photo_json(),
        ));
        let analysis = client(model.clone())
            .analyze(&urls(1), &ClinicalContext::default(), None, &AnalysisOptions::default())
            .await
            .unwrap();
        assert_eq!(analysis.attempts, 2);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn options_override_the_configured_model() {
        let model = Arc::new(ScriptedChatModel::always_ok(sample_photo_json()));
        let options = AnalysisOptions {
            model: Some("gpt-4o-mini".into()),
            temperature: Some(0.7),
            max_tokens: None,
        };
        let analysis = client(model.clone())
            .analyze(&urls(1), &ClinicalContext::default(), None, &options)
            .await
            .unwrap();
        assert_eq!(analysis.model, "gpt-4o-mini");

        let recorded = model.recorded_requests();
        assert_eq!(recorded[0].model, "gpt-4o-mini");
        assert!((recorded[0].temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(recorded[0].max_tokens, 1200);
    }
}
