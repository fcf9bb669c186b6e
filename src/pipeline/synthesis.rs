//! Diagnosis synthesis pipeline: one text-only model call over the
//! assembled multi-source context. No mock fallback here; an exhausted
//! retry loop surfaces to the caller as the upstream failure it is.

use std::sync::Arc;
use std::time::Instant;

use super::context::AssembledContext;
use super::cost::DIAGNOSIS_COST_PER_REQUEST_USD;
use super::model::{ChatModel, ModelRequest};
use super::prompt::{build_diagnosis_prompt, DIAGNOSIS_PROMPT_VERSION, DIAGNOSIS_SYSTEM_PROMPT};
use super::retry::{call_with_retry, BackoffPolicy};
use super::schema::{parse_diagnosis_report, DiagnosisReport};
use super::AiError;
use crate::config::ModelParams;

/// A completed diagnosis synthesis with its provenance.
#[derive(Debug, Clone)]
pub struct DiagnosisSynthesis {
    pub report: DiagnosisReport,
    pub model: String,
    pub prompt_version: &'static str,
    pub latency_ms: u64,
    pub cost_usd: f64,
    pub attempts: u32,
}

/// Text model front end for the diagnosis endpoint.
pub struct DiagnosisSynthesizer {
    model: Arc<dyn ChatModel>,
    params: ModelParams,
    max_retries: u32,
    backoff: BackoffPolicy,
}

impl DiagnosisSynthesizer {
    pub fn new(
        model: Arc<dyn ChatModel>,
        params: ModelParams,
        max_retries: u32,
        backoff: BackoffPolicy,
    ) -> Self {
        Self { model, params, max_retries, backoff }
    }

    /// Produce a structured differential from the assembled context.
    pub async fn synthesize(
        &self,
        context: &AssembledContext,
    ) -> Result<DiagnosisSynthesis, AiError> {
        let request = ModelRequest {
            model: self.params.model.clone(),
            system: DIAGNOSIS_SYSTEM_PROMPT.to_string(),
            user_text: build_diagnosis_prompt(context),
            image_urls: vec![],
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
        };

        let started = Instant::now();
        let outcome = call_with_retry(
            self.model.as_ref(),
            &request,
            self.max_retries,
            self.backoff,
            parse_diagnosis_report,
        )
        .await?;

        Ok(DiagnosisSynthesis {
            report: outcome.value,
            model: self.params.model.clone(),
            prompt_version: DIAGNOSIS_PROMPT_VERSION,
            latency_ms: started.elapsed().as_millis() as u64,
            cost_usd: DIAGNOSIS_COST_PER_REQUEST_USD,
            attempts: outcome.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::model::{ScriptedChatModel, ScriptedResponse};
    use std::time::Duration;

    pub(crate) fn sample_diagnosis_json() -> String {
        serde_json::json!({
            "diagnostic_diff": [
                {"label": "Psoriasis vulgaris", "likelihood": "high"},
                {"label": "Nummular eczema", "likelihood": "moderate"}
            ],
            "red_flags": [],
            "recommended_exams": ["skin biopsy if refractory to treatment"],
            "treatment_hints": ["topical corticosteroids", "emollients"],
            "safety_net": "Reassess within two weeks, sooner if lesions spread or blister.",
            "explainability": "Well-demarcated scaly plaques favour psoriasis over eczema."
        })
        .to_string()
    }

    fn synthesizer(model: Arc<ScriptedChatModel>) -> DiagnosisSynthesizer {
        DiagnosisSynthesizer::new(
            model,
            ModelParams {
                model: "gpt-4o-mini".into(),
                temperature: 0.2,
                max_tokens: 1500,
                timeout_secs: 20,
            },
            2,
            BackoffPolicy::new(Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn synthesis_carries_provenance() {
        let model = Arc::new(ScriptedChatModel::always_ok(sample_diagnosis_json()));
        let synthesis = synthesizer(model.clone())
            .synthesize(&AssembledContext::default())
            .await
            .unwrap();
        assert_eq!(synthesis.model, "gpt-4o-mini");
        assert_eq!(synthesis.prompt_version, "dx-v1");
        assert_eq!(synthesis.attempts, 1);
        assert!((synthesis.cost_usd - DIAGNOSIS_COST_PER_REQUEST_USD).abs() < 1e-9);
        assert_eq!(synthesis.report.diagnostic_diff.len(), 2);

        let recorded = model.recorded_requests();
        assert!(recorded[0].image_urls.is_empty());
        assert!(recorded[0].user_text.contains("ANAMNESIS"));
    }

    #[tokio::test]
    async fn malformed_answer_is_retried() {
        let model = Arc::new(ScriptedChatModel::new(vec![
            ScriptedResponse::Ok("no json here".into()),
            ScriptedResponse::Ok(sample_diagnosis_json()),
        ]));
        let synthesis = synthesizer(model.clone())
            .synthesize(&AssembledContext::default())
            .await
            .unwrap();
        assert_eq!(synthesis.attempts, 2);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_failure() {
        let model = Arc::new(ScriptedChatModel::always(ScriptedResponse::RateLimited));
        let err = synthesizer(model.clone())
            .synthesize(&AssembledContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::RateLimited { .. }));
        assert_eq!(model.calls(), 3);
    }
}
