//! Photo analysis endpoint.
//!
//! The only route that accepts anonymous callers: a patient can get a
//! pre-diagnosis before signing up. Anonymous requests never touch the
//! store; any consultation references they carry are ignored.

use std::time::Instant;

use axum::extract::{Extension, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{authorize_consultation, ApiContext, AuthContext, DISCLAIMER};
use crate::pipeline::context::ClinicalContext;
use crate::pipeline::mock::generate_mock_report;
use crate::pipeline::prompt::PHOTO_PROMPT_VERSION;
use crate::pipeline::vision::{AnalysisOptions, AnalysisSource, MAX_IMAGES, MIN_IMAGES};
use crate::pipeline::AiError;
use crate::store::types::{Consultation, NewPhotoReport};

#[derive(Debug, Deserialize)]
pub struct PhotoAnalysisRequest {
    /// Direct HTTPS image URLs. Mutually exclusive with `photo_storage_paths`.
    #[serde(default)]
    pub photo_urls: Option<Vec<String>>,
    /// Object-storage paths, signed server-side before the model call.
    #[serde(default)]
    pub photo_storage_paths: Option<Vec<String>>,
    #[serde(default)]
    pub consultation_id: Option<Uuid>,
    /// Inline clinical context; overrides the consultation record.
    #[serde(default)]
    pub context: Option<ClinicalContext>,
    #[serde(default)]
    pub options: AnalysisOptions,
}

fn example_payload() -> Value {
    json!({
        "photo_urls": ["https://example.com/photos/lesion.jpg"],
        "context": {
            "chief_complaint": "new pigmented lesion on the forearm",
            "symptoms": ["itching"],
            "duration": "3 weeks"
        }
    })
}

/// Resolve the request's image references to fetchable URLs.
///
/// Exactly one source must be present. Storage paths are converted to
/// short-lived signed URLs; direct URLs must be HTTPS.
fn resolve_image_urls(
    ctx: &ApiContext,
    request: &PhotoAnalysisRequest,
) -> Result<Vec<String>, ApiError> {
    let urls = request.photo_urls.as_deref().unwrap_or_default();
    let paths = request.photo_storage_paths.as_deref().unwrap_or_default();

    if urls.is_empty() == paths.is_empty() {
        return Err(ApiError::BadRequestWithExample {
            message: "provide exactly one of photo_urls or photo_storage_paths".to_string(),
            example: example_payload(),
        });
    }

    let count = urls.len().max(paths.len());
    if !(MIN_IMAGES..=MAX_IMAGES).contains(&count) {
        return Err(AiError::ImageCount(count).into());
    }

    if !urls.is_empty() {
        for url in urls {
            if !url.starts_with("https://") {
                return Err(ApiError::BadRequest(format!(
                    "photo_urls must use https://, got `{url}`"
                )));
            }
        }
        return Ok(urls.to_vec());
    }

    paths
        .iter()
        .map(|path| {
            ctx.storage
                .sign_url(path, ctx.config.signed_url_ttl_secs)
                .map_err(ApiError::from)
        })
        .collect()
}

/// Load the consultation the caller referenced, enforcing ownership.
///
/// Anonymous callers get `None` even when an id was sent.
fn resolve_consultation(
    ctx: &ApiContext,
    auth: &AuthContext,
    consultation_id: Option<&Uuid>,
) -> Result<Option<Consultation>, ApiError> {
    if !auth.is_authenticated() {
        return Ok(None);
    }
    let Some(id) = consultation_id else {
        return Ok(None);
    };
    let consultation = ctx
        .store
        .get_consultation(id)?
        .ok_or_else(|| ApiError::NotFound("consultation".to_string()))?;
    authorize_consultation(auth, &consultation)?;
    Ok(Some(consultation))
}

/// POST /api/photo-analysis
pub async fn analyze(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<PhotoAnalysisRequest>,
) -> Result<Json<Value>, ApiError> {
    let image_urls = resolve_image_urls(&ctx, &request)?;
    let consultation = resolve_consultation(&ctx, &auth, request.consultation_id.as_ref())?;

    let clinical = match (&request.context, &consultation) {
        (Some(context), _) => context.clone(),
        (None, Some(consultation)) => ClinicalContext::from_consultation(consultation),
        (None, None) => ClinicalContext::default(),
    };
    let clinical_text = match &consultation {
        Some(consultation) => ctx
            .store
            .latest_state(&consultation.id)?
            .map(|state| state.clinical_text),
        None => None,
    };

    let started = Instant::now();
    let (report, source, model) = match ctx
        .vision
        .analyze(&image_urls, &clinical, clinical_text.as_ref(), &request.options)
        .await
    {
        Ok(analysis) => (analysis.report, AnalysisSource::Model, analysis.model),
        Err(err) if err.is_retryable() => {
            tracing::warn!(error = %err, "vision analysis exhausted retries, using mock report");
            (
                generate_mock_report(&clinical),
                AnalysisSource::Mock,
                "mock".to_string(),
            )
        }
        Err(err) => return Err(err.into()),
    };
    let latency_ms = started.elapsed().as_millis() as u64;
    let cost_usd = match source {
        AnalysisSource::Model => crate::pipeline::cost::estimate_photo_cost(image_urls.len()),
        AnalysisSource::Mock => 0.0,
    };

    // Persistence is best-effort: the caller still gets the report when
    // the insert fails.
    let mut report_id = None;
    let mut saved = false;
    if let Some(consultation) = &consultation {
        let input_photos = request
            .photo_storage_paths
            .clone()
            .or(request.photo_urls.clone())
            .unwrap_or_default();
        match ctx.store.insert_photo_report(NewPhotoReport {
            consultation_id: consultation.id,
            model: model.clone(),
            prompt_version: PHOTO_PROMPT_VERSION.to_string(),
            input_photos,
            report: report.clone(),
            latency_ms,
            cost_usd,
        }) {
            Ok(stored) => {
                report_id = Some(stored.id);
                saved = true;
            }
            Err(err) => {
                tracing::warn!(error = %err, "photo report not persisted");
            }
        }
    }

    Ok(Json(json!({
        "success": true,
        "analysis": report,
        "metadata": {
            "report_id": report_id,
            "source": source,
            "model": model,
            "prompt_version": PHOTO_PROMPT_VERSION,
            "latency_ms": latency_ms,
            "estimated_cost_usd": cost_usd,
            "images_analyzed": image_urls.len(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "saved_to_database": saved,
            "user_authenticated": auth.is_authenticated(),
            "is_service": auth.is_service(),
            "disclaimer": DISCLAIMER,
        }
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub consultation_id: Uuid,
}

/// GET /api/photo-analysis?consultation_id=...
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let consultation = ctx
        .store
        .get_consultation(&query.consultation_id)?
        .ok_or_else(|| ApiError::NotFound("consultation".to_string()))?;
    authorize_consultation(&auth, &consultation)?;

    let reports = ctx.store.list_photo_reports(&consultation.id)?;
    Ok(Json(json!({
        "success": true,
        "count": reports.len(),
        "reports": reports,
    })))
}
