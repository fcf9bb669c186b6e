//! Diagnosis synthesis endpoint. Authenticated callers only; every
//! generated report is persisted before it is returned.

use axum::extract::{Extension, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{authorize_consultation, ApiContext, AuthContext, DISCLAIMER};
use crate::pipeline::context::ContextAssembler;
use crate::store::types::{InputRefs, NewDiagnosisReport};

#[derive(Debug, Deserialize)]
pub struct DiagnosisRequest {
    pub consultation_id: Uuid,
    /// Explicit clinical-state snapshot to synthesise from.
    #[serde(default)]
    pub state_id: Option<Uuid>,
    /// Explicit photo report to synthesise from.
    #[serde(default)]
    pub photo_report_id: Option<Uuid>,
}

/// POST /api/diagnosis
pub async fn synthesize(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<DiagnosisRequest>,
) -> Result<Json<Value>, ApiError> {
    if !auth.is_authenticated() {
        return Err(ApiError::Unauthorized);
    }

    let consultation = ctx
        .store
        .get_consultation(&request.consultation_id)?
        .ok_or_else(|| ApiError::NotFound("consultation".to_string()))?;
    authorize_consultation(&auth, &consultation)?;

    let assembler = ContextAssembler::new(ctx.store.as_ref());
    let assembled = assembler.assemble(
        &consultation,
        request.state_id.as_ref(),
        request.photo_report_id.as_ref(),
    )?;

    let synthesis = ctx.synthesizer.synthesize(&assembled).await?;

    // Diagnosis reports feed clinical follow-up, so an unpersisted report
    // is a failure, not a degraded success.
    let stored = ctx.store.insert_diagnosis_report(NewDiagnosisReport {
        consultation_id: consultation.id,
        model: synthesis.model.clone(),
        prompt_version: synthesis.prompt_version.to_string(),
        input_refs: InputRefs {
            state_id: request.state_id,
            photo_report_id: request.photo_report_id,
        },
        report: synthesis.report.clone(),
        latency_ms: synthesis.latency_ms,
        cost_usd: synthesis.cost_usd,
    })?;

    tracing::info!(
        consultation_id = %consultation.id,
        report_id = %stored.id,
        model = %synthesis.model,
        latency_ms = synthesis.latency_ms,
        attempts = synthesis.attempts,
        "diagnosis report generated"
    );

    Ok(Json(json!({
        "success": true,
        "diagnosis_report_id": stored.id,
        "report": stored.report,
        "metadata": {
            "model": stored.model,
            "prompt_version": stored.prompt_version,
            "latency_ms": stored.latency_ms,
            "cost_usd": stored.cost_usd,
            "data_sources": assembled.sources,
            "timestamp": stored.created_at.to_rfc3339(),
            "disclaimer": DISCLAIMER,
        }
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub consultation_id: Uuid,
}

/// GET /api/diagnosis?consultation_id=...
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

    let reports = ctx.store.list_diagnosis_reports(&consultation.id)?;
    Ok(Json(json!({
        "success": true,
        "count": reports.len(),
        "reports": reports,
    })))
}
