//! Per-consultation report summary, for dashboards.

use axum::extract::{Extension, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{authorize_consultation, ApiContext, AuthContext};

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub consultation_id: Uuid,
}

/// GET /api/reports?consultation_id=...
pub async fn summary(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Value>, ApiError> {
    let consultation = ctx
        .store
        .get_consultation(&query.consultation_id)?
        .ok_or_else(|| ApiError::NotFound("consultation".to_string()))?;
    authorize_consultation(&auth, &consultation)?;

    let photo_reports = ctx.store.list_photo_reports(&consultation.id)?;
    let diagnosis_reports = ctx.store.list_diagnosis_reports(&consultation.id)?;

    let total_cost_usd: f64 = photo_reports.iter().map(|r| r.cost_usd).sum::<f64>()
        + diagnosis_reports.iter().map(|r| r.cost_usd).sum::<f64>();

    let latency_sum: u64 = photo_reports.iter().map(|r| r.latency_ms).sum::<u64>()
        + diagnosis_reports.iter().map(|r| r.latency_ms).sum::<u64>();
    let report_count = photo_reports.len() + diagnosis_reports.len();
    let avg_latency_ms = if report_count > 0 {
        Some(latency_sum / report_count as u64)
    } else {
        None
    };

    Ok(Json(json!({
        "success": true,
        "consultation_id": consultation.id,
        "summary": {
            "photo_report_count": photo_reports.len(),
            "diagnosis_report_count": diagnosis_reports.len(),
            "total_cost_usd": total_cost_usd,
            "avg_latency_ms": avg_latency_ms,
            "latest_photo_report_at": photo_reports.first().map(|r| r.created_at.to_rfc3339()),
            "latest_diagnosis_report_at": diagnosis_reports.first().map(|r| r.created_at.to_rfc3339()),
        },
        "photo_reports": photo_reports,
        "diagnosis_reports": diagnosis_reports,
    })))
}
