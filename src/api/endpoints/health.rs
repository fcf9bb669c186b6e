//! Liveness check and root service documentation.

use axum::Json;
use serde_json::{json, Value};

use crate::api::error::SUPPORTED_IMAGE_FORMATS;
use crate::api::types::DISCLAIMER;
use crate::pipeline::vision::MAX_IMAGES;

/// GET /api/health
pub async fn check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET / — self-describing payload for anyone hitting the bare origin.
pub async fn service_doc() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "AI-assisted dermatology pre-diagnosis API",
        "endpoints": {
            "POST /api/photo-analysis": "analyse clinical photos (anonymous allowed)",
            "GET /api/photo-analysis": "list photo reports for a consultation",
            "POST /api/diagnosis": "synthesise a differential diagnosis (auth required)",
            "GET /api/diagnosis": "list diagnosis reports for a consultation",
            "GET /api/reports": "per-consultation report summary",
            "GET /api/health": "liveness check",
        },
        "limits": {
            "max_images_per_request": MAX_IMAGES,
            "supported_formats": SUPPORTED_IMAGE_FORMATS,
        },
        "disclaimer": DISCLAIMER,
    }))
}
