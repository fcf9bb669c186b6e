//! Persisted entities as seen by the orchestration pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::schema::{DiagnosisReport, PhotoAnalysisReport};

/// A consultation row. Owned by the relational store; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Assigned clinician, when one has picked up the consultation.
    pub doctor_id: Option<Uuid>,
    pub patient_age: Option<u32>,
    pub patient_gender: Option<String>,
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub medical_history: Vec<String>,
    pub current_medications: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    pub consultation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Consultation {
    /// Whether `user_id` is entitled to this consultation's data.
    pub fn is_party(&self, user_id: &Uuid) -> bool {
        &self.patient_id == user_id || self.doctor_id.as_ref() == Some(user_id)
    }
}

/// Free-form clinical-text snapshot tied to a consultation.
/// The most recent one serves as default context input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationState {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub clinical_text: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Unpersisted photo report handed to the gateway for insertion.
#[derive(Debug, Clone)]
pub struct NewPhotoReport {
    pub consultation_id: Uuid,
    pub model: String,
    pub prompt_version: String,
    pub input_photos: Vec<String>,
    pub report: PhotoAnalysisReport,
    pub latency_ms: u64,
    pub cost_usd: f64,
}

/// A stored photo report. Immutable: superseded by new rows, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPhotoReport {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub model: String,
    pub prompt_version: String,
    pub input_photos: Vec<String>,
    pub report: PhotoAnalysisReport,
    pub latency_ms: u64,
    pub cost_usd: f64,
    pub created_at: DateTime<Utc>,
}

/// References to the inputs a diagnosis report was derived from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputRefs {
    pub state_id: Option<Uuid>,
    pub photo_report_id: Option<Uuid>,
}

/// Unpersisted diagnosis report handed to the gateway for insertion.
#[derive(Debug, Clone)]
pub struct NewDiagnosisReport {
    pub consultation_id: Uuid,
    pub model: String,
    pub prompt_version: String,
    pub input_refs: InputRefs,
    pub report: DiagnosisReport,
    pub latency_ms: u64,
    pub cost_usd: f64,
}

/// A stored diagnosis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDiagnosisReport {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub model: String,
    pub prompt_version: String,
    pub input_refs: InputRefs,
    pub report: DiagnosisReport,
    pub latency_ms: u64,
    pub cost_usd: f64,
    pub created_at: DateTime<Utc>,
}

/// An authenticated human user resolved from a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: Uuid,
}
