//! Structured-output contract for AI-generated reports.
//!
//! This module is the single source of truth for what counts as a valid
//! report: both the live model path and the mock fallback must produce
//! objects that pass [`validate_photo_report`] / [`validate_diagnosis_report`].
//!
//! The only repair attempted on model output is trimming surrounding
//! non-JSON text (code fences, prose) before parsing. Anything beyond
//! that is a validation failure with the offending field path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of differential-diagnosis entries per report.
pub const MAX_DIFFERENTIALS: usize = 3;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("model response contains no JSON object")]
    NoJson,

    #[error("JSON parsing failed: {0}")]
    Json(String),

    #[error("invalid value at `{path}`: {message}")]
    Constraint { path: String, message: String },
}

impl SchemaError {
    fn constraint(path: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Constraint {
            path: path.into(),
            message: message.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Report types
// ═══════════════════════════════════════════════════════════

/// Relative likelihood of one differential-diagnosis hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Likelihood {
    High,
    Moderate,
    Low,
}

/// Escalation level recommended by an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Immediate,
    Urgent,
    Routine,
    Monitoring,
}

/// One lesion observed on the submitted photos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesion {
    /// Anatomical location.
    pub location: String,
    /// Morphological description (macule, papule, plaque, ...).
    pub morphology: String,
    /// Approximate size in millimetres, when assessable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mm: Option<f64>,
    /// Border description (sharp, blurred, irregular).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borders: Option<String>,
    /// Notable features (pigmentation, scaling, ulceration, ...).
    #[serde(default)]
    pub features: Vec<String>,
}

/// One hypothesis in a photo report's differential diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialDiagnosis {
    pub condition: String,
    pub likelihood: Likelihood,
    pub reasoning: String,
}

/// Validated result of one photo analysis. Immutable once persisted;
/// a new analysis produces a new report, never an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoAnalysisReport {
    #[serde(default)]
    pub lesions: Vec<Lesion>,
    /// At most [`MAX_DIFFERENTIALS`] hypotheses, ordered by likelihood.
    pub diagnostic_diff: Vec<DifferentialDiagnosis>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub recommended_exams: Vec<String>,
    #[serde(default)]
    pub treatment_hints: Vec<String>,
    pub urgency: Urgency,
    /// Analysis confidence in [0, 1].
    pub confidence_score: f64,
    /// Free-text clinical recommendation.
    pub recommendation: String,
}

/// One entry of a global diagnosis differential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisDifferential {
    pub label: String,
    pub likelihood: Likelihood,
}

/// Validated result of one diagnosis synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub diagnostic_diff: Vec<DiagnosisDifferential>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub recommended_exams: Vec<String>,
    #[serde(default)]
    pub treatment_hints: Vec<String>,
    /// Safety net: reassessment criteria for the patient.
    pub safety_net: String,
    /// Synthetic clinical reasoning behind the differential.
    pub explainability: String,
}

// ═══════════════════════════════════════════════════════════
// Parsing and validation
// ═══════════════════════════════════════════════════════════

/// Extract the JSON object from a raw model response.
///
/// Accepts a bare object, an object wrapped in ```json fences, or an
/// object surrounded by prose. Returns the JSON slice untouched.
pub fn extract_json(raw: &str) -> Result<&str, SchemaError> {
    let trimmed = raw.trim();

    // Fenced block takes priority — models often echo prose around it.
    if let Some(fence_start) = trimmed.find("```json") {
        let content_start = fence_start + 7;
        if let Some(fence_end) = trimmed[content_start..].find("```") {
            return Ok(trimmed[content_start..content_start + fence_end].trim());
        }
    }

    let start = trimmed.find('{').ok_or(SchemaError::NoJson)?;
    let end = trimmed.rfind('}').ok_or(SchemaError::NoJson)?;
    if end < start {
        return Err(SchemaError::NoJson);
    }
    Ok(&trimmed[start..=end])
}

/// Parse and validate a photo analysis report from raw model output.
pub fn parse_photo_report(raw: &str) -> Result<PhotoAnalysisReport, SchemaError> {
    let json = extract_json(raw)?;
    let report: PhotoAnalysisReport =
        serde_json::from_str(json).map_err(|e| SchemaError::Json(e.to_string()))?;
    validate_photo_report(&report)?;
    Ok(report)
}

/// Parse and validate a diagnosis report from raw model output.
pub fn parse_diagnosis_report(raw: &str) -> Result<DiagnosisReport, SchemaError> {
    let json = extract_json(raw)?;
    let report: DiagnosisReport =
        serde_json::from_str(json).map_err(|e| SchemaError::Json(e.to_string()))?;
    validate_diagnosis_report(&report)?;
    Ok(report)
}

/// Value constraints for a photo analysis report.
///
/// Type and enum membership are already enforced by deserialization;
/// this checks numeric ranges and list bounds.
pub fn validate_photo_report(report: &PhotoAnalysisReport) -> Result<(), SchemaError> {
    if !(0.0..=1.0).contains(&report.confidence_score) {
        return Err(SchemaError::constraint(
            "confidence_score",
            format!("{} outside [0, 1]", report.confidence_score),
        ));
    }
    if report.diagnostic_diff.len() > MAX_DIFFERENTIALS {
        return Err(SchemaError::constraint(
            "diagnostic_diff",
            format!(
                "{} entries, maximum {MAX_DIFFERENTIALS}",
                report.diagnostic_diff.len()
            ),
        ));
    }
    for (i, lesion) in report.lesions.iter().enumerate() {
        if let Some(size) = lesion.size_mm {
            if size < 0.0 || !size.is_finite() {
                return Err(SchemaError::constraint(
                    format!("lesions[{i}].size_mm"),
                    format!("{size} is not a non-negative number"),
                ));
            }
        }
        if lesion.location.trim().is_empty() {
            return Err(SchemaError::constraint(
                format!("lesions[{i}].location"),
                "must not be empty",
            ));
        }
    }
    Ok(())
}

/// Value constraints for a diagnosis report.
pub fn validate_diagnosis_report(report: &DiagnosisReport) -> Result<(), SchemaError> {
    for (i, entry) in report.diagnostic_diff.iter().enumerate() {
        if entry.label.trim().is_empty() {
            return Err(SchemaError::constraint(
                format!("diagnostic_diff[{i}].label"),
                "must not be empty",
            ));
        }
    }
    if report.safety_net.trim().is_empty() {
        return Err(SchemaError::constraint("safety_net", "must not be empty"));
    }
    Ok(())
}
