//! Deterministic fallback report generator.
//!
//! Invoked only after the vision client has exhausted its retries. Pure
//! data transformation — no I/O, no randomness — so it can never fail:
//! this is the photo pipeline's availability guarantee. Every report it
//! produces satisfies the schema validator, carries a deliberately low
//! confidence score, and says so in its recommendation.

use std::sync::LazyLock;

use regex::Regex;

use super::context::ClinicalContext;
use super::schema::{
    DifferentialDiagnosis, Lesion, Likelihood, PhotoAnalysisReport, Urgency,
};

/// Fixed confidence for mock reports, signalling "not a real analysis".
pub const MOCK_CONFIDENCE: f64 = 0.3;

/// Symptom wording that forces red flags and urgency escalation.
struct AlarmPattern {
    regex: Regex,
    red_flag: &'static str,
}

static ALARM_PATTERNS: LazyLock<Vec<AlarmPattern>> = LazyLock::new(|| {
    let pattern = |re: &str, red_flag: &'static str| AlarmPattern {
        regex: Regex::new(re).expect("alarm pattern must compile"),
        red_flag,
    };
    vec![
        pattern(
            r"(?i)\brapid(?:ly)?\s+(?:grow|chang|enlarg|evol)|\bgrowing\s+(?:fast|quickly)\b",
            "Rapid lesion evolution reported by the patient",
        ),
        pattern(
            r"(?i)\bbleed",
            "Reported bleeding from the lesion",
        ),
        pattern(
            r"(?i)\bpain(?:ful)?\b|\bdouleur\b",
            "Lesion described as painful",
        ),
        pattern(
            r"(?i)\bspread(?:ing)?\b|\bextending\b",
            "Lesion reported as spreading",
        ),
    ]
});

/// Collect the red flags triggered by the context's symptom wording.
fn triggered_red_flags(context: &ClinicalContext) -> Vec<String> {
    let mut corpus = context.symptoms.join(" ");
    if let Some(complaint) = &context.chief_complaint {
        corpus.push(' ');
        corpus.push_str(complaint);
    }
    if let Some(duration) = &context.duration {
        corpus.push(' ');
        corpus.push_str(duration);
    }

    ALARM_PATTERNS
        .iter()
        .filter(|p| p.regex.is_match(&corpus))
        .map(|p| p.red_flag.to_string())
        .collect()
}

/// Synthesize a schema-valid low-confidence report from context alone.
///
/// Deterministic: identical context yields an identical report.
pub fn generate_mock_report(context: &ClinicalContext) -> PhotoAnalysisReport {
    let red_flags = triggered_red_flags(context);
    let urgency = if red_flags.is_empty() {
        Urgency::Routine
    } else {
        Urgency::Urgent
    };

    let (morphology, features) = if context.is_empty() {
        (
            "Skin lesion, clinical evaluation required".to_string(),
            vec!["No clinical description available".to_string()],
        )
    } else {
        let mut features: Vec<String> = context.symptoms.clone();
        if features.is_empty() {
            features.push("Reported in consultation context".to_string());
        }
        (
            context
                .chief_complaint
                .clone()
                .unwrap_or_else(|| "Skin lesion as described by the patient".to_string()),
            features,
        )
    };

    let recommendation = if red_flags.is_empty() {
        "Automated image analysis was unavailable; this placeholder report is \
         based on the declared context only. A clinical examination is required \
         to characterise the lesion."
    } else {
        "Automated image analysis was unavailable and the declared symptoms \
         include alarm features. An urgent clinical examination is recommended."
    };

    PhotoAnalysisReport {
        lesions: vec![Lesion {
            location: "As shown on the submitted photographs".to_string(),
            morphology,
            size_mm: None,
            borders: None,
            features,
        }],
        diagnostic_diff: vec![DifferentialDiagnosis {
            condition: "Undetermined dermatosis — clinical evaluation required".to_string(),
            likelihood: Likelihood::Low,
            reasoning: "Generated without image analysis; based on declared context only."
                .to_string(),
        }],
        red_flags,
        recommended_exams: vec!["In-person dermatological examination".to_string()],
        treatment_hints: vec![],
        urgency,
        confidence_score: MOCK_CONFIDENCE,
        recommendation: recommendation.to_string(),
    }
}
