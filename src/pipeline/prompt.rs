//! Prompt templates for both model calls.
//!
//! Prompt versions are persisted with every report so a stored report can
//! be traced back to the exact instruction template that produced it.
//! Bump the version whenever a template changes in a way that could alter
//! model output.

use crate::pipeline::context::{AssembledContext, ClinicalContext};

/// Version tag stored with photo analysis reports.
pub const PHOTO_PROMPT_VERSION: &str = "derm-v1";

/// Version tag stored with diagnosis reports.
pub const DIAGNOSIS_PROMPT_VERSION: &str = "dx-v1";

pub const DERMATOLOGY_SYSTEM_PROMPT: &str = r#"
You are an expert dermatologist with 20 years of clinical experience.

Analyse the supplied clinical photographs and produce a structured JSON report.

RULES — ABSOLUTE, NO EXCEPTIONS:
1. Never state a definitive diagnosis, only differential hypotheses.
2. List at most 3 differential hypotheses, ordered by likelihood.
3. Identify every potential red flag (asymmetry, irregular borders, multiple
   colours, diameter > 6mm, rapid evolution, ulceration, bleeding).
4. Be precise in morphological descriptions (macule, papule, plaque, nodule...).
5. Always recommend clinical confirmation by a physician.
6. Base the confidence score on image quality and diagnostic ambiguity.
7. Output a single JSON object and nothing else.

OUTPUT FORMAT — respond with exactly this JSON structure:
{
  "lesions": [
    {
      "location": "anatomical location",
      "morphology": "morphological description",
      "size_mm": 0.0,
      "borders": "border description or null",
      "features": ["observed feature"]
    }
  ],
  "diagnostic_diff": [
    {"condition": "hypothesis", "likelihood": "high | moderate | low",
     "reasoning": "clinical reasoning"}
  ],
  "red_flags": ["identified alarm sign"],
  "recommended_exams": ["suggested complementary exam"],
  "treatment_hints": ["initial therapeutic option"],
  "urgency": "immediate | urgent | routine | monitoring",
  "confidence_score": 0.0,
  "recommendation": "free-text clinical recommendation"
}
"#;

pub const DIAGNOSIS_SYSTEM_PROMPT: &str = r#"
You are an expert clinician specialised in dermatology.

You receive a structured bundle containing the patient's history, current
treatments, clinical notes, and an AI photo-analysis report when available.
Produce a structured JSON differential diagnosis that synthesises all of it.

RULES — ABSOLUTE, NO EXCEPTIONS:
1. Decision support only, never a definitive diagnosis.
2. Correlate clinical data with the photo analysis; flag inconsistencies.
3. Rank the differential by likelihood.
4. Propose oriented complementary exams and initial treatment options.
5. Define a safety net: concrete criteria for reassessment.
6. Explain the clinical reasoning.
7. Output a single JSON object and nothing else.

OUTPUT FORMAT — respond with exactly this JSON structure:
{
  "diagnostic_diff": [{"label": "diagnosis", "likelihood": "high | moderate | low"}],
  "red_flags": ["clinical alarm sign"],
  "recommended_exams": ["recommended exam"],
  "treatment_hints": ["initial treatment option"],
  "safety_net": "reassessment criteria",
  "explainability": "synthetic clinical reasoning"
}
"#;

fn join_or(values: &[String], fallback: &str) -> String {
    if values.is_empty() {
        fallback.to_string()
    } else {
        values.join(", ")
    }
}

fn text_or<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    value.as_deref().unwrap_or(fallback)
}

/// User-facing prompt for the photo analysis call. Image references are
/// attached as separate content parts, not embedded here.
pub fn build_photo_prompt(
    context: &ClinicalContext,
    clinical_text: Option<&serde_json::Value>,
) -> String {
    let age = context
        .patient_age
        .map(|a| format!("{a} years"))
        .unwrap_or_else(|| "Not specified".to_string());

    let mut prompt = format!(
        "Clinical context:\n\
         Patient: {age}, {gender}\n\
         Chief complaint: {complaint}\n\
         Symptoms: {symptoms}\n\
         Duration: {duration}\n\
         Medical history: {history}\n\
         Current medications: {medications}\n\
         Allergies: {allergies}\n",
        gender = text_or(&context.patient_gender, "Not specified"),
        complaint = text_or(&context.chief_complaint, "Not specified"),
        symptoms = join_or(&context.symptoms, "Not specified"),
        duration = text_or(&context.duration, "Not specified"),
        history = join_or(&context.medical_history, "None reported"),
        medications = text_or(&context.current_medications, "None"),
        allergies = join_or(&context.allergies, "None reported"),
    );

    if let Some(text) = clinical_text {
        if !text.is_null() {
            prompt.push_str(&format!("\nPrior clinical notes:\n{text}\n"));
        }
    }

    prompt.push_str("\nAnalyse the following clinical photographs and provide a structured differential report:");
    prompt
}

/// Single textual prompt for the diagnosis synthesis call.
pub fn build_diagnosis_prompt(context: &AssembledContext) -> String {
    let clinical_text = context
        .clinical_text
        .as_ref()
        .map(|v| serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()))
        .unwrap_or_else(|| "Not available".to_string());

    let photo_report = context
        .photo_findings
        .as_ref()
        .and_then(|r| serde_json::to_string_pretty(r).ok())
        .unwrap_or_else(|| "Not available".to_string());

    let consultation = serde_json::to_string_pretty(&context.clinical)
        .unwrap_or_else(|_| "{}".to_string());

    format!(
        "Complete clinical data:\n\n\
         ANAMNESIS:\n{clinical_text}\n\n\
         CONSULTATION CONTEXT:\n{consultation}\n\n\
         PHOTO ANALYSIS REPORT:\n{photo_report}\n\n\
         Synthesise this information and provide a structured differential \
         diagnosis with recommendations."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_prompt_embeds_context_fields() {
        let ctx = ClinicalContext {
            patient_age: Some(35),
            patient_gender: Some("F".into()),
            chief_complaint: Some("spreading redness".into()),
            symptoms: vec!["itching".into(), "burning".into()],
            duration: Some("2 weeks".into()),
            medical_history: vec!["eczema".into()],
            current_medications: Some("cetirizine".into()),
            allergies: vec!["latex".into()],
        };
        let prompt = build_photo_prompt(&ctx, None);
        assert!(prompt.contains("35 years"));
        assert!(prompt.contains("spreading redness"));
        assert!(prompt.contains("itching, burning"));
        assert!(prompt.contains("2 weeks"));
        assert!(prompt.contains("cetirizine"));
        assert!(prompt.contains("latex"));
    }

    #[test]
    fn photo_prompt_falls_back_on_empty_context() {
        let prompt = build_photo_prompt(&ClinicalContext::default(), None);
        assert!(prompt.contains("Not specified"));
        assert!(prompt.contains("None reported"));
        assert!(!prompt.contains("Prior clinical notes"));
    }

    #[test]
    fn photo_prompt_appends_clinical_notes_when_present() {
        let notes = serde_json::json!({"exam": "vesicles on erythematous base"});
        let prompt = build_photo_prompt(&ClinicalContext::default(), Some(&notes));
        assert!(prompt.contains("Prior clinical notes"));
        assert!(prompt.contains("vesicles"));
    }

    #[test]
    fn diagnosis_prompt_marks_missing_sources() {
        let prompt = build_diagnosis_prompt(&AssembledContext::default());
        assert!(prompt.contains("ANAMNESIS"));
        assert!(prompt.contains("Not available"));
    }

    #[test]
    fn system_prompts_enforce_structured_output() {
        assert!(DERMATOLOGY_SYSTEM_PROMPT.contains("at most 3 differential"));
        assert!(DERMATOLOGY_SYSTEM_PROMPT.contains("confidence_score"));
        assert!(DIAGNOSIS_SYSTEM_PROMPT.contains("safety_net"));
    }

    #[test]
    fn prompt_versions_are_stable_tags() {
        assert_eq!(PHOTO_PROMPT_VERSION, "derm-v1");
        assert_eq!(DIAGNOSIS_PROMPT_VERSION, "dx-v1");
    }
}
