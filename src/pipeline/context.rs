//! Clinical context assembly.
//!
//! [`ClinicalContext`] is ephemeral: reconstructed per request from the
//! caller's payload or from the consultation record, never persisted as
//! its own entity. Absent fields are first-class empty states, not errors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::schema::PhotoAnalysisReport;
use crate::store::gateway::ReportStore;
use crate::store::types::Consultation;
use crate::store::StoreError;

/// Normalized patient context fed into the prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalContext {
    pub patient_age: Option<u32>,
    pub patient_gender: Option<String>,
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    /// Duration / evolution of the complaint, free text.
    pub duration: Option<String>,
    #[serde(default)]
    pub medical_history: Vec<String>,
    pub current_medications: Option<String>,
    /// Callers send either a single string or a list here.
    #[serde(default, deserialize_with = "string_or_list")]
    pub allergies: Vec<String>,
}

impl ClinicalContext {
    /// Derive context from the consultation record's structured fields.
    pub fn from_consultation(consultation: &Consultation) -> Self {
        Self {
            patient_age: consultation.patient_age,
            patient_gender: consultation.patient_gender.clone(),
            chief_complaint: consultation
                .chief_complaint
                .clone()
                .or_else(|| consultation.consultation_reason.clone()),
            symptoms: consultation.symptoms.clone(),
            duration: None,
            medical_history: consultation.medical_history.clone(),
            current_medications: consultation.current_medications.clone(),
            allergies: consultation.allergies.clone(),
        }
    }

    /// True when nothing usable was supplied.
    pub fn is_empty(&self) -> bool {
        self.chief_complaint.is_none() && self.symptoms.is_empty()
    }
}

/// Accept `"penicillin"` and `["penicillin", "latex"]` alike.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<StringOrList>::deserialize(deserializer)? {
        None => vec![],
        Some(StringOrList::One(s)) if s.trim().is_empty() => vec![],
        Some(StringOrList::One(s)) => vec![s],
        Some(StringOrList::Many(list)) => list,
    })
}

/// Which sources contributed to an assembled context.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DataSources {
    pub consultation_data: bool,
    pub photo_analysis: bool,
    pub clinical_state: bool,
}

/// Everything the synthesizer (and the photo prompt) can draw on.
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub clinical: ClinicalContext,
    /// Free-form clinical text from the consultation state snapshot.
    pub clinical_text: Option<serde_json::Value>,
    /// Findings from a prior photo analysis.
    pub photo_findings: Option<PhotoAnalysisReport>,
    pub sources: DataSources,
}

/// Read-only gatherer of multi-source clinical context.
pub struct ContextAssembler<'a> {
    store: &'a dyn ReportStore,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(store: &'a dyn ReportStore) -> Self {
        Self { store }
    }

    /// Assemble context for a consultation.
    ///
    /// Resolution precedence:
    /// 1. an explicit `photo_report_id` loads that report's findings;
    /// 2. with no explicit references at all, the most recent photo report
    ///    and most recent clinical state serve as defaults;
    /// 3. an explicit `state_id` loads that snapshot's clinical text.
    ///
    /// Missing optional sources are omitted, never errors.
    pub fn assemble(
        &self,
        consultation: &Consultation,
        state_id: Option<&Uuid>,
        photo_report_id: Option<&Uuid>,
    ) -> Result<AssembledContext, StoreError> {
        let mut ctx = AssembledContext {
            clinical: ClinicalContext::from_consultation(consultation),
            sources: DataSources {
                consultation_data: true,
                ..DataSources::default()
            },
            ..AssembledContext::default()
        };

        if let Some(report_id) = photo_report_id {
            if let Some(stored) = self.store.get_photo_report(report_id, &consultation.id)? {
                ctx.photo_findings = Some(stored.report);
            }
        } else if state_id.is_none() {
            if let Some(stored) = self.store.latest_photo_report(&consultation.id)? {
                ctx.photo_findings = Some(stored.report);
            }
            if let Some(state) = self.store.latest_state(&consultation.id)? {
                ctx.clinical_text = Some(state.clinical_text);
            }
        }

        if let Some(state_id) = state_id {
            if let Some(state) = self.store.get_state(state_id, &consultation.id)? {
                ctx.clinical_text = Some(state.clinical_text);
            }
        }

        ctx.sources.photo_analysis = ctx.photo_findings.is_some();
        ctx.sources.clinical_state = ctx
            .clinical_text
            .as_ref()
            .map(|v| !v.is_null())
            .unwrap_or(false);
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mock::generate_mock_report;
    use crate::store::memory::InMemoryBackend;
    use crate::store::types::{ConsultationState, NewPhotoReport};
    use chrono::Utc;

    fn seeded_consultation(backend: &InMemoryBackend) -> Consultation {
        let consultation = Consultation {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Some(Uuid::new_v4()),
            patient_age: Some(35),
            patient_gender: Some("M".into()),
            chief_complaint: Some("pigmented lesion".into()),
            symptoms: vec!["itching".into()],
            medical_history: vec!["atopy".into()],
            current_medications: Some("none".into()),
            allergies: vec!["penicillin".into()],
            consultation_reason: None,
            created_at: Utc::now(),
        };
        backend.add_consultation(consultation.clone());
        consultation
    }

    fn seed_photo_report(
        backend: &InMemoryBackend,
        consultation_id: Uuid,
        recommendation: &str,
    ) -> Uuid {
        let mut report = generate_mock_report(&ClinicalContext::default());
        report.recommendation = recommendation.to_string();
        backend
            .insert_photo_report(NewPhotoReport {
                consultation_id,
                model: "gpt-4o".into(),
                prompt_version: "derm-v1".into(),
                input_photos: vec![],
                report,
                latency_ms: 900,
                cost_usd: 0.01,
            })
            .unwrap()
            .id
    }

    #[test]
    fn context_from_consultation_fields() {
        let backend = InMemoryBackend::new();
        let consultation = seeded_consultation(&backend);

        let assembler = ContextAssembler::new(&backend);
        let ctx = assembler.assemble(&consultation, None, None).unwrap();

        assert_eq!(ctx.clinical.patient_age, Some(35));
        assert_eq!(ctx.clinical.chief_complaint.as_deref(), Some("pigmented lesion"));
        assert!(ctx.sources.consultation_data);
        assert!(!ctx.sources.photo_analysis);
        assert!(!ctx.sources.clinical_state);
    }

    #[test]
    fn explicit_photo_report_wins_over_most_recent() {
        let backend = InMemoryBackend::new();
        let consultation = seeded_consultation(&backend);
        let older = seed_photo_report(&backend, consultation.id, "older report");
        let _newer = seed_photo_report(&backend, consultation.id, "newer report");

        let assembler = ContextAssembler::new(&backend);
        let ctx = assembler
            .assemble(&consultation, None, Some(&older))
            .unwrap();

        let findings = ctx.photo_findings.expect("photo findings");
        assert_eq!(findings.recommendation, "older report");
    }

    #[test]
    fn defaults_load_latest_report_and_state() {
        let backend = InMemoryBackend::new();
        let consultation = seeded_consultation(&backend);
        let _older = seed_photo_report(&backend, consultation.id, "older");
        let _newer = seed_photo_report(&backend, consultation.id, "newer");
        backend.add_state(ConsultationState {
            id: Uuid::new_v4(),
            consultation_id: consultation.id,
            clinical_text: serde_json::json!({"note": "initial state"}),
            created_at: Utc::now(),
        });
        backend.add_state(ConsultationState {
            id: Uuid::new_v4(),
            consultation_id: consultation.id,
            clinical_text: serde_json::json!({"note": "latest state"}),
            created_at: Utc::now(),
        });

        let assembler = ContextAssembler::new(&backend);
        let ctx = assembler.assemble(&consultation, None, None).unwrap();

        assert_eq!(
            ctx.photo_findings.unwrap().recommendation,
            "newer"
        );
        assert_eq!(
            ctx.clinical_text.unwrap()["note"],
            serde_json::json!("latest state")
        );
        assert!(ctx.sources.photo_analysis);
        assert!(ctx.sources.clinical_state);
    }

    #[test]
    fn explicit_state_suppresses_default_photo_lookup() {
        let backend = InMemoryBackend::new();
        let consultation = seeded_consultation(&backend);
        let _report = seed_photo_report(&backend, consultation.id, "should not load");
        let state_id = Uuid::new_v4();
        backend.add_state(ConsultationState {
            id: state_id,
            consultation_id: consultation.id,
            clinical_text: serde_json::json!({"note": "explicit"}),
            created_at: Utc::now(),
        });

        let assembler = ContextAssembler::new(&backend);
        let ctx = assembler
            .assemble(&consultation, Some(&state_id), None)
            .unwrap();

        assert!(ctx.photo_findings.is_none());
        assert_eq!(ctx.clinical_text.unwrap()["note"], serde_json::json!("explicit"));
    }

    #[test]
    fn missing_references_are_not_errors() {
        let backend = InMemoryBackend::new();
        let consultation = seeded_consultation(&backend);
        let unknown = Uuid::new_v4();

        let assembler = ContextAssembler::new(&backend);
        let ctx = assembler
            .assemble(&consultation, Some(&unknown), Some(&unknown))
            .unwrap();
        assert!(ctx.photo_findings.is_none());
        assert!(ctx.clinical_text.is_none());
    }

    #[test]
    fn allergies_accept_string_or_list() {
        let one: ClinicalContext =
            serde_json::from_str(r#"{"allergies": "penicillin"}"#).unwrap();
        assert_eq!(one.allergies, vec!["penicillin".to_string()]);

        let many: ClinicalContext =
            serde_json::from_str(r#"{"allergies": ["penicillin", "latex"]}"#).unwrap();
        assert_eq!(many.allergies.len(), 2);

        let absent: ClinicalContext = serde_json::from_str("{}").unwrap();
        assert!(absent.allergies.is_empty());
    }
}
