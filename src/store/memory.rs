//! In-memory backend implementing every consumed interface.
//!
//! Serves tests and demo runs. Rows keep insertion order; reverse
//! chronological listings iterate back-to-front so same-instant inserts
//! still order correctly.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use super::gateway::{PhotoStorage, ReportStore, SessionDirectory};
use super::types::{
    Consultation, ConsultationState, NewDiagnosisReport, NewPhotoReport, SessionUser,
    StoredDiagnosisReport, StoredPhotoReport,
};
use super::StoreError;

#[derive(Default)]
struct Inner {
    consultations: HashMap<Uuid, Consultation>,
    states: Vec<ConsultationState>,
    photo_reports: Vec<StoredPhotoReport>,
    diagnosis_reports: Vec<StoredDiagnosisReport>,
    sessions: HashMap<String, Uuid>,
}

/// In-memory persistence gateway + photo storage + session directory.
#[derive(Default)]
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))
    }

    // ── Seeding helpers ─────────────────────────────────────

    pub fn add_consultation(&self, consultation: Consultation) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.consultations.insert(consultation.id, consultation);
        }
    }

    pub fn add_state(&self, state: ConsultationState) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.states.push(state);
        }
    }

    /// Register a session token resolving to `user_id`.
    pub fn add_session(&self, token: &str, user_id: Uuid) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.sessions.insert(token.to_string(), user_id);
        }
    }
}

impl ReportStore for InMemoryBackend {
    fn get_consultation(&self, id: &Uuid) -> Result<Option<Consultation>, StoreError> {
        Ok(self.lock()?.consultations.get(id).cloned())
    }

    fn get_state(
        &self,
        id: &Uuid,
        consultation_id: &Uuid,
    ) -> Result<Option<ConsultationState>, StoreError> {
        Ok(self
            .lock()?
            .states
            .iter()
            .find(|s| &s.id == id && &s.consultation_id == consultation_id)
            .cloned())
    }

    fn latest_state(
        &self,
        consultation_id: &Uuid,
    ) -> Result<Option<ConsultationState>, StoreError> {
        Ok(self
            .lock()?
            .states
            .iter()
            .rev()
            .find(|s| &s.consultation_id == consultation_id)
            .cloned())
    }

    fn get_photo_report(
        &self,
        id: &Uuid,
        consultation_id: &Uuid,
    ) -> Result<Option<StoredPhotoReport>, StoreError> {
        Ok(self
            .lock()?
            .photo_reports
            .iter()
            .find(|r| &r.id == id && &r.consultation_id == consultation_id)
            .cloned())
    }

    fn latest_photo_report(
        &self,
        consultation_id: &Uuid,
    ) -> Result<Option<StoredPhotoReport>, StoreError> {
        Ok(self
            .lock()?
            .photo_reports
            .iter()
            .rev()
            .find(|r| &r.consultation_id == consultation_id)
            .cloned())
    }

    fn insert_photo_report(
        &self,
        report: NewPhotoReport,
    ) -> Result<StoredPhotoReport, StoreError> {
        let stored = StoredPhotoReport {
            id: Uuid::new_v4(),
            consultation_id: report.consultation_id,
            model: report.model,
            prompt_version: report.prompt_version,
            input_photos: report.input_photos,
            report: report.report,
            latency_ms: report.latency_ms,
            cost_usd: report.cost_usd,
            created_at: Utc::now(),
        };
        self.lock()?.photo_reports.push(stored.clone());
        Ok(stored)
    }

    fn list_photo_reports(
        &self,
        consultation_id: &Uuid,
    ) -> Result<Vec<StoredPhotoReport>, StoreError> {
        Ok(self
            .lock()?
            .photo_reports
            .iter()
            .rev()
            .filter(|r| &r.consultation_id == consultation_id)
            .cloned()
            .collect())
    }

    fn insert_diagnosis_report(
        &self,
        report: NewDiagnosisReport,
    ) -> Result<StoredDiagnosisReport, StoreError> {
        let stored = StoredDiagnosisReport {
            id: Uuid::new_v4(),
            consultation_id: report.consultation_id,
            model: report.model,
            prompt_version: report.prompt_version,
            input_refs: report.input_refs,
            report: report.report,
            latency_ms: report.latency_ms,
            cost_usd: report.cost_usd,
            created_at: Utc::now(),
        };
        self.lock()?.diagnosis_reports.push(stored.clone());
        Ok(stored)
    }

    fn list_diagnosis_reports(
        &self,
        consultation_id: &Uuid,
    ) -> Result<Vec<StoredDiagnosisReport>, StoreError> {
        Ok(self
            .lock()?
            .diagnosis_reports
            .iter()
            .rev()
            .filter(|r| &r.consultation_id == consultation_id)
            .cloned()
            .collect())
    }
}

impl PhotoStorage for InMemoryBackend {
    fn sign_url(&self, storage_path: &str, ttl_secs: u64) -> Result<String, StoreError> {
        if storage_path.trim().is_empty() || storage_path.contains("..") {
            return Err(StoreError::SignUrl(storage_path.to_string()));
        }
        let token: u64 = rand::random();
        Ok(format!(
            "https://storage.local/clinical-photos/{storage_path}?expires={ttl_secs}&token={token:016x}"
        ))
    }
}

impl SessionDirectory for InMemoryBackend {
    fn resolve(&self, token: &str) -> Option<SessionUser> {
        self.inner
            .lock()
            .ok()?
            .sessions
            .get(token)
            .map(|user_id| SessionUser { user_id: *user_id })
    }
}
