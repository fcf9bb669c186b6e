//! Consumed interfaces for the persistence gateway, object storage,
//! and session lookup.
//!
//! These stay synchronous on purpose: the in-memory backend completes
//! immediately, and a database-backed implementation is expected to
//! manage its own pooling under the hood. Handlers treat every write
//! as an independent, at-most-once insert.

use uuid::Uuid;

use super::types::{
    Consultation, ConsultationState, NewDiagnosisReport, NewPhotoReport, SessionUser,
    StoredDiagnosisReport, StoredPhotoReport,
};
use super::StoreError;

/// Report persistence gateway. Assigns report identity on insert.
///
/// All `list_*` methods return rows in reverse chronological order.
/// Lookups scoped by `consultation_id` never leak rows across
/// consultations — a mismatched pair behaves like a missing row.
pub trait ReportStore: Send + Sync {
    fn get_consultation(&self, id: &Uuid) -> Result<Option<Consultation>, StoreError>;

    fn get_state(
        &self,
        id: &Uuid,
        consultation_id: &Uuid,
    ) -> Result<Option<ConsultationState>, StoreError>;

    fn latest_state(
        &self,
        consultation_id: &Uuid,
    ) -> Result<Option<ConsultationState>, StoreError>;

    fn get_photo_report(
        &self,
        id: &Uuid,
        consultation_id: &Uuid,
    ) -> Result<Option<StoredPhotoReport>, StoreError>;

    fn latest_photo_report(
        &self,
        consultation_id: &Uuid,
    ) -> Result<Option<StoredPhotoReport>, StoreError>;

    fn insert_photo_report(
        &self,
        report: NewPhotoReport,
    ) -> Result<StoredPhotoReport, StoreError>;

    fn list_photo_reports(
        &self,
        consultation_id: &Uuid,
    ) -> Result<Vec<StoredPhotoReport>, StoreError>;

    fn insert_diagnosis_report(
        &self,
        report: NewDiagnosisReport,
    ) -> Result<StoredDiagnosisReport, StoreError>;

    fn list_diagnosis_reports(
        &self,
        consultation_id: &Uuid,
    ) -> Result<Vec<StoredDiagnosisReport>, StoreError>;
}

/// Object storage for clinical photos.
pub trait PhotoStorage: Send + Sync {
    /// Issue a time-limited, credential-less read URL for a stored object.
    fn sign_url(&self, storage_path: &str, ttl_secs: u64) -> Result<String, StoreError>;
}

/// Session identity lookup, backed by the external auth provider.
pub trait SessionDirectory: Send + Sync {
    /// Resolve a bearer token to a user, or `None` for unknown/expired tokens.
    fn resolve(&self, token: &str) -> Option<SessionUser>;
}
