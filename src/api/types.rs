//! Shared API state and caller identity.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::config::{hash_secret, AppConfig};
use crate::pipeline::synthesis::DiagnosisSynthesizer;
use crate::pipeline::vision::VisionAnalysisClient;
use crate::store::gateway::{PhotoStorage, ReportStore, SessionDirectory};
use crate::store::types::Consultation;

/// Disclaimer attached to every AI-generated report.
pub const DISCLAIMER: &str = "AI-generated pre-diagnosis for decision support \
    only. This is not a medical diagnosis; always consult a qualified physician.";

/// Shared state for all API handlers.
///
/// Injected twice: as `State` for handlers and as an `Extension` so the
/// auth middleware can reach it.
#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn ReportStore>,
    pub storage: Arc<dyn PhotoStorage>,
    pub sessions: Arc<dyn SessionDirectory>,
    pub vision: Arc<VisionAnalysisClient>,
    pub synthesizer: Arc<DiagnosisSynthesizer>,
    pub config: Arc<AppConfig>,
}

/// Who is making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    /// Trusted backend caller holding the service key. Bypasses
    /// per-consultation ownership checks.
    Service,
    /// End user resolved from a session token.
    User(Uuid),
    /// No credentials. Allowed on the photo path only; nothing persisted.
    Anonymous,
}

/// Caller identity injected into request extensions by the auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub principal: Principal,
}

impl AuthContext {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self.principal, Principal::Anonymous)
    }

    pub fn is_service(&self) -> bool {
        matches!(self.principal, Principal::Service)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self.principal {
            Principal::User(id) => Some(id),
            _ => None,
        }
    }
}

/// Constant-time check of a presented service key against the stored hash.
pub fn verify_service_key(expected_hash: &[u8; 32], presented: &str) -> bool {
    let presented_hash = hash_secret(presented);
    expected_hash.ct_eq(&presented_hash).into()
}

/// Enforce that the caller may read or write this consultation's data.
///
/// Service callers pass unconditionally. Users must be the patient or
/// the assigned doctor. Anonymous callers are rejected outright.
pub fn authorize_consultation(
    auth: &AuthContext,
    consultation: &Consultation,
) -> Result<(), ApiError> {
    match auth.principal {
        Principal::Service => Ok(()),
        Principal::User(user_id) if consultation.is_party(&user_id) => Ok(()),
        Principal::User(_) => Err(ApiError::Forbidden(
            "not a party to this consultation".to_string(),
        )),
        Principal::Anonymous => Err(ApiError::Unauthorized),
    }
}
