//! External collaborators behind traits: the report persistence gateway,
//! the photo object storage, and the session directory.
//!
//! The orchestration pipeline never owns persisted entities — it hands
//! validated reports to [`gateway::ReportStore`], which assigns identity.
//! [`memory::InMemoryBackend`] implements every trait for tests and demo
//! runs; a production deployment substitutes its managed backends here.

pub mod gateway;
pub mod memory;
pub mod types;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("could not issue signed URL for `{0}`")]
    SignUrl(String),
}
