//! Dermatik: AI-assisted dermatology pre-diagnosis service.
//!
//! Orchestrates a vision language model over clinical photographs and a
//! text model over assembled consultation context, behind an HTTP API.
//! Reports are schema-validated before anything is returned or stored.

pub mod api;
pub mod config;
pub mod pipeline;
pub mod store;
