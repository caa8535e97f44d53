//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and external collaborators.

/// Registration, token issuance, key rotation, and password reset flows
pub mod auth_service;
/// External AI field-name detection collaborator (best-effort)
pub mod detection_service;
/// Password-reset email delivery (best-effort)
pub mod email_service;
/// Upsert engine and batch claim protocol
pub mod ingest_service;
/// Per-tenant field mapping resolution (detect once, reuse forever)
pub mod mapping_service;
