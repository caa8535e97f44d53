//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response types served over the wire.

/// Registered organization (tenant) model and auth wire types
pub mod client;
/// Per-tenant price/quantity field mapping model
pub mod field_mapping;
/// Ingested record model and ingest/automation wire types
pub mod item;
/// Access token and password-reset token models
pub mod token;
