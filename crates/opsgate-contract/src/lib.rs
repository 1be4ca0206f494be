// crates/opsgate-contract/src/lib.rs
// ============================================================================
// Module: Ops Gate Contract Library
// Description: Public API surface for schema validation of LLM payloads.
// Purpose: Expose ContractValidator and the bundled schemas.
// Dependencies: crate::{schemas, validator}
// ============================================================================

//! ## Overview
//! The contract crate owns the explicit JSON Schemas for classification and
//! decision payloads, and a validator M2/M3 call before ever parsing LLM
//! output into `opsgate-core` types.

pub mod schemas;
pub mod validator;

pub use schemas::classification_schema;
pub use schemas::decision_schema;
pub use validator::ContractError;
pub use validator::ContractValidator;
