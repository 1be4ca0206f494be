// crates/opsgate-reasoning/src/lib.rs
// ============================================================================
// Crate: opsgate-reasoning
// Description: Signal preprocessing, classification, decision-making, and
//              pipeline sequencing (M1-M4).
// Purpose: Turn a raw Signal into a validated Decision, suspending only on
//          LLM calls and cache lookups.
// Dependencies: opsgate-cache, opsgate-contract, opsgate-core, opsgate-llm,
//               regex, tokio, tracing
// ============================================================================

//! ## Overview
//! This crate implements the reasoning half of the gate: [`preprocessor`]
//! cleans and enriches a raw signal (M1), [`classifier`] turns it into a
//! validated [`opsgate_core::Classification`] (M2), [`decision_maker`] turns
//! that into a validated [`opsgate_core::Decision`] (M3), and [`pipeline`]
//! sequences all three into one [`opsgate_core::ReasoningResult`] per signal
//! (M4). The crate does not call external adapters directly; the only
//! suspension points are LLM calls and response-cache lookups.

mod cleaning;
mod classifier;
mod decision_maker;
mod entities;
mod extraction;
mod language;
mod pipeline;
mod preprocessor;

pub use classifier::Classifier;
pub use classifier::ClassifierConfig;
pub use classifier::ClassifierError;
pub use classifier::ClassifyOutcome;
pub use cleaning::clean;
pub use cleaning::normalize_whitespace;
pub use cleaning::remove_quoted_reply;
pub use cleaning::remove_signature;
pub use decision_maker::DecisionMaker;
pub use decision_maker::DecisionMakerError;
pub use decision_maker::PolicyBlockers;
pub use entities::ActionItem;
pub use entities::ActionPriority;
pub use entities::Contextualized;
pub use entities::ExtractedEntities;
pub use pipeline::ReasoningPipeline;
pub use preprocessor::preprocess;
pub use preprocessor::PreprocessResult;
