// crates/opsgate-core/src/lib.rs
// ============================================================================
// Module: Ops Gate Core Library
// Description: Public API surface for the Ops Gate core data model.
// Purpose: Expose the shared types every other Ops Gate crate builds on.
// Dependencies: crate::{breaker, cache, classification, decision, error,
//               event, identifiers, preprocessed, queue, reasoning, review,
//               signal, time, token_usage}
// ============================================================================

//! ## Overview
//! Ops Gate core provides the data model for the signal-to-action
//! reasoning pipeline: signals, preprocessing, classification, decisions,
//! reasoning results, the response cache entry shape, review items, queued
//! actions, hub events, circuit breaker state, and token usage. It holds no
//! I/O, scheduling, or provider logic; those live in the crates that depend
//! on it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod breaker;
pub mod cache;
pub mod classification;
pub mod decision;
pub mod error;
pub mod event;
pub mod identifiers;
pub mod preprocessed;
pub mod queue;
pub mod reasoning;
pub mod review;
pub mod signal;
pub mod time;
pub mod token_usage;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use breaker::BreakerPhase;
pub use breaker::CircuitBreakerState;
pub use cache::CacheEntry;
pub use cache::Feedback;
pub use cache::ResponseType;
pub use cache::HOT_ENTRY_HIT_THRESHOLD;
pub use classification::Category;
pub use classification::Classification;
pub use classification::Importance;
pub use classification::Urgency;
pub use decision::ActionKind;
pub use decision::ActionParams;
pub use decision::CreateTaskParams;
pub use decision::Decision;
pub use decision::DelegateParams;
pub use decision::EscalateParams;
pub use decision::ExtraAttributes;
pub use decision::FileDocumentParams;
pub use decision::SendNotificationParams;
pub use decision::UpdateSheetParams;
pub use decision::ValidationResult;
pub use decision::ValidationWarning;
pub use error::CoreError;
pub use event::sort_batch_by_priority;
pub use event::EventPriority;
pub use event::HubEvent;
pub use identifiers::ActionId;
pub use identifiers::CorrelationId;
pub use identifiers::DecisionId;
pub use identifiers::Fingerprint;
pub use identifiers::PublicationId;
pub use identifiers::ReviewId;
pub use identifiers::SignalId;
pub use preprocessed::CleaningStep;
pub use preprocessed::ExtractedData;
pub use preprocessed::MoneyAmount;
pub use preprocessed::NormalizedDate;
pub use preprocessed::PreprocessedSignal;
pub use preprocessed::SignalMetadata;
pub use queue::ActionStatus;
pub use queue::Priority;
pub use queue::QueuedAction;
pub use queue::MAX_ATTEMPTS;
pub use reasoning::ClassificationStage;
pub use reasoning::ReasoningMetadata;
pub use reasoning::ReasoningResult;
pub use reasoning::ReasoningStatus;
pub use reasoning::StageTimings;
pub use review::Modification;
pub use review::ReviewItem;
pub use review::ReviewReason;
pub use review::ReviewStatus;
pub use review::RiskLevel;
pub use signal::Attachment;
pub use signal::Signal;
pub use signal::SignalSource;
pub use time::Timestamp;
pub use token_usage::TokenUsage;
