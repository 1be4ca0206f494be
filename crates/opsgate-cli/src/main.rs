// crates/opsgate-cli/src/main.rs
// ============================================================================
// Binary: opsgate
// Description: Composition root wiring every crate into a runnable pipeline
//              against stub platform adapters and a synthetic signal source.
// Purpose: Local smoke test of the full signal -> classification ->
//          decision -> review/publish -> queue -> dispatch path.
// Dependencies: every opsgate-* crate, clap, tokio, tracing,
//               tracing-subscriber
// ============================================================================

//! ## Overview
//! `opsgate` drains a small in-memory batch of signals through one
//! [`opsgate_reasoning::ReasoningPipeline`], hands each result to the
//! [`opsgate_publisher::Publisher`], and then ticks the
//! [`opsgate_queue::QueueManager`] until every dispatchable action has
//! run. There is no network transport here: classification and decision
//! calls are served by a heuristic, keyword-matching [`stub::StubChatProvider`]
//! instead of a real LLM backend, and every platform adapter logs the
//! action it would have performed rather than calling out anywhere.

mod adapters;
mod stub;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use opsgate_cache::ResponseCache;
use opsgate_cache::TtlConfig;
use opsgate_contract::ContractValidator;
use opsgate_core::ActionKind;
use opsgate_core::Priority;
use opsgate_core::Signal;
use opsgate_core::SignalId;
use opsgate_core::SignalSource;
use opsgate_core::Timestamp;
use opsgate_llm::LlmGateway;
use opsgate_llm::RetryConfig;
use opsgate_llm::TokenBudget;
use opsgate_publisher::Publisher;
use opsgate_publisher::PublishOutcome;
use opsgate_queue::QueueManager;
use opsgate_queue::RateLimitTable;
use opsgate_reasoning::Classifier;
use opsgate_reasoning::ClassifierConfig;
use opsgate_reasoning::DecisionMaker;
use opsgate_reasoning::PolicyBlockers;
use opsgate_reasoning::ReasoningPipeline;
use opsgate_reliability::BreakerConfig;
use opsgate_reliability::EventHub;
use opsgate_review::ReviewManager;
use opsgate_router::ActionRouter;
use opsgate_router::PlatformBudget;
use time::UtcOffset;
use tracing::info;
use tracing::warn;

use crate::adapters::LoggingAdapter;
use crate::stub::StubChatProvider;

/// Local smoke test driving one batch of signals through the full pipeline.
#[derive(Debug, Parser)]
#[command(name = "opsgate", about = "Operations reasoning gate demo runner")]
struct Cli {
    /// Directory holding the queue, cache, budget, review, and event-log
    /// snapshots. Created if it does not already exist.
    #[arg(long, default_value = "./opsgate-data")]
    data_dir: PathBuf,

    /// Senders treated as trusted by the reasoning pipeline's
    /// untrusted-spam review rule.
    #[arg(long, value_delimiter = ',', default_value = "ops@example.com")]
    trusted_senders: Vec<String>,

    /// Daily token budget enforced per provider.
    #[arg(long, default_value_t = 100_000)]
    max_daily_tokens: u64,

    /// Number of queue-processing ticks to run after publishing the demo
    /// batch, draining retries between ticks.
    #[arg(long, default_value_t = 5)]
    ticks: u32,
}

fn demo_signals(now: Timestamp) -> Vec<Signal> {
    let bodies: [(&str, SignalSource, Option<&str>); 5] = [
        ("Production database is down, customers can't check out, this is critical", SignalSource::Chat, Some("ops@example.com")),
        ("Please find attached invoice #4821 for this month's vendor payment", SignalSource::Email, Some("billing@vendor.example")),
        ("Null pointer exception thrown when loading the dashboard, stack trace attached", SignalSource::Email, Some("dev@example.com")),
        ("Reminder: team sync meeting moved to 3pm tomorrow", SignalSource::Chat, Some("ops@example.com")),
        ("Unsubscribe now to claim your free prize, click here!!!", SignalSource::Email, Some("unknown@spammy.example")),
    ];

    bodies
        .into_iter()
        .map(|(body, source, sender)| Signal {
            id: SignalId::generate(),
            source,
            subject: None,
            body: body.to_string(),
            sender: sender.map(ToString::to_string),
            timestamp: now,
            attachments: Vec::new(),
        })
        .collect()
}

fn build_router() -> ActionRouter {
    let mut router = ActionRouter::new();
    let breaker_config = BreakerConfig::default();
    let budget = PlatformBudget::default();

    router.register(ActionKind::CreateTask, "trello", Arc::new(LoggingAdapter::new("trello")), breaker_config, budget);
    router.register(ActionKind::SendNotification, "chat", Arc::new(LoggingAdapter::new("chat")), breaker_config, budget);
    router.register(ActionKind::UpdateSheet, "sheets", Arc::new(LoggingAdapter::new("sheets")), breaker_config, budget);
    router.register(ActionKind::FileDocument, "drive", Arc::new(LoggingAdapter::new("drive")), breaker_config, budget);
    router.register(ActionKind::Delegate, "chat", Arc::new(LoggingAdapter::new("chat")), breaker_config, budget);
    router.register(ActionKind::Escalate, "chat", Arc::new(LoggingAdapter::new("chat")), breaker_config, budget);

    router
}

fn rate_limits() -> RateLimitTable {
    let mut limits = RateLimitTable::new();
    limits.insert("notion".to_string(), std::time::Duration::from_millis(330));
    limits.insert("trello".to_string(), std::time::Duration::from_millis(100));
    limits.insert("chat".to_string(), std::time::Duration::from_millis(1000));
    limits.insert("drive".to_string(), std::time::Duration::from_millis(100));
    limits.insert("sheets".to_string(), std::time::Duration::from_millis(100));
    limits
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    tokio::fs::create_dir_all(&cli.data_dir).await?;

    let now = Timestamp::now();
    let event_hub = Arc::new(EventHub::new(Arc::new(
        stub::FileEventLogSink::new(cli.data_dir.join("events.jsonl")),
    )));

    let validator = Arc::new(ContractValidator::new()?);

    let token_budget = Arc::new(TokenBudget::new(
        cli.max_daily_tokens,
        BTreeMap::new(),
        cli.data_dir.join("budget.json"),
        UtcOffset::UTC,
    ));
    token_budget.load().await?;

    let cache = Arc::new(ResponseCache::new(TtlConfig::default(), cli.data_dir.join("cache.json")));
    cache.load().await?;

    let gateway = Arc::new(LlmGateway::new(vec![Arc::new(StubChatProvider)], RetryConfig::default()));

    let classifier = Arc::new(Classifier::new(
        Arc::clone(&gateway),
        Arc::clone(&token_budget),
        Arc::clone(&cache),
        Arc::clone(&validator),
        ClassifierConfig { provider: "stub".to_string(), model: "stub-classifier".to_string(), temperature: 0.0 },
    ));

    let decision_maker = Arc::new(DecisionMaker::new(
        gateway,
        validator,
        "stub-decider".to_string(),
        0.0,
        PolicyBlockers::default(),
    ));

    let pipeline = ReasoningPipeline::new(classifier, decision_maker, cli.trusted_senders.clone(), true, "stub-classifier".to_string(), 0.0);

    let review_manager = Arc::new(ReviewManager::new(cli.data_dir.join("review.json"), Arc::clone(&event_hub)));
    review_manager.load().await?;

    let publisher = Publisher::new(review_manager, Arc::clone(&event_hub));

    let router = Arc::new(build_router());
    let queue = QueueManager::new(cli.data_dir.join("queue.json"), router, Arc::clone(&event_hub), rate_limits());
    queue.init().await?;

    info!(count = 5, "publishing demo signal batch");
    for signal in demo_signals(now) {
        let result = pipeline.process(signal, now).await;
        let signal_id = result.signal.id.clone();
        let enqueue_copy = result.clone();
        match publisher.publish(result, now).await {
            Ok(PublishOutcome::Ready(action)) => {
                info!(%signal_id, action = ?action.parameters.kind(), "ready, enqueuing for dispatch");
                let priority: Priority = event_priority_to_queue_priority(action.priority);
                if let Err(error) = queue.enqueue(enqueue_copy, priority, now).await {
                    warn!(%signal_id, %error, "failed to enqueue a ready action");
                }
            }
            Ok(PublishOutcome::PendingApproval(review_id)) => {
                info!(%signal_id, %review_id, "queued for human approval");
            }
            Ok(PublishOutcome::Rejected(validation)) => {
                warn!(%signal_id, ?validation, "rejected at publish time");
            }
            Ok(outcome) => {
                info!(%signal_id, ?outcome, "publish outcome");
            }
            Err(error) => {
                warn!(%signal_id, %error, "publish failed");
            }
        }
    }
    event_hub.process_one_batch().await;

    for tick in 0..cli.ticks {
        let outcome = queue.process_queue(now).await?;
        info!(
            tick,
            dispatched = outcome.dispatched,
            completed = outcome.completed.len(),
            retried = outcome.retried.len(),
            failed = outcome.failed.len(),
            "queue tick"
        );
        event_hub.process_one_batch().await;
    }

    let stats = queue.stats(now).await;
    info!(
        pending = stats.pending,
        executing = stats.executing,
        completed = stats.completed,
        failed = stats.failed,
        total = stats.total,
        "final queue stats"
    );

    queue.shutdown().await?;
    cache.save().await?;

    Ok(())
}

const fn event_priority_to_queue_priority(priority: opsgate_core::EventPriority) -> Priority {
    match priority {
        opsgate_core::EventPriority::High => 1,
        opsgate_core::EventPriority::Normal => 3,
        opsgate_core::EventPriority::Low => 5,
    }
}
