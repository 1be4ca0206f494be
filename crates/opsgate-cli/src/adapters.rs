// crates/opsgate-cli/src/adapters.rs
// ============================================================================
// Module: Logging Platform Adapter
// Description: A PlatformAdapter that logs the action it would perform and
//              echoes its parameters back as the response payload.
// Purpose: Exercise the full router/queue dispatch path without calling out
//          to any real integration.
// Dependencies: opsgate-core, opsgate-router, async-trait, serde_json,
//               tracing
// ============================================================================

use async_trait::async_trait;
use opsgate_core::ActionParams;
use opsgate_router::PlatformAdapter;
use serde_json::json;
use serde_json::Value;
use tracing::info;

/// Stands in for a real platform integration: records the call and
/// succeeds unconditionally.
pub struct LoggingAdapter {
    platform: &'static str,
}

impl LoggingAdapter {
    /// Builds an adapter that logs dispatches under `platform`.
    #[must_use]
    pub const fn new(platform: &'static str) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl PlatformAdapter for LoggingAdapter {
    async fn execute(&self, action_params: &ActionParams) -> Result<Value, String> {
        info!(platform = self.platform, action = ?action_params.kind(), "dispatched");
        Ok(json!({"platform": self.platform, "action": format!("{:?}", action_params.kind())}))
    }
}
