//! Single entry point for every invocation.

use std::time::Duration;

use serde_json::Value;

use fanout_common::id::{prefix, prefixed_ulid};

use crate::dispatcher::{BatchReport, Dispatcher};
use crate::lifecycle::LifecycleHandler;
use crate::registry::RegistryError;
use crate::trigger::Trigger;

/// How an invocation was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Lifecycle,
    Broadcast(BatchReport),
    Ignored,
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The deadline elapsed; whatever had not been pushed yet is dropped.
    #[error("invocation exceeded {0:?}")]
    TimedOut(Duration),
}

/// Routes a classified trigger to the lifecycle handler or the dispatcher.
///
/// Invocations share nothing but the handles held here; each one re-reads the
/// registry.
pub struct EntryRouter {
    lifecycle: LifecycleHandler,
    dispatcher: Dispatcher,
    timeout: Duration,
}

impl EntryRouter {
    pub fn new(lifecycle: LifecycleHandler, dispatcher: Dispatcher, timeout: Duration) -> Self {
        Self {
            lifecycle,
            dispatcher,
            timeout,
        }
    }

    /// Classify a raw envelope and route it.
    pub async fn route_envelope(&self, envelope: Value) -> Result<Outcome, RouteError> {
        self.route(Trigger::classify(envelope)).await
    }

    /// Route one trigger, bounded by the invocation deadline.
    pub async fn route(&self, trigger: Trigger) -> Result<Outcome, RouteError> {
        let invocation_id = prefixed_ulid(prefix::INVOCATION);
        let kind = trigger.kind();

        let work = self.handle(trigger, &invocation_id);

        match tokio::time::timeout(self.timeout, work).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                tracing::error!(%invocation_id, kind, error = %e, "invocation failed");
                Err(e)
            }
            Err(_elapsed) => {
                tracing::warn!(%invocation_id, kind, timeout = ?self.timeout, "invocation truncated");
                Err(RouteError::TimedOut(self.timeout))
            }
        }
    }

    async fn handle(&self, trigger: Trigger, invocation_id: &str) -> Result<Outcome, RouteError> {
        match trigger {
            Trigger::Lifecycle(notification) => {
                self.lifecycle.handle(&notification).await?;
                Ok(Outcome::Lifecycle)
            }
            Trigger::Stream(batch) => {
                let report = self.dispatcher.dispatch_batch(&batch).await?;
                Ok(Outcome::Broadcast(report))
            }
            Trigger::Unrecognized => {
                tracing::warn!(%invocation_id, "unrecognized trigger acknowledged");
                Ok(Outcome::Ignored)
            }
        }
    }
}
