//! Broadcast of stream records to every registered connection.
//!
//! One registry snapshot is taken per batch. Each record is decoded, then
//! pushed to every id in the snapshot concurrently; a connection the gateway
//! reports gone is deleted from the registry and dropped from the snapshot
//! for the rest of the batch. Nothing here retries: the next record, or the
//! next batch, is the retry.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use serde_json::Value;

use crate::gateway::{PushError, PushGateway};
use crate::registry::{ConnectionRegistry, RegistryError};
use crate::trigger::{StreamBatch, StreamRecord};

/// Why a record was skipped without being broadcast.
#[derive(Debug, thiserror::Error)]
pub enum MalformedEvent {
    #[error("payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Counters for one batch, logged at the end of every cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub records: usize,
    pub broadcast: usize,
    pub malformed: usize,
    pub snapshot_size: usize,
    pub delivered: usize,
    pub pruned: usize,
    pub failed: usize,
}

enum PushOutcome {
    Delivered,
    Pruned,
    Failed,
}

pub struct Dispatcher {
    registry: Arc<dyn ConnectionRegistry>,
    gateway: Arc<dyn PushGateway>,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        gateway: Arc<dyn PushGateway>,
        concurrency: usize,
    ) -> Self {
        Self {
            registry,
            gateway,
            concurrency: concurrency.max(1),
        }
    }

    /// Broadcast every record of `batch`, in order.
    ///
    /// Only a registry failure aborts the batch. Safe to run again on the
    /// same batch; live connections then see the records twice.
    pub async fn dispatch_batch(&self, batch: &StreamBatch) -> Result<BatchReport, RegistryError> {
        let mut report = BatchReport {
            records: batch.records.len(),
            ..BatchReport::default()
        };
        // Read lazily: a batch of nothing but malformed records costs no scan.
        let mut snapshot: Option<Vec<String>> = None;

        for record in &batch.records {
            let payload = match decode(record) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(
                        partition_key = %record.partition_key,
                        sequence_number = %record.sequence_number,
                        error = %e,
                        "skipping malformed record"
                    );
                    report.malformed += 1;
                    continue;
                }
            };

            if snapshot.is_none() {
                let ids = self.registry.list_all().await?;
                report.snapshot_size = ids.len();
                snapshot = Some(ids);
            }
            let ids = snapshot.get_or_insert_with(Vec::new);

            tracing::debug!(
                partition_key = %record.partition_key,
                sequence_number = %record.sequence_number,
                connections = ids.len(),
                "broadcasting record"
            );

            let pruned = self.broadcast(&payload, ids, &mut report).await?;
            if !pruned.is_empty() {
                ids.retain(|id| !pruned.contains(id));
            }
            report.broadcast += 1;
        }

        tracing::info!(
            records = report.records,
            broadcast = report.broadcast,
            malformed = report.malformed,
            connections = report.snapshot_size,
            delivered = report.delivered,
            pruned = report.pruned,
            failed = report.failed,
            "stream batch dispatched"
        );

        Ok(report)
    }

    /// Push one payload to every id; returns the ids pruned along the way.
    async fn broadcast(
        &self,
        payload: &[u8],
        ids: &[String],
        report: &mut BatchReport,
    ) -> Result<HashSet<String>, RegistryError> {
        let payload: Arc<[u8]> = Arc::from(payload);
        let pushes = ids.iter().cloned().map(|id| {
            let payload = payload.clone();
            async move {
                let outcome = self.push_one(&id, &payload).await;
                (id, outcome)
            }
            .boxed()
        });
        let outcomes: Vec<(String, Result<PushOutcome, RegistryError>)> = stream::iter(pushes)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut pruned = HashSet::new();
        let mut registry_error = None;
        for (id, outcome) in outcomes {
            match outcome {
                Ok(PushOutcome::Delivered) => report.delivered += 1,
                Ok(PushOutcome::Pruned) => {
                    report.pruned += 1;
                    pruned.insert(id);
                }
                Ok(PushOutcome::Failed) => report.failed += 1,
                Err(e) => registry_error = Some(e),
            }
        }

        match registry_error {
            Some(e) => Err(e),
            None => Ok(pruned),
        }
    }

    async fn push_one(&self, connection_id: &str, payload: &[u8]) -> Result<PushOutcome, RegistryError> {
        match self.gateway.send(connection_id, payload).await {
            Ok(()) => Ok(PushOutcome::Delivered),
            Err(PushError::StaleTarget(_)) => {
                self.registry.delete(connection_id).await?;
                tracing::info!(%connection_id, "pruned stale connection");
                Ok(PushOutcome::Pruned)
            }
            Err(e) => {
                tracing::warn!(%connection_id, error = %e, "push failed");
                Ok(PushOutcome::Failed)
            }
        }
    }
}

/// Decode a record into the bytes pushed to clients.
///
/// The payload must be JSON; it is re-serialized so every connection gets the
/// same compact text regardless of how the producer formatted it.
pub fn decode(record: &StreamRecord) -> Result<Vec<u8>, MalformedEvent> {
    let bytes = record.data.bytes()?;
    let value: Value = serde_json::from_slice(&bytes)?;
    Ok(serde_json::to_vec(&value)?)
}
