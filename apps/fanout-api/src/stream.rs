//! In-process inbound event stream.
//!
//! Producers append records through [`EventStream`]; a single
//! [`StreamConsumer`] groups them into batches and hands each batch to the
//! entry router as a stream trigger.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;

use fanout_common::SequenceGenerator;

use crate::entry::EntryRouter;
use crate::trigger::{RecordData, StreamBatch, StreamRecord, Trigger};

/// Records buffered between producers and the consumer.
const STREAM_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
#[error("event stream {0} is closed")]
pub struct StreamClosed(pub String);

/// Producer handle. Cheap to clone.
#[derive(Clone)]
pub struct EventStream {
    name: String,
    tx: mpsc::Sender<StreamRecord>,
    sequence: Arc<SequenceGenerator>,
}

impl EventStream {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append one record; returns its assigned sequence number.
    ///
    /// Waits while the stream buffer is full.
    pub async fn append(&self, partition_key: &str, data: Vec<u8>) -> Result<String, StreamClosed> {
        let sequence_number = self.sequence.next().to_string();
        let record = StreamRecord {
            partition_key: partition_key.to_string(),
            sequence_number: sequence_number.clone(),
            arrival: Some(Utc::now()),
            data: RecordData::Raw(data),
        };
        self.tx
            .send(record)
            .await
            .map_err(|_| StreamClosed(self.name.clone()))?;
        Ok(sequence_number)
    }
}

/// Groups appended records into batches.
pub struct StreamConsumer {
    name: String,
    rx: mpsc::Receiver<StreamRecord>,
    batch_size: usize,
    batch_window: Duration,
}

/// Create a stream named `name` and its consumer.
pub fn channel(name: &str, batch_size: usize, batch_window: Duration) -> (EventStream, StreamConsumer) {
    let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
    let stream = EventStream {
        name: name.to_string(),
        tx,
        sequence: Arc::new(SequenceGenerator::new(0)),
    };
    let consumer = StreamConsumer {
        name: name.to_string(),
        rx,
        batch_size: batch_size.max(1),
        batch_window,
    };
    (stream, consumer)
}

impl StreamConsumer {
    /// Wait for the next batch: at least one record, then whatever else
    /// arrives within the batch window, up to the batch size.
    /// `None` once every producer handle is dropped and the buffer is drained.
    pub async fn next_batch(&mut self) -> Option<StreamBatch> {
        let first = self.rx.recv().await?;
        let mut records = vec![first];

        let deadline = Instant::now() + self.batch_window;
        while records.len() < self.batch_size {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) | Err(_) => break,
            }
        }

        Some(StreamBatch { records })
    }

    /// Feed batches to `entry` until the stream closes.
    ///
    /// A failed batch is logged and dropped; the consumer moves on to the next
    /// one.
    pub async fn run(mut self, entry: Arc<EntryRouter>) {
        tracing::info!(stream = %self.name, "stream consumer started");

        while let Some(batch) = self.next_batch().await {
            let records = batch.records.len();
            if let Err(e) = entry.route(Trigger::Stream(batch)).await {
                tracing::error!(stream = %self.name, records, error = %e, "stream batch dropped");
            }
        }

        tracing::info!(stream = %self.name, "stream consumer stopped");
    }
}
