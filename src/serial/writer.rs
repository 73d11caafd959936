//! Outbound command writer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use super::SerialSink;
use crate::domain::CommandRecord;
use crate::error::GatewayError;

/// [`SerialSink`] feeding a dedicated writer task over a bounded queue.
#[derive(Debug, Clone)]
pub struct SerialWriter {
    tx: mpsc::Sender<CommandRecord>,
    dropped: Arc<AtomicU64>,
}

impl SerialWriter {
    /// Spawns the writer task on `port`, buffering up to `capacity`
    /// records.
    ///
    /// The task ends when every `SerialWriter` clone is dropped, returning
    /// the number of records written, or on the first write error.
    pub fn spawn<W>(port: W, capacity: usize) -> (Self, JoinHandle<Result<u64, GatewayError>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(write_loop(port, rx));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            handle,
        )
    }

    /// Records dropped because the queue was full or the writer had
    /// stopped.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SerialSink for SerialWriter {
    fn send(&self, record: CommandRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("serial queue full, dropping command record");
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!("serial writer stopped, dropping command record");
            }
        }
    }
}

async fn write_loop<W>(mut port: W, mut rx: mpsc::Receiver<CommandRecord>) -> Result<u64, GatewayError>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(record) = rx.recv().await {
        port.write_all(record.as_bytes()).await?;
        port.flush().await?;
        written += 1;
        tracing::trace!(tag = record.tag(), "command record written");
    }
    Ok(written)
}
