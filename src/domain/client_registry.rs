//! Fixed-capacity table of connected clients.
//!
//! [`ClientRegistry`] owns the write half of every admitted connection in a
//! slot table behind a single [`std::sync::Mutex`]. The lock is only held
//! for O(1) table reads and writes, never across an `.await`: `broadcast`
//! copies the live writers out under the lock and performs the sends after
//! releasing it, so a slow peer cannot stall admission or removal.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::AbortHandle;

use super::ClientId;

/// Write half of a client connection, shared between the registry and an
/// in-flight broadcast.
pub type SharedWriter<W> = Arc<tokio::sync::Mutex<W>>;

/// Ticket for an occupied slot. Required to remove the client again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Index into the slot table.
    pub index: usize,
    /// Client admitted to this slot.
    pub client_id: ClientId,
}

/// Result of [`ClientRegistry::add`].
#[derive(Debug)]
pub enum Admission<W> {
    /// The client now occupies a slot.
    Admitted(Slot),
    /// Every slot is taken; the writer is handed back so the caller can
    /// close the connection.
    Full(W),
}

/// Outcome of a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients a send was attempted on.
    pub attempted: usize,
    /// Clients that accepted the full payload.
    pub delivered: usize,
}

impl BroadcastReport {
    /// Sends that failed.
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.attempted - self.delivered
    }
}

#[derive(Debug)]
struct SlotEntry<W> {
    client_id: ClientId,
    peer: SocketAddr,
    writer: SharedWriter<W>,
    reader: Option<AbortHandle>,
}

/// Registry of connected clients with a fixed number of slots.
///
/// # Concurrency
///
/// - One mutex guards the whole table.
/// - Network sends happen outside the lock on cloned writer handles.
/// - A slot is cleared at most once per admission: removal is keyed by the
///   [`Slot`] ticket, whose [`ClientId`] must still match.
#[derive(Debug)]
pub struct ClientRegistry<W> {
    slots: Mutex<Vec<Option<SlotEntry<W>>>>,
}

impl<W> ClientRegistry<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a registry with `capacity` empty slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots: Mutex::new(slots),
        }
    }

    fn table(&self) -> MutexGuard<'_, Vec<Option<SlotEntry<W>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.table().len()
    }

    /// Places a client in the first free slot.
    ///
    /// Returns [`Admission::Full`] with the writer untouched when no slot is
    /// free.
    pub fn add(&self, peer: SocketAddr, writer: W) -> Admission<W> {
        let mut table = self.table();
        let Some((index, free)) = table.iter_mut().enumerate().find(|(_, s)| s.is_none()) else {
            return Admission::Full(writer);
        };
        let client_id = ClientId::new();
        *free = Some(SlotEntry {
            client_id,
            peer,
            writer: Arc::new(tokio::sync::Mutex::new(writer)),
            reader: None,
        });
        Admission::Admitted(Slot { index, client_id })
    }

    /// Records the reader task serving `slot`.
    ///
    /// Returns `false` if the slot was already released, in which case the
    /// handle is dropped.
    pub fn attach_reader(&self, slot: Slot, reader: AbortHandle) -> bool {
        let mut table = self.table();
        match table.get_mut(slot.index) {
            Some(Some(entry)) if entry.client_id == slot.client_id => {
                entry.reader = Some(reader);
                true
            }
            _ => false,
        }
    }

    /// Releases `slot` and returns its writer so the caller can close it.
    ///
    /// Returns `None` if the slot no longer belongs to this admission, so
    /// repeated calls are harmless.
    pub fn remove(&self, slot: Slot) -> Option<SharedWriter<W>> {
        let mut table = self.table();
        let cell = table.get_mut(slot.index)?;
        if cell.as_ref().map(|e| e.client_id) != Some(slot.client_id) {
            return None;
        }
        cell.take().map(|entry| entry.writer)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn count(&self) -> usize {
        self.table().iter().filter(|s| s.is_some()).count()
    }

    /// Returns `true` if no client is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Sends `payload` to every connected client.
    ///
    /// Send failures are logged and counted; the failing client stays
    /// registered until its reader notices the broken connection.
    pub async fn broadcast(&self, payload: &[u8]) -> BroadcastReport {
        let targets: Vec<(ClientId, SocketAddr, SharedWriter<W>)> = self
            .table()
            .iter()
            .flatten()
            .map(|e| (e.client_id, e.peer, Arc::clone(&e.writer)))
            .collect();

        if targets.is_empty() {
            return BroadcastReport::default();
        }

        let sends = targets.iter().map(|(client_id, peer, writer)| async move {
            let mut w = writer.lock().await;
            match w.write_all(payload).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(%client_id, %peer, error = %e, "telemetry send failed");
                    false
                }
            }
        });
        let results = join_all(sends).await;

        BroadcastReport {
            attempted: results.len(),
            delivered: results.iter().filter(|ok| **ok).count(),
        }
    }

    /// Empties every slot, aborting the reader tasks and closing the
    /// writers. Used on process shutdown.
    pub async fn drain(&self) -> usize {
        let entries: Vec<SlotEntry<W>> = self.table().iter_mut().filter_map(Option::take).collect();
        let drained = entries.len();
        for entry in entries {
            if let Some(reader) = entry.reader {
                reader.abort();
            }
            tracing::debug!(client_id = %entry.client_id, peer = %entry.peer, "closing client");
            let _ = entry.writer.lock().await.shutdown().await;
        }
        drained
    }
}
