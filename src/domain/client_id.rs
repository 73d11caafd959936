//! Type-safe client identifier.
//!
//! [`ClientId`] is a newtype wrapper around [`uuid::Uuid`] (v4). Slots in
//! the client registry are reused; the id distinguishes one admission of a
//! slot from the next.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for one admitted client connection.
///
/// Generated when the connection is registered and immutable thereafter.
/// Used together with the slot index to remove a client, so a late remove
/// can never clear a slot that was already handed to a newer client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(uuid::Uuid);

impl ClientId {
    /// Creates a new random `ClientId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
