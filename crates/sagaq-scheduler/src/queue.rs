//! Queue backends for the scheduler
//!
//! The scheduler stores serialized envelopes, never live commands. Removal
//! (`ack`) is decoupled from observation (`head`) so durable backends can
//! survive a crash between execution start and completion: an entry only
//! disappears once it is acked.

use std::collections::VecDeque;

use sagaq_command::SerializedCommand;
use serde::{Deserialize, Serialize};

/// A queued envelope with its assigned sequence number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Monotonic sequence assigned at append time, starting at 1
    pub seq: u64,
    /// The serialized command
    pub command: SerializedCommand,
}

/// Storage failure in a queue backend
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Underlying I/O failure
    #[error("queue i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record does not parse
    #[error("wal line {line} is not a valid record: {source}")]
    Corrupt {
        /// 1-based line number in the log file
        line: usize,
        /// Parse failure
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be encoded for persistence
    #[error("wal record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    /// Ack targeted a sequence that is not pending
    #[error("ack for unknown sequence {0}")]
    UnknownSeq(u64),
}

/// Storage backend for the scheduler's FIFO queue
pub trait QueueBackend: Send {
    /// Append an envelope to the tail
    ///
    /// # Errors
    /// Storage failure in durable backends
    fn append(&mut self, command: &SerializedCommand) -> Result<u64, QueueError>;

    /// The head entry, without removing it
    ///
    /// # Errors
    /// Storage failure in durable backends
    fn head(&self) -> Result<Option<QueueEntry>, QueueError>;

    /// Remove an entry previously returned by `head`
    ///
    /// # Errors
    /// `UnknownSeq` if the sequence is not pending, storage failure otherwise
    fn ack(&mut self, seq: u64) -> Result<(), QueueError>;

    /// Number of pending entries
    fn len(&self) -> usize;

    /// True when no entries are pending
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Volatile FIFO queue, the default backend
///
/// Infallible in practice; the fallible trait signatures exist for the
/// durable backends.
#[derive(Debug)]
pub struct InMemoryQueue {
    entries: VecDeque<QueueEntry>,
    next_seq: u64,
}

impl InMemoryQueue {
    /// Create an empty queue
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_seq: 1,
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueBackend for InMemoryQueue {
    fn append(&mut self, command: &SerializedCommand) -> Result<u64, QueueError> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(QueueEntry {
            seq,
            command: command.clone(),
        });
        Ok(seq)
    }

    fn head(&self) -> Result<Option<QueueEntry>, QueueError> {
        Ok(self.entries.front().cloned())
    }

    fn ack(&mut self, seq: u64) -> Result<(), QueueError> {
        match self.entries.iter().position(|e| e.seq == seq) {
            Some(index) => {
                self.entries.remove(index);
                Ok(())
            }
            None => Err(QueueError::UnknownSeq(seq)),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
