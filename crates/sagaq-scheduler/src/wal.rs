//! Durable write-ahead-log queue
//!
//! [`WalQueue`] persists the queue as an append-only log, one serde record
//! per line. An envelope enters the log as a `scheduled` record and leaves
//! it as an `acked` record; the pending set is whatever has been scheduled
//! but not acked. Opening a log replays it, so entries that were in flight
//! when a process died come back as recovered work.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sagaq_command::SerializedCommand;
use serde::{Deserialize, Serialize};

use crate::queue::{QueueBackend, QueueEntry, QueueError};

/// One line in the log file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum WalRecord {
    /// Envelope accepted into the queue
    Scheduled {
        seq: u64,
        at: DateTime<Utc>,
        command: SerializedCommand,
    },
    /// Entry reached a terminal disposition and left the queue
    Acked { seq: u64 },
}

/// Append-only durable FIFO queue
///
/// # Invariants
/// - An entry is pending iff its `scheduled` record has no matching `acked`
///   record
/// - The instance assumes exclusive ownership of the file; callers must not
///   open the same log twice concurrently
pub struct WalQueue {
    path: PathBuf,
    writer: BufWriter<File>,
    pending: VecDeque<QueueEntry>,
    next_seq: u64,
    recovered: usize,
    sync_on_append: bool,
}

impl std::fmt::Debug for WalQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalQueue")
            .field("path", &self.path)
            .field("pending", &self.pending.len())
            .field("next_seq", &self.next_seq)
            .field("recovered", &self.recovered)
            .finish_non_exhaustive()
    }
}

impl WalQueue {
    /// Open a log, replaying any existing records
    ///
    /// A partial trailing line (torn write from a crash) is discarded and the
    /// file is truncated back to the last intact record, so later appends
    /// start on a clean line boundary; a corrupt line anywhere else fails the
    /// open.
    ///
    /// # Errors
    /// `QueueError::Io` on filesystem failure, `QueueError::Corrupt` on a
    /// damaged interior record
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        let mut pending: VecDeque<QueueEntry> = VecDeque::new();
        let mut next_seq = 1u64;

        if path.exists() {
            // byte offset of each line's end, so a torn tail can be cut off
            // exactly where the last intact record finished
            let mut reader = BufReader::new(File::open(&path)?);
            let mut lines: Vec<(String, u64)> = Vec::new();
            let mut file_len = 0u64;
            loop {
                let mut line = String::new();
                let read = reader.read_line(&mut line)?;
                if read == 0 {
                    break;
                }
                file_len += read as u64;
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                lines.push((line, file_len));
            }
            let last = lines.len().saturating_sub(1);
            let mut intact_len = 0u64;

            for (index, (line, end)) in lines.iter().enumerate() {
                if line.is_empty() {
                    intact_len = *end;
                    continue;
                }
                let record: WalRecord = match serde_json::from_str(line) {
                    Ok(record) => record,
                    Err(_) if index == last => {
                        tracing::warn!(
                            "dropping torn trailing record at line {} of {}",
                            index + 1,
                            path.display()
                        );
                        break;
                    }
                    Err(source) => {
                        return Err(QueueError::Corrupt {
                            line: index + 1,
                            source,
                        });
                    }
                };
                match record {
                    WalRecord::Scheduled { seq, command, .. } => {
                        next_seq = next_seq.max(seq + 1);
                        pending.push_back(QueueEntry { seq, command });
                    }
                    WalRecord::Acked { seq } => {
                        pending.retain(|entry| entry.seq != seq);
                    }
                }
                intact_len = *end;
            }

            if file_len > intact_len {
                let file = OpenOptions::new().write(true).open(&path)?;
                file.set_len(intact_len)?;
                file.sync_data()?;
            }
        }

        let writer = BufWriter::new(OpenOptions::new().create(true).append(true).open(&path)?);
        let recovered = pending.len();
        if recovered > 0 {
            tracing::info!(
                "recovered {} pending command(s) from {}",
                recovered,
                path.display()
            );
        }

        Ok(Self {
            path,
            writer,
            pending,
            next_seq,
            recovered,
            sync_on_append: true,
        })
    }

    /// Disable or enable fsync after each record
    ///
    /// On by default. Turning it off trades durability for throughput.
    #[must_use]
    pub fn with_sync(mut self, enabled: bool) -> Self {
        self.sync_on_append = enabled;
        self
    }

    /// Number of entries carried over from a previous run
    #[inline]
    #[must_use]
    pub fn recovered(&self) -> usize {
        self.recovered
    }

    /// Path of the backing log file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterate over pending entries in FIFO order
    pub fn pending(&self) -> impl Iterator<Item = &QueueEntry> {
        self.pending.iter()
    }

    fn write_record(&mut self, record: &WalRecord) -> Result<(), QueueError> {
        let line = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        if self.sync_on_append {
            self.writer.get_ref().sync_data()?;
        }
        Ok(())
    }
}

impl QueueBackend for WalQueue {
    fn append(&mut self, command: &SerializedCommand) -> Result<u64, QueueError> {
        let seq = self.next_seq;
        self.write_record(&WalRecord::Scheduled {
            seq,
            at: Utc::now(),
            command: command.clone(),
        })?;
        self.next_seq += 1;
        self.pending.push_back(QueueEntry {
            seq,
            command: command.clone(),
        });
        Ok(seq)
    }

    fn head(&self) -> Result<Option<QueueEntry>, QueueError> {
        Ok(self.pending.front().cloned())
    }

    fn ack(&mut self, seq: u64) -> Result<(), QueueError> {
        let Some(index) = self.pending.iter().position(|e| e.seq == seq) else {
            return Err(QueueError::UnknownSeq(seq));
        };
        // the record hits disk before the in-memory view changes
        self.write_record(&WalRecord::Acked { seq })?;
        self.pending.remove(index);
        Ok(())
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(kind: &str) -> SerializedCommand {
        SerializedCommand::new(kind).with_field("marker", kind.to_uppercase())
    }

    #[test]
    fn open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let queue = WalQueue::open(dir.path().join("queue.wal")).unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.recovered(), 0);
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.wal");

        let mut queue = WalQueue::open(&path).unwrap();
        queue.append(&envelope("first")).unwrap();
        queue.append(&envelope("second")).unwrap();
        drop(queue);

        let queue = WalQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.recovered(), 2);
        assert_eq!(queue.head().unwrap().unwrap().command.kind(), "first");
    }

    #[test]
    fn acked_entries_never_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.wal");

        let mut queue = WalQueue::open(&path).unwrap();
        let first = queue.append(&envelope("first")).unwrap();
        queue.append(&envelope("second")).unwrap();
        queue.ack(first).unwrap();
        drop(queue);

        let queue = WalQueue::open(&path).unwrap();
        assert_eq!(queue.recovered(), 1);
        assert_eq!(queue.head().unwrap().unwrap().command.kind(), "second");
    }

    #[test]
    fn sequences_continue_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.wal");

        let mut queue = WalQueue::open(&path).unwrap();
        let a = queue.append(&envelope("a")).unwrap();
        drop(queue);

        let mut queue = WalQueue::open(&path).unwrap();
        let b = queue.append(&envelope("b")).unwrap();
        assert!(b > a);
    }

    #[test]
    fn torn_trailing_line_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.wal");

        let mut queue = WalQueue::open(&path).unwrap();
        queue.append(&envelope("kept")).unwrap();
        drop(queue);

        // simulate a crash mid-write
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"op\":\"sched").unwrap();
        drop(file);

        let queue = WalQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.head().unwrap().unwrap().command.kind(), "kept");
    }

    #[test]
    fn appends_after_torn_tail_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.wal");

        let mut queue = WalQueue::open(&path).unwrap();
        queue.append(&envelope("kept")).unwrap();
        drop(queue);

        // simulate a crash mid-write
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"op\":\"sched").unwrap();
        drop(file);

        // recovery must leave the file appendable, not glue the next record
        // onto the torn bytes
        let mut queue = WalQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 1);
        queue.append(&envelope("fresh")).unwrap();
        drop(queue);

        let queue = WalQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 2);
        let kinds: Vec<&str> = queue
            .pending()
            .map(|entry| entry.command.kind())
            .collect();
        assert_eq!(kinds, ["kept", "fresh"]);
    }

    #[test]
    fn corrupt_interior_line_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.wal");

        let mut file = File::create(&path).unwrap();
        writeln!(file, "not json at all").unwrap();
        writeln!(
            file,
            "{}",
            serde_json::to_string(&WalRecord::Acked { seq: 1 }).unwrap()
        )
        .unwrap();
        drop(file);

        let err = WalQueue::open(&path).unwrap_err();
        assert!(matches!(err, QueueError::Corrupt { line: 1, .. }));
    }

    #[test]
    fn ack_unknown_seq_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = WalQueue::open(dir.path().join("queue.wal")).unwrap();
        assert!(matches!(queue.ack(7), Err(QueueError::UnknownSeq(7))));
    }

    #[test]
    fn envelope_fields_survive_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.wal");

        let original = envelope("first");
        let mut queue = WalQueue::open(&path).unwrap();
        queue.append(&original).unwrap();
        drop(queue);

        let queue = WalQueue::open(&path).unwrap();
        assert_eq!(queue.head().unwrap().unwrap().command, original);
    }
}
