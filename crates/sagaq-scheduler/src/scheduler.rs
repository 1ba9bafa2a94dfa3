//! Command scheduler
//!
//! [`CommandScheduler`] owns the queue, the registry, the collaborator
//! handle and the execution policy. All methods take `&mut self`: one
//! owner means one in-flight command, so `schedule` and `execute_next`
//! cannot interleave and no locking discipline is needed.
//!
//! Every queue entry is removed by exactly one `execute_next` call,
//! whatever the disposition: success, compensation, reconstruction
//! failure, or compensation failure. Nothing is ever re-enqueued.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};

use sagaq_command::{
    Command, CommandRegistry, DecodeError, ExecutionError, ProvisioningApi, SerializedCommand,
};

use crate::admission::{AdmissionChain, AdmissionError};
use crate::fault::{FaultInjector, NoFaults};
use crate::outcome::{DrainSummary, Outcome};
use crate::policy::RetryPolicy;
use crate::queue::{InMemoryQueue, QueueBackend, QueueError};

/// Scheduler tuning knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Attempt policy applied to every command
    pub retry: RetryPolicy,
    /// Deadline per execute attempt, `None` disables
    pub execute_timeout: Option<Duration>,
    /// Deadline for the compensating action, `None` disables
    pub undo_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            execute_timeout: Some(Duration::from_secs(30)),
            undo_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl SchedulerConfig {
    /// Set the retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-attempt execute deadline
    #[inline]
    #[must_use]
    pub fn with_execute_timeout(mut self, limit: Option<Duration>) -> Self {
        self.execute_timeout = limit;
        self
    }

    /// Set the compensation deadline
    #[inline]
    #[must_use]
    pub fn with_undo_timeout(mut self, limit: Option<Duration>) -> Self {
        self.undo_timeout = limit;
        self
    }
}

/// Hard failures surfaced by the scheduler
///
/// These are never converted into outcomes; callers must see them.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Queue backend storage failure
    #[error("queue backend failed: {0}")]
    Queue(#[from] QueueError),

    /// Admission pipeline refused the command, nothing was enqueued
    #[error("command admission rejected: {source}")]
    Rejected {
        /// The envelope that was refused
        command: SerializedCommand,
        /// The rejecting policy's verdict
        #[source]
        source: AdmissionError,
    },

    /// Head entry could not be reconstructed; the entry was dropped
    #[error("cannot reconstruct queued command: {source}")]
    Decode {
        /// The offending envelope, returned for quarantine
        command: SerializedCommand,
        /// Unknown kind or malformed fields
        #[source]
        source: DecodeError,
    },

    /// The compensating action itself failed; manual intervention required
    #[error("compensation failed: {undo_error} (execution failed first: {execute_error})")]
    CompensationFailed {
        /// The envelope whose compensation failed
        command: SerializedCommand,
        /// Failure from the final execution attempt
        execute_error: ExecutionError,
        /// Failure from the undo call
        undo_error: ExecutionError,
    },
}

/// Strictly sequential FIFO scheduler with compensating execution
pub struct CommandScheduler<Q: QueueBackend = InMemoryQueue> {
    queue: Q,
    registry: CommandRegistry,
    api: Arc<dyn ProvisioningApi>,
    faults: Box<dyn FaultInjector>,
    admission: AdmissionChain,
    config: SchedulerConfig,
}

impl CommandScheduler<InMemoryQueue> {
    /// Create a scheduler backed by the volatile in-memory queue
    #[must_use]
    pub fn in_memory(registry: CommandRegistry, api: Arc<dyn ProvisioningApi>) -> Self {
        Self::with_queue(InMemoryQueue::new(), registry, api)
    }
}

impl<Q: QueueBackend> CommandScheduler<Q> {
    /// Create a scheduler on an explicit queue backend
    ///
    /// A freshly opened durable backend may already hold recovered entries;
    /// they are executed before anything scheduled afterwards.
    #[must_use]
    pub fn with_queue(queue: Q, registry: CommandRegistry, api: Arc<dyn ProvisioningApi>) -> Self {
        Self {
            queue,
            registry,
            api,
            faults: Box::new(NoFaults),
            admission: AdmissionChain::new(),
            config: SchedulerConfig::default(),
        }
    }

    /// Replace the configuration, builder style
    #[must_use]
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Install a fault injector, builder style
    #[must_use]
    pub fn with_fault_injector(mut self, faults: impl FaultInjector + 'static) -> Self {
        self.faults = Box::new(faults);
        self
    }

    /// Install an admission chain, builder style
    #[must_use]
    pub fn with_admission(mut self, admission: AdmissionChain) -> Self {
        self.admission = admission;
        self
    }

    /// Number of pending entries
    #[inline]
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is pending
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// The underlying queue backend
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Serialize a command and append it to the queue tail
    ///
    /// The live object is not retained; only the envelope is stored. On
    /// success the queue grows by exactly one entry.
    ///
    /// # Errors
    /// - `SchedulerError::Rejected` if an installed admission policy
    ///   refuses the envelope (the queue is untouched)
    /// - `SchedulerError::Queue` if a durable backend fails to persist
    pub fn schedule(&mut self, command: &dyn Command) -> Result<u64, SchedulerError> {
        let mut envelope = command.serialize();
        if let Err(source) = self.admission.apply(&mut envelope) {
            tracing::warn!("Command `{}` refused at admission: {}", envelope.kind(), source);
            return Err(SchedulerError::Rejected {
                command: envelope,
                source,
            });
        }

        let seq = self.queue.append(&envelope)?;
        tracing::info!(
            "Scheduled `{}` as #{} ({} pending)",
            envelope.kind(),
            seq,
            self.queue.len()
        );
        Ok(seq)
    }

    /// Take the head entry, reconstruct it, and run it to a terminal state
    ///
    /// An empty queue is a no-op (`Outcome::Idle`). Otherwise the entry is
    /// removed by this call on every path and the queue shrinks by exactly
    /// one, regardless of retry policy or disposition.
    ///
    /// # Errors
    /// - `SchedulerError::Decode` if the envelope has an unknown kind or
    ///   malformed fields; the entry is dropped and rides the error
    /// - `SchedulerError::CompensationFailed` if `undo` fails after a
    ///   failed execution; never swallowed
    /// - `SchedulerError::Queue` on backend storage failure
    pub async fn execute_next(&mut self) -> Result<Outcome, SchedulerError> {
        let Some(entry) = self.queue.head()? else {
            tracing::debug!("Queue empty, nothing to execute");
            return Ok(Outcome::Idle);
        };

        let command = match self.registry.create(&entry.command) {
            Ok(command) => command,
            Err(source) => {
                // a poison entry must not wedge the queue; drop it and
                // hand the envelope back inside the error
                self.queue.ack(entry.seq)?;
                tracing::error!("Dropping undecodable entry #{}: {}", entry.seq, source);
                return Err(SchedulerError::Decode {
                    command: entry.command,
                    source,
                });
            }
        };

        let mut attempts = 0u32;
        let error = loop {
            attempts += 1;
            tracing::debug!(
                "Executing `{}` (#{}), attempt {}",
                command.kind(),
                entry.seq,
                attempts
            );
            match self.attempt(&entry.command, command.as_ref(), attempts).await {
                Ok(()) => {
                    self.queue.ack(entry.seq)?;
                    tracing::info!(
                        "Executed `{}` (#{}) after {} attempt(s)",
                        command.kind(),
                        entry.seq,
                        attempts
                    );
                    return Ok(Outcome::Executed {
                        command: entry.command,
                        attempts,
                    });
                }
                Err(error) if self.config.retry.should_retry(attempts, &error) => {
                    tracing::warn!(
                        "Attempt {} of `{}` (#{}) failed, retrying: {}",
                        attempts,
                        command.kind(),
                        entry.seq,
                        error
                    );
                    if !self.config.retry.backoff.is_zero() {
                        sleep(self.config.retry.backoff).await;
                    }
                }
                Err(error) => break error,
            }
        };

        tracing::warn!(
            "Execution of `{}` (#{}) failed, compensating: {}",
            command.kind(),
            entry.seq,
            error
        );
        let undo = with_deadline(self.config.undo_timeout, command.undo(self.api.as_ref())).await;
        self.queue.ack(entry.seq)?;

        match undo {
            Ok(()) => Ok(Outcome::Compensated {
                command: entry.command,
                error,
                attempts,
            }),
            Err(undo_error) => {
                tracing::error!(
                    "Compensation for `{}` (#{}) failed: {}",
                    command.kind(),
                    entry.seq,
                    undo_error
                );
                Err(SchedulerError::CompensationFailed {
                    command: entry.command,
                    execute_error: error,
                    undo_error,
                })
            }
        }
    }

    /// Run `execute_next` until the queue is empty
    ///
    /// # Errors
    /// The first hard error aborts the drain
    pub async fn drain(&mut self) -> Result<DrainSummary, SchedulerError> {
        let start = Instant::now();
        let mut summary = DrainSummary::default();
        loop {
            match self.execute_next().await? {
                Outcome::Idle => break,
                Outcome::Executed { .. } => summary.executed += 1,
                Outcome::Compensated { .. } => summary.compensated += 1,
            }
        }
        summary.elapsed_ms = start.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// One execution attempt: fault hook first, then the real call under
    /// its deadline
    async fn attempt(
        &mut self,
        envelope: &SerializedCommand,
        command: &dyn Command,
        attempt: u32,
    ) -> Result<(), ExecutionError> {
        if let Some(injected) = self.faults.inject(envelope, attempt) {
            return Err(injected);
        }
        with_deadline(self.config.execute_timeout, command.execute(self.api.as_ref())).await
    }
}

/// Bound an operation by an optional deadline
async fn with_deadline(
    limit: Option<Duration>,
    operation: impl Future<Output = Result<(), ExecutionError>>,
) -> Result<(), ExecutionError> {
    match limit {
        None => operation.await,
        Some(limit) => match timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::Timeout {
                limit_ms: limit.as_millis() as u64,
            }),
        },
    }
}
