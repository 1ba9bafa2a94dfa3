//! Terminal outcomes of queue processing
//!
//! Every queue entry ends in exactly one of two terminal states: executed
//! or compensated. An empty queue yields `Idle`. Reconstruction and
//! compensation failures are not outcomes; they surface as hard errors from
//! the scheduler.

use sagaq_command::{ExecutionError, SerializedCommand};

/// Disposition of one `execute_next` call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Queue was empty, nothing ran
    Idle,

    /// Head command executed successfully
    Executed {
        /// The envelope that ran
        command: SerializedCommand,
        /// Attempts consumed, counting the successful one
        attempts: u32,
    },

    /// Execution failed and the compensating action ran
    Compensated {
        /// The envelope that failed
        command: SerializedCommand,
        /// Failure from the final attempt
        error: ExecutionError,
        /// Attempts consumed before compensating
        attempts: u32,
    },
}

impl Outcome {
    /// True for the empty-queue no-op
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// True when the head command succeeded
    #[inline]
    #[must_use]
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed { .. })
    }

    /// True when the head command failed and was compensated
    #[inline]
    #[must_use]
    pub fn is_compensated(&self) -> bool {
        matches!(self, Self::Compensated { .. })
    }

    /// The envelope this outcome is about, if any
    #[inline]
    #[must_use]
    pub fn command(&self) -> Option<&SerializedCommand> {
        match self {
            Self::Idle => None,
            Self::Executed { command, .. } | Self::Compensated { command, .. } => Some(command),
        }
    }
}

/// Aggregate result of draining the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Entries that executed successfully
    pub executed: u64,
    /// Entries that failed and were compensated
    pub compensated: u64,
    /// Wall time spent draining
    pub elapsed_ms: u64,
}

impl DrainSummary {
    /// Entries that reached a terminal state
    #[inline]
    #[must_use]
    pub fn total(&self) -> u64 {
        self.executed + self.compensated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_predicates() {
        let envelope = SerializedCommand::new("create_customer");

        assert!(Outcome::Idle.is_idle());
        assert!(Outcome::Idle.command().is_none());

        let executed = Outcome::Executed {
            command: envelope.clone(),
            attempts: 1,
        };
        assert!(executed.is_executed());
        assert_eq!(executed.command(), Some(&envelope));

        let compensated = Outcome::Compensated {
            command: envelope.clone(),
            error: ExecutionError::Unavailable("down".to_string()),
            attempts: 2,
        };
        assert!(compensated.is_compensated());
        assert_eq!(compensated.command(), Some(&envelope));
    }

    #[test]
    fn drain_summary_total() {
        let summary = DrainSummary {
            executed: 3,
            compensated: 2,
            elapsed_ms: 10,
        };
        assert_eq!(summary.total(), 5);
    }
}
