//! Fault injection hooks
//!
//! The scheduler consults a [`FaultInjector`] before every execution
//! attempt. An injected error short-circuits the attempt without touching
//! the collaborator, which makes failure paths exercisable on demand:
//! scripted closures for tests, a seeded random injector for simulation.
//! Nothing here reads the environment; a run is fully determined by its
//! inputs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sagaq_command::{ExecutionError, SerializedCommand};

/// Decides whether an execution attempt fails before it starts
pub trait FaultInjector: Send {
    /// Verdict for one attempt of one command
    ///
    /// `attempt` starts at 1. Returning `Some` fails the attempt with the
    /// given error.
    fn inject(&mut self, command: &SerializedCommand, attempt: u32) -> Option<ExecutionError>;
}

/// Never injects anything, the default
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn inject(&mut self, _command: &SerializedCommand, _attempt: u32) -> Option<ExecutionError> {
        None
    }
}

impl<F> FaultInjector for F
where
    F: FnMut(&SerializedCommand, u32) -> Option<ExecutionError> + Send,
{
    fn inject(&mut self, command: &SerializedCommand, attempt: u32) -> Option<ExecutionError> {
        self(command, attempt)
    }
}

/// Seeded probabilistic injector for simulation runs
///
/// Same seed and same call sequence give the same verdicts.
#[derive(Debug)]
pub struct RandomFaults {
    rng: StdRng,
    failure_rate: f64,
}

impl RandomFaults {
    /// Create an injector failing roughly `failure_rate` of attempts
    ///
    /// The rate is clamped into `0.0..=1.0`.
    #[must_use]
    pub fn seeded(seed: u64, failure_rate: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl FaultInjector for RandomFaults {
    fn inject(&mut self, command: &SerializedCommand, _attempt: u32) -> Option<ExecutionError> {
        if self.rng.gen_bool(self.failure_rate) {
            Some(ExecutionError::FaultInjected(format!(
                "seeded fault for kind `{}`",
                command.kind()
            )))
        } else {
            None
        }
    }
}
