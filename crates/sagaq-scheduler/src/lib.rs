//! sagaq scheduler
//!
//! Strictly sequential FIFO execution of serialized commands with
//! compensating rollback:
//! 1. **Schedule**: commands are serialized at the door and queued as
//!    envelopes, optionally through an admission pipeline
//! 2. **Execute**: the head entry is reconstructed through the registry
//!    and run under a retry policy; a command whose attempts are
//!    exhausted is compensated by its own `undo` before the next entry
//!    runs
//!
//! Queues are pluggable: [`InMemoryQueue`] for volatile work,
//! [`WalQueue`] for a write-ahead log that replays unacknowledged
//! entries after a crash.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sagaq_command::{CommandRegistry, CreateCustomer};
//! use sagaq_scheduler::{CommandScheduler, Outcome};
//!
//! let mut scheduler = CommandScheduler::in_memory(CommandRegistry::with_defaults(), api);
//! scheduler.schedule(&CreateCustomer::new("123", customer_data))?;
//!
//! match scheduler.execute_next().await? {
//!     Outcome::Executed { command, .. } => println!("done: {}", command.kind()),
//!     Outcome::Compensated { error, .. } => println!("rolled back: {error}"),
//!     Outcome::Idle => {}
//! }
//! ```

// Core modules
pub mod admission;
pub mod fault;
pub mod outcome;
pub mod policy;
pub mod queue;
pub mod scheduler;
pub mod wal;

// Test harness
pub mod test_harness;

// Re-exports
pub use admission::{AdmissionChain, AdmissionError, AdmissionPolicy, RequireFields};
pub use fault::{FaultInjector, NoFaults, RandomFaults};
pub use outcome::{DrainSummary, Outcome};
pub use policy::RetryPolicy;
pub use queue::{InMemoryQueue, QueueBackend, QueueEntry, QueueError};
pub use scheduler::{CommandScheduler, SchedulerConfig, SchedulerError};
pub use wal::WalQueue;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
