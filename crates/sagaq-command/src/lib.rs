//! sagaq Command Model
//!
//! Serializable commands with compensating undo semantics.
//!
//! # Core Concepts
//!
//! - [`Command`]: Trait for executable, undoable, serializable units of work
//! - [`CreateCustomer`] / [`ProvisionResources`]: Built-in variants
//! - [`SerializedCommand`]: Kind-tagged wire envelope
//! - [`CommandRegistry`]: Kind-keyed constructor table for reconstruction
//! - [`ProvisioningApi`]: Injected external collaborator performing the side
//!   effects
//!
//! # Example
//!
//! ```rust,ignore
//! use sagaq_command::{CommandRegistry, CreateCustomer};
//!
//! let registry = CommandRegistry::with_defaults();
//!
//! let cmd = CreateCustomer::new("123", customer_data);
//! let envelope = cmd.serialize();
//!
//! // later, possibly in another process
//! let restored = registry.create(&envelope)?;
//! restored.execute(api.as_ref()).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
mod command;
mod envelope;
mod error;
mod provisioner;
mod registry;

// Re-exports
pub use command::{Command, CreateCustomer, ProvisionResources};
pub use envelope::{FieldMap, SerializedCommand};
pub use error::{DecodeError, ExecutionError, MalformedCommandError, UnknownKindError};
pub use provisioner::ProvisioningApi;
pub use registry::{CommandConstructor, CommandRegistry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
