//! Command registry for envelope reconstruction
//!
//! Provides [`CommandRegistry`], the kind-keyed constructor table that turns
//! a [`SerializedCommand`] back into a live [`Command`]. Dispatch is an open
//! table lookup, so downstream crates can register their own variants next
//! to the built-ins.

use std::collections::HashMap;

use crate::command::{Command, CreateCustomer, ProvisionResources};
use crate::envelope::SerializedCommand;
use crate::error::{DecodeError, MalformedCommandError, UnknownKindError};

/// Constructor signature stored in the table
///
/// Takes the envelope, returns the reconstructed command or a field-level
/// decode failure.
pub type CommandConstructor =
    fn(&SerializedCommand) -> Result<Box<dyn Command>, MalformedCommandError>;

/// Kind-keyed table of command constructors
///
/// Registration takes `&mut self`, so the table is assembled at startup and
/// read-only once shared. There is no interior mutability to race on.
#[derive(Debug, Default, Clone)]
pub struct CommandRegistry {
    constructors: HashMap<String, CommandConstructor>,
}

impl CommandRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Create registry with the built-in variants
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(CreateCustomer::KIND, CreateCustomer::reconstruct);
        registry.register(ProvisionResources::KIND, ProvisionResources::reconstruct);
        registry
    }

    /// Register a constructor for a kind, replacing any previous binding
    pub fn register(&mut self, kind: &str, constructor: CommandConstructor) {
        self.constructors.insert(kind.to_string(), constructor);
    }

    /// Reconstruct a command from its serialized envelope
    ///
    /// # Errors
    /// - `DecodeError::UnknownKind` if no constructor is registered for the
    ///   envelope's kind
    /// - `DecodeError::Malformed` if the constructor rejects the fields
    pub fn create(&self, serialized: &SerializedCommand) -> Result<Box<dyn Command>, DecodeError> {
        let constructor =
            self.constructors
                .get(serialized.kind())
                .ok_or_else(|| UnknownKindError {
                    kind: serialized.kind().to_string(),
                })?;
        Ok(constructor(serialized)?)
    }

    /// Check if a kind is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// List all registered kinds
    #[inline]
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.constructors.keys().map(|k| k.as_str()).collect()
    }

    /// Get number of registered kinds
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::FieldMap;
    use crate::error::ExecutionError;
    use crate::provisioner::ProvisioningApi;
    use serde_json::json;

    #[test]
    fn registry_new_empty() {
        let registry = CommandRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn registry_with_defaults() {
        let registry = CommandRegistry::with_defaults();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("create_customer"));
        assert!(registry.contains("provision_resources"));
    }

    #[test]
    fn registry_create_dispatches_by_kind() {
        let registry = CommandRegistry::with_defaults();
        let mut data = FieldMap::new();
        data.insert("name".to_string(), json!("John Doe"));
        let envelope = CreateCustomer::new("123", data).serialize();

        let command = registry.create(&envelope).unwrap();
        assert_eq!(command.kind(), "create_customer");
        assert_eq!(command.serialize(), envelope);
    }

    #[test]
    fn registry_create_unknown_kind() {
        let registry = CommandRegistry::with_defaults();
        let envelope = SerializedCommand::new("unknown_type");

        let err = registry.create(&envelope).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownKind(UnknownKindError {
                kind: "unknown_type".to_string(),
            })
        );
    }

    #[test]
    fn registry_create_malformed_fields() {
        let registry = CommandRegistry::with_defaults();
        let envelope = SerializedCommand::new("provision_resources");

        let err = registry.create(&envelope).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Noop;

    impl Noop {
        const KIND: &'static str = "noop";

        fn reconstruct(
            _serialized: &SerializedCommand,
        ) -> Result<Box<dyn Command>, MalformedCommandError> {
            Ok(Box::new(Self))
        }
    }

    #[async_trait::async_trait]
    impl Command for Noop {
        fn kind(&self) -> &'static str {
            Self::KIND
        }

        async fn execute(&self, _api: &dyn ProvisioningApi) -> Result<(), ExecutionError> {
            Ok(())
        }

        async fn undo(&self, _api: &dyn ProvisioningApi) -> Result<(), ExecutionError> {
            Ok(())
        }

        fn serialize(&self) -> SerializedCommand {
            SerializedCommand::new(Self::KIND)
        }
    }

    #[test]
    fn registry_accepts_external_kinds() {
        let mut registry = CommandRegistry::with_defaults();
        registry.register(Noop::KIND, Noop::reconstruct);

        assert_eq!(registry.len(), 3);
        let command = registry
            .create(&SerializedCommand::new("noop"))
            .unwrap();
        assert_eq!(command.kind(), "noop");
    }

    #[test]
    fn registry_register_overwrites() {
        let mut registry = CommandRegistry::with_defaults();
        registry.register(CreateCustomer::KIND, Noop::reconstruct);

        assert_eq!(registry.len(), 2);
        let envelope = SerializedCommand::new("create_customer");
        // the replacement constructor ignores fields entirely
        let command = registry.create(&envelope).unwrap();
        assert_eq!(command.kind(), "noop");
    }

    #[test]
    fn registry_kinds_lists_all() {
        let registry = CommandRegistry::with_defaults();
        let kinds = registry.kinds();
        assert!(kinds.contains(&"create_customer"));
        assert!(kinds.contains(&"provision_resources"));
    }
}
