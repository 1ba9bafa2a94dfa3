//! Command trait and built-in variants
//!
//! A [`Command`] is a unit of work that can be executed against the
//! provisioning backend, undone if execution fails, and flattened into a
//! [`SerializedCommand`] for queueing. Variants are plain structs dispatched
//! through the registry's kind-keyed constructor table; there is no
//! inheritance hierarchy to mirror.

use std::fmt::Debug;

use crate::envelope::{FieldMap, SerializedCommand};
use crate::error::{ExecutionError, MalformedCommandError};
use crate::provisioner::ProvisioningApi;

/// A serializable, executable, undoable unit of work
///
/// # Contract
/// - `serialize` is total for valid commands and embeds `kind()` as the tag
/// - `undo` is only meaningful after a failed `execute`; it compensates the
///   partial effect, it does not roll back a success
/// - Implementations hold plain data only, no live references
///
/// # Example
/// ```rust,ignore
/// let cmd = CreateCustomer::new("123", customer_data);
/// let envelope = cmd.serialize();
/// let back = registry.create(&envelope)?;
/// assert_eq!(back.serialize(), envelope);
/// ```
#[async_trait::async_trait]
pub trait Command: Debug + Send + Sync {
    /// Stable tag identifying this variant in serialized form
    fn kind(&self) -> &'static str;

    /// Perform the side effect against the injected collaborator
    ///
    /// # Errors
    /// `ExecutionError` when the external operation fails
    async fn execute(&self, api: &dyn ProvisioningApi) -> Result<(), ExecutionError>;

    /// Best-effort compensating action after a failed `execute`
    ///
    /// # Errors
    /// `ExecutionError` when the compensating operation itself fails; the
    /// scheduler escalates this, it never feeds back into the flow
    async fn undo(&self, api: &dyn ProvisioningApi) -> Result<(), ExecutionError>;

    /// Flatten into the kind-tagged envelope
    fn serialize(&self) -> SerializedCommand;
}

/// Create a customer record, compensated by deleting it
#[derive(Debug, Clone, PartialEq)]
pub struct CreateCustomer {
    customer_id: String,
    customer_data: FieldMap,
}

impl CreateCustomer {
    /// Kind tag for this variant
    pub const KIND: &'static str = "create_customer";

    /// Create a new command
    #[inline]
    #[must_use]
    pub fn new(customer_id: impl Into<String>, customer_data: FieldMap) -> Self {
        Self {
            customer_id: customer_id.into(),
            customer_data,
        }
    }

    /// Customer identifier
    #[inline]
    #[must_use]
    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    /// Customer payload forwarded to the backend
    #[inline]
    #[must_use]
    pub fn customer_data(&self) -> &FieldMap {
        &self.customer_data
    }

    /// Rebuild from a serialized envelope
    ///
    /// The caller (normally the registry) has already matched the kind tag.
    ///
    /// # Errors
    /// `MalformedCommandError` if required fields are absent or mistyped
    pub fn from_serialized(serialized: &SerializedCommand) -> Result<Self, MalformedCommandError> {
        Ok(Self {
            customer_id: serialized.require_str("customer_id")?.to_string(),
            customer_data: serialized.require_object("customer_data")?.clone(),
        })
    }

    /// Boxed constructor with the registry's function-pointer signature
    ///
    /// # Errors
    /// Same as [`Self::from_serialized`]
    pub fn reconstruct(
        serialized: &SerializedCommand,
    ) -> Result<Box<dyn Command>, MalformedCommandError> {
        Ok(Box::new(Self::from_serialized(serialized)?))
    }
}

#[async_trait::async_trait]
impl Command for CreateCustomer {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn execute(&self, api: &dyn ProvisioningApi) -> Result<(), ExecutionError> {
        api.create_customer(&self.customer_id, &self.customer_data)
            .await
    }

    async fn undo(&self, api: &dyn ProvisioningApi) -> Result<(), ExecutionError> {
        api.delete_customer(&self.customer_id).await
    }

    fn serialize(&self) -> SerializedCommand {
        SerializedCommand::new(Self::KIND)
            .with_field("customer_id", self.customer_id.clone())
            .with_field("customer_data", self.customer_data.clone())
    }
}

/// Provision a resource, compensated by releasing it
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionResources {
    resource_id: String,
    resource_config: FieldMap,
}

impl ProvisionResources {
    /// Kind tag for this variant
    pub const KIND: &'static str = "provision_resources";

    /// Create a new command
    #[inline]
    #[must_use]
    pub fn new(resource_id: impl Into<String>, resource_config: FieldMap) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_config,
        }
    }

    /// Resource identifier
    #[inline]
    #[must_use]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Resource configuration forwarded to the backend
    #[inline]
    #[must_use]
    pub fn resource_config(&self) -> &FieldMap {
        &self.resource_config
    }

    /// Rebuild from a serialized envelope
    ///
    /// # Errors
    /// `MalformedCommandError` if required fields are absent or mistyped
    pub fn from_serialized(serialized: &SerializedCommand) -> Result<Self, MalformedCommandError> {
        Ok(Self {
            resource_id: serialized.require_str("resource_id")?.to_string(),
            resource_config: serialized.require_object("resource_config")?.clone(),
        })
    }

    /// Boxed constructor with the registry's function-pointer signature
    ///
    /// # Errors
    /// Same as [`Self::from_serialized`]
    pub fn reconstruct(
        serialized: &SerializedCommand,
    ) -> Result<Box<dyn Command>, MalformedCommandError> {
        Ok(Box::new(Self::from_serialized(serialized)?))
    }
}

#[async_trait::async_trait]
impl Command for ProvisionResources {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn execute(&self, api: &dyn ProvisioningApi) -> Result<(), ExecutionError> {
        api.provision(&self.resource_id, &self.resource_config)
            .await
    }

    async fn undo(&self, api: &dyn ProvisioningApi) -> Result<(), ExecutionError> {
        api.deprovision(&self.resource_id).await
    }

    fn serialize(&self) -> SerializedCommand {
        SerializedCommand::new(Self::KIND)
            .with_field("resource_id", self.resource_id.clone())
            .with_field("resource_config", self.resource_config.clone())
    }
}
