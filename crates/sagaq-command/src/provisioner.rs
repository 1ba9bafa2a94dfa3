//! External collaborator interface
//!
//! Commands never perform side effects themselves; they delegate to a
//! [`ProvisioningApi`] supplied at execution time. Production implementations
//! wrap the real customer-management/provisioning backend and live outside
//! this workspace. Tests inject recorders or mocks.

use crate::envelope::FieldMap;
use crate::error::ExecutionError;

/// Side-effecting operations the command variants delegate to
///
/// Implementations must be safe to share across await points; the scheduler
/// holds one behind `Arc<dyn ProvisioningApi>`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProvisioningApi: Send + Sync {
    /// Create a customer record in the backend
    ///
    /// # Errors
    /// `ExecutionError` if the backend refuses or cannot be reached
    async fn create_customer(
        &self,
        customer_id: &str,
        customer_data: &FieldMap,
    ) -> Result<(), ExecutionError>;

    /// Delete a customer record, compensating a failed create
    ///
    /// # Errors
    /// `ExecutionError` if the backend refuses or cannot be reached
    async fn delete_customer(&self, customer_id: &str) -> Result<(), ExecutionError>;

    /// Provision a resource in the backend
    ///
    /// # Errors
    /// `ExecutionError` if the backend refuses or cannot be reached
    async fn provision(
        &self,
        resource_id: &str,
        resource_config: &FieldMap,
    ) -> Result<(), ExecutionError>;

    /// Release a resource, compensating a failed provision
    ///
    /// # Errors
    /// `ExecutionError` if the backend refuses or cannot be reached
    async fn deprovision(&self, resource_id: &str) -> Result<(), ExecutionError>;
}
