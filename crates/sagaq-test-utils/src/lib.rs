//! Testing utilities for the sagaq workspace
//!
//! Shared collaborator doubles and command fixtures.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use sagaq_command::{
    CreateCustomer, ExecutionError, FieldMap, ProvisionResources, ProvisioningApi,
};

/// One observed collaborator call, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreateCustomer { customer_id: String },
    DeleteCustomer { customer_id: String },
    Provision { resource_id: String },
    Deprovision { resource_id: String },
}

impl ApiCall {
    pub fn is_execute(&self) -> bool {
        matches!(self, Self::CreateCustomer { .. } | Self::Provision { .. })
    }

    pub fn is_undo(&self) -> bool {
        !self.is_execute()
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    calls: Vec<ApiCall>,
    execute_failures: VecDeque<ExecutionError>,
    undo_failures: VecDeque<ExecutionError>,
    fail_every_execute: Option<ExecutionError>,
    fail_every_undo: Option<ExecutionError>,
    execute_delay: Option<Duration>,
}

/// Collaborator double that records every call and fails on script
///
/// Failures queued with `queue_execute_failure` fire once each, in
/// order, before any `fail_every_execute` verdict applies. The same
/// holds for the undo direction. An `execute_delay` suspends forward
/// calls, which is how deadline handling gets exercised.
#[derive(Debug, Default)]
pub struct RecordingApi {
    state: Mutex<RecordingState>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_execute_failure(&self, error: ExecutionError) {
        self.state.lock().execute_failures.push_back(error);
    }

    pub fn queue_undo_failure(&self, error: ExecutionError) {
        self.state.lock().undo_failures.push_back(error);
    }

    pub fn fail_every_execute(&self, error: ExecutionError) {
        self.state.lock().fail_every_execute = Some(error);
    }

    pub fn fail_every_undo(&self, error: ExecutionError) {
        self.state.lock().fail_every_undo = Some(error);
    }

    pub fn delay_executes(&self, delay: Duration) {
        self.state.lock().execute_delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn execute_call_count(&self) -> usize {
        self.state.lock().calls.iter().filter(|c| c.is_execute()).count()
    }

    pub fn undo_call_count(&self) -> usize {
        self.state.lock().calls.iter().filter(|c| c.is_undo()).count()
    }

    async fn record_execute(&self, call: ApiCall) -> Result<(), ExecutionError> {
        // verdict is decided under the lock; the delay happens outside it
        let (delay, verdict) = {
            let mut state = self.state.lock();
            state.calls.push(call);
            let verdict = if let Some(error) = state.execute_failures.pop_front() {
                Err(error)
            } else if let Some(error) = &state.fail_every_execute {
                Err(error.clone())
            } else {
                Ok(())
            };
            (state.execute_delay, verdict)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        verdict
    }

    fn record_undo(&self, call: ApiCall) -> Result<(), ExecutionError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if let Some(error) = state.undo_failures.pop_front() {
            Err(error)
        } else if let Some(error) = &state.fail_every_undo {
            Err(error.clone())
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl ProvisioningApi for RecordingApi {
    async fn create_customer(
        &self,
        customer_id: &str,
        _customer_data: &FieldMap,
    ) -> Result<(), ExecutionError> {
        self.record_execute(ApiCall::CreateCustomer {
            customer_id: customer_id.to_string(),
        })
        .await
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<(), ExecutionError> {
        self.record_undo(ApiCall::DeleteCustomer {
            customer_id: customer_id.to_string(),
        })
    }

    async fn provision(
        &self,
        resource_id: &str,
        _resource_config: &FieldMap,
    ) -> Result<(), ExecutionError> {
        self.record_execute(ApiCall::Provision {
            resource_id: resource_id.to_string(),
        })
        .await
    }

    async fn deprovision(&self, resource_id: &str) -> Result<(), ExecutionError> {
        self.record_undo(ApiCall::Deprovision {
            resource_id: resource_id.to_string(),
        })
    }
}

pub fn customer_data() -> FieldMap {
    let mut data = FieldMap::new();
    data.insert("name".to_string(), serde_json::json!("John Doe"));
    data
}

pub fn vm_config() -> FieldMap {
    let mut config = FieldMap::new();
    config.insert("type".to_string(), serde_json::json!("vm"));
    config
}

pub fn create_customer_command() -> CreateCustomer {
    CreateCustomer::new("123", customer_data())
}

pub fn provision_resources_command() -> ProvisionResources {
    ProvisionResources::new("res-456", vm_config())
}
