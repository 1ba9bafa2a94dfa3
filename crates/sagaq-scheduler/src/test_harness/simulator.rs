//! Scheduler simulator
//!
//! Schedules a seeded stream of random commands against a counting
//! collaborator while a seeded fault injector fails a fraction of
//! execution attempts, then drains the queue and checks the invariants
//! that hold for any run:
//! - the queue is empty after the drain
//! - every scheduled command terminated exactly once
//! - successful api calls match executed outcomes
//! - compensating api calls match compensated outcomes

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};

use sagaq_command::{
    Command, CommandRegistry, CreateCustomer, ExecutionError, FieldMap, ProvisionResources,
    ProvisioningApi,
};

use crate::fault::RandomFaults;
use crate::outcome::Outcome;
use crate::policy::RetryPolicy;
use crate::scheduler::{CommandScheduler, SchedulerConfig};

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of commands to schedule
    pub commands: u64,
    /// Probability that any single execution attempt fails
    pub failure_rate: f64,
    /// Attempts granted per command before compensation
    pub max_attempts: u32,
    /// Stop auditing after the first violation
    pub stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            commands: 100,
            failure_rate: 0.2,
            max_attempts: 1,
            stop_on_first_violation: true,
        }
    }
}

/// Collaborator that counts calls and always succeeds
///
/// Faults are injected ahead of the api call, so the counters measure
/// exactly the attempts that reached the collaborator.
#[derive(Debug, Default)]
pub struct CountingApi {
    create_customer_calls: AtomicU64,
    delete_customer_calls: AtomicU64,
    provision_calls: AtomicU64,
    deprovision_calls: AtomicU64,
}

impl CountingApi {
    /// Fresh collaborator with zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls that applied forward effects
    #[must_use]
    pub fn execute_calls(&self) -> u64 {
        self.create_customer_calls.load(Ordering::SeqCst)
            + self.provision_calls.load(Ordering::SeqCst)
    }

    /// Calls that applied compensating effects
    #[must_use]
    pub fn undo_calls(&self) -> u64 {
        self.delete_customer_calls.load(Ordering::SeqCst)
            + self.deprovision_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProvisioningApi for CountingApi {
    async fn create_customer(
        &self,
        _customer_id: &str,
        _customer_data: &FieldMap,
    ) -> Result<(), ExecutionError> {
        self.create_customer_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_customer(&self, _customer_id: &str) -> Result<(), ExecutionError> {
        self.delete_customer_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn provision(
        &self,
        _resource_id: &str,
        _resource_config: &FieldMap,
    ) -> Result<(), ExecutionError> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn deprovision(&self, _resource_id: &str) -> Result<(), ExecutionError> {
        self.deprovision_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An invariant breach detected while auditing a run
#[derive(Debug, Clone)]
pub enum Violation {
    /// Entries remained after the drain
    QueueNotDrained {
        /// Pending entries left behind
        remaining: usize,
    },
    /// Outcome counts do not add up to the scheduled count
    LedgerMismatch {
        /// Commands scheduled
        scheduled: u64,
        /// Commands that executed
        executed: u64,
        /// Commands that compensated
        compensated: u64,
    },
    /// Forward api calls disagree with executed outcomes
    ExecuteCallMismatch {
        /// Executed outcomes observed
        expected: u64,
        /// Forward api calls counted
        actual: u64,
    },
    /// Compensating api calls disagree with compensated outcomes
    CompensationCallMismatch {
        /// Compensated outcomes observed
        expected: u64,
        /// Compensating api calls counted
        actual: u64,
    },
    /// A hard scheduler error that this workload can never produce
    UnexpectedHardError {
        /// Formatted error
        description: String,
    },
}

/// Counters accumulated over a run
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatorStats {
    /// Commands accepted into the queue
    pub scheduled: u64,
    /// Commands that reached `Executed`
    pub executed: u64,
    /// Commands that reached `Compensated`
    pub compensated: u64,
    /// Forward api calls observed
    pub api_execute_calls: u64,
    /// Compensating api calls observed
    pub api_undo_calls: u64,
}

/// Final report from a simulator run
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    /// The configuration that produced this run
    pub config: SimulatorConfig,
    /// Accumulated counters
    pub stats: SimulatorStats,
    /// Invariant breaches, empty on a clean run
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// True when no invariant was breached
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Render a text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== sagaq Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Failure Rate: {}\n", self.config.failure_rate));
        report.push_str(&format!("Max Attempts: {}\n", self.config.max_attempts));
        report.push_str(&format!("Scheduled: {}\n", self.stats.scheduled));
        report.push_str(&format!("Executed: {}\n", self.stats.executed));
        report.push_str(&format!("Compensated: {}\n", self.stats.compensated));
        report.push_str(&format!("Api Execute Calls: {}\n", self.stats.api_execute_calls));
        report.push_str(&format!("Api Undo Calls: {}\n", self.stats.api_undo_calls));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

/// Run the simulator to completion
pub async fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let api = Arc::new(CountingApi::new());

    let scheduler_config = SchedulerConfig::default()
        .with_retry(RetryPolicy::attempts(config.max_attempts))
        .with_execute_timeout(None)
        .with_undo_timeout(None);

    // a distinct stream for the injector so command generation and fault
    // placement stay independently reproducible
    let faults = RandomFaults::seeded(config.seed.wrapping_add(1), config.failure_rate);

    let mut scheduler = CommandScheduler::in_memory(CommandRegistry::with_defaults(), api.clone())
        .with_config(scheduler_config)
        .with_fault_injector(faults);

    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();

    for i in 0..config.commands {
        let command = generate_command(&mut rng, i);
        match scheduler.schedule(command.as_ref()) {
            Ok(_) => stats.scheduled += 1,
            Err(e) => violations.push(Violation::UnexpectedHardError {
                description: format!("schedule #{i}: {e}"),
            }),
        }
        if config.stop_on_first_violation && !violations.is_empty() {
            break;
        }
    }

    loop {
        match scheduler.execute_next().await {
            Ok(Outcome::Idle) => break,
            Ok(Outcome::Executed { .. }) => stats.executed += 1,
            Ok(Outcome::Compensated { .. }) => stats.compensated += 1,
            Err(e) => {
                // this workload only schedules well-formed commands over a
                // collaborator that never fails, so any hard error is a bug
                violations.push(Violation::UnexpectedHardError {
                    description: e.to_string(),
                });
                if config.stop_on_first_violation {
                    break;
                }
            }
        }
    }

    stats.api_execute_calls = api.execute_calls();
    stats.api_undo_calls = api.undo_calls();

    audit(&mut violations, &stats, scheduler.queue_len(), &config);

    SimulatorReport {
        config,
        stats,
        violations,
    }
}

/// Check the run invariants and record breaches
fn audit(
    violations: &mut Vec<Violation>,
    stats: &SimulatorStats,
    remaining: usize,
    config: &SimulatorConfig,
) {
    if remaining > 0 {
        violations.push(Violation::QueueNotDrained { remaining });
        if config.stop_on_first_violation {
            return;
        }
    }

    if stats.executed + stats.compensated != stats.scheduled {
        violations.push(Violation::LedgerMismatch {
            scheduled: stats.scheduled,
            executed: stats.executed,
            compensated: stats.compensated,
        });
        if config.stop_on_first_violation {
            return;
        }
    }

    if stats.api_execute_calls != stats.executed {
        violations.push(Violation::ExecuteCallMismatch {
            expected: stats.executed,
            actual: stats.api_execute_calls,
        });
        if config.stop_on_first_violation {
            return;
        }
    }

    if stats.api_undo_calls != stats.compensated {
        violations.push(Violation::CompensationCallMismatch {
            expected: stats.compensated,
            actual: stats.api_undo_calls,
        });
    }
}

/// Generate a random well-formed command
fn generate_command(rng: &mut StdRng, index: u64) -> Box<dyn Command> {
    if rng.gen_bool(0.5) {
        let mut data = FieldMap::new();
        data.insert(
            "name".to_string(),
            serde_json::json!(format!("customer-{index}")),
        );
        data.insert("tier".to_string(), serde_json::json!(rng.gen_range(0..3)));
        Box::new(CreateCustomer::new(format!("cust-{index}"), data))
    } else {
        let mut config = FieldMap::new();
        config.insert(
            "type".to_string(),
            serde_json::json!(if rng.gen_bool(0.5) { "vm" } else { "bucket" }),
        );
        config.insert("size_gb".to_string(), serde_json::json!(rng.gen_range(1..512)));
        Box::new(ProvisionResources::new(format!("res-{index}"), config))
    }
}

#[tokio::test]
async fn test_clean_run_executes_everything() {
    let report = run_simulator(SimulatorConfig {
        failure_rate: 0.0,
        commands: 50,
        ..SimulatorConfig::default()
    })
    .await;

    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.stats.executed, 50);
    assert_eq!(report.stats.compensated, 0);
}

#[tokio::test]
async fn test_total_failure_compensates_everything() {
    let report = run_simulator(SimulatorConfig {
        failure_rate: 1.0,
        commands: 50,
        ..SimulatorConfig::default()
    })
    .await;

    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.stats.executed, 0);
    assert_eq!(report.stats.compensated, 50);
    assert_eq!(report.stats.api_undo_calls, 50);
}

#[tokio::test]
async fn test_same_seed_reproduces_ledger() {
    let config = SimulatorConfig {
        seed: 7,
        commands: 80,
        failure_rate: 0.3,
        max_attempts: 2,
        ..SimulatorConfig::default()
    };

    let first = run_simulator(config.clone()).await;
    let second = run_simulator(config).await;

    assert!(first.passed(), "{}", first.generate_text());
    assert_eq!(first.stats.executed, second.stats.executed);
    assert_eq!(first.stats.compensated, second.stats.compensated);
}

#[tokio::test]
async fn test_retries_keep_ledger_balanced() {
    let report = run_simulator(SimulatorConfig {
        seed: 11,
        commands: 60,
        failure_rate: 0.5,
        max_attempts: 3,
        ..SimulatorConfig::default()
    })
    .await;

    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(
        report.stats.executed + report.stats.compensated,
        report.stats.scheduled
    );
}
