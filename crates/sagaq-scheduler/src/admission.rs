//! Schedule-time admission pipeline
//!
//! Before an envelope enters the queue it passes through an ordered chain
//! of [`AdmissionPolicy`] stages. A stage can validate the envelope, enrich
//! it with extra fields, or reject it outright; the first rejection stops
//! the chain and the command is never enqueued. The default chain is empty,
//! which keeps `schedule` infallible for in-memory use.

use std::fmt;

use sagaq_command::SerializedCommand;

/// Rejection verdict from an admission policy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("admission policy `{policy}` rejected the command: {reason}")]
pub struct AdmissionError {
    /// Name of the rejecting policy
    pub policy: String,
    /// Human-readable reason
    pub reason: String,
}

impl AdmissionError {
    /// Create a rejection verdict
    #[inline]
    #[must_use]
    pub fn new(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            reason: reason.into(),
        }
    }
}

/// One stage of the admission pipeline
pub trait AdmissionPolicy: Send {
    /// Name used in rejection errors and logs
    fn name(&self) -> &str;

    /// Ordering hint, lower runs earlier; ties keep insertion order
    fn priority(&self) -> i32 {
        0
    }

    /// Inspect and possibly enrich the envelope, or reject it
    ///
    /// # Errors
    /// `AdmissionError` to keep the command out of the queue
    fn admit(&self, command: &mut SerializedCommand) -> Result<(), AdmissionError>;
}

/// Priority-ordered chain of admission policies
#[derive(Default)]
pub struct AdmissionChain {
    policies: Vec<Box<dyn AdmissionPolicy>>,
}

impl fmt::Debug for AdmissionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.policies.iter().map(|p| p.name()))
            .finish()
    }
}

impl AdmissionChain {
    /// Create an empty chain
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy, keeping the chain sorted by priority
    pub fn push(&mut self, policy: impl AdmissionPolicy + 'static) {
        let priority = policy.priority();
        let index = self
            .policies
            .iter()
            .position(|p| p.priority() > priority)
            .unwrap_or(self.policies.len());
        self.policies.insert(index, Box::new(policy));
    }

    /// Add a policy, builder style
    #[must_use]
    pub fn with_policy(mut self, policy: impl AdmissionPolicy + 'static) -> Self {
        self.push(policy);
        self
    }

    /// Number of installed policies
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// True when no policies are installed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Run every policy in order, stopping at the first rejection
    ///
    /// # Errors
    /// The first `AdmissionError` raised by a policy
    pub fn apply(&self, command: &mut SerializedCommand) -> Result<(), AdmissionError> {
        for policy in &self.policies {
            policy.admit(command)?;
        }
        Ok(())
    }
}

/// Built-in validation stage requiring named fields to be present
#[derive(Debug, Clone)]
pub struct RequireFields {
    fields: Vec<&'static str>,
}

impl RequireFields {
    /// Require the given fields on every admitted envelope
    #[inline]
    #[must_use]
    pub fn new(fields: Vec<&'static str>) -> Self {
        Self { fields }
    }
}

impl AdmissionPolicy for RequireFields {
    fn name(&self) -> &str {
        "require_fields"
    }

    fn admit(&self, command: &mut SerializedCommand) -> Result<(), AdmissionError> {
        for field in &self.fields {
            if command.field(field).is_none() {
                return Err(AdmissionError::new(
                    self.name(),
                    format!("missing required field `{}`", field),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Stamp {
        name: &'static str,
        priority: i32,
    }

    impl AdmissionPolicy for Stamp {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn admit(&self, command: &mut SerializedCommand) -> Result<(), AdmissionError> {
            let trail = match command.field("trail") {
                Some(serde_json::Value::String(s)) => format!("{},{}", s, self.name),
                _ => self.name.to_string(),
            };
            command.set_field("trail", trail);
            Ok(())
        }
    }

    struct RejectAll;

    impl AdmissionPolicy for RejectAll {
        fn name(&self) -> &str {
            "reject_all"
        }

        fn priority(&self) -> i32 {
            1
        }

        fn admit(&self, _command: &mut SerializedCommand) -> Result<(), AdmissionError> {
            Err(AdmissionError::new("reject_all", "not today"))
        }
    }

    #[test]
    fn empty_chain_admits() {
        let chain = AdmissionChain::new();
        let mut envelope = SerializedCommand::new("create_customer");
        assert!(chain.apply(&mut envelope).is_ok());
    }

    #[test]
    fn policies_run_in_priority_order() {
        // pushed out of order on purpose
        let chain = AdmissionChain::new()
            .with_policy(Stamp {
                name: "routing",
                priority: 4,
            })
            .with_policy(Stamp {
                name: "validation",
                priority: 1,
            })
            .with_policy(Stamp {
                name: "enrichment",
                priority: 2,
            });

        let mut envelope = SerializedCommand::new("create_customer");
        chain.apply(&mut envelope).unwrap();
        assert_eq!(
            envelope.field("trail"),
            Some(&json!("validation,enrichment,routing"))
        );
    }

    #[test]
    fn rejection_short_circuits() {
        let chain = AdmissionChain::new()
            .with_policy(Stamp {
                name: "late",
                priority: 9,
            })
            .with_policy(RejectAll);

        let mut envelope = SerializedCommand::new("create_customer");
        let err = chain.apply(&mut envelope).unwrap_err();
        assert_eq!(err.policy, "reject_all");
        // the later stage never ran
        assert!(envelope.field("trail").is_none());
    }

    #[test]
    fn enrichment_mutates_the_envelope() {
        struct Enrich;
        impl AdmissionPolicy for Enrich {
            fn name(&self) -> &str {
                "enrichment"
            }
            fn admit(&self, command: &mut SerializedCommand) -> Result<(), AdmissionError> {
                command.set_field("enriched", true);
                Ok(())
            }
        }

        let chain = AdmissionChain::new().with_policy(Enrich);
        let mut envelope = SerializedCommand::new("provision_resources");
        chain.apply(&mut envelope).unwrap();
        assert_eq!(envelope.field("enriched"), Some(&json!(true)));
    }

    #[test]
    fn require_fields_accepts_and_rejects() {
        let policy = RequireFields::new(vec!["customer_id"]);
        let chain = AdmissionChain::new().with_policy(policy);

        let mut good = SerializedCommand::new("create_customer").with_field("customer_id", "123");
        assert!(chain.apply(&mut good).is_ok());

        let mut bad = SerializedCommand::new("create_customer");
        let err = chain.apply(&mut bad).unwrap_err();
        assert!(err.reason.contains("customer_id"));
    }
}
