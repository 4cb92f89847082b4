use baseline_common::ContextSignature;

use crate::participant::ResetPhase;

/// Errors surfaced by the reset pipeline.
///
/// Most problems are degraded conditions that are logged and counted, not
/// raised. What remains here either rejects a request outright or is an
/// explicitly enabled strict-mode escalation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResetError {
    #[error("a reset is already in progress")]
    AlreadyInProgress,
    #[error("reset for signature {0} is already in flight")]
    SignatureInFlight(ContextSignature),
    #[error("strict-mode violation in {feature}: {reason}")]
    StrictViolation { feature: String, reason: String },
    #[error("{phase} phase failed for {failures} participant call(s)")]
    PhaseFailed { phase: ResetPhase, failures: usize },
    #[error("controller reset failed for {failures} controller(s)")]
    ControllersFailed { failures: usize },
    #[error("spawn service {service} failed: {source}")]
    Spawn {
        service: String,
        #[source]
        source: ParticipantError,
    },
}

/// Failure reported by a participant, controller, or spawn service call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParticipantError {
    message: String,
}

impl ParticipantError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
