//! Admission pipeline: guards then validators, evaluated before any side effect.
//!
//! Evaluation order is registration order. The first blocking decision wins
//! and the rest are not consulted.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::request::{ResetRequest, TargetScope};

/// Verdict of a single guard or validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub should_proceed: bool,
    /// Policy-flagged problem (reported) rather than an expected skip.
    pub is_violation: bool,
    /// Whether a blocked request should still publish `ResetCompleted`, so a
    /// waiting scene transition is released.
    pub should_publish_completion: bool,
    pub reason: String,
    pub detail: String,
}

impl Decision {
    pub fn proceed() -> Self {
        Self {
            should_proceed: true,
            is_violation: false,
            should_publish_completion: false,
            reason: String::new(),
            detail: String::new(),
        }
    }

    /// Expected skip: logged at debug level only.
    pub fn skip(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            should_proceed: false,
            is_violation: false,
            should_publish_completion: true,
            reason: reason.into(),
            detail: detail.into(),
        }
    }

    pub fn violation(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            is_violation: true,
            ..Self::skip(reason, detail)
        }
    }

    pub fn without_completion(mut self) -> Self {
        self.should_publish_completion = false;
        self
    }
}

/// Admission check (e.g. "is the simulation gated against resets").
pub trait ResetGuard: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, request: &ResetRequest) -> Decision;
}

/// Structural check of the request itself.
pub trait ResetValidator: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, request: &ResetRequest) -> Decision;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionStage {
    Guard,
    Validator,
}

impl AdmissionStage {
    pub fn feature(self) -> &'static str {
        match self {
            Self::Guard => "ResetGuard",
            Self::Validator => "ResetValidator",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Blocked {
        stage: AdmissionStage,
        source: String,
        decision: Decision,
    },
}

#[derive(Clone, Default)]
pub struct AdmissionPipeline {
    guards: Vec<Arc<dyn ResetGuard>>,
    validators: Vec<Arc<dyn ResetValidator>>,
}

impl AdmissionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_guard(&mut self, guard: Arc<dyn ResetGuard>) {
        self.guards.push(guard);
    }

    pub fn push_validator(&mut self, validator: Arc<dyn ResetValidator>) {
        self.validators.push(validator);
    }

    pub fn evaluate(&self, request: &ResetRequest) -> Admission {
        for guard in &self.guards {
            let decision = guard.evaluate(request);
            if !decision.should_proceed {
                return Admission::Blocked {
                    stage: AdmissionStage::Guard,
                    source: guard.name().to_string(),
                    decision,
                };
            }
        }
        for validator in &self.validators {
            let decision = validator.evaluate(request);
            if !decision.should_proceed {
                return Admission::Blocked {
                    stage: AdmissionStage::Validator,
                    source: validator.name().to_string(),
                    decision,
                };
            }
        }
        Admission::Admitted
    }
}

/// Something that can hold the simulation closed to resets.
pub trait SimulationGate: Send + Sync {
    /// Name of an active hold, if any.
    fn active_hold(&self) -> Option<String>;
}

/// Named, counted holds on the simulation. Open when no hold is active.
#[derive(Debug, Default)]
pub struct GateTokens {
    holds: Mutex<BTreeMap<String, usize>>,
}

impl GateTokens {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, usize>> {
        self.holds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn acquire(&self, token: &str) {
        *self.lock().entry(token.to_string()).or_insert(0) += 1;
    }

    /// Returns false when `token` was not held.
    pub fn release(&self, token: &str) -> bool {
        let mut holds = self.lock();
        match holds.get_mut(token) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                holds.remove(token);
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_empty()
    }
}

impl SimulationGate for GateTokens {
    fn active_hold(&self) -> Option<String> {
        self.lock().keys().next().cloned()
    }
}

/// Skips resets while the simulation is gated.
pub struct SimulationGateGuard {
    gate: Arc<dyn SimulationGate>,
}

impl SimulationGateGuard {
    pub fn new(gate: Arc<dyn SimulationGate>) -> Self {
        Self { gate }
    }
}

impl ResetGuard for SimulationGateGuard {
    fn name(&self) -> &str {
        "SimulationGateGuard"
    }

    fn evaluate(&self, _request: &ResetRequest) -> Decision {
        match self.gate.active_hold() {
            Some(hold) => Decision::skip("SimulationGated", format!("hold={hold}")),
            None => Decision::proceed(),
        }
    }
}

pub const MAX_SIGNATURE_LEN: usize = 256;

/// Rejects malformed signatures. Empty ones pass: they are uncorrelatable,
/// not malformed.
pub struct SignatureValidator;

impl ResetValidator for SignatureValidator {
    fn name(&self) -> &str {
        "SignatureValidator"
    }

    fn evaluate(&self, request: &ResetRequest) -> Decision {
        let raw = request.signature().as_str();
        if raw.is_empty() {
            return Decision::proceed();
        }
        if raw.len() > MAX_SIGNATURE_LEN {
            return Decision::violation(
                "MalformedSignature",
                format!("length {} exceeds {MAX_SIGNATURE_LEN}", raw.len()),
            );
        }
        if raw.trim() != raw {
            return Decision::violation("MalformedSignature", "surrounding whitespace");
        }
        if raw.chars().any(char::is_control) {
            return Decision::violation("MalformedSignature", "control characters");
        }
        Decision::proceed()
    }
}

/// Rejects requests whose fields contradict their scope.
pub struct RequestShapeValidator;

impl ResetValidator for RequestShapeValidator {
    fn name(&self) -> &str {
        "RequestShapeValidator"
    }

    fn evaluate(&self, request: &ResetRequest) -> Decision {
        match request.scope() {
            TargetScope::ByKind if request.kind().is_none() => {
                Decision::violation("MissingActorKind", "ByKind request without a kind")
            }
            TargetScope::ActorIdSet => {
                let mut seen = HashSet::new();
                match request.ids().iter().find(|id| !seen.insert(*id)) {
                    Some(dup) => Decision::violation("DuplicateActorId", format!("id={dup}")),
                    None => Decision::proceed(),
                }
            }
            _ => Decision::proceed(),
        }
    }
}
