//! Public entry point for reset requests.
//!
//! Single-flight per signature: while a reset for a signature is in flight,
//! further requests for the same signature are ignored and report `false`.
//! Requests without a signature are not tracked here.

use baseline_common::ContextSignature;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::error::ResetError;
use crate::orchestrator::{ResetOrchestrator, ResetRun};
use crate::request::ResetRequest;

pub struct ResetService {
    orchestrator: Arc<ResetOrchestrator>,
    in_flight: Mutex<HashSet<ContextSignature>>,
}

impl ResetService {
    pub fn new(orchestrator: Arc<ResetOrchestrator>) -> Self {
        Self {
            orchestrator,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn orchestrator(&self) -> &Arc<ResetOrchestrator> {
        &self.orchestrator
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<ContextSignature>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_in_flight(&self, signature: &ContextSignature) -> bool {
        self.in_flight().contains(signature)
    }

    /// Returns true when the reset completed without an unrecovered failure.
    pub async fn request_reset(&self, request: ResetRequest) -> bool {
        match self.execute(request).await {
            Ok(run) => run.outcome.is_success(),
            Err(_) => false,
        }
    }

    /// Reset every actor, correlated with `signature`.
    pub async fn request_reset_for(
        &self,
        signature: impl Into<ContextSignature>,
        reason: &str,
    ) -> bool {
        self.request_reset(ResetRequest::all_actors(reason).with_signature(signature))
            .await
    }

    /// Like [`request_reset`](Self::request_reset), keeping the run details.
    pub async fn execute(&self, request: ResetRequest) -> Result<ResetRun, ResetError> {
        info!(
            tag = "ResetRequested",
            signature = %request.signature(),
            reason = %request.reason(),
            profile = request.profile().unwrap_or_default(),
            target = %request.scope(),
            "ResetRequested"
        );

        let Some(_claim) = InFlightClaim::acquire(self, request.signature()) else {
            warn!(
                signature = %request.signature(),
                reason = %request.reason(),
                "duplicate reset request ignored"
            );
            return Err(ResetError::SignatureInFlight(request.signature().clone()));
        };

        let result = self.orchestrator.run(&request).await;
        match &result {
            Ok(run) => info!(
                tag = "ResetCompleted",
                signature = %request.signature(),
                reason = %request.reason(),
                profile = request.profile().unwrap_or_default(),
                target = %request.scope(),
                outcome = %run.outcome,
                success = run.outcome.is_success(),
                "ResetCompleted"
            ),
            Err(e) => warn!(
                tag = "ResetCompleted",
                signature = %request.signature(),
                reason = %request.reason(),
                profile = request.profile().unwrap_or_default(),
                target = %request.scope(),
                success = false,
                error = %e,
                "ResetCompleted"
            ),
        }
        result
    }
}

/// Registration in the in-flight set, removed on drop.
struct InFlightClaim<'a> {
    service: &'a ResetService,
    signature: Option<ContextSignature>,
}

impl<'a> InFlightClaim<'a> {
    fn acquire(service: &'a ResetService, signature: &ContextSignature) -> Option<Self> {
        if signature.is_empty() {
            return Some(Self {
                service,
                signature: None,
            });
        }
        if !service.in_flight().insert(signature.clone()) {
            return None;
        }
        Some(Self {
            service,
            signature: Some(signature.clone()),
        })
    }
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        if let Some(signature) = &self.signature {
            self.service.in_flight().remove(signature);
        }
    }
}
