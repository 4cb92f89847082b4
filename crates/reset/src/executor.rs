//! Reset executor: controller pass, essential-presence check, then the three
//! participant phases over the resolved working set.
//!
//! # Invariants
//! - Controllers are reset concurrently, in ascending instance-id order, and
//!   all of them finish before anything else happens.
//! - Every participant call of a phase, across every target, finishes before
//!   the next phase starts.
//! - Participant failures are counted and logged; by default execution
//!   continues best-effort.

use baseline_common::{ActorId, ActorKind};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::actor::{ActorRegistry, ResetTarget, SceneScanner};
use crate::controller::{ControllerContext, LifecycleController};
use crate::degraded::DegradedReport;
use crate::discovery::TargetResolver;
use crate::error::ResetError;
use crate::participant::{ResetContext, ResetParticipant, ResetPhase, invoke, plan_participants};
use crate::policy::WorldResetPolicy;
use crate::request::ResetRequest;
use crate::spawn::{SpawnContext, SpawnServiceRegistry, spawn_service_name};

const FEATURE: &str = "ResetExecutor";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub continue_on_participant_error: bool,
    /// Kinds that must exist after the controller pass; missing ones are
    /// respawned through their spawn service.
    pub essential_kinds: Vec<ActorKind>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            continue_on_participant_error: true,
            essential_kinds: vec![ActorKind::Player, ActorKind::Eater],
        }
    }
}

/// What one execution did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub controllers_reset: usize,
    pub controller_failures: usize,
    pub spawned: Vec<ActorKind>,
    pub spawn_failures: usize,
    /// Working set, in execution order.
    pub targets: Vec<ActorId>,
    pub fallback_used: bool,
    pub invocations: usize,
    pub participant_failures: usize,
    /// A degraded condition was recovered during execution.
    pub degraded: bool,
}

impl ExecutionReport {
    pub fn failures(&self) -> usize {
        self.controller_failures + self.spawn_failures + self.participant_failures
    }
}

struct TargetPlan {
    ctx: ResetContext,
    participants: Vec<Arc<dyn ResetParticipant>>,
}

pub struct ResetExecutor {
    config: ExecutorConfig,
    registry: Option<Arc<dyn ActorRegistry>>,
    spawners: Option<Arc<dyn SpawnServiceRegistry>>,
    resolver: TargetResolver,
    policy: Arc<dyn WorldResetPolicy>,
}

impl ResetExecutor {
    pub fn new(
        config: ExecutorConfig,
        registry: Option<Arc<dyn ActorRegistry>>,
        scanner: Option<Arc<dyn SceneScanner>>,
        spawners: Option<Arc<dyn SpawnServiceRegistry>>,
        policy: Arc<dyn WorldResetPolicy>,
    ) -> Self {
        Self {
            resolver: TargetResolver::new(registry.clone(), scanner, policy.clone()),
            config,
            registry,
            spawners,
            policy,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub async fn execute(
        &self,
        request: &ResetRequest,
        controllers: Vec<Arc<dyn LifecycleController>>,
    ) -> Result<ExecutionReport, ResetError> {
        let mut report = ExecutionReport::default();

        self.reset_controllers(request, controllers, &mut report)
            .await?;
        self.ensure_essentials(request, &mut report).await?;

        let discovery = self.resolver.resolve(request)?;
        report.fallback_used = discovery.fallback_used;
        report.degraded |= discovery.fallback_used;
        if discovery.targets.is_empty() {
            report.degraded = true;
            self.degraded(
                request,
                "NoTargets",
                format!(
                    "scope={} requested_ids={} registry_present={} scan_disabled={}",
                    request.scope(),
                    request.ids().len(),
                    discovery.registry_present,
                    discovery.scan_disabled
                ),
            )?;
            return Ok(report);
        }

        report.targets = discovery.targets.iter().map(|t| t.actor_id.clone()).collect();
        let plans: Vec<TargetPlan> = discovery
            .targets
            .iter()
            .map(|target| self.plan(request, target))
            .collect();

        for phase in ResetPhase::ALL {
            let failures = self.run_phase(phase, &plans, &mut report).await;
            if failures > 0 && !self.config.continue_on_participant_error {
                return Err(ResetError::PhaseFailed { phase, failures });
            }
        }
        Ok(report)
    }

    async fn reset_controllers(
        &self,
        request: &ResetRequest,
        mut controllers: Vec<Arc<dyn LifecycleController>>,
        report: &mut ExecutionReport,
    ) -> Result<(), ResetError> {
        controllers.sort_by_key(|c| c.instance_id());
        let ctx = ControllerContext {
            signature: request.signature().clone(),
            reason: request.reason().to_string(),
        };
        let results = join_all(controllers.iter().map(|c| c.reset_world(&ctx))).await;
        for (controller, result) in controllers.iter().zip(results) {
            match result {
                Ok(()) => report.controllers_reset += 1,
                Err(e) => {
                    report.controller_failures += 1;
                    warn!(
                        signature = %request.signature(),
                        controller = controller.name(),
                        instance_id = controller.instance_id(),
                        error = %e,
                        "controller reset failed"
                    );
                }
            }
        }
        debug!(
            reset = report.controllers_reset,
            failed = report.controller_failures,
            "controller pass finished"
        );
        if report.controller_failures > 0 && !self.config.continue_on_participant_error {
            return Err(ResetError::ControllersFailed {
                failures: report.controller_failures,
            });
        }
        Ok(())
    }

    async fn ensure_essentials(
        &self,
        request: &ResetRequest,
        report: &mut ExecutionReport,
    ) -> Result<(), ResetError> {
        let kinds: Vec<ActorKind> = self
            .config
            .essential_kinds
            .iter()
            .copied()
            .filter(|k| request.covers_kind(*k))
            .collect();
        if kinds.is_empty() {
            return Ok(());
        }
        let Some(registry) = &self.registry else {
            report.degraded = true;
            return self.degraded(
                request,
                "NoActorRegistry",
                "essential presence check skipped".into(),
            );
        };

        let actors = registry.actors();
        let classifier = self.resolver.classifier();
        for kind in kinds {
            if actors
                .iter()
                .any(|actor| classifier.kind_of(actor.as_ref()) == Some(kind))
            {
                continue;
            }

            let Some(spawners) = &self.spawners else {
                report.degraded = true;
                self.degraded(request, "NoSpawnRegistry", format!("missing={kind}"))?;
                continue;
            };
            let Some(service) = spawners.find_for_kind(kind) else {
                report.degraded = true;
                self.degraded(
                    request,
                    "NoSpawnService",
                    format!("missing={kind} service={}", spawn_service_name(kind)),
                )?;
                continue;
            };

            let ctx = SpawnContext {
                signature: request.signature().clone(),
                reason: request.reason().to_string(),
                kind,
            };
            match service.spawn(&ctx).await {
                Ok(()) => {
                    info!(
                        signature = %request.signature(),
                        kind = %kind,
                        service = service.name(),
                        "essential actor respawned"
                    );
                    report.spawned.push(kind);
                }
                Err(e) => {
                    report.spawn_failures += 1;
                    error!(
                        signature = %request.signature(),
                        kind = %kind,
                        service = service.name(),
                        error = %e,
                        "essential actor respawn failed"
                    );
                    if !self.config.continue_on_participant_error {
                        return Err(ResetError::Spawn {
                            service: service.name().to_string(),
                            source: e,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn plan(&self, request: &ResetRequest, target: &ResetTarget) -> TargetPlan {
        TargetPlan {
            ctx: ResetContext {
                signature: request.signature().clone(),
                reason: request.reason().to_string(),
                scope: request.scope(),
                actor_id: target.actor_id.clone(),
                kind: target.kind,
            },
            participants: plan_participants(target, target.root.participants()),
        }
    }

    /// Start every call of `phase` across all plans, then wait for all of them.
    async fn run_phase(
        &self,
        phase: ResetPhase,
        plans: &[TargetPlan],
        report: &mut ExecutionReport,
    ) -> usize {
        let calls = plans.iter().flat_map(|plan| {
            plan.participants.iter().map(move |p| async move {
                let result = invoke(p.as_ref(), phase, &plan.ctx).await;
                (p.name().to_string(), &plan.ctx.actor_id, result)
            })
        });
        let results = join_all(calls).await;

        let mut failures = 0;
        for (participant, actor, result) in &results {
            if let Err(e) = result {
                failures += 1;
                warn!(
                    phase = %phase,
                    participant = %participant,
                    actor = %actor,
                    error = %e,
                    "participant reset failed"
                );
            }
        }
        report.invocations += results.len();
        report.participant_failures += failures;
        debug!(phase = %phase, calls = results.len(), failures, "phase finished");
        failures
    }

    fn degraded(
        &self,
        request: &ResetRequest,
        reason: &str,
        detail: String,
    ) -> Result<(), ResetError> {
        self.policy
            .report_degraded(
                DegradedReport::new(FEATURE, reason)
                    .detail(detail)
                    .signature(request.signature())
                    .profile(request.profile())
                    .target(request.scope()),
            )
            .map(|_| ())
    }
}
