//! # Reset orchestrator.
//!
//! Stateless between invocations. One run is:
//!
//! ```text
//! guard ─► validate ─► discover controllers ─► Started ─► execute ─► Completed
//!   │          │               │ (none)                                 ▲
//!   └──────────┴───────────────┴──────────────► Completed ──────────────┘
//! ```
//!
//! ## Rules
//! - At most one run executes at a time. A concurrent call is rejected; it
//!   publishes `Completed(Failed)` with [`REJECTED_REASON`] only when it carries
//!   a signature of its own, different from the run in flight.
//! - Once `Started` is published, `Completed` is published exactly once, even
//!   when execution fails, panics, or the run future is dropped.
//! - A strict-mode escalation propagates to the caller only after `Completed`.

use baseline_common::ContextSignature;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, error, info, warn};

use crate::actor::{ActorRegistry, SceneScanner};
use crate::bus::{ResetBus, ResetEvent};
use crate::controller::ControllerSource;
use crate::degraded::DegradedReport;
use crate::error::ResetError;
use crate::executor::{ExecutionReport, ExecutorConfig, ResetExecutor};
use crate::guard::{Admission, AdmissionPipeline, ResetGuard, ResetValidator};
use crate::policy::WorldResetPolicy;
use crate::request::{ResetOutcome, ResetRequest};
use crate::spawn::SpawnServiceRegistry;

const FEATURE: &str = "ResetOrchestrator";

/// Completion reason published when no lifecycle controller was found.
pub const NO_CONTROLLER_REASON: &str = "no-controller";

/// Completion reason published for a request rejected by a run in flight.
pub const REJECTED_REASON: &str = "rejected:in-progress";

/// What one orchestrated run did.
#[derive(Debug, Clone)]
pub struct ResetRun {
    pub outcome: ResetOutcome,
    /// Absent when the run stopped before execution.
    pub report: Option<ExecutionReport>,
    pub completion_published: bool,
}

pub struct OrchestratorBuilder {
    policy: Arc<dyn WorldResetPolicy>,
    bus: Option<ResetBus>,
    registry: Option<Arc<dyn ActorRegistry>>,
    scanner: Option<Arc<dyn SceneScanner>>,
    spawners: Option<Arc<dyn SpawnServiceRegistry>>,
    controllers: Option<Arc<dyn ControllerSource>>,
    admission: AdmissionPipeline,
    executor: ExecutorConfig,
}

impl OrchestratorBuilder {
    pub fn bus(mut self, bus: ResetBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn ActorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn scanner(mut self, scanner: Arc<dyn SceneScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn spawners(mut self, spawners: Arc<dyn SpawnServiceRegistry>) -> Self {
        self.spawners = Some(spawners);
        self
    }

    pub fn controllers(mut self, controllers: Arc<dyn ControllerSource>) -> Self {
        self.controllers = Some(controllers);
        self
    }

    pub fn guard(mut self, guard: Arc<dyn ResetGuard>) -> Self {
        self.admission.push_guard(guard);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn ResetValidator>) -> Self {
        self.admission.push_validator(validator);
        self
    }

    pub fn executor_config(mut self, config: ExecutorConfig) -> Self {
        self.executor = config;
        self
    }

    pub fn build(self) -> ResetOrchestrator {
        ResetOrchestrator {
            executor: ResetExecutor::new(
                self.executor,
                self.registry,
                self.scanner,
                self.spawners,
                self.policy.clone(),
            ),
            bus: self.bus.unwrap_or_else(|| ResetBus::new(64)),
            controllers: self.controllers,
            admission: self.admission,
            policy: self.policy,
            permit: Semaphore::new(1),
            in_flight: Mutex::new(None),
        }
    }
}

pub struct ResetOrchestrator {
    policy: Arc<dyn WorldResetPolicy>,
    bus: ResetBus,
    controllers: Option<Arc<dyn ControllerSource>>,
    admission: AdmissionPipeline,
    executor: ResetExecutor,
    permit: Semaphore,
    /// Signature of the run holding `permit`.
    in_flight: Mutex<Option<ContextSignature>>,
}

impl ResetOrchestrator {
    pub fn builder(policy: Arc<dyn WorldResetPolicy>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            policy,
            bus: None,
            registry: None,
            scanner: None,
            spawners: None,
            controllers: None,
            admission: AdmissionPipeline::new(),
            executor: ExecutorConfig::default(),
        }
    }

    pub fn bus(&self) -> &ResetBus {
        &self.bus
    }

    pub fn policy(&self) -> &Arc<dyn WorldResetPolicy> {
        &self.policy
    }

    pub fn is_running(&self) -> bool {
        self.permit.available_permits() == 0
    }

    pub async fn run(&self, request: &ResetRequest) -> Result<ResetRun, ResetError> {
        let Some(_slot) = self.claim(request) else {
            self.reject(request);
            return Err(ResetError::AlreadyInProgress);
        };

        if let Admission::Blocked {
            stage,
            source,
            decision,
        } = self.admission.evaluate(request)
        {
            let escalation = if decision.is_violation {
                self.policy
                    .report_degraded(
                        degraded_report(request, stage.feature(), &decision.reason)
                            .detail(format!("source={source} {}", decision.detail)),
                    )
                    .err()
            } else {
                debug!(
                    signature = %request.signature(),
                    source = %source,
                    reason = %decision.reason,
                    detail = %decision.detail,
                    "reset skipped"
                );
                None
            };
            let completion_published = decision.should_publish_completion;
            if completion_published {
                self.publish_completed(
                    request,
                    &format!("blocked:{}", decision.reason),
                    ResetOutcome::Blocked,
                );
            }
            return match escalation {
                Some(e) => Err(e),
                None => Ok(ResetRun {
                    outcome: ResetOutcome::Blocked,
                    report: None,
                    completion_published,
                }),
            };
        }

        let controllers = self
            .controllers
            .as_ref()
            .map(|source| source.controllers())
            .unwrap_or_default();
        if controllers.is_empty() {
            let escalation = self
                .policy
                .report_degraded(
                    degraded_report(request, FEATURE, "NoController")
                        .detail(format!("scope={}", request.scope())),
                )
                .err();
            self.publish_completed(request, NO_CONTROLLER_REASON, ResetOutcome::NoController);
            return match escalation {
                Some(e) => Err(e),
                None => Ok(ResetRun {
                    outcome: ResetOutcome::NoController,
                    report: None,
                    completion_published: true,
                }),
            };
        }

        let mut completion = CompletionGuard::arm(&self.bus, request);
        info!(
            tag = "ResetStarted",
            signature = %request.signature(),
            reason = %request.reason(),
            profile = request.profile().unwrap_or_default(),
            target = %request.scope(),
            controllers = controllers.len(),
            "ResetStarted"
        );
        self.bus.publish(ResetEvent::started(
            request.signature(),
            request.reason(),
            request.scope(),
        ));

        match self.executor.execute(request, controllers).await {
            Ok(report) => {
                let outcome = if report.failures() > 0 {
                    ResetOutcome::Failed
                } else if report.degraded {
                    ResetOutcome::Degraded
                } else {
                    ResetOutcome::Succeeded
                };
                completion.finish(outcome);
                Ok(ResetRun {
                    outcome,
                    report: Some(report),
                    completion_published: true,
                })
            }
            Err(e) => {
                error!(
                    tag = "ResetFailed",
                    signature = %request.signature(),
                    reason = %request.reason(),
                    target = %request.scope(),
                    error = %e,
                    "ResetFailed"
                );
                completion.finish(ResetOutcome::Failed);
                Err(e)
            }
        }
    }

    fn in_flight(&self) -> MutexGuard<'_, Option<ContextSignature>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(&self, request: &ResetRequest) -> Option<RunSlot<'_>> {
        let permit = self.permit.try_acquire().ok()?;
        *self.in_flight() = Some(request.signature().clone());
        Some(RunSlot {
            _permit: permit,
            in_flight: &self.in_flight,
        })
    }

    /// A same-signature duplicate is served by the running reset's own
    /// `Completed`; anything else still needs one so its waiters release.
    fn reject(&self, request: &ResetRequest) {
        let signature = request.signature();
        let running = self.in_flight().clone();
        if signature.is_empty() || running.as_ref() == Some(signature) {
            debug!(signature = %signature, "reset rejected: another run in progress");
            return;
        }
        warn!(
            signature = %signature,
            reason = %request.reason(),
            target = %request.scope(),
            running = %running.unwrap_or_default(),
            "reset rejected: another run in progress"
        );
        self.publish_completed(request, REJECTED_REASON, ResetOutcome::Failed);
    }

    fn publish_completed(&self, request: &ResetRequest, reason: &str, outcome: ResetOutcome) {
        self.bus.publish(ResetEvent::completed(
            request.signature(),
            reason,
            request.scope(),
            outcome,
        ));
    }
}

fn degraded_report(request: &ResetRequest, feature: &str, reason: &str) -> DegradedReport {
    DegradedReport::new(feature, reason)
        .signature(request.signature())
        .profile(request.profile())
        .target(request.scope())
}

/// The exclusive run permit. Clears the in-flight signature before the
/// permit is released.
struct RunSlot<'a> {
    _permit: SemaphorePermit<'a>,
    in_flight: &'a Mutex<Option<ContextSignature>>,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Publishes `Completed` exactly once: explicitly via [`finish`](Self::finish),
/// or as `Failed` on drop.
struct CompletionGuard<'a> {
    bus: &'a ResetBus,
    request: &'a ResetRequest,
    armed: bool,
}

impl<'a> CompletionGuard<'a> {
    fn arm(bus: &'a ResetBus, request: &'a ResetRequest) -> Self {
        Self {
            bus,
            request,
            armed: true,
        }
    }

    fn finish(&mut self, outcome: ResetOutcome) {
        if !self.armed {
            return;
        }
        self.armed = false;
        self.bus.publish(ResetEvent::completed(
            self.request.signature(),
            self.request.reason(),
            self.request.scope(),
            outcome,
        ));
    }
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            error!(
                tag = "ResetFailed",
                signature = %self.request.signature(),
                reason = %self.request.reason(),
                detail = "aborted before completion",
                "ResetFailed"
            );
            self.finish(ResetOutcome::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ResetEventKind;
    use crate::controller::LifecycleController;
    use crate::degraded::{DegradedConfig, StrictEscalation};
    use crate::guard::{Decision, GateTokens, RequestShapeValidator, SimulationGateGuard};
    use crate::mode::RuntimeMode;
    use crate::participant::ResetPhase;
    use crate::policy::PolicyConfig;
    use crate::test_support::*;
    use baseline_common::ActorKind;
    use std::time::Duration;
    use tokio::sync::broadcast;

    fn drain(rx: &mut broadcast::Receiver<ResetEvent>) -> Vec<ResetEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn completed(events: &[ResetEvent]) -> Vec<&ResetEvent> {
        events
            .iter()
            .filter(|e| e.kind == ResetEventKind::Completed)
            .collect()
    }

    fn controllers(log: &Log) -> Arc<dyn ControllerSource> {
        let list: Vec<Arc<dyn LifecycleController>> = vec![MockController::new(1, log)];
        Arc::new(list)
    }

    fn no_essentials() -> ExecutorConfig {
        ExecutorConfig {
            essential_kinds: Vec::new(),
            ..ExecutorConfig::default()
        }
    }

    fn orchestrator(
        policy: Arc<dyn WorldResetPolicy>,
        registry: Arc<MockRegistry>,
        log: &Log,
    ) -> OrchestratorBuilder {
        ResetOrchestrator::builder(policy)
            .registry(registry)
            .controllers(controllers(log))
            .executor_config(no_essentials())
    }

    #[tokio::test]
    async fn happy_path_publishes_started_then_completed() {
        let (policy, _) = release_policy();
        let log = new_log();
        let probe = Probe::new("p", 0, &log).participant();
        let registry = MockRegistry::with(vec![actor("a", None, vec![probe])]);
        let orch = orchestrator(policy, registry, &log).build();
        let mut rx = orch.bus().subscribe();

        let run = orch
            .run(&ResetRequest::all_actors("qa").with_signature("tx:1"))
            .await
            .unwrap();
        assert_eq!(run.outcome, ResetOutcome::Succeeded);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ResetEventKind::Started);
        assert_eq!(events[1].kind, ResetEventKind::Completed);
        assert_eq!(events[1].signature.as_str(), "tx:1");
        assert_eq!(events[1].reason, "qa");
        assert!(events[0].seq < events[1].seq);
    }

    #[tokio::test]
    async fn completed_exactly_once_for_every_path() {
        let (policy, _) = release_policy();
        let log = new_log();
        let registry = MockRegistry::with(vec![actor(
            "a",
            None,
            vec![Probe::new("bad", 0, &log).failing(ResetPhase::Restore).participant()],
        )]);
        let gate = Arc::new(GateTokens::new());
        let orch = orchestrator(policy.clone(), registry, &log)
            .guard(Arc::new(SimulationGateGuard::new(gate.clone())))
            .validator(Arc::new(RequestShapeValidator))
            .build();
        let mut rx = orch.bus().subscribe();

        // Participant failure.
        let run = orch.run(&ResetRequest::all_actors("qa")).await.unwrap();
        assert_eq!(run.outcome, ResetOutcome::Failed);
        assert_eq!(completed(&drain(&mut rx)).len(), 1);

        // Validation failure.
        let run = orch.run(&ResetRequest::by_unspecified_kind("qa")).await.unwrap();
        assert_eq!(run.outcome, ResetOutcome::Blocked);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(completed(&events)[0].outcome, Some(ResetOutcome::Blocked));

        // Guard skip.
        gate.acquire("loading");
        orch.run(&ResetRequest::all_actors("qa")).await.unwrap();
        assert_eq!(completed(&drain(&mut rx)).len(), 1);
        gate.release("loading");

        // No controllers.
        let bare = ResetOrchestrator::builder(policy)
            .bus(orch.bus().clone())
            .build();
        let run = bare.run(&ResetRequest::all_actors("qa")).await.unwrap();
        assert_eq!(run.outcome, ResetOutcome::NoController);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, NO_CONTROLLER_REASON);
    }

    #[tokio::test]
    async fn guard_can_suppress_completion() {
        struct Quiet;
        impl ResetGuard for Quiet {
            fn name(&self) -> &str {
                "Quiet"
            }
            fn evaluate(&self, _request: &ResetRequest) -> Decision {
                Decision::skip("Quiet", "").without_completion()
            }
        }
        let (policy, _) = release_policy();
        let log = new_log();
        let orch = orchestrator(policy, MockRegistry::with(Vec::new()), &log)
            .guard(Arc::new(Quiet))
            .build();
        let mut rx = orch.bus().subscribe();
        let run = orch.run(&ResetRequest::all_actors("qa")).await.unwrap();
        assert!(!run.completion_published);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn violations_are_reported_but_skips_are_not() {
        let (policy, reporter) = release_policy();
        let log = new_log();
        let gate = Arc::new(GateTokens::new());
        gate.acquire("menu");
        let orch = orchestrator(policy, MockRegistry::with(Vec::new()), &log)
            .guard(Arc::new(SimulationGateGuard::new(gate.clone())))
            .validator(Arc::new(RequestShapeValidator))
            .build();
        orch.run(&ResetRequest::all_actors("qa")).await.unwrap();
        assert_eq!(reporter.summary().total, 0);

        gate.release("menu");
        orch.run(&ResetRequest::by_unspecified_kind("qa")).await.unwrap();
        assert_eq!(reporter.count("ResetValidator", "MissingActorKind"), 1);
    }

    #[tokio::test]
    async fn strict_fail_propagates_after_completion() {
        let (policy, _) = policy_with(
            RuntimeMode::Strict,
            PolicyConfig::default(),
            DegradedConfig {
                strict_escalation: StrictEscalation::Fail,
                ..DegradedConfig::default()
            },
        );
        let log = new_log();
        let orch = orchestrator(policy, MockRegistry::with(Vec::new()), &log).build();
        let mut rx = orch.bus().subscribe();
        let err = orch
            .run(&ResetRequest::actor_ids(Vec::new(), "qa"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResetError::StrictViolation { .. }));
        let events = drain(&mut rx);
        assert_eq!(completed(&events).len(), 1);
        assert_eq!(completed(&events)[0].outcome, Some(ResetOutcome::Failed));
    }

    #[tokio::test]
    async fn empty_id_set_still_completes() {
        let (policy, reporter) = release_policy();
        let log = new_log();
        let registry = MockRegistry::with(vec![actor("a", Some(ActorKind::Player), Vec::new())]);
        let orch = orchestrator(policy, registry, &log).build();
        let mut rx = orch.bus().subscribe();
        let run = orch
            .run(&ResetRequest::actor_ids(Vec::new(), "qa"))
            .await
            .unwrap();
        assert_eq!(run.outcome, ResetOutcome::Degraded);
        assert_eq!(reporter.count("ResetExecutor", "NoTargets"), 1);
        assert_eq!(completed(&drain(&mut rx)).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_run_is_rejected_without_events() {
        let (policy, _) = release_policy();
        let log = new_log();
        let registry = MockRegistry::with(vec![actor(
            "a",
            None,
            vec![Probe::new("slow", 0, &log).delayed(Duration::from_millis(100)).participant()],
        )]);
        let orch = Arc::new(orchestrator(policy, registry, &log).build());
        let mut rx = orch.bus().subscribe();

        let first = tokio::spawn({
            let orch = orch.clone();
            async move { orch.run(&ResetRequest::all_actors("first")).await }
        });
        tokio::task::yield_now().await;
        assert!(orch.is_running());

        let err = orch.run(&ResetRequest::all_actors("second")).await.unwrap_err();
        assert!(matches!(err, ResetError::AlreadyInProgress));

        first.await.unwrap().unwrap();
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.reason == "first"));
        assert!(!orch.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_run_with_its_own_signature_completes_as_failed() {
        let (policy, _) = release_policy();
        let log = new_log();
        let registry = MockRegistry::with(vec![actor(
            "a",
            None,
            vec![Probe::new("slow", 0, &log).delayed(Duration::from_millis(100)).participant()],
        )]);
        let orch = Arc::new(orchestrator(policy, registry, &log).build());
        let mut rx = orch.bus().subscribe();

        let first = tokio::spawn({
            let orch = orch.clone();
            async move {
                orch.run(&ResetRequest::all_actors("first").with_signature("tx:a"))
                    .await
            }
        });
        tokio::task::yield_now().await;

        let same = ResetRequest::all_actors("again").with_signature("tx:a");
        assert!(matches!(orch.run(&same).await, Err(ResetError::AlreadyInProgress)));
        let other = ResetRequest::all_actors("other").with_signature("tx:b");
        assert!(matches!(orch.run(&other).await, Err(ResetError::AlreadyInProgress)));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, ResetEventKind::Completed);
        assert_eq!(events[1].signature.as_str(), "tx:b");
        assert_eq!(events[1].reason, REJECTED_REASON);
        assert_eq!(events[1].outcome, Some(ResetOutcome::Failed));

        first.await.unwrap().unwrap();
        let events = drain(&mut rx);
        assert_eq!(completed(&events).len(), 1);
        assert_eq!(completed(&events)[0].signature.as_str(), "tx:a");
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_run_still_publishes_completed() {
        let (policy, _) = release_policy();
        let log = new_log();
        let registry = MockRegistry::with(vec![actor(
            "a",
            None,
            vec![Probe::new("slow", 0, &log).delayed(Duration::from_secs(10)).participant()],
        )]);
        let orch = orchestrator(policy, registry, &log).build();
        let mut rx = orch.bus().subscribe();

        let request = ResetRequest::all_actors("qa");
        let timed = tokio::time::timeout(Duration::from_secs(1), orch.run(&request)).await;
        assert!(timed.is_err());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].outcome, Some(ResetOutcome::Failed));
        assert!(!orch.is_running());
    }
}
