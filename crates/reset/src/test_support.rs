//! Shared fakes for the crate's unit tests.

use async_trait::async_trait;
use baseline_common::{ActorId, ActorKind, TransformHandle};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::actor::{Actor, ActorHandle, ActorRegistry};
use crate::controller::{ControllerContext, LifecycleController};
use crate::degraded::{DegradedConfig, DegradedReporter};
use crate::error::ParticipantError;
use crate::mode::{FixedMode, RuntimeMode};
use crate::participant::{Participant, ResetContext, ResetParticipant, ResetPhase};
use crate::policy::{DefaultResetPolicy, PolicyConfig, WorldResetPolicy};
use crate::spawn::{SpawnContext, SpawnService, SpawnServiceRegistry, spawn_service_name};

pub(crate) type Log = Arc<Mutex<Vec<String>>>;

pub(crate) fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub(crate) struct MockActor {
    id: ActorId,
    tag: Option<ActorKind>,
    type_name: String,
    participants: Vec<Participant>,
    transform: TransformHandle,
}

impl Actor for MockActor {
    fn id(&self) -> &ActorId {
        &self.id
    }

    fn kind_tag(&self) -> Option<ActorKind> {
        self.tag
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn transform(&self) -> TransformHandle {
        self.transform.clone()
    }

    fn participants(&self) -> Vec<Participant> {
        self.participants.clone()
    }
}

pub(crate) fn actor(
    id: &str,
    tag: Option<ActorKind>,
    participants: Vec<Participant>,
) -> ActorHandle {
    Arc::new(MockActor {
        id: ActorId::from(id),
        tag,
        type_name: tag.map_or("Unknown".to_string(), |k| format!("{k}Actor")),
        participants,
        transform: TransformHandle::default(),
    })
}

#[derive(Default)]
pub(crate) struct MockRegistry {
    actors: Mutex<Vec<ActorHandle>>,
}

impl MockRegistry {
    pub(crate) fn with(actors: Vec<ActorHandle>) -> Arc<Self> {
        Arc::new(Self {
            actors: Mutex::new(actors),
        })
    }

    pub(crate) fn push(&self, actor: ActorHandle) {
        self.actors.lock().unwrap().push(actor);
    }
}

impl ActorRegistry for MockRegistry {
    fn actors(&self) -> Vec<ActorHandle> {
        self.actors.lock().unwrap().clone()
    }
}

/// Participant that logs `"{phase}:{label}:start"` / `":end"` around an
/// optional delay, and fails in `fail_on`.
pub(crate) struct Probe {
    pub label: String,
    pub order: i32,
    pub log: Log,
    pub delay: Duration,
    pub fail_on: Option<ResetPhase>,
}

impl Probe {
    pub(crate) fn new(label: impl Into<String>, order: i32, log: &Log) -> Self {
        Self {
            label: label.into(),
            order,
            log: log.clone(),
            delay: Duration::ZERO,
            fail_on: None,
        }
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn failing(mut self, phase: ResetPhase) -> Self {
        self.fail_on = Some(phase);
        self
    }

    pub(crate) fn participant(self) -> Participant {
        Participant::native(self)
    }

    async fn record(&self, phase: ResetPhase) -> Result<(), ParticipantError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{phase}:{}:start", self.label));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("{phase}:{}:end", self.label));
        if self.fail_on == Some(phase) {
            return Err(ParticipantError::new(format!("{} failed in {phase}", self.label)));
        }
        Ok(())
    }
}

#[async_trait]
impl ResetParticipant for Probe {
    fn name(&self) -> &str {
        "Probe"
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn cleanup(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        self.record(ResetPhase::Cleanup).await
    }

    async fn restore(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        self.record(ResetPhase::Restore).await
    }

    async fn rebind(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        self.record(ResetPhase::Rebind).await
    }
}

pub(crate) struct MockController {
    pub id: u64,
    pub log: Log,
    pub fail: bool,
    pub delay: Duration,
}

impl MockController {
    pub(crate) fn new(id: u64, log: &Log) -> Arc<dyn LifecycleController> {
        Arc::new(Self {
            id,
            log: log.clone(),
            fail: false,
            delay: Duration::ZERO,
        })
    }
}

#[async_trait]
impl LifecycleController for MockController {
    fn instance_id(&self) -> u64 {
        self.id
    }

    async fn reset_world(&self, _ctx: &ControllerContext) -> Result<(), ParticipantError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("controller:{}", self.id));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ParticipantError::new("controller refused"));
        }
        Ok(())
    }
}

/// Spawns a tagged actor into a [`MockRegistry`].
pub(crate) struct MockSpawner {
    pub kind: ActorKind,
    pub name: String,
    pub registry: Arc<MockRegistry>,
    pub log: Log,
}

impl MockSpawner {
    pub(crate) fn new(
        kind: ActorKind,
        registry: &Arc<MockRegistry>,
        log: &Log,
    ) -> Arc<dyn SpawnService> {
        Arc::new(Self {
            kind,
            name: spawn_service_name(kind),
            registry: registry.clone(),
            log: log.clone(),
        })
    }
}

#[async_trait]
impl SpawnService for MockSpawner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn spawn(&self, ctx: &SpawnContext) -> Result<(), ParticipantError> {
        self.log.lock().unwrap().push(format!("spawn:{}", ctx.kind));
        let id = format!("spawned-{}", self.kind.label().to_ascii_lowercase());
        self.registry.push(actor(&id, Some(self.kind), Vec::new()));
        Ok(())
    }

    async fn despawn(&self, ctx: &SpawnContext) -> Result<(), ParticipantError> {
        self.log.lock().unwrap().push(format!("despawn:{}", ctx.kind));
        Ok(())
    }
}

pub(crate) struct MockSpawners(pub Vec<Arc<dyn SpawnService>>);

impl SpawnServiceRegistry for MockSpawners {
    fn services(&self) -> Vec<Arc<dyn SpawnService>> {
        self.0.clone()
    }
}

pub(crate) fn policy_with(
    mode: RuntimeMode,
    policy: PolicyConfig,
    degraded: DegradedConfig,
) -> (Arc<dyn WorldResetPolicy>, Arc<DegradedReporter>) {
    let mode = Arc::new(FixedMode(mode));
    let reporter = Arc::new(DegradedReporter::new(degraded, mode.clone()));
    let policy: Arc<dyn WorldResetPolicy> =
        Arc::new(DefaultResetPolicy::new(policy, mode, reporter.clone()));
    (policy, reporter)
}

pub(crate) fn release_policy() -> (Arc<dyn WorldResetPolicy>, Arc<DegradedReporter>) {
    policy_with(
        RuntimeMode::Release,
        PolicyConfig::default(),
        DegradedConfig::default(),
    )
}
