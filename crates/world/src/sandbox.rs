//! A world wired into the full reset pipeline.

use baseline_common::ActorKind;
use baseline_reset::{
    CompletionGate, ControllerSource, DefaultResetPolicy, DegradedReporter, GateTokens,
    LifecycleController, RequestShapeValidator, ResetBus, ResetConfig, ResetOrchestrator,
    ResetService, RuntimeModeProvider, SceneFlowBridge, SignatureValidator, SimulationGateGuard,
    WorldResetPolicy,
};
use glam::Vec3;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::actor::ActorSpec;
use crate::controller::WorldLifecycleController;
use crate::spawn::SpawnCatalog;
use crate::world::World;

pub struct Sandbox {
    pub world: Arc<World>,
    pub config: ResetConfig,
    pub reporter: Arc<DegradedReporter>,
    pub policy: Arc<dyn WorldResetPolicy>,
    /// Holds that make the simulation guard skip resets.
    pub gate_tokens: Arc<GateTokens>,
    pub service: Arc<ResetService>,
    pub gate: Arc<CompletionGate>,
    pub bridge: SceneFlowBridge,
}

impl Sandbox {
    pub fn new(config: ResetConfig, world: Arc<World>, mode: Arc<dyn RuntimeModeProvider>) -> Self {
        let reporter = Arc::new(DegradedReporter::new(config.degraded.clone(), mode.clone()));
        let policy: Arc<dyn WorldResetPolicy> = Arc::new(DefaultResetPolicy::new(
            config.policy.clone(),
            mode,
            reporter.clone(),
        ));
        let gate_tokens = Arc::new(GateTokens::new());

        let controllers: Vec<Arc<dyn LifecycleController>> =
            vec![Arc::new(WorldLifecycleController::new(1, &world))];
        let controllers: Arc<dyn ControllerSource> = Arc::new(controllers);
        let orchestrator = ResetOrchestrator::builder(policy.clone())
            .bus(ResetBus::new(config.bus_capacity))
            .registry(world.clone())
            .scanner(world.clone())
            .spawners(Arc::new(SpawnCatalog::standard(&world)))
            .controllers(controllers)
            .guard(Arc::new(SimulationGateGuard::new(gate_tokens.clone())))
            .validator(Arc::new(SignatureValidator))
            .validator(Arc::new(RequestShapeValidator))
            .executor_config(config.executor.clone())
            .build();

        let service = Arc::new(ResetService::new(Arc::new(orchestrator)));
        let bridge = SceneFlowBridge::new(service.clone(), config.bridge.clone());
        Self {
            gate: Arc::new(CompletionGate::new(config.gate.clone())),
            world,
            config,
            reporter,
            policy,
            gate_tokens,
            service,
            bridge,
        }
    }

    pub fn bus(&self) -> &ResetBus {
        self.service.orchestrator().bus()
    }

    /// Feed bus completions into the gate. Must be called inside a runtime.
    pub fn start_gate_listener(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.gate.clone().spawn_listener(self.bus(), cancel)
    }

    /// Emit degraded-mode summaries on the configured interval.
    pub fn start_degraded_summaries(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.reporter.clone().spawn_summary_task(cancel)
    }
}

/// Two players, an eater, a villager, and an untagged legacy crate.
pub fn demo_world(seed: u64) -> Arc<World> {
    let world = World::with_seed(seed);
    world.spawn(
        ActorSpec::tagged(ActorKind::Player)
            .with_id("player-1")
            .at(Vec3::new(-2.0, 0.0, 0.0)),
    );
    world.spawn(
        ActorSpec::tagged(ActorKind::Player)
            .with_id("player-2")
            .at(Vec3::new(2.0, 0.0, 0.0)),
    );
    world.spawn(
        ActorSpec::tagged(ActorKind::Eater)
            .with_id("eater")
            .at(Vec3::new(0.0, 0.0, 10.0))
            .max_health(250),
    );
    world.spawn(
        ActorSpec::tagged(ActorKind::Npc)
            .with_id("villager")
            .at(Vec3::new(5.0, 0.0, 5.0)),
    );
    world.spawn(
        ActorSpec::legacy("LegacyPropActor")
            .with_id("crate-01")
            .at(Vec3::new(1.0, 0.0, 1.0)),
    );
    world
}
