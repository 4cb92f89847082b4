//! # baseline-reset
//!
//! Returns a running world to its baseline state without reloading the
//! scene: scene-level controllers first, then every actor's reset
//! participants in three barriered phases.
//!
//! ## Architecture
//! ```text
//!  scene ready ──► SceneFlowBridge ──► ResetService (single flight per signature)
//!                                            │
//!                                            ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  ResetOrchestrator                                               │
//! │    AdmissionPipeline (guards ─► validators)                      │
//! │    ControllerSource  (none ─► Completed "no-controller")         │
//! │    publish Started                                               │
//! │    ResetExecutor                                                 │
//! │      controllers (by instance id) ─► essential respawn           │
//! │      TargetResolver (registry ─► scene scan, policy permitting)  │
//! │      Cleanup ══► Restore ══► Rebind   (══ barrier)               │
//! │    publish Completed (always, once Started fired)                │
//! └──────────────────────────────┬───────────────────────────────────┘
//!                                ▼
//!                     ResetBus (broadcast channel)
//!                                ▼
//!                  CompletionGate listener ──► releases scene reveal
//! ```
//!
//! Problems that do not stop a reset are routed through the
//! [`WorldResetPolicy`] to the [`DegradedReporter`], which rate-limits and
//! summarises them and escalates in strict mode.

pub mod actor;
pub mod bridge;
pub mod bus;
pub mod config;
pub mod controller;
pub mod degraded;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod gate;
pub mod guard;
pub mod mode;
pub mod orchestrator;
pub mod participant;
pub mod policy;
pub mod request;
pub mod service;
pub mod spawn;

#[cfg(test)]
pub(crate) mod test_support;

pub use actor::{Actor, ActorHandle, ActorRegistry, ResetTarget, SceneScanner};
pub use bridge::{BridgeConfig, SceneFlowBridge};
pub use bus::{ResetBus, ResetEvent, ResetEventKind};
pub use config::ResetConfig;
pub use controller::{ControllerContext, ControllerSource, LifecycleController};
pub use degraded::{
    DegradedConfig, DegradedReport, DegradedReporter, DegradedSummary, ReportOutcome,
};
pub use discovery::{TargetClassifier, TargetResolver};
pub use error::{ConfigError, ParticipantError, ResetError};
pub use executor::{ExecutionReport, ExecutorConfig, ResetExecutor};
pub use gate::{CompletionGate, GateConfig, GateOutcome};
pub use guard::{
    Decision, GateTokens, RequestShapeValidator, ResetGuard, ResetValidator, SignatureValidator,
    SimulationGate, SimulationGateGuard,
};
pub use mode::{EnvModeProvider, FixedMode, RuntimeMode, RuntimeModeProvider};
pub use orchestrator::{OrchestratorBuilder, ResetOrchestrator, ResetRun};
pub use participant::{
    Participant, ResetContext, ResetParticipant, ResetPhase, SyncResetParticipant,
};
pub use policy::{DefaultResetPolicy, PolicyConfig, WorldResetPolicy};
pub use request::{ResetOutcome, ResetRequest, TargetScope};
pub use service::ResetService;
pub use spawn::{SpawnContext, SpawnService, SpawnServiceRegistry};
