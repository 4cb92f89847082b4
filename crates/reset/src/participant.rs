//! The three-phase reset contract.
//!
//! # Invariants
//! - Phases run strictly Cleanup → Restore → Rebind.
//! - Within a phase, participants are ordered by `order()` ascending, then by
//!   `name()`, then by discovery position. Never by anything nondeterministic.

use async_trait::async_trait;
use baseline_common::{ActorId, ActorKind, ContextSignature};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::actor::ResetTarget;
use crate::error::ParticipantError;
use crate::request::TargetScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResetPhase {
    /// Tear down transient per-run state.
    Cleanup,
    /// Return persistent state to baseline.
    Restore,
    /// Re-establish cross-references.
    Rebind,
}

impl ResetPhase {
    pub const ALL: [ResetPhase; 3] = [Self::Cleanup, Self::Restore, Self::Rebind];
}

impl fmt::Display for ResetPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cleanup => "Cleanup",
            Self::Restore => "Restore",
            Self::Rebind => "Rebind",
        };
        f.write_str(s)
    }
}

/// What a participant is told about the reset it takes part in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetContext {
    pub signature: ContextSignature,
    pub reason: String,
    pub scope: TargetScope,
    pub actor_id: ActorId,
    pub kind: Option<ActorKind>,
}

/// Native (async) reset participant.
#[async_trait]
pub trait ResetParticipant: Send + Sync {
    /// Stable name used as the ordering tiebreak.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn order(&self) -> i32 {
        0
    }

    /// Per-target filter; returning false skips every phase for `target`.
    fn applies_to(&self, _target: &ResetTarget) -> bool {
        true
    }

    async fn cleanup(&self, ctx: &ResetContext) -> Result<(), ParticipantError>;

    async fn restore(&self, ctx: &ResetContext) -> Result<(), ParticipantError>;

    async fn rebind(&self, ctx: &ResetContext) -> Result<(), ParticipantError>;
}

/// Synchronous variant, adapted transparently by the executor.
pub trait SyncResetParticipant: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn order(&self) -> i32 {
        0
    }

    fn applies_to(&self, _target: &ResetTarget) -> bool {
        true
    }

    fn cleanup(&self, ctx: &ResetContext) -> Result<(), ParticipantError>;

    fn restore(&self, ctx: &ResetContext) -> Result<(), ParticipantError>;

    fn rebind(&self, ctx: &ResetContext) -> Result<(), ParticipantError>;
}

/// Lifts a [`SyncResetParticipant`] into the async contract.
pub struct SyncAdapter(pub Arc<dyn SyncResetParticipant>);

#[async_trait]
impl ResetParticipant for SyncAdapter {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn order(&self) -> i32 {
        self.0.order()
    }

    fn applies_to(&self, target: &ResetTarget) -> bool {
        self.0.applies_to(target)
    }

    async fn cleanup(&self, ctx: &ResetContext) -> Result<(), ParticipantError> {
        self.0.cleanup(ctx)
    }

    async fn restore(&self, ctx: &ResetContext) -> Result<(), ParticipantError> {
        self.0.restore(ctx)
    }

    async fn rebind(&self, ctx: &ResetContext) -> Result<(), ParticipantError> {
        self.0.rebind(ctx)
    }
}

/// A participant as exposed by an actor hierarchy.
#[derive(Clone)]
pub enum Participant {
    Async(Arc<dyn ResetParticipant>),
    Sync(Arc<dyn SyncResetParticipant>),
}

impl Participant {
    pub fn native(p: impl ResetParticipant + 'static) -> Self {
        Self::Async(Arc::new(p))
    }

    pub fn sync(p: impl SyncResetParticipant + 'static) -> Self {
        Self::Sync(Arc::new(p))
    }

    pub fn into_async(self) -> Arc<dyn ResetParticipant> {
        match self {
            Self::Async(p) => p,
            Self::Sync(p) => Arc::new(SyncAdapter(p)),
        }
    }
}

/// Run one phase of one participant.
pub async fn invoke(
    participant: &dyn ResetParticipant,
    phase: ResetPhase,
    ctx: &ResetContext,
) -> Result<(), ParticipantError> {
    match phase {
        ResetPhase::Cleanup => participant.cleanup(ctx).await,
        ResetPhase::Restore => participant.restore(ctx).await,
        ResetPhase::Rebind => participant.rebind(ctx).await,
    }
}

/// Adapt, filter and deterministically order the participants of one target.
pub fn plan_participants(
    target: &ResetTarget,
    found: Vec<Participant>,
) -> Vec<Arc<dyn ResetParticipant>> {
    let mut plan: Vec<Arc<dyn ResetParticipant>> = found
        .into_iter()
        .map(Participant::into_async)
        .filter(|p| p.applies_to(target))
        .collect();
    // Stable: equal (order, name) keep discovery order.
    plan.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.name().cmp(b.name())));
    plan
}
