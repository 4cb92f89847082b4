//! Reset participants attached to every [`WorldActor`](crate::WorldActor).
//!
//! | participant        | order | cleanup       | restore          | rebind             |
//! |--------------------|-------|---------------|------------------|--------------------|
//! | `TimerCleanup`     | -10   | clear timers  |                  |                    |
//! | `TransformRestore` | 0     |               | back to spawn    |                    |
//! | `VitalsRestore`    | 0     |               | full health      |                    |
//! | `BindingRebind`    | 10    | drop binding  |                  | lowest-id player   |

use async_trait::async_trait;
use baseline_common::{ActorKind, Transform, TransformHandle};
use baseline_reset::{Actor, ParticipantError, ResetContext, ResetParticipant, SyncResetParticipant};
use std::sync::Weak;
use tracing::debug;

use crate::actor::{SharedVitals, lock_vitals};
use crate::world::World;

pub struct TimerCleanup {
    vitals: SharedVitals,
}

impl TimerCleanup {
    pub(crate) fn new(vitals: SharedVitals) -> Self {
        Self { vitals }
    }
}

impl SyncResetParticipant for TimerCleanup {
    fn name(&self) -> &str {
        "TimerCleanup"
    }

    fn order(&self) -> i32 {
        -10
    }

    fn cleanup(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        lock_vitals(&self.vitals).timers.clear();
        Ok(())
    }

    fn restore(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        Ok(())
    }

    fn rebind(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        Ok(())
    }
}

pub struct TransformRestore {
    transform: TransformHandle,
    spawn_point: Transform,
}

impl TransformRestore {
    pub(crate) fn new(transform: TransformHandle, spawn_point: Transform) -> Self {
        Self {
            transform,
            spawn_point,
        }
    }
}

impl SyncResetParticipant for TransformRestore {
    fn name(&self) -> &str {
        "TransformRestore"
    }

    fn cleanup(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        Ok(())
    }

    fn restore(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        self.transform.set(self.spawn_point);
        Ok(())
    }

    fn rebind(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        Ok(())
    }
}

pub struct VitalsRestore {
    vitals: SharedVitals,
}

impl VitalsRestore {
    pub(crate) fn new(vitals: SharedVitals) -> Self {
        Self { vitals }
    }
}

impl SyncResetParticipant for VitalsRestore {
    fn name(&self) -> &str {
        "VitalsRestore"
    }

    fn cleanup(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        Ok(())
    }

    fn restore(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        let mut vitals = lock_vitals(&self.vitals);
        vitals.health = vitals.max_health;
        Ok(())
    }

    fn rebind(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        Ok(())
    }
}

/// Re-targets a chaser at the lowest-id player once every actor is restored.
pub struct BindingRebind {
    vitals: SharedVitals,
    world: Weak<World>,
}

impl BindingRebind {
    pub(crate) fn new(vitals: SharedVitals, world: Weak<World>) -> Self {
        Self { vitals, world }
    }
}

#[async_trait]
impl ResetParticipant for BindingRebind {
    fn name(&self) -> &str {
        "BindingRebind"
    }

    fn order(&self) -> i32 {
        10
    }

    async fn cleanup(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        lock_vitals(&self.vitals).bound_to = None;
        Ok(())
    }

    async fn restore(&self, _ctx: &ResetContext) -> Result<(), ParticipantError> {
        Ok(())
    }

    async fn rebind(&self, ctx: &ResetContext) -> Result<(), ParticipantError> {
        let world = self
            .world
            .upgrade()
            .ok_or_else(|| ParticipantError::new("world dropped before rebind"))?;
        let target = world
            .first_of_kind(ActorKind::Player)
            .map(|p| p.id().clone());
        if target.is_none() {
            debug!(actor = %ctx.actor_id, "no player to bind to");
        }
        lock_vitals(&self.vitals).bound_to = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorSpec;
    use baseline_common::{ActorId, ContextSignature};
    use baseline_reset::TargetScope;
    use baseline_reset::participant::invoke;
    use baseline_reset::ResetPhase;
    use glam::Vec3;

    fn ctx(id: &ActorId) -> ResetContext {
        ResetContext {
            signature: ContextSignature::from("tx:t"),
            reason: "test".into(),
            scope: TargetScope::AllActors,
            actor_id: id.clone(),
            kind: None,
        }
    }

    async fn run_all(actor: &crate::WorldActor) {
        for phase in ResetPhase::ALL {
            for p in actor.participants() {
                let p = p.into_async();
                invoke(p.as_ref(), phase, &ctx(actor.id())).await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn all_participants_restore_baseline() {
        let world = World::new();
        world.spawn(ActorSpec::tagged(ActorKind::Player).with_id("p2"));
        world.spawn(ActorSpec::tagged(ActorKind::Player).with_id("p1"));
        let eater = world.spawn(ActorSpec::tagged(ActorKind::Eater).with_id("e").at(Vec3::Z));

        world.move_actor(eater.id(), Transform::at(Vec3::splat(9.0)));
        world.damage(eater.id(), 60);
        world.start_timer(eater.id(), "frenzy");
        world.bind(eater.id(), Some(ActorId::from("p2")));

        run_all(&eater).await;

        let vitals = eater.vitals();
        assert_eq!(vitals.health, 100);
        assert!(vitals.timers.is_empty());
        assert_eq!(vitals.bound_to, Some(ActorId::from("p1")));
        assert_eq!(eater.transform().get(), Transform::at(Vec3::Z));
    }

    #[tokio::test]
    async fn rebind_without_world_fails() {
        let world = World::new();
        let weak = std::sync::Arc::downgrade(&world);
        drop(world);
        let rebind = BindingRebind::new(SharedVitals::default(), weak);
        assert!(rebind.rebind(&ctx(&ActorId::from("e"))).await.is_err());
    }
}
