//! Spawn services for the sandbox world, one per essential kind.

use async_trait::async_trait;
use baseline_common::ActorKind;
use baseline_reset::spawn::spawn_service_name;
use baseline_reset::{Actor, ParticipantError, SpawnContext, SpawnService, SpawnServiceRegistry};
use std::sync::{Arc, Weak};
use tracing::info;

use crate::actor::ActorSpec;
use crate::world::World;

/// Spawns actors of one kind from a template.
pub struct KindSpawnService {
    name: String,
    kind: ActorKind,
    template: ActorSpec,
    world: Weak<World>,
}

impl KindSpawnService {
    pub fn new(world: &Arc<World>, kind: ActorKind, template: ActorSpec) -> Self {
        Self {
            name: spawn_service_name(kind),
            kind,
            template,
            world: Arc::downgrade(world),
        }
    }

    fn world(&self) -> Result<Arc<World>, ParticipantError> {
        self.world
            .upgrade()
            .ok_or_else(|| ParticipantError::new(format!("{}: world dropped", self.name)))
    }
}

#[async_trait]
impl SpawnService for KindSpawnService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn spawn(&self, ctx: &SpawnContext) -> Result<(), ParticipantError> {
        let actor = self.world()?.spawn(self.template.clone());
        info!(
            service = %self.name,
            actor = %actor.id(),
            signature = %ctx.signature,
            "actor spawned"
        );
        Ok(())
    }

    /// Remove every actor tagged with this service's kind.
    async fn despawn(&self, _ctx: &SpawnContext) -> Result<(), ParticipantError> {
        let world = self.world()?;
        for actor in world.all_actors() {
            if actor.kind_tag() == Some(self.kind) {
                world.despawn(actor.id());
            }
        }
        Ok(())
    }
}

/// Ordered spawn-service list.
#[derive(Default)]
pub struct SpawnCatalog {
    services: Vec<Arc<dyn SpawnService>>,
}

impl SpawnCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Player and eater services spawning at the origin.
    pub fn standard(world: &Arc<World>) -> Self {
        Self::new()
            .with_template(world, ActorKind::Player, ActorSpec::tagged(ActorKind::Player))
            .with_template(world, ActorKind::Eater, ActorSpec::tagged(ActorKind::Eater))
    }

    pub fn with_template(
        mut self,
        world: &Arc<World>,
        kind: ActorKind,
        template: ActorSpec,
    ) -> Self {
        self.services
            .push(Arc::new(KindSpawnService::new(world, kind, template)));
        self
    }
}

impl SpawnServiceRegistry for SpawnCatalog {
    fn services(&self) -> Vec<Arc<dyn SpawnService>> {
        self.services.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baseline_common::ContextSignature;

    fn ctx(kind: ActorKind) -> SpawnContext {
        SpawnContext {
            signature: ContextSignature::empty(),
            reason: "test".into(),
            kind,
        }
    }

    #[tokio::test]
    async fn catalog_finds_services_by_convention() {
        let world = World::new();
        let catalog = SpawnCatalog::standard(&world);
        let service = catalog.find_for_kind(ActorKind::Eater).unwrap();
        assert_eq!(service.name(), "EaterSpawnService");
        assert!(catalog.find_for_kind(ActorKind::Npc).is_none());

        service.spawn(&ctx(ActorKind::Eater)).await.unwrap();
        assert!(world.first_of_kind(ActorKind::Eater).is_some());
        service.despawn(&ctx(ActorKind::Eater)).await.unwrap();
        assert!(world.first_of_kind(ActorKind::Eater).is_none());
    }

    #[tokio::test]
    async fn spawn_after_world_drop_fails() {
        let world = World::new();
        let catalog = SpawnCatalog::standard(&world);
        drop(world);
        let service = catalog.find_for_kind(ActorKind::Player).unwrap();
        assert!(service.spawn(&ctx(ActorKind::Player)).await.is_err());
    }
}
