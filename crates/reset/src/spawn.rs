//! Spawn-service collaborator interfaces, located by name convention.

use async_trait::async_trait;
use baseline_common::{ActorKind, ContextSignature};
use std::sync::Arc;

use crate::error::ParticipantError;

/// Passed to spawn services when the executor restores an essential actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnContext {
    pub signature: ContextSignature,
    pub reason: String,
    pub kind: ActorKind,
}

#[async_trait]
pub trait SpawnService: Send + Sync {
    fn name(&self) -> &str;

    async fn spawn(&self, ctx: &SpawnContext) -> Result<(), ParticipantError>;

    async fn despawn(&self, ctx: &SpawnContext) -> Result<(), ParticipantError>;
}

/// Conventional service name for `kind`, e.g. `PlayerSpawnService`.
pub fn spawn_service_name(kind: ActorKind) -> String {
    format!("{}SpawnService", kind.label())
}

/// Ordered list of spawn services. Read-only from the pipeline's side.
pub trait SpawnServiceRegistry: Send + Sync {
    fn services(&self) -> Vec<Arc<dyn SpawnService>>;

    /// First service whose name matches the convention for `kind`.
    fn find_for_kind(&self, kind: ActorKind) -> Option<Arc<dyn SpawnService>> {
        let wanted = spawn_service_name(kind);
        self.services().into_iter().find(|s| s.name() == wanted)
    }
}
