use async_trait::async_trait;
use baseline_reset::{ControllerContext, LifecycleController, ParticipantError};
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::world::World;

/// Scene-level reset: drops transient actors and rewinds tick and seed.
pub struct WorldLifecycleController {
    instance_id: u64,
    world: Weak<World>,
}

impl WorldLifecycleController {
    pub fn new(instance_id: u64, world: &Arc<World>) -> Self {
        Self {
            instance_id,
            world: Arc::downgrade(world),
        }
    }
}

#[async_trait]
impl LifecycleController for WorldLifecycleController {
    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn name(&self) -> &str {
        "WorldLifecycleController"
    }

    async fn reset_world(&self, ctx: &ControllerContext) -> Result<(), ParticipantError> {
        let world = self
            .world
            .upgrade()
            .ok_or_else(|| ParticipantError::new("world dropped before controller reset"))?;
        let removed = world.despawn_transient();
        world.rewind();
        debug!(
            signature = %ctx.signature,
            instance_id = self.instance_id,
            removed,
            "world rewound"
        );
        Ok(())
    }
}
