//! World lifecycle controllers: the scene-level objects a reset is run through.

use async_trait::async_trait;
use baseline_common::ContextSignature;
use std::sync::Arc;

use crate::error::ParticipantError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerContext {
    pub signature: ContextSignature,
    pub reason: String,
}

#[async_trait]
pub trait LifecycleController: Send + Sync {
    /// Stable instance identity; controllers are reset in ascending order of it.
    fn instance_id(&self) -> u64;

    fn name(&self) -> &str {
        "LifecycleController"
    }

    async fn reset_world(&self, ctx: &ControllerContext) -> Result<(), ParticipantError>;
}

/// Where the orchestrator discovers controllers, fresh on every request.
pub trait ControllerSource: Send + Sync {
    fn controllers(&self) -> Vec<Arc<dyn LifecycleController>>;
}

impl ControllerSource for Vec<Arc<dyn LifecycleController>> {
    fn controllers(&self) -> Vec<Arc<dyn LifecycleController>> {
        self.clone()
    }
}
