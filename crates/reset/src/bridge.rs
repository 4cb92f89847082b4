//! Scene-flow bridge: turns "scene ready" notifications into tracked
//! background reset requests.

use baseline_common::{ContextSignature, TransitionContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::request::ResetRequest;
use crate::service::ResetService;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// A second "ready" for the same signature inside this window is ignored.
    pub duplicate_ready_window_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            duplicate_ready_window_ms: 750,
        }
    }
}

impl BridgeConfig {
    pub fn duplicate_ready_window(&self) -> Duration {
        Duration::from_millis(self.duplicate_ready_window_ms)
    }
}

pub struct SceneFlowBridge {
    service: Arc<ResetService>,
    config: BridgeConfig,
    recent: Mutex<HashMap<ContextSignature, Instant>>,
    tasks: Mutex<JoinSet<bool>>,
}

impl SceneFlowBridge {
    pub fn new(service: Arc<ResetService>, config: BridgeConfig) -> Self {
        Self {
            service,
            config,
            recent: Mutex::new(HashMap::new()),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<bool>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule a reset for the scene described by `ctx`. Returns false when
    /// the notification was a duplicate. Must be called inside a runtime.
    pub fn on_scene_ready(&self, ctx: &TransitionContext) -> bool {
        let signature = ctx.signature();
        let now = Instant::now();
        {
            let window = self.config.duplicate_ready_window();
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            recent.retain(|_, at| now.duration_since(*at) < window);
            if recent.contains_key(&signature) {
                debug!(
                    signature = %signature,
                    scene = %ctx.to_scene,
                    "duplicate scene ready ignored"
                );
                return false;
            }
            recent.insert(signature.clone(), now);
        }

        let mut request =
            ResetRequest::all_actors(format!("scene-ready:{}", ctx.to_scene))
                .with_signature(signature);
        if let Some(profile) = &ctx.profile {
            request = request.with_profile(profile.clone());
        }
        let service = self.service.clone();
        self.tasks()
            .spawn(async move { service.request_reset(request).await });
        true
    }

    /// Scheduled resets that have not finished yet.
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks();
        while let Some(done) = tasks.try_join_next() {
            if let Err(e) = done {
                warn!(error = %e, "scene reset task failed");
            }
        }
        tasks.len()
    }

    /// Wait for every scheduled reset; results in completion order.
    pub async fn drain(&self) -> Vec<bool> {
        let mut tasks = std::mem::take(&mut *self.tasks());
        let mut results = Vec::with_capacity(tasks.len());
        while let Some(done) = tasks.join_next().await {
            match done {
                Ok(ok) => results.push(ok),
                Err(e) => {
                    warn!(error = %e, "scene reset task failed");
                    results.push(false);
                }
            }
        }
        results
    }
}
