//! # Completion gate.
//!
//! Holds a scene reveal until the reset correlated with the transition has
//! completed, or a fixed timeout elapses.
//!
//! ## Rules
//! - Correlation is by [`ContextSignature`] only. An empty signature is never
//!   cached, never waited on, and releases the caller immediately.
//! - Completions that arrive before anyone waits are remembered in a bounded
//!   cache, cleared in bulk once it reaches capacity.
//! - Any number of waiters may share one pending entry.
//! - Lock order is `completed` then `pending`; neither is held across an await.

use baseline_common::{ContextSignature, TransitionContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::{ResetBus, ResetEventKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub timeout_ms: u64,
    pub completed_cache_capacity: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            completed_cache_capacity: 64,
        }
    }
}

impl GateConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Why a waiter was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Empty signature; nothing to correlate.
    Uncorrelated,
    /// The reset had already completed before the wait began.
    Cached(String),
    Completed(String),
    TimedOut,
}

impl GateOutcome {
    /// Completion reason, when the release was driven by a completion.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Cached(r) | Self::Completed(r) => Some(r),
            Self::Uncorrelated | Self::TimedOut => None,
        }
    }
}

type Pending = HashMap<ContextSignature, watch::Sender<Option<String>>>;

#[derive(Debug, Default)]
pub struct CompletionGate {
    config: GateConfig,
    completed: Mutex<HashMap<ContextSignature, String>>,
    pending: Mutex<Pending>,
}

impl CompletionGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            completed: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    fn completed(&self) -> MutexGuard<'_, HashMap<ContextSignature, String>> {
        self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hold a scene reveal for the reset correlated with `ctx`.
    pub async fn wait_before_reveal(&self, ctx: &TransitionContext) -> GateOutcome {
        self.wait_for(&ctx.signature()).await
    }

    pub async fn wait_for(&self, signature: &ContextSignature) -> GateOutcome {
        if signature.is_empty() {
            debug!("gate wait without signature; releasing");
            return GateOutcome::Uncorrelated;
        }

        let mut rx = {
            let completed = self.completed();
            if let Some(reason) = completed.get(signature) {
                debug!(signature = %signature, reason = %reason, "gate released from cache");
                return GateOutcome::Cached(reason.clone());
            }
            self.pending()
                .entry(signature.clone())
                .or_insert_with(|| watch::channel(None).0)
                .subscribe()
        };

        let waited = tokio::time::timeout(self.config.timeout(), rx.wait_for(Option::is_some))
            .await
            .map(|r| r.map(|value| (*value).clone().unwrap_or_default()));
        match waited {
            Ok(Ok(reason)) => GateOutcome::Completed(reason),
            // Sender gone without a value: the gate itself is being torn down.
            Ok(Err(_)) => GateOutcome::TimedOut,
            Err(_) => {
                warn!(
                    tag = "GATE_TIMEOUT",
                    signature = %signature,
                    timeout_ms = self.config.timeout_ms,
                    "GATE_TIMEOUT"
                );
                drop(rx);
                self.forget_if_unwatched(signature);
                GateOutcome::TimedOut
            }
        }
    }

    fn forget_if_unwatched(&self, signature: &ContextSignature) {
        let mut pending = self.pending();
        if pending
            .get(signature)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            pending.remove(signature);
        }
    }

    /// Record a completion and release everyone waiting on `signature`.
    pub fn on_reset_completed(&self, signature: &ContextSignature, reason: &str) {
        if signature.is_empty() {
            return;
        }
        let mut completed = self.completed();
        if completed.len() >= self.config.completed_cache_capacity {
            debug!(entries = completed.len(), "completed cache cleared");
            completed.clear();
        }
        completed.insert(signature.clone(), reason.to_string());
        if let Some(tx) = self.pending().remove(signature) {
            tx.send_replace(Some(reason.to_string()));
        }
    }

    /// Feed `Completed` events from `bus` into the gate until `cancel` fires
    /// or the bus closes.
    pub fn spawn_listener(
        self: Arc<Self>,
        bus: &ResetBus,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(ev) if ev.kind == ResetEventKind::Completed => {
                            self.on_reset_completed(&ev.signature, &ev.reason);
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "gate listener lagged; completions may be missed");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("gate listener stopped");
        })
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    pub fn is_completed(&self, signature: &ContextSignature) -> bool {
        self.completed().contains_key(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ResetEvent;
    use crate::request::{ResetOutcome, TargetScope};
    use tokio::time::Instant;

    fn sig(s: &str) -> ContextSignature {
        ContextSignature::from(s)
    }

    #[tokio::test]
    async fn completion_before_wait_is_cached() {
        let gate = CompletionGate::new(GateConfig::default());
        gate.on_reset_completed(&sig("tx:1"), "qa");
        assert_eq!(gate.wait_for(&sig("tx:1")).await, GateOutcome::Cached("qa".into()));
        assert_eq!(gate.pending_count(), 0);
    }

    #[tokio::test]
    async fn empty_signature_is_never_correlated() {
        let gate = CompletionGate::new(GateConfig::default());
        gate.on_reset_completed(&ContextSignature::empty(), "qa");
        assert!(!gate.is_completed(&ContextSignature::empty()));
        assert_eq!(
            gate.wait_for(&ContextSignature::empty()).await,
            GateOutcome::Uncorrelated
        );
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_share_one_entry_and_release_together() {
        let gate = Arc::new(CompletionGate::new(GateConfig::default()));
        let a = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait_for(&sig("tx:2")).await }
        });
        let b = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait_for(&sig("tx:2")).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(gate.pending_count(), 1);

        gate.on_reset_completed(&sig("tx:2"), "done");
        assert_eq!(a.await.unwrap(), GateOutcome::Completed("done".into()));
        assert_eq!(b.await.unwrap(), GateOutcome::Completed("done".into()));
        assert_eq!(gate.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_releases_after_exactly_the_configured_delay() {
        let gate = CompletionGate::new(GateConfig {
            timeout_ms: 5000,
            ..GateConfig::default()
        });
        let started = Instant::now();
        let outcome = gate.wait_for(&sig("tx:never")).await;
        assert_eq!(outcome, GateOutcome::TimedOut);
        assert_eq!(started.elapsed(), Duration::from_millis(5000));
        assert_eq!(gate.pending_count(), 0);
    }

    #[tokio::test]
    async fn cache_clears_in_bulk_at_capacity() {
        let gate = CompletionGate::new(GateConfig {
            completed_cache_capacity: 2,
            ..GateConfig::default()
        });
        gate.on_reset_completed(&sig("a"), "r");
        gate.on_reset_completed(&sig("b"), "r");
        assert!(gate.is_completed(&sig("a")));
        gate.on_reset_completed(&sig("c"), "r");
        assert!(!gate.is_completed(&sig("a")));
        assert!(!gate.is_completed(&sig("b")));
        assert!(gate.is_completed(&sig("c")));
    }

    #[tokio::test(start_paused = true)]
    async fn listener_resolves_from_bus_until_cancelled() {
        let bus = ResetBus::new(8);
        let gate = Arc::new(CompletionGate::new(GateConfig::default()));
        let cancel = CancellationToken::new();
        let listener = gate.clone().spawn_listener(&bus, cancel.clone());

        let ctx = TransitionContext::new("menu", "arena", 1);
        let waiter = tokio::spawn({
            let gate = gate.clone();
            let ctx = ctx.clone();
            async move { gate.wait_before_reveal(&ctx).await }
        });
        tokio::task::yield_now().await;

        bus.publish(ResetEvent::started(&ctx.signature(), "scene", TargetScope::AllActors));
        bus.publish(ResetEvent::completed(
            &ctx.signature(),
            "scene",
            TargetScope::AllActors,
            ResetOutcome::Succeeded,
        ));
        assert_eq!(waiter.await.unwrap(), GateOutcome::Completed("scene".into()));

        cancel.cancel();
        listener.await.unwrap();
        assert_eq!(bus.receiver_count(), 0);
    }
}
