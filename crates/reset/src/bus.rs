//! # Reset event bus.
//!
//! [`ResetBus`] is a thin wrapper around [`tokio::sync::broadcast`]. The reset
//! pipeline publishes `Started`/`Completed`; the completion gate (and anything
//! else interested) subscribes.
//!
//! ## Rules
//! - Publishing never blocks and never fails; with no receivers the event is dropped.
//! - Receivers only observe events sent after they subscribe.
//! - Slow receivers get `RecvError::Lagged(n)` and skip the `n` oldest events.

use baseline_common::ContextSignature;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::debug;

use crate::request::{ResetOutcome, TargetScope};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetEventKind {
    Started,
    Completed,
}

#[derive(Debug, Clone)]
pub struct ResetEvent {
    pub kind: ResetEventKind,
    pub signature: ContextSignature,
    pub reason: String,
    pub target: TargetScope,
    /// Set on `Completed` only.
    pub outcome: Option<ResetOutcome>,
    /// Monotonically increasing across all events in the process.
    pub seq: u64,
    pub at: SystemTime,
}

impl ResetEvent {
    fn new(
        kind: ResetEventKind,
        signature: &ContextSignature,
        reason: &str,
        target: TargetScope,
    ) -> Self {
        Self {
            kind,
            signature: signature.clone(),
            reason: reason.to_string(),
            target,
            outcome: None,
            seq: EVENT_SEQ.fetch_add(1, Ordering::Relaxed),
            at: SystemTime::now(),
        }
    }

    pub fn started(signature: &ContextSignature, reason: &str, target: TargetScope) -> Self {
        Self::new(ResetEventKind::Started, signature, reason, target)
    }

    pub fn completed(
        signature: &ContextSignature,
        reason: &str,
        target: TargetScope,
        outcome: ResetOutcome,
    ) -> Self {
        Self {
            outcome: Some(outcome),
            ..Self::new(ResetEventKind::Completed, signature, reason, target)
        }
    }
}

/// Broadcast channel for reset events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ResetBus {
    tx: broadcast::Sender<ResetEvent>,
}

impl ResetBus {
    /// Creates a bus with the given shared capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes to every current receiver; returns how many there were.
    pub fn publish(&self, event: ResetEvent) -> usize {
        let kind = event.kind;
        let seq = event.seq;
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(?kind, seq, "reset event dropped (no receivers)");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResetEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
