//! Actor-side collaborator interfaces: the registry the pipeline queries and
//! the live scan it may fall back to. Both are read-only from here.

use baseline_common::{ActorId, ActorKind, TransformHandle};
use std::fmt;
use std::sync::Arc;

use crate::participant::Participant;

/// A live actor as the reset pipeline sees it.
pub trait Actor: Send + Sync {
    fn id(&self) -> &ActorId;

    /// Explicit kind capability, if the actor carries one.
    fn kind_tag(&self) -> Option<ActorKind>;

    /// Concrete component type name; only consulted by the legacy
    /// kind-matching shim.
    fn type_name(&self) -> &str;

    fn transform(&self) -> TransformHandle;

    /// Reset participants found under this actor's hierarchy, in hierarchy order.
    fn participants(&self) -> Vec<Participant>;
}

pub type ActorHandle = Arc<dyn Actor>;

/// Registered actors.
pub trait ActorRegistry: Send + Sync {
    fn actors(&self) -> Vec<ActorHandle>;

    fn find(&self, id: &ActorId) -> Option<ActorHandle> {
        self.actors().into_iter().find(|a| a.id() == id)
    }

    fn is_empty(&self) -> bool {
        self.actors().is_empty()
    }
}

/// Enumerates live components carrying an actor marker, bypassing the registry.
///
/// Raw order is unspecified and may contain the same actor more than once.
pub trait SceneScanner: Send + Sync {
    fn scan(&self) -> Vec<ActorHandle>;
}

/// One resolved actor in a reset working set.
#[derive(Clone)]
pub struct ResetTarget {
    pub actor_id: ActorId,
    pub kind: Option<ActorKind>,
    pub root: ActorHandle,
    pub transform: TransformHandle,
}

impl ResetTarget {
    pub fn new(root: ActorHandle, kind: Option<ActorKind>) -> Self {
        Self {
            actor_id: root.id().clone(),
            kind,
            transform: root.transform(),
            root,
        }
    }
}

impl fmt::Debug for ResetTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetTarget")
            .field("actor_id", &self.actor_id)
            .field("kind", &self.kind)
            .field("type_name", &self.root.type_name())
            .finish()
    }
}

/// Sort by ordinal actor id and drop duplicate ids.
pub fn sort_targets(targets: &mut Vec<ResetTarget>) {
    targets.sort_by(|a, b| a.actor_id.cmp(&b.actor_id));
    targets.dedup_by(|a, b| a.actor_id == b.actor_id);
}
