use baseline_common::{ActorId, ActorKind, Transform, TransformHandle};
use baseline_reset::discovery::legacy_kind_from_type_name;
use baseline_reset::{Actor, Participant};
use glam::Vec3;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::participants::{BindingRebind, TimerCleanup, TransformRestore, VitalsRestore};
use crate::world::World;

/// Mutable per-actor gameplay state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vitals {
    pub health: u32,
    pub max_health: u32,
    /// Active run-scoped timers.
    pub timers: BTreeSet<String>,
    /// Actor this one is chasing or following.
    pub bound_to: Option<ActorId>,
}

pub(crate) type SharedVitals = Arc<Mutex<Vitals>>;

pub(crate) fn lock_vitals(vitals: &Mutex<Vitals>) -> MutexGuard<'_, Vitals> {
    vitals.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How to build an actor.
#[derive(Debug, Clone)]
pub struct ActorSpec {
    /// Generated when absent.
    pub id: Option<ActorId>,
    pub kind: Option<ActorKind>,
    pub type_name: String,
    pub spawn_point: Transform,
    pub max_health: u32,
    /// Visible to the actor registry (a scene scan sees every actor).
    pub registered: bool,
    /// Removed by the lifecycle controller on reset.
    pub transient: bool,
    /// Rebinds to the lowest-id player on reset.
    pub binds_to_player: bool,
}

impl ActorSpec {
    /// An actor carrying an explicit kind tag.
    pub fn tagged(kind: ActorKind) -> Self {
        Self {
            id: None,
            kind: Some(kind),
            type_name: format!("{kind}Actor"),
            spawn_point: Transform::default(),
            max_health: 100,
            registered: true,
            transient: false,
            binds_to_player: kind == ActorKind::Eater,
        }
    }

    /// An actor known only by its component type name.
    pub fn legacy(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            binds_to_player: legacy_kind_from_type_name(&type_name) == Some(ActorKind::Eater),
            kind: None,
            type_name,
            ..Self::tagged(ActorKind::Npc)
        }
    }

    pub fn with_id(mut self, id: impl Into<ActorId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.spawn_point = Transform::at(position);
        self
    }

    pub fn max_health(mut self, max_health: u32) -> Self {
        self.max_health = max_health;
        self
    }

    pub fn unregistered(mut self) -> Self {
        self.registered = false;
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }
}

/// A live actor in a [`World`].
#[derive(Debug)]
pub struct WorldActor {
    id: ActorId,
    kind_tag: Option<ActorKind>,
    type_name: String,
    spawn_point: Transform,
    registered: bool,
    transient: bool,
    binds_to_player: bool,
    transform: TransformHandle,
    vitals: SharedVitals,
    world: Weak<World>,
}

impl WorldActor {
    pub(crate) fn new(id: ActorId, spec: ActorSpec, world: Weak<World>) -> Self {
        Self {
            id,
            kind_tag: spec.kind,
            type_name: spec.type_name,
            transform: TransformHandle::new(spec.spawn_point),
            spawn_point: spec.spawn_point,
            registered: spec.registered,
            transient: spec.transient,
            binds_to_player: spec.binds_to_player,
            vitals: Arc::new(Mutex::new(Vitals {
                health: spec.max_health,
                max_health: spec.max_health,
                ..Vitals::default()
            })),
            world,
        }
    }

    pub fn spawn_point(&self) -> Transform {
        self.spawn_point
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Snapshot of the actor's vitals.
    pub fn vitals(&self) -> Vitals {
        lock_vitals(&self.vitals).clone()
    }

    pub(crate) fn vitals_mut(&self) -> MutexGuard<'_, Vitals> {
        lock_vitals(&self.vitals)
    }
}

impl Actor for WorldActor {
    fn id(&self) -> &ActorId {
        &self.id
    }

    fn kind_tag(&self) -> Option<ActorKind> {
        self.kind_tag
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn transform(&self) -> TransformHandle {
        self.transform.clone()
    }

    fn participants(&self) -> Vec<Participant> {
        let mut found = vec![
            Participant::sync(TimerCleanup::new(self.vitals.clone())),
            Participant::sync(TransformRestore::new(self.transform.clone(), self.spawn_point)),
            Participant::sync(VitalsRestore::new(self.vitals.clone())),
        ];
        if self.binds_to_player {
            found.push(Participant::native(BindingRebind::new(
                self.vitals.clone(),
                self.world.clone(),
            )));
        }
        found
    }
}
