use baseline_common::{ActorId, ActorKind, Transform};
use baseline_reset::{Actor, ActorHandle, ActorRegistry, SceneScanner};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::actor::{ActorSpec, WorldActor};

/// An event record produced by every gameplay mutation to the world.
///
/// Reset participants restore actor state directly and are not logged here;
/// the controller's rewind is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    Spawned {
        id: ActorId,
        kind: Option<ActorKind>,
        transform: Transform,
    },
    Despawned { id: ActorId },
    Moved {
        id: ActorId,
        old: Transform,
        new: Transform,
    },
    Damaged { id: ActorId, amount: u32, health: u32 },
    TimerStarted { id: ActorId, timer: String },
    Bound { id: ActorId, target: Option<ActorId> },
    /// Simulation advanced one tick with the given seed.
    Stepped { tick: u64, seed: u64 },
    /// Tick and seed returned to baseline.
    Rewound { seed: u64 },
}

#[derive(Debug, Default)]
struct WorldState {
    actors: BTreeMap<ActorId, Arc<WorldActor>>,
    tick: u64,
    seed: u64,
    event_log: Vec<WorldEvent>,
}

/// The authoritative sandbox world.
///
/// Shared behind an [`Arc`]: actors keep a weak handle back to it so their
/// participants can look up other actors during a reset.
///
/// Uses BTreeMap for deterministic iteration order. The seed advances by
/// splitmix64 each step, so the same operations replay to the same state.
#[derive(Debug)]
pub struct World {
    baseline_seed: u64,
    state: Mutex<WorldState>,
}

impl World {
    pub fn new() -> Arc<Self> {
        Self::with_seed(0)
    }

    /// Create a world whose baseline (and current) seed is `seed`.
    pub fn with_seed(seed: u64) -> Arc<Self> {
        Arc::new(Self {
            baseline_seed: seed,
            state: Mutex::new(WorldState {
                seed,
                ..WorldState::default()
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tick(&self) -> u64 {
        self.state().tick
    }

    pub fn seed(&self) -> u64 {
        self.state().seed
    }

    pub fn baseline_seed(&self) -> u64 {
        self.baseline_seed
    }

    pub fn actor_count(&self) -> usize {
        self.state().actors.len()
    }

    /// Copy of the event log.
    pub fn events(&self) -> Vec<WorldEvent> {
        self.state().event_log.clone()
    }

    /// Drain and return the event log.
    pub fn drain_events(&self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.state().event_log)
    }

    /// Every actor, registered or not, in id order.
    pub fn all_actors(&self) -> Vec<Arc<WorldActor>> {
        self.state().actors.values().cloned().collect()
    }

    pub fn actor(&self, id: &ActorId) -> Option<Arc<WorldActor>> {
        self.state().actors.get(id).cloned()
    }

    /// Lowest-id actor of `kind`, by explicit tag.
    pub fn first_of_kind(&self, kind: ActorKind) -> Option<Arc<WorldActor>> {
        self.state()
            .actors
            .values()
            .find(|a| a.kind_tag() == Some(kind))
            .cloned()
    }

    /// Spawn an actor from `spec`. An actor with the same id is replaced.
    pub fn spawn(self: &Arc<Self>, spec: ActorSpec) -> Arc<WorldActor> {
        let id = spec.id.clone().unwrap_or_else(ActorId::generate);
        let actor = Arc::new(WorldActor::new(id.clone(), spec, Arc::downgrade(self)));
        let mut state = self.state();
        state.event_log.push(WorldEvent::Spawned {
            id: id.clone(),
            kind: actor.kind_tag(),
            transform: actor.spawn_point(),
        });
        state.actors.insert(id, actor.clone());
        actor
    }

    /// Remove an actor. Returns it if it existed.
    pub fn despawn(&self, id: &ActorId) -> Option<Arc<WorldActor>> {
        let mut state = self.state();
        let actor = state.actors.remove(id);
        if actor.is_some() {
            state.event_log.push(WorldEvent::Despawned { id: id.clone() });
        }
        actor
    }

    /// Remove every actor spawned as transient. Returns how many went.
    pub fn despawn_transient(&self) -> usize {
        let mut state = self.state();
        let doomed: Vec<ActorId> = state
            .actors
            .values()
            .filter(|a| a.is_transient())
            .map(|a| a.id().clone())
            .collect();
        for id in &doomed {
            state.actors.remove(id);
            state.event_log.push(WorldEvent::Despawned { id: id.clone() });
        }
        doomed.len()
    }

    pub fn move_actor(&self, id: &ActorId, new: Transform) -> bool {
        let mut state = self.state();
        let Some(actor) = state.actors.get(id) else {
            return false;
        };
        let handle = actor.transform();
        let old = handle.get();
        handle.set(new);
        state.event_log.push(WorldEvent::Moved {
            id: id.clone(),
            old,
            new,
        });
        true
    }

    /// Reduce health, saturating at zero.
    pub fn damage(&self, id: &ActorId, amount: u32) -> bool {
        let mut state = self.state();
        let Some(actor) = state.actors.get(id) else {
            return false;
        };
        let health = {
            let mut vitals = actor.vitals_mut();
            vitals.health = vitals.health.saturating_sub(amount);
            vitals.health
        };
        state.event_log.push(WorldEvent::Damaged {
            id: id.clone(),
            amount,
            health,
        });
        true
    }

    pub fn start_timer(&self, id: &ActorId, timer: &str) -> bool {
        let mut state = self.state();
        let Some(actor) = state.actors.get(id) else {
            return false;
        };
        actor.vitals_mut().timers.insert(timer.to_string());
        state.event_log.push(WorldEvent::TimerStarted {
            id: id.clone(),
            timer: timer.to_string(),
        });
        true
    }

    pub fn bind(&self, id: &ActorId, target: Option<ActorId>) -> bool {
        let mut state = self.state();
        let Some(actor) = state.actors.get(id) else {
            return false;
        };
        actor.vitals_mut().bound_to = target.clone();
        state.event_log.push(WorldEvent::Bound {
            id: id.clone(),
            target,
        });
        true
    }

    /// Advance the simulation by one tick.
    pub fn step(&self) {
        let mut state = self.state();
        state.tick += 1;
        state.seed = splitmix64(state.seed);
        let (tick, seed) = (state.tick, state.seed);
        state.event_log.push(WorldEvent::Stepped { tick, seed });
    }

    /// Return tick and seed to their baseline values.
    pub fn rewind(&self) {
        let mut state = self.state();
        state.tick = 0;
        state.seed = self.baseline_seed;
        state.event_log.push(WorldEvent::Rewound {
            seed: self.baseline_seed,
        });
    }

    /// Deterministic hash of the world state, in canonical (BTreeMap) order.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        let state = self.state();
        mix(&mut h, &state.tick.to_le_bytes());
        mix(&mut h, &state.seed.to_le_bytes());
        for (id, actor) in &state.actors {
            mix(&mut h, id.as_str().as_bytes());
            mix(&mut h, actor.kind_tag().map_or("-", |k| k.label()).as_bytes());
            let t = actor.transform().get();
            for f in [
                t.position.x,
                t.position.y,
                t.position.z,
                t.rotation.x,
                t.rotation.y,
                t.rotation.z,
                t.rotation.w,
                t.scale.x,
                t.scale.y,
                t.scale.z,
            ] {
                mix(&mut h, &f.to_le_bytes());
            }
            let vitals = actor.vitals();
            mix(&mut h, &vitals.health.to_le_bytes());
            for timer in &vitals.timers {
                mix(&mut h, timer.as_bytes());
            }
            if let Some(target) = &vitals.bound_to {
                mix(&mut h, target.as_str().as_bytes());
            }
        }
        h
    }
}

/// The registry holds registered actors only.
impl ActorRegistry for World {
    fn actors(&self) -> Vec<ActorHandle> {
        self.state()
            .actors
            .values()
            .filter(|a| a.is_registered())
            .map(|a| a.clone() as ActorHandle)
            .collect()
    }

    fn find(&self, id: &ActorId) -> Option<ActorHandle> {
        self.state()
            .actors
            .get(id)
            .filter(|a| a.is_registered())
            .map(|a| a.clone() as ActorHandle)
    }
}

/// A scan sees every live actor, registered or not.
impl SceneScanner for World {
    fn scan(&self) -> Vec<ActorHandle> {
        self.state()
            .actors
            .values()
            .map(|a| a.clone() as ActorHandle)
            .collect()
    }
}

/// Splitmix64 step, used to advance the world seed each tick.
fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
