//! Sandbox world: authoritative actor state plus the collaborators the reset
//! pipeline needs (registry, scene scan, spawn services, lifecycle controller).
//!
//! # Invariants
//! - All world mutations flow through explicit operations and are logged.
//! - Actor iteration is in ordinal id order.
//! - Two worlds built the same way and reset the same way hash identically.

pub mod actor;
pub mod controller;
pub mod participants;
pub mod sandbox;
pub mod spawn;
pub mod world;

pub use actor::{ActorSpec, Vitals, WorldActor};
pub use controller::WorldLifecycleController;
pub use sandbox::{Sandbox, demo_world};
pub use spawn::{KindSpawnService, SpawnCatalog};
pub use world::{World, WorldEvent};
