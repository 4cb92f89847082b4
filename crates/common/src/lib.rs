//! Shared types for the baseline reset pipeline.
//!
//! Everything here is a plain value type (or a thin shared handle) that both
//! the reset core and the world it acts on agree on.

pub mod signature;
pub mod types;

pub use signature::{ContextSignature, TransitionContext};
pub use types::{ActorId, ActorKind, ParseKindError, Transform, TransformHandle};
