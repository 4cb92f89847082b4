use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Identifier of an actor in the live world.
///
/// Ordering is ordinal (byte-wise) string comparison, which is the canonical
/// order every reset working set is sorted by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id, used when a spawn service creates an actor on demand.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Explicit kind capability carried by an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    Player,
    Eater,
    Npc,
    Prop,
}

impl ActorKind {
    pub const ALL: [ActorKind; 4] = [Self::Player, Self::Eater, Self::Npc, Self::Prop];

    /// Display label, also the prefix of the matching spawn service name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Player => "Player",
            Self::Eater => "Eater",
            Self::Npc => "Npc",
            Self::Prop => "Prop",
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown actor kind: {0}")]
pub struct ParseKindError(pub String);

impl FromStr for ActorKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseKindError(s.to_string()))
    }
}

/// Spatial transform: position, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Shared, mutable handle to an actor's live transform.
///
/// Cloning the handle shares the underlying transform.
#[derive(Debug, Clone, Default)]
pub struct TransformHandle(Arc<RwLock<Transform>>);

impl TransformHandle {
    pub fn new(transform: Transform) -> Self {
        Self(Arc::new(RwLock::new(transform)))
    }

    pub fn get(&self) -> Transform {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, transform: Transform) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = transform;
    }

    /// True when both handles point at the same transform.
    pub fn same_as(&self, other: &TransformHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(ActorId::generate(), ActorId::generate());
    }

    #[test]
    fn actor_ids_sort_ordinally() {
        let mut ids = vec![
            ActorId::from("b"),
            ActorId::from("B"),
            ActorId::from("a10"),
            ActorId::from("a2"),
        ];
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(ActorId::as_str).collect();
        assert_eq!(sorted, ["B", "a10", "a2", "b"]);
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("player".parse::<ActorKind>(), Ok(ActorKind::Player));
        assert_eq!(" EATER ".parse::<ActorKind>(), Ok(ActorKind::Eater));
        assert!("dragon".parse::<ActorKind>().is_err());
    }

    #[test]
    fn transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
    }

    #[test]
    fn transform_handle_shares_state() {
        let a = TransformHandle::new(Transform::default());
        let b = a.clone();
        b.set(Transform::at(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(a.get().position, Vec3::new(1.0, 2.0, 3.0));
        assert!(a.same_as(&b));
        assert!(!a.same_as(&TransformHandle::default()));
    }
}
