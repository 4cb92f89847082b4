//! Context signatures: opaque keys correlating one transition/reset instance
//! across decoupled subsystems.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Opaque correlation key. An empty signature cannot be correlated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextSignature(String);

impl ContextSignature {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The "cannot correlate" signature.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Derive the signature of a scene transition.
    ///
    /// Same context in, same signature out; any differing field yields a
    /// different key.
    pub fn for_transition(ctx: &TransitionContext) -> Self {
        let mut hasher = Sha256::new();
        for part in [
            ctx.profile.as_deref().unwrap_or(""),
            ctx.from_scene.as_str(),
            ctx.to_scene.as_str(),
        ] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hasher.update(ctx.sequence.to_le_bytes());
        let digest = hasher.finalize();
        let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
        Self(format!("tx:{hex}"))
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("<none>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for ContextSignature {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ContextSignature {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Description of one scene transition, as seen by the scene-flow pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionContext {
    pub from_scene: String,
    pub to_scene: String,
    pub profile: Option<String>,
    /// Monotonic transition counter; distinguishes repeated trips between
    /// the same two scenes.
    pub sequence: u64,
}

impl TransitionContext {
    pub fn new(from_scene: impl Into<String>, to_scene: impl Into<String>, sequence: u64) -> Self {
        Self {
            from_scene: from_scene.into(),
            to_scene: to_scene.into(),
            profile: None,
            sequence,
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn signature(&self) -> ContextSignature {
        ContextSignature::for_transition(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_transition_same_signature() {
        let a = TransitionContext::new("Menu", "Level1", 3).with_profile("default");
        let b = TransitionContext::new("Menu", "Level1", 3).with_profile("default");
        assert_eq!(a.signature(), b.signature());
        assert!(!a.signature().is_empty());
    }

    #[test]
    fn different_transitions_differ() {
        let base = TransitionContext::new("Menu", "Level1", 3);
        assert_ne!(base.signature(), TransitionContext::new("Menu", "Level1", 4).signature());
        assert_ne!(base.signature(), TransitionContext::new("Level1", "Menu", 3).signature());
        assert_ne!(
            base.signature(),
            base.clone().with_profile("qa").signature()
        );
    }

    #[test]
    fn field_boundaries_are_not_ambiguous() {
        let a = TransitionContext::new("ab", "c", 0);
        let b = TransitionContext::new("a", "bc", 0);
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn empty_and_whitespace_signatures_are_uncorrelatable() {
        assert!(ContextSignature::empty().is_empty());
        assert!(ContextSignature::from("   ").is_empty());
        assert!(!ContextSignature::from("s1").is_empty());
        assert_eq!(ContextSignature::empty().to_string(), "<none>");
        assert_eq!(ContextSignature::from(" \t ").to_string(), "<none>");
        assert_eq!(ContextSignature::from("tx:1").to_string(), "tx:1");
    }
}
