//! Reset requests and outcomes.

use baseline_common::{ActorId, ActorKind, ContextSignature};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which actors a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetScope {
    AllActors,
    PlayersOnly,
    EaterOnly,
    ActorIdSet,
    ByKind,
}

impl fmt::Display for TargetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AllActors => "AllActors",
            Self::PlayersOnly => "PlayersOnly",
            Self::EaterOnly => "EaterOnly",
            Self::ActorIdSet => "ActorIdSet",
            Self::ByKind => "ByKind",
        };
        f.write_str(s)
    }
}

/// Immutable description of one reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetRequest {
    scope: TargetScope,
    reason: String,
    actor_ids: Vec<ActorId>,
    actor_kind: Option<ActorKind>,
    signature: ContextSignature,
    profile: Option<String>,
}

impl ResetRequest {
    fn with_scope(scope: TargetScope, reason: impl Into<String>) -> Self {
        Self {
            scope,
            reason: reason.into(),
            actor_ids: Vec::new(),
            actor_kind: None,
            signature: ContextSignature::empty(),
            profile: None,
        }
    }

    pub fn all_actors(reason: impl Into<String>) -> Self {
        Self::with_scope(TargetScope::AllActors, reason)
    }

    pub fn players_only(reason: impl Into<String>) -> Self {
        Self::with_scope(TargetScope::PlayersOnly, reason)
    }

    pub fn eater_only(reason: impl Into<String>) -> Self {
        Self::with_scope(TargetScope::EaterOnly, reason)
    }

    pub fn actor_ids(ids: impl IntoIterator<Item = ActorId>, reason: impl Into<String>) -> Self {
        Self {
            actor_ids: ids.into_iter().collect(),
            ..Self::with_scope(TargetScope::ActorIdSet, reason)
        }
    }

    pub fn by_kind(kind: ActorKind, reason: impl Into<String>) -> Self {
        Self {
            actor_kind: Some(kind),
            ..Self::with_scope(TargetScope::ByKind, reason)
        }
    }

    /// A `ByKind` request whose kind is missing; rejected by validation.
    pub fn by_unspecified_kind(reason: impl Into<String>) -> Self {
        Self::with_scope(TargetScope::ByKind, reason)
    }

    pub fn with_signature(mut self, signature: impl Into<ContextSignature>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn scope(&self) -> TargetScope {
        self.scope
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn ids(&self) -> &[ActorId] {
        &self.actor_ids
    }

    pub fn kind(&self) -> Option<ActorKind> {
        self.actor_kind
    }

    pub fn signature(&self) -> &ContextSignature {
        &self.signature
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// The single kind this request narrows to, if it narrows by kind.
    pub fn kind_filter(&self) -> Option<ActorKind> {
        match self.scope {
            TargetScope::PlayersOnly => Some(ActorKind::Player),
            TargetScope::EaterOnly => Some(ActorKind::Eater),
            TargetScope::ByKind => self.actor_kind,
            TargetScope::AllActors | TargetScope::ActorIdSet => None,
        }
    }

    /// Whether an actor of `kind` is in scope for essential-presence checks.
    pub fn covers_kind(&self, kind: ActorKind) -> bool {
        match self.scope {
            TargetScope::AllActors => true,
            TargetScope::ActorIdSet => false,
            _ => self.kind_filter() == Some(kind),
        }
    }
}

/// Final classification of one reset, carried on `ResetCompleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResetOutcome {
    Succeeded,
    /// Completed, but a degraded condition was recovered along the way.
    Degraded,
    /// Stopped by a guard or validator before any side effect.
    Blocked,
    /// Stopped because no lifecycle controller was found.
    NoController,
    Failed,
}

impl ResetOutcome {
    /// True when the reset completed without an unrecovered failure.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded | Self::Degraded)
    }
}

impl fmt::Display for ResetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Succeeded => "succeeded",
            Self::Degraded => "degraded",
            Self::Blocked => "blocked",
            Self::NoController => "no-controller",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_filter_follows_scope() {
        assert_eq!(
            ResetRequest::players_only("r").kind_filter(),
            Some(ActorKind::Player)
        );
        assert_eq!(
            ResetRequest::eater_only("r").kind_filter(),
            Some(ActorKind::Eater)
        );
        assert_eq!(
            ResetRequest::by_kind(ActorKind::Npc, "r").kind_filter(),
            Some(ActorKind::Npc)
        );
        assert_eq!(ResetRequest::all_actors("r").kind_filter(), None);
        assert_eq!(ResetRequest::by_unspecified_kind("r").kind_filter(), None);
    }

    #[test]
    fn covers_kind_for_essentials() {
        let all = ResetRequest::all_actors("r");
        assert!(all.covers_kind(ActorKind::Player));
        assert!(all.covers_kind(ActorKind::Eater));

        let players = ResetRequest::players_only("r");
        assert!(players.covers_kind(ActorKind::Player));
        assert!(!players.covers_kind(ActorKind::Eater));

        let ids = ResetRequest::actor_ids([ActorId::from("p1")], "r");
        assert!(!ids.covers_kind(ActorKind::Player));
    }

    #[test]
    fn builders_keep_fields() {
        let req = ResetRequest::actor_ids([ActorId::from("a"), ActorId::from("b")], "qa")
            .with_signature("sig-1")
            .with_profile("default");
        assert_eq!(req.scope(), TargetScope::ActorIdSet);
        assert_eq!(req.ids().len(), 2);
        assert_eq!(req.signature().as_str(), "sig-1");
        assert_eq!(req.profile(), Some("default"));
        assert_eq!(req.reason(), "qa");
    }

    #[test]
    fn success_outcomes() {
        assert!(ResetOutcome::Succeeded.is_success());
        assert!(ResetOutcome::Degraded.is_success());
        assert!(!ResetOutcome::Blocked.is_success());
        assert!(!ResetOutcome::NoController.is_success());
        assert!(!ResetOutcome::Failed.is_success());
    }
}
