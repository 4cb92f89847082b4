//! Target discovery and classification.
//!
//! Resolution order:
//! 1. Ask the registry. A non-empty result is final.
//! 2. If the registry is absent or holds no actors, and policy allows it,
//!    scan live content instead and flag the result as recovered.
//!
//! Both strategies funnel through [`sort_targets`], so the working set is
//! ordered by ordinal actor id no matter where it came from.

use baseline_common::ActorKind;
use std::sync::Arc;
use tracing::debug;

use crate::actor::{Actor, ActorRegistry, ResetTarget, SceneScanner, sort_targets};
use crate::degraded::DegradedReport;
use crate::error::ResetError;
use crate::policy::WorldResetPolicy;
use crate::request::{ResetRequest, TargetScope};

const FEATURE: &str = "TargetDiscovery";

/// Maps actors to kinds and requests to actor subsets.
#[derive(Clone)]
pub struct TargetClassifier {
    policy: Arc<dyn WorldResetPolicy>,
}

impl TargetClassifier {
    pub fn new(policy: Arc<dyn WorldResetPolicy>) -> Self {
        Self { policy }
    }

    /// Kind of `actor`: its explicit tag, or (deprecated, always reported) a
    /// guess from its type name.
    pub fn classify(
        &self,
        actor: &dyn Actor,
        request: &ResetRequest,
    ) -> Result<Option<ActorKind>, ResetError> {
        if let Some(kind) = actor.kind_tag() {
            return Ok(Some(kind));
        }
        if !self.policy.allow_legacy_actor_kind_fallback() {
            debug!(
                actor = %actor.id(),
                type_name = actor.type_name(),
                "actor has no kind tag; legacy fallback disabled"
            );
            return Ok(None);
        }
        let Some(kind) = legacy_kind_from_type_name(actor.type_name()) else {
            return Ok(None);
        };
        self.policy.report_degraded(
            DegradedReport::new("TargetClassifier", "LegacyActorKindFallback")
                .detail(format!(
                    "actor={} type_name={} resolved={kind}",
                    actor.id(),
                    actor.type_name()
                ))
                .signature(request.signature())
                .profile(request.profile())
                .target(request.scope()),
        )?;
        Ok(Some(kind))
    }

    /// Kind of `actor` as [`classify`](Self::classify) would resolve it, but
    /// without reporting the legacy fallback. For presence checks only.
    pub fn kind_of(&self, actor: &dyn Actor) -> Option<ActorKind> {
        actor.kind_tag().or_else(|| {
            if self.policy.allow_legacy_actor_kind_fallback() {
                legacy_kind_from_type_name(actor.type_name())
            } else {
                None
            }
        })
    }

    /// Whether `actor` is in scope. Returns its kind alongside when it is.
    pub fn select(
        &self,
        actor: &dyn Actor,
        request: &ResetRequest,
    ) -> Result<Option<Option<ActorKind>>, ResetError> {
        match request.scope() {
            TargetScope::AllActors => Ok(Some(actor.kind_tag())),
            TargetScope::ActorIdSet => Ok(request
                .ids()
                .contains(actor.id())
                .then(|| actor.kind_tag())),
            TargetScope::PlayersOnly | TargetScope::EaterOnly | TargetScope::ByKind => {
                let Some(wanted) = request.kind_filter() else {
                    return Ok(None);
                };
                let kind = self.classify(actor, request)?;
                Ok((kind == Some(wanted)).then_some(kind))
            }
        }
    }
}

/// Deprecated compatibility shim: kind by type-name substring.
pub fn legacy_kind_from_type_name(type_name: &str) -> Option<ActorKind> {
    let lowered = type_name.to_ascii_lowercase();
    ActorKind::ALL
        .into_iter()
        .find(|kind| lowered.contains(&kind.label().to_ascii_lowercase()))
}

/// The two ways to produce targets.
#[derive(Clone)]
pub enum DiscoveryStrategy {
    Registry(Arc<dyn ActorRegistry>),
    SceneScan(Arc<dyn SceneScanner>),
}

impl DiscoveryStrategy {
    /// Append matching targets to `buffer`; returns how many were appended.
    pub fn collect_targets(
        &self,
        request: &ResetRequest,
        classifier: &TargetClassifier,
        buffer: &mut Vec<ResetTarget>,
    ) -> Result<usize, ResetError> {
        let before = buffer.len();
        match self {
            Self::Registry(registry) if request.scope() == TargetScope::ActorIdSet => {
                for id in request.ids() {
                    if let Some(actor) = registry.find(id) {
                        let kind = actor.kind_tag();
                        buffer.push(ResetTarget::new(actor, kind));
                    } else {
                        debug!(actor = %id, "requested actor not registered");
                    }
                }
            }
            Self::Registry(registry) => {
                for actor in registry.actors() {
                    if let Some(kind) = classifier.select(actor.as_ref(), request)? {
                        buffer.push(ResetTarget::new(actor, kind));
                    }
                }
            }
            Self::SceneScan(scanner) => {
                for actor in scanner.scan() {
                    if let Some(kind) = classifier.select(actor.as_ref(), request)? {
                        buffer.push(ResetTarget::new(actor, kind));
                    }
                }
            }
        }
        Ok(buffer.len() - before)
    }
}

/// Result of resolving a request into a working set.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Sorted by ordinal actor id, no duplicates.
    pub targets: Vec<ResetTarget>,
    pub fallback_used: bool,
    pub scan_disabled: bool,
    pub registry_present: bool,
}

/// Applies the registry-first resolution algorithm.
#[derive(Clone)]
pub struct TargetResolver {
    registry: Option<Arc<dyn ActorRegistry>>,
    scanner: Option<Arc<dyn SceneScanner>>,
    policy: Arc<dyn WorldResetPolicy>,
    classifier: TargetClassifier,
}

impl TargetResolver {
    pub fn new(
        registry: Option<Arc<dyn ActorRegistry>>,
        scanner: Option<Arc<dyn SceneScanner>>,
        policy: Arc<dyn WorldResetPolicy>,
    ) -> Self {
        Self {
            registry,
            scanner,
            classifier: TargetClassifier::new(policy.clone()),
            policy,
        }
    }

    pub fn classifier(&self) -> &TargetClassifier {
        &self.classifier
    }

    pub fn resolve(&self, request: &ResetRequest) -> Result<Discovery, ResetError> {
        let mut discovery = Discovery {
            registry_present: self.registry.is_some(),
            ..Discovery::default()
        };

        if let Some(registry) = &self.registry {
            let found = DiscoveryStrategy::Registry(registry.clone()).collect_targets(
                request,
                &self.classifier,
                &mut discovery.targets,
            )?;
            if found > 0 || !registry.is_empty() {
                sort_targets(&mut discovery.targets);
                return Ok(discovery);
            }
        }

        if !self.policy.allow_scene_scan() {
            debug!(
                signature = %request.signature(),
                registry_present = discovery.registry_present,
                "scene scan disabled by policy"
            );
            discovery.scan_disabled = true;
            return Ok(discovery);
        }
        let Some(scanner) = &self.scanner else {
            debug!("scene scan allowed but no scanner available");
            return Ok(discovery);
        };

        let found = DiscoveryStrategy::SceneScan(scanner.clone()).collect_targets(
            request,
            &self.classifier,
            &mut discovery.targets,
        )?;
        discovery.fallback_used = true;
        sort_targets(&mut discovery.targets);
        self.policy.report_degraded(
            DegradedReport::new(FEATURE, "SceneScanFallback")
                .detail(format!(
                    "registry_present={} scanned={} unique={}",
                    discovery.registry_present,
                    found,
                    discovery.targets.len()
                ))
                .signature(request.signature())
                .profile(request.profile())
                .target(request.scope()),
        )?;
        Ok(discovery)
    }
}
