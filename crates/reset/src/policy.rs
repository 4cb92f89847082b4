//! Policy surface consulted by every stage of the pipeline.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::degraded::{DegradedReport, DegradedReporter, ReportOutcome};
use crate::error::ResetError;
use crate::mode::RuntimeModeProvider;

/// Decisions the pipeline delegates to policy.
pub trait WorldResetPolicy: Send + Sync {
    fn is_strict(&self) -> bool;

    /// Whether a live scene scan may stand in for an empty or absent registry.
    fn allow_scene_scan(&self) -> bool;

    /// Whether actors without an explicit kind tag may be classified by type name.
    fn allow_legacy_actor_kind_fallback(&self) -> bool;

    fn report_degraded(&self, report: DegradedReport) -> Result<ReportOutcome, ResetError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub allow_scene_scan: bool,
    pub allow_legacy_kind_fallback: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow_scene_scan: false,
            allow_legacy_kind_fallback: true,
        }
    }
}

/// Config-driven policy backed by a shared [`DegradedReporter`].
pub struct DefaultResetPolicy {
    config: PolicyConfig,
    mode: Arc<dyn RuntimeModeProvider>,
    reporter: Arc<DegradedReporter>,
}

impl DefaultResetPolicy {
    pub fn new(
        config: PolicyConfig,
        mode: Arc<dyn RuntimeModeProvider>,
        reporter: Arc<DegradedReporter>,
    ) -> Self {
        Self {
            config,
            mode,
            reporter,
        }
    }

    pub fn reporter(&self) -> &Arc<DegradedReporter> {
        &self.reporter
    }
}

impl WorldResetPolicy for DefaultResetPolicy {
    fn is_strict(&self) -> bool {
        self.mode.is_strict()
    }

    fn allow_scene_scan(&self) -> bool {
        self.config.allow_scene_scan
    }

    fn allow_legacy_actor_kind_fallback(&self) -> bool {
        self.config.allow_legacy_kind_fallback
    }

    fn report_degraded(&self, report: DegradedReport) -> Result<ReportOutcome, ResetError> {
        self.reporter.report(report)
    }
}
