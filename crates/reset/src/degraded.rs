//! Degraded-mode reporter: a bounded, deduplicating sink for "an expected
//! precondition did not hold" conditions.
//!
//! # Invariants
//! - At most `max_unique_keys` message keys are tracked at once; reports for
//!   new keys beyond the cap only bump the dropped counter.
//! - Tracked entries are evicted in bulk whenever a periodic summary is
//!   emitted, so long sessions never grow without bound.
//! - Escalation beyond a warning only happens in strict runtime mode.
//! - With [`DegradedReporter::spawn_summary_task`] running, a window with any
//!   reports is summarized once per interval even if reports stop arriving.

use baseline_common::ContextSignature;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ResetError;
use crate::mode::RuntimeModeProvider;
use crate::request::TargetScope;

/// How repeated reports for the same key are deduplicated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// Log only the first occurrence per key.
    #[default]
    PerSession,
    /// Log again once `cooldown_secs` have elapsed since the last log.
    Cooldown,
}

/// What strict mode does with a degraded condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrictEscalation {
    Warn,
    #[default]
    Error,
    /// Error log plus a hard failure returned to the caller.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradedConfig {
    pub dedup: DedupStrategy,
    pub cooldown_secs: u64,
    pub max_unique_keys: usize,
    pub summary_interval_secs: u64,
    pub strict_escalation: StrictEscalation,
}

impl Default for DegradedConfig {
    fn default() -> Self {
        Self {
            dedup: DedupStrategy::PerSession,
            cooldown_secs: 5,
            max_unique_keys: 128,
            summary_interval_secs: 60,
            strict_escalation: StrictEscalation::Error,
        }
    }
}

impl DegradedConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_secs)
    }
}

/// One degraded condition, as reported by a pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DegradedReport {
    pub feature: String,
    pub reason: String,
    pub detail: String,
    pub signature: Option<ContextSignature>,
    pub profile: Option<String>,
    pub target: Option<TargetScope>,
}

impl DegradedReport {
    pub fn new(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            reason: reason.into(),
            ..Self::default()
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn signature(mut self, signature: &ContextSignature) -> Self {
        if !signature.is_empty() {
            self.signature = Some(signature.clone());
        }
        self
    }

    pub fn profile(mut self, profile: Option<&str>) -> Self {
        self.profile = profile.map(str::to_string);
        self
    }

    pub fn target(mut self, target: TargetScope) -> Self {
        self.target = Some(target);
        self
    }

    /// Dedup key: feature and reason, detail excluded.
    pub fn key(&self) -> String {
        format!("{}|{}", self.feature, self.reason)
    }
}

/// What happened to a single report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Logged,
    /// Counted but not logged (dedup).
    Suppressed,
    /// Not tracked: the key cap was reached.
    Dropped,
}

/// Per-key tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegradedEntry {
    pub count: u64,
    pub last_log: Option<Instant>,
    pub logged_once: bool,
}

/// Snapshot of the reporter's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DegradedSummary {
    /// Up to five keys, highest count first, ties broken by key.
    pub top: Vec<(String, u64)>,
    pub total: u64,
    pub dropped: u64,
    pub unique_keys: usize,
}

impl std::fmt::Display for DegradedSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total={} dropped={} unique={} top=[",
            self.total, self.dropped, self.unique_keys
        )?;
        for (i, (key, count)) in self.top.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={count}")?;
        }
        f.write_str("]")
    }
}

const SUMMARY_TOP: usize = 5;

struct ReporterState {
    entries: HashMap<String, DegradedEntry>,
    total: u64,
    dropped: u64,
    overflow_warned: bool,
    window_start: Instant,
    summaries_emitted: u64,
    last_summary: Option<DegradedSummary>,
}

impl ReporterState {
    fn summary(&self) -> DegradedSummary {
        let mut top: Vec<(String, u64)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.count))
            .collect();
        top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top.truncate(SUMMARY_TOP);
        DegradedSummary {
            top,
            total: self.total,
            dropped: self.dropped,
            unique_keys: self.entries.len(),
        }
    }

    fn emit_summary(&mut self, now: Instant) {
        let summary = self.summary();
        info!(
            tag = "DEGRADED_SUMMARY",
            total = summary.total,
            dropped = summary.dropped,
            unique_keys = summary.unique_keys,
            top = %summary,
            "DEGRADED_SUMMARY"
        );
        self.entries.clear();
        self.total = 0;
        self.dropped = 0;
        self.overflow_warned = false;
        self.window_start = now;
        self.summaries_emitted += 1;
        self.last_summary = Some(summary);
    }
}

/// Shared degraded-mode sink.
pub struct DegradedReporter {
    config: DegradedConfig,
    mode: Arc<dyn RuntimeModeProvider>,
    state: Mutex<ReporterState>,
}

impl DegradedReporter {
    pub fn new(config: DegradedConfig, mode: Arc<dyn RuntimeModeProvider>) -> Self {
        Self {
            config,
            mode,
            state: Mutex::new(ReporterState {
                entries: HashMap::new(),
                total: 0,
                dropped: 0,
                overflow_warned: false,
                window_start: Instant::now(),
                summaries_emitted: 0,
                last_summary: None,
            }),
        }
    }

    pub fn config(&self) -> &DegradedConfig {
        &self.config
    }

    pub fn is_strict(&self) -> bool {
        self.mode.is_strict()
    }

    fn lock(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a degraded condition.
    ///
    /// Returns `Err(StrictViolation)` only in strict mode with
    /// [`StrictEscalation::Fail`]; the condition is counted (and logged,
    /// subject to dedup) either way.
    pub fn report(&self, report: DegradedReport) -> Result<ReportOutcome, ResetError> {
        let now = Instant::now();
        let strict = self.mode.is_strict();
        let key = report.key();

        let outcome = {
            let mut state = self.lock();
            if now.duration_since(state.window_start) >= self.config.summary_interval() {
                if state.total > 0 {
                    state.emit_summary(now);
                } else {
                    state.window_start = now;
                }
            }
            state.total += 1;

            let cap = self.config.max_unique_keys;
            if !state.entries.contains_key(&key) && state.entries.len() >= cap {
                state.dropped += 1;
                if !state.overflow_warned {
                    state.overflow_warned = true;
                    warn!(
                        tag = "DEGRADED_MODE",
                        max_unique_keys = cap,
                        key = %key,
                        detail = "key cap reached; further new keys are dropped",
                        "DEGRADED_MODE"
                    );
                }
                ReportOutcome::Dropped
            } else {
                let entry = state.entries.entry(key).or_insert(DegradedEntry {
                    count: 0,
                    last_log: None,
                    logged_once: false,
                });
                entry.count += 1;
                let should_log = match self.config.dedup {
                    DedupStrategy::PerSession => !entry.logged_once,
                    DedupStrategy::Cooldown => entry
                        .last_log
                        .is_none_or(|at| now.duration_since(at) >= self.config.cooldown()),
                };
                if should_log {
                    entry.logged_once = true;
                    entry.last_log = Some(now);
                    self.log(&report, entry.count, strict);
                    ReportOutcome::Logged
                } else {
                    ReportOutcome::Suppressed
                }
            }
        };

        if strict && self.config.strict_escalation == StrictEscalation::Fail {
            return Err(ResetError::StrictViolation {
                feature: report.feature,
                reason: report.reason,
            });
        }
        Ok(outcome)
    }

    fn log(&self, report: &DegradedReport, count: u64, strict: bool) {
        let signature = report
            .signature
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let profile = report.profile.as_deref().unwrap_or("");
        let target = report.target.map(|t| t.to_string()).unwrap_or_default();
        if strict && self.config.strict_escalation != StrictEscalation::Warn {
            error!(
                tag = "STRICT_VIOLATION",
                feature = %report.feature,
                reason = %report.reason,
                detail = %report.detail,
                signature = %signature,
                profile = %profile,
                target = %target,
                count,
                "STRICT_VIOLATION"
            );
        } else {
            warn!(
                tag = "DEGRADED_MODE",
                feature = %report.feature,
                reason = %report.reason,
                detail = %report.detail,
                signature = %signature,
                profile = %profile,
                target = %target,
                count,
                "DEGRADED_MODE"
            );
        }
    }

    /// Current counters for the open summary window.
    pub fn summary(&self) -> DegradedSummary {
        self.lock().summary()
    }

    /// Emit a summary now (if anything was reported) and start a new window.
    pub fn flush_summary(&self) -> Option<DegradedSummary> {
        let mut state = self.lock();
        if state.total == 0 {
            return None;
        }
        state.emit_summary(Instant::now());
        state.last_summary.clone()
    }

    /// Emit a summary every `summary_interval` until `cancel` fires. Empty
    /// windows are skipped.
    pub fn spawn_summary_task(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let period = self.config.summary_interval().max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.flush_summary();
                    }
                }
            }
            debug!("degraded summary task stopped");
        })
    }

    pub fn summaries_emitted(&self) -> u64 {
        self.lock().summaries_emitted
    }

    pub fn last_summary(&self) -> Option<DegradedSummary> {
        self.lock().last_summary.clone()
    }

    pub fn entry(&self, feature: &str, reason: &str) -> Option<DegradedEntry> {
        self.lock()
            .entries
            .get(&format!("{feature}|{reason}"))
            .copied()
    }

    /// Reports for `feature`/`reason` in the open window.
    pub fn count(&self, feature: &str, reason: &str) -> u64 {
        self.entry(feature, reason).map_or(0, |e| e.count)
    }
}
