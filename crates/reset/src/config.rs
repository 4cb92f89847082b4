//! Pipeline configuration, loaded from YAML.
//!
//! Every section and field is optional; missing values take their defaults.
//!
//! ```yaml
//! mode: strict
//! policy:
//!   allow_scene_scan: true
//! degraded:
//!   dedup: cooldown
//!   cooldown_secs: 5
//! gate:
//!   timeout_ms: 2000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bridge::BridgeConfig;
use crate::degraded::DegradedConfig;
use crate::error::ConfigError;
use crate::executor::ExecutorConfig;
use crate::gate::GateConfig;
use crate::mode::{EnvModeProvider, RuntimeMode};
use crate::policy::PolicyConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    /// Fallback when `BASELINE_RUNTIME_MODE` is unset or unparsable.
    pub mode: RuntimeMode,
    pub policy: PolicyConfig,
    pub degraded: DegradedConfig,
    pub executor: ExecutorConfig,
    pub gate: GateConfig,
    pub bridge: BridgeConfig,
    pub bus_capacity: usize,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::default(),
            policy: PolicyConfig::default(),
            degraded: DegradedConfig::default(),
            executor: ExecutorConfig::default(),
            gate: GateConfig::default(),
            bridge: BridgeConfig::default(),
            bus_capacity: 64,
        }
    }
}

impl ResetConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn mode_provider(&self) -> EnvModeProvider {
        EnvModeProvider::new(self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::degraded::{DedupStrategy, StrictEscalation};
    use baseline_common::ActorKind;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(ResetConfig::from_yaml_str("").unwrap(), ResetConfig::default());
        assert_eq!(ResetConfig::from_yaml_str("{}").unwrap(), ResetConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = ResetConfig::from_yaml_str(
            "mode: strict\n\
             policy:\n  allow_scene_scan: true\n\
             degraded:\n  dedup: per_session\n  strict_escalation: fail\n\
             executor:\n  essential_kinds: [player]\n\
             gate:\n  timeout_ms: 250\n",
        )
        .unwrap();
        assert_eq!(cfg.mode, RuntimeMode::Strict);
        assert!(cfg.policy.allow_scene_scan);
        assert!(cfg.policy.allow_legacy_kind_fallback);
        assert_eq!(cfg.degraded.dedup, DedupStrategy::PerSession);
        assert_eq!(cfg.degraded.strict_escalation, StrictEscalation::Fail);
        assert_eq!(cfg.degraded.max_unique_keys, 128);
        assert_eq!(cfg.executor.essential_kinds, [ActorKind::Player]);
        assert!(cfg.executor.continue_on_participant_error);
        assert_eq!(cfg.gate.timeout_ms, 250);
        assert_eq!(cfg.gate.completed_cache_capacity, 64);
        assert_eq!(cfg.bridge.duplicate_ready_window_ms, 750);
        assert_eq!(cfg.bus_capacity, 64);
    }

    #[test]
    fn unknown_variant_is_an_error() {
        assert!(matches!(
            ResetConfig::from_yaml_str("mode: loud"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn load_from_file_and_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bus_capacity: 8\ngate:\n  timeout_ms: 100").unwrap();
        let cfg = ResetConfig::load(file.path()).unwrap();
        assert_eq!(cfg.bus_capacity, 8);
        assert_eq!(cfg.gate.timeout_ms, 100);

        let again = ResetConfig::from_yaml_str(&cfg.to_yaml().unwrap()).unwrap();
        assert_eq!(again, cfg);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ResetConfig::load(dir.path().join("absent.yaml")),
            Err(ConfigError::Io(_))
        ));
    }
}
