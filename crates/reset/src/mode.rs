//! Runtime mode: the posture that decides whether degraded conditions stay
//! warnings (`Release`) or escalate (`Strict`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable consulted by [`EnvModeProvider`].
pub const RUNTIME_MODE_ENV: &str = "BASELINE_RUNTIME_MODE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Release,
    Strict,
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Release => f.write_str("release"),
            Self::Strict => f.write_str("strict"),
        }
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "release" => Ok(Self::Release),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown runtime mode: {other}")),
        }
    }
}

/// Source of the current runtime mode.
pub trait RuntimeModeProvider: Send + Sync {
    fn mode(&self) -> RuntimeMode;

    fn is_strict(&self) -> bool {
        self.mode() == RuntimeMode::Strict
    }
}

/// Mode fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMode(pub RuntimeMode);

impl RuntimeModeProvider for FixedMode {
    fn mode(&self) -> RuntimeMode {
        self.0
    }
}

/// Reads [`RUNTIME_MODE_ENV`] on every query, falling back to a configured
/// mode when the variable is unset or unparseable.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvModeProvider {
    fallback: RuntimeMode,
}

impl EnvModeProvider {
    pub fn new(fallback: RuntimeMode) -> Self {
        Self { fallback }
    }

    fn resolve(&self, raw: Option<&str>) -> RuntimeMode {
        raw.and_then(|v| v.parse().ok()).unwrap_or(self.fallback)
    }
}

impl RuntimeModeProvider for EnvModeProvider {
    fn mode(&self) -> RuntimeMode {
        let raw = std::env::var(RUNTIME_MODE_ENV).ok();
        self.resolve(raw.as_deref())
    }
}
