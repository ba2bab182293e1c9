use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::factors::EmissionFactorRegistry;
use crate::safety::TRIR_EXPOSURE_BASE_HOURS;
use crate::waste::ALLOCATION_CEILING_PCT;

/// Environment override for the regional grid factor.
pub const GRID_FACTOR_ENV: &str = "CYBOAIR_GRID_FACTOR_KG_PER_KWH";

/// Engine configuration. Missing keys fall back to defaults, so a
/// deployment file may contain nothing but its regional grid factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub factors: EmissionFactorRegistry,
    pub allocation_ceiling_pct: f64,
    pub trir_exposure_base_hours: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            factors: EmissionFactorRegistry::default(),
            allocation_ceiling_pct: ALLOCATION_CEILING_PCT,
            trir_exposure_base_hours: TRIR_EXPOSURE_BASE_HOURS,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> EngineResult<Self> {
        let cfg: EngineConfig = serde_json::from_str(raw)?;
        cfg.finish()
    }

    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Apply `CYBOAIR_GRID_FACTOR_KG_PER_KWH` when set.
    pub fn with_env_overrides(self) -> EngineResult<Self> {
        match std::env::var(GRID_FACTOR_ENV) {
            Ok(raw) => self.with_grid_override(&raw),
            Err(_) => Ok(self),
        }
    }

    fn with_grid_override(mut self, raw: &str) -> EngineResult<Self> {
        let value: f64 = raw.trim().parse().map_err(|_| {
            EngineError::Config(format!("{GRID_FACTOR_ENV} must be a number, got '{raw}'"))
        })?;
        self.factors.grid_kg_per_kwh = value;
        self.finish()
    }

    fn finish(self) -> EngineResult<Self> {
        let cfg = EngineConfig {
            factors: self.factors.canonicalized(),
            ..self
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.factors.validate()?;
        if !(self.allocation_ceiling_pct.is_finite() && self.allocation_ceiling_pct >= 100.0) {
            return Err(EngineError::Config(format!(
                "allocation_ceiling_pct must be >= 100, got {}",
                self.allocation_ceiling_pct
            )));
        }
        if !(self.trir_exposure_base_hours.is_finite() && self.trir_exposure_base_hours > 0.0) {
            return Err(EngineError::Config(format!(
                "trir_exposure_base_hours must be > 0, got {}",
                self.trir_exposure_base_hours
            )));
        }
        Ok(())
    }
}
