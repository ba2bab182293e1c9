use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Combustion factor for diesel in site equipment and vehicles (kg CO2e / L).
pub const FUEL_KG_PER_LITER: f64 = 2.68;
/// Grid electricity factor for Scope 2 monthly logs (kg CO2e / kWh).
pub const GRID_KG_PER_KWH: f64 = 0.507;
/// Philippines grid factor used by the electrical-emissions subsystem (kg CO2e / kWh).
pub const ELECTRICAL_SUBSYSTEM_KG_PER_KWH: f64 = 0.76;
/// Potable water supply and treatment (kg CO2e / m3).
pub const WATER_KG_PER_M3: f64 = 0.264;

/// Activity categories that carry a factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityCategory {
    EquipmentFuel,
    VehicleFuel,
    GridElectricity,
    ElectricalSubsystem,
    WaterSupply,
    Waste,
}

impl ActivityCategory {
    pub fn key(&self) -> &'static str {
        match self {
            ActivityCategory::EquipmentFuel => "equipment-fuel-liter",
            ActivityCategory::VehicleFuel => "vehicle-fuel-liter",
            ActivityCategory::GridElectricity => "grid-electricity-kwh",
            ActivityCategory::ElectricalSubsystem => "electrical-subsystem-kwh",
            ActivityCategory::WaterSupply => "water-supply-m3",
            ActivityCategory::Waste => "waste-kg",
        }
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Where a resolved factor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorSource {
    Fixed,
    TypeSpecific,
    Generic,
    /// No table had an entry; the factor is 0 and results are low confidence.
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorLookup {
    pub kg_per_unit: f64,
    pub source: FactorSource,
}

impl FactorLookup {
    fn fixed(kg_per_unit: f64) -> Self {
        FactorLookup {
            kg_per_unit,
            source: FactorSource::Fixed,
        }
    }

    pub fn is_low_confidence(&self) -> bool {
        self.source == FactorSource::Missing
    }
}

/// Canonical form for waste type and treatment method keys.
pub fn canonical_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '_' { '-' } else { c })
        .collect()
}

/// Immutable factor tables. Deployments swap regional values through
/// configuration; nothing mutates a registry after it is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionFactorRegistry {
    pub fuel_kg_per_liter: f64,
    pub grid_kg_per_kwh: f64,
    pub electrical_subsystem_kg_per_kwh: f64,
    pub water_kg_per_m3: f64,
    /// waste type -> treatment method -> kg CO2e per kg treated.
    pub waste_by_type: BTreeMap<String, BTreeMap<String, f64>>,
    /// treatment method -> kg CO2e per kg treated.
    pub waste_generic: BTreeMap<String, f64>,
}

impl Default for EmissionFactorRegistry {
    fn default() -> Self {
        let by_type: &[(&str, &[(&str, f64)])] = &[
            ("concrete", &[("recycling", 0.0009), ("landfill", 0.0012)]),
            ("metal", &[("recycling", 0.12), ("landfill", 0.009)]),
            (
                "timber",
                &[("recycling", 0.12), ("incineration", 0.06), ("landfill", 1.8)],
            ),
            (
                "plastic",
                &[("recycling", 0.21), ("incineration", 2.34), ("landfill", 0.009)],
            ),
            ("general", &[("landfill", 0.58), ("incineration", 0.45)]),
        ];
        let waste_by_type = by_type
            .iter()
            .map(|(ty, methods)| {
                let inner = methods
                    .iter()
                    .map(|(m, f)| (m.to_string(), *f))
                    .collect::<BTreeMap<_, _>>();
                (ty.to_string(), inner)
            })
            .collect();

        let waste_generic = [
            ("landfill", 0.467),
            ("incineration", 0.9),
            ("recycling", 0.021),
            ("composting", 0.009),
            ("reuse", 0.0),
        ]
        .iter()
        .map(|(m, f)| (m.to_string(), *f))
        .collect();

        EmissionFactorRegistry {
            fuel_kg_per_liter: FUEL_KG_PER_LITER,
            grid_kg_per_kwh: GRID_KG_PER_KWH,
            electrical_subsystem_kg_per_kwh: ELECTRICAL_SUBSYSTEM_KG_PER_KWH,
            water_kg_per_m3: WATER_KG_PER_M3,
            waste_by_type,
            waste_generic,
        }
    }
}

impl EmissionFactorRegistry {
    pub fn with_grid_factor(mut self, kg_per_kwh: f64) -> Self {
        self.grid_kg_per_kwh = kg_per_kwh;
        self
    }

    /// Resolve the factor for a category. Waste goes type-specific, then
    /// generic by method, then 0 with `FactorSource::Missing`.
    pub fn factor_for(
        &self,
        category: ActivityCategory,
        waste_type: Option<&str>,
        treatment_method: Option<&str>,
    ) -> FactorLookup {
        match category {
            ActivityCategory::EquipmentFuel | ActivityCategory::VehicleFuel => {
                FactorLookup::fixed(self.fuel_kg_per_liter)
            }
            ActivityCategory::GridElectricity => FactorLookup::fixed(self.grid_kg_per_kwh),
            ActivityCategory::ElectricalSubsystem => {
                FactorLookup::fixed(self.electrical_subsystem_kg_per_kwh)
            }
            ActivityCategory::WaterSupply => FactorLookup::fixed(self.water_kg_per_m3),
            ActivityCategory::Waste => self.waste_factor(waste_type, treatment_method),
        }
    }

    fn waste_factor(&self, waste_type: Option<&str>, treatment_method: Option<&str>) -> FactorLookup {
        let method = match treatment_method.map(canonical_key) {
            Some(m) if !m.is_empty() => m,
            _ => {
                return FactorLookup {
                    kg_per_unit: 0.0,
                    source: FactorSource::Missing,
                }
            }
        };

        let specific = waste_type
            .map(canonical_key)
            .and_then(|ty| self.waste_by_type.get(&ty))
            .and_then(|methods| methods.get(&method));
        if let Some(f) = specific {
            return FactorLookup {
                kg_per_unit: *f,
                source: FactorSource::TypeSpecific,
            };
        }

        match self.waste_generic.get(&method) {
            Some(f) => FactorLookup {
                kg_per_unit: *f,
                source: FactorSource::Generic,
            },
            None => FactorLookup {
                kg_per_unit: 0.0,
                source: FactorSource::Missing,
            },
        }
    }

    /// Rebuild the waste tables with canonical keys so config files may use
    /// any casing or separators.
    pub fn canonicalized(self) -> Self {
        let waste_by_type = self
            .waste_by_type
            .into_iter()
            .map(|(ty, methods)| {
                let methods = methods
                    .into_iter()
                    .map(|(m, f)| (canonical_key(&m), f))
                    .collect();
                (canonical_key(&ty), methods)
            })
            .collect();
        let waste_generic = self
            .waste_generic
            .into_iter()
            .map(|(m, f)| (canonical_key(&m), f))
            .collect();
        EmissionFactorRegistry {
            waste_by_type,
            waste_generic,
            ..self
        }
    }

    /// Every factor must be finite and non-negative.
    pub fn validate(&self) -> EngineResult<()> {
        let fixed = [
            ("fuel_kg_per_liter", self.fuel_kg_per_liter),
            ("grid_kg_per_kwh", self.grid_kg_per_kwh),
            (
                "electrical_subsystem_kg_per_kwh",
                self.electrical_subsystem_kg_per_kwh,
            ),
            ("water_kg_per_m3", self.water_kg_per_m3),
        ];
        for (name, value) in fixed {
            check_factor(name, value)?;
        }
        for (ty, methods) in &self.waste_by_type {
            for (method, value) in methods {
                check_factor(&format!("waste_by_type.{ty}.{method}"), *value)?;
            }
        }
        for (method, value) in &self.waste_generic {
            check_factor(&format!("waste_generic.{method}"), *value)?;
        }
        Ok(())
    }
}

fn check_factor(name: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::Config(format!(
            "emission factor {name} must be finite and >= 0, got {value}"
        )))
    }
}
