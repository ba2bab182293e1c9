use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::factors::{canonical_key, ActivityCategory, EmissionFactorRegistry, FactorLookup, FactorSource};

/// Upper bound on the summed treatment percentages of one waste type in one
/// period. The extra 0.0001 absorbs float noise from splits like 33.3/33.3/33.4.
pub const ALLOCATION_CEILING_PCT: f64 = 100.0001;

/// One disposal-method record for a waste stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteEntry {
    pub waste_type: String,
    pub treatment_method: String,
    pub mass_kg: f64,
    pub treatment_pct: f64,
}

impl WasteEntry {
    pub fn new(waste_type: &str, treatment_method: &str, mass_kg: f64, treatment_pct: f64) -> Self {
        WasteEntry {
            waste_type: canonical_key(waste_type),
            treatment_method: canonical_key(treatment_method),
            mass_kg,
            treatment_pct,
        }
    }

    /// Share of the stream handled by this entry's treatment method.
    pub fn allocated_mass_kg(&self) -> f64 {
        self.mass_kg * (self.treatment_pct / 100.0)
    }

    /// True when the form left the type, method, mass or percentage
    /// unfilled. Such an entry carries no treated quantity.
    pub fn is_incomplete(&self) -> bool {
        self.waste_type.is_empty()
            || self.treatment_method.is_empty()
            || !(self.mass_kg.is_finite() && self.mass_kg > 0.0)
            || !(self.treatment_pct.is_finite() && self.treatment_pct > 0.0)
    }

    /// Mass must be positive; percentage must lie in (0, 100].
    pub fn validate(&self) -> EngineResult<()> {
        if self.waste_type.is_empty() {
            return Err(EngineError::InvalidWasteEntry("waste type is required".into()));
        }
        if self.treatment_method.is_empty() {
            return Err(EngineError::InvalidWasteEntry(
                "treatment method is required".into(),
            ));
        }
        if !(self.mass_kg.is_finite() && self.mass_kg > 0.0) {
            return Err(EngineError::InvalidWasteEntry(format!(
                "mass must be > 0 kg, got {}",
                self.mass_kg
            )));
        }
        if !(self.treatment_pct.is_finite() && self.treatment_pct > 0.0 && self.treatment_pct <= 100.0) {
            return Err(EngineError::InvalidWasteEntry(format!(
                "treatment percentage must be in (0, 100], got {}",
                self.treatment_pct
            )));
        }
        Ok(())
    }
}

/// Check a new entry against the entries already recorded for the period.
/// Only entries of the same waste type count toward the ceiling.
pub fn validate_waste_allocation(existing: &[WasteEntry], new_entry: &WasteEntry) -> EngineResult<()> {
    validate_waste_allocation_with(existing, new_entry, ALLOCATION_CEILING_PCT)
}

/// `validate_waste_allocation` against a configured ceiling.
pub fn validate_waste_allocation_with(
    existing: &[WasteEntry],
    new_entry: &WasteEntry,
    ceiling_pct: f64,
) -> EngineResult<()> {
    new_entry.validate()?;
    let existing_pct: f64 = existing
        .iter()
        .filter(|e| e.waste_type == new_entry.waste_type)
        .map(|e| e.treatment_pct)
        .sum();
    if existing_pct + new_entry.treatment_pct > ceiling_pct {
        return Err(EngineError::AllocationExceeded {
            waste_type: new_entry.waste_type.clone(),
            existing_pct,
            attempted_pct: new_entry.treatment_pct,
            limit_pct: ceiling_pct,
        });
    }
    Ok(())
}

/// Total input mass of a waste stream: the largest single entry, not the sum.
///
/// Entries of one type describe splits of the same underlying stream, so
/// adding their masses would count the stream once per disposal method.
pub fn total_input_mass_kg(entries: &[WasteEntry]) -> f64 {
    entries.iter().map(|e| e.mass_kg).fold(0.0, f64::max)
}

/// A waste entry with its factor applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteEmission {
    pub waste_type: String,
    pub treatment_method: String,
    pub mass_kg: f64,
    pub treatment_pct: f64,
    pub allocated_mass_kg: f64,
    pub factor_kg_per_kg: f64,
    pub factor_source: FactorSource,
    pub emission_kg: f64,
}

impl WasteEmission {
    pub fn with_factor(entry: &WasteEntry, factor: FactorLookup) -> Self {
        let allocated = entry.allocated_mass_kg();
        WasteEmission {
            waste_type: entry.waste_type.clone(),
            treatment_method: entry.treatment_method.clone(),
            mass_kg: entry.mass_kg,
            treatment_pct: entry.treatment_pct,
            allocated_mass_kg: allocated,
            factor_kg_per_kg: factor.kg_per_unit,
            factor_source: factor.source,
            emission_kg: allocated * factor.kg_per_unit,
        }
    }

    pub fn is_low_confidence(&self) -> bool {
        self.factor_source == FactorSource::Missing
    }
}

pub fn waste_emission(entry: &WasteEntry, registry: &EmissionFactorRegistry) -> WasteEmission {
    let factor = registry.factor_for(
        ActivityCategory::Waste,
        Some(&entry.waste_type),
        Some(&entry.treatment_method),
    );
    if factor.source == FactorSource::Missing {
        warn!(
            waste_type = %entry.waste_type,
            treatment_method = %entry.treatment_method,
            "no emission factor for waste treatment; counting as zero"
        );
    }
    WasteEmission::with_factor(entry, factor)
}

/// Mass-weighted averages across disposal entries, used for target setting.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeightedAverage {
    pub avg_factor_kg_per_kg: f64,
    pub avg_treatment_pct: f64,
    pub total_weight_kg: f64,
}

/// Weights are each entry's full mass, not its allocated mass. An empty or
/// zero-mass set averages to 0.
pub fn weighted_average(emissions: &[WasteEmission]) -> WeightedAverage {
    let total_weight: f64 = emissions.iter().map(|e| e.mass_kg).sum();
    if total_weight == 0.0 {
        return WeightedAverage::default();
    }
    let factor_sum: f64 = emissions.iter().map(|e| e.factor_kg_per_kg * e.mass_kg).sum();
    let pct_sum: f64 = emissions.iter().map(|e| e.treatment_pct * e.mass_kg).sum();
    WeightedAverage {
        avg_factor_kg_per_kg: factor_sum / total_weight,
        avg_treatment_pct: pct_sum / total_weight,
        total_weight_kg: total_weight,
    }
}

/// Accepted entries for one waste type within one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteAllocation {
    waste_type: String,
    ceiling_pct: f64,
    entries: Vec<WasteEntry>,
}

impl WasteAllocation {
    pub fn new(waste_type: &str) -> Self {
        Self::with_ceiling(waste_type, ALLOCATION_CEILING_PCT)
    }

    /// Allocation with a configured ceiling instead of the default.
    pub fn with_ceiling(waste_type: &str, ceiling_pct: f64) -> Self {
        WasteAllocation {
            waste_type: canonical_key(waste_type),
            ceiling_pct,
            entries: Vec::new(),
        }
    }

    /// Canonical waste-type key.
    pub fn waste_type(&self) -> &str {
        &self.waste_type
    }

    pub fn entries(&self) -> &[WasteEntry] {
        &self.entries
    }

    /// Validate then insert. On error the entry set is unchanged.
    pub fn try_add(&mut self, entry: WasteEntry) -> EngineResult<()> {
        if entry.waste_type != self.waste_type {
            return Err(EngineError::InvalidWasteEntry(format!(
                "entry of type '{}' does not belong to the '{}' allocation",
                entry.waste_type, self.waste_type
            )));
        }
        validate_waste_allocation_with(&self.entries, &entry, self.ceiling_pct)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Sum of the accepted treatment percentages.
    pub fn allocated_pct(&self) -> f64 {
        self.entries.iter().map(|e| e.treatment_pct).sum()
    }

    /// Headroom up to 100%, never negative.
    pub fn remaining_pct(&self) -> f64 {
        (100.0 - self.allocated_pct()).max(0.0)
    }

    /// Max rule; see [`total_input_mass_kg`].
    pub fn total_input_mass_kg(&self) -> f64 {
        total_input_mass_kg(&self.entries)
    }

    /// Treated mass across entries, additive.
    pub fn allocated_mass_kg(&self) -> f64 {
        self.entries.iter().map(WasteEntry::allocated_mass_kg).sum()
    }

    /// Each accepted entry with its registry factor applied.
    pub fn emissions(&self, registry: &EmissionFactorRegistry) -> Vec<WasteEmission> {
        self.entries
            .iter()
            .map(|e| waste_emission(e, registry))
            .collect()
    }

    /// Additive across entries: each one is a distinct treated quantity.
    pub fn total_emissions_kg(&self, registry: &EmissionFactorRegistry) -> f64 {
        self.emissions(registry).iter().map(|e| e.emission_kg).sum()
    }

    /// Mass-weighted factor and treatment percentage for this type.
    pub fn weighted_average(&self, registry: &EmissionFactorRegistry) -> WeightedAverage {
        weighted_average(&self.emissions(registry))
    }
}

/// Per-type roll-up of a period's waste.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteTypeSummary {
    pub waste_type: String,
    pub input_mass_kg: f64,
    pub allocated_mass_kg: f64,
    pub allocated_pct: f64,
    pub emissions_kg: f64,
    pub entries: Vec<WasteEmission>,
}

/// All waste allocations of one period, keyed by waste type.
#[derive(Debug, Clone, PartialEq)]
pub struct WasteBook {
    ceiling_pct: f64,
    by_type: BTreeMap<String, WasteAllocation>,
}

impl Default for WasteBook {
    fn default() -> Self {
        WasteBook::new(ALLOCATION_CEILING_PCT)
    }
}

impl WasteBook {
    pub fn new(ceiling_pct: f64) -> Self {
        WasteBook {
            ceiling_pct,
            by_type: BTreeMap::new(),
        }
    }

    /// Replay entries in order, failing on the first one that breaks the
    /// allocation invariant.
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = &'a WasteEntry>,
        ceiling_pct: f64,
    ) -> EngineResult<Self> {
        let mut book = WasteBook::new(ceiling_pct);
        for entry in entries {
            book.try_add(entry.clone())?;
        }
        Ok(book)
    }

    pub fn try_add(&mut self, entry: WasteEntry) -> EngineResult<()> {
        let ceiling = self.ceiling_pct;
        self.by_type
            .entry(entry.waste_type.clone())
            .or_insert_with(|| WasteAllocation::with_ceiling(&entry.waste_type, ceiling))
            .try_add(entry)
    }

    pub fn allocation(&self, waste_type: &str) -> Option<&WasteAllocation> {
        self.by_type.get(&canonical_key(waste_type))
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    pub fn summarize(&self, registry: &EmissionFactorRegistry) -> Vec<WasteTypeSummary> {
        self.by_type
            .values()
            .map(|alloc| {
                let entries = alloc.emissions(registry);
                WasteTypeSummary {
                    waste_type: alloc.waste_type.clone(),
                    input_mass_kg: alloc.total_input_mass_kg(),
                    allocated_mass_kg: alloc.allocated_mass_kg(),
                    allocated_pct: alloc.allocated_pct(),
                    emissions_kg: entries.iter().map(|e| e.emission_kg).sum(),
                    entries,
                }
            })
            .collect()
    }
}
