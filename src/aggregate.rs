use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::normalize::{normalize, CanonicalQuantity, RawActivityEntry};
use crate::period::{PeriodKey, ProjectId};
use crate::safety::{compute_trir_with_base, SafetySummary};
use crate::store::RecordStore;
use crate::waste::{WasteBook, WasteTypeSummary};

const KG_PER_TONNE: f64 = 1000.0;

/// Scope 1/2/3 emissions in kg CO2e.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScopeTotals {
    pub scope1_kg: f64,
    pub scope2_kg: f64,
    pub scope3_kg: f64,
}

impl ScopeTotals {
    pub fn total_kg(&self) -> f64 {
        self.scope1_kg + self.scope2_kg + self.scope3_kg
    }

    pub fn in_tonnes(&self) -> ScopeTotals {
        ScopeTotals {
            scope1_kg: self.scope1_kg / KG_PER_TONNE,
            scope2_kg: self.scope2_kg / KG_PER_TONNE,
            scope3_kg: self.scope3_kg / KG_PER_TONNE,
        }
    }

    pub fn total_tco2e(&self) -> f64 {
        self.total_kg() / KG_PER_TONNE
    }

    pub fn add(&self, other: &ScopeTotals) -> ScopeTotals {
        ScopeTotals {
            scope1_kg: self.scope1_kg + other.scope1_kg,
            scope2_kg: self.scope2_kg + other.scope2_kg,
            scope3_kg: self.scope3_kg + other.scope3_kg,
        }
    }
}

/// Where Scope 3 came from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scope3Breakdown {
    pub water_kg: f64,
    pub waste_kg: f64,
    pub logistics_kg: f64,
}

/// Physical resource totals for a period.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceTotals {
    pub electricity_kwh: f64,
    pub electrical_subsystem_kwh: f64,
    pub water_m3: f64,
    /// Sum over waste types of each type's input mass (largest entry).
    pub waste_kg: f64,
    pub equipment_fuel_liters: f64,
    pub logistics_fuel_liters: f64,
}

impl ResourceTotals {
    pub fn add(&self, other: &ResourceTotals) -> ResourceTotals {
        ResourceTotals {
            electricity_kwh: self.electricity_kwh + other.electricity_kwh,
            electrical_subsystem_kwh: self.electrical_subsystem_kwh + other.electrical_subsystem_kwh,
            water_m3: self.water_m3 + other.water_m3,
            waste_kg: self.waste_kg + other.waste_kg,
            equipment_fuel_liters: self.equipment_fuel_liters + other.equipment_fuel_liters,
            logistics_fuel_liters: self.logistics_fuel_liters + other.logistics_fuel_liters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowConfidenceFactor {
    pub waste_type: String,
    pub treatment_method: String,
}

/// A stored waste entry left out of the totals because its form was only
/// partly filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncompleteWasteEntry {
    pub waste_type: String,
    pub treatment_method: String,
    pub mass_kg: f64,
    pub treatment_pct: f64,
}

/// The canonical record for one (project, period). Always rebuilt from the
/// full set of raw entries; never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodAggregate {
    pub project: ProjectId,
    pub period: PeriodKey,
    pub scopes: ScopeTotals,
    pub scope3_breakdown: Scope3Breakdown,
    /// Electrical-subsystem emissions at their own grid factor. Reported
    /// beside Scope 2, never added into it.
    pub electrical_subsystem_kg: f64,
    pub incident_count: u32,
    pub exposure_hours: f64,
    pub labor_hours: f64,
    pub resources: ResourceTotals,
    pub waste: Vec<WasteTypeSummary>,
    pub low_confidence_factors: Vec<LowConfidenceFactor>,
    pub incomplete_waste_entries: Vec<IncompleteWasteEntry>,
    pub entry_count: usize,
}

impl PeriodAggregate {
    pub fn total_emissions_kg(&self) -> f64 {
        self.scopes.total_kg()
    }

    pub fn total_tco2e(&self) -> f64 {
        self.scopes.total_tco2e()
    }

    pub fn trir(&self, base_hours: f64) -> Option<f64> {
        compute_trir_with_base(self.incident_count, self.exposure_hours, base_hours)
    }

    pub fn safety(&self, base_hours: f64) -> SafetySummary {
        SafetySummary::new(self.incident_count, self.exposure_hours, base_hours)
    }
}

/// Roll one period's raw entries up into its aggregate.
///
/// Pure: the same entries and config always give the same aggregate. Waste
/// entries are replayed through the allocation ledger, so a stored set that
/// breaks the treatment-percentage ceiling is reported, not clamped. Waste
/// entries with a blank mass or percentage contribute nothing and are listed
/// in `incomplete_waste_entries`.
pub fn aggregate_period(
    project: ProjectId,
    period: PeriodKey,
    entries: &[RawActivityEntry],
    config: &EngineConfig,
) -> EngineResult<PeriodAggregate> {
    let factors = &config.factors;
    let mut scopes = ScopeTotals::default();
    let mut scope3 = Scope3Breakdown::default();
    let mut resources = ResourceTotals::default();
    let mut electrical_subsystem_kg = 0.0;
    let mut incident_count: u32 = 0;
    let mut exposure_hours = 0.0;
    let mut labor_hours = 0.0;
    let mut book = WasteBook::new(config.allocation_ceiling_pct);
    let mut incomplete_waste_entries = Vec::new();

    for entry in entries {
        match normalize(entry) {
            CanonicalQuantity::EquipmentFuel(q) => {
                scopes.scope1_kg += q.emissions_kg(factors.fuel_kg_per_liter);
                resources.equipment_fuel_liters += q.fuel_liters;
            }
            CanonicalQuantity::LogisticsFuel { fuel_liters } => {
                let kg = fuel_liters * factors.fuel_kg_per_liter;
                scope3.logistics_kg += kg;
                resources.logistics_fuel_liters += fuel_liters;
            }
            CanonicalQuantity::GridElectricity { kwh } => {
                scopes.scope2_kg += kwh * factors.grid_kg_per_kwh;
                resources.electricity_kwh += kwh;
            }
            CanonicalQuantity::ElectricalSubsystem { kwh } => {
                electrical_subsystem_kg += kwh * factors.electrical_subsystem_kg_per_kwh;
                resources.electrical_subsystem_kwh += kwh;
            }
            CanonicalQuantity::Water { m3 } => {
                scope3.water_kg += m3 * factors.water_kg_per_m3;
                resources.water_m3 += m3;
            }
            CanonicalQuantity::Waste(w) if w.is_incomplete() => {
                debug!(
                    %project,
                    %period,
                    waste_type = %w.waste_type,
                    treatment_method = %w.treatment_method,
                    "incomplete waste entry contributes nothing"
                );
                incomplete_waste_entries.push(IncompleteWasteEntry {
                    waste_type: w.waste_type,
                    treatment_method: w.treatment_method,
                    mass_kg: w.mass_kg,
                    treatment_pct: w.treatment_pct,
                });
            }
            CanonicalQuantity::Waste(w) => book.try_add(w)?,
            CanonicalQuantity::Safety {
                incidents,
                exposure_hours: hours,
            } => {
                incident_count = incident_count.saturating_add(incidents);
                exposure_hours += hours;
            }
            CanonicalQuantity::Labor { hours } => labor_hours += hours,
        }
    }

    let waste = book.summarize(factors);
    let mut low_confidence_factors = Vec::new();
    for summary in &waste {
        scope3.waste_kg += summary.emissions_kg;
        resources.waste_kg += summary.input_mass_kg;
        for e in summary.entries.iter().filter(|e| e.is_low_confidence()) {
            low_confidence_factors.push(LowConfidenceFactor {
                waste_type: e.waste_type.clone(),
                treatment_method: e.treatment_method.clone(),
            });
        }
    }
    scopes.scope3_kg = scope3.water_kg + scope3.waste_kg + scope3.logistics_kg;

    debug!(
        %project,
        %period,
        entries = entries.len(),
        scope1_kg = scopes.scope1_kg,
        scope2_kg = scopes.scope2_kg,
        scope3_kg = scopes.scope3_kg,
        "period aggregated"
    );

    Ok(PeriodAggregate {
        project,
        period,
        scopes,
        scope3_breakdown: scope3,
        electrical_subsystem_kg,
        incident_count,
        exposure_hours,
        labor_hours,
        resources,
        waste,
        low_confidence_factors,
        incomplete_waste_entries,
        entry_count: entries.len(),
    })
}

#[derive(Debug)]
pub struct PeriodFailure {
    pub period: PeriodKey,
    pub error: EngineError,
}

/// Aggregates that succeeded, alongside the periods that did not.
#[derive(Debug, Default)]
pub struct BatchAggregation {
    pub aggregates: Vec<PeriodAggregate>,
    pub failures: Vec<PeriodFailure>,
}

impl BatchAggregation {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Aggregate several periods from a record store. A failed read or an
/// invalid period is recorded and the remaining periods still aggregate.
pub fn aggregate_periods<S: RecordStore + ?Sized>(
    store: &S,
    project: ProjectId,
    periods: &[PeriodKey],
    config: &EngineConfig,
) -> BatchAggregation {
    let mut batch = BatchAggregation::default();
    for &period in periods {
        let result = store
            .fetch_entries(project, period)
            .and_then(|entries| aggregate_period(project, period, &entries, config));
        match result {
            Ok(agg) => batch.aggregates.push(agg),
            Err(error) => {
                warn!(%project, %period, %error, "period skipped during batch aggregation");
                batch.failures.push(PeriodFailure { period, error });
            }
        }
    }
    batch.aggregates.sort_by(|a, b| a.period.cmp(&b.period));
    batch
}
