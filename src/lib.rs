#![forbid(unsafe_code)]
//! Emissions accounting and aggregation for construction-site ESG logs.
//!
//! Raw activity entries (equipment fuel, logistics, electricity, water,
//! waste, safety) are normalized, run through the factor registry and
//! rolled up into Scope 1/2/3 totals per reporting period. Trend, intensity
//! and TRIR analytics sit on top of the period aggregates.
//!
//! The engine does no I/O of its own beyond the `RecordStore` seam and
//! config loading; everything else is a pure function of its inputs.

pub mod aggregate;
pub mod analytics;
pub mod config;
pub mod error;
pub mod factors;
pub mod ledger;
pub mod normalize;
pub mod period;
pub mod safety;
pub mod store;
pub mod targets;
pub mod waste;

pub use aggregate::{
    aggregate_period, aggregate_periods, BatchAggregation, IncompleteWasteEntry, PeriodAggregate, ScopeTotals,
};
pub use analytics::{carbon_intensity, compute_mom, compute_trend, summarize, DashboardSummary, LinearTrend};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use factors::{ActivityCategory, EmissionFactorRegistry, FactorLookup, FactorSource};
pub use ledger::PeriodLedger;
pub use normalize::{normalize, CanonicalQuantity, NumericInput, RawActivityEntry, Reading};
pub use period::{PeriodKey, ProjectId};
pub use safety::compute_trir;
pub use store::{InMemoryRecordStore, RecordStore};
pub use targets::{compare_to_target, Benchmark, Target, TargetComparison};
pub use waste::{validate_waste_allocation, WasteAllocation, WasteEntry};
