use std::fs;

use cyboair_esg_engine::{
    aggregate_period, aggregate_periods, compute_mom, compute_trend, compute_trir, summarize, validate_waste_allocation,
    waste::{weighted_average, total_input_mass_kg, WasteEmission},
    EngineConfig, EngineError, FactorLookup, FactorSource, InMemoryRecordStore, PeriodKey, PeriodLedger, ProjectId,
    RawActivityEntry, RecordStore, WasteEntry,
};
use serde_json::json;
use tempfile::tempdir;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

fn entries(value: serde_json::Value) -> Vec<RawActivityEntry> {
    serde_json::from_value(value).expect("raw entries")
}

#[test]
fn daily_equipment_log_yields_scope1() {
    let log = entries(json!([
        { "kind": "equipment", "shape": "usage", "hours": "8", "fuel_rate_l_per_hour": "5" }
    ]));
    let agg = aggregate_period(
        ProjectId::new(),
        "2024-06-03".parse().unwrap(),
        &log,
        &EngineConfig::default(),
    )
    .expect("aggregate");
    assert_close(agg.resources.equipment_fuel_liters, 40.0);
    assert_close(agg.scopes.scope1_kg, 107.2);
}

#[test]
fn monthly_electricity_keeps_grid_and_subsystem_apart() {
    let log = entries(json!([
        { "kind": "electricity", "kwh": 2000 },
        { "kind": "electrical_subsystem", "kwh": 2000 }
    ]));
    let agg = aggregate_period(
        ProjectId::new(),
        "2024-06".parse().unwrap(),
        &log,
        &EngineConfig::default(),
    )
    .expect("aggregate");
    assert_close(agg.scopes.scope2_kg, 1014.0);
    assert_close(agg.electrical_subsystem_kg, 1520.0);
}

#[test]
fn waste_reference_values() {
    let one_ton = WasteEntry::new("metal", "recycling", 1000.0, 50.0);
    let e = WasteEmission::with_factor(
        &one_ton,
        FactorLookup {
            kg_per_unit: 0.12,
            source: FactorSource::TypeSpecific,
        },
    );
    assert_close(e.allocated_mass_kg, 500.0);
    assert_close(e.emission_kg, 60.0);

    let lookup = |f| FactorLookup {
        kg_per_unit: f,
        source: FactorSource::TypeSpecific,
    };
    let pair = vec![
        WasteEmission::with_factor(&WasteEntry::new("timber", "recycling", 100.0, 40.0), lookup(0.12)),
        WasteEmission::with_factor(&WasteEntry::new("timber", "landfill", 300.0, 60.0), lookup(1.8)),
    ];
    assert_close(weighted_average(&pair).avg_factor_kg_per_kg, 1.38);

    let splits = vec![
        WasteEntry::new("general", "landfill", 100.0, 30.0),
        WasteEntry::new("general", "recycling", 250.0, 30.0),
        WasteEntry::new("general", "incineration", 100.0, 30.0),
    ];
    assert_close(total_input_mass_kg(&splits), 250.0);
}

#[test]
fn over_allocation_is_rejected_before_storage() {
    let existing = vec![
        WasteEntry::new("plastic", "recycling", 80.0, 55.0),
        WasteEntry::new("plastic", "incineration", 80.0, 45.0),
    ];
    let err = validate_waste_allocation(&existing, &WasteEntry::new("plastic", "landfill", 80.0, 1.0))
        .expect_err("over 100% must fail");
    assert!(err.to_string().contains("plastic"), "unexpected error: {err}");
    assert_eq!(existing.len(), 2);
}

#[test]
fn analytics_reference_values() {
    assert_eq!(compute_trir(0, 1000.0), Some(0.0));
    assert_eq!(compute_trir(1, 0.0), None);
    assert_eq!(compute_trir(5, 100_000.0), Some(10.0));

    assert_close(compute_mom(120.0, 100.0), 20.0);
    assert_close(compute_mom(80.0, 100.0), -20.0);
    assert_eq!(compute_mom(80.0, 0.0), 0.0);

    let trend = compute_trend(&[10.0, 10.0, 10.0, 10.0]);
    assert_eq!(trend.slope, 0.0);
    assert!(trend.trend_series.iter().all(|v| *v == 0.0));
}

struct FlakyStore {
    inner: InMemoryRecordStore,
    broken: PeriodKey,
}

impl RecordStore for FlakyStore {
    fn fetch_entries(&self, project: ProjectId, period: PeriodKey) -> Result<Vec<RawActivityEntry>, EngineError> {
        if period == self.broken {
            return Err(EngineError::StoreRead {
                project,
                period,
                message: "connection reset".into(),
            });
        }
        self.inner.fetch_entries(project, period)
    }
}

#[test]
fn one_failed_read_does_not_block_other_periods() {
    let project = ProjectId::new();
    let cfg = EngineConfig::default();
    let periods: Vec<PeriodKey> = ["2024-01", "2024-02", "2024-03"]
        .iter()
        .map(|p| p.parse().unwrap())
        .collect();

    let mut inner = InMemoryRecordStore::new();
    for (i, period) in periods.iter().enumerate() {
        inner
            .append(
                project,
                *period,
                RawActivityEntry::Water {
                    m3: (100.0 * (i + 1) as f64).into(),
                },
                cfg.allocation_ceiling_pct,
            )
            .unwrap();
    }
    let store = FlakyStore {
        inner,
        broken: periods[1],
    };

    let batch = aggregate_periods(&store, project, &periods, &cfg);
    assert!(!batch.is_complete());
    assert_eq!(batch.aggregates.len(), 2);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].period, periods[1]);
    assert!(matches!(batch.failures[0].error, EngineError::StoreRead { .. }));
}

#[test]
fn ledger_flow_with_summary() {
    let project = ProjectId::new();
    let cfg = EngineConfig::default();
    let mut ledger = PeriodLedger::new();

    let jan = entries(json!([
        { "kind": "electricity", "kwh": 1000 },
        { "kind": "labor", "hours": 500 },
        { "kind": "safety", "incidents": 1, "exposure_hours": 100000 }
    ]));
    let feb = entries(json!([
        { "kind": "electricity", "kwh": "800" },
        { "kind": "labor", "hours": 500 },
        { "kind": "safety", "incidents": 0, "exposure_hours": 100000 }
    ]));
    let jan_key: PeriodKey = "2024-01".parse().unwrap();
    let feb_key: PeriodKey = "2024-02".parse().unwrap();

    ledger.submit_log(project, jan_key, &jan, &cfg).unwrap();
    ledger.submit_log(project, feb_key, &feb, &cfg).unwrap();
    assert!(matches!(
        ledger.submit_log(project, feb_key, &feb, &cfg),
        Err(EngineError::DuplicatePeriod { .. })
    ));

    let series: Vec<_> = ledger.project_series(project).into_iter().cloned().collect();
    let summary = summarize(&series, &cfg);
    assert_close(summary.mom_pct, -20.0);
    assert_close(summary.carbon_intensity, 1800.0 * 0.507 / 1000.0);
    assert_eq!(summary.safety.trir, Some(1.0));
    assert!(summary.trend.slope < 0.0);
    assert_eq!(summary.trend.trend_series[0], 0.0);
}

#[test]
fn config_file_swaps_grid_factor() {
    let dir = tempdir().expect("tmp");
    let path = dir.path().join("engine.json");
    fs::write(&path, r#"{ "factors": { "grid_kg_per_kwh": 0.4 } }"#).expect("write config");

    let cfg = EngineConfig::load(&path).expect("config");
    let agg = aggregate_period(
        ProjectId::new(),
        "2024-06".parse().unwrap(),
        &entries(json!([{ "kind": "electricity", "kwh": 1000 }])),
        &cfg,
    )
    .unwrap();
    assert_close(agg.scopes.scope2_kg, 400.0);
}

#[test]
fn missing_config_file_is_io_error() {
    let dir = tempdir().expect("tmp");
    let err = EngineConfig::load(dir.path().join("absent.json")).expect_err("must fail");
    assert!(matches!(err, EngineError::Io(_)));
}

#[test]
fn partly_filled_waste_form_keeps_the_period() {
    let log = entries(json!([
        { "kind": "electricity", "kwh": 2000 },
        { "kind": "waste", "waste_type": "metal", "treatment_method": "recycling", "mass": "", "treatment_pct": "" }
    ]));
    let agg = aggregate_period(
        ProjectId::new(),
        "2024-06".parse().unwrap(),
        &log,
        &EngineConfig::default(),
    )
    .expect("blank waste fields must not fail the period");
    assert_close(agg.scopes.scope2_kg, 1014.0);
    assert_eq!(agg.scope3_breakdown.waste_kg, 0.0);
    assert_eq!(agg.incomplete_waste_entries.len(), 1);
    assert_eq!(agg.incomplete_waste_entries[0].waste_type, "metal");
}

#[test]
fn period_with_every_entry_rejected_aggregates_to_zero() {
    let project = ProjectId::new();
    let cfg = EngineConfig::default();
    let period: PeriodKey = "2024-07".parse().unwrap();
    let mut store = InMemoryRecordStore::new();
    let rejected = entries(json!([
        { "kind": "waste", "waste_type": "timber", "treatment_method": "landfill", "mass": 50, "treatment_pct": 0 }
    ]));
    for entry in rejected {
        store
            .append(project, period, entry, cfg.allocation_ceiling_pct)
            .expect_err("zero percentage is rejected");
    }

    let batch = aggregate_periods(&store, project, &[period], &cfg);
    assert!(batch.is_complete());
    assert_eq!(batch.aggregates[0].entry_count, 0);
    assert_eq!(batch.aggregates[0].scopes.total_kg(), 0.0);
}
