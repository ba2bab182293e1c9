use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::aggregate::{PeriodAggregate, ResourceTotals, ScopeTotals};
use crate::config::EngineConfig;
use crate::period::PeriodKey;
use crate::safety::SafetySummary;

/// Emissions per labor-hour; 0 when no labor hours were logged.
pub fn carbon_intensity(total_emissions: f64, labor_hours: f64) -> f64 {
    if labor_hours > 0.0 && labor_hours.is_finite() {
        total_emissions / labor_hours
    } else {
        0.0
    }
}

/// Month-over-month change in percent. A missing or zero previous value
/// yields 0 rather than a division by zero.
pub fn compute_mom(current: f64, previous: f64) -> f64 {
    if previous == 0.0 || !previous.is_finite() || !current.is_finite() {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
    /// Fitted line with its origin pinned to the first period: the shape of
    /// the regression, offset so `trend_series[0] == 0`.
    pub trend_series: Vec<f64>,
}

/// Ordinary least squares of `series[i]` against `i`.
pub fn compute_trend(series: &[f64]) -> LinearTrend {
    let n = series.len();
    if n == 0 {
        return LinearTrend::default();
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = series.iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (i, y) in series.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxx += dx * dx;
        sxy += dx * (y - y_mean);
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let intercept = y_mean - slope * x_mean;

    LinearTrend {
        slope,
        intercept,
        trend_series: (0..n).map(|i| slope * i as f64).collect(),
    }
}

/// One calendar month of a project's activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub month: PeriodKey,
    pub scopes: ScopeTotals,
    pub total_kg: f64,
    pub labor_hours: f64,
    pub carbon_intensity: f64,
    pub mom_pct: f64,
}

/// Roll daily and monthly aggregates into calendar months, oldest first.
pub fn monthly_series(aggregates: &[PeriodAggregate]) -> Vec<SeriesPoint> {
    let mut months: BTreeMap<PeriodKey, (ScopeTotals, f64)> = BTreeMap::new();
    for agg in aggregates {
        let slot = months
            .entry(agg.period.containing_month())
            .or_insert((ScopeTotals::default(), 0.0));
        slot.0 = slot.0.add(&agg.scopes);
        slot.1 += agg.labor_hours;
    }

    let mut previous: Option<f64> = None;
    months
        .into_iter()
        .map(|(month, (scopes, labor_hours))| {
            let total_kg = scopes.total_kg();
            let mom_pct = previous.map_or(0.0, |prev| compute_mom(total_kg, prev));
            previous = Some(total_kg);
            SeriesPoint {
                month,
                scopes,
                total_kg,
                labor_hours,
                carbon_intensity: carbon_intensity(total_kg, labor_hours),
                mom_pct,
            }
        })
        .collect()
}

/// Aggregates whose month lies in the `months` calendar months ending with
/// the month of `as_of`.
pub fn trailing_window(aggregates: &[PeriodAggregate], as_of: NaiveDate, months: u32) -> Vec<&PeriodAggregate> {
    let end = i64::from(as_of.year()) * 12 + i64::from(as_of.month()) - 1;
    let start = end - i64::from(months) + 1;
    aggregates
        .iter()
        .filter(|agg| {
            let idx = agg.period.month_index();
            idx >= start && idx <= end && agg.period <= PeriodKey::Daily(as_of)
        })
        .collect()
}

/// Cumulative figures for a dashboard or report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub period_count: usize,
    pub cumulative: ScopeTotals,
    pub cumulative_tco2e: f64,
    pub electrical_subsystem_kg: f64,
    pub resources: ResourceTotals,
    pub safety: SafetySummary,
    pub labor_hours: f64,
    pub carbon_intensity: f64,
    /// Change between the last two calendar months in the series.
    pub mom_pct: f64,
    pub trend: LinearTrend,
    pub series: Vec<SeriesPoint>,
}

pub fn summarize(aggregates: &[PeriodAggregate], config: &EngineConfig) -> DashboardSummary {
    let base = config.trir_exposure_base_hours;
    let mut cumulative = ScopeTotals::default();
    let mut resources = ResourceTotals::default();
    let mut safety = SafetySummary::new(0, 0.0, base);
    let mut electrical_subsystem_kg = 0.0;
    let mut labor_hours = 0.0;

    for agg in aggregates {
        cumulative = cumulative.add(&agg.scopes);
        resources = resources.add(&agg.resources);
        safety = safety.merge(&agg.safety(base), base);
        electrical_subsystem_kg += agg.electrical_subsystem_kg;
        labor_hours += agg.labor_hours;
    }

    let series = monthly_series(aggregates);
    let totals: Vec<f64> = series.iter().map(|p| p.total_kg).collect();
    let mom_pct = match totals.as_slice() {
        [.., prev, current] => compute_mom(*current, *prev),
        _ => 0.0,
    };

    DashboardSummary {
        period_count: aggregates.len(),
        cumulative,
        cumulative_tco2e: cumulative.total_tco2e(),
        electrical_subsystem_kg,
        resources,
        safety,
        labor_hours,
        carbon_intensity: carbon_intensity(cumulative.total_kg(), labor_hours),
        mom_pct,
        trend: compute_trend(&totals),
        series,
    }
}
