use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::ScopeTotals;
use crate::error::{EngineError, EngineResult};
use crate::period::ProjectId;
use crate::waste::WeightedAverage;

/// Optional per-project benchmarks. Comparison only; never feeds back into
/// the accounting.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    pub scope1_kg: Option<f64>,
    pub scope2_kg: Option<f64>,
    pub scope3_kg: Option<f64>,
    pub trir: Option<f64>,
    pub waste_factor_kg_per_kg: Option<f64>,
    pub waste_treatment_pct: Option<f64>,
}

impl Target {
    /// Seed the waste benchmarks from a mass-weighted history.
    pub fn with_waste_baseline(mut self, baseline: &WeightedAverage) -> Self {
        if baseline.total_weight_kg > 0.0 {
            self.waste_factor_kg_per_kg = Some(baseline.avg_factor_kg_per_kg);
            self.waste_treatment_pct = Some(baseline.avg_treatment_pct);
        }
        self
    }

    pub fn total_kg(&self) -> Option<f64> {
        match (self.scope1_kg, self.scope2_kg, self.scope3_kg) {
            (None, None, None) => None,
            (a, b, c) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0) + c.unwrap_or(0.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Benchmark {
    NotSet,
    NoActual { target: f64 },
    Within { actual: f64, target: f64, pct_of_target: Option<f64> },
    Exceeded { actual: f64, target: f64, pct_of_target: Option<f64> },
}

/// Place one actual against its target. `pct_of_target` is `None` for a
/// zero target.
pub fn benchmark(actual: Option<f64>, target: Option<f64>) -> Benchmark {
    match (actual, target) {
        (_, None) => Benchmark::NotSet,
        (None, Some(target)) => Benchmark::NoActual { target },
        (Some(actual), Some(target)) => {
            let pct_of_target = (target > 0.0).then(|| actual / target * 100.0);
            if actual <= target {
                Benchmark::Within {
                    actual,
                    target,
                    pct_of_target,
                }
            } else {
                Benchmark::Exceeded {
                    actual,
                    target,
                    pct_of_target,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetComparison {
    pub scope1: Benchmark,
    pub scope2: Benchmark,
    pub scope3: Benchmark,
    pub total: Benchmark,
    pub trir: Benchmark,
}

/// Compare actuals to a project's target. A missing target is "no
/// benchmark" on every line, not an error.
pub fn compare_to_target(actual: &ScopeTotals, trir: Option<f64>, target: Option<&Target>) -> TargetComparison {
    let t = target.cloned().unwrap_or_default();
    TargetComparison {
        scope1: benchmark(Some(actual.scope1_kg), t.scope1_kg),
        scope2: benchmark(Some(actual.scope2_kg), t.scope2_kg),
        scope3: benchmark(Some(actual.scope3_kg), t.scope3_kg),
        total: benchmark(Some(actual.total_kg()), t.total_kg()),
        trir: benchmark(trir, t.trir),
    }
}

/// Targets as read from the host's project records.
#[derive(Debug, Clone, Default)]
pub struct TargetBook {
    targets: BTreeMap<ProjectId, Target>,
}

impl TargetBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, project: ProjectId, target: Target) -> Option<Target> {
        self.targets.insert(project, target)
    }

    pub fn get(&self, project: ProjectId) -> EngineResult<&Target> {
        self.targets
            .get(&project)
            .ok_or_else(|| EngineError::MissingData(format!("no target recorded for project {project}")))
    }

    /// Like `compare_to_target`, looking the target up first.
    pub fn compare(&self, project: ProjectId, actual: &ScopeTotals, trir: Option<f64>) -> TargetComparison {
        let target = match self.get(project) {
            Ok(t) => Some(t),
            Err(err) => {
                debug!(%project, error = %err, "comparing without benchmark");
                None
            }
        };
        compare_to_target(actual, trir, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals() -> ScopeTotals {
        ScopeTotals {
            scope1_kg: 900.0,
            scope2_kg: 1200.0,
            scope3_kg: 50.0,
        }
    }

    #[test]
    fn absent_target_degrades_to_not_set() {
        let cmp = compare_to_target(&totals(), Some(3.0), None);
        assert_eq!(cmp.scope1, Benchmark::NotSet);
        assert_eq!(cmp.total, Benchmark::NotSet);
        assert_eq!(cmp.trir, Benchmark::NotSet);
    }

    #[test]
    fn within_and_exceeded_are_reported() {
        let target = Target {
            scope1_kg: Some(1000.0),
            scope2_kg: Some(1000.0),
            trir: Some(2.0),
            ..Target::default()
        };
        let cmp = compare_to_target(&totals(), None, Some(&target));
        assert_eq!(
            cmp.scope1,
            Benchmark::Within {
                actual: 900.0,
                target: 1000.0,
                pct_of_target: Some(90.0)
            }
        );
        assert!(matches!(cmp.scope2, Benchmark::Exceeded { .. }));
        assert_eq!(cmp.scope3, Benchmark::NotSet);
        assert_eq!(cmp.trir, Benchmark::NoActual { target: 2.0 });
        assert!(matches!(cmp.total, Benchmark::Exceeded { .. }));
    }

    #[test]
    fn zero_target_has_no_percentage() {
        assert_eq!(
            benchmark(Some(5.0), Some(0.0)),
            Benchmark::Exceeded {
                actual: 5.0,
                target: 0.0,
                pct_of_target: None
            }
        );
    }

    #[test]
    fn book_lookup_reports_missing_data_but_compare_degrades() {
        let mut book = TargetBook::new();
        let known = ProjectId::new();
        let unknown = ProjectId::new();
        book.set(
            known,
            Target {
                scope1_kg: Some(2000.0),
                ..Target::default()
            },
        );

        assert!(matches!(book.get(unknown), Err(EngineError::MissingData(_))));
        assert_eq!(book.compare(unknown, &totals(), None).scope1, Benchmark::NotSet);
        assert!(matches!(
            book.compare(known, &totals(), None).scope1,
            Benchmark::Within { .. }
        ));
    }

    #[test]
    fn waste_baseline_fills_only_from_real_weight() {
        let empty = Target::default().with_waste_baseline(&WeightedAverage::default());
        assert_eq!(empty.waste_factor_kg_per_kg, None);

        let seeded = Target::default().with_waste_baseline(&WeightedAverage {
            avg_factor_kg_per_kg: 1.38,
            avg_treatment_pct: 62.5,
            total_weight_kg: 400.0,
        });
        assert_eq!(seeded.waste_factor_kg_per_kg, Some(1.38));
        assert_eq!(seeded.waste_treatment_pct, Some(62.5));
    }
}
