use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::aggregate::{aggregate_period, PeriodAggregate};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::normalize::RawActivityEntry;
use crate::period::{PeriodKey, ProjectId};

/// Exactly one canonical aggregate per (project, period).
#[derive(Debug, Clone, Default)]
pub struct PeriodLedger {
    records: BTreeMap<(ProjectId, PeriodKey), PeriodAggregate>,
}

impl PeriodLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, project: ProjectId, period: PeriodKey) -> bool {
        self.records.contains_key(&(project, period))
    }

    /// Store a freshly computed aggregate. A second submission for the same
    /// period is rejected, never merged.
    pub fn submit(&mut self, aggregate: PeriodAggregate) -> EngineResult<&PeriodAggregate> {
        let key = (aggregate.project, aggregate.period);
        if self.records.contains_key(&key) {
            warn!(project = %key.0, period = %key.1, "duplicate period submission rejected");
            return Err(EngineError::DuplicatePeriod {
                project: key.0,
                period: key.1,
            });
        }
        info!(project = %key.0, period = %key.1, "period aggregate recorded");
        let stored = self.records.entry(key).or_insert(aggregate);
        Ok(&*stored)
    }

    /// Aggregate a period's log and submit it. The duplicate check runs
    /// first so a rejected log costs no computation.
    pub fn submit_log(
        &mut self,
        project: ProjectId,
        period: PeriodKey,
        entries: &[RawActivityEntry],
        config: &EngineConfig,
    ) -> EngineResult<&PeriodAggregate> {
        if self.contains(project, period) {
            return Err(EngineError::DuplicatePeriod { project, period });
        }
        let aggregate = aggregate_period(project, period, entries, config)?;
        self.submit(aggregate)
    }

    /// Replace an existing aggregate wholesale after its raw entries changed.
    /// Returns the aggregate it replaced.
    pub fn recompute(
        &mut self,
        project: ProjectId,
        period: PeriodKey,
        entries: &[RawActivityEntry],
        config: &EngineConfig,
    ) -> EngineResult<PeriodAggregate> {
        if !self.contains(project, period) {
            return Err(EngineError::MissingData(format!(
                "no aggregate for project {project}, period {period} to recompute"
            )));
        }
        let fresh = aggregate_period(project, period, entries, config)?;
        let previous = self
            .records
            .insert((project, period), fresh)
            .ok_or_else(|| EngineError::MissingData(format!("period {period} vanished during recompute")))?;
        info!(%project, %period, "period aggregate recomputed");
        Ok(previous)
    }

    pub fn get(&self, project: ProjectId, period: PeriodKey) -> Option<&PeriodAggregate> {
        self.records.get(&(project, period))
    }

    /// A project's aggregates in chronological order.
    pub fn project_series(&self, project: ProjectId) -> Vec<&PeriodAggregate> {
        self.records
            .iter()
            .filter(|((p, _), _)| *p == project)
            .map(|(_, agg)| agg)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(kwh: f64) -> Vec<RawActivityEntry> {
        vec![RawActivityEntry::Electricity { kwh: kwh.into() }]
    }

    #[test]
    fn duplicate_submission_is_rejected_without_merge() {
        let mut ledger = PeriodLedger::new();
        let cfg = EngineConfig::default();
        let project = ProjectId::new();
        let period = PeriodKey::monthly(2024, 2).unwrap();

        ledger.submit_log(project, period, &log(1000.0), &cfg).unwrap();
        let err = ledger.submit_log(project, period, &log(500.0), &cfg).unwrap_err();
        assert!(matches!(err, EngineError::DuplicatePeriod { .. }));
        assert_eq!(ledger.get(project, period).unwrap().resources.electricity_kwh, 1000.0);
    }

    #[test]
    fn recompute_replaces_wholesale() {
        let mut ledger = PeriodLedger::new();
        let cfg = EngineConfig::default();
        let project = ProjectId::new();
        let period = PeriodKey::monthly(2024, 2).unwrap();

        assert!(matches!(
            ledger.recompute(project, period, &log(1.0), &cfg),
            Err(EngineError::MissingData(_))
        ));

        ledger.submit_log(project, period, &log(1000.0), &cfg).unwrap();
        let previous = ledger.recompute(project, period, &log(800.0), &cfg).unwrap();
        assert_eq!(previous.resources.electricity_kwh, 1000.0);
        assert_eq!(ledger.get(project, period).unwrap().resources.electricity_kwh, 800.0);
    }

    #[test]
    fn project_series_is_chronological_and_scoped() {
        let mut ledger = PeriodLedger::new();
        let cfg = EngineConfig::default();
        let a = ProjectId::new();
        let b = ProjectId::new();
        for (project, key) in [(a, "2024-03"), (b, "2024-01"), (a, "2024-01"), (a, "2024-02-14")] {
            ledger
                .submit_log(project, key.parse().unwrap(), &log(10.0), &cfg)
                .unwrap();
        }
        let periods: Vec<String> = ledger
            .project_series(a)
            .iter()
            .map(|agg| agg.period.to_string())
            .collect();
        assert_eq!(periods, vec!["2024-01", "2024-02-14", "2024-03"]);
    }
}
