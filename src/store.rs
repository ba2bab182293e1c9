use std::collections::BTreeMap;

use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::normalize::{normalize_waste, RawActivityEntry};
use crate::period::{PeriodKey, ProjectId};
use crate::waste::{validate_waste_allocation_with, WasteEntry};

/// Read side of the host's record store. The engine only ever asks for the
/// full entry set of one (project, period).
pub trait RecordStore {
    fn fetch_entries(&self, project: ProjectId, period: PeriodKey) -> EngineResult<Vec<RawActivityEntry>>;
}

/// In-process store for tests, the CLI and single-node hosts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    entries: BTreeMap<(ProjectId, PeriodKey), Vec<RawActivityEntry>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a period so it reads back as empty rather than unknown.
    pub fn open_period(&mut self, project: ProjectId, period: PeriodKey) {
        self.entries.entry((project, period)).or_default();
    }

    /// Accept one entry for a period. Waste entries are checked against the
    /// waste already recorded for that period; a rejected entry is not stored,
    /// though the period itself becomes known.
    pub fn append(
        &mut self,
        project: ProjectId,
        period: PeriodKey,
        entry: RawActivityEntry,
        ceiling_pct: f64,
    ) -> EngineResult<()> {
        let recorded_entries = self.entries.entry((project, period)).or_default();
        if let RawActivityEntry::Waste(input) = &entry {
            let candidate = normalize_waste(input);
            let recorded: Vec<WasteEntry> = recorded_entries
                .iter()
                .filter_map(|e| match e {
                    RawActivityEntry::Waste(w) => Some(normalize_waste(w)),
                    _ => None,
                })
                .collect();
            if let Err(err) = validate_waste_allocation_with(&recorded, &candidate, ceiling_pct) {
                info!(%project, %period, error = %err, "waste entry rejected");
                return Err(err);
            }
        }
        recorded_entries.push(entry);
        Ok(())
    }

    /// Periods known to the store, including empty ones.
    pub fn period_count(&self) -> usize {
        self.entries.len()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn fetch_entries(&self, project: ProjectId, period: PeriodKey) -> EngineResult<Vec<RawActivityEntry>> {
        self.entries
            .get(&(project, period))
            .cloned()
            .ok_or_else(|| EngineError::StoreRead {
                project,
                period,
                message: "period not known to the store".into(),
            })
    }
}
