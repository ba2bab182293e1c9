use thiserror::Error;

use crate::period::{PeriodKey, ProjectId};

/// Errors for accounting invariants and collaborator failures.
///
/// Malformed numeric input never surfaces here; the normalizer folds it
/// into `Reading::Absent`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(
        "waste allocation exceeded for '{waste_type}': {existing_pct}% already recorded, \
         adding {attempted_pct}% would pass the {limit_pct}% ceiling"
    )]
    AllocationExceeded {
        waste_type: String,
        existing_pct: f64,
        attempted_pct: f64,
        limit_pct: f64,
    },
    #[error("invalid waste entry: {0}")]
    InvalidWasteEntry(String),
    #[error("period {period} of project {project} already has a canonical aggregate")]
    DuplicatePeriod { project: ProjectId, period: PeriodKey },
    #[error("missing data: {0}")]
    MissingData(String),
    #[error("record store read failed for project {project}, period {period}: {message}")]
    StoreRead {
        project: ProjectId,
        period: PeriodKey,
        message: String,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid period key '{0}'")]
    PeriodKey(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
