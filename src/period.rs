use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Project identity as resolved by the host system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    /// A fresh random id.
    pub fn new() -> Self {
        ProjectId(Uuid::new_v4())
    }
}

impl From<Uuid> for ProjectId {
    fn from(id: Uuid) -> Self {
        ProjectId(id)
    }
}

impl FromStr for ProjectId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(ProjectId)
            .map_err(|e| EngineError::MissingData(format!("project id '{s}': {e}")))
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Reporting period a raw entry belongs to.
///
/// Daily logs carry equipment and safety data; monthly logs carry
/// electricity, water and waste. Ordering is chronological, with a month
/// sorting before the days inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PeriodKey {
    Daily(NaiveDate),
    Monthly { year: i32, month: u32 },
}

impl PeriodKey {
    pub fn monthly(year: i32, month: u32) -> Result<Self, EngineError> {
        if !(1..=12).contains(&month) {
            return Err(EngineError::PeriodKey(format!("{year:04}-{month:02}")));
        }
        Ok(PeriodKey::Monthly { year, month })
    }

    pub fn daily(date: NaiveDate) -> Self {
        PeriodKey::Daily(date)
    }

    pub fn year(&self) -> i32 {
        match self {
            PeriodKey::Daily(d) => d.year(),
            PeriodKey::Monthly { year, .. } => *year,
        }
    }

    pub fn month(&self) -> u32 {
        match self {
            PeriodKey::Daily(d) => d.month(),
            PeriodKey::Monthly { month, .. } => *month,
        }
    }

    /// Months since year 0, used for window arithmetic.
    pub fn month_index(&self) -> i64 {
        i64::from(self.year()) * 12 + i64::from(self.month()) - 1
    }

    /// The calendar month this period falls in.
    pub fn containing_month(&self) -> PeriodKey {
        PeriodKey::Monthly {
            year: self.year(),
            month: self.month(),
        }
    }

    fn sort_key(&self) -> (i32, u32, u32) {
        match self {
            PeriodKey::Daily(d) => (d.year(), d.month(), d.day()),
            PeriodKey::Monthly { year, month } => (*year, *month, 0),
        }
    }
}

impl Ord for PeriodKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for PeriodKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Daily(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            PeriodKey::Monthly { year, month } => write!(f, "{year:04}-{month:02}"),
        }
    }
}

impl FromStr for PeriodKey {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(PeriodKey::Daily(date));
        }
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| EngineError::PeriodKey(s.to_string()))?;
        let year: i32 = year
            .parse()
            .map_err(|_| EngineError::PeriodKey(s.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| EngineError::PeriodKey(s.to_string()))?;
        PeriodKey::monthly(year, month)
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.to_string()
    }
}
