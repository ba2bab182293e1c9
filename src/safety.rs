use serde::{Deserialize, Serialize};

/// Exposure hours TRIR is normalized to (about 100 full-time workers for a year).
pub const TRIR_EXPOSURE_BASE_HOURS: f64 = 200_000.0;

/// Total Recordable Incident Rate. `None` when no exposure hours were
/// logged: zero hours says nothing about risk, so it is not reported as 0.
pub fn compute_trir(incident_count: u32, total_employee_hours: f64) -> Option<f64> {
    compute_trir_with_base(incident_count, total_employee_hours, TRIR_EXPOSURE_BASE_HOURS)
}

pub fn compute_trir_with_base(incident_count: u32, total_employee_hours: f64, base_hours: f64) -> Option<f64> {
    if !total_employee_hours.is_finite() || total_employee_hours <= 0.0 {
        return None;
    }
    Some(f64::from(incident_count) * base_hours / total_employee_hours)
}

/// Incident exposure over one or more periods.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SafetySummary {
    pub incidents: u32,
    pub exposure_hours: f64,
    pub trir: Option<f64>,
}

impl SafetySummary {
    pub fn new(incidents: u32, exposure_hours: f64, base_hours: f64) -> Self {
        SafetySummary {
            incidents,
            exposure_hours,
            trir: compute_trir_with_base(incidents, exposure_hours, base_hours),
        }
    }

    /// Combine two summaries; the rate is recomputed from the pooled counts,
    /// never averaged.
    pub fn merge(&self, other: &SafetySummary, base_hours: f64) -> Self {
        SafetySummary::new(
            self.incidents.saturating_add(other.incidents),
            self.exposure_hours + other.exposure_hours,
            base_hours,
        )
    }
}
