use serde::{Deserialize, Serialize};

use crate::waste::WasteEntry;

/// A numeric field exactly as it arrived from an entry form: a JSON number,
/// a string the user typed, or nothing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
    #[default]
    Blank,
}

impl NumericInput {
    pub fn text(s: impl Into<String>) -> Self {
        NumericInput::Text(s.into())
    }

    pub fn reading(&self) -> Reading {
        match self {
            NumericInput::Number(v) => Reading::from_value(*v),
            NumericInput::Text(s) => parse_reading(s),
            NumericInput::Blank => Reading::Absent,
        }
    }

    pub fn value_or_zero(&self) -> f64 {
        self.reading().value_or_zero()
    }
}

impl From<f64> for NumericInput {
    fn from(v: f64) -> Self {
        NumericInput::Number(v)
    }
}

impl From<&str> for NumericInput {
    fn from(s: &str) -> Self {
        NumericInput::Text(s.to_string())
    }
}

/// Result of reading one numeric field.
///
/// `Absent` covers blank, unparsable, non-finite and negative input. Callers
/// rendering data completeness can tell it apart from `Measured(0.0)`; sums
/// fold both to 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Reading {
    Absent,
    Measured(f64),
}

impl Reading {
    pub fn from_value(v: f64) -> Self {
        if v.is_finite() && v >= 0.0 {
            Reading::Measured(v)
        } else {
            Reading::Absent
        }
    }

    pub fn value_or_zero(self) -> f64 {
        match self {
            Reading::Measured(v) => v,
            Reading::Absent => 0.0,
        }
    }

    pub fn is_measured(self) -> bool {
        matches!(self, Reading::Measured(_))
    }

    pub fn measured(self) -> Option<f64> {
        match self {
            Reading::Measured(v) => Some(v),
            Reading::Absent => None,
        }
    }
}

/// Read a typed-in number. Anything that is not a finite, non-negative
/// number reads as `Absent`.
pub fn parse_reading(raw: &str) -> Reading {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Reading::Absent;
    }
    match trimmed.parse::<f64>() {
        Ok(v) => Reading::from_value(v),
        Err(_) => Reading::Absent,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MassUnit {
    #[default]
    Kg,
    #[serde(alias = "tonne", alias = "t")]
    Ton,
}

/// Convert a logged waste mass to kg.
pub fn mass_to_kg(mass: f64, unit: MassUnit) -> f64 {
    match unit {
        MassUnit::Ton => mass * 1000.0,
        MassUnit::Kg => mass,
    }
}

/// One line of a legacy equipment breakdown object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentLine {
    pub name: String,
    pub fuel_liters: NumericInput,
    pub emissions_kg: NumericInput,
}

/// Persisted shapes of equipment emissions.
///
/// Older records stored a pre-computed kg value or a per-machine breakdown;
/// newer ones store hours and a fuel rate. All of them converge on the same
/// Scope 1 figure: the fuel factor only applies where no pre-computed value
/// exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum EquipmentEmissions {
    Usage {
        #[serde(default)]
        hours: NumericInput,
        #[serde(default)]
        fuel_rate_l_per_hour: NumericInput,
    },
    Precomputed {
        #[serde(default)]
        emissions_kg: NumericInput,
    },
    Breakdown {
        #[serde(default)]
        items: Vec<EquipmentLine>,
        #[serde(default)]
        total_emissions_kg: NumericInput,
    },
    FuelOnly {
        #[serde(default)]
        fuel_liters: NumericInput,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleTrip {
    pub vehicle: String,
    /// Route distance supplied by the geocoding collaborator.
    pub distance_km: NumericInput,
    pub fuel_rate_l_per_km: NumericInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteInput {
    pub waste_type: String,
    pub treatment_method: String,
    #[serde(default)]
    pub mass: NumericInput,
    #[serde(default)]
    pub unit: MassUnit,
    #[serde(default)]
    pub treatment_pct: NumericInput,
}

/// A single logged measurement for one project and one reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawActivityEntry {
    Equipment(EquipmentEmissions),
    Vehicle {
        #[serde(default)]
        trips: Vec<VehicleTrip>,
    },
    Electricity {
        #[serde(default)]
        kwh: NumericInput,
    },
    ElectricalSubsystem {
        #[serde(default)]
        kwh: NumericInput,
    },
    Water {
        #[serde(default)]
        m3: NumericInput,
    },
    Waste(WasteInput),
    Safety {
        #[serde(default)]
        incidents: NumericInput,
        #[serde(default)]
        exposure_hours: NumericInput,
    },
    Labor {
        #[serde(default)]
        hours: NumericInput,
    },
}

/// Equipment activity in canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EquipmentQuantity {
    /// All fuel attributed to the entry, for resource totals.
    pub fuel_liters: f64,
    /// Emissions already computed by an older writer.
    pub precomputed_kg: f64,
    /// Fuel whose emissions still need the fuel factor.
    pub unfactored_fuel_liters: f64,
}

impl EquipmentQuantity {
    pub fn emissions_kg(&self, fuel_kg_per_liter: f64) -> f64 {
        self.precomputed_kg + self.unfactored_fuel_liters * fuel_kg_per_liter
    }
}

/// A raw entry after unit and shape normalization, before factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalQuantity {
    EquipmentFuel(EquipmentQuantity),
    LogisticsFuel { fuel_liters: f64 },
    GridElectricity { kwh: f64 },
    ElectricalSubsystem { kwh: f64 },
    Water { m3: f64 },
    Waste(WasteEntry),
    Safety { incidents: u32, exposure_hours: f64 },
    Labor { hours: f64 },
}

/// Map a raw entry onto its canonical quantity. Never fails: unreadable
/// numbers contribute 0.
pub fn normalize(entry: &RawActivityEntry) -> CanonicalQuantity {
    match entry {
        RawActivityEntry::Equipment(shape) => CanonicalQuantity::EquipmentFuel(normalize_equipment(shape)),
        RawActivityEntry::Vehicle { trips } => CanonicalQuantity::LogisticsFuel {
            fuel_liters: logistics_fuel_liters(trips),
        },
        RawActivityEntry::Electricity { kwh } => CanonicalQuantity::GridElectricity {
            kwh: kwh.value_or_zero(),
        },
        RawActivityEntry::ElectricalSubsystem { kwh } => CanonicalQuantity::ElectricalSubsystem {
            kwh: kwh.value_or_zero(),
        },
        RawActivityEntry::Water { m3 } => CanonicalQuantity::Water {
            m3: m3.value_or_zero(),
        },
        RawActivityEntry::Waste(input) => CanonicalQuantity::Waste(normalize_waste(input)),
        RawActivityEntry::Safety {
            incidents,
            exposure_hours,
        } => CanonicalQuantity::Safety {
            incidents: incidents.value_or_zero().round() as u32,
            exposure_hours: exposure_hours.value_or_zero(),
        },
        RawActivityEntry::Labor { hours } => CanonicalQuantity::Labor {
            hours: hours.value_or_zero(),
        },
    }
}

pub fn normalize_equipment(shape: &EquipmentEmissions) -> EquipmentQuantity {
    match shape {
        EquipmentEmissions::Usage {
            hours,
            fuel_rate_l_per_hour,
        } => {
            let fuel = hours.value_or_zero() * fuel_rate_l_per_hour.value_or_zero();
            EquipmentQuantity {
                fuel_liters: fuel,
                precomputed_kg: 0.0,
                unfactored_fuel_liters: fuel,
            }
        }
        EquipmentEmissions::Precomputed { emissions_kg } => EquipmentQuantity {
            fuel_liters: 0.0,
            precomputed_kg: emissions_kg.value_or_zero(),
            unfactored_fuel_liters: 0.0,
        },
        EquipmentEmissions::FuelOnly { fuel_liters } => {
            let fuel = fuel_liters.value_or_zero();
            EquipmentQuantity {
                fuel_liters: fuel,
                precomputed_kg: 0.0,
                unfactored_fuel_liters: fuel,
            }
        }
        EquipmentEmissions::Breakdown {
            items,
            total_emissions_kg,
        } => {
            let fuel: f64 = items.iter().map(|i| i.fuel_liters.value_or_zero()).sum();
            if let Reading::Measured(total) = total_emissions_kg.reading() {
                return EquipmentQuantity {
                    fuel_liters: fuel,
                    precomputed_kg: total,
                    unfactored_fuel_liters: 0.0,
                };
            }
            let mut q = EquipmentQuantity {
                fuel_liters: fuel,
                ..EquipmentQuantity::default()
            };
            for item in items {
                match item.emissions_kg.reading() {
                    Reading::Measured(kg) => q.precomputed_kg += kg,
                    Reading::Absent => q.unfactored_fuel_liters += item.fuel_liters.value_or_zero(),
                }
            }
            q
        }
    }
}

/// Total fuel across all vehicle trips in a submission.
pub fn logistics_fuel_liters(trips: &[VehicleTrip]) -> f64 {
    trips
        .iter()
        .map(|t| t.distance_km.value_or_zero() * t.fuel_rate_l_per_km.value_or_zero())
        .sum()
}

pub fn normalize_waste(input: &WasteInput) -> WasteEntry {
    WasteEntry::new(
        &input.waste_type,
        &input.treatment_method,
        mass_to_kg(input.mass.value_or_zero(), input.unit),
        input.treatment_pct.value_or_zero(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_and_garbage_read_as_absent() {
        assert_eq!(parse_reading(""), Reading::Absent);
        assert_eq!(parse_reading("   "), Reading::Absent);
        assert_eq!(parse_reading("abc"), Reading::Absent);
        assert_eq!(parse_reading("NaN"), Reading::Absent);
        assert_eq!(parse_reading("inf"), Reading::Absent);
        assert_eq!(parse_reading("-4"), Reading::Absent);
        assert_eq!(parse_reading(" 12.5 "), Reading::Measured(12.5));
        assert_eq!(parse_reading("0"), Reading::Measured(0.0));
    }

    #[test]
    fn absent_and_zero_are_distinct_but_sum_alike() {
        let absent = NumericInput::Blank.reading();
        let zero = NumericInput::from(0.0).reading();
        assert_ne!(absent, zero);
        assert!(!absent.is_measured());
        assert!(zero.is_measured());
        assert_eq!(absent.value_or_zero(), zero.value_or_zero());
    }

    #[test]
    fn equipment_usage_multiplies_hours_by_rate() {
        let q = normalize_equipment(&EquipmentEmissions::Usage {
            hours: 8.0.into(),
            fuel_rate_l_per_hour: "5".into(),
        });
        assert_eq!(q.fuel_liters, 40.0);
        assert_eq!(q.unfactored_fuel_liters, 40.0);
        assert_eq!(q.precomputed_kg, 0.0);
    }

    #[test]
    fn negative_equipment_input_zeroes() {
        let q = normalize_equipment(&EquipmentEmissions::Usage {
            hours: (-8.0).into(),
            fuel_rate_l_per_hour: 5.0.into(),
        });
        assert_eq!(q.fuel_liters, 0.0);
    }

    #[test]
    fn breakdown_uses_item_emissions_where_present() {
        let q = normalize_equipment(&EquipmentEmissions::Breakdown {
            items: vec![
                EquipmentLine {
                    name: "excavator".into(),
                    fuel_liters: 30.0.into(),
                    emissions_kg: 80.4.into(),
                },
                EquipmentLine {
                    name: "generator".into(),
                    fuel_liters: 10.0.into(),
                    emissions_kg: NumericInput::Blank,
                },
            ],
            total_emissions_kg: NumericInput::Blank,
        });
        assert_eq!(q.fuel_liters, 40.0);
        assert_eq!(q.precomputed_kg, 80.4);
        assert_eq!(q.unfactored_fuel_liters, 10.0);
    }

    #[test]
    fn vehicle_fuel_sums_trips() {
        let trips = vec![
            VehicleTrip {
                vehicle: "truck".into(),
                distance_km: 120.0.into(),
                fuel_rate_l_per_km: 0.3.into(),
            },
            VehicleTrip {
                vehicle: "van".into(),
                distance_km: "".into(),
                fuel_rate_l_per_km: 0.1.into(),
            },
            VehicleTrip {
                vehicle: "pickup".into(),
                distance_km: 50.0.into(),
                fuel_rate_l_per_km: 0.1.into(),
            },
        ];
        assert!((logistics_fuel_liters(&trips) - 41.0).abs() < 1e-9);
    }

    #[test]
    fn ton_mass_converts_to_kg() {
        assert_eq!(mass_to_kg(1.0, MassUnit::Ton), 1000.0);
        assert_eq!(mass_to_kg(250.0, MassUnit::Kg), 250.0);
    }

    #[test]
    fn raw_entries_deserialize_from_form_payloads() {
        let entries: Vec<RawActivityEntry> = serde_json::from_value(json!([
            { "kind": "equipment", "shape": "usage", "hours": "8", "fuel_rate_l_per_hour": 5 },
            { "kind": "equipment", "shape": "precomputed", "emissions_kg": 107.2 },
            { "kind": "electricity", "kwh": "" },
            { "kind": "waste", "waste_type": "Timber", "treatment_method": "Landfill",
              "mass": "1", "unit": "ton", "treatment_pct": 50 },
            { "kind": "safety", "incidents": 1, "exposure_hours": null }
        ]))
        .unwrap();

        assert_eq!(entries.len(), 5);
        match normalize(&entries[2]) {
            CanonicalQuantity::GridElectricity { kwh } => assert_eq!(kwh, 0.0),
            other => panic!("unexpected {other:?}"),
        }
        match normalize(&entries[3]) {
            CanonicalQuantity::Waste(w) => {
                assert_eq!(w.waste_type, "timber");
                assert_eq!(w.mass_kg, 1000.0);
                assert_eq!(w.treatment_pct, 50.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        match normalize(&entries[4]) {
            CanonicalQuantity::Safety {
                incidents,
                exposure_hours,
            } => {
                assert_eq!(incidents, 1);
                assert_eq!(exposure_hours, 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
