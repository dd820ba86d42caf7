//! Everyday-activity equivalents of an emissions figure.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::fmt;
use std::io::Read;
use std::path::Path;

const TRAVEL_DATA: &str = include_str!("../data/travel.csv");
const FOOD_DATA: &str = include_str!("../data/food.csv");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonKind {
    Travel,
    Food,
}

impl fmt::Display for ComparisonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonKind::Travel => write!(f, "Travel"),
            ComparisonKind::Food => write!(f, "Food"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TravelRow {
    #[serde(rename = "Method")]
    method: String,
    #[serde(rename = "gCO2ePerKm")]
    grams_per_km: f64,
    #[serde(rename = "Note", default)]
    note: String,
}

#[derive(Debug, Deserialize)]
struct FoodRow {
    #[serde(rename = "Food")]
    food: String,
    #[serde(rename = "gCO2ePerKilo")]
    grams_per_kilo: f64,
    #[serde(rename = "PortionPerKilo")]
    portions_per_kilo: f64,
    #[serde(rename = "PluralPortionName", default)]
    portion_name: String,
}

/// Emissions of one unit of an activity, e.g. one km by bus.
#[derive(Debug, Clone, PartialEq)]
struct Factor {
    label: String,
    grams_per_unit: f64,
    unit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Equivalent {
    pub label: String,
    pub amount: f64,
    pub unit: String,
}

#[derive(Debug, Clone)]
pub struct ComparisonTable {
    kind: ComparisonKind,
    factors: Vec<Factor>,
}

impl ComparisonTable {
    /// Loads the table at `path`, or the built-in reference data.
    pub fn load(kind: ComparisonKind, path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let file = std::fs::File::open(path)
                    .with_context(|| format!("Missing comparisons data file at {}", path.display()))?;
                Self::from_reader(kind, file)
            }
            None => {
                let data = match kind {
                    ComparisonKind::Travel => TRAVEL_DATA,
                    ComparisonKind::Food => FOOD_DATA,
                };
                Self::from_reader(kind, data.as_bytes())
            }
        }
    }

    /// Reads a CSV table, skipping rows that do not fit the schema of `kind`.
    pub fn from_reader<R: Read>(kind: ComparisonKind, reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut factors = Vec::new();

        match kind {
            ComparisonKind::Travel => {
                for row in reader.deserialize::<TravelRow>() {
                    match row {
                        Ok(row) => factors.push(Factor {
                            label: row.method,
                            grams_per_unit: row.grams_per_km,
                            unit: format!("km {}", row.note).trim_end().to_string(),
                        }),
                        Err(e) => debug!("Skipping travel comparison row: {e}"),
                    }
                }
            }
            ComparisonKind::Food => {
                for row in reader.deserialize::<FoodRow>() {
                    match row {
                        Ok(row) if row.portions_per_kilo > 0.0 => factors.push(Factor {
                            label: row.food,
                            grams_per_unit: row.grams_per_kilo / row.portions_per_kilo,
                            unit: row.portion_name,
                        }),
                        Ok(row) => debug!("Skipping food comparison row without portions: {}", row.food),
                        Err(e) => debug!("Skipping food comparison row: {e}"),
                    }
                }
            }
        }

        factors.retain(|factor| factor.grams_per_unit > 0.0);
        Ok(Self { kind, factors })
    }

    pub fn kind(&self) -> ComparisonKind {
        self.kind
    }

    /// Amount of each activity that emits `emissions_gco2`.
    pub fn equivalents(&self, emissions_gco2: f64) -> Vec<Equivalent> {
        self.factors
            .iter()
            .map(|factor| Equivalent {
                label: factor.label.clone(),
                amount: emissions_gco2 / factor.grams_per_unit,
                unit: factor.unit.clone(),
            })
            .collect()
    }

    pub fn describe(&self, equivalent: &Equivalent) -> String {
        match self.kind {
            ComparisonKind::Travel => format!(
                "{} {:.1} {}",
                equivalent.label, equivalent.amount, equivalent.unit
            ),
            ComparisonKind::Food if equivalent.unit.is_empty() => {
                format!("{:.1} {}", equivalent.amount, equivalent.label)
            }
            ComparisonKind::Food => format!(
                "{:.1} {} of {}",
                equivalent.amount, equivalent.unit, equivalent.label
            ),
        }
    }
}
