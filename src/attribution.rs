//! Oil attribution reference file: per facility and vessel class fractional
//! transfer weights, plus the list of US origin/destination names.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yml::Value;
use tracing::info;

use crate::error::TraceError;
use crate::precision;

const FRACTION_OF_TOTAL: &str = "fraction_of_total";
const CATEGORIES: &str = "categories";
const US_ORIGIN_DESTINATION: &str = "US_origin_destination";

/// Where a weight table came from, for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightContext {
    /// `None` for the facility-agnostic tables.
    pub facility: Option<String>,
    pub vessel: String,
    pub source: PathBuf,
}

impl WeightContext {
    pub fn new(facility: Option<&str>, vessel: &str, source: impl Into<PathBuf>) -> Self {
        Self {
            facility: facility.map(str::to_string),
            vessel: vessel.to_string(),
            source: source.into(),
        }
    }

    pub fn facility_label(&self) -> &str {
        self.facility.as_deref().unwrap_or("US")
    }
}

/// Product keys with their `fraction_of_total` weights, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    context: WeightContext,
    entries: Vec<(String, f64)>,
}

impl WeightTable {
    pub fn new(context: WeightContext, entries: Vec<(String, f64)>) -> Self {
        Self { context, entries }
    }

    /// Weights from tallied quantities, rounded so they sum to exactly one at
    /// `precision`. All-zero quantities give an all-zero table.
    pub fn from_quantities(
        context: WeightContext,
        quantities: &[(String, f64)],
        precision: u32,
    ) -> Result<Self, TraceError> {
        let raw: Vec<f64> = quantities.iter().map(|(_, q)| *q).collect();
        if raw.iter().any(|q| !q.is_finite() || *q < 0.0) {
            return Err(TraceError::InvalidData(format!(
                "Negative or non-finite quantity for {} at {}",
                context.vessel,
                context.facility_label()
            )));
        }
        let fractions =
            precision::fractions_of_total(&raw, precision).unwrap_or_else(|| vec![0.0; raw.len()]);
        let entries = quantities
            .iter()
            .zip(fractions)
            .map(|((key, _), f)| (key.clone(), f))
            .collect();
        Ok(Self { context, entries })
    }

    pub fn context(&self) -> &WeightContext {
        &self.context
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn weights(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, w)| *w).collect()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parsed attribution document. Mapping order is the file's order.
#[derive(Debug, Clone)]
pub struct OilAttribution {
    doc: Value,
    source: PathBuf,
}

impl OilAttribution {
    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let text = fs::read_to_string(path)?;
        let attribution = Self::from_yaml_str(&text, path)?;
        info!(path = %path.display(), "oil attribution loaded");
        Ok(attribution)
    }

    pub fn from_yaml_str(text: &str, source: impl Into<PathBuf>) -> Result<Self, TraceError> {
        let doc: Value = serde_yml::from_str(text)?;
        Ok(Self {
            doc,
            source: source.into(),
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// `categories.US_origin_destination`.
    pub fn us_origin_destination(&self) -> Result<Vec<String>, TraceError> {
        let list = self
            .doc
            .get(CATEGORIES)
            .and_then(|c| c.get(US_ORIGIN_DESTINATION))
            .and_then(Value::as_sequence)
            .ok_or_else(|| {
                TraceError::InvalidData(format!(
                    "{CATEGORIES}.{US_ORIGIN_DESTINATION} missing from {}",
                    self.source.display()
                ))
            })?;
        list.iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    TraceError::InvalidData(format!(
                        "Non-string entry in {US_ORIGIN_DESTINATION} of {}",
                        self.source.display()
                    ))
                })
            })
            .collect()
    }

    /// Weights keyed `facility → vessel → product → fraction_of_total`.
    pub fn facility_weights(&self, facility: &str, vessel: &str) -> Result<WeightTable, TraceError> {
        let ship = self
            .doc
            .get(facility)
            .and_then(|f| f.get(vessel))
            .ok_or_else(|| self.missing(Some(facility), vessel))?;
        self.read_weights(ship, WeightContext::new(Some(facility), vessel, &self.source))
    }

    /// Facility-agnostic layout: `vessel → product → fraction_of_total`.
    pub fn vessel_weights(&self, vessel: &str) -> Result<WeightTable, TraceError> {
        let ship = self.doc.get(vessel).ok_or_else(|| self.missing(None, vessel))?;
        self.read_weights(ship, WeightContext::new(None, vessel, &self.source))
    }

    fn missing(&self, facility: Option<&str>, vessel: &str) -> TraceError {
        TraceError::InvalidData(format!(
            "No weights for {vessel} at {} in {}",
            facility.unwrap_or("US"),
            self.source.display()
        ))
    }

    fn read_weights(&self, ship: &Value, context: WeightContext) -> Result<WeightTable, TraceError> {
        let products = ship.as_mapping().ok_or_else(|| {
            TraceError::InvalidData(format!(
                "Weights for {} at {} are not a mapping in {}",
                context.vessel,
                context.facility_label(),
                self.source.display()
            ))
        })?;
        let mut entries = Vec::with_capacity(products.len());
        for (key, attrs) in products {
            let key = key.as_str().ok_or_else(|| {
                TraceError::InvalidData(format!(
                    "Non-string product key under {} in {}",
                    context.vessel,
                    self.source.display()
                ))
            })?;
            let fraction = attrs
                .get(FRACTION_OF_TOTAL)
                .and_then(Value::as_f64)
                .ok_or_else(|| {
                    TraceError::InvalidData(format!(
                        "{key} under {} lacks a numeric {FRACTION_OF_TOTAL} in {}",
                        context.vessel,
                        self.source.display()
                    ))
                })?;
            entries.push((key.to_string(), fraction));
        }
        Ok(WeightTable::new(context, entries))
    }
}
