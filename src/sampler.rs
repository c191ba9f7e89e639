//! Weighted oil-type draws.
//!
//! Every draw takes the caller's random source; nothing here owns a
//! generator. Seed a `rand_chacha::ChaCha20Rng` once per Monte Carlo run to
//! make the run reproducible.

use std::str::FromStr;

use rand::Rng;
use tracing::warn;

use crate::attribution::{OilAttribution, WeightTable};
use crate::error::TraceError;
use crate::taxonomy::OilType;

/// Largest distance of the weight sum from one that still counts as a
/// probability vector: `sqrt(f64::EPSILON)`.
pub const SUM_TOLERANCE: f64 = 1.490_116_119_384_765_6e-8;

/// Index drawn from a probability vector.
///
/// `None` when the vector is not a probability distribution: empty, any
/// negative or non-finite weight, or a sum further than [`SUM_TOLERANCE`]
/// from one. Zero-weight entries are never drawn.
pub fn categorical_index<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<usize> {
    if weights.is_empty() || weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > SUM_TOLERANCE {
        return None;
    }

    let mut cdf = Vec::with_capacity(weights.len());
    let mut running = 0.0;
    for w in weights {
        running += w;
        cdf.push(running);
    }
    let last = running;
    let roll = rng.r#gen::<f64>();
    cdf.iter()
        .position(|c| roll < c / last)
        .or_else(|| weights.iter().rposition(|w| *w > 0.0))
}

/// Draw one product key from `table`.
///
/// `Ok(None)` when every weight is zero: the facility and vessel pair has no
/// recorded transfers. A nonzero table that is not a probability vector is a
/// [`TraceError::DataIntegrity`] naming the table's origin.
pub fn sample_oil_type<R: Rng + ?Sized>(
    table: &WeightTable,
    rng: &mut R,
) -> Result<Option<String>, TraceError> {
    let weights = table.weights();
    let ctx = table.context();
    if weights.iter().sum::<f64>() == 0.0 {
        warn!(
            facility = ctx.facility_label(),
            vessel = %ctx.vessel,
            "no recorded transfers; oil type not attributed"
        );
        return Ok(None);
    }
    let idx = categorical_index(&weights, rng).ok_or_else(|| TraceError::DataIntegrity {
        facility: ctx.facility_label().to_string(),
        vessel: ctx.vessel.clone(),
        source_file: ctx.source.clone(),
    })?;
    Ok(table.entries().get(idx).map(|(key, _)| key.clone()))
}

/// [`sample_oil_type`], with the key resolved to its [`OilType`].
pub fn sample_oil_category<R: Rng + ?Sized>(
    table: &WeightTable,
    rng: &mut R,
) -> Result<Option<OilType>, TraceError> {
    sample_oil_type(table, rng)?
        .map(|key| {
            OilType::from_str(&key).map_err(|_| {
                TraceError::InvalidData(format!(
                    "Unknown oil key '{key}' in {}",
                    table.context().source.display()
                ))
            })
        })
        .transpose()
}

/// Draws against one attribution file.
#[derive(Debug, Clone, Copy)]
pub struct OilTypeSampler<'a> {
    attribution: &'a OilAttribution,
}

impl<'a> OilTypeSampler<'a> {
    pub fn new(attribution: &'a OilAttribution) -> Self {
        Self { attribution }
    }

    pub fn draw<R: Rng + ?Sized>(
        &self,
        facility: &str,
        vessel: &str,
        rng: &mut R,
    ) -> Result<Option<String>, TraceError> {
        let table = self.attribution.facility_weights(facility, vessel)?;
        sample_oil_type(&table, rng)
    }

    /// Facility-agnostic draw for files keyed by vessel only.
    pub fn draw_generic<R: Rng + ?Sized>(
        &self,
        vessel: &str,
        rng: &mut R,
    ) -> Result<Option<String>, TraceError> {
        let table = self.attribution.vessel_weights(vessel)?;
        sample_oil_type(&table, rng)
    }
}
