use std::collections::HashMap;
use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3_polars::PyDataFrame;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::aggregation::{
    self, facility_counts_to_frame, Direction, FacilityScope, TransferCategory, VesselType,
};
use crate::attribution::OilAttribution;
use crate::config::AnalysisConfig;
use crate::error::TraceError;
use crate::logging;
use crate::region::FacilityRegistry;
use crate::sampler::OilTypeSampler;
use crate::spills::{self, SpillTable};
use crate::transfers::{self, TransferTable};

/// Loaded reference tables for one analysis run, plus the seeded RNG that
/// every oil-type draw goes through.
#[pyclass]
pub struct OilAnalysis {
    config: AnalysisConfig,
    rng: ChaCha20Rng,
    facilities: Option<FacilityRegistry>,
    transfers: Option<TransferTable>,
    spills: Option<SpillTable>,
    attribution: Option<OilAttribution>,
    generic_attribution: Option<OilAttribution>,
}

#[pymethods]
impl OilAnalysis {
    #[new]
    fn new(config_path: String) -> PyResult<Self> {
        logging::try_init();
        let config = AnalysisConfig::from_yaml_file(&PathBuf::from(config_path))?;
        Ok(Self {
            rng: ChaCha20Rng::seed_from_u64(config.seed),
            config,
            facilities: None,
            transfers: None,
            spills: None,
            attribution: None,
            generic_attribution: None,
        })
    }

    /// Restart the sampler's random sequence.
    fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha20Rng::seed_from_u64(seed);
    }

    // ── Data loading ────────────────────────────────────────────────────────

    fn load_facilities(&mut self) -> PyResult<PyDataFrame> {
        let registry = FacilityRegistry::load(
            &self.config.facility_path(),
            Some(self.config.facility_sheet()),
        )?;
        let df = registry.to_frame()?;
        self.facilities = Some(registry);
        Ok(PyDataFrame(df))
    }

    /// Requires facilities, for region attribution.
    fn load_transfers(&mut self) -> PyResult<PyDataFrame> {
        let registry = self.registry()?;
        let table = TransferTable::load(
            &self.config.transfer_path(),
            Some(self.config.transfer_sheet()),
            registry,
            self.config.transfer_options(),
        )?;
        let df = table.to_frame()?;
        self.transfers = Some(table);
        Ok(PyDataFrame(df))
    }

    #[pyo3(signature = (filename=None))]
    fn load_spills(&mut self, filename: Option<&str>) -> PyResult<PyDataFrame> {
        let path = match filename {
            Some(f) => self.config.resolve(&PathBuf::from(f)),
            None => self
                .config
                .monte_carlo_path()
                .ok_or_else(|| TraceError::NotLoaded("monte_carlo path in config".into()))?,
        };
        let table = SpillTable::load(&path)?;
        let df = table.to_frame()?;
        self.spills = Some(table);
        Ok(PyDataFrame(df))
    }

    /// Returns the US origin/destination names.
    fn load_attribution(&mut self) -> PyResult<Vec<String>> {
        let attribution = OilAttribution::load(&self.config.attribution_path())?;
        let names = attribution.us_origin_destination()?;
        if let Some(path) = self.config.generic_us_attribution_path() {
            self.generic_attribution = Some(OilAttribution::load(&path)?);
        }
        self.attribution = Some(attribution);
        Ok(names)
    }

    // ── Sampling ────────────────────────────────────────────────────────────

    /// One oil-type draw, or None for a facility and vessel with no transfers.
    fn sample_oil_type(&mut self, facility: &str, vessel: &str) -> PyResult<Option<String>> {
        let attribution = self
            .attribution
            .as_ref()
            .ok_or_else(|| TraceError::NotLoaded("oil attribution".into()))?;
        Ok(OilTypeSampler::new(attribution).draw(facility, vessel, &mut self.rng)?)
    }

    fn sample_generic_oil_type(&mut self, vessel: &str) -> PyResult<Option<String>> {
        let attribution = self
            .generic_attribution
            .as_ref()
            .ok_or_else(|| TraceError::NotLoaded("generic US attribution".into()))?;
        Ok(OilTypeSampler::new(attribution).draw_generic(vessel, &mut self.rng)?)
    }

    // ── Transfers ───────────────────────────────────────────────────────────

    #[pyo3(signature = (transfer_type="cargo", facilities="selected", vessel=None, direction=None))]
    fn quantity_by_region(
        &self,
        transfer_type: &str,
        facilities: &str,
        vessel: Option<&str>,
        direction: Option<&str>,
    ) -> PyResult<PyDataFrame> {
        let category: TransferCategory = transfer_type.parse()?;
        let vessel = vessel.map(str::parse::<VesselType>).transpose()?;
        let direction = direction.map(str::parse::<Direction>).transpose()?;
        let table = self.transfer_table()?;
        let scope = FacilityScope::from_arg(facilities, self.registry()?, table.aliases())?;

        let tally = aggregation::quantity_by_region(table.records(), category, &scope);
        Ok(PyDataFrame(tally.to_filtered_frame(vessel, direction)?))
    }

    /// `(short_code, fraction_of_total)` pairs derived from the loaded
    /// transfers, rounded to the configured weight precision.
    fn transfer_weights(&self, facility: &str, vessel: &str) -> PyResult<Vec<(String, f64)>> {
        let vessel: VesselType = vessel.parse()?;
        let table = aggregation::transfer_weights(
            self.transfer_table()?.records(),
            facility,
            vessel,
            &self.config.transfer_path(),
            self.config.weight_precision,
        )?;
        Ok(table.entries().to_vec())
    }

    fn transfer_counts(&self) -> PyResult<PyDataFrame> {
        let table = self.transfer_table()?;
        let counts =
            aggregation::transfer_counts_by_facility(table.records(), self.registry()?, table.aliases());
        Ok(PyDataFrame(facility_counts_to_frame(&counts)?))
    }

    /// `(one_way, two_way)` cargo transfers of one vessel class.
    #[pyo3(signature = (vessel, facilities="selected"))]
    fn split_two_way(&self, vessel: &str, facilities: &str) -> PyResult<(PyDataFrame, PyDataFrame)> {
        let vessel: VesselType = vessel.parse()?;
        let table = self.transfer_table()?;
        let scope = FacilityScope::from_arg(facilities, self.registry()?, table.aliases())?;
        let query = aggregation::TransferQuery::new(vessel, TransferCategory::Cargo, scope);
        let selected = query.select(table.records(), Direction::Combined);
        let (one_way, two_way) = transfers::split_two_way(&selected);
        Ok((
            PyDataFrame(transfers::records_to_frame(&one_way)?),
            PyDataFrame(transfers::records_to_frame(&two_way)?),
        ))
    }

    // ── Spills ──────────────────────────────────────────────────────────────

    #[pyo3(signature = (vessel=None, direction=None))]
    fn capacity_by_region(&self, vessel: Option<&str>, direction: Option<&str>) -> PyResult<PyDataFrame> {
        let vessel = vessel.map(str::parse::<VesselType>).transpose()?;
        let direction = direction.map(str::parse::<Direction>).transpose()?;
        let us_names = self.us_names()?;
        let tally = self.spill_table()?.capacity_by_region(self.registry()?, &us_names);
        Ok(PyDataFrame(tally.to_filtered_frame(vessel, direction)?))
    }

    fn capacity_by_spill_region(&self, vessel: &str) -> PyResult<PyDataFrame> {
        let vessel: VesselType = vessel.parse()?;
        let us_names = self.us_names()?;
        let cells = self.spill_table()?.capacity_by_spill_region(vessel, &us_names);
        Ok(PyDataFrame(spills::spill_region_frame(vessel, &cells)?))
    }

    // ── Mass balance ────────────────────────────────────────────────────────

    /// Closure tables keyed by oil label.
    fn aggregate_mass_balance(&self, manifest: &str) -> PyResult<HashMap<String, PyDataFrame>> {
        let path = self.config.resolve(&PathBuf::from(manifest));
        let frames = self.config.mass_balance().aggregate_manifest(&path)?.to_frames()?;
        Ok(frames
            .into_iter()
            .map(|(oil, df)| (oil.label().to_string(), PyDataFrame(df)))
            .collect())
    }

    // ── Properties ──────────────────────────────────────────────────────────

    #[getter]
    fn facilities_df(&self) -> PyResult<Option<PyDataFrame>> {
        Ok(self
            .facilities
            .as_ref()
            .map(|r| r.to_frame())
            .transpose()?
            .map(PyDataFrame))
    }

    #[getter]
    fn transfers_df(&self) -> PyResult<Option<PyDataFrame>> {
        Ok(self
            .transfers
            .as_ref()
            .map(|t| t.to_frame())
            .transpose()?
            .map(PyDataFrame))
    }
}

// ── Private helpers ─────────────────────────────────────────────────────────

impl OilAnalysis {
    fn registry(&self) -> Result<&FacilityRegistry, TraceError> {
        self.facilities
            .as_ref()
            .ok_or_else(|| TraceError::NotLoaded("facilities".into()))
    }

    fn transfer_table(&self) -> Result<&TransferTable, TraceError> {
        self.transfers
            .as_ref()
            .ok_or_else(|| TraceError::NotLoaded("transfers".into()))
    }

    fn spill_table(&self) -> Result<&SpillTable, TraceError> {
        self.spills
            .as_ref()
            .ok_or_else(|| TraceError::NotLoaded("monte carlo spills".into()))
    }

    fn us_names(&self) -> Result<FacilityScope, TraceError> {
        let attribution = self
            .attribution
            .as_ref()
            .ok_or_else(|| TraceError::NotLoaded("oil attribution".into()))?;
        Ok(FacilityScope::selected(attribution.us_origin_destination()?))
    }
}
