//! Monte Carlo spill table and its capacity queries.

use std::collections::BTreeMap;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info};

use crate::aggregation::{Direction, FacilityScope, Flow, Tally, VesselType};
use crate::error::TraceError;
use crate::loader::{self, cell, str_column};
use crate::region::{region_of, FacilityRegistry, Region, RegionLabel};
use crate::schema::{output, spill};
use crate::taxonomy::OilType;

const CARGO: &str = "cargo";

/// One simulated release event.
#[derive(Debug, Clone, PartialEq)]
pub struct SpillRecord {
    pub vessel_type: String,
    pub fuel_cargo: String,
    pub vessel_origin: String,
    pub vessel_dest: String,
    pub cargo_capacity: f64,
    pub spill_lat: f64,
    pub oil_type: OilType,
    pub spill_region: Region,
}

impl SpillRecord {
    fn is_cargo_of(&self, vessel: VesselType) -> bool {
        self.fuel_cargo == CARGO && self.vessel_type == vessel.as_str()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpillTable {
    records: Vec<SpillRecord>,
}

impl SpillTable {
    pub fn from_records(records: Vec<SpillRecord>) -> Self {
        Self { records }
    }

    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let df = loader::read_table(path, None)?;
        let table = Self::from_frame(&df)?;
        info!(path = %path.display(), spills = table.len(), "monte carlo spills loaded");
        Ok(table)
    }

    /// Decode the Monte Carlo frame. The oil type comes from the Lagrangian
    /// template, the spill region from the spill latitude.
    pub fn from_frame(df: &DataFrame) -> Result<Self, TraceError> {
        loader::require_columns(df, &spill::REQUIRED)?;

        let templates = str_column(df, spill::LAGRANGIAN_TEMPLATE)?;
        let vessel_types = str_column(df, spill::VESSEL_TYPE)?;
        let fuel_cargo = str_column(df, spill::FUEL_CARGO)?;
        let origins = str_column(df, spill::VESSEL_ORIGIN)?;
        let dests = str_column(df, spill::VESSEL_DEST)?;
        let capacities = str_column(df, spill::CARGO_CAPACITY)?;
        let lats = str_column(df, spill::SPILL_LAT)?;

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let template = cell(templates, i).unwrap_or_default();
            let oil_type = OilType::from_lagrangian_template(template).ok_or_else(|| {
                TraceError::InvalidData(format!(
                    "Unknown {} '{template}' at row {i}",
                    spill::LAGRANGIAN_TEMPLATE
                ))
            })?;
            let cargo_capacity = match cell(capacities, i) {
                Some(raw) => loader::parse_f64(Some(raw), spill::CARGO_CAPACITY, i)?,
                None => 0.0,
            };
            let spill_lat = match cell(lats, i) {
                Some(raw) => loader::parse_f64(Some(raw), spill::SPILL_LAT, i)?,
                None => f64::NAN,
            };
            records.push(SpillRecord {
                vessel_type: cell(vessel_types, i).unwrap_or_default().to_string(),
                fuel_cargo: cell(fuel_cargo, i).unwrap_or_default().to_string(),
                vessel_origin: cell(origins, i).unwrap_or_default().to_string(),
                vessel_dest: cell(dests, i).unwrap_or_default().to_string(),
                cargo_capacity,
                spill_lat,
                oil_type,
                spill_region: region_of(spill_lat),
            });
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[SpillRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cargo capacity per oil type. Imports are spills bound for a facility
    /// in `us_names`, exports those leaving one; combined adds the two.
    pub fn capacity_by_oil(
        &self,
        vessel: VesselType,
        us_names: &FacilityScope,
    ) -> BTreeMap<Direction, BTreeMap<OilType, f64>> {
        let mut import = zeroed();
        let mut export = zeroed();
        for r in self.records.iter().filter(|r| r.is_cargo_of(vessel)) {
            if us_names.contains(&r.vessel_dest) {
                *import.entry(r.oil_type).or_insert(0.0) += r.cargo_capacity;
            }
            if us_names.contains(&r.vessel_origin) {
                *export.entry(r.oil_type).or_insert(0.0) += r.cargo_capacity;
            }
        }
        let combined: BTreeMap<OilType, f64> = OilType::ALL
            .iter()
            .map(|o| (*o, import[o] + export[o]))
            .collect();

        BTreeMap::from([
            (Direction::Import, import),
            (Direction::Export, export),
            (Direction::Combined, combined),
        ])
    }

    /// Cargo capacity per oil type over spills whose origin or destination
    /// is in `names`. Each spill counts once.
    pub fn attributed_capacity_by_oil(
        &self,
        vessel: VesselType,
        names: &FacilityScope,
    ) -> BTreeMap<OilType, f64> {
        let mut totals = zeroed();
        let mut rows = 0usize;
        for r in self.attributed(vessel, names) {
            *totals.entry(r.oil_type).or_insert(0.0) += r.cargo_capacity;
            rows += 1;
        }
        debug!(vessel = %vessel, rows, "attributed spills");
        totals
    }

    /// Cargo capacity per (vessel, direction, oil, facility region). Imports
    /// take the destination facility's region, exports the origin's;
    /// facilities missing from the registry are not attributed.
    pub fn capacity_by_region(&self, registry: &FacilityRegistry, us_names: &FacilityScope) -> Tally {
        let mut tally = Tally::new(RegionLabel::Facility);
        for vessel in VesselType::ALL {
            for r in self.records.iter().filter(|r| r.is_cargo_of(vessel)) {
                if us_names.contains(&r.vessel_dest) {
                    let region = registry.region_of(&r.vessel_dest);
                    tally.add(vessel, Flow::Import, r.oil_type, region, r.cargo_capacity);
                }
                if us_names.contains(&r.vessel_origin) {
                    let region = registry.region_of(&r.vessel_origin);
                    tally.add(vessel, Flow::Export, r.oil_type, region, r.cargo_capacity);
                }
            }
        }
        tally
    }

    /// Cargo capacity per (oil, spill region) over origin-or-destination
    /// spills, every cell present.
    pub fn capacity_by_spill_region(
        &self,
        vessel: VesselType,
        us_names: &FacilityScope,
    ) -> BTreeMap<(OilType, Region), f64> {
        let mut cells: BTreeMap<(OilType, Region), f64> = OilType::ALL
            .iter()
            .flat_map(|o| {
                Region::ATTRIBUTED
                    .into_iter()
                    .chain([Region::NotAttributed])
                    .map(move |r| ((*o, r), 0.0))
            })
            .collect();
        for r in self.attributed(vessel, us_names) {
            *cells.entry((r.oil_type, r.spill_region)).or_insert(0.0) += r.cargo_capacity;
        }
        cells
    }

    /// Spills with the resolved oil label and spill region.
    pub fn to_frame(&self) -> Result<DataFrame, TraceError> {
        let r = &self.records;
        let oils: Vec<&str> = r.iter().map(|s| s.oil_type.label()).collect();
        let vessels: Vec<&str> = r.iter().map(|s| s.vessel_type.as_str()).collect();
        let fuel_cargo: Vec<&str> = r.iter().map(|s| s.fuel_cargo.as_str()).collect();
        let origins: Vec<&str> = r.iter().map(|s| s.vessel_origin.as_str()).collect();
        let dests: Vec<&str> = r.iter().map(|s| s.vessel_dest.as_str()).collect();
        let capacities: Vec<f64> = r.iter().map(|s| s.cargo_capacity).collect();
        let lats: Vec<f64> = r.iter().map(|s| s.spill_lat).collect();
        let regions: Vec<&str> = r
            .iter()
            .map(|s| s.spill_region.label(RegionLabel::Spill))
            .collect();
        Ok(DataFrame::new(vec![
            Column::new(spill::OIL_TYPE.into(), &oils),
            Column::new(spill::VESSEL_TYPE.into(), &vessels),
            Column::new(spill::FUEL_CARGO.into(), &fuel_cargo),
            Column::new(spill::VESSEL_ORIGIN.into(), &origins),
            Column::new(spill::VESSEL_DEST.into(), &dests),
            Column::new(spill::CARGO_CAPACITY.into(), &capacities),
            Column::new(spill::SPILL_LAT.into(), &lats),
            Column::new(spill::SPILL_REGION.into(), &regions),
        ])?)
    }

    fn attributed<'a>(
        &'a self,
        vessel: VesselType,
        names: &'a FacilityScope,
    ) -> impl Iterator<Item = &'a SpillRecord> + 'a {
        self.records.iter().filter(move |r| {
            r.is_cargo_of(vessel) && (names.contains(&r.vessel_dest) || names.contains(&r.vessel_origin))
        })
    }
}

fn zeroed() -> BTreeMap<OilType, f64> {
    OilType::ALL.iter().map(|o| (*o, 0.0)).collect()
}

/// Frame for [`SpillTable::capacity_by_spill_region`], spill label form.
pub fn spill_region_frame(
    vessel: VesselType,
    cells: &BTreeMap<(OilType, Region), f64>,
) -> Result<DataFrame, TraceError> {
    let vessels: Vec<&str> = cells.keys().map(|_| vessel.as_str()).collect();
    let oils: Vec<&str> = cells.keys().map(|(o, _)| o.label()).collect();
    let regions: Vec<&str> = cells.keys().map(|(_, r)| r.label(RegionLabel::Spill)).collect();
    let quantities: Vec<f64> = cells.values().copied().collect();
    Ok(DataFrame::new(vec![
        Column::new(output::VESSEL_TYPE.into(), &vessels),
        Column::new(output::OIL_TYPE.into(), &oils),
        Column::new(output::REGION.into(), &regions),
        Column::new(output::QUANTITY.into(), &quantities),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Facility;

    fn frame_with_templates(templates: [&str; 5]) -> DataFrame {
        df! {
            "Lagrangian_template" => templates,
            "vessel_type" => ["tanker", "tanker", "atb", "tanker", "tanker"],
            "fuel_cargo" => ["cargo", "cargo", "cargo", "fuel", "cargo"],
            "vessel_origin" => ["Valdez, AK", "BP Cherry Point Refinery", "US", "US", "Tesoro Vancouver Terminal"],
            "vessel_dest" => ["BP Cherry Point Refinery", "Tesoro Vancouver Terminal", "Pacific", "US", "Mystery Dock"],
            "cargo_capacity" => ["1000", "500", "30", "", "20"],
            "spill_lat" => ["48.8", "47.5", "48.4", "48.0", ""],
        }
        .unwrap()
    }

    fn frame() -> DataFrame {
        frame_with_templates([
            "Lagrangian_akns.dat",
            "Lagrangian_akns.dat",
            "Lagrangian_diesel.dat",
            "Lagrangian_bunker.dat",
            "Lagrangian_jet.dat",
        ])
    }

    fn us_names() -> FacilityScope {
        FacilityScope::selected([
            "BP Cherry Point Refinery",
            "Tesoro Vancouver Terminal",
            "Mystery Dock",
        ])
    }

    #[test]
    fn decodes_templates_and_regions() {
        let table = SpillTable::from_frame(&frame()).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table.records()[0].oil_type, OilType::Ans);
        assert_eq!(table.records()[0].spill_region, Region::Whatcom);
        assert_eq!(table.records()[3].cargo_capacity, 0.0);
        assert_eq!(table.records()[4].spill_region, Region::NotAttributed);

        let df = table.to_frame().unwrap();
        assert_eq!(df.height(), 5);
        assert_eq!(df.column("oil_type").unwrap().str().unwrap().get(0), Some("ANS"));
        assert_eq!(df.column("SpillRegion").unwrap().str().unwrap().get(0), Some("Whatcom"));
    }

    #[test]
    fn unknown_template_is_invalid_data() {
        let df = frame_with_templates([
            "Lagrangian_akns.dat",
            "x.dat",
            "Lagrangian_akns.dat",
            "Lagrangian_akns.dat",
            "Lagrangian_akns.dat",
        ]);
        assert!(matches!(SpillTable::from_frame(&df), Err(TraceError::InvalidData(_))));
    }

    #[test]
    fn combined_adds_import_and_export() {
        let table = SpillTable::from_frame(&frame()).unwrap();
        let by_oil = table.capacity_by_oil(VesselType::Tanker, &us_names());
        assert_eq!(by_oil[&Direction::Import][&OilType::Ans], 1500.0);
        assert_eq!(by_oil[&Direction::Export][&OilType::Ans], 500.0);
        assert_eq!(by_oil[&Direction::Combined][&OilType::Ans], 2000.0);
        assert_eq!(by_oil[&Direction::Combined][&OilType::JetFuel], 40.0);

        // union counts the facility-to-facility spill once
        let union = table.attributed_capacity_by_oil(VesselType::Tanker, &us_names());
        assert_eq!(union[&OilType::Ans], 1500.0);
    }

    #[test]
    fn facility_regions_and_spill_regions() {
        let registry = FacilityRegistry::new(vec![
            Facility::new("BP Cherry Point Refinery", None, 48.86),
            Facility::new("Tesoro Vancouver Terminal", None, 45.63),
        ]);
        let table = SpillTable::from_frame(&frame()).unwrap();
        let tally = table.capacity_by_region(&registry, &us_names());
        let t = VesselType::Tanker;
        assert_eq!(tally.get(t, Direction::Import, OilType::Ans, Region::Whatcom), 1000.0);
        assert_eq!(tally.get(t, Direction::Import, OilType::Ans, Region::ColumbiaRiver), 500.0);
        assert_eq!(tally.get(t, Direction::Export, OilType::Ans, Region::Whatcom), 500.0);
        assert_eq!(tally.get(t, Direction::Combined, OilType::Ans, Region::Whatcom), 1500.0);
        assert_eq!(
            tally.get(t, Direction::Import, OilType::JetFuel, Region::NotAttributed),
            20.0
        );

        let cells = table.capacity_by_spill_region(t, &us_names());
        assert_eq!(cells[&(OilType::Ans, Region::Whatcom)], 1000.0);
        assert_eq!(cells[&(OilType::Ans, Region::PugetSound)], 500.0);
        assert_eq!(cells[&(OilType::JetFuel, Region::NotAttributed)], 20.0);
        let df = spill_region_frame(t, &cells).unwrap();
        assert_eq!(df.height(), 7 * 5);
    }
}
