use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use polars::prelude::*;
use tracing::debug;

use crate::attribution::{WeightContext, WeightTable};
use crate::error::TraceError;
use crate::region::{FacilityRegistry, NameAliases, Region, RegionLabel};
use crate::schema::output;
use crate::taxonomy::OilType;
use crate::transfers::{TransferRecord, TransferType};

const TANK_SHIP: &str = "TANK SHIP";
const BARGE_TYPES: [&str; 2] = ["TANK BARGE", "TUGBOAT"];
const ATB_MARKERS: [&str; 2] = ["ITB", "ATB"];

/// Cargo vessel classes the aggregates are broken down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VesselType {
    Tanker,
    Atb,
    Barge,
}

impl VesselType {
    pub const ALL: [VesselType; 3] = [VesselType::Tanker, VesselType::Atb, VesselType::Barge];

    pub fn as_str(self) -> &'static str {
        match self {
            VesselType::Tanker => "tanker",
            VesselType::Atb => "atb",
            VesselType::Barge => "barge",
        }
    }

    /// Whether a transfer counterpart belongs to this class. ATB and barge
    /// split the same type descriptions on the ITB/ATB name marker.
    pub fn matches(self, type_description: &str, name: &str) -> bool {
        let type_description = type_description.trim();
        match self {
            VesselType::Tanker => type_description == TANK_SHIP,
            VesselType::Atb => BARGE_TYPES.contains(&type_description) && has_atb_marker(name),
            VesselType::Barge => BARGE_TYPES.contains(&type_description) && !has_atb_marker(name),
        }
    }
}

fn has_atb_marker(name: &str) -> bool {
    ATB_MARKERS.iter().any(|m| name.contains(m))
}

impl fmt::Display for VesselType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VesselType {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tanker" => Ok(VesselType::Tanker),
            "atb" => Ok(VesselType::Atb),
            "barge" => Ok(VesselType::Barge),
            _ => Err(TraceError::InvalidArgument(format!("Unknown vessel type: '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Import,
    Export,
    Combined,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::Import, Direction::Export, Direction::Combined];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Import => "import",
            Direction::Export => "export",
            Direction::Combined => "combined",
        }
    }
}

/// The directions a quantity is recorded under; combined is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    Import,
    Export,
}

impl From<Flow> for Direction {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::Import => Direction::Import,
            Flow::Export => Direction::Export,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "import" => Ok(Direction::Import),
            "export" => Ok(Direction::Export),
            "combined" => Ok(Direction::Combined),
            _ => Err(TraceError::InvalidArgument(format!("Unknown direction: '{s}'"))),
        }
    }
}

/// Which transfer types a query counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferCategory {
    Cargo,
    Fuel,
    CargoFuel,
}

impl TransferCategory {
    pub fn includes(self, transfer_type: TransferType) -> bool {
        match self {
            TransferCategory::Cargo => transfer_type == TransferType::Cargo,
            TransferCategory::Fuel => transfer_type == TransferType::Fueling,
            TransferCategory::CargoFuel => {
                matches!(transfer_type, TransferType::Cargo | TransferType::Fueling)
            }
        }
    }
}

impl FromStr for TransferCategory {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cargo" => Ok(TransferCategory::Cargo),
            "fuel" => Ok(TransferCategory::Fuel),
            "cargo_fuel" => Ok(TransferCategory::CargoFuel),
            _ => Err(TraceError::InvalidArgument(format!(
                "Unknown transfer type: '{s}' (expected cargo, fuel or cargo_fuel)"
            ))),
        }
    }
}

/// Facilities a query is restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilityScope {
    Selected(HashSet<String>),
    All,
}

impl FacilityScope {
    pub fn selected<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FacilityScope::Selected(names.into_iter().map(Into::into).collect())
    }

    /// `"selected"` restricts to the registry's facilities, `"all"` does not.
    /// `aliases` must be the renames the transfer records were loaded with.
    pub fn from_arg(
        arg: &str,
        registry: &FacilityRegistry,
        aliases: &NameAliases,
    ) -> Result<Self, TraceError> {
        match arg.trim().to_ascii_lowercase().as_str() {
            "selected" => Ok(Self::selected(registry.selected_names(aliases))),
            "all" => Ok(FacilityScope::All),
            _ => Err(TraceError::InvalidArgument(format!(
                "Unknown facility scope: '{arg}' (expected selected or all)"
            ))),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            FacilityScope::Selected(names) => names.contains(name),
            FacilityScope::All => true,
        }
    }
}

// ── Transfer queries ────────────────────────────────────────────────────────

/// One filter over the transfer table. Imports are transfers onto a facility
/// from a matching vessel, exports the reverse.
#[derive(Debug, Clone)]
pub struct TransferQuery {
    pub vessel: VesselType,
    pub category: TransferCategory,
    pub scope: FacilityScope,
}

impl TransferQuery {
    pub fn new(vessel: VesselType, category: TransferCategory, scope: FacilityScope) -> Self {
        Self {
            vessel,
            category,
            scope,
        }
    }

    pub fn is_import(&self, r: &TransferRecord) -> bool {
        self.category.includes(r.transfer_type)
            && self.vessel.matches(&r.deliverer_type, &r.deliverer)
            && self.scope.contains(&r.receiver)
    }

    pub fn is_export(&self, r: &TransferRecord) -> bool {
        self.category.includes(r.transfer_type)
            && self.vessel.matches(&r.receiver_type, &r.receiver)
            && self.scope.contains(&r.deliverer)
    }

    /// Owned copies of the matching records. Combined is the import set
    /// followed by the export set.
    pub fn select(&self, records: &[TransferRecord], direction: Direction) -> Vec<TransferRecord> {
        let imports = records.iter().filter(|r| self.is_import(r));
        let exports = records.iter().filter(|r| self.is_export(r));
        let selected: Vec<TransferRecord> = match direction {
            Direction::Import => imports.cloned().collect(),
            Direction::Export => exports.cloned().collect(),
            Direction::Combined => imports.chain(exports).cloned().collect(),
        };
        debug!(
            vessel = %self.vessel,
            direction = %direction,
            rows = selected.len(),
            "transfer query"
        );
        selected
    }
}

// ── Tallies ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TallyKey {
    pub vessel: VesselType,
    pub direction: Direction,
    pub oil: OilType,
    pub region: Region,
}

/// Summed quantity per (vessel, direction, oil, region) cell.
///
/// Every cell of the full grid is present, zeros included. Combined cells
/// are always import + export of the same (vessel, oil, region).
#[derive(Debug, Clone)]
pub struct Tally {
    cells: BTreeMap<TallyKey, f64>,
    region_label: RegionLabel,
}

impl Tally {
    pub fn new(region_label: RegionLabel) -> Self {
        let mut cells = BTreeMap::new();
        for vessel in VesselType::ALL {
            for direction in Direction::ALL {
                for oil in OilType::ALL {
                    for region in Region::ATTRIBUTED.into_iter().chain([Region::NotAttributed]) {
                        cells.insert(
                            TallyKey {
                                vessel,
                                direction,
                                oil,
                                region,
                            },
                            0.0,
                        );
                    }
                }
            }
        }
        Self {
            cells,
            region_label,
        }
    }

    /// Add to an import or export cell and its combined cell.
    pub fn add(
        &mut self,
        vessel: VesselType,
        flow: Flow,
        oil: OilType,
        region: Region,
        quantity: f64,
    ) {
        for d in [flow.into(), Direction::Combined] {
            *self
                .cells
                .entry(TallyKey {
                    vessel,
                    direction: d,
                    oil,
                    region,
                })
                .or_insert(0.0) += quantity;
        }
    }

    pub fn get(&self, vessel: VesselType, direction: Direction, oil: OilType, region: Region) -> f64 {
        self.cells
            .get(&TallyKey {
                vessel,
                direction,
                oil,
                region,
            })
            .copied()
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TallyKey, f64)> {
        self.cells.iter().map(|(k, v)| (k, *v))
    }

    /// Sum over regions, per oil type.
    pub fn oil_totals(&self, vessel: VesselType, direction: Direction) -> BTreeMap<OilType, f64> {
        let mut totals: BTreeMap<OilType, f64> = OilType::ALL.iter().map(|o| (*o, 0.0)).collect();
        for (key, qty) in self
            .cells
            .iter()
            .filter(|(k, _)| k.vessel == vessel && k.direction == direction)
        {
            *totals.entry(key.oil).or_insert(0.0) += qty;
        }
        totals
    }

    pub fn total(&self, vessel: VesselType, direction: Direction) -> f64 {
        self.oil_totals(vessel, direction).values().sum()
    }

    /// Long-format frame, one row per cell, oils by presentation label.
    pub fn to_frame(&self) -> Result<DataFrame, TraceError> {
        let mut vessels = Vec::with_capacity(self.cells.len());
        let mut directions = Vec::with_capacity(self.cells.len());
        let mut oils = Vec::with_capacity(self.cells.len());
        let mut regions = Vec::with_capacity(self.cells.len());
        let mut quantities = Vec::with_capacity(self.cells.len());
        for (key, qty) in &self.cells {
            vessels.push(key.vessel.as_str());
            directions.push(key.direction.as_str());
            oils.push(key.oil.label());
            regions.push(key.region.label(self.region_label));
            quantities.push(*qty);
        }
        Ok(DataFrame::new(vec![
            Column::new(output::VESSEL_TYPE.into(), &vessels),
            Column::new(output::DIRECTION.into(), &directions),
            Column::new(output::OIL_TYPE.into(), &oils),
            Column::new(output::REGION.into(), &regions),
            Column::new(output::QUANTITY.into(), &quantities),
        ])?)
    }

    /// [`Tally::to_frame`] narrowed to one vessel class and/or direction.
    pub fn to_filtered_frame(
        &self,
        vessel: Option<VesselType>,
        direction: Option<Direction>,
    ) -> Result<DataFrame, TraceError> {
        let mut predicate = lit(true);
        if let Some(v) = vessel {
            predicate = predicate.and(col(output::VESSEL_TYPE).eq(lit(v.as_str())));
        }
        if let Some(d) = direction {
            predicate = predicate.and(col(output::DIRECTION).eq(lit(d.as_str())));
        }
        Ok(self.to_frame()?.lazy().filter(predicate).collect()?)
    }
}

/// Gallons per (vessel, direction, oil, region). Imports count at the
/// receiver's region, exports at the deliverer's.
pub fn quantity_by_region(
    records: &[TransferRecord],
    category: TransferCategory,
    scope: &FacilityScope,
) -> Tally {
    let mut tally = Tally::new(RegionLabel::Facility);
    for vessel in VesselType::ALL {
        let query = TransferQuery::new(vessel, category, scope.clone());
        for r in records {
            if query.is_import(r) {
                tally.add(vessel, Flow::Import, r.oil_type, r.import_region, r.quantity_gallons);
            }
            if query.is_export(r) {
                tally.add(vessel, Flow::Export, r.oil_type, r.export_region, r.quantity_gallons);
            }
        }
    }
    tally
}

/// Gallons per oil type for each vessel class and direction.
pub fn quantity_by_oil(
    records: &[TransferRecord],
    category: TransferCategory,
    scope: &FacilityScope,
) -> BTreeMap<(VesselType, Direction), BTreeMap<OilType, f64>> {
    let tally = quantity_by_region(records, category, scope);
    let mut out = BTreeMap::new();
    for vessel in VesselType::ALL {
        for direction in Direction::ALL {
            out.insert((vessel, direction), tally.oil_totals(vessel, direction));
        }
    }
    out
}

/// Cargo transfer counts at one facility for one vessel class.
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityCounts {
    pub vessel: VesselType,
    pub location: String,
    pub imports: usize,
    pub exports: usize,
    pub combined: usize,
    pub region: Region,
}

/// Cargo transfer counts per registered facility per vessel class, in
/// registry order, zero-count facilities included. A facility matches
/// under its FacilityName or FacilityECYName as renamed by `aliases`, and
/// is reported under its FacilityName.
pub fn transfer_counts_by_facility(
    records: &[TransferRecord],
    registry: &FacilityRegistry,
    aliases: &NameAliases,
) -> Vec<FacilityCounts> {
    let mut counts = Vec::with_capacity(registry.len() * VesselType::ALL.len());
    for vessel in VesselType::ALL {
        let query = TransferQuery::new(vessel, TransferCategory::Cargo, FacilityScope::All);
        for facility in registry.iter() {
            let names = [
                aliases.resolve(&facility.name),
                aliases.resolve(facility.transfer_name()),
            ];
            let imports = records
                .iter()
                .filter(|r| names.contains(&r.receiver.as_str()) && query.is_import(r))
                .count();
            let exports = records
                .iter()
                .filter(|r| names.contains(&r.deliverer.as_str()) && query.is_export(r))
                .count();
            counts.push(FacilityCounts {
                vessel,
                location: facility.name.clone(),
                imports,
                exports,
                combined: imports + exports,
                region: facility.region,
            });
        }
    }
    counts
}

pub fn facility_counts_to_frame(counts: &[FacilityCounts]) -> Result<DataFrame, TraceError> {
    let vessels: Vec<&str> = counts.iter().map(|c| c.vessel.as_str()).collect();
    let locations: Vec<&str> = counts.iter().map(|c| c.location.as_str()).collect();
    let imports: Vec<u64> = counts.iter().map(|c| c.imports as u64).collect();
    let exports: Vec<u64> = counts.iter().map(|c| c.exports as u64).collect();
    let combined: Vec<u64> = counts.iter().map(|c| c.combined as u64).collect();
    let regions: Vec<&str> = counts
        .iter()
        .map(|c| c.region.label(RegionLabel::Facility))
        .collect();
    Ok(DataFrame::new(vec![
        Column::new(output::VESSEL_TYPE.into(), &vessels),
        Column::new(output::LOCATION.into(), &locations),
        Column::new(output::IMPORTS.into(), &imports),
        Column::new(output::EXPORTS.into(), &exports),
        Column::new(output::COMBINED.into(), &combined),
        Column::new(output::REGION.into(), &regions),
    ])?)
}

/// Fraction-of-total cargo weights per oil short code for one facility and
/// vessel class, both directions together. `source` names the transfer
/// table in error reports.
pub fn transfer_weights(
    records: &[TransferRecord],
    facility: &str,
    vessel: VesselType,
    source: &Path,
    precision: u32,
) -> Result<WeightTable, TraceError> {
    let query = TransferQuery::new(
        vessel,
        TransferCategory::Cargo,
        FacilityScope::selected([facility]),
    );
    let mut totals: BTreeMap<OilType, f64> = OilType::ALL.iter().map(|o| (*o, 0.0)).collect();
    for r in query.select(records, Direction::Combined) {
        *totals.entry(r.oil_type).or_insert(0.0) += r.quantity_gallons;
    }
    let quantities: Vec<(String, f64)> = totals
        .into_iter()
        .map(|(oil, qty)| (oil.short_code().to_string(), qty))
        .collect();
    WeightTable::from_quantities(
        WeightContext::new(Some(facility), vessel.as_str(), source),
        &quantities,
        precision,
    )
}
