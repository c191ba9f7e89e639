//! Latitude-band regions, the facility registry, and terminal name aliases.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use polars::prelude::*;
use tracing::{info, warn};

use crate::error::TraceError;
use crate::loader::{self, cell, str_column};
use crate::schema::facility;

/// Band edges, south to north: Columbia River | Puget Sound | Anacortes | Whatcom.
pub const LAT_PARTITION: [f64; 3] = [46.9, 48.3, 48.7];

pub const NOT_ATTRIBUTED: &str = "not attributed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Region {
    ColumbiaRiver,
    PugetSound,
    Anacortes,
    Whatcom,
    NotAttributed,
}

/// Which label family a region is reported in. Facility tables name the
/// northern band after the county; spill tables use the short form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionLabel {
    Facility,
    Spill,
}

impl Region {
    pub const ATTRIBUTED: [Region; 4] = [
        Region::ColumbiaRiver,
        Region::PugetSound,
        Region::Anacortes,
        Region::Whatcom,
    ];

    pub fn label(self, style: RegionLabel) -> &'static str {
        match (self, style) {
            (Region::ColumbiaRiver, _) => "Columbia River",
            (Region::PugetSound, _) => "Puget Sound",
            (Region::Anacortes, _) => "Anacortes",
            (Region::Whatcom, RegionLabel::Facility) => "Whatcom County",
            (Region::Whatcom, RegionLabel::Spill) => "Whatcom",
            (Region::NotAttributed, _) => NOT_ATTRIBUTED,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label(RegionLabel::Facility))
    }
}

/// Region containing `latitude`. Each band includes its southern edge.
/// NaN is not attributed.
pub fn region_of(latitude: f64) -> Region {
    if latitude.is_nan() {
        Region::NotAttributed
    } else if latitude < LAT_PARTITION[0] {
        Region::ColumbiaRiver
    } else if latitude < LAT_PARTITION[1] {
        Region::PugetSound
    } else if latitude < LAT_PARTITION[2] {
        Region::Anacortes
    } else {
        Region::Whatcom
    }
}

/// Bulk [`region_of`] for spill latitudes.
pub fn assign_spill_regions(latitudes: &[f64]) -> Vec<Region> {
    latitudes.iter().map(|lat| region_of(*lat)).collect()
}

// ── Facilities ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    pub name: String,
    /// Name used for the terminal in the transfer records, when it differs.
    pub ecy_name: Option<String>,
    pub dock_lat: f64,
    pub region: Region,
}

impl Facility {
    pub fn new(name: impl Into<String>, ecy_name: Option<String>, dock_lat: f64) -> Self {
        Self {
            name: name.into(),
            ecy_name,
            dock_lat,
            region: region_of(dock_lat),
        }
    }

    pub fn transfer_name(&self) -> &str {
        self.ecy_name.as_deref().unwrap_or(&self.name)
    }
}

/// Read-only facility list, looked up by exact name.
#[derive(Debug, Clone, Default)]
pub struct FacilityRegistry {
    facilities: Vec<Facility>,
    by_name: HashMap<String, usize>,
}

impl FacilityRegistry {
    pub fn new(facilities: Vec<Facility>) -> Self {
        let mut by_name = HashMap::with_capacity(facilities.len());
        for (idx, f) in facilities.iter().enumerate() {
            // last row wins on duplicate names
            by_name.insert(f.name.clone(), idx);
        }
        Self { facilities, by_name }
    }

    pub fn load(path: &Path, sheet: Option<&str>) -> Result<Self, TraceError> {
        let df = loader::read_table(path, sheet)?;
        let registry = Self::from_frame(&df)?;
        info!(
            path = %path.display(),
            facilities = registry.len(),
            "facility registry loaded"
        );
        Ok(registry)
    }

    /// Required columns: FacilityName, DockLatNumber. FacilityECYName is optional.
    pub fn from_frame(df: &DataFrame) -> Result<Self, TraceError> {
        loader::require_columns(df, &[facility::FACILITY_NAME, facility::DOCK_LAT])?;
        let names = str_column(df, facility::FACILITY_NAME)?;
        let lats = str_column(df, facility::DOCK_LAT)?;
        let ecy = str_column(df, facility::FACILITY_ECY_NAME).ok();

        let mut facilities = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let Some(name) = cell(names, i) else {
                warn!(row = i, "facility row without a name; skipped");
                continue;
            };
            let dock_lat = match cell(lats, i) {
                Some(raw) => loader::parse_f64(Some(raw), facility::DOCK_LAT, i)?,
                None => f64::NAN,
            };
            let ecy_name = ecy.and_then(|c| cell(c, i)).map(str::to_string);
            facilities.push(Facility::new(name, ecy_name, dock_lat));
        }
        Ok(Self::new(facilities))
    }

    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Facility> {
        self.facilities.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Facility> {
        self.by_name.get(name).map(|idx| &self.facilities[*idx])
    }

    /// Region of a facility by exact name; unknown names are not attributed.
    pub fn region_of(&self, name: &str) -> Region {
        self.get(name).map(|f| f.region).unwrap_or(Region::NotAttributed)
    }

    /// Facility names as they appear in transfer records loaded with
    /// `aliases`: each FacilityName and FacilityECYName, renamed the same
    /// way the records were, without duplicates.
    pub fn selected_names(&self, aliases: &NameAliases) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.facilities.len() * 2);
        for f in &self.facilities {
            for raw in [f.name.as_str(), f.transfer_name()] {
                let resolved = aliases.resolve(raw);
                if !names.iter().any(|n| n == resolved) {
                    names.push(resolved.to_string());
                }
            }
        }
        names
    }

    /// Facility table with its region column, facility label form.
    pub fn to_frame(&self) -> Result<DataFrame, TraceError> {
        let names: Vec<String> = self.facilities.iter().map(|f| f.name.clone()).collect();
        let ecy: Vec<String> = self
            .facilities
            .iter()
            .map(|f| f.transfer_name().to_string())
            .collect();
        let lats: Vec<f64> = self.facilities.iter().map(|f| f.dock_lat).collect();
        let regions: Vec<&str> = self
            .facilities
            .iter()
            .map(|f| f.region.label(RegionLabel::Facility))
            .collect();
        Ok(DataFrame::new(vec![
            Column::new(facility::FACILITY_NAME.into(), &names),
            Column::new(facility::FACILITY_ECY_NAME.into(), &ecy),
            Column::new(facility::DOCK_LAT.into(), &lats),
            Column::new(facility::REGION.into(), &regions),
        ])?)
    }
}

// ── Name aliases ────────────────────────────────────────────────────────────

/// Ordered exact-match renames applied to transfer party names.
#[derive(Debug, Clone, Default)]
pub struct NameAliases {
    renames: Vec<(String, String)>,
}

const HOUSEKEEPING: [(&str, &str); 4] = [
    ("US Oil Tacoma ", "U.S. Oil & Refining"),
    ("TLP", "TLP Management Services LLC (TMS)"),
    (
        "Maxum (Rainer Petroleum)",
        "Maxum Petroleum - Harbor Island Terminal",
    ),
    (
        "Andeavor Anacortes Refinery (formerly Tesoro)",
        "Marathon Anacortes Refinery (formerly Tesoro)",
    ),
];

const CONSOLIDATION: [(&str, &str); 3] = [
    (
        "Maxum Petroleum - Harbor Island Terminal",
        "Kinder Morgan Liquids Terminal - Harbor Island",
    ),
    (
        "Shell Oil LP Seattle Distribution Terminal",
        "Kinder Morgan Liquids Terminal - Harbor Island",
    ),
    ("Nustar Energy Tacoma", "Phillips 66 Tacoma Terminal"),
];

impl NameAliases {
    pub fn new<I, A, B>(renames: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self {
            renames: renames
                .into_iter()
                .map(|(a, b)| (a.into(), b.into()))
                .collect(),
        }
    }

    /// Historical spellings of the same terminal.
    pub fn housekeeping() -> Self {
        Self::new(HOUSEKEEPING)
    }

    /// Housekeeping plus the terminal groupings used by the Monte Carlo
    /// origin/destination attribution.
    pub fn consolidated() -> Self {
        Self::new(HOUSEKEEPING.into_iter().chain(CONSOLIDATION))
    }

    /// Renames apply in sequence, so one rename may feed the next.
    /// Surrounding whitespace is not significant.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        let mut current = name;
        for (from, to) in &self.renames {
            if current.trim() == from.trim() {
                current = to.as_str();
            }
        }
        current
    }
}
