//! Historical vessel oil transfer records.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::TraceError;
use crate::loader::{self, cell, str_column, DATETIME_FORMAT};
use crate::precision;
use crate::region::{FacilityRegistry, NameAliases, Region, RegionLabel};
use crate::schema::transfer;
use crate::taxonomy::{classify_product, OilType, ProductClassification};

pub const GALLONS_TO_LITERS: f64 = 3.78541;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferType {
    Cargo,
    Fueling,
    Other,
}

impl TransferType {
    pub fn from_record(raw: &str) -> Self {
        match raw.trim() {
            "Cargo" => TransferType::Cargo,
            "Fueling" => TransferType::Fueling,
            _ => TransferType::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransferType::Cargo => "Cargo",
            TransferType::Fueling => "Fueling",
            TransferType::Other => "Other",
        }
    }
}

/// One cargo or fuel movement between a deliverer and a receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub ant_id: String,
    pub start: NaiveDateTime,
    pub deliverer: String,
    pub receiver: String,
    pub product: String,
    pub oil_type: OilType,
    pub quantity_gallons: f64,
    pub transfer_type: TransferType,
    pub deliverer_type: String,
    pub receiver_type: String,
    /// Region of the receiving facility.
    pub import_region: Region,
    /// Region of the delivering facility.
    pub export_region: Region,
}

impl TransferRecord {
    /// Record with regions left unattributed; see [`TransferRecord::attribute_regions`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ant_id: impl Into<String>,
        start: NaiveDateTime,
        deliverer: impl Into<String>,
        receiver: impl Into<String>,
        product: impl Into<String>,
        quantity_gallons: f64,
        transfer_type: TransferType,
        deliverer_type: impl Into<String>,
        receiver_type: impl Into<String>,
    ) -> Self {
        let product = product.into();
        Self {
            ant_id: ant_id.into(),
            start,
            deliverer: deliverer.into(),
            receiver: receiver.into(),
            oil_type: classify_product(&product),
            product,
            quantity_gallons,
            transfer_type,
            deliverer_type: deliverer_type.into(),
            receiver_type: receiver_type.into(),
            import_region: Region::NotAttributed,
            export_region: Region::NotAttributed,
        }
    }

    /// Import region keys on the receiver, export region on the deliverer.
    pub fn attribute_regions(&mut self, registry: &FacilityRegistry) {
        self.import_region = registry.region_of(&self.receiver);
        self.export_region = registry.region_of(&self.deliverer);
    }

    /// True when `other` runs the same pair of parties the opposite way.
    pub fn reverses(&self, other: &TransferRecord) -> bool {
        self.deliverer == other.receiver && other.deliverer == self.receiver
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransferLoadOptions {
    pub quantity_precision: u32,
    /// Fold terminals into the groupings used by the Monte Carlo attribution.
    pub consolidate_terminals: bool,
}

impl TransferLoadOptions {
    /// Party renames applied while loading.
    pub fn aliases(&self) -> NameAliases {
        if self.consolidate_terminals {
            NameAliases::consolidated()
        } else {
            NameAliases::housekeeping()
        }
    }
}

impl Default for TransferLoadOptions {
    fn default() -> Self {
        Self {
            quantity_precision: 5,
            consolidate_terminals: false,
        }
    }
}

/// Loaded transfer table. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct TransferTable {
    records: Vec<TransferRecord>,
    aliases: NameAliases,
}

impl TransferTable {
    /// Records taken as given; no party renames.
    pub fn from_records(records: Vec<TransferRecord>) -> Self {
        Self {
            records,
            aliases: NameAliases::default(),
        }
    }

    pub fn load(
        path: &Path,
        sheet: Option<&str>,
        registry: &FacilityRegistry,
        options: TransferLoadOptions,
    ) -> Result<Self, TraceError> {
        let df = loader::read_table(path, sheet)?;
        let table = Self::from_frame(&df, registry, options)?;
        info!(
            path = %path.display(),
            transfers = table.len(),
            consolidated = options.consolidate_terminals,
            "transfer table loaded"
        );
        Ok(table)
    }

    pub fn from_frame(
        df: &DataFrame,
        registry: &FacilityRegistry,
        options: TransferLoadOptions,
    ) -> Result<Self, TraceError> {
        loader::require_columns(df, &transfer::REQUIRED)?;

        let ant_ids = str_column(df, transfer::ANT_ID)?;
        let starts = str_column(df, transfer::START_DATE_TIME)?;
        let deliverers = str_column(df, transfer::DELIVERER)?;
        let receivers = str_column(df, transfer::RECEIVER)?;
        let products = str_column(df, transfer::PRODUCT)?;
        let quantities = str_column(df, transfer::QUANTITY_GALLONS)?;
        let types = str_column(df, transfer::TRANSFER_TYPE)?;
        let deliverer_types = str_column(df, transfer::DELIVERER_TYPE)?;
        let receiver_types = str_column(df, transfer::RECEIVER_TYPE)?;

        let aliases = options.aliases();

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let quantity = precision::round_to(
                loader::parse_f64(cell(quantities, i), transfer::QUANTITY_GALLONS, i)?,
                options.quantity_precision,
            );
            if quantity < 0.0 {
                return Err(TraceError::InvalidData(format!(
                    "Negative {} {quantity} at row {i}",
                    transfer::QUANTITY_GALLONS
                )));
            }
            let start = loader::parse_datetime(cell(starts, i), transfer::START_DATE_TIME, i)?;

            let mut record = TransferRecord::new(
                cell(ant_ids, i).unwrap_or_default(),
                start,
                aliases.resolve(cell(deliverers, i).unwrap_or_default()),
                aliases.resolve(cell(receivers, i).unwrap_or_default()),
                cell(products, i).unwrap_or_default(),
                quantity,
                TransferType::from_record(cell(types, i).unwrap_or_default()),
                cell(deliverer_types, i).unwrap_or_default(),
                cell(receiver_types, i).unwrap_or_default(),
            );
            record.attribute_regions(registry);
            records.push(record);
        }

        let unattributed = records
            .iter()
            .filter(|r| {
                r.import_region == Region::NotAttributed && r.export_region == Region::NotAttributed
            })
            .count();
        debug!(unattributed, "transfers touching no registered facility");

        Ok(Self { records, aliases })
    }

    pub fn records(&self) -> &[TransferRecord] {
        &self.records
    }

    /// Party renames the records were loaded with.
    pub fn aliases(&self) -> &NameAliases {
        &self.aliases
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw product names grouped by oil type, for this table.
    pub fn classification(&self) -> ProductClassification {
        ProductClassification::from_products(self.records.iter().map(|r| r.product.as_str()))
    }

    /// Records as a DataFrame, products shown by presentation label.
    pub fn to_frame(&self) -> Result<DataFrame, TraceError> {
        records_to_frame(&self.records)
    }
}

pub fn records_to_frame(records: &[TransferRecord]) -> Result<DataFrame, TraceError> {
    let strings = |f: &dyn Fn(&TransferRecord) -> String| -> Vec<String> {
        records.iter().map(f).collect()
    };
    let quantities: Vec<f64> = records.iter().map(|r| r.quantity_gallons).collect();

    Ok(DataFrame::new(vec![
        Column::new(transfer::ANT_ID.into(), &strings(&|r| r.ant_id.clone())),
        Column::new(
            transfer::START_DATE_TIME.into(),
            &strings(&|r| r.start.format(DATETIME_FORMAT).to_string()),
        ),
        Column::new(transfer::DELIVERER.into(), &strings(&|r| r.deliverer.clone())),
        Column::new(transfer::RECEIVER.into(), &strings(&|r| r.receiver.clone())),
        Column::new(
            transfer::PRODUCT.into(),
            &strings(&|r| r.oil_type.label().to_string()),
        ),
        Column::new(transfer::QUANTITY_GALLONS.into(), &quantities),
        Column::new(
            transfer::TRANSFER_TYPE.into(),
            &strings(&|r| r.transfer_type.as_str().to_string()),
        ),
        Column::new(transfer::DELIVERER_TYPE.into(), &strings(&|r| r.deliverer_type.clone())),
        Column::new(transfer::RECEIVER_TYPE.into(), &strings(&|r| r.receiver_type.clone())),
        Column::new(
            transfer::IMPORT_REGION.into(),
            &strings(&|r| r.import_region.label(RegionLabel::Facility).to_string()),
        ),
        Column::new(
            transfer::EXPORT_REGION.into(),
            &strings(&|r| r.export_region.label(RegionLabel::Facility).to_string()),
        ),
    ])?)
}

// ── Two-way transfers ───────────────────────────────────────────────────────

/// Two-way flags for records already in time order.
///
/// A record is two-way when it reverses the next record; the record after a
/// reversing pair inherits the flag. The final record is compared with its
/// predecessor only. Voyages with more than two legs between the same pair
/// are not followed beyond immediate neighbours.
pub fn two_way_flags(records: &[TransferRecord]) -> Vec<bool> {
    let n = records.len();
    let mut flags = vec![false; n];
    let mut taken = false;
    for idx in 0..n {
        if idx + 1 < n {
            if records[idx].reverses(&records[idx + 1]) {
                flags[idx] = true;
                taken = true;
            } else {
                flags[idx] = taken;
                taken = false;
            }
        } else if idx > 0 {
            flags[idx] = records[idx].reverses(&records[idx - 1]);
        }
    }
    flags
}

/// Sort by start time and split into `(one_way, two_way)`.
pub fn split_two_way(records: &[TransferRecord]) -> (Vec<TransferRecord>, Vec<TransferRecord>) {
    let mut ordered = records.to_vec();
    ordered.sort_by_key(|r| r.start);
    let flags = two_way_flags(&ordered);

    let mut one_way = Vec::new();
    let mut two_way = Vec::new();
    for (record, is_two_way) in ordered.into_iter().zip(flags) {
        if is_two_way {
            two_way.push(record);
        } else {
            one_way.push(record);
        }
    }
    debug!(one_way = one_way.len(), two_way = two_way.len(), "two-way split");
    (one_way, two_way)
}

// ── Per-vessel voyage transfers ─────────────────────────────────────────────

/// How vessel names are matched against the transfer parties.
#[derive(Debug, Clone)]
pub enum VesselMatch {
    Names(Vec<String>),
    Contains(String),
}

impl VesselMatch {
    fn matches(&self, party: &str) -> bool {
        match self {
            VesselMatch::Names(names) => names.iter().any(|n| n == party),
            VesselMatch::Contains(fragment) => party.contains(fragment.as_str()),
        }
    }
}

/// Cargo volume moved under one AntID.
#[derive(Debug, Clone, PartialEq)]
pub struct VoyageTransfer {
    pub ant_id: String,
    pub liters: f64,
    pub deliverer: String,
    pub receiver: String,
    pub start: NaiveDateTime,
}

/// Cargo transfers to or from the given vessels, one entry per AntID with
/// summed volume in litres, largest first. Deliverer, receiver and start
/// time come from the first leg seen for the AntID.
pub fn cargo_transfers_by_vessel(
    records: &[TransferRecord],
    vessels: &VesselMatch,
) -> Vec<VoyageTransfer> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, (f64, &TransferRecord)> = HashMap::new();

    for record in records.iter().filter(|r| {
        r.transfer_type == TransferType::Cargo
            && (vessels.matches(&r.deliverer) || vessels.matches(&r.receiver))
    }) {
        grouped
            .entry(record.ant_id.clone())
            .and_modify(|(gallons, _)| *gallons += record.quantity_gallons)
            .or_insert_with(|| {
                order.push(record.ant_id.clone());
                (record.quantity_gallons, record)
            });
    }

    let mut voyages: Vec<VoyageTransfer> = order
        .into_iter()
        .filter_map(|id| grouped.remove(&id).map(|g| (id, g)))
        .map(|(ant_id, (gallons, first))| VoyageTransfer {
            ant_id,
            liters: gallons * GALLONS_TO_LITERS,
            deliverer: first.deliverer.clone(),
            receiver: first.receiver.clone(),
            start: first.start,
        })
        .collect();
    voyages.sort_by(|a, b| b.liters.total_cmp(&a.liters));
    voyages
}
