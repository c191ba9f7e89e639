/// Column-name constants for oil-tracekit tables.
/// Single source of truth - exported to Python via PyO3.

// ── Facility spreadsheet ────────────────────────────────────────────────────
pub mod facility {
    pub const FACILITY_NAME: &str = "FacilityName";
    pub const FACILITY_ECY_NAME: &str = "FacilityECYName";
    pub const DOCK_LAT: &str = "DockLatNumber";
    pub const REGION: &str = "Region";
}

// ── Historical transfer spreadsheet ─────────────────────────────────────────
pub mod transfer {
    pub const ANT_ID: &str = "AntID";
    pub const START_DATE_TIME: &str = "StartDateTime";
    pub const DELIVERER: &str = "Deliverer";
    pub const RECEIVER: &str = "Receiver";
    pub const PRODUCT: &str = "Product";
    pub const QUANTITY_GALLONS: &str = "TransferQtyInGallon";
    pub const TRANSFER_TYPE: &str = "TransferType";
    pub const DELIVERER_TYPE: &str = "DelivererTypeDescription";
    pub const RECEIVER_TYPE: &str = "ReceiverTypeDescription";
    pub const IMPORT_REGION: &str = "ImportRegion";
    pub const EXPORT_REGION: &str = "ExportRegion";

    pub const REQUIRED: [&str; 9] = [
        ANT_ID,
        START_DATE_TIME,
        DELIVERER,
        RECEIVER,
        PRODUCT,
        QUANTITY_GALLONS,
        TRANSFER_TYPE,
        DELIVERER_TYPE,
        RECEIVER_TYPE,
    ];
}

// ── Monte Carlo spill CSV ───────────────────────────────────────────────────
pub mod spill {
    pub const LAGRANGIAN_TEMPLATE: &str = "Lagrangian_template";
    pub const VESSEL_TYPE: &str = "vessel_type";
    pub const FUEL_CARGO: &str = "fuel_cargo";
    pub const VESSEL_ORIGIN: &str = "vessel_origin";
    pub const VESSEL_DEST: &str = "vessel_dest";
    pub const CARGO_CAPACITY: &str = "cargo_capacity";
    pub const SPILL_LAT: &str = "spill_lat";
    pub const OIL_TYPE: &str = "oil_type";
    pub const SPILL_REGION: &str = "SpillRegion";

    pub const REQUIRED: [&str; 7] = [
        LAGRANGIAN_TEMPLATE,
        VESSEL_TYPE,
        FUEL_CARGO,
        VESSEL_ORIGIN,
        VESSEL_DEST,
        CARGO_CAPACITY,
        SPILL_LAT,
    ];
}

// ── Mass-balance run output ─────────────────────────────────────────────────
pub mod mass_balance {
    pub const VOL_OIL_BEACHED: &str = "VolOilBeached";
    pub const DENSITY: &str = "Density";
    pub const V_WATER_CONTENT: &str = "VWaterContent";
    pub const M_WATER_CONTENT: &str = "MWaterContent";
    pub const M_EVAPORATED: &str = "MEvaporated";
    pub const M_DISPERSED: &str = "MDispersed";
    pub const M_DISSOLVED: &str = "MDissolved";
    pub const M_BIO: &str = "MBio";
    pub const MASS_OIL: &str = "MassOil";

    pub const REQUIRED: [&str; 9] = [
        VOL_OIL_BEACHED,
        DENSITY,
        V_WATER_CONTENT,
        M_WATER_CONTENT,
        M_EVAPORATED,
        M_DISPERSED,
        M_DISSOLVED,
        M_BIO,
        MASS_OIL,
    ];
}

// ── Aggregate output tables ─────────────────────────────────────────────────
pub mod output {
    pub const VESSEL_TYPE: &str = "vessel_type";
    pub const DIRECTION: &str = "direction";
    pub const OIL_TYPE: &str = "oil_type";
    pub const REGION: &str = "region";
    pub const QUANTITY: &str = "quantity";
    pub const LOCATION: &str = "location";
    pub const IMPORTS: &str = "imports";
    pub const EXPORTS: &str = "exports";
    pub const COMBINED: &str = "combined";
    pub const RUN_ID: &str = "run_id";
    pub const M_INITIAL: &str = "MInitial";
    pub const M_BEACHED: &str = "MBeached";
    pub const MASS_LOST: &str = "MassLost";
}
