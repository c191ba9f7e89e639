// End-to-end transfer analysis: config → facilities → transfers → tallies.
//
// Fixtures are written to a temp directory and read back through the same
// loaders the Python surface uses.


use approx::assert_relative_eq;
use polars::prelude::ChunkAgg;
use oil_tracekit::aggregation::{
    quantity_by_oil, quantity_by_region, transfer_counts_by_facility, transfer_weights, Direction,
    FacilityScope, TransferCategory, TransferQuery, VesselType,
};
use oil_tracekit::precision::unit_sum;
use oil_tracekit::sampler::sample_oil_type;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use oil_tracekit::config::AnalysisConfig;
use oil_tracekit::region::{FacilityRegistry, Region};
use oil_tracekit::taxonomy::OilType;
use oil_tracekit::transfers::{
    cargo_transfers_by_vessel, split_two_way, TransferLoadOptions, TransferTable, VesselMatch,
    GALLONS_TO_LITERS,
};
use oil_tracekit::{logging, TraceError};

fn load() -> (tempfile::TempDir, FacilityRegistry, TransferTable) {
    logging::init_test();
    let dir = test_helpers::analysis_dir();
    let config = AnalysisConfig::from_yaml_file(&dir.path().join("analysis.yaml")).unwrap();
    let registry =
        FacilityRegistry::load(&config.facility_path(), Some(config.facility_sheet())).unwrap();
    let table = TransferTable::load(
        &config.transfer_path(),
        Some(config.transfer_sheet()),
        &registry,
        config.transfer_options(),
    )
    .unwrap();
    (dir, registry, table)
}

#[test]
fn test_facility_regions_from_dock_latitude() {
    let (_dir, registry, _) = load();
    assert_eq!(registry.len(), 4);
    assert_eq!(registry.region_of("BP Cherry Point Refinery"), Region::Whatcom);
    assert_eq!(
        registry.region_of("Marathon Anacortes Refinery (formerly Tesoro)"),
        Region::Anacortes
    );
    assert_eq!(registry.region_of("U.S. Oil & Refining"), Region::PugetSound);
    assert_eq!(registry.region_of("Tesoro Vancouver Terminal"), Region::ColumbiaRiver);
    assert_eq!(registry.region_of("Private Dock"), Region::NotAttributed);
}

#[test]
fn test_transfers_are_cleaned_on_load() {
    let (_dir, _, table) = load();
    assert_eq!(table.len(), 6);
    let records = table.records();

    // thousands separators stripped, quantities rounded to five places
    assert_relative_eq!(records[0].quantity_gallons, 1_000_000.0);
    assert_relative_eq!(records[1].quantity_gallons, 20_000.12346);

    // historical terminal spelling folded into the registry name
    assert_eq!(records[2].receiver, "U.S. Oil & Refining");
    assert_eq!(records[2].import_region, Region::PugetSound);

    let oils: Vec<OilType> = records.iter().map(|r| r.oil_type).collect();
    assert_eq!(
        oils,
        vec![
            OilType::Ans,
            OilType::Diesel,
            OilType::JetFuel,
            OilType::Gasoline,
            OilType::BunkerC,
            OilType::Other,
        ]
    );
}

#[test]
fn test_quantity_by_region_all_facilities() {
    let (_dir, _, table) = load();
    let tally = quantity_by_region(table.records(), TransferCategory::Cargo, &FacilityScope::All);

    assert_relative_eq!(
        tally.get(VesselType::Tanker, Direction::Import, OilType::Ans, Region::Whatcom),
        1_000_000.0
    );
    assert_relative_eq!(
        tally.get(VesselType::Tanker, Direction::Export, OilType::Other, Region::NotAttributed),
        50.0
    );
    assert_relative_eq!(
        tally.get(VesselType::Atb, Direction::Export, OilType::Diesel, Region::Whatcom),
        20_000.12346
    );
    assert_relative_eq!(
        tally.get(VesselType::Atb, Direction::Import, OilType::JetFuel, Region::PugetSound),
        5_000.0
    );
    assert_relative_eq!(
        tally.get(VesselType::Barge, Direction::Import, OilType::Gasoline, Region::ColumbiaRiver),
        3_000.0
    );
    // fueling excluded from cargo
    assert_relative_eq!(tally.total(VesselType::Barge, Direction::Export), 0.0);
}

#[test]
fn test_combined_is_import_plus_export() {
    let (_dir, _, table) = load();
    let tally =
        quantity_by_region(table.records(), TransferCategory::CargoFuel, &FacilityScope::All);
    for (key, qty) in tally.iter().filter(|(k, _)| k.direction == Direction::Combined) {
        let import = tally.get(key.vessel, Direction::Import, key.oil, key.region);
        let export = tally.get(key.vessel, Direction::Export, key.oil, key.region);
        assert_relative_eq!(qty, import + export);
    }
    assert_relative_eq!(
        tally.get(VesselType::Barge, Direction::Export, OilType::BunkerC, Region::ColumbiaRiver),
        700.0
    );
}

#[test]
fn test_selected_scope_drops_unregistered_facilities() {
    let (_dir, registry, table) = load();
    let scope = FacilityScope::from_arg("selected", &registry, table.aliases()).unwrap();
    let by_oil = quantity_by_oil(table.records(), TransferCategory::Cargo, &scope);

    let tanker_export = &by_oil[&(VesselType::Tanker, Direction::Export)];
    assert_relative_eq!(tanker_export[&OilType::Other], 0.0);
    let tanker_import = &by_oil[&(VesselType::Tanker, Direction::Import)];
    assert_relative_eq!(tanker_import[&OilType::Ans], 1_000_000.0);
    assert_eq!(tanker_import.len(), OilType::ALL.len());

    assert!(matches!(
        FacilityScope::from_arg("nearby", &registry, table.aliases()),
        Err(TraceError::InvalidArgument(_))
    ));
}

#[test]
fn test_tally_frame_filters_by_vessel_and_direction() {
    let (_dir, _, table) = load();
    let tally = quantity_by_region(table.records(), TransferCategory::Cargo, &FacilityScope::All);
    let full = tally.to_frame().unwrap();
    assert_eq!(full.height(), 3 * 3 * 7 * 5);

    let atb_imports = tally
        .to_filtered_frame(Some(VesselType::Atb), Some(Direction::Import))
        .unwrap();
    assert_eq!(atb_imports.height(), 7 * 5);
    let total: f64 = atb_imports.column("quantity").unwrap().f64().unwrap().sum().unwrap();
    assert_relative_eq!(total, 5_000.0);
}

#[test]
fn test_transfer_counts_by_facility() {
    let (_dir, registry, table) = load();
    let counts = transfer_counts_by_facility(table.records(), &registry, table.aliases());
    assert_eq!(counts.len(), 3 * registry.len());

    let find = |vessel: VesselType, location: &str| {
        counts
            .iter()
            .find(|c| c.vessel == vessel && c.location == location)
            .unwrap()
    };
    let bp_tanker = find(VesselType::Tanker, "BP Cherry Point Refinery");
    assert_eq!((bp_tanker.imports, bp_tanker.exports), (1, 0));
    let bp_atb = find(VesselType::Atb, "BP Cherry Point Refinery");
    assert_eq!((bp_atb.imports, bp_atb.exports, bp_atb.combined), (0, 1, 1));
    let tesoro = find(VesselType::Barge, "Tesoro Vancouver Terminal");
    assert_eq!((tesoro.imports, tesoro.exports), (1, 0));
    assert_eq!(tesoro.region, Region::ColumbiaRiver);
    let marathon = find(VesselType::Tanker, "Marathon Anacortes Refinery (formerly Tesoro)");
    assert_eq!(marathon.combined, 0);
}

#[test]
fn test_facility_known_by_ecy_name_is_counted_and_selected() {
    logging::init_test();
    let dir = tempfile::tempdir().unwrap();
    let facilities = test_helpers::write(
        dir.path(),
        "facilities.csv",
        "FacilityName,FacilityECYName,DockLatNumber\n\
         Maxum Petroleum - Harbor Island Terminal,Maxum (Rainer Petroleum),47.58\n",
    );
    let transfers = test_helpers::write(
        dir.path(),
        "transfers.csv",
        "AntID,StartDateTime,Deliverer,Receiver,Product,TransferQtyInGallon,TransferType,DelivererTypeDescription,ReceiverTypeDescription\n\
         M1,2018-02-01 08:00:00,POLAR ENDEAVOUR,Maxum (Rainer Petroleum),ALASKA NORTH SLOPE CRUDE,10,Cargo,TANK SHIP,FACILITY\n",
    );
    let registry = FacilityRegistry::load(&facilities, None).unwrap();
    let table =
        TransferTable::load(&transfers, None, &registry, TransferLoadOptions::default()).unwrap();

    let counts = transfer_counts_by_facility(table.records(), &registry, table.aliases());
    let tanker = counts.iter().find(|c| c.vessel == VesselType::Tanker).unwrap();
    assert_eq!(tanker.location, "Maxum Petroleum - Harbor Island Terminal");
    assert_eq!((tanker.imports, tanker.exports), (1, 0));

    let scope = FacilityScope::from_arg("selected", &registry, table.aliases()).unwrap();
    let tally = quantity_by_region(table.records(), TransferCategory::Cargo, &scope);
    assert_relative_eq!(tally.total(VesselType::Tanker, Direction::Import), 10.0);
    assert_relative_eq!(
        tally.get(VesselType::Tanker, Direction::Import, OilType::Ans, Region::PugetSound),
        10.0
    );
}

#[test]
fn test_two_way_split_of_barge_transfers() {
    let (_dir, _, table) = load();
    let query = TransferQuery::new(VesselType::Barge, TransferCategory::CargoFuel, FacilityScope::All);
    let selected = query.select(table.records(), Direction::Combined);
    assert_eq!(selected.len(), 2);

    let (one_way, two_way) = split_two_way(&selected);
    assert!(one_way.is_empty());
    let ids: Vec<&str> = two_way.iter().map(|r| r.ant_id.as_str()).collect();
    assert_eq!(ids, vec!["V4", "V5"]);
}

#[test]
fn test_atb_legs_through_different_terminals_are_one_way() {
    let (_dir, _, table) = load();
    let query = TransferQuery::new(VesselType::Atb, TransferCategory::Cargo, FacilityScope::All);
    let (one_way, two_way) = split_two_way(&query.select(table.records(), Direction::Combined));
    assert_eq!(one_way.len(), 2);
    assert!(two_way.is_empty());
    // time order restored after the import-then-export selection
    assert_eq!(one_way[0].ant_id, "V2");
}

#[test]
fn test_voyage_transfers_in_liters() {
    let (_dir, _, table) = load();
    let voyages = cargo_transfers_by_vessel(
        table.records(),
        &VesselMatch::Names(vec!["POLAR ENDEAVOUR".to_string()]),
    );
    assert_eq!(voyages.len(), 2);
    assert_eq!(voyages[0].ant_id, "V1");
    assert_relative_eq!(voyages[0].liters, 1_000_000.0 * GALLONS_TO_LITERS);
    assert_eq!(voyages[1].deliverer, "Private Dock");
}

#[test]
fn test_consolidated_terminals_option() {
    logging::init_test();
    let dir = test_helpers::analysis_dir();
    test_helpers::write(
        dir.path(),
        "nustar.csv",
        "\
AntID,StartDateTime,Deliverer,Receiver,Product,TransferQtyInGallon,TransferType,DelivererTypeDescription,ReceiverTypeDescription
N1,2018-03-01 00:00:00,Nustar Energy Tacoma,ATB 100,DIESEL,10,Cargo,FACILITY,TANK BARGE
",
    );
    let registry = FacilityRegistry::load(&dir.path().join("facilities.csv"), None).unwrap();
    let mut options = oil_tracekit::transfers::TransferLoadOptions::default();

    let plain = TransferTable::load(&dir.path().join("nustar.csv"), None, &registry, options).unwrap();
    assert_eq!(plain.records()[0].deliverer, "Nustar Energy Tacoma");

    options.consolidate_terminals = true;
    let folded = TransferTable::load(&dir.path().join("nustar.csv"), None, &registry, options).unwrap();
    assert_eq!(folded.records()[0].deliverer, "Phillips 66 Tacoma Terminal");
}

#[test]
fn test_negative_quantity_is_rejected() {
    let dir = test_helpers::analysis_dir();
    test_helpers::write(
        dir.path(),
        "bad.csv",
        "\
AntID,StartDateTime,Deliverer,Receiver,Product,TransferQtyInGallon,TransferType,DelivererTypeDescription,ReceiverTypeDescription
B1,2018-03-01 00:00:00,A,B,DIESEL,-10,Cargo,FACILITY,TANK SHIP
",
    );
    let registry = FacilityRegistry::default();
    let result = TransferTable::load(
        &dir.path().join("bad.csv"),
        None,
        &registry,
        Default::default(),
    );
    assert!(matches!(result, Err(TraceError::InvalidData(_))));
}

#[test]
fn test_missing_transfer_column_is_reported() {
    let dir = test_helpers::analysis_dir();
    test_helpers::write(dir.path(), "short.csv", "AntID,Deliverer\nX,Y\n");
    let result = TransferTable::load(
        &dir.path().join("short.csv"),
        None,
        &FacilityRegistry::default(),
        Default::default(),
    );
    assert!(matches!(result, Err(TraceError::MissingColumn(_))));
}

#[test]
fn test_weights_derived_from_history_are_sampleable() {
    let (dir, _, table) = load();
    let source = dir.path().join("transfers.csv");
    let weights = transfer_weights(
        table.records(),
        "BP Cherry Point Refinery",
        VesselType::Atb,
        &source,
        9,
    )
    .unwrap();
    assert_eq!(unit_sum(&weights.weights(), 9), 1_000_000_000);
    assert_eq!(weights.context().vessel, "atb");

    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let draw = sample_oil_type(&weights, &mut rng).unwrap();
    assert_eq!(draw.as_deref(), Some("diesel"));

    // no barge cargo at BP: nothing to attribute
    let idle = transfer_weights(
        table.records(),
        "BP Cherry Point Refinery",
        VesselType::Barge,
        &source,
        9,
    )
    .unwrap();
    assert_eq!(sample_oil_type(&idle, &mut rng).unwrap(), None);
}
