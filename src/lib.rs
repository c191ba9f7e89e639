//! Oil-type attribution and spill aggregation for vessel transfer Monte Carlo
//! studies.

pub mod aggregation;
pub mod attribution;
pub mod binning;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod mass_balance;
pub mod precision;
pub mod region;
pub mod sampler;
pub mod schema;
pub mod spills;
pub mod taxonomy;
pub mod transfers;

#[cfg(feature = "python")]
mod model;

pub use error::{Result, TraceError};

#[cfg(feature = "python")]
mod python {
    use pyo3::prelude::*;
    use pyo3::types::PyModule;

    use crate::model::OilAnalysis;
    use crate::schema;

    /// Export schema constants as Python submodules
    fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
        // Facility
        let facility = PyModule::new(m.py(), "facility")?;
        facility.add("FACILITY_NAME", schema::facility::FACILITY_NAME)?;
        facility.add("FACILITY_ECY_NAME", schema::facility::FACILITY_ECY_NAME)?;
        facility.add("DOCK_LAT", schema::facility::DOCK_LAT)?;
        facility.add("REGION", schema::facility::REGION)?;
        m.add_submodule(&facility)?;

        // Transfer
        let transfer = PyModule::new(m.py(), "transfer")?;
        transfer.add("ANT_ID", schema::transfer::ANT_ID)?;
        transfer.add("START_DATE_TIME", schema::transfer::START_DATE_TIME)?;
        transfer.add("DELIVERER", schema::transfer::DELIVERER)?;
        transfer.add("RECEIVER", schema::transfer::RECEIVER)?;
        transfer.add("PRODUCT", schema::transfer::PRODUCT)?;
        transfer.add("QUANTITY_GALLONS", schema::transfer::QUANTITY_GALLONS)?;
        transfer.add("TRANSFER_TYPE", schema::transfer::TRANSFER_TYPE)?;
        transfer.add("DELIVERER_TYPE", schema::transfer::DELIVERER_TYPE)?;
        transfer.add("RECEIVER_TYPE", schema::transfer::RECEIVER_TYPE)?;
        transfer.add("IMPORT_REGION", schema::transfer::IMPORT_REGION)?;
        transfer.add("EXPORT_REGION", schema::transfer::EXPORT_REGION)?;
        m.add_submodule(&transfer)?;

        // Spill
        let spill = PyModule::new(m.py(), "spill")?;
        spill.add("LAGRANGIAN_TEMPLATE", schema::spill::LAGRANGIAN_TEMPLATE)?;
        spill.add("VESSEL_TYPE", schema::spill::VESSEL_TYPE)?;
        spill.add("FUEL_CARGO", schema::spill::FUEL_CARGO)?;
        spill.add("VESSEL_ORIGIN", schema::spill::VESSEL_ORIGIN)?;
        spill.add("VESSEL_DEST", schema::spill::VESSEL_DEST)?;
        spill.add("CARGO_CAPACITY", schema::spill::CARGO_CAPACITY)?;
        spill.add("SPILL_LAT", schema::spill::SPILL_LAT)?;
        spill.add("OIL_TYPE", schema::spill::OIL_TYPE)?;
        spill.add("SPILL_REGION", schema::spill::SPILL_REGION)?;
        m.add_submodule(&spill)?;

        // Mass balance
        let mass_balance = PyModule::new(m.py(), "mass_balance")?;
        mass_balance.add("VOL_OIL_BEACHED", schema::mass_balance::VOL_OIL_BEACHED)?;
        mass_balance.add("DENSITY", schema::mass_balance::DENSITY)?;
        mass_balance.add("V_WATER_CONTENT", schema::mass_balance::V_WATER_CONTENT)?;
        mass_balance.add("M_WATER_CONTENT", schema::mass_balance::M_WATER_CONTENT)?;
        mass_balance.add("M_EVAPORATED", schema::mass_balance::M_EVAPORATED)?;
        mass_balance.add("M_DISPERSED", schema::mass_balance::M_DISPERSED)?;
        mass_balance.add("M_DISSOLVED", schema::mass_balance::M_DISSOLVED)?;
        mass_balance.add("M_BIO", schema::mass_balance::M_BIO)?;
        mass_balance.add("MASS_OIL", schema::mass_balance::MASS_OIL)?;
        m.add_submodule(&mass_balance)?;

        // Output
        let output = PyModule::new(m.py(), "output")?;
        output.add("VESSEL_TYPE", schema::output::VESSEL_TYPE)?;
        output.add("DIRECTION", schema::output::DIRECTION)?;
        output.add("OIL_TYPE", schema::output::OIL_TYPE)?;
        output.add("REGION", schema::output::REGION)?;
        output.add("QUANTITY", schema::output::QUANTITY)?;
        output.add("LOCATION", schema::output::LOCATION)?;
        output.add("IMPORTS", schema::output::IMPORTS)?;
        output.add("EXPORTS", schema::output::EXPORTS)?;
        output.add("COMBINED", schema::output::COMBINED)?;
        output.add("RUN_ID", schema::output::RUN_ID)?;
        output.add("M_INITIAL", schema::output::M_INITIAL)?;
        output.add("M_BEACHED", schema::output::M_BEACHED)?;
        output.add("MASS_LOST", schema::output::MASS_LOST)?;
        m.add_submodule(&output)?;

        Ok(())
    }

    #[pymodule]
    fn oil_tracekit(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_class::<OilAnalysis>()?;
        add_schema_exports(m)?;
        Ok(())
    }
}
