pub mod aggregation;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod geo;
pub mod metrics;
pub mod reference;
pub mod schema;
pub mod selection;

#[cfg(feature = "python")]
mod python;

pub use aggregation::{Direction, TradeAggregator, TradeFlows, TOP_PARTNER_LIMIT};
pub use cache::ReferenceCache;
pub use classifier::CategoryClassifier;
pub use config::{Category, DashboardConfig, Product, ProductTaxonomy};
pub use dashboard::Dashboard;
pub use error::{Result, TradeError};
pub use geo::GeoHierarchy;
pub use metrics::KeyMetrics;
pub use reference::{
    load_country_data, load_trade_data, CountryMeta, CountryTable, TradeRecord, TradeTable,
};
pub use selection::{GeoFilter, Selection, YearRange};

#[cfg(feature = "python")]
use pyo3::prelude::*;
#[cfg(feature = "python")]
use pyo3::types::PyModule;

/// Export schema constants as Python submodules
#[cfg(feature = "python")]
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Trade
    let trade = PyModule::new(m.py(), "trade")?;
    trade.add("YEAR", schema::trade::YEAR)?;
    trade.add("EXPORTER", schema::trade::EXPORTER)?;
    trade.add("IMPORTER", schema::trade::IMPORTER)?;
    trade.add("EXPORTER_NAME", schema::trade::EXPORTER_NAME)?;
    trade.add("IMPORTER_NAME", schema::trade::IMPORTER_NAME)?;
    trade.add("PRODUCT", schema::trade::PRODUCT)?;
    trade.add("QUANTITY", schema::trade::QUANTITY)?;
    trade.add("VALUE", schema::trade::VALUE)?;
    trade.add("CATEGORY", schema::trade::CATEGORY)?;
    m.add_submodule(&trade)?;

    // Country
    let country = PyModule::new(m.py(), "country")?;
    country.add("NAME", schema::country::NAME)?;
    country.add("REGION", schema::country::REGION)?;
    country.add("SUBREGION", schema::country::SUBREGION)?;
    country.add(
        "INTERMEDIATE_REGION",
        schema::country::INTERMEDIATE_REGION,
    )?;
    country.add("ISO3", schema::country::ISO3)?;
    m.add_submodule(&country)?;

    // Output
    let output = PyModule::new(m.py(), "output")?;
    output.add("PARTNER", schema::output::PARTNER)?;
    output.add("PRODUCT_LABEL", schema::output::PRODUCT_LABEL)?;
    output.add("EXPORTS", schema::output::EXPORTS)?;
    output.add("IMPORTS", schema::output::IMPORTS)?;
    output.add("NET", schema::output::NET)?;
    output.add("RANK", schema::output::RANK)?;
    m.add_submodule(&output)?;

    // Direction
    let direction = PyModule::new(m.py(), "direction")?;
    direction.add("EXPORTS", Direction::Exports.as_str())?;
    direction.add("IMPORTS", Direction::Imports.as_str())?;
    m.add_submodule(&direction)?;

    m.add("UNCATEGORIZED", schema::label::UNCATEGORIZED)?;
    m.add("TOP_PARTNER_LIMIT", TOP_PARTNER_LIMIT)?;
    Ok(())
}

#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyTradeDashboard>()?;
    m.add_class::<python::PyTradeFlows>()?;
    add_schema_exports(m)?;
    Ok(())
}
