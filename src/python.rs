//! Python bindings for the presentation layer.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3_polars::PyDataFrame;

use crate::aggregation::{Direction, TradeFlows};
use crate::config::DashboardConfig;
use crate::dashboard::Dashboard;
use crate::export;
use crate::metrics::{self, KeyMetrics};
use crate::selection::{GeoFilter, YearRange};

fn parse_direction(direction: &str) -> PyResult<Direction> {
    match direction {
        "exports" => Ok(Direction::Exports),
        "imports" => Ok(Direction::Imports),
        _ => Err(PyValueError::new_err(format!(
            "Invalid direction: '{}'. Must be 'exports' or 'imports'",
            direction
        ))),
    }
}

#[pyclass(name = "TradeDashboard")]
pub struct PyTradeDashboard {
    inner: Dashboard,
}

#[pymethods]
impl PyTradeDashboard {
    /// Open the dashboard data.
    ///
    /// `config_path` points at a JSON config (defaults apply otherwise);
    /// `base_path` is prepended to both source file names.
    #[new]
    #[pyo3(signature = (base_path=None, config_path=None))]
    fn new(base_path: Option<String>, config_path: Option<String>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => DashboardConfig::from_json_file(path)?,
            None => DashboardConfig::default(),
        };
        let config = match base_path {
            Some(dir) => config.rooted_at(dir),
            None => config,
        };
        Ok(Self {
            inner: Dashboard::open(config)?,
        })
    }

    // ── Hierarchy ───────────────────────────────────────────────────────────

    fn regions(&self) -> Vec<String> {
        self.inner.regions()
    }

    #[pyo3(signature = (region=None))]
    fn subregions(&self, region: Option<&str>) -> Vec<String> {
        self.inner.subregions_for(region)
    }

    #[pyo3(signature = (region=None, subregion=None))]
    fn intermediate_regions(&self, region: Option<&str>, subregion: Option<&str>) -> Vec<String> {
        self.inner.intermediate_regions_for(region, subregion)
    }

    #[pyo3(signature = (region=None, subregion=None, intermediate_region=None))]
    fn countries(
        &self,
        region: Option<&str>,
        subregion: Option<&str>,
        intermediate_region: Option<&str>,
    ) -> Vec<String> {
        self.inner
            .countries_for(region, subregion, intermediate_region)
    }

    fn available_years(&self) -> PyResult<Vec<i64>> {
        Ok(self.inner.trades().available_years()?)
    }

    /// `(code, label, category)` for every taxonomy product, in display order.
    fn products(&self) -> Vec<(String, String, String)> {
        let taxonomy = &self.inner.config().taxonomy;
        taxonomy
            .products()
            .map(|(category, p)| {
                (
                    p.code.clone(),
                    taxonomy.label(&p.code).unwrap_or_else(|| p.code.clone()),
                    category.to_string(),
                )
            })
            .collect()
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    #[pyo3(signature = (
        product_codes,
        year_min=None,
        year_max=None,
        region=None,
        subregion=None,
        intermediate_region=None,
        country=None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn flows(
        &self,
        product_codes: Vec<String>,
        year_min: Option<i64>,
        year_max: Option<i64>,
        region: Option<String>,
        subregion: Option<String>,
        intermediate_region: Option<String>,
        country: Option<String>,
    ) -> PyResult<PyTradeFlows> {
        let span = self.inner.trades().year_span()?;
        let years = match (year_min, year_max, span) {
            (Some(a), Some(b), _) => Some(YearRange::new(a, b)),
            (a, b, Some(span)) => Some(YearRange::new(
                a.unwrap_or(span.min()),
                b.unwrap_or(span.max()),
            )),
            (a, b, None) => a.or(b).map(YearRange::single),
        };
        let geo = GeoFilter {
            region,
            subregion,
            intermediate_region,
            country,
        };
        let selection = self.inner.selection(product_codes, years, geo)?;
        Ok(PyTradeFlows {
            inner: self.inner.flows(&selection)?,
        })
    }

    fn net_trade_by_partner(&self, flows: PyRef<'_, PyTradeFlows>) -> PyResult<PyDataFrame> {
        let df = metrics::net_trade_by_partner(
            flows.inner.exports(),
            flows.inner.imports(),
            self.inner.countries().frame(),
        )?;
        Ok(PyDataFrame(df))
    }

    #[getter]
    fn trades_df(&self) -> PyDataFrame {
        PyDataFrame(self.inner.trades().frame().clone())
    }

    #[getter]
    fn countries_df(&self) -> PyDataFrame {
        PyDataFrame(self.inner.countries().frame().clone())
    }

    /// CSV text of any frame.
    #[staticmethod]
    fn to_csv(df: PyDataFrame) -> PyResult<String> {
        let mut df = df.0;
        Ok(export::to_csv_string(&mut df)?)
    }
}

#[pyclass(name = "TradeFlows")]
pub struct PyTradeFlows {
    inner: TradeFlows,
}

#[pymethods]
impl PyTradeFlows {
    #[getter]
    fn exports(&self) -> PyDataFrame {
        PyDataFrame(self.inner.exports().clone())
    }

    #[getter]
    fn imports(&self) -> PyDataFrame {
        PyDataFrame(self.inner.imports().clone())
    }

    #[getter]
    fn countries(&self) -> Vec<String> {
        self.inner.countries().iter().cloned().collect()
    }

    fn time_series(&self, direction: &str) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.time_series(parse_direction(direction)?)?))
    }

    fn yearly_totals(&self, direction: &str) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.yearly_totals(parse_direction(direction)?)?))
    }

    fn available_years(&self, direction: &str) -> PyResult<Vec<i64>> {
        Ok(self.inner.available_years(parse_direction(direction)?)?)
    }

    fn partner_totals(&self, direction: &str, year: i64) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(
            self.inner.partner_totals(parse_direction(direction)?, year)?,
        ))
    }

    fn top_partners(&self, direction: &str, year: i64) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(
            self.inner.top_partners(parse_direction(direction)?, year)?,
        ))
    }

    fn top_partner_breakdown(&self, direction: &str, year: i64) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(
            self.inner
                .top_partner_breakdown(parse_direction(direction)?, year)?,
        ))
    }

    fn category_balance(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.category_balance()?))
    }

    fn key_metrics<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let m = KeyMetrics::compute(&self.inner)?;
        let dict = PyDict::new(py);
        dict.set_item("total_exports", m.total_exports)?;
        dict.set_item("total_imports", m.total_imports)?;
        dict.set_item("trade_balance", m.trade_balance)?;
        dict.set_item("trading_partners", m.trading_partners)?;
        dict.set_item("latest_year", m.latest_year)?;
        dict.set_item("exports_yoy", m.exports_yoy)?;
        dict.set_item("imports_yoy", m.imports_yoy)?;
        Ok(dict)
    }
}
