use std::collections::BTreeSet;
use std::sync::Arc;

use polars::prelude::DataFrame;
use tracing::debug;

use crate::aggregation::{TradeAggregator, TradeFlows};
use crate::cache::ReferenceCache;
use crate::classifier::CategoryClassifier;
use crate::config::DashboardConfig;
use crate::error::Result;
use crate::geo::GeoHierarchy;
use crate::metrics::{self, KeyMetrics};
use crate::reference::{CountryTable, TradeTable};
use crate::selection::{GeoFilter, Selection, YearRange};

/// Everything one dashboard session needs: config, reference tables and the
/// lookups derived from them. Cheap to clone; the tables are shared.
#[derive(Debug, Clone)]
pub struct Dashboard {
    config: Arc<DashboardConfig>,
    classifier: CategoryClassifier,
    trades: Arc<TradeTable>,
    countries: Arc<CountryTable>,
    geo: GeoHierarchy,
}

impl Dashboard {
    /// Load both sources named by `config` through the process-wide cache.
    pub fn open(config: DashboardConfig) -> Result<Self> {
        config.validate()?;
        let cache = ReferenceCache::shared();
        let classifier = CategoryClassifier::new(&config.taxonomy);
        let trades = cache.trade_data(&config.trade_source, &classifier)?;
        let countries = cache.country_data(&config.country_source)?;
        Ok(Self::assemble(Arc::new(config), classifier, trades, countries))
    }

    /// Build from already loaded tables.
    ///
    /// A trade table categorised under another taxonomy is re-categorised with
    /// this config's.
    pub fn new(
        config: DashboardConfig,
        trades: Arc<TradeTable>,
        countries: Arc<CountryTable>,
    ) -> Result<Self> {
        config.validate()?;
        let classifier = CategoryClassifier::new(&config.taxonomy);
        let trades = if trades.is_classified_by(&classifier) {
            trades
        } else {
            debug!("re-deriving trade categories for this taxonomy");
            Arc::new(trades.reclassified(&classifier)?)
        };
        Ok(Self::assemble(Arc::new(config), classifier, trades, countries))
    }

    fn assemble(
        config: Arc<DashboardConfig>,
        classifier: CategoryClassifier,
        trades: Arc<TradeTable>,
        countries: Arc<CountryTable>,
    ) -> Self {
        let geo = GeoHierarchy::new(&countries);
        Self {
            config,
            classifier,
            trades,
            countries,
            geo,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn classifier(&self) -> &CategoryClassifier {
        &self.classifier
    }

    pub fn trades(&self) -> &TradeTable {
        &self.trades
    }

    pub fn countries(&self) -> &CountryTable {
        &self.countries
    }

    pub fn geo(&self) -> &GeoHierarchy {
        &self.geo
    }

    // ── Hierarchy ───────────────────────────────────────────────────────────

    pub fn regions(&self) -> Vec<String> {
        self.geo.regions()
    }

    pub fn subregions_for(&self, region: Option<&str>) -> Vec<String> {
        self.geo.subregions_for(region)
    }

    pub fn intermediate_regions_for(
        &self,
        region: Option<&str>,
        subregion: Option<&str>,
    ) -> Vec<String> {
        self.geo.intermediate_regions_for(region, subregion)
    }

    pub fn countries_for(
        &self,
        region: Option<&str>,
        subregion: Option<&str>,
        intermediate_region: Option<&str>,
    ) -> Vec<String> {
        self.geo
            .countries_for(region, subregion, intermediate_region)
    }

    pub fn resolve_selection(&self, geo: &GeoFilter) -> BTreeSet<String> {
        self.geo.resolve_selection(geo)
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Selection over the given products; `None` years means the full span.
    pub fn selection<I, S>(
        &self,
        product_codes: I,
        years: Option<YearRange>,
        geo: GeoFilter,
    ) -> Result<Selection>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let years = match years {
            Some(years) => years,
            None => self
                .trades
                .year_span()?
                .unwrap_or_else(|| YearRange::single(0)),
        };
        Ok(Selection::new(product_codes, years, geo, &self.config))
    }

    pub fn flows(&self, selection: &Selection) -> Result<TradeFlows> {
        TradeAggregator::new(&self.geo, &self.config.taxonomy).aggregate(&self.trades, selection)
    }

    pub fn key_metrics(&self, flows: &TradeFlows) -> Result<KeyMetrics> {
        KeyMetrics::compute(flows)
    }

    pub fn net_trade_by_partner(&self, flows: &TradeFlows) -> Result<DataFrame> {
        metrics::net_trade_by_partner(flows.exports(), flows.imports(), self.countries.frame())
    }
}
