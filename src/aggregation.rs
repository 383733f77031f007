//! Filtering trade records down to a selection and rolling them up.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProductTaxonomy;
use crate::error::Result;
use crate::geo::GeoHierarchy;
use crate::reference::{distinct_years, TradeTable};
use crate::schema::{label, output, trade};
use crate::selection::Selection;

/// Partners shown in ranking views. Fixed so charts stay legible.
pub const TOP_PARTNER_LIMIT: IdxSize = 20;

/// Trade direction seen from the selected countries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The selection is the exporter.
    Exports,
    /// The selection is the importer.
    Imports,
}

impl Direction {
    /// Column holding the selected side.
    pub fn reporter_column(self) -> &'static str {
        match self {
            Self::Exports => trade::EXPORTER_NAME,
            Self::Imports => trade::IMPORTER_NAME,
        }
    }

    /// Column holding the counterparty.
    pub fn partner_column(self) -> &'static str {
        match self {
            Self::Exports => trade::IMPORTER_NAME,
            Self::Imports => trade::EXPORTER_NAME,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exports => output::EXPORTS,
            Self::Imports => output::IMPORTS,
        }
    }
}

/// Restrict trade rows to the selected products and year window.
pub fn filter_trades(trades: &DataFrame, selection: &Selection) -> LazyFrame {
    let codes = string_series("product_codes", selection.product_codes());
    let years = selection.years();
    trades.clone().lazy().filter(
        col(trade::PRODUCT)
            .is_in(lit(codes).implode(), false)
            .and(col(trade::YEAR).gt_eq(lit(years.min())))
            .and(col(trade::YEAR).lt_eq(lit(years.max()))),
    )
}

fn string_series<'a>(name: &str, values: impl IntoIterator<Item = &'a String>) -> Series {
    let values: Vec<&str> = values.into_iter().map(String::as_str).collect();
    Series::new(name.into(), values)
}

// ── Aggregator ──────────────────────────────────────────────────────────────

/// Splits filtered trade into export and import flows for a selection.
pub struct TradeAggregator<'a> {
    geo: &'a GeoHierarchy,
    labels: Arc<HashMap<String, String>>,
}

impl<'a> TradeAggregator<'a> {
    pub fn new(geo: &'a GeoHierarchy, taxonomy: &ProductTaxonomy) -> Self {
        let labels = taxonomy
            .products()
            .filter_map(|(_, p)| taxonomy.label(&p.code).map(|l| (p.code.clone(), l)))
            .collect();
        Self {
            geo,
            labels: Arc::new(labels),
        }
    }

    /// Resolve the geographic selection and split the filtered records.
    ///
    /// A record whose exporter and importer are both selected lands in both
    /// flows.
    pub fn aggregate(&self, trades: &TradeTable, selection: &Selection) -> Result<TradeFlows> {
        let countries = self.geo.resolve_selection(selection.geo());
        let filtered = filter_trades(trades.frame(), selection);
        let members = string_series("countries", &countries);

        let exports = filtered
            .clone()
            .filter(
                col(Direction::Exports.reporter_column())
                    .is_in(lit(members.clone()).implode(), false),
            )
            .collect()?;
        let imports = filtered
            .filter(
                col(Direction::Imports.reporter_column()).is_in(lit(members).implode(), false),
            )
            .collect()?;

        debug!(
            countries = countries.len(),
            exports = exports.height(),
            imports = imports.height(),
            "aggregated trade flows"
        );

        Ok(TradeFlows {
            exports,
            imports,
            countries,
            labels: Arc::clone(&self.labels),
        })
    }
}

// ── Flows ───────────────────────────────────────────────────────────────────

/// Export and import subsets for one selection, plus the views built on them.
#[derive(Debug, Clone)]
pub struct TradeFlows {
    exports: DataFrame,
    imports: DataFrame,
    countries: BTreeSet<String>,
    labels: Arc<HashMap<String, String>>,
}

impl TradeFlows {
    pub fn exports(&self) -> &DataFrame {
        &self.exports
    }

    pub fn imports(&self) -> &DataFrame {
        &self.imports
    }

    pub fn flow(&self, direction: Direction) -> &DataFrame {
        match direction {
            Direction::Exports => &self.exports,
            Direction::Imports => &self.imports,
        }
    }

    /// Countries the geographic selection resolved to.
    pub fn countries(&self) -> &BTreeSet<String> {
        &self.countries
    }

    pub fn is_empty(&self) -> bool {
        self.exports.height() == 0 && self.imports.height() == 0
    }

    /// Total tons in one direction; rows without a quantity do not count.
    pub fn total(&self, direction: Direction) -> Result<f64> {
        sum_quantity(self.flow(direction))
    }

    /// Tons in one direction for a single year.
    pub fn total_in_year(&self, direction: Direction, year: i64) -> Result<f64> {
        sum_quantity(&self.year_slice(direction, year)?)
    }

    /// Rows of one direction for a single year.
    pub fn year_slice(&self, direction: Direction, year: i64) -> Result<DataFrame> {
        Ok(self
            .flow(direction)
            .clone()
            .lazy()
            .filter(col(trade::YEAR).eq(lit(year)))
            .collect()?)
    }

    pub fn available_years(&self, direction: Direction) -> Result<Vec<i64>> {
        distinct_years(self.flow(direction))
    }

    /// Most recent year present in either direction.
    pub fn latest_year(&self) -> Result<Option<i64>> {
        let exports = self.exports.column(trade::YEAR)?.i64()?.max();
        let imports = self.imports.column(trade::YEAR)?.i64()?.max();
        Ok(exports.max(imports))
    }

    /// `(year, category, product, product_label, quantity)` by year.
    pub fn time_series(&self, direction: Direction) -> Result<DataFrame> {
        let mut df = self
            .flow(direction)
            .clone()
            .lazy()
            .group_by_stable([col(trade::YEAR), col(trade::CATEGORY), col(trade::PRODUCT)])
            .agg([col(trade::QUANTITY).sum()])
            .sort(
                [trade::YEAR],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .collect()?;
        self.attach_labels(&mut df)?;
        Ok(df.select([
            trade::YEAR,
            trade::CATEGORY,
            trade::PRODUCT,
            output::PRODUCT_LABEL,
            trade::QUANTITY,
        ])?)
    }

    /// `(year, quantity)` ascending by year.
    pub fn yearly_totals(&self, direction: Direction) -> Result<DataFrame> {
        Ok(self
            .flow(direction)
            .clone()
            .lazy()
            .group_by([col(trade::YEAR)])
            .agg([col(trade::QUANTITY).sum()])
            .sort([trade::YEAR], SortMultipleOptions::default())
            .collect()?)
    }

    /// Every partner's total for `year`, largest first; ties keep first-seen order.
    pub fn partner_totals(&self, direction: Direction, year: i64) -> Result<DataFrame> {
        Ok(self.partner_ranking(direction, year).collect()?)
    }

    /// The [`TOP_PARTNER_LIMIT`] largest partners for `year`.
    pub fn top_partners(&self, direction: Direction, year: i64) -> Result<DataFrame> {
        Ok(self
            .partner_ranking(direction, year)
            .limit(TOP_PARTNER_LIMIT)
            .collect()?)
    }

    /// Per-product tons for the top partners, in partner rank order, then
    /// quantity descending, then product code.
    pub fn top_partner_breakdown(&self, direction: Direction, year: i64) -> Result<DataFrame> {
        let ranks = self
            .top_partners(direction, year)?
            .lazy()
            .select([col(output::PARTNER)])
            .with_row_index(output::RANK, None);

        let mut df = self
            .partner_rows(direction, year)
            .group_by_stable([col(output::PARTNER), col(trade::PRODUCT)])
            .agg([col(trade::QUANTITY).sum()])
            .join(
                ranks,
                [col(output::PARTNER)],
                [col(output::PARTNER)],
                JoinArgs::new(JoinType::Inner),
            )
            .sort(
                [output::RANK, trade::QUANTITY, trade::PRODUCT],
                SortMultipleOptions::default()
                    .with_order_descending_multi([false, true, false])
                    .with_maintain_order(true),
            )
            .collect()?;
        self.attach_labels(&mut df)?;
        Ok(df.select([
            output::PARTNER,
            trade::PRODUCT,
            output::PRODUCT_LABEL,
            trade::QUANTITY,
        ])?)
    }

    /// Exports and imports per (year, category), missing side as 0.
    pub fn category_balance(&self) -> Result<DataFrame> {
        let side = |df: &DataFrame, alias: &str| {
            df.clone()
                .lazy()
                .with_column(col(trade::CATEGORY).fill_null(lit(label::UNCATEGORIZED)))
                .group_by_stable([col(trade::YEAR), col(trade::CATEGORY)])
                .agg([col(trade::QUANTITY).sum().alias(alias)])
        };

        Ok(side(&self.exports, output::EXPORTS)
            .join(
                side(&self.imports, output::IMPORTS),
                [col(trade::YEAR), col(trade::CATEGORY)],
                [col(trade::YEAR), col(trade::CATEGORY)],
                JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
            )
            .with_columns([
                col(output::EXPORTS).fill_null(lit(0.0)),
                col(output::IMPORTS).fill_null(lit(0.0)),
            ])
            .sort(
                [trade::YEAR],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .collect()?)
    }

    fn partner_rows(&self, direction: Direction, year: i64) -> LazyFrame {
        self.flow(direction)
            .clone()
            .lazy()
            .filter(col(trade::YEAR).eq(lit(year)))
            .with_column(col(direction.partner_column()).alias(output::PARTNER))
    }

    fn partner_ranking(&self, direction: Direction, year: i64) -> LazyFrame {
        self.partner_rows(direction, year)
            .group_by_stable([col(output::PARTNER)])
            .agg([col(trade::QUANTITY).sum()])
            .sort(
                [trade::QUANTITY],
                SortMultipleOptions::default()
                    .with_order_descending(true)
                    .with_maintain_order(true),
            )
    }

    /// Add `product_label`; codes outside the taxonomy are labelled by code.
    fn attach_labels(&self, df: &mut DataFrame) -> Result<()> {
        let labels: StringChunked = df
            .column(trade::PRODUCT)?
            .str()?
            .into_iter()
            .map(|code| {
                code.map(|c| self.labels.get(c).map(String::as_str).unwrap_or(c))
            })
            .collect();
        df.with_column(labels.with_name(output::PRODUCT_LABEL.into()).into_series())?;
        Ok(())
    }
}

fn sum_quantity(df: &DataFrame) -> Result<f64> {
    Ok(df.column(trade::QUANTITY)?.f64()?.sum().unwrap_or(0.0))
}
