//! Derived numbers handed to the presentation layer.

use std::collections::BTreeSet;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregation::{Direction, TradeFlows};
use crate::error::Result;
use crate::schema::{country, output, trade};

/// Percentage change from `previous` to `current`; 0 when there is no baseline.
pub fn yoy_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

pub fn trade_balance(exports_total: f64, imports_total: f64) -> f64 {
    exports_total - imports_total
}

/// Distinct importers of `exports` together with distinct exporters of `imports`.
///
/// Callers pass frames already restricted to the year of interest.
pub fn trading_partner_count(exports: &DataFrame, imports: &DataFrame) -> Result<usize> {
    let mut partners = BTreeSet::new();
    for (df, direction) in [(exports, Direction::Exports), (imports, Direction::Imports)] {
        partners.extend(
            df.column(direction.partner_column())?
                .str()?
                .into_iter()
                .flatten(),
        );
    }
    Ok(partners.len())
}

/// Per-partner exports, imports and net position.
///
/// Partners are keyed by `(name, iso3)`; iso3 comes from `countries` and is
/// null for partners without metadata. A partner seen on one side only gets
/// 0 on the other.
pub fn net_trade_by_partner(
    exports: &DataFrame,
    imports: &DataFrame,
    countries: &DataFrame,
) -> Result<DataFrame> {
    let iso3 = countries
        .clone()
        .lazy()
        .select([col(country::NAME), col(country::ISO3)]);

    let side = |df: &DataFrame, direction: Direction| {
        df.clone()
            .lazy()
            .select([
                col(direction.partner_column()).alias(output::PARTNER),
                col(trade::QUANTITY),
            ])
            .group_by_stable([col(output::PARTNER)])
            .agg([col(trade::QUANTITY).sum().alias(direction.as_str())])
            .join(
                iso3.clone(),
                [col(output::PARTNER)],
                [col(country::NAME)],
                JoinArgs::new(JoinType::Left),
            )
            .with_column(col(country::ISO3).fill_null(lit("")))
    };

    let keys = [col(output::PARTNER), col(country::ISO3)];
    let df = side(exports, Direction::Exports)
        .join(
            side(imports, Direction::Imports),
            keys.clone(),
            keys,
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .with_columns([
            col(output::EXPORTS).fill_null(lit(0.0)),
            col(output::IMPORTS).fill_null(lit(0.0)),
        ])
        .with_columns([
            (col(output::EXPORTS) - col(output::IMPORTS)).alias(output::NET),
            when(col(country::ISO3).eq(lit("")))
                .then(lit(NULL).cast(DataType::String))
                .otherwise(col(country::ISO3))
                .alias(country::ISO3),
        ])
        .select([
            col(output::PARTNER),
            col(country::ISO3),
            col(output::EXPORTS),
            col(output::IMPORTS),
            col(output::NET),
        ])
        .sort(
            [output::NET],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .collect()?;
    Ok(df)
}

/// Headline numbers for a selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    /// Tons over the whole selected year range.
    pub total_exports: f64,
    pub total_imports: f64,
    pub trade_balance: f64,
    /// Partners in the most recent year of the flows.
    pub trading_partners: usize,
    pub latest_year: Option<i64>,
    /// Latest year against the year before it.
    pub exports_yoy: f64,
    pub imports_yoy: f64,
}

impl KeyMetrics {
    pub fn compute(flows: &TradeFlows) -> Result<Self> {
        let total_exports = flows.total(Direction::Exports)?;
        let total_imports = flows.total(Direction::Imports)?;
        let latest_year = flows.latest_year()?;

        let (trading_partners, exports_yoy, imports_yoy) = match latest_year {
            Some(year) => {
                let partners = trading_partner_count(
                    &flows.year_slice(Direction::Exports, year)?,
                    &flows.year_slice(Direction::Imports, year)?,
                )?;
                let yoy = |direction| -> Result<f64> {
                    Ok(yoy_change(
                        flows.total_in_year(direction, year)?,
                        flows.total_in_year(direction, year - 1)?,
                    ))
                };
                (partners, yoy(Direction::Exports)?, yoy(Direction::Imports)?)
            }
            None => (0, 0.0, 0.0),
        };

        Ok(Self {
            total_exports,
            total_imports,
            trade_balance: trade_balance(total_exports, total_imports),
            trading_partners,
            latest_year,
            exports_yoy,
            imports_yoy,
        })
    }
}
