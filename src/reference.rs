//! Reference data: the trade table and the country metadata table.
//!
//! Both are read from CSV with every column as a string and then cast to an
//! explicit typed schema, so malformed sources fail here rather than at some
//! later aggregation step.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::CategoryClassifier;
use crate::error::{Result, TradeError};
use crate::schema::{country, trade};
use crate::selection::YearRange;

/// Double-encoded UTF-8 rendering of "Türkiye" present in the source data.
const MOJIBAKE_TURKIYE: &str = "TÃ¼rkiye";
const TURKIYE: &str = "Türkiye";

const PRODUCT_CODE_LEN: usize = 6;

// ── Typed rows ──────────────────────────────────────────────────────────────

/// One bilateral trade flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub year: i64,
    pub exporter_code: i64,
    pub importer_code: i64,
    pub exporter_name: String,
    pub importer_name: String,
    /// Always 6 ASCII digits once loaded.
    pub product_code: String,
    /// Tons; missing in some source rows.
    pub quantity: Option<f64>,
    pub value: f64,
    /// Derived from the taxonomy at load time.
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryMeta {
    pub name: String,
    pub region: String,
    pub subregion: Option<String>,
    pub intermediate_region: Option<String>,
    pub iso3: String,
}

// ── Product codes and names ─────────────────────────────────────────────────

/// Left-pad a product code with zeros to 6 characters.
///
/// Already padded codes come back unchanged; `"7801.0"` style float
/// renderings are reduced to their integer part first.
pub fn pad_product_code(code: &str) -> String {
    let code = code.trim();
    let code = match code.split_once('.') {
        Some((int, frac)) if !int.is_empty() && frac.chars().all(|c| c == '0') => int,
        _ => code,
    };
    format!("{code:0>width$}", width = PRODUCT_CODE_LEN)
}

pub fn is_product_code(code: &str) -> bool {
    code.len() == PRODUCT_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

/// Padded code, or `None` when the input cannot be a product code.
pub fn normalize_product_code(code: &str) -> Option<String> {
    let padded = pad_product_code(code);
    is_product_code(&padded).then_some(padded)
}

/// Repair known double-encoding corruption in country names.
pub fn repair_encoding(name: &str) -> Cow<'_, str> {
    if name.contains(MOJIBAKE_TURKIYE) {
        Cow::Owned(name.replace(MOJIBAKE_TURKIYE, TURKIYE))
    } else {
        Cow::Borrowed(name)
    }
}

// ── Trade table ─────────────────────────────────────────────────────────────

/// Immutable, normalised trade records with a derived `category` column.
#[derive(Debug, Clone)]
pub struct TradeTable {
    frame: DataFrame,
    /// Fingerprint of the classifier that produced `category`.
    classified_by: u64,
}

impl TradeTable {
    /// Normalise a raw frame (any column dtypes) into the typed trade schema.
    ///
    /// Steps: cast numeric columns, repair country names, pad product codes,
    /// tag categories. Extra columns survive in source order.
    pub fn from_frame(raw: DataFrame, classifier: &CategoryClassifier) -> Result<Self> {
        require_columns(&raw, &trade::REQUIRED)?;

        let mut df = raw
            .clone()
            .lazy()
            .with_columns([
                parse_numeric(trade::YEAR, DataType::Int64),
                parse_numeric(trade::EXPORTER, DataType::Int64),
                parse_numeric(trade::IMPORTER, DataType::Int64),
                parse_numeric(trade::QUANTITY, DataType::Float64),
                parse_numeric(trade::VALUE, DataType::Float64),
                col(trade::EXPORTER_NAME).cast(DataType::String),
                col(trade::IMPORTER_NAME).cast(DataType::String),
                col(trade::PRODUCT).cast(DataType::String),
            ])
            .collect()?;

        for column in [
            trade::YEAR,
            trade::EXPORTER,
            trade::IMPORTER,
            trade::QUANTITY,
            trade::VALUE,
        ] {
            let bad = count_unparsed(&raw, &df, column)?;
            if bad > 0 {
                return Err(TradeError::InvalidData(format!(
                    "Column '{column}' has {bad} values that are not numbers"
                )));
            }
        }

        for column in [trade::YEAR, trade::VALUE] {
            let null_count = df.column(column)?.null_count();
            if null_count > 0 {
                return Err(TradeError::InvalidData(format!(
                    "Column '{column}' has {null_count} missing values"
                )));
            }
        }

        for column in [trade::QUANTITY, trade::VALUE] {
            let negative = df
                .column(column)?
                .f64()?
                .into_iter()
                .flatten()
                .filter(|v| *v < 0.0)
                .count();
            if negative > 0 {
                return Err(TradeError::InvalidData(format!(
                    "Column '{column}' has {negative} negative values"
                )));
            }
        }

        for column in [trade::EXPORTER_NAME, trade::IMPORTER_NAME] {
            let repaired: StringChunked = df
                .column(column)?
                .str()?
                .into_iter()
                .map(|name| name.map(repair_encoding))
                .collect();
            df.with_column(repaired.with_name(column.into()).into_series())?;
        }

        let padded = {
            let products = df.column(trade::PRODUCT)?.str()?;
            let mut codes = Vec::with_capacity(products.len());
            for (row, code) in products.into_iter().enumerate() {
                let code = code.ok_or_else(|| {
                    TradeError::InvalidData(format!("Null product code at row {row}"))
                })?;
                let normalized = normalize_product_code(code).ok_or_else(|| {
                    TradeError::InvalidData(format!(
                        "Product code '{code}' at row {row} is not a 6-digit code"
                    ))
                })?;
                codes.push(normalized);
            }
            Series::new(trade::PRODUCT.into(), codes)
        };
        df.with_column(padded)?;

        Self::classified(df, classifier)
    }

    fn classified(mut df: DataFrame, classifier: &CategoryClassifier) -> Result<Self> {
        classifier.tag_frame(&mut df, trade::PRODUCT, trade::CATEGORY)?;

        let unclassified = df.column(trade::CATEGORY)?.null_count();
        if unclassified > 0 {
            debug!(rows = unclassified, "trade rows outside the product taxonomy");
        }

        Ok(Self {
            frame: df,
            classified_by: classifier.fingerprint(),
        })
    }

    /// True when `category` was derived with this classifier's mapping.
    pub fn is_classified_by(&self, classifier: &CategoryClassifier) -> bool {
        self.classified_by == classifier.fingerprint()
    }

    /// Same rows with `category` re-derived by `classifier`.
    pub fn reclassified(&self, classifier: &CategoryClassifier) -> Result<Self> {
        Self::classified(self.frame.clone(), classifier)
    }

    /// Build a table from typed rows through the same normalisation as loading.
    ///
    /// Any `category` on the input rows is ignored and re-derived.
    pub fn from_records(records: &[TradeRecord], classifier: &CategoryClassifier) -> Result<Self> {
        let raw = DataFrame::new(vec![
            Column::new(
                trade::YEAR.into(),
                records.iter().map(|r| r.year).collect::<Vec<_>>(),
            ),
            Column::new(
                trade::EXPORTER.into(),
                records.iter().map(|r| r.exporter_code).collect::<Vec<_>>(),
            ),
            Column::new(
                trade::IMPORTER.into(),
                records.iter().map(|r| r.importer_code).collect::<Vec<_>>(),
            ),
            Column::new(
                trade::EXPORTER_NAME.into(),
                records
                    .iter()
                    .map(|r| r.exporter_name.as_str())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                trade::IMPORTER_NAME.into(),
                records
                    .iter()
                    .map(|r| r.importer_name.as_str())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                trade::PRODUCT.into(),
                records
                    .iter()
                    .map(|r| r.product_code.as_str())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                trade::QUANTITY.into(),
                records.iter().map(|r| r.quantity).collect::<Vec<_>>(),
            ),
            Column::new(
                trade::VALUE.into(),
                records.iter().map(|r| r.value).collect::<Vec<_>>(),
            ),
        ])?;
        Self::from_frame(raw, classifier)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Typed view of every row.
    pub fn records(&self) -> Result<Vec<TradeRecord>> {
        records_from_frame(&self.frame)
    }

    /// Distinct years, ascending.
    pub fn available_years(&self) -> Result<Vec<i64>> {
        distinct_years(&self.frame)
    }

    /// `(min, max)` year present in the data.
    pub fn year_span(&self) -> Result<Option<YearRange>> {
        let years = self.frame.column(trade::YEAR)?.i64()?;
        Ok(years.min().zip(years.max()).map(|(a, b)| YearRange::new(a, b)))
    }

    /// Every name that appears as exporter or importer, sorted.
    pub fn partner_names(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for column in [trade::EXPORTER_NAME, trade::IMPORTER_NAME] {
            for name in self.frame.column(column)?.str()?.into_iter().flatten() {
                names.insert(name.to_string());
            }
        }
        Ok(names.into_iter().collect())
    }
}

/// Typed rows from any frame carrying the trade schema (e.g. a filtered flow).
pub fn records_from_frame(df: &DataFrame) -> Result<Vec<TradeRecord>> {
    let years = df.column(trade::YEAR)?.i64()?;
    let exporters = df.column(trade::EXPORTER)?.i64()?;
    let importers = df.column(trade::IMPORTER)?.i64()?;
    let exporter_names = df.column(trade::EXPORTER_NAME)?.str()?;
    let importer_names = df.column(trade::IMPORTER_NAME)?.str()?;
    let products = df.column(trade::PRODUCT)?.str()?;
    let quantities = df.column(trade::QUANTITY)?.f64()?;
    let values = df.column(trade::VALUE)?.f64()?;
    let categories = df.column(trade::CATEGORY)?.str()?;

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        records.push(TradeRecord {
            year: years.get(i).unwrap_or_default(),
            exporter_code: exporters.get(i).unwrap_or_default(),
            importer_code: importers.get(i).unwrap_or_default(),
            exporter_name: exporter_names.get(i).unwrap_or_default().to_string(),
            importer_name: importer_names.get(i).unwrap_or_default().to_string(),
            product_code: products.get(i).unwrap_or_default().to_string(),
            quantity: quantities.get(i),
            value: values.get(i).unwrap_or_default(),
            category: categories.get(i).map(str::to_string),
        });
    }
    Ok(records)
}

pub(crate) fn distinct_years(df: &DataFrame) -> Result<Vec<i64>> {
    let years: BTreeSet<i64> = df.column(trade::YEAR)?.i64()?.into_iter().flatten().collect();
    Ok(years.into_iter().collect())
}

// ── Country table ───────────────────────────────────────────────────────────

/// Country metadata keyed by unique name.
#[derive(Debug, Clone)]
pub struct CountryTable {
    frame: DataFrame,
    countries: Vec<CountryMeta>,
}

impl CountryTable {
    /// Normalise a raw frame into the country schema.
    ///
    /// Text cells are trimmed. Rows without a name are skipped; a missing
    /// region or a duplicate name fails the whole table.
    pub fn from_frame(raw: DataFrame) -> Result<Self> {
        require_columns(&raw, &country::REQUIRED)?;

        let schema = raw.schema();
        let mut casts = vec![
            trimmed_text(country::NAME),
            trimmed_text(country::REGION),
            trimmed_text(country::ISO3),
        ];
        for optional in country::OPTIONAL {
            if schema.contains(optional) {
                casts.push(trimmed_text(optional));
            } else {
                casts.push(lit(NULL).cast(DataType::String).alias(optional));
            }
        }

        let before = raw.height();
        let frame = raw
            .lazy()
            .with_columns(casts)
            .filter(
                col(country::NAME)
                    .is_not_null()
                    .and(col(country::NAME).neq(lit(""))),
            )
            .collect()?;
        if frame.height() < before {
            warn!(
                skipped = before - frame.height(),
                "country rows without a name were skipped"
            );
        }

        let names = frame.column(country::NAME)?.str()?;
        let regions = frame.column(country::REGION)?.str()?;
        let subregions = frame.column(country::SUBREGION)?.str()?;
        let intermediates = frame.column(country::INTERMEDIATE_REGION)?.str()?;
        let iso3s = frame.column(country::ISO3)?.str()?;

        let mut seen = HashSet::new();
        let mut countries = Vec::with_capacity(frame.height());
        for i in 0..frame.height() {
            let name = names.get(i).unwrap_or_default().to_string();
            let region = non_empty(regions.get(i)).ok_or_else(|| {
                TradeError::InvalidData(format!("Country '{name}' has no region"))
            })?;
            let iso3 = non_empty(iso3s.get(i)).ok_or_else(|| {
                TradeError::InvalidData(format!("Country '{name}' has no iso3 code"))
            })?;
            if !seen.insert(name.clone()) {
                return Err(TradeError::InvalidData(format!(
                    "Country '{name}' appears more than once"
                )));
            }
            countries.push(CountryMeta {
                name,
                region,
                subregion: non_empty(subregions.get(i)),
                intermediate_region: non_empty(intermediates.get(i)),
                iso3,
            });
        }

        Ok(Self { frame, countries })
    }

    pub fn from_countries(countries: Vec<CountryMeta>) -> Result<Self> {
        let raw = DataFrame::new(vec![
            Column::new(
                country::NAME.into(),
                countries.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                country::REGION.into(),
                countries.iter().map(|c| c.region.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                country::SUBREGION.into(),
                countries
                    .iter()
                    .map(|c| c.subregion.as_deref())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                country::INTERMEDIATE_REGION.into(),
                countries
                    .iter()
                    .map(|c| c.intermediate_region.as_deref())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                country::ISO3.into(),
                countries.iter().map(|c| c.iso3.as_str()).collect::<Vec<_>>(),
            ),
        ])?;
        Self::from_frame(raw)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn countries(&self) -> &[CountryMeta] {
        &self.countries
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ── Loading ─────────────────────────────────────────────────────────────────

/// Load and normalise the trade CSV.
pub fn load_trade_data(
    path: impl AsRef<Path>,
    classifier: &CategoryClassifier,
) -> Result<TradeTable> {
    let path = path.as_ref();
    let raw = read_csv_as_strings(path).map_err(|e| load_error(path, e))?;
    let table = TradeTable::from_frame(raw, classifier)?;
    info!(path = %path.display(), rows = table.len(), "loaded trade data");
    Ok(table)
}

/// Load and normalise the country metadata CSV.
pub fn load_country_data(path: impl AsRef<Path>) -> Result<CountryTable> {
    let path = path.as_ref();
    let raw = read_csv_as_strings(path).map_err(|e| load_error(path, e))?;
    let table = CountryTable::from_frame(raw)?;
    info!(path = %path.display(), countries = table.len(), "loaded country data");
    Ok(table)
}

pub(crate) fn load_error(path: &Path, err: TradeError) -> TradeError {
    TradeError::Load {
        source_name: path.display().to_string(),
        reason: err.to_string(),
    }
}

// ── Private helpers ─────────────────────────────────────────────────────────

/// Read a CSV file with all columns as String dtype.
/// Trims whitespace from column names.
fn read_csv_as_strings(path: &Path) -> Result<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(TradeError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

fn trimmed_text(column: &str) -> Expr {
    col(column)
        .cast(DataType::String)
        .str()
        .strip_chars(lit(" \t\r\n"))
}

/// Cast any column to `dtype` via its trimmed string form.
fn parse_numeric(column: &str, dtype: DataType) -> Expr {
    trimmed_text(column).cast(dtype)
}

/// Cells that held text before parsing but are null after it.
fn count_unparsed(raw: &DataFrame, parsed: &DataFrame, column: &str) -> Result<usize> {
    let raw = raw.column(column)?.cast(&DataType::String)?;
    let raw = raw.str()?;
    let nulls = parsed.column(column)?.as_materialized_series().is_null();
    let bad = raw
        .into_iter()
        .zip(nulls.into_iter())
        .filter(|(text, is_null)| {
            is_null.unwrap_or(false) && text.is_some_and(|t| !t.trim().is_empty())
        })
        .count();
    Ok(bad)
}
