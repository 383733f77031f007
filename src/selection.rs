use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::DashboardConfig;
use crate::reference::normalize_product_code;

/// Inclusive `(min, max)` year window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    min: i64,
    max: i64,
}

impl YearRange {
    /// Bounds may be given in either order.
    pub fn new(a: i64, b: i64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn single(year: i64) -> Self {
        Self::new(year, year)
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn contains(&self, year: i64) -> bool {
        (self.min..=self.max).contains(&year)
    }
}

/// Geographic selection, coarsest to finest.
///
/// A country overrides the ancestor filters; with nothing set every known
/// country is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoFilter {
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub intermediate_region: Option<String>,
    pub country: Option<String>,
}

impl GeoFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn country(name: impl Into<String>) -> Self {
        Self {
            country: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn region(name: impl Into<String>) -> Self {
        Self {
            region: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_subregion(mut self, name: impl Into<String>) -> Self {
        self.subregion = Some(name.into());
        self
    }

    pub fn with_intermediate_region(mut self, name: impl Into<String>) -> Self {
        self.intermediate_region = Some(name.into());
        self
    }

    pub fn with_country(mut self, name: impl Into<String>) -> Self {
        self.country = Some(name.into());
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.region.is_none()
            && self.subregion.is_none()
            && self.intermediate_region.is_none()
            && self.country.is_none()
    }
}

/// One query's worth of user choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    product_codes: BTreeSet<String>,
    years: YearRange,
    geo: GeoFilter,
}

impl Selection {
    /// Build a selection; codes that cannot be product codes are dropped and an
    /// empty product set is replaced by the configured fallback product.
    pub fn new<I, S>(product_codes: I, years: YearRange, geo: GeoFilter, config: &DashboardConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut codes = BTreeSet::new();
        for code in product_codes {
            let code = code.as_ref();
            match normalize_product_code(code) {
                Some(normalized) => {
                    codes.insert(normalized);
                }
                None => warn!(code, "ignoring malformed product code"),
            }
        }
        if codes.is_empty() {
            let fallback = config.fallback_product();
            warn!(fallback, "no products selected, using fallback product");
            codes.insert(fallback.to_string());
        }
        Self {
            product_codes: codes,
            years,
            geo,
        }
    }

    /// Every taxonomy product over `years`.
    pub fn all_products(years: YearRange, geo: GeoFilter, config: &DashboardConfig) -> Self {
        Self::new(config.taxonomy.codes(), years, geo, config)
    }

    pub fn product_codes(&self) -> &BTreeSet<String> {
        &self.product_codes
    }

    pub fn years(&self) -> YearRange {
        self.years
    }

    pub fn geo(&self) -> &GeoFilter {
        &self.geo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_range_orders_bounds() {
        let range = YearRange::new(2022, 2012);
        assert_eq!((range.min(), range.max()), (2012, 2022));
        assert!(range.contains(2012));
        assert!(range.contains(2022));
        assert!(!range.contains(2023));
    }

    #[test]
    fn empty_product_set_falls_back_to_default_code() {
        let config = DashboardConfig::default();
        let selection = Selection::new(
            Vec::<String>::new(),
            YearRange::single(2020),
            GeoFilter::all(),
            &config,
        );
        assert_eq!(
            selection.product_codes().iter().collect::<Vec<_>>(),
            vec!["260700"]
        );
    }

    #[test]
    fn codes_are_padded() {
        let config = DashboardConfig::default();
        let selection = Selection::new(["7801", "780110"], YearRange::single(2020), GeoFilter::all(), &config);
        assert!(selection.product_codes().contains("007801"));
        assert!(selection.product_codes().contains("780110"));
    }

    #[test]
    fn malformed_codes_are_dropped_before_the_fallback() {
        let config = DashboardConfig::default();
        let selection = Selection::new(["abc", "78011099"], YearRange::single(2020), GeoFilter::all(), &config);
        assert_eq!(
            selection.product_codes().iter().collect::<Vec<_>>(),
            vec!["260700"]
        );

        let mixed = Selection::new(["abc", "780110"], YearRange::single(2020), GeoFilter::all(), &config);
        assert_eq!(
            mixed.product_codes().iter().collect::<Vec<_>>(),
            vec!["780110"]
        );
    }

    #[test]
    fn geo_builders() {
        let geo = GeoFilter::region("Asia").with_subregion("Eastern Asia");
        assert_eq!(geo.region.as_deref(), Some("Asia"));
        assert_eq!(geo.subregion.as_deref(), Some("Eastern Asia"));
        assert!(!geo.is_unfiltered());
        assert!(GeoFilter::all().is_unfiltered());
    }
}
