//! Immutable dashboard configuration: data sources and the product taxonomy.
//!
//! Built once at start-up (either [`DashboardConfig::default`] or from a JSON
//! file) and then shared read-only by the classifier, selection and
//! aggregation code.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TradeError};
use crate::reference::is_product_code;

// ── Taxonomy ────────────────────────────────────────────────────────────────

/// One traded product (HS code) inside a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub code: String,
    /// Short description used in labels.
    pub description: String,
    /// Longer explanatory text for help panels.
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    pub products: Vec<Product>,
}

/// Ordered category → products mapping.
///
/// Order is significant both across and within categories: it drives display
/// order and color assignment downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTaxonomy {
    pub categories: Vec<Category>,
}

impl ProductTaxonomy {
    /// Taxonomy codes in display order.
    pub fn codes(&self) -> Vec<&str> {
        self.products().map(|(_, p)| p.code.as_str()).collect()
    }

    /// `(category name, product)` pairs in display order.
    pub fn products(&self) -> impl Iterator<Item = (&str, &Product)> {
        self.categories
            .iter()
            .flat_map(|c| c.products.iter().map(move |p| (c.name.as_str(), p)))
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn product(&self, code: &str) -> Option<&Product> {
        self.products().find(|(_, p)| p.code == code).map(|(_, p)| p)
    }

    /// `"{code} - {description}"`, or `None` for codes outside the taxonomy.
    pub fn label(&self, code: &str) -> Option<String> {
        self.product(code)
            .map(|p| format!("{} - {}", p.code, p.description))
    }

    pub fn color(&self, code: &str) -> Option<&str> {
        self.product(code).and_then(|p| p.color.as_deref())
    }

    /// Base color per category, in category order.
    pub fn category_colors(&self) -> Vec<(&str, Option<&str>)> {
        self.categories
            .iter()
            .map(|c| (c.name.as_str(), c.color.as_deref()))
            .collect()
    }

    /// First code of the first category.
    pub fn default_product(&self) -> Option<&str> {
        self.codes().first().copied()
    }

    fn validate(&self) -> Result<()> {
        if self.categories.iter().all(|c| c.products.is_empty()) {
            return Err(TradeError::Config("product taxonomy is empty".into()));
        }
        let mut seen = HashSet::new();
        for (category, product) in self.products() {
            if !is_product_code(&product.code) {
                return Err(TradeError::Config(format!(
                    "product code '{}' in category '{}' is not 6 digits",
                    product.code, category
                )));
            }
            if !seen.insert(product.code.as_str()) {
                return Err(TradeError::Config(format!(
                    "product code '{}' appears in more than one category",
                    product.code
                )));
            }
        }
        Ok(())
    }

    /// The lead-trade taxonomy the dashboard ships with.
    pub fn lead() -> Self {
        fn product(code: &str, description: &str, definition: &str, color: &str) -> Product {
            Product {
                code: code.into(),
                description: description.into(),
                definition: definition.into(),
                color: Some(color.into()),
            }
        }

        Self {
            categories: vec![
                Category {
                    name: "Ores & Concentrates".into(),
                    color: Some("#8c6675".into()),
                    products: vec![product(
                        "260700",
                        "Lead ores and concentrates",
                        "Lead ores and concentrates - Raw materials extracted from mines.",
                        "#8c6675",
                    )],
                },
                Category {
                    name: "New Lead".into(),
                    color: Some("#52525b".into()),
                    products: vec![
                        product(
                            "780110",
                            "Refined lead - unwrought",
                            "Refined lead (unwrought) - Pure lead metal (99.9%+) that hasn't been worked into products.",
                            "#71717a",
                        ),
                        product(
                            "780191",
                            "Other unwrought lead, with antimony",
                            "Unwrought unrefined lead with antimony - Unwrought lead that is unrefined and contains antimony as the principal other element.",
                            "#a1a1aa",
                        ),
                        product(
                            "780199",
                            "Other unrefined lead",
                            "Other refined lead - Unwrought refined lead metal not elsewhere specified.",
                            "#d4d4d8",
                        ),
                    ],
                },
                Category {
                    name: "New Batteries".into(),
                    color: Some("#16a34a".into()),
                    products: vec![
                        product(
                            "850710",
                            "New lead-acid batteries for starting engines",
                            "Lead-acid batteries for starting engines - New car batteries and other starting/lighting/ignition batteries.",
                            "#22c55e",
                        ),
                        product(
                            "850720",
                            "Other new lead-acid batteries",
                            "Other lead-acid batteries - New non-SLI batteries, including for backup power and electric vehicles.",
                            "#4ade80",
                        ),
                    ],
                },
                Category {
                    name: "Used Batteries & Scrap".into(),
                    color: Some("#ea580c".into()),
                    products: vec![
                        product(
                            "854810",
                            "Waste batteries",
                            "Waste batteries - Used lead-acid batteries.",
                            "#fdba74",
                        ),
                        product(
                            "780200",
                            "Lead waste and scrap",
                            "Lead waste and scrap - Various non-battery forms of lead metal waste.",
                            "#f97316",
                        ),
                    ],
                },
            ],
        }
    }
}

impl Default for ProductTaxonomy {
    fn default() -> Self {
        Self::lead()
    }
}

// ── Dashboard config ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Trade records CSV.
    pub trade_source: PathBuf,
    /// Country metadata CSV.
    pub country_source: PathBuf,
    pub taxonomy: ProductTaxonomy,
    /// Substituted when a selection names no products (default: first taxonomy code).
    pub fallback_product: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            trade_source: PathBuf::from("lead_trade_data.csv"),
            country_source: PathBuf::from("countries.csv"),
            taxonomy: ProductTaxonomy::lead(),
            fallback_product: None,
        }
    }
}

impl DashboardConfig {
    /// Build a config around a custom taxonomy, validating it.
    pub fn with_taxonomy(taxonomy: ProductTaxonomy) -> Result<Self> {
        let config = Self {
            taxonomy,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config; absent fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Point both sources at files inside `dir`, keeping their file names.
    pub fn rooted_at(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.trade_source = dir.join(&self.trade_source);
        self.country_source = dir.join(&self.country_source);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.taxonomy.validate()?;
        if let Some(code) = &self.fallback_product {
            if self.taxonomy.product(code).is_none() {
                return Err(TradeError::Config(format!(
                    "fallback product '{code}' is not in the taxonomy"
                )));
            }
        }
        Ok(())
    }

    /// The code used when a selection would otherwise be empty.
    pub fn fallback_product(&self) -> &str {
        self.fallback_product
            .as_deref()
            .or_else(|| self.taxonomy.default_product())
            .unwrap_or("260700")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_taxonomy_order_is_preserved() {
        let taxonomy = ProductTaxonomy::lead();
        assert_eq!(
            taxonomy.category_names(),
            vec![
                "Ores & Concentrates",
                "New Lead",
                "New Batteries",
                "Used Batteries & Scrap"
            ]
        );
        assert_eq!(
            taxonomy.codes(),
            vec!["260700", "780110", "780191", "780199", "850710", "850720", "854810", "780200"]
        );
        assert_eq!(taxonomy.default_product(), Some("260700"));
    }

    #[test]
    fn labels_and_colors() {
        let taxonomy = ProductTaxonomy::lead();
        assert_eq!(
            taxonomy.label("780110").as_deref(),
            Some("780110 - Refined lead - unwrought")
        );
        assert_eq!(taxonomy.color("854810"), Some("#fdba74"));
        assert_eq!(taxonomy.label("999999"), None);
        assert_eq!(taxonomy.category_colors()[2], ("New Batteries", Some("#16a34a")));
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let mut taxonomy = ProductTaxonomy::lead();
        let dup = taxonomy.categories[1].products[0].clone();
        taxonomy.categories[0].products.push(dup);
        let err = DashboardConfig::with_taxonomy(taxonomy).unwrap_err();
        assert!(matches!(err, TradeError::Config(_)));
    }

    #[test]
    fn json_config_falls_back_to_defaults() {
        let config = DashboardConfig::from_json_str(r#"{"trade_source": "flows.csv"}"#).unwrap();
        assert_eq!(config.trade_source, PathBuf::from("flows.csv"));
        assert_eq!(config.country_source, PathBuf::from("countries.csv"));
        assert_eq!(config.fallback_product(), "260700");
    }

    #[test]
    fn unknown_fallback_product_is_rejected() {
        let err = DashboardConfig::from_json_str(r#"{"fallback_product": "123456"}"#).unwrap_err();
        assert!(matches!(err, TradeError::Config(_)));
    }
}
