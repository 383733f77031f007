use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};

use polars::prelude::*;

use crate::config::ProductTaxonomy;
use crate::error::Result;

/// Maps product codes to taxonomy category names.
///
/// Codes outside the taxonomy classify to `None`; that is never an error.
#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    categories: HashMap<String, String>,
}

impl CategoryClassifier {
    pub fn new(taxonomy: &ProductTaxonomy) -> Self {
        let categories = taxonomy
            .products()
            .map(|(category, product)| (product.code.clone(), category.to_string()))
            .collect();
        Self { categories }
    }

    /// Identity of the code → category mapping; equal mappings share it.
    pub fn fingerprint(&self) -> u64 {
        let ordered: BTreeMap<&str, &str> = self
            .categories
            .iter()
            .map(|(code, category)| (code.as_str(), category.as_str()))
            .collect();
        let mut hasher = DefaultHasher::new();
        ordered.hash(&mut hasher);
        hasher.finish()
    }

    pub fn classify(&self, product_code: &str) -> Option<&str> {
        self.categories.get(product_code).map(String::as_str)
    }

    /// Category column for a product column, null where unclassified.
    pub fn classify_column(&self, products: &StringChunked, name: &str) -> StringChunked {
        let categories: StringChunked = products
            .into_iter()
            .map(|code| code.and_then(|c| self.classify(c)))
            .collect();
        categories.with_name(name.into())
    }

    /// Append (or replace) `category_column`, derived from `product_column`.
    pub fn tag_frame(
        &self,
        df: &mut DataFrame,
        product_column: &str,
        category_column: &str,
    ) -> Result<()> {
        let categories = self.classify_column(df.column(product_column)?.str()?, category_column);
        df.with_column(categories.into_series())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_taxonomy_code_has_exactly_its_category() {
        let taxonomy = ProductTaxonomy::lead();
        let classifier = CategoryClassifier::new(&taxonomy);
        for (category, product) in taxonomy.products() {
            assert_eq!(classifier.classify(&product.code), Some(category));
        }
        assert_eq!(classifier.classify("780110"), Some("New Lead"));
        assert_eq!(classifier.classify("850710"), Some("New Batteries"));
    }

    #[test]
    fn unknown_codes_are_unclassified() {
        let classifier = CategoryClassifier::new(&ProductTaxonomy::lead());
        assert_eq!(classifier.classify("999999"), None);
        assert_eq!(classifier.classify("7801"), None);
    }

    #[test]
    fn fingerprint_tracks_the_mapping() {
        let lead = ProductTaxonomy::lead();
        let mut renamed = ProductTaxonomy::lead();
        renamed.categories[1].name = "Refined".into();

        let a = CategoryClassifier::new(&lead).fingerprint();
        assert_eq!(a, CategoryClassifier::new(&ProductTaxonomy::lead()).fingerprint());
        assert_ne!(a, CategoryClassifier::new(&renamed).fingerprint());
    }

    #[test]
    fn tags_a_frame() {
        let classifier = CategoryClassifier::new(&ProductTaxonomy::lead());
        let mut df = df!("product" => ["260700", "123456", "780200"]).unwrap();
        classifier.tag_frame(&mut df, "product", "category").unwrap();
        let cats: Vec<Option<&str>> = df.column("category").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(
            cats,
            vec![Some("Ores & Concentrates"), None, Some("Used Batteries & Scrap")]
        );
    }
}
