/// Column-name constants for trade-lens tables.
/// Single source of truth - exported to Python via PyO3.

// ── Trade table columns ─────────────────────────────────────────────────────
pub mod trade {
    pub const YEAR: &str = "year";
    pub const EXPORTER: &str = "exporter";
    pub const IMPORTER: &str = "importer";
    pub const EXPORTER_NAME: &str = "exporter_name";
    pub const IMPORTER_NAME: &str = "importer_name";
    pub const PRODUCT: &str = "product";
    pub const QUANTITY: &str = "quantity";
    pub const VALUE: &str = "value";
    pub const CATEGORY: &str = "category";

    /// Columns every trade source must provide, in source order.
    pub const REQUIRED: [&str; 8] = [
        YEAR,
        EXPORTER,
        IMPORTER,
        EXPORTER_NAME,
        IMPORTER_NAME,
        PRODUCT,
        QUANTITY,
        VALUE,
    ];
}

// ── Country metadata columns ────────────────────────────────────────────────
pub mod country {
    pub const NAME: &str = "name";
    pub const REGION: &str = "region";
    pub const SUBREGION: &str = "subregion";
    pub const INTERMEDIATE_REGION: &str = "intermediate_region";
    pub const ISO3: &str = "iso3";

    pub const REQUIRED: [&str; 3] = [NAME, REGION, ISO3];
    pub const OPTIONAL: [&str; 2] = [SUBREGION, INTERMEDIATE_REGION];
}

// ── Derived output columns ──────────────────────────────────────────────────
pub mod output {
    pub const PARTNER: &str = "partner";
    pub const PRODUCT_LABEL: &str = "product_label";
    pub const EXPORTS: &str = "exports";
    pub const IMPORTS: &str = "imports";
    pub const NET: &str = "net";
    pub const RANK: &str = "rank";
}

// ── Labels ──────────────────────────────────────────────────────────────────
pub mod label {
    /// Category bucket for products outside the taxonomy in category rollups.
    pub const UNCATEGORIZED: &str = "Uncategorized";
}
