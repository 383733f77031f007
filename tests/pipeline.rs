use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use trade_lens::{
    load_country_data, load_trade_data, CategoryClassifier, Dashboard, DashboardConfig, Direction,
    GeoFilter, KeyMetrics, ProductTaxonomy, TradeError, YearRange,
};

const TRADES: &str = "\
year,exporter,importer,exporter_name,importer_name,product,quantity,value
2020,156,840,China,USA,780110,1000,50000
2021,156,840,China,USA,780110,1200,60000
2021,840,156,USA,China,854810,300,9000
2021,792,276,TÃ¼rkiye,Germany,780110,50,2500
2021,156,276,China,Germany,999999,10,100
";

const COUNTRIES: &str = "\
name,region,subregion,intermediate_region,iso3
China,Asia,Eastern Asia,,CHN
USA,Americas,Northern America,,USA
Türkiye,Asia,Western Asia,,TUR
Germany,Europe,Western Europe,,DEU
";

fn write_sources(dir: &Path, trades: &str, countries: &str) -> DashboardConfig {
    let config = DashboardConfig::default().rooted_at(dir);
    fs::write(&config.trade_source, trades).unwrap();
    fs::write(&config.country_source, countries).unwrap();
    config
}

fn open_dashboard() -> (TempDir, Dashboard) {
    let dir = tempfile::tempdir().unwrap();
    let config = write_sources(dir.path(), TRADES, COUNTRIES);
    let dashboard = Dashboard::open(config).unwrap();
    (dir, dashboard)
}

fn column_f64(df: &polars::prelude::DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name).unwrap().f64().unwrap().into_iter().collect()
}

#[test]
fn single_country_year_over_year() {
    let (_dir, dashboard) = open_dashboard();
    let selection = dashboard
        .selection(
            ["780110"],
            Some(YearRange::new(2020, 2021)),
            GeoFilter::country("China"),
        )
        .unwrap();
    let flows = dashboard.flows(&selection).unwrap();

    let totals = flows.yearly_totals(Direction::Exports).unwrap();
    let years: Vec<Option<i64>> = totals.column("year").unwrap().i64().unwrap().into_iter().collect();
    assert_eq!(years, vec![Some(2020), Some(2021)]);
    assert_eq!(column_f64(&totals, "quantity"), vec![Some(1000.0), Some(1200.0)]);

    let metrics = dashboard.key_metrics(&flows).unwrap();
    assert_eq!(metrics.latest_year, Some(2021));
    assert_eq!(metrics.exports_yoy, 20.0);
    assert_eq!(metrics.total_exports, 2200.0);
    assert_eq!(metrics.total_imports, 0.0);
    assert_eq!(metrics.trading_partners, 1);
}

#[test]
fn repaired_names_match_country_filters() {
    let (_dir, dashboard) = open_dashboard();
    let selection = dashboard
        .selection(["780110"], None, GeoFilter::country("Türkiye"))
        .unwrap();
    let flows = dashboard.flows(&selection).unwrap();

    assert_eq!(flows.exports().height(), 1);
    assert_eq!(flows.total(Direction::Exports).unwrap(), 50.0);
    assert!(dashboard
        .trades()
        .partner_names()
        .unwrap()
        .contains(&"Türkiye".to_string()));
}

#[test]
fn balance_is_export_sum_minus_import_sum() {
    let (_dir, dashboard) = open_dashboard();
    let selection = dashboard
        .selection(["780110", "854810"], None, GeoFilter::country("China"))
        .unwrap();
    let flows = dashboard.flows(&selection).unwrap();
    let metrics = KeyMetrics::compute(&flows).unwrap();

    assert_eq!(metrics.total_exports, 2200.0);
    assert_eq!(metrics.total_imports, 300.0);
    assert_eq!(metrics.trade_balance, 1900.0);
    // USA appears on both sides of 2021 but counts once.
    assert_eq!(metrics.trading_partners, 1);
}

#[test]
fn region_selection_expands_to_member_countries() {
    let (_dir, dashboard) = open_dashboard();
    let geo = GeoFilter::region("Asia");
    let members = dashboard.resolve_selection(&geo);
    assert_eq!(
        members.into_iter().collect::<Vec<_>>(),
        vec!["China".to_string(), "Türkiye".to_string()]
    );

    let selection = dashboard.selection(["780110"], None, geo).unwrap();
    let flows = dashboard.flows(&selection).unwrap();
    assert_eq!(flows.total(Direction::Exports).unwrap(), 2250.0);

    let top = flows.top_partners(Direction::Exports, 2021).unwrap();
    let partners: Vec<Option<&str>> = top.column("partner").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(partners, vec![Some("USA"), Some("Germany")]);
}

#[test]
fn unmatched_region_gives_empty_flows() {
    let (_dir, dashboard) = open_dashboard();
    let selection = dashboard
        .selection(["780110"], None, GeoFilter::region("Oceania"))
        .unwrap();
    let flows = dashboard.flows(&selection).unwrap();

    assert!(flows.countries().is_empty());
    assert!(flows.is_empty());
    let metrics = dashboard.key_metrics(&flows).unwrap();
    assert_eq!(metrics.latest_year, None);
    assert_eq!(metrics.trading_partners, 0);
    assert_eq!(metrics.trade_balance, 0.0);
}

#[test]
fn empty_product_selection_uses_fallback() {
    let (_dir, dashboard) = open_dashboard();
    let selection = dashboard
        .selection(Vec::<String>::new(), None, GeoFilter::all())
        .unwrap();
    assert_eq!(
        selection.product_codes().iter().collect::<Vec<_>>(),
        vec!["260700"]
    );
    assert!(dashboard.flows(&selection).unwrap().is_empty());
}

#[test]
fn net_trade_attaches_iso3_and_sorts_by_net() {
    let (_dir, dashboard) = open_dashboard();
    let selection = dashboard
        .selection(
            ["780110", "854810", "999999"],
            None,
            GeoFilter::country("China"),
        )
        .unwrap();
    let flows = dashboard.flows(&selection).unwrap();
    let net = dashboard.net_trade_by_partner(&flows).unwrap();

    let partners: Vec<Option<&str>> = net.column("partner").unwrap().str().unwrap().into_iter().collect();
    let iso3: Vec<Option<&str>> = net.column("iso3").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(partners, vec![Some("USA"), Some("Germany")]);
    assert_eq!(iso3, vec![Some("USA"), Some("DEU")]);
    assert_eq!(column_f64(&net, "net"), vec![Some(1900.0), Some(10.0)]);
}

#[test]
fn category_balance_buckets_unknown_products() {
    let (_dir, dashboard) = open_dashboard();
    let selection = dashboard
        .selection(["780110", "999999"], Some(YearRange::single(2021)), GeoFilter::country("China"))
        .unwrap();
    let flows = dashboard.flows(&selection).unwrap();
    let balance = flows.category_balance().unwrap();

    let categories: Vec<Option<&str>> = balance.column("category").unwrap().str().unwrap().into_iter().collect();
    let mut rows: Vec<(&str, Option<f64>, Option<f64>)> = categories
        .into_iter()
        .zip(column_f64(&balance, "exports"))
        .zip(column_f64(&balance, "imports"))
        .map(|((c, e), i)| (c.unwrap(), e, i))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));
    assert_eq!(
        rows,
        vec![
            ("New Lead", Some(1200.0), Some(0.0)),
            ("Uncategorized", Some(10.0), Some(0.0)),
        ]
    );
}

#[test]
fn filtered_flows_export_as_csv() {
    let (_dir, dashboard) = open_dashboard();
    let selection = dashboard
        .selection(["780110"], Some(YearRange::single(2020)), GeoFilter::country("China"))
        .unwrap();
    let flows = dashboard.flows(&selection).unwrap();
    let mut exports = flows.exports().clone();
    let csv = trade_lens::export::to_csv_string(&mut exports).unwrap();

    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("year,exporter,importer,exporter_name,importer_name,product,quantity,value,category")
    );
    assert_eq!(lines.next(), Some("2020,156,840,China,USA,780110,1000.0,50000.0,New Lead"));
    assert_eq!(lines.next(), None);
}

#[test]
fn dashboard_from_loaded_tables() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_sources(dir.path(), TRADES, COUNTRIES);
    let classifier = CategoryClassifier::new(&ProductTaxonomy::lead());
    let trades = load_trade_data(&config.trade_source, &classifier).unwrap();
    let countries = load_country_data(&config.country_source).unwrap();
    assert_eq!(trades.len(), 5);
    assert_eq!(countries.len(), 4);

    let dashboard = Dashboard::new(config, Arc::new(trades), Arc::new(countries)).unwrap();
    assert_eq!(dashboard.regions(), vec!["Americas", "Asia", "Europe"]);
    assert_eq!(dashboard.countries_for(Some("Asia"), Some("Western Asia"), None), vec!["Türkiye"]);
    assert_eq!(dashboard.trades().available_years().unwrap(), vec![2020, 2021]);
}

#[test]
fn missing_source_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = DashboardConfig::default().rooted_at(dir.path());
    let err = Dashboard::open(config).unwrap_err();
    assert!(err.is_load_error());
    assert!(matches!(err, TradeError::Load { .. }));
}

#[test]
fn missing_column_is_reported_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let trades = "year,exporter,importer,exporter_name,importer_name,product,value\n\
                  2020,156,840,China,USA,780110,50000\n";
    let config = write_sources(dir.path(), trades, COUNTRIES);
    let classifier = CategoryClassifier::new(&config.taxonomy);
    let err = load_trade_data(&config.trade_source, &classifier).unwrap_err();
    assert!(matches!(err, TradeError::MissingColumn(ref c) if c == "quantity"));
}

fn renamed_taxonomy() -> ProductTaxonomy {
    let mut taxonomy = ProductTaxonomy::lead();
    taxonomy.categories[1].name = "Refined".into();
    taxonomy
}

fn china_export_categories(dashboard: &Dashboard) -> Vec<Option<String>> {
    let selection = dashboard
        .selection(["780110"], Some(YearRange::single(2020)), GeoFilter::country("China"))
        .unwrap();
    let flows = dashboard.flows(&selection).unwrap();
    flows
        .exports()
        .column("category")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|c| c.map(str::to_string))
        .collect()
}

#[test]
fn reopening_with_another_taxonomy_recategorises() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_sources(dir.path(), TRADES, COUNTRIES);
    let lead = Dashboard::open(config.clone()).unwrap();
    assert_eq!(china_export_categories(&lead), vec![Some("New Lead".to_string())]);

    let renamed = Dashboard::open(DashboardConfig {
        taxonomy: renamed_taxonomy(),
        ..config
    })
    .unwrap();
    assert_eq!(china_export_categories(&renamed), vec![Some("Refined".to_string())]);
    assert_eq!(china_export_categories(&lead), vec![Some("New Lead".to_string())]);
}

#[test]
fn preloaded_tables_follow_the_config_taxonomy() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_sources(dir.path(), TRADES, COUNTRIES);
    let classifier = CategoryClassifier::new(&ProductTaxonomy::lead());
    let trades = Arc::new(load_trade_data(&config.trade_source, &classifier).unwrap());
    let countries = Arc::new(load_country_data(&config.country_source).unwrap());

    let dashboard = Dashboard::new(
        DashboardConfig {
            taxonomy: renamed_taxonomy(),
            ..config
        },
        Arc::clone(&trades),
        countries,
    )
    .unwrap();
    assert_eq!(china_export_categories(&dashboard), vec![Some("Refined".to_string())]);
    assert_eq!(trades.records().unwrap()[0].category.as_deref(), Some("New Lead"));
}

#[test]
fn padded_country_names_keep_their_iso3() {
    let dir = tempfile::tempdir().unwrap();
    let countries = "\
name,region,subregion,intermediate_region,iso3
China,Asia,Eastern Asia,,CHN
 USA ,Americas,Northern America,,USA
";
    let config = write_sources(dir.path(), TRADES, countries);
    let dashboard = Dashboard::open(config).unwrap();
    assert_eq!(dashboard.countries_for(None, None, None), vec!["China", "USA"]);

    let selection = dashboard
        .selection(["780110"], None, GeoFilter::country("China"))
        .unwrap();
    let flows = dashboard.flows(&selection).unwrap();
    let net = dashboard.net_trade_by_partner(&flows).unwrap();
    let iso3: Vec<Option<&str>> = net.column("iso3").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(iso3, vec![Some("USA")]);
}

#[test]
fn malformed_product_codes_fall_back_to_default() {
    let (_dir, dashboard) = open_dashboard();
    let selection = dashboard
        .selection(["abc"], None, GeoFilter::all())
        .unwrap();
    assert_eq!(
        selection.product_codes().iter().collect::<Vec<_>>(),
        vec!["260700"]
    );
}
