//! End-to-end: config and catalog files, a local CSV source, the on-disk
//! store, and export.

mod common;

use common::d;
use metaseries_core::client::source_rules;
use metaseries_core::data::export::{write_csv, Layout};
use metaseries_core::data::{ClearFilter, SourceRegistry};
use metaseries_core::domain::Frequency;
use metaseries_core::{Catalog, CatalogError, Client, ClientError, Config, GetOptions};
use std::fs;
use tempfile::TempDir;

const MACRO_CSV: &str = "date,GDP,CPI\n\
                         2023-12-31,100.0,3.0\n\
                         2024-03-31,101.0,3.1\n\
                         2024-06-30,102.5,\n";

fn write_fixture(dir: &TempDir) -> (Config, Catalog) {
    fs::write(dir.path().join("macro.csv"), MACRO_CSV).unwrap();
    let config_path = dir.path().join("metaseries.toml");
    fs::write(
        &config_path,
        format!(
            r#"
            [store]
            path = "{}"

            [fetch]
            parallelism = 2

            [[sources]]
            name = "macro"
            kind = "csv"
            path = "macro.csv"
            "#,
            dir.path().join("cache/data_cache.db").display()
        ),
    )
    .unwrap();
    let config = Config::from_file(&config_path).unwrap();

    let catalog_path = dir.path().join("catalog.toml");
    fs::write(
        &catalog_path,
        r#"
        [[series]]
        name = "GDP_US"
        source = "macro"
        symbol = "GDP"
        frequency = "quarterly"
        unit = "index"

        [[series]]
        name = "CPI_US"
        source = "macro"
        symbol = "CPI"
        frequency = "quarterly"
        "#,
    )
    .unwrap();
    let catalog = Catalog::from_file(&catalog_path, &source_rules(&config)).unwrap();
    (config, catalog)
}

#[test]
fn csv_source_through_client_and_cache() {
    let dir = TempDir::new().unwrap();
    let (config, catalog) = write_fixture(&dir);
    let client = Client::new(catalog, SourceRegistry::new(), &config).unwrap();

    let table = client
        .get(&["GDP_US", "CPI_US"], d("2024-01-01"), d("2024-12-31"), &GetOptions::default())
        .unwrap();
    assert_eq!(table.column_names(), vec!["GDP_US", "CPI_US"]);
    assert_eq!(table.dates, vec![d("2024-03-31"), d("2024-06-30")]);
    assert_eq!(table.value("CPI_US", d("2024-06-30")), None);
    assert!(dir.path().join("cache/data_cache.db").exists());

    let cached = client.list_cached().unwrap();
    assert_eq!(cached.len(), 2);
    assert!(cached.iter().all(|e| e.source == "macro" && e.field.is_none()));

    let mut out = Vec::new();
    write_csv(&table, &mut out, Layout::Long).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("date,name,value\n2024-03-31,CPI_US,3.1\n"));

    assert_eq!(client.clear_cache(&ClearFilter::Symbol("GDP".into())).unwrap(), 1);
    client.close();
}

#[test]
fn monthly_target_forward_fills_quarters() {
    let dir = TempDir::new().unwrap();
    let (config, catalog) = write_fixture(&dir);
    let client = Client::new(catalog, SourceRegistry::new(), &config).unwrap();

    let options = GetOptions {
        frequency: Some(Frequency::Monthly),
        bypass_cache: false,
    };
    let table = client
        .get(&["GDP_US"], d("2024-01-01"), d("2024-06-30"), &options)
        .unwrap();
    assert_eq!(table.row_count(), 4);
    assert_eq!(table.value("GDP_US", d("2024-04-30")), Some(101.0));
    assert_eq!(table.value("GDP_US", d("2024-06-30")), Some(102.5));
}

#[test]
fn field_on_file_source_rejected_at_catalog_load() {
    let dir = TempDir::new().unwrap();
    let (config, _) = write_fixture(&dir);
    let toml = r#"
        [[series]]
        name = "GDP_US"
        source = "macro"
        symbol = "GDP"
        field = "PX_LAST"
        frequency = "quarterly"
    "#;
    let err = Catalog::from_toml(toml, &source_rules(&config)).unwrap_err();
    assert!(matches!(err, CatalogError::FieldForbidden { .. }));
}

#[test]
fn missing_column_surfaces_symbol() {
    let dir = TempDir::new().unwrap();
    let (config, _) = write_fixture(&dir);
    let catalog = Catalog::from_toml(
        r#"
        [[series]]
        name = "PMI"
        source = "macro"
        symbol = "PMI_US"
        frequency = "quarterly"
        "#,
        &source_rules(&config),
    )
    .unwrap();
    let client = Client::new(catalog, SourceRegistry::new(), &config).unwrap();

    let err = client
        .get(&["PMI"], d("2024-01-01"), d("2024-12-31"), &GetOptions::default())
        .unwrap_err();
    assert!(matches!(err, ClientError::Assembly(_)));
    assert!(err.to_string().contains("PMI_US"));
    assert!(client.list_cached().unwrap().is_empty());
}
