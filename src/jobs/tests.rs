use super::*;
use crate::error::EtlError;
use crate::loader::LoaderOptions;
use crate::store::{ArrowIpcStore, MemoryStore, RelationStore};
use crate::types::column_encoding::{ColumnEncoding, Width};
use crate::types::columns::*;
use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use arrow::record_batch::RecordBatch;
use std::fs;
use std::path::Path;

const VENDOR_INVOICE_CSV: &str = "\
VendorNumber,VendorName,InvoiceDate,PONumber,Quantity,Dollars,Freight
105,ALTAMAR BRANDS LLC,2024-01-04,8124,6,214.26,3.47
4466,AMERICAN VINTAGE BEVERAGE,2024-01-07,8137,12,112.92,1.21
4466,AMERICAN VINTAGE BEVERAGE,2024-01-09,8150,2,18.82,0.50
";

const PURCHASES_CSV: &str = "\
VendorNumber,VendorName,Brand,Description,PurchasePrice,Quantity,Dollars,PODate
105,ALTAMAR BRANDS LLC         ,8412,Tequila Ocho Plata Fresno,35.71,6,214.26,2024-01-02
4466,AMERICAN VINTAGE BEVERAGE  ,5255,\"TGI Fridays, Mudslide\",9.41,10,94.10,2024-01-03
4466,AMERICAN VINTAGE BEVERAGE  ,5255,\"TGI Fridays, Mudslide\",9.41,2,18.82,2024-01-04
105,ALTAMAR BRANDS LLC         ,3140,Free Sample,0.00,1,0.00,2024-01-05
";

const PURCHASE_PRICES_CSV: &str = "\
Brand,Description,Price,Volume
8412,Tequila Ocho Plata Fresno,49.99,750
5255,\"TGI Fridays, Mudslide\",12.99,1750
3140,Free Sample,0.00,Unknown
";

const SALES_CSV: &str = "\
VendorNo,Brand,SalesQuantity,SalesDollars,SalesPrice,ExciseTax,SalesDate
4466,5255,3,38.97,12.99,0.79,1/1/2024
4466,5255,1,12.99,12.99,0.26,1/2/2024
";

fn write_inputs(dir: &Path) {
    fs::write(dir.join("vendor_invoice.csv"), VENDOR_INVOICE_CSV).unwrap();
    fs::write(dir.join("purchases.csv"), PURCHASES_CSV).unwrap();
    fs::write(dir.join("purchase_prices.csv"), PURCHASE_PRICES_CSV).unwrap();
    fs::write(dir.join("sales.csv"), SALES_CSV).unwrap();
}

fn options(chunk_size_rows: usize) -> IngestionOptions {
    IngestionOptions {
        loader: LoaderOptions {
            chunk_size_rows,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn floats(batch: &RecordBatch, name: &str) -> Vec<f64> {
    let column = batch.column(batch.schema().index_of(name).unwrap());
    let column = cast(column.as_ref(), &DataType::Float64).unwrap();
    column.as_primitive::<Float64Type>().values().to_vec()
}

fn texts(batch: &RecordBatch, name: &str) -> Vec<String> {
    let column = batch.column(batch.schema().index_of(name).unwrap());
    let column = cast(column.as_ref(), &DataType::Utf8).unwrap();
    column
        .as_string::<i32>()
        .iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn test_malformed_and_foreign_files_are_skipped() {
    let input = tempfile::tempdir().unwrap();
    write_inputs(input.path());
    fs::write(input.path().join("broken.csv"), "a,b\n1,2\n3\n").unwrap();
    fs::write(input.path().join("readme.txt"), "not tabular").unwrap();

    let mut store = MemoryStore::new();
    let report = run_ingestion(input.path(), &mut store, &options(2)).unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].path.ends_with("broken.csv"));
    let names: Vec<&str> = report.relations.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec![PURCHASE_PRICES, PURCHASES, SALES, VENDOR_INVOICE]);
    assert_eq!(
        store.relation_names().unwrap(),
        vec![PURCHASE_PRICES, PURCHASES, SALES, VENDOR_INVOICE]
    );

    let purchases = report.relations.iter().find(|r| r.name == PURCHASES).unwrap();
    assert_eq!((purchases.rows, purchases.columns, purchases.chunks), (4, 8, 2));
    assert!(purchases.bytes > 0);
}

#[test]
fn test_dot_prefixed_sidecar_file_is_skipped() {
    let input = tempfile::tempdir().unwrap();
    write_inputs(input.path());
    fs::write(input.path().join("._purchases.csv"), "x\n1\n").unwrap();

    let mut store = MemoryStore::new();
    let report = run_ingestion(input.path(), &mut store, &options(10)).unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].path.ends_with("._purchases.csv"));
    assert_eq!(
        store.relation_names().unwrap(),
        vec![PURCHASE_PRICES, PURCHASES, SALES, VENDOR_INVOICE]
    );
}

#[test]
fn test_report_lists_final_column_encodings() {
    let input = tempfile::tempdir().unwrap();
    write_inputs(input.path());
    let mut store = MemoryStore::new();
    let report = run_ingestion(input.path(), &mut store, &options(80_000)).unwrap();

    let purchases = report.relations.iter().find(|r| r.name == PURCHASES).unwrap();
    let vendor_number = purchases.schema.iter().find(|c| c.name == VENDOR_NUMBER).unwrap();
    assert_eq!(vendor_number.encoding, ColumnEncoding::Integer(Width::W16));
    let description = purchases.schema.iter().find(|c| c.name == DESCRIPTION).unwrap();
    assert_eq!(description.data_type, DataType::Utf8);
    assert_eq!(description.encoding, ColumnEncoding::Unchanged);
}

#[test]
fn test_uppercase_extension_is_ingested() {
    let input = tempfile::tempdir().unwrap();
    fs::write(input.path().join("EXTRA.CSV"), "k,v\na,1\nb,2\n").unwrap();

    let mut store = MemoryStore::new();
    let report = run_ingestion(input.path(), &mut store, &options(10)).unwrap();
    assert_eq!(report.relations.len(), 1);
    assert!(store.contains("EXTRA").unwrap());
}

#[test]
fn test_date_columns_stay_text_after_ingestion() {
    let input = tempfile::tempdir().unwrap();
    write_inputs(input.path());
    let mut store = MemoryStore::new();
    run_ingestion(input.path(), &mut store, &options(80_000)).unwrap();

    let purchases = store.read_relation(PURCHASES).unwrap();
    let po_date = purchases.column(purchases.schema().index_of("PODate").unwrap());
    assert_eq!(cast(po_date.as_ref(), &DataType::Utf8).unwrap().as_string::<i32>().value(0), "2024-01-02");
    // 105..4466 fits in Int16.
    assert_eq!(purchases.column(0).data_type(), &DataType::Int16);
}

#[test]
fn test_missing_input_directory_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::new();
    let err = run_ingestion(&root.path().join("absent"), &mut store, &options(10)).unwrap_err();
    assert!(matches!(err, EtlError::Io(_)));
}

#[test]
fn test_storage_failure_stops_ingestion() {
    let input = tempfile::tempdir().unwrap();
    write_inputs(input.path());
    let store_dir = tempfile::tempdir().unwrap();
    let mut store = ArrowIpcStore::open(store_dir.path(), true).unwrap();
    fs::remove_dir_all(store_dir.path()).unwrap();

    let err = run_ingestion(input.path(), &mut store, &options(10)).unwrap_err();
    assert!(matches!(err, EtlError::StorageWrite { .. }));
}

#[test]
fn test_report_requires_ingested_sources() {
    let mut store = MemoryStore::new();
    let err = run_summary_report(&mut store, &ReportOptions::default()).unwrap_err();
    assert!(matches!(err, EtlError::SchemaMismatch(_)));
    assert!(!store.contains(SUMMARY_RELATION).unwrap());
}

#[test]
fn test_end_to_end_through_the_ipc_store() {
    let input = tempfile::tempdir().unwrap();
    write_inputs(input.path());
    let store_dir = tempfile::tempdir().unwrap();
    let mut store = ArrowIpcStore::open(store_dir.path(), true).unwrap();

    run_ingestion(input.path(), &mut store, &options(1)).unwrap();
    let summary = run_summary_report(&mut store, &ReportOptions::default()).unwrap();
    assert_eq!(summary.relation, SUMMARY_RELATION);
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.columns, 18);

    // Running the report again replaces the relation rather than appending.
    run_summary_report(&mut store, &ReportOptions::default()).unwrap();
    let stored = store.read_relation(SUMMARY_RELATION).unwrap();
    assert_eq!(stored.num_rows(), 2);
    for column in stored.columns() {
        assert_eq!(column.null_count(), 0);
    }

    assert_eq!(texts(&stored, VENDOR_NUMBER), vec!["105", "4466"]);
    assert_eq!(texts(&stored, VENDOR_NAME), vec!["ALTAMAR BRANDS LLC", "AMERICAN VINTAGE BEVERAGE"]);
    assert_eq!(texts(&stored, DESCRIPTION)[1], "TGI Fridays, Mudslide");
    assert_eq!(floats(&stored, VOLUME), vec![750.0, 1750.0]);

    let purchase_dollars = floats(&stored, TOTAL_PURCHASE_DOLLARS);
    assert_close(purchase_dollars[0], 214.26);
    assert_close(purchase_dollars[1], 112.92);
    assert_eq!(floats(&stored, TOTAL_PURCHASE_QUANTITY), vec![6.0, 12.0]);

    let sales_dollars = floats(&stored, TOTAL_SALES_DOLLARS);
    assert_eq!(sales_dollars[0], 0.0);
    assert_close(sales_dollars[1], 51.96);
    assert_eq!(floats(&stored, TOTAL_SALES_QUANTITY), vec![0.0, 4.0]);

    let freight = floats(&stored, FREIGHT_COST);
    assert_close(freight[0], 3.47);
    assert_close(freight[1], 1.71);

    let gross = floats(&stored, GROSS_PROFIT);
    assert_close(gross[0], -214.26);
    assert_close(gross[1], 51.96 - 112.92);
    assert_eq!(floats(&stored, PROFIT_MARGIN)[0], f64::NEG_INFINITY);
    assert_close(floats(&stored, STOCK_TURNOVER)[1], 4.0 / 12.0);
    assert_eq!(floats(&stored, SALES_TO_PURCHASE_RATIO)[0], 0.0);
}
