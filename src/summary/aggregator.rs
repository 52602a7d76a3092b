// In: src/summary/aggregator.rs

//! Derives the wide vendor/brand summary from the four ingested relations.
//!
//! Three independent grouped aggregations (freight per vendor, purchases per
//! vendor/brand/price, sales per vendor/brand) are left-joined onto the
//! purchases aggregation and ordered by purchase spend, largest first.

use std::cmp::Ordering;

use arrow::array::{Array, AsArray, Float64Array, UInt32Array};
use arrow::compute::kernels::cmp::gt;
use arrow::compute::{cast, filter_record_batch, take_record_batch};
use arrow::datatypes::Float64Type;
use arrow::record_batch::RecordBatch;
use arrow_schema::DataType;

use super::group_by::{group_sum, Aliased};
use super::join::{hash_join, project, JoinType};
use super::keys::{column_by_name, is_float, is_integer};
use crate::error::{EtlError, Result};
use crate::store::RelationStore;
use crate::types::columns::*;

/// Reads the base relations from a store and runs the aggregation.
pub struct SummaryAggregator<'a> {
    store: &'a dyn RelationStore,
}

impl<'a> SummaryAggregator<'a> {
    pub fn new(store: &'a dyn RelationStore) -> Self {
        Self { store }
    }

    /// A source relation absent from the store is a schema mismatch for the report.
    fn source(&self, name: &str) -> Result<RecordBatch> {
        self.store.read_relation(name).map_err(|e| match e {
            EtlError::RelationNotFound(_) => EtlError::SchemaMismatch(format!(
                "source relation '{}' is missing; run ingestion first",
                name
            )),
            other => other,
        })
    }

    pub fn freight_summary(&self) -> Result<RecordBatch> {
        freight_summary(&self.source(VENDOR_INVOICE)?)
    }

    pub fn purchases_summary(&self) -> Result<RecordBatch> {
        purchases_summary(&self.source(PURCHASES)?, &self.source(PURCHASE_PRICES)?)
    }

    pub fn sales_summary(&self) -> Result<RecordBatch> {
        sales_summary(&self.source(SALES)?)
    }

    /// Runs all three aggregations and combines them.
    pub fn aggregate(&self) -> Result<RecordBatch> {
        let freight = self.freight_summary()?;
        let purchases = self.purchases_summary()?;
        let sales = self.sales_summary()?;
        combine(&purchases, &sales, &freight)
    }
}

//==================================================================================
// 1. The Three Aggregations
//==================================================================================

pub fn freight_summary(vendor_invoice: &RecordBatch) -> Result<RecordBatch> {
    group_sum(
        VENDOR_INVOICE,
        vendor_invoice,
        &[(VENDOR_NUMBER, VENDOR_NUMBER)],
        &[(FREIGHT, FREIGHT_COST)],
    )
}

/// Purchases with a positive price, joined to their list price and volume,
/// grouped per vendor, brand, description and price.
pub fn purchases_summary(purchases: &RecordBatch, purchase_prices: &RecordBatch) -> Result<RecordBatch> {
    let priced = filter_positive(PURCHASES, purchases, PURCHASE_PRICE)?;
    let priced = project(
        PURCHASES,
        &priced,
        &[
            (VENDOR_NUMBER, VENDOR_NUMBER),
            (VENDOR_NAME, VENDOR_NAME),
            (BRAND, BRAND),
            (DESCRIPTION, DESCRIPTION),
            (PURCHASE_PRICE, PURCHASE_PRICE),
            (QUANTITY, QUANTITY),
            (DOLLARS, DOLLARS),
        ],
    )?;
    let joined = hash_join(
        PURCHASES,
        &priced,
        PURCHASE_PRICES,
        purchase_prices,
        &[(BRAND, BRAND)],
        JoinType::Inner,
        &[(PRICE, ACTUAL_PRICE), (VOLUME, VOLUME)],
    )?;

    let group_by: [Aliased<'_>; 7] = [
        (VENDOR_NUMBER, VENDOR_NUMBER),
        (VENDOR_NAME, VENDOR_NAME),
        (BRAND, BRAND),
        (DESCRIPTION, DESCRIPTION),
        (PURCHASE_PRICE, PURCHASE_PRICE),
        (ACTUAL_PRICE, ACTUAL_PRICE),
        (VOLUME, VOLUME),
    ];
    group_sum(
        PURCHASES,
        &joined,
        &group_by,
        &[
            (QUANTITY, TOTAL_PURCHASE_QUANTITY),
            (DOLLARS, TOTAL_PURCHASE_DOLLARS),
        ],
    )
}

pub fn sales_summary(sales: &RecordBatch) -> Result<RecordBatch> {
    group_sum(
        SALES,
        sales,
        &[(VENDOR_NO, VENDOR_NO), (BRAND, BRAND)],
        &[
            (SALES_QUANTITY, TOTAL_SALES_QUANTITY),
            (SALES_DOLLARS, TOTAL_SALES_DOLLARS),
            (SALES_PRICE, TOTAL_SALES_PRICE),
            (EXCISE_TAX, TOTAL_EXCISE_TAX),
        ],
    )
}

/// Keeps rows whose `column` is strictly positive. Nulls do not qualify.
fn filter_positive(relation: &str, batch: &RecordBatch, column: &str) -> Result<RecordBatch> {
    let values = column_by_name(relation, batch, column)?;
    if !(is_integer(values.data_type()) || is_float(values.data_type())) {
        return Err(EtlError::SchemaMismatch(format!(
            "column '{}' of relation '{}' must be numeric, found {}",
            column,
            relation,
            values.data_type()
        )));
    }
    let values = cast(values.as_ref(), &DataType::Float64)?;
    let mask = gt(&values, &Float64Array::new_scalar(0.0))?;
    Ok(filter_record_batch(batch, &mask)?)
}

//==================================================================================
// 2. Combination & Ordering
//==================================================================================

/// Left-joins sales and freight onto the purchases aggregation and orders the
/// result by `TotalPurchaseDollars`, descending, nulls last.
pub fn combine(purchases: &RecordBatch, sales: &RecordBatch, freight: &RecordBatch) -> Result<RecordBatch> {
    let with_sales = hash_join(
        PURCHASES,
        purchases,
        SALES,
        sales,
        &[(VENDOR_NUMBER, VENDOR_NO), (BRAND, BRAND)],
        JoinType::Left,
        &[
            (TOTAL_SALES_QUANTITY, TOTAL_SALES_QUANTITY),
            (TOTAL_SALES_DOLLARS, TOTAL_SALES_DOLLARS),
            (TOTAL_SALES_PRICE, TOTAL_SALES_PRICE),
            (TOTAL_EXCISE_TAX, TOTAL_EXCISE_TAX),
        ],
    )?;
    let with_freight = hash_join(
        PURCHASES,
        &with_sales,
        VENDOR_INVOICE,
        freight,
        &[(VENDOR_NUMBER, VENDOR_NUMBER)],
        JoinType::Left,
        &[(FREIGHT_COST, FREIGHT_COST)],
    )?;

    let columns: Vec<Aliased<'_>> = AGGREGATED_SUMMARY_COLUMNS.iter().map(|c| (*c, *c)).collect();
    let summary = project(PURCHASES, &with_freight, &columns)?;
    sort_descending_nulls_last(&summary, TOTAL_PURCHASE_DOLLARS)
}

/// Builds the aggregated summary directly from the four source relations.
pub fn build_vendor_summary(
    vendor_invoice: &RecordBatch,
    purchases: &RecordBatch,
    purchase_prices: &RecordBatch,
    sales: &RecordBatch,
) -> Result<RecordBatch> {
    combine(
        &purchases_summary(purchases, purchase_prices)?,
        &sales_summary(sales)?,
        &freight_summary(vendor_invoice)?,
    )
}

/// Stable sort: rows with equal values keep their relative order.
fn sort_descending_nulls_last(batch: &RecordBatch, column: &str) -> Result<RecordBatch> {
    let values = cast(column_by_name(PURCHASES, batch, column)?.as_ref(), &DataType::Float64)?;
    let values = values.as_primitive::<Float64Type>();

    let mut order: Vec<u32> = (0..batch.num_rows())
        .map(|row| {
            u32::try_from(row).map_err(|_| EtlError::Aggregation("summary has too many rows".to_string()))
        })
        .collect::<Result<_>>()?;
    order.sort_by(|a, b| {
        let (a, b) = (*a as usize, *b as usize);
        match (values.is_valid(a), values.is_valid(b)) {
            (true, true) => values.value(b).total_cmp(&values.value(a)),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => Ordering::Equal,
        }
    });

    Ok(take_record_batch(batch, &UInt32Array::from(order))?)
}
