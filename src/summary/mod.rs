// In: src/summary/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Summary Layer
// ====================================================================================
//
// The storage backend does not run SQL, so the vendor summary is computed here
// with explicit in-memory hash operators over Arrow batches.
//
// Data Flow:
//
//   1. [SummaryAggregator]  -> reads vendor_invoice, purchases, purchase_prices, sales
//         |
//         `-> a. `group_by::group_sum` three times (freight, purchases, sales)
//         |
//         `-> b. `join::hash_join` (inner for prices, left for sales and freight)
//         |
//         `-> c. stable sort by TotalPurchaseDollars, descending, nulls last
//
//   2. [SummaryCleaner (clean_summary)] -> Volume to Float64, null fill, trim,
//                                          derived ratio columns
//
// Both `group_by` and `join` compare keys through `keys::KeyValue`, which
// lowers every key to a width-independent logical value first.
// ====================================================================================

pub mod aggregator;
pub mod cleaner;
pub mod group_by;
pub mod join;
pub mod keys;

pub use aggregator::{build_vendor_summary, SummaryAggregator};
pub use cleaner::clean_summary;
pub use join::JoinType;
