//! Relation and column names shared by the ingestion inputs and the summary report.

// --- Source relations (named after the ingested file stems) ---
pub const VENDOR_INVOICE: &str = "vendor_invoice";
pub const PURCHASES: &str = "purchases";
pub const PURCHASE_PRICES: &str = "purchase_prices";
pub const SALES: &str = "sales";

/// Default name of the relation written by the report job.
pub const SUMMARY_RELATION: &str = "vendor_sales_summary";

// --- vendor_invoice ---
pub const FREIGHT: &str = "Freight";

// --- purchases ---
pub const VENDOR_NUMBER: &str = "VendorNumber";
pub const VENDOR_NAME: &str = "VendorName";
pub const BRAND: &str = "Brand";
pub const DESCRIPTION: &str = "Description";
pub const PURCHASE_PRICE: &str = "PurchasePrice";
pub const QUANTITY: &str = "Quantity";
pub const DOLLARS: &str = "Dollars";

// --- purchase_prices ---
pub const PRICE: &str = "Price";
pub const VOLUME: &str = "Volume";

// --- sales ---
pub const VENDOR_NO: &str = "VendorNo";
pub const SALES_DOLLARS: &str = "SalesDollars";
pub const SALES_PRICE: &str = "SalesPrice";
pub const SALES_QUANTITY: &str = "SalesQuantity";
pub const EXCISE_TAX: &str = "ExciseTax";

// --- summary ---
pub const ACTUAL_PRICE: &str = "ActualPrice";
pub const FREIGHT_COST: &str = "FreightCost";
pub const TOTAL_PURCHASE_QUANTITY: &str = "TotalPurchaseQuantity";
pub const TOTAL_PURCHASE_DOLLARS: &str = "TotalPurchaseDollars";
pub const TOTAL_SALES_QUANTITY: &str = "TotalSalesQuantity";
pub const TOTAL_SALES_DOLLARS: &str = "TotalSalesDollars";
pub const TOTAL_SALES_PRICE: &str = "TotalSalesPrice";
pub const TOTAL_EXCISE_TAX: &str = "TotalExciseTax";
pub const GROSS_PROFIT: &str = "GrossProfit";
pub const PROFIT_MARGIN: &str = "ProfitMargin";
pub const STOCK_TURNOVER: &str = "StockTurnover";
pub const SALES_TO_PURCHASE_RATIO: &str = "SalesToPurchaseRatio";

/// Column order of the aggregated summary, before derived metrics are appended.
pub const AGGREGATED_SUMMARY_COLUMNS: [&str; 14] = [
    VENDOR_NUMBER,
    VENDOR_NAME,
    BRAND,
    DESCRIPTION,
    PURCHASE_PRICE,
    ACTUAL_PRICE,
    VOLUME,
    TOTAL_PURCHASE_QUANTITY,
    TOTAL_PURCHASE_DOLLARS,
    TOTAL_SALES_QUANTITY,
    TOTAL_SALES_DOLLARS,
    TOTAL_SALES_PRICE,
    TOTAL_EXCISE_TAX,
    FREIGHT_COST,
];
