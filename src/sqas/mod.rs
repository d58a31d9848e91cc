//! SQAS: the stock screener CSV importer.

pub mod client;
pub mod filter;
pub mod models;

pub use client::SqasApi;
pub use filter::{apply, from_grid_items, FilterOperator, GridFilterItem, NumericFilter, NumericRow};
pub use models::{StockInfo, StockInfoResponse};
