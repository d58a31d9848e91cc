//! SQAS endpoint bindings.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;
use uuid::Uuid;

use super::models::StockInfoResponse;
use crate::endpoints::{SQAS_PARSE_STOCK_SCREENER_CSV, SQAS_PUT_STOCK_INFO};
use crate::error::HttpError;
use crate::http::{HttpClient, MultipartBody, RequestBody, RequestOptions};

const CSV_MIME: &str = "text/csv";

/// Stock screener import API.
#[derive(Clone)]
pub struct SqasApi {
    client: HttpClient,
}

impl SqasApi {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Upload a screener CSV and get the parsed rows back.
    ///
    /// Nothing is stored yet; pass the returned key to [`Self::put_stock_info`].
    pub async fn parse_stock_screener_csv(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        extract_date: DateTime<Utc>,
        extract_locale: &str,
    ) -> Result<StockInfoResponse, HttpError> {
        let form = MultipartBody::new()
            .file("file", file_name, bytes, Some(CSV_MIME))
            .text(
                "extractDate",
                extract_date.to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .text("extractLocale", extract_locale);

        let response: StockInfoResponse = self
            .client
            .post(
                SQAS_PARSE_STOCK_SCREENER_CSV,
                RequestBody::Multipart(form),
                RequestOptions::default(),
            )
            .await?;

        info!("Parsed {} rows from {} (key {})", response.data.len(), file_name, response.key);
        Ok(response)
    }

    /// Persist the rows of an earlier parse.
    pub async fn put_stock_info(&self, data_key: Uuid) -> Result<(), HttpError> {
        let key = data_key.to_string();
        let _: serde_json::Value = self
            .client
            .put(
                SQAS_PUT_STOCK_INFO,
                &[("dataKey", key.as_str())],
                RequestBody::Empty,
                RequestOptions::default(),
            )
            .await?;

        info!("Stored stock info {}", data_key);
        Ok(())
    }
}
