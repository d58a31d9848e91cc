//! SQAS data models.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One row of a parsed stock screener CSV.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StockInfo {
    pub id: Option<Uuid>,
    pub user_id: Option<Uuid>,

    /// When the screener was exported. The server sends either epoch millis or an ISO string.
    #[serde(deserialize_with = "deserialize_extract_date")]
    pub extract_date: Option<DateTime<Utc>>,
    pub extract_locale: Option<String>,

    // Basic information
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub market: Option<String>,
    pub industry: Option<String>,
    /// `YYYY-MM-DD`.
    pub listing_date: Option<String>,

    // Price
    pub price: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<i64>,
    pub market_cap: Option<i64>,
    pub shares_outstanding: Option<i64>,
    pub free_float_ratio: Option<f64>,

    // Dividends
    pub dividend_yield: Option<f64>,
    pub dividend_per_share: Option<f64>,
    pub equity_capital_ratio: Option<f64>,

    // Financial ratios
    pub per: Option<f64>,
    pub pbr: Option<f64>,
    pub eps: Option<f64>,
    pub bps: Option<f64>,
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub debt_ratio: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub equity_ratio: Option<f64>,

    // Income statement and cash flow
    pub revenue: Option<i64>,
    pub operating_income: Option<i64>,
    pub ordinary_income: Option<i64>,
    pub net_income: Option<i64>,
    pub total_assets: Option<i64>,
    pub total_equity: Option<i64>,
    pub interest_bearing_debt: Option<i64>,
    pub operating_cash_flow: Option<i64>,
    pub investing_cash_flow: Option<i64>,
    pub financing_cash_flow: Option<i64>,
}

impl StockInfo {
    /// Numeric column by its camelCase name, as the data grid refers to it.
    pub fn numeric_field(&self, field: &str) -> Option<f64> {
        let int = |v: Option<i64>| v.map(|n| n as f64);
        match field {
            "price" => self.price,
            "change" => self.change,
            "changePercent" => self.change_percent,
            "volume" => int(self.volume),
            "marketCap" => int(self.market_cap),
            "sharesOutstanding" => int(self.shares_outstanding),
            "freeFloatRatio" => self.free_float_ratio,
            "dividendYield" => self.dividend_yield,
            "dividendPerShare" => self.dividend_per_share,
            "equityCapitalRatio" => self.equity_capital_ratio,
            "per" => self.per,
            "pbr" => self.pbr,
            "eps" => self.eps,
            "bps" => self.bps,
            "roe" => self.roe,
            "roa" => self.roa,
            "debtRatio" => self.debt_ratio,
            "currentRatio" => self.current_ratio,
            "quickRatio" => self.quick_ratio,
            "equityRatio" => self.equity_ratio,
            "revenue" => int(self.revenue),
            "operatingIncome" => int(self.operating_income),
            "ordinaryIncome" => int(self.ordinary_income),
            "netIncome" => int(self.net_income),
            "totalAssets" => int(self.total_assets),
            "totalEquity" => int(self.total_equity),
            "interestBearingDebt" => int(self.interest_bearing_debt),
            "operatingCashFlow" => int(self.operating_cash_flow),
            "investingCashFlow" => int(self.investing_cash_flow),
            "financingCashFlow" => int(self.financing_cash_flow),
            _ => None,
        }
    }
}

/// Result of a CSV parse: the rows plus the key to persist them with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StockInfoResponse {
    pub key: Uuid,
    #[serde(default)]
    pub data: Vec<StockInfo>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDate {
    Millis(i64),
    Text(String),
}

fn deserialize_extract_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<RawDate>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawDate::Millis(ms)) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", ms))),
        Some(RawDate::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|d| Some(d.with_timezone(&Utc)))
            .map_err(D::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_partial_row() {
        let row: StockInfo = serde_json::from_value(json!({
            "ticker": "7203",
            "name": "Toyota Motor",
            "market": "Prime",
            "price": 2850.5,
            "marketCap": 46500000000000i64,
            "per": null
        }))
        .unwrap();

        assert_eq!(row.ticker.as_deref(), Some("7203"));
        assert_eq!(row.price, Some(2850.5));
        assert_eq!(row.per, None);
        assert!(row.industry.is_none());
        assert!(row.extract_date.is_none());
    }

    #[test]
    fn test_deserialize_null_identity() {
        let row: StockInfo = serde_json::from_value(json!({
            "ticker": null,
            "name": null,
            "price": 120.0
        }))
        .unwrap();

        assert!(row.ticker.is_none());
        assert!(row.name.is_none());
        assert_eq!(row.price, Some(120.0));
    }

    #[test]
    fn test_extract_date_formats() {
        let millis: StockInfo =
            serde_json::from_value(json!({"extractDate": 1_700_000_000_000i64})).unwrap();
        let text: StockInfo =
            serde_json::from_value(json!({"extractDate": "2023-11-14T22:13:20.000Z"})).unwrap();

        assert!(millis.extract_date.is_some());
        assert_eq!(millis.extract_date, text.extract_date);
    }

    #[test]
    fn test_numeric_field_lookup() {
        let row = StockInfo {
            price: Some(100.0),
            volume: Some(1200),
            ..StockInfo::default()
        };
        assert_eq!(row.numeric_field("price"), Some(100.0));
        assert_eq!(row.numeric_field("volume"), Some(1200.0));
        assert_eq!(row.numeric_field("pbr"), None);
        assert_eq!(row.numeric_field("ticker"), None);
    }

    #[test]
    fn test_stock_info_response() {
        let response: StockInfoResponse = serde_json::from_value(json!({
            "key": "6f1c2a8e-2f4b-4c1d-9a57-0d3f1b2c4e5a",
            "data": [{"ticker": "9984", "name": "SoftBank Group"}]
        }))
        .unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].name.as_deref(), Some("SoftBank Group"));
    }
}
