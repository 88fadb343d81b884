use crate::error::OracleError;
use async_trait::async_trait;

/// One independent market-price data source (spec §4.6: "two independent
/// HTTP sources").
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_usd_price(&self) -> Result<f64, OracleError>;
}

/// A price source that GETs a JSON document and extracts the price from
/// a field path (e.g. `["psl", "usd"]` for a CoinGecko-style response).
pub struct HttpJsonPriceSource {
    http: reqwest::Client,
    url: String,
    field_path: Vec<String>,
}

impl HttpJsonPriceSource {
    pub fn new(url: impl Into<String>, field_path: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            field_path,
        }
    }
}

#[async_trait]
impl PriceSource for HttpJsonPriceSource {
    async fn fetch_usd_price(&self) -> Result<f64, OracleError> {
        let value: serde_json::Value = self.http.get(&self.url).send().await?.json().await?;
        let mut cursor = &value;
        for key in &self.field_path {
            cursor = cursor
                .get(key)
                .ok_or_else(|| OracleError::Decode(format!("missing field {key} in response from {}", self.url)))?;
        }
        cursor
            .as_f64()
            .ok_or_else(|| OracleError::Decode(format!("field at {:?} is not a number", self.field_path)))
    }
}
