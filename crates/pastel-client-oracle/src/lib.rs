//! pastel-client-oracle
//!
//! Cost oracle (spec §4.6): fetches the current fair-market PSL/USD price
//! from two independent HTTP sources, averages them, retries a failed
//! source once after a short delay, rejects implausible readings, and
//! derives `psl_per_credit` for the credit-pack engine's quote-acceptance
//! check.

pub mod error;
pub mod source;

pub use error::OracleError;
pub use source::{HttpJsonPriceSource, PriceSource};

use async_trait::async_trait;
use std::time::Duration;

/// Object-safe seam so engines can hold a `dyn FairMarketPrice` without
/// naming `CostOracle`'s two source type parameters.
#[async_trait]
pub trait FairMarketPrice: Send + Sync {
    async fn fair_market_usd_per_psl(&self) -> Result<f64, OracleError>;
}

#[async_trait]
impl<A: PriceSource, B: PriceSource> FairMarketPrice for CostOracle<A, B> {
    async fn fair_market_usd_per_psl(&self) -> Result<f64, OracleError> {
        CostOracle::fair_market_usd_per_psl(self).await
    }
}

/// Valid range for a fetched USD-per-PSL reading (spec §4.6).
pub const VALID_USD_RANGE: std::ops::RangeInclusive<f64> = 1e-7..=0.02;

/// Delay before retrying a single failed source once (spec §4.6: "if
/// either source is unavailable retries once after 2 seconds").
pub const SOURCE_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Averages two independent price sources and derives the PSL cost per
/// credit that the credit-pack engine should accept.
pub struct CostOracle<A: PriceSource, B: PriceSource> {
    source_a: A,
    source_b: B,
}

impl<A: PriceSource, B: PriceSource> CostOracle<A, B> {
    pub fn new(source_a: A, source_b: B) -> Self {
        Self { source_a, source_b }
    }

    /// Fetch both sources (retrying each once on failure) and average the
    /// in-range readings. Fails only if neither source ever produces a
    /// valid reading.
    pub async fn fair_market_usd_per_psl(&self) -> Result<f64, OracleError> {
        let a = fetch_with_retry(&self.source_a).await;
        let b = fetch_with_retry(&self.source_b).await;

        let readings: Vec<f64> = [a, b].into_iter().flatten().collect();
        if readings.is_empty() {
            return Err(OracleError::AllSourcesUnavailable);
        }
        Ok(readings.iter().sum::<f64>() / readings.len() as f64)
    }

    /// `psl_per_credit = (target_usd_per_credit / (1 - target_margin)) / psl_usd`
    /// (spec §4.6).
    pub async fn psl_per_credit(&self, target_usd_per_credit: f64, target_margin: f64) -> Result<f64, OracleError> {
        let psl_usd = self.fair_market_usd_per_psl().await?;
        Ok((target_usd_per_credit / (1.0 - target_margin)) / psl_usd)
    }
}

async fn fetch_with_retry<S: PriceSource>(source: &S) -> Option<f64> {
    match fetch_valid(source).await {
        Ok(price) => Some(price),
        Err(_) => {
            tokio::time::sleep(SOURCE_RETRY_DELAY).await;
            fetch_valid(source).await.ok()
        }
    }
}

async fn fetch_valid<S: PriceSource>(source: &S) -> Result<f64, OracleError> {
    let price = source.fetch_usd_price().await?;
    if !VALID_USD_RANGE.contains(&price) {
        return Err(OracleError::OutOfRange(price));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(f64);

    #[async_trait]
    impl PriceSource for Fixed {
        async fn fetch_usd_price(&self) -> Result<f64, OracleError> {
            Ok(self.0)
        }
    }

    struct Failing;

    #[async_trait]
    impl PriceSource for Failing {
        async fn fetch_usd_price(&self) -> Result<f64, OracleError> {
            Err(OracleError::Unavailable("always fails".to_string()))
        }
    }

    #[tokio::test]
    async fn averages_two_sources() {
        let oracle = CostOracle::new(Fixed(0.00002), Fixed(0.00004));
        let price = oracle.fair_market_usd_per_psl().await.unwrap();
        assert!((price - 0.00003).abs() < 1e-12);
    }

    #[tokio::test]
    async fn falls_back_to_single_source_when_one_fails() {
        let oracle = CostOracle::new(Fixed(0.00002), Failing);
        let price = oracle.fair_market_usd_per_psl().await.unwrap();
        assert!((price - 0.00002).abs() < 1e-12);
    }

    #[tokio::test]
    async fn rejects_out_of_range_reading() {
        let oracle = CostOracle::new(Fixed(5.0), Failing);
        let result = oracle.fair_market_usd_per_psl().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn derives_psl_per_credit() {
        let oracle = CostOracle::new(Fixed(0.00002), Fixed(0.00002));
        let psl_per_credit = oracle.psl_per_credit(0.0001, 0.1).await.unwrap();
        assert!((psl_per_credit - (0.0001 / 0.9) / 0.00002).abs() < 1e-6);
    }
}
