use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of USD prices per mint. Mints without a known price are simply
/// absent from the returned map.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn usd_prices(&self, mints: &[String]) -> HashMap<String, f64>;
}

/// Fixed price table, for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceOracle {
    prices: HashMap<String, f64>,
}

impl StaticPriceOracle {
    pub fn new(prices: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            prices: prices.into_iter().collect(),
        }
    }
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn usd_prices(&self, mints: &[String]) -> HashMap<String, f64> {
        mints
            .iter()
            .filter_map(|mint| self.prices.get(mint).map(|price| (mint.clone(), *price)))
            .collect()
    }
}

/// Jupiter price API client (`GET {base}?ids=a,b`).
pub struct JupiterPriceOracle {
    client: reqwest::Client,
    base_url: String,
}

impl JupiterPriceOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build price client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn fetch(&self, mints: &[String]) -> anyhow::Result<HashMap<String, f64>> {
        let body: Value = self
            .client
            .get(&self.base_url)
            .query(&[("ids", mints.join(","))])
            .send()
            .await
            .context("price request failed")?
            .error_for_status()
            .context("price request rejected")?
            .json()
            .await
            .context("price response is not json")?;

        let data = body
            .get("data")
            .and_then(Value::as_object)
            .context("price response has no data object")?;

        Ok(data
            .iter()
            .filter_map(|(mint, entry)| {
                let price = match entry.get("price")? {
                    Value::String(text) => text.parse::<f64>().ok()?,
                    Value::Number(number) => number.as_f64()?,
                    _ => return None,
                };
                (price.is_finite() && price > 0.0).then(|| (mint.clone(), price))
            })
            .collect())
    }
}

#[async_trait]
impl PriceOracle for JupiterPriceOracle {
    async fn usd_prices(&self, mints: &[String]) -> HashMap<String, f64> {
        if mints.is_empty() {
            return HashMap::new();
        }
        match self.fetch(mints).await {
            Ok(prices) => {
                debug!(requested = mints.len(), priced = prices.len(), "Fetched USD prices");
                prices
            }
            Err(e) => {
                warn!(error = %e, "Price lookup failed, continuing without prices");
                HashMap::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_oracle_returns_only_known_mints() {
        let oracle = StaticPriceOracle::new([("A".to_string(), 1.5)]);
        let prices = oracle.usd_prices(&["A".to_string(), "B".to_string()]).await;
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["A"], 1.5);
    }
}
