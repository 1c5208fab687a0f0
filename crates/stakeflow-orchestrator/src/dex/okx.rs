// crates/stakeflow-orchestrator/src/dex/okx.rs

use {
    super::{DexAggregator, QuoteRequest, SwapRequest},
    async_trait::async_trait,
    reqwest::Client,
    serde_json::Value,
    stakeflow_common::{config::DexConfig, Error, Result},
    std::time::Duration,
    tracing::{debug, info},
};

/// HTTP client for an OKX-style aggregator API
#[derive(Debug, Clone)]
pub struct HttpDexAggregator {
    /// HTTP client
    client: Client,
    /// Base URL, e.g. `https://www.okx.com/api/v5/dex/aggregator`
    base_url: String,
}

impl HttpDexAggregator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        info!("Initializing DEX aggregator client for {}", base_url);

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &DexConfig) -> Result<Self> {
        Self::new(config.base_url.clone(), Duration::from_secs(config.timeout_secs))
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            let message = ["msg", "message", "error"]
                .iter()
                .find_map(|key| body.get(*key).and_then(Value::as_str))
                .map(String::from)
                .unwrap_or_else(|| format!("aggregator returned HTTP {}", status));
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                Error::NetworkUnavailable(message)
            } else {
                Error::Provider(message)
            });
        }
        if body.is_null() {
            return Err(Error::Provider("aggregator returned a non-JSON body".into()));
        }
        Ok(body)
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::NetworkUnavailable("aggregator request timed out".into())
    } else {
        Error::NetworkUnavailable(e.to_string())
    }
}

fn base_query(chain_id: u64, from: &impl ToString, to: &impl ToString, amount: &impl ToString) -> Vec<(&'static str, String)> {
    vec![
        ("chainId", chain_id.to_string()),
        ("fromTokenAddress", from.to_string()),
        ("toTokenAddress", to.to_string()),
        ("amount", amount.to_string()),
        ("swapMode", "exactIn".to_string()),
    ]
}

/// Slippage is sent as a percentage.
fn slippage_param(bps: u16) -> String {
    (f64::from(bps) / 100.0).to_string()
}

#[async_trait]
impl DexAggregator for HttpDexAggregator {
    async fn quote(&self, request: &QuoteRequest) -> Result<Value> {
        let query = base_query(request.chain_id, &request.from_token, &request.to_token, &request.amount_in);
        self.get("quote", &query).await
    }

    async fn swap(&self, request: &SwapRequest) -> Result<Value> {
        let mut query = base_query(request.chain_id, &request.from_token, &request.to_token, &request.amount_in);
        query.push(("userWalletAddress", request.user_address.to_string()));
        query.push(("slippage", slippage_param(request.slippage_bps)));
        self.get("swap", &query).await
    }
}
