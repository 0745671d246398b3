use std::future::Future;
use std::time::Duration;

use crate::error::{LedgerError, Result};

/// Where the consensus agent gets peer chains from.
pub trait PeerClient {
    /// Fetch the serialized ledger exposed by the peer at `address`.
    fn fetch_chain(&self, address: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Fetches `GET http://{peer}/api/v1/chain/` with a per-request timeout.
#[derive(Clone)]
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Configuration(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    /// Peers are registered as `host:port`; a scheme is accepted too.
    pub fn chain_url(address: &str) -> String {
        let base = address.trim().trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{base}/api/v1/chain/")
        } else {
            format!("http://{base}/api/v1/chain/")
        }
    }
}

impl PeerClient for HttpPeerClient {
    fn fetch_chain(&self, address: &str) -> impl Future<Output = Result<String>> + Send {
        let request = self.client.get(Self::chain_url(address));
        async move {
            let response = request
                .send()
                .await
                .map_err(|e| LedgerError::Transport(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(LedgerError::Transport(format!("peer answered {status}")));
            }
            response
                .text()
                .await
                .map_err(|e| LedgerError::Transport(e.to_string()))
        }
    }
}
