//! HTTP client for communicating with oiddiagd.

use anyhow::{anyhow, Context, Result};
use oiddiag_shared::rpc::{
    DiagnoseRequest, ErrorResponse, HealthResponse, ListTestsResponse, RunReport, TestInfo,
};
use oiddiag_shared::IDENTIFIER_FIELD;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_DAEMON_URL: &str = "http://127.0.0.1:7866";

/// Client for the daemon's JSON API and request glue
pub struct DaemonClient {
    base: Url,
    http: reqwest::Client,
}

impl DaemonClient {
    pub fn new(daemon_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(daemon_url).with_context(|| format!("Invalid daemon URL {}", daemon_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, http })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("Invalid path {}", path))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| {
            anyhow!(
                "Cannot reach oiddiagd at {}: {}\n\n\
                 Start it with: oiddiagd serve",
                self.base,
                e
            )
        })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => Err(anyhow!("{} (code {}): {}", status, err.code, err.message)),
            Err(_) => Err(anyhow!("{}: {}", status, body.trim())),
        }
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self.send(self.http.get(self.url("v1/health")?)).await?;
        Self::json(response).await
    }

    pub async fn diagnose(&self, identifier: &str) -> Result<RunReport> {
        let body = DiagnoseRequest {
            identifier: identifier.to_string(),
        };
        let response = self
            .send(self.http.post(self.url("v1/diagnose")?).json(&body))
            .await?;
        Self::json(response).await
    }

    pub async fn tests(&self) -> Result<Vec<TestInfo>> {
        let response = self.send(self.http.get(self.url("v1/tests")?)).await?;
        let list: ListTestsResponse = Self::json(response).await?;
        Ok(list.tests)
    }

    /// Follow a ledger locator (e.g. `Associate/?action=try`) and return the
    /// plain-text page, with the HTTP status.
    pub async fn follow(&self, locator: &str, identifier: Option<&str>) -> Result<(bool, String)> {
        let mut url = self.url(locator)?;
        if let Some(identifier) = identifier {
            url.query_pairs_mut().append_pair(IDENTIFIER_FIELD, identifier);
        }
        let response = self.send(self.http.get(url)).await?;
        let ok = response.status().is_success();
        Ok((ok, response.text().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_under_base_path() {
        let client = DaemonClient::new("http://127.0.0.1:7866/diag", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.url("Associate/?action=try").unwrap().as_str(),
            "http://127.0.0.1:7866/diag/Associate/?action=try"
        );
        assert_eq!(
            client.url("/v1/health").unwrap().as_str(),
            "http://127.0.0.1:7866/diag/v1/health"
        );
    }

    #[test]
    fn test_invalid_daemon_url() {
        assert!(DaemonClient::new("not a url", Duration::from_secs(1)).is_err());
    }
}
