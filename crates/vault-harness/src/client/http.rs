//! Vault HTTP API client.
//!
//! Speaks the subset of the vault REST API the verifier needs:
//! - `sys/init`, `sys/seal-status`, `sys/unseal` for the seal lifecycle
//! - `auth/token/lookup-self` to confirm the root token
//! - logical reads and writes for the consistency check
//! - `sys/leader` for HA status

use std::time::Duration;

use harness_common::constants::headers::X_VAULT_TOKEN;
use harness_common::{
    HaStatus, HarnessError, InitRequest, InitStatus, Result, SealStatus, Secret, UnsealMaterial,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::SecretsClient;

/// Client bound to a single vault node
#[derive(Clone)]
pub struct VaultHttpClient {
    /// Node address as reported by the orchestrator
    address: String,
    /// API root, e.g. `http://10.0.0.4:8200`
    base_url: String,
    http: reqwest::Client,
    token: Option<String>,
}

/// Error body vault returns on failure
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

impl VaultHttpClient {
    /// Create a client for `base_url`, labelled with `address`
    pub fn new(
        address: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            address: address.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            token: None,
        })
    }

    /// Create a client for a unit address on the standard plain-HTTP listener
    pub fn for_unit(address: &str, port: u16, timeout: Duration) -> Result<Self> {
        Self::new(address, format!("http://{}:{}", address, port), timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.http.request(method, url);

        match self.token {
            Some(ref token) => builder.header(X_VAULT_TOKEN, token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        builder.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() || e.is_request() {
                HarnessError::connection(&self.address, e.to_string())
            } else {
                HarnessError::InvalidResponse {
                    address: self.address.clone(),
                    message: e.to_string(),
                }
            }
        })
    }

    /// Turn a non-success response into `HarnessError::Server`
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .filter(|body| !body.errors.is_empty())
            .map(|body| body.errors.join("; "))
            .unwrap_or(text);

        Err(HarnessError::Server {
            address: self.address.clone(),
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| HarnessError::InvalidResponse {
                address: self.address.clone(),
                message: e.to_string(),
            })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        let response = self.check(response).await?;
        self.json(response).await
    }
}

impl SecretsClient for VaultHttpClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn is_initialized(&self) -> Result<bool> {
        let status: InitStatus = self.get_json("sys/init").await?;
        Ok(status.initialized)
    }

    async fn initialize(&self, shares: u8, threshold: u8) -> Result<UnsealMaterial> {
        let body = InitRequest {
            secret_shares: shares,
            secret_threshold: threshold,
        };
        let response = self
            .send(self.request(Method::PUT, "sys/init").json(&body))
            .await?;
        let response = self.check(response).await?;
        self.json(response).await
    }

    async fn seal_status(&self) -> Result<SealStatus> {
        self.get_json("sys/seal-status").await
    }

    async fn unseal(&self, key: &str) -> Result<SealStatus> {
        let response = self
            .send(
                self.request(Method::PUT, "sys/unseal")
                    .json(&serde_json::json!({ "key": key })),
            )
            .await?;
        let response = self.check(response).await?;
        self.json(response).await
    }

    fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    async fn is_authenticated(&self) -> Result<bool> {
        let response = self
            .send(self.request(Method::GET, "auth/token/lookup-self"))
            .await?;

        if response.status() == StatusCode::FORBIDDEN {
            return Ok(false);
        }

        self.check(response).await?;
        Ok(true)
    }

    async fn read(&self, path: &str) -> Result<Option<Secret>> {
        let response = self.send(self.request(Method::GET, path)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = self.check(response).await?;
        self.json(response).await.map(Some)
    }

    async fn write(&self, path: &str, fields: &Map<String, Value>) -> Result<()> {
        let response = self
            .send(self.request(Method::PUT, path).json(fields))
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn ha_status(&self) -> Result<HaStatus> {
        self.get_json("sys/leader").await
    }
}
