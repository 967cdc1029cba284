//! Signed HTTP transport for the OKX v5 REST API.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use reqwest::{header, Client, Method, StatusCode, Url};
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;
use trading_core::error::GatewayError;

use super::{OkxCredentials, OkxTransport};

type HmacSha256 = Hmac<Sha256>;

/// Production REST endpoint; demo trading uses the same host.
pub const BASE_URL: &str = "https://www.okx.com";

/// Header that routes requests to the demo trading environment.
const SIMULATED_TRADING_HEADER: &str = "x-simulated-trading";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// `reqwest` transport signing every request with the account's API key.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    credentials: OkxCredentials,
}

impl HttpTransport {
    /// Create a transport; `simulated` routes every request to demo trading.
    pub fn new(credentials: OkxCredentials, simulated: bool) -> Result<Self, GatewayError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if simulated {
            headers.insert(SIMULATED_TRADING_HEADER, header::HeaderValue::from_static("1"));
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            credentials,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str, query: &[(&'static str, String)]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .map_err(|e| GatewayError::Configuration(format!("Invalid OKX url: {}", e)))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: String) -> Result<String, GatewayError> {
        let request_path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let signature = sign(
            &self.credentials.api_secret,
            &timestamp,
            method.as_str(),
            &request_path,
            &body,
        )?;
        debug!(method = %method, path = %request_path, "OKX request");

        let mut request = self
            .client
            .request(method, url)
            .header("OK-ACCESS-KEY", &self.credentials.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", &self.credentials.passphrase);
        if !body.is_empty() {
            request = request.body(body);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(e.to_string())
            } else {
                GatewayError::Connection(e.to_string())
            }
        })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?;

        match status {
            s if s.is_success() => Ok(text),
            StatusCode::TOO_MANY_REQUESTS => Err(GatewayError::RateLimited { retry_after_secs: 1 }),
            StatusCode::UNAUTHORIZED => Err(GatewayError::Authentication(text)),
            _ => Err(GatewayError::Api {
                code: status.as_u16().to_string(),
                message: text,
            }),
        }
    }
}

#[async_trait]
impl OkxTransport for HttpTransport {
    async fn get(&self, path: &str, query: &[(&'static str, String)]) -> Result<String, GatewayError> {
        let url = self.url(path, query)?;
        self.send(Method::GET, url, String::new()).await
    }

    async fn post(&self, path: &str, body: String) -> Result<String, GatewayError> {
        let url = self.url(path, &[])?;
        self.send(Method::POST, url, body).await
    }
}

/// `OK-ACCESS-SIGN`: base64 of the HMAC-SHA256 over
/// `timestamp + method + request_path + body`, keyed with the API secret.
pub fn sign(
    secret: &str,
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> Result<String, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::Authentication(format!("Invalid API secret: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(request_path.as_bytes());
    mac.update(body.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}
