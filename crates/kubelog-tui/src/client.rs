use reqwest::{StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

use kubelog_types::{ContainerList, ContainerRef};

use crate::connection::ChannelAddress;

/// Header the gateway reads the shared secret from
const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid gateway URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Talks to a kubelog gateway
#[derive(Clone, Debug)]
pub struct GatewayClient {
    http: reqwest::Client,
    base: Url,
    key: Option<String>,
}

impl GatewayClient {
    pub fn new(base_url: &str, key: Option<String>) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl {
                url: base_url.to_string(),
                reason: "scheme must be http or https".to_string(),
            });
        }

        // Joined paths are relative to the base
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base,
            key: key.filter(|k| !k.is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Current snapshot of the gateway's container directory
    pub async fn list_containers(&self) -> Result<ContainerList, ClientError> {
        let url = self.endpoint("api/containers")?;

        let mut request = self.http.get(url);
        if let Some(key) = &self.key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(ClientError::Status { status, message });
        }

        response
            .json::<ContainerList>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Push-channel address for one container. The credential can only
    /// travel in the query string.
    pub fn stream_url(&self, target: &ContainerRef) -> Result<Url, ClientError> {
        let mut url = self.endpoint(&format!(
            "ws/logs/{}/{}",
            target.pod_name, target.container_name
        ))?;

        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|_| ClientError::InvalidUrl {
            url: url.to_string(),
            reason: format!("cannot switch scheme to {}", scheme),
        })?;

        if let Some(key) = &self.key {
            url.query_pairs_mut().append_pair("key", key);
        }

        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base.join(path).map_err(|e| ClientError::InvalidUrl {
            url: format!("{}{}", self.base, path),
            reason: e.to_string(),
        })
    }
}

impl ChannelAddress for GatewayClient {
    fn stream_url(&self, target: &ContainerRef) -> String {
        // The base was validated on construction, so joining cannot fail
        GatewayClient::stream_url(self, target)
            .map(String::from)
            .unwrap_or_default()
    }
}
