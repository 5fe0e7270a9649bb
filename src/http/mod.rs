use anyhow::Result;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, instrument};

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("arrmigrate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    // `url` carries the API key, so it is never recorded in spans.

    #[instrument(skip_all)]
    pub async fn get(&self, url: &str) -> Result<Response> {
        debug!("Making GET request");
        let response = self.client.get(url).send().await?;
        ensure_success(response, "GET").await
    }

    #[instrument(skip_all)]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?;
        let json = response.json::<T>().await?;
        Ok(json)
    }

    #[instrument(skip_all)]
    pub async fn post<B: serde::Serialize>(&self, url: &str, body: Option<&B>) -> Result<Response> {
        debug!("Making POST request");
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        ensure_success(response, "POST").await
    }

    #[instrument(skip_all)]
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(&self, url: &str, body: &B) -> Result<T> {
        let response = self.post(url, Some(body)).await?;
        let json = response.json::<T>().await?;
        Ok(json)
    }
}

/// Turns a non-2xx response into an error carrying the server's own message.
async fn ensure_success(response: Response, method: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    error!("HTTP {} failed with status: {}", method, status);
    let body = response.text().await.unwrap_or_default();
    Err(anyhow::anyhow!(error_message(&body).unwrap_or_else(|| format!("HTTP {} failed: {}", method, status))))
}

fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for field in ["error", "message"] {
            if let Some(msg) = json.get(field).and_then(|v| v.as_str()) {
                return Some(msg.to_string());
            }
        }
    }
    Some(trimmed.to_string())
}
