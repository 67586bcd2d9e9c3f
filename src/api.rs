use crate::error::{ClientError, Result, GENERIC_REQUEST_FAILURE};
use crate::models::{
    ApiErrorBody, ExtractImagesRequest, ExtractImagesResponse, ParseTweetRequest,
    ParseTweetResponse, ValidateKeyRequest, ValidateKeyResponse,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// The remote parsing backend. Every call is single-shot: no retries.
#[async_trait]
pub trait ParserBackend: Send + Sync {
    async fn validate_key(&self, api_key: &str) -> Result<ValidateKeyResponse>;

    async fn parse_tweet(&self, request: &ParseTweetRequest) -> Result<ParseTweetResponse>;

    async fn extract_tweet_images(
        &self,
        tweet_url: &str,
        x_bearer_token: Option<&str>,
    ) -> Result<ExtractImagesResponse>;
}

pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            "tweetchart/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: builder.build().map_err(ClientError::Transport)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = parse_error_message(&body);
            debug!(%url, status = status.as_u16(), %message, "request rejected");
            return Err(ClientError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await.map_err(ClientError::Transport)?;
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Message of a non-2xx response body: `message`, then `detail`, then a
/// generic fallback when the body is missing or not JSON.
pub fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(ApiErrorBody::into_message)
        .unwrap_or_else(|| GENERIC_REQUEST_FAILURE.to_string())
}

#[async_trait]
impl ParserBackend for HttpBackend {
    async fn validate_key(&self, api_key: &str) -> Result<ValidateKeyResponse> {
        self.post_json("/validate-llama-key", &ValidateKeyRequest { api_key })
            .await
    }

    async fn parse_tweet(&self, request: &ParseTweetRequest) -> Result<ParseTweetResponse> {
        self.post_json("/parse-tweet", request).await
    }

    async fn extract_tweet_images(
        &self,
        tweet_url: &str,
        x_bearer_token: Option<&str>,
    ) -> Result<ExtractImagesResponse> {
        self.post_json(
            "/extract-tweet-images",
            &ExtractImagesRequest {
                tweet_url,
                x_bearer_token,
            },
        )
        .await
    }
}
