use crate::api::ParserBackend;
use crate::error::{ClientError, Result};
use crate::models::{
    ExtractImagesResponse, MediaExtractionSource, ParseTweetRequest, ParseTweetResponse,
    ParsedImageResult, TableResult, ValidateKeyResponse,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scripted backend: keys listed in `valid_keys` validate, everything else
/// gets a 401. Parse answers are canned per tweet URL.
#[derive(Default)]
pub(crate) struct FakeBackend {
    valid_keys: Vec<String>,
    parse_failures: HashMap<String, (u16, String)>,
    validate_calls: AtomicUsize,
    parse_calls: AtomicUsize,
    validated: Mutex<Vec<String>>,
    parsed: Mutex<Vec<ParseTweetRequest>>,
}

impl FakeBackend {
    pub fn accepting(keys: &[&str]) -> Self {
        Self {
            valid_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing_parse(mut self, tweet_url: &str, status: u16, message: &str) -> Self {
        self.parse_failures
            .insert(tweet_url.to_string(), (status, message.to_string()));
        self
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn parse_calls(&self) -> usize {
        self.parse_calls.load(Ordering::SeqCst)
    }

    pub fn validated_keys(&self) -> Vec<String> {
        self.validated
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn parse_requests(&self) -> Vec<ParseTweetRequest> {
        self.parsed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

pub(crate) fn sample_response(tweet_url: &str) -> ParseTweetResponse {
    ParseTweetResponse {
        tweet_id: "1234567890".to_string(),
        normalized_tweet_url: tweet_url.to_string(),
        source: MediaExtractionSource::Syndication,
        results: vec![ParsedImageResult {
            image_url: "https://pbs.twimg.com/media/chart.jpg".to_string(),
            filename: "chart.jpg".to_string(),
            success: true,
            markdown: "# Revenue\n\n| Q | $ |\n|---|---|\n| Q1 | 10 |".to_string(),
            tables: vec![TableResult {
                page_number: 1,
                row_count: 2,
                column_count: 2,
                markdown: "| Q | $ |\n|---|---|\n| Q1 | 10 |".to_string(),
                bbox: None,
            }],
            error: None,
        }],
        combined_markdown: "## Image 1: chart.jpg\n\n# Revenue".to_string(),
        warnings: Vec::new(),
    }
}

#[async_trait]
impl ParserBackend for FakeBackend {
    async fn validate_key(&self, api_key: &str) -> Result<ValidateKeyResponse> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.validated
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(api_key.to_string());

        if self.valid_keys.iter().any(|k| k == api_key) {
            Ok(ValidateKeyResponse {
                valid: true,
                message: "API key is valid".to_string(),
            })
        } else {
            Err(ClientError::Remote {
                status: 401,
                message: "Invalid LlamaCloud API key.".to_string(),
            })
        }
    }

    async fn parse_tweet(&self, request: &ParseTweetRequest) -> Result<ParseTweetResponse> {
        self.parse_calls.fetch_add(1, Ordering::SeqCst);
        self.parsed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        match self.parse_failures.get(&request.tweet_url) {
            Some((status, message)) => Err(ClientError::Remote {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(sample_response(&request.tweet_url)),
        }
    }

    async fn extract_tweet_images(
        &self,
        _tweet_url: &str,
        _x_bearer_token: Option<&str>,
    ) -> Result<ExtractImagesResponse> {
        Ok(ExtractImagesResponse {
            image_urls: vec!["https://pbs.twimg.com/media/chart.jpg".to_string()],
            tweet_id: None,
            normalized_tweet_url: None,
            source: None,
            warnings: Vec::new(),
        })
    }
}
