use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality/cost profile for the remote parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseTier {
    Fast,
    CostEffective,
    #[default]
    Agentic,
    AgenticPlus,
}

impl ParseTier {
    pub const ALL: [ParseTier; 4] = [
        ParseTier::Fast,
        ParseTier::CostEffective,
        ParseTier::Agentic,
        ParseTier::AgenticPlus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParseTier::Fast => "fast",
            ParseTier::CostEffective => "cost_effective",
            ParseTier::Agentic => "agentic",
            ParseTier::AgenticPlus => "agentic_plus",
        }
    }
}

impl fmt::Display for ParseTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParseTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ParseTier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown tier '{}' (expected one of: fast, cost_effective, agentic, agentic_plus)",
                    s
                )
            })
    }
}

/// Where the backend found the tweet's media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaExtractionSource {
    XApi,
    Syndication,
    FxtwitterApi,
    HtmlMeta,
}

impl fmt::Display for MediaExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MediaExtractionSource::XApi => "X API",
            MediaExtractionSource::Syndication => "syndication",
            MediaExtractionSource::FxtwitterApi => "fxtwitter API",
            MediaExtractionSource::HtmlMeta => "HTML meta tags",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateKeyRequest<'a> {
    pub api_key: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValidateKeyResponse {
    pub valid: bool,
    #[serde(default)]
    pub message: String,
}

/// One parse submission. Built fresh per submit and never mutated afterwards.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ParseTweetRequest {
    pub api_key: String,
    pub tweet_url: String,
    pub tier: ParseTier,
    pub enable_chart_parsing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_bearer_token: Option<String>,
}

impl fmt::Debug for ParseTweetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseTweetRequest")
            .field("api_key", &"<redacted>")
            .field("tweet_url", &self.tweet_url)
            .field("tier", &self.tier)
            .field("enable_chart_parsing", &self.enable_chart_parsing)
            .field(
                "x_bearer_token",
                &self.x_bearer_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableResult {
    pub page_number: u32,
    pub row_count: u32,
    pub column_count: u32,
    pub markdown: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedImageResult {
    pub image_url: String,
    pub filename: String,
    pub success: bool,
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub tables: Vec<TableResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseTweetResponse {
    pub tweet_id: String,
    pub normalized_tweet_url: String,
    pub source: MediaExtractionSource,
    pub results: Vec<ParsedImageResult>,
    pub combined_markdown: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ParseTweetResponse {
    pub fn failed_results(&self) -> impl Iterator<Item = &ParsedImageResult> {
        self.results.iter().filter(|result| !result.success)
    }

    pub fn table_count(&self) -> usize {
        self.results.iter().map(|result| result.tables.len()).sum()
    }
}

#[derive(Clone, Serialize)]
pub struct ExtractImagesRequest<'a> {
    pub tweet_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_bearer_token: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractImagesResponse {
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub tweet_id: Option<String>,
    #[serde(default)]
    pub normalized_tweet_url: Option<String>,
    #[serde(default)]
    pub source: Option<MediaExtractionSource>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Error payload of a non-2xx response. `detail` is either a plain string or
/// an object carrying its own `message`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ErrorDetail {
    Text(String),
    Structured {
        #[serde(default)]
        message: Option<String>,
    },
    Other(#[allow(dead_code)] serde_json::Value),
}

impl ApiErrorBody {
    pub fn into_message(self) -> Option<String> {
        let non_empty = |s: String| if s.trim().is_empty() { None } else { Some(s) };
        self.message.and_then(non_empty).or(match self.detail {
            Some(ErrorDetail::Text(text)) => non_empty(text),
            Some(ErrorDetail::Structured { message }) => message.and_then(non_empty),
            Some(ErrorDetail::Other(_)) | None => None,
        })
    }
}
