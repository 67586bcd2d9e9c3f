use crate::api::ParserBackend;
use crate::error::{ClientError, Result};
use crate::models::{ParseTier, ParseTweetRequest, ParseTweetResponse};
use crate::session::SessionGate;
use crate::storage::KeyValueStore;
use tracing::{debug, info, warn};

const PARSE_FAILED_MESSAGE: &str = "Failed to parse tweet.";

/// Values the user entered for one parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseForm {
    pub tweet_url: String,
    pub tier: ParseTier,
    pub enable_chart_parsing: bool,
    pub x_bearer_token: Option<String>,
}

impl ParseForm {
    pub fn new(tweet_url: impl Into<String>) -> Self {
        Self {
            tweet_url: tweet_url.into(),
            tier: ParseTier::default(),
            enable_chart_parsing: true,
            x_bearer_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseState {
    Idle,
    InFlight {
        request: ParseTweetRequest,
    },
    Succeeded {
        request: ParseTweetRequest,
        response: ParseTweetResponse,
    },
    Failed {
        request: ParseTweetRequest,
        message: String,
    },
}

#[derive(Debug)]
#[must_use = "a pending parse does nothing until run and completed"]
pub struct PendingParse {
    generation: u64,
    request: ParseTweetRequest,
}

impl PendingParse {
    pub fn request(&self) -> &ParseTweetRequest {
        &self.request
    }

    pub async fn run<B: ParserBackend + ?Sized>(self, backend: &B) -> ParseOutcome {
        debug!(tweet_url = %self.request.tweet_url, tier = %self.request.tier, "submitting parse");
        let result = backend.parse_tweet(&self.request).await;
        ParseOutcome {
            generation: self.generation,
            request: self.request,
            result,
        }
    }
}

#[derive(Debug)]
pub struct ParseOutcome {
    generation: u64,
    request: ParseTweetRequest,
    result: Result<ParseTweetResponse>,
}

/// Tracks the one parse request a session may have outstanding.
///
/// A failed parse replaces whatever result was shown before it, so the
/// visible response always belongs to the latest request.
#[derive(Debug)]
pub struct ParseOrchestrator {
    state: ParseState,
    generation: u64,
}

impl Default for ParseOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseOrchestrator {
    pub fn new() -> Self {
        Self {
            state: ParseState::Idle,
            generation: 0,
        }
    }

    pub fn state(&self) -> &ParseState {
        &self.state
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, ParseState::InFlight { .. })
    }

    pub fn response(&self) -> Option<&ParseTweetResponse> {
        match &self.state {
            ParseState::Succeeded { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            ParseState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn begin_parse<S: KeyValueStore>(
        &mut self,
        gate: &SessionGate<S>,
        form: &ParseForm,
    ) -> Result<PendingParse> {
        if self.is_in_flight() {
            return Err(ClientError::ParseInFlight);
        }

        let Some(credential) = gate.credential() else {
            warn!(status = ?gate.status(), "parse refused without a valid API key");
            return Err(ClientError::NotAuthenticated);
        };

        let tweet_url = form.tweet_url.trim();
        if tweet_url.is_empty() {
            return Err(ClientError::EmptyTweetUrl);
        }

        let request = ParseTweetRequest {
            api_key: credential.value().to_string(),
            tweet_url: tweet_url.to_string(),
            tier: form.tier,
            enable_chart_parsing: form.enable_chart_parsing,
            x_bearer_token: form
                .x_bearer_token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
        };

        self.generation += 1;
        self.state = ParseState::InFlight {
            request: request.clone(),
        };

        Ok(PendingParse {
            generation: self.generation,
            request,
        })
    }

    pub fn complete(&mut self, outcome: ParseOutcome) -> Result<&ParseTweetResponse> {
        if outcome.generation != self.generation {
            warn!(tweet_url = %outcome.request.tweet_url, "ignoring parse result from a reset session");
            return Err(ClientError::Superseded);
        }

        match outcome.result {
            Ok(response) => {
                info!(
                    tweet_id = %response.tweet_id,
                    images = response.results.len(),
                    tables = response.table_count(),
                    "tweet parsed"
                );
                self.state = ParseState::Succeeded {
                    request: outcome.request,
                    response,
                };
                match &self.state {
                    ParseState::Succeeded { response, .. } => Ok(response),
                    _ => unreachable!("state was just set to Succeeded"),
                }
            }
            Err(e) => {
                let message = match &e {
                    ClientError::Remote { message, .. } => message.clone(),
                    _ => PARSE_FAILED_MESSAGE.to_string(),
                };
                info!(tweet_url = %outcome.request.tweet_url, %message, "parse failed");
                self.state = ParseState::Failed {
                    request: outcome.request,
                    message,
                };
                Err(e)
            }
        }
    }

    /// Build, send and record one parse. Refused unless `gate` holds a
    /// validated key.
    pub async fn submit_parse<B, S>(
        &mut self,
        backend: &B,
        gate: &SessionGate<S>,
        form: &ParseForm,
    ) -> Result<&ParseTweetResponse>
    where
        B: ParserBackend + ?Sized,
        S: KeyValueStore,
    {
        let pending = self.begin_parse(gate, form)?;
        let outcome = pending.run(backend).await;
        self.complete(outcome)
    }

    /// Drop any result and orphan the request in flight.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = ParseState::Idle;
    }
}
