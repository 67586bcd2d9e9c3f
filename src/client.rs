use crate::api::ParserBackend;
use crate::error::Result;
use crate::models::{ExtractImagesResponse, ParseTweetResponse};
use crate::orchestrator::{ParseForm, ParseOrchestrator};
use crate::session::{Credential, SessionGate};
use crate::storage::KeyValueStore;

/// Session gate and parse orchestrator wired to one backend.
pub struct TweetChartClient<B, S> {
    backend: B,
    gate: SessionGate<S>,
    parses: ParseOrchestrator,
}

impl<B: ParserBackend, S: KeyValueStore> TweetChartClient<B, S> {
    pub fn new(backend: B, store: S) -> Self {
        Self {
            backend,
            gate: SessionGate::new(store),
            parses: ParseOrchestrator::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session(&self) -> &SessionGate<S> {
        &self.gate
    }

    pub fn parses(&self) -> &ParseOrchestrator {
        &self.parses
    }

    pub async fn load_persisted(&mut self) -> Result<Option<Credential>> {
        self.gate.load_persisted(&self.backend).await
    }

    pub async fn submit_key(&mut self, candidate: &str) -> Result<Credential> {
        self.gate.submit(&self.backend, candidate).await
    }

    pub async fn parse(&mut self, form: &ParseForm) -> Result<&ParseTweetResponse> {
        self.parses
            .submit_parse(&self.backend, &self.gate, form)
            .await
    }

    /// Image URLs attached to a tweet. Not gated on the session.
    pub async fn extract_images(
        &self,
        tweet_url: &str,
        x_bearer_token: Option<&str>,
    ) -> Result<ExtractImagesResponse> {
        let token = x_bearer_token.map(str::trim).filter(|t| !t.is_empty());
        self.backend
            .extract_tweet_images(tweet_url.trim(), token)
            .await
    }

    /// Clear the stored key and any parse state.
    pub fn sign_out(&mut self) -> Result<()> {
        self.parses.reset();
        self.gate.sign_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::orchestrator::ParseState;
    use crate::session::KeyStatus;
    use crate::storage::{MemoryStore, API_KEY_STORAGE_KEY};
    use crate::test_support::FakeBackend;

    const TWEET: &str = "https://x.com/someuser/status/1234567890";

    #[tokio::test]
    async fn test_restored_session_can_parse() {
        let store = MemoryStore::with_entry(API_KEY_STORAGE_KEY, "llx-abc");
        let mut client = TweetChartClient::new(FakeBackend::accepting(&["llx-abc"]), store);

        client.load_persisted().await.unwrap();
        let response = client.parse(&ParseForm::new(TWEET)).await.unwrap();

        assert_eq!(response.tweet_id, "1234567890");
        assert_eq!(client.backend().parse_requests()[0].api_key, "llx-abc");
    }

    #[tokio::test]
    async fn test_sign_out_drops_result_and_blocks_parsing() {
        let mut client = TweetChartClient::new(
            FakeBackend::accepting(&["llx-abc"]),
            MemoryStore::new(),
        );
        client.submit_key("llx-abc").await.unwrap();
        client.parse(&ParseForm::new(TWEET)).await.unwrap();

        client.sign_out().unwrap();

        assert_eq!(client.parses().state(), &ParseState::Idle);
        assert_eq!(client.session().status(), KeyStatus::Unknown);
        assert_eq!(
            client.session().store().get(API_KEY_STORAGE_KEY).unwrap(),
            None
        );
        assert!(matches!(
            client.parse(&ParseForm::new(TWEET)).await,
            Err(ClientError::NotAuthenticated)
        ));
        assert_eq!(client.backend().parse_calls(), 1);
    }

    #[tokio::test]
    async fn test_extract_images_needs_no_session() {
        let client = TweetChartClient::new(FakeBackend::accepting(&[]), MemoryStore::new());
        let images = client.extract_images(TWEET, Some("  ")).await.unwrap();
        assert_eq!(images.image_urls.len(), 1);
    }
}
