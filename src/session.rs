//! API-key session gate.
//!
//! Holds at most one credential, validates it against the parsing backend
//! before anything else may use it, and keeps it in a [`KeyValueStore`] so it
//! survives restarts.
//!
//! Each validation is split in three steps so a caller can reset the gate
//! while a call is still running: `begin_*` moves the state machine and hands
//! out a [`PendingValidation`], [`PendingValidation::run`] awaits the backend
//! without borrowing the gate, and [`SessionGate::complete`] applies the
//! outcome. Outcomes from before the latest reset are dropped.

use crate::api::ParserBackend;
use crate::error::{ClientError, Result, EMPTY_API_KEY_MESSAGE};
use crate::models::ValidateKeyResponse;
use crate::storage::{KeyValueStore, API_KEY_STORAGE_KEY};
use std::fmt;
use tracing::{debug, info, warn};

const VALIDATION_FAILED_MESSAGE: &str = "API key validation failed.";

/// An API key as entered or loaded, plus its trimmed form.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    raw: String,
    trimmed: String,
}

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim().to_string();
        Self { raw, trimmed }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The value sent to the backend and persisted.
    pub fn value(&self) -> &str {
        &self.trimmed
    }

    pub fn is_blank(&self) -> bool {
        self.trimmed.is_empty()
    }

    /// Short form safe for logs and status output.
    pub fn masked(&self) -> String {
        let visible: String = self.trimmed.chars().take(4).collect();
        if self.trimmed.chars().count() <= 8 {
            format!("{}…", visible)
        } else {
            let tail: String = self
                .trimmed
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("{}…{}", visible, tail)
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Unknown,
    Checking,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NoKey,
    CheckingStored,
    CheckingSubmission { candidate: Credential },
    Valid(Credential),
    Invalid { message: String },
}

impl SessionState {
    pub fn status(&self) -> KeyStatus {
        match self {
            SessionState::NoKey => KeyStatus::Unknown,
            SessionState::CheckingStored | SessionState::CheckingSubmission { .. } => {
                KeyStatus::Checking
            }
            SessionState::Valid(_) => KeyStatus::Valid,
            SessionState::Invalid { .. } => KeyStatus::Invalid,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            SessionState::Invalid { message } => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Stored,
    Submission,
}

/// What a `begin_*` call decided.
#[derive(Debug)]
pub enum Validation {
    /// No network call needed; the gate already reflects the answer.
    Settled(Option<Credential>),
    /// A backend call must be run and fed back through [`SessionGate::complete`].
    Pending(PendingValidation),
}

#[derive(Debug)]
#[must_use = "a pending validation does nothing until run and completed"]
pub struct PendingValidation {
    generation: u64,
    origin: Origin,
    candidate: Credential,
}

impl PendingValidation {
    pub async fn run<B: ParserBackend + ?Sized>(self, backend: &B) -> ValidationOutcome {
        debug!(key = %self.candidate.masked(), origin = ?self.origin, "validating API key");
        let result = match backend.validate_key(self.candidate.value()).await {
            Ok(ValidateKeyResponse { valid: true, .. }) => Ok(()),
            Ok(ValidateKeyResponse { message, .. }) => Err(ClientError::Remote {
                status: 200,
                message: if message.trim().is_empty() {
                    VALIDATION_FAILED_MESSAGE.to_string()
                } else {
                    message
                },
            }),
            Err(e) => Err(e),
        };

        ValidationOutcome {
            generation: self.generation,
            origin: self.origin,
            candidate: self.candidate,
            result,
        }
    }
}

#[derive(Debug)]
pub struct ValidationOutcome {
    generation: u64,
    origin: Origin,
    candidate: Credential,
    result: Result<()>,
}

pub struct SessionGate<S> {
    store: S,
    state: SessionState,
    generation: u64,
}

impl<S: KeyValueStore> SessionGate<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: SessionState::NoKey,
            generation: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> KeyStatus {
        self.state.status()
    }

    /// The validated credential, only while the gate is `Valid`.
    pub fn credential(&self) -> Option<&Credential> {
        match &self.state {
            SessionState::Valid(credential) => Some(credential),
            _ => None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read the persisted key and start re-validating it.
    pub fn begin_load(&mut self) -> Result<Validation> {
        let stored = self.store.get(API_KEY_STORAGE_KEY)?;
        let Some(stored) = stored else {
            self.state = SessionState::NoKey;
            return Ok(Validation::Settled(None));
        };

        let candidate = Credential::new(stored);
        if candidate.is_blank() {
            debug!("discarding blank stored API key");
            self.store.remove(API_KEY_STORAGE_KEY)?;
            self.state = SessionState::NoKey;
            return Ok(Validation::Settled(None));
        }

        self.state = SessionState::CheckingStored;
        Ok(Validation::Pending(self.pending(Origin::Stored, candidate)))
    }

    /// Start validating a key the user typed in.
    pub fn begin_submit(&mut self, candidate: &str) -> Result<Validation> {
        let candidate = Credential::new(candidate);
        if candidate.is_blank() {
            self.state = SessionState::Invalid {
                message: EMPTY_API_KEY_MESSAGE.to_string(),
            };
            return Err(ClientError::EmptyApiKey);
        }

        if let SessionState::Valid(current) = &self.state {
            if current.value() == candidate.value() {
                return Ok(Validation::Settled(Some(current.clone())));
            }
        }

        self.state = SessionState::CheckingSubmission {
            candidate: candidate.clone(),
        };
        Ok(Validation::Pending(self.pending(Origin::Submission, candidate)))
    }

    fn pending(&mut self, origin: Origin, candidate: Credential) -> PendingValidation {
        self.generation += 1;
        PendingValidation {
            generation: self.generation,
            origin,
            candidate,
        }
    }

    /// Apply a finished validation.
    ///
    /// A failed stored-key check resolves to `Ok(None)`: the key is dropped
    /// silently. A failed submission surfaces the backend error.
    pub fn complete(&mut self, outcome: ValidationOutcome) -> Result<Option<Credential>> {
        if outcome.generation != self.generation {
            warn!(
                key = %outcome.candidate.masked(),
                "ignoring validation result from a reset session"
            );
            return Err(ClientError::Superseded);
        }

        match (outcome.origin, outcome.result) {
            (Origin::Stored, Ok(())) => {
                info!(key = %outcome.candidate.masked(), "stored API key is valid");
                self.state = SessionState::Valid(outcome.candidate.clone());
                Ok(Some(outcome.candidate))
            }
            (Origin::Stored, Err(e)) => {
                warn!(key = %outcome.candidate.masked(), error = %e, "discarding stored API key");
                self.state = SessionState::NoKey;
                self.store.remove(API_KEY_STORAGE_KEY)?;
                Ok(None)
            }
            (Origin::Submission, Ok(())) => {
                if let Err(e) = self.store.set(API_KEY_STORAGE_KEY, outcome.candidate.value()) {
                    self.state = SessionState::Invalid {
                        message: e.to_string(),
                    };
                    return Err(e.into());
                }
                info!(key = %outcome.candidate.masked(), "API key validated");
                self.state = SessionState::Valid(outcome.candidate.clone());
                Ok(Some(outcome.candidate))
            }
            (Origin::Submission, Err(e)) => {
                let message = match &e {
                    ClientError::Remote { message, .. } => message.clone(),
                    _ => VALIDATION_FAILED_MESSAGE.to_string(),
                };
                info!(key = %outcome.candidate.masked(), %message, "API key rejected");
                self.state = SessionState::Invalid { message };
                self.store.remove(API_KEY_STORAGE_KEY)?;
                Err(e)
            }
        }
    }

    /// Restore the persisted session, if any. Never reports a rejected stored
    /// key as an error.
    pub async fn load_persisted<B: ParserBackend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<Option<Credential>> {
        match self.begin_load()? {
            Validation::Settled(credential) => Ok(credential),
            Validation::Pending(pending) => {
                let outcome = pending.run(backend).await;
                self.complete(outcome)
            }
        }
    }

    pub async fn submit<B: ParserBackend + ?Sized>(
        &mut self,
        backend: &B,
        candidate: &str,
    ) -> Result<Credential> {
        match self.begin_submit(candidate)? {
            Validation::Settled(Some(credential)) => Ok(credential),
            Validation::Settled(None) => Err(ClientError::EmptyApiKey),
            Validation::Pending(pending) => {
                let outcome = pending.run(backend).await;
                self.complete(outcome)?.ok_or(ClientError::Superseded)
            }
        }
    }

    /// Forget the key everywhere. Any validation still in flight is ignored
    /// when it completes.
    pub fn sign_out(&mut self) -> Result<()> {
        self.generation += 1;
        self.state = SessionState::NoKey;
        self.store.remove(API_KEY_STORAGE_KEY)?;
        info!("signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::test_support::FakeBackend;

    fn stored(value: &str) -> MemoryStore {
        MemoryStore::with_entry(API_KEY_STORAGE_KEY, value)
    }

    fn persisted(gate: &SessionGate<MemoryStore>) -> Option<String> {
        gate.store().get(API_KEY_STORAGE_KEY).unwrap()
    }

    #[tokio::test]
    async fn test_load_without_stored_key() {
        let backend = FakeBackend::accepting(&["llx-abc"]);
        let mut gate = SessionGate::new(MemoryStore::new());

        let loaded = gate.load_persisted(&backend).await.unwrap();

        assert_eq!(loaded, None);
        assert_eq!(gate.state(), &SessionState::NoKey);
        assert_eq!(backend.validate_calls(), 0);
    }

    #[tokio::test]
    async fn test_load_valid_stored_key() {
        let backend = FakeBackend::accepting(&["llx-abc"]);
        let mut gate = SessionGate::new(stored("llx-abc"));

        let pending = match gate.begin_load().unwrap() {
            Validation::Pending(pending) => pending,
            other => panic!("expected pending validation, got {:?}", other),
        };
        assert_eq!(gate.state(), &SessionState::CheckingStored);
        assert_eq!(gate.status(), KeyStatus::Checking);

        let outcome = pending.run(&backend).await;
        let credential = gate.complete(outcome).unwrap().unwrap();

        assert_eq!(credential.value(), "llx-abc");
        assert_eq!(gate.status(), KeyStatus::Valid);
        assert_eq!(gate.credential().map(Credential::value), Some("llx-abc"));
    }

    #[tokio::test]
    async fn test_load_rejected_stored_key_is_silently_discarded() {
        let backend = FakeBackend::accepting(&[]);
        let mut gate = SessionGate::new(stored("llx-bad"));

        let loaded = gate.load_persisted(&backend).await.unwrap();

        assert_eq!(loaded, None);
        assert_eq!(gate.state(), &SessionState::NoKey);
        assert_eq!(gate.state().error_message(), None);
        assert_eq!(persisted(&gate), None);
        assert_eq!(backend.validate_calls(), 1);
    }

    #[tokio::test]
    async fn test_load_trims_stored_key() {
        let backend = FakeBackend::accepting(&["llx-abc"]);
        let mut gate = SessionGate::new(stored("  llx-abc\n"));

        let loaded = gate.load_persisted(&backend).await.unwrap();

        assert_eq!(loaded.map(|c| c.value().to_string()), Some("llx-abc".to_string()));
        assert_eq!(backend.validated_keys(), vec!["llx-abc".to_string()]);
    }

    #[tokio::test]
    async fn test_load_blank_stored_key_is_removed_without_network() {
        let backend = FakeBackend::accepting(&[]);
        let mut gate = SessionGate::new(stored("   "));

        assert_eq!(gate.load_persisted(&backend).await.unwrap(), None);
        assert_eq!(persisted(&gate), None);
        assert_eq!(backend.validate_calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_blank_rejected_locally() {
        let backend = FakeBackend::accepting(&["llx-abc"]);
        for blank in ["", "  ", "\t\n"] {
            let mut gate = SessionGate::new(MemoryStore::new());
            let err = gate.submit(&backend, blank).await.unwrap_err();
            assert!(matches!(err, ClientError::EmptyApiKey));
            assert_eq!(
                gate.state().error_message(),
                Some("Please enter your LlamaCloud API key.")
            );
        }
        assert_eq!(backend.validate_calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_persists_trimmed_key() {
        let backend = FakeBackend::accepting(&["llx-abc"]);
        let mut gate = SessionGate::new(MemoryStore::new());

        let credential = gate.submit(&backend, "  llx-abc  ").await.unwrap();

        assert_eq!(credential.raw(), "  llx-abc  ");
        assert_eq!(credential.value(), "llx-abc");
        assert_eq!(persisted(&gate), Some("llx-abc".to_string()));
        assert_eq!(gate.credential().map(Credential::value), Some("llx-abc"));
        assert_eq!(backend.validated_keys(), vec!["llx-abc".to_string()]);
    }

    #[tokio::test]
    async fn test_submit_failure_surfaces_remote_message_and_clears_storage() {
        let backend = FakeBackend::accepting(&[]);
        let mut gate = SessionGate::new(stored("llx-old"));

        let err = gate.submit(&backend, "llx-wrong").await.unwrap_err();

        assert_eq!(err.remote_message(), Some("Invalid LlamaCloud API key."));
        assert_eq!(gate.status(), KeyStatus::Invalid);
        assert_eq!(
            gate.state().error_message(),
            Some("Invalid LlamaCloud API key.")
        );
        assert_eq!(persisted(&gate), None);
        assert!(gate.credential().is_none());
    }

    #[tokio::test]
    async fn test_submit_same_valid_key_skips_network() {
        let backend = FakeBackend::accepting(&["llx-abc"]);
        let mut gate = SessionGate::new(MemoryStore::new());

        gate.submit(&backend, "llx-abc").await.unwrap();
        gate.submit(&backend, " llx-abc ").await.unwrap();

        assert_eq!(backend.validate_calls(), 1);
        assert_eq!(gate.status(), KeyStatus::Valid);
    }

    #[tokio::test]
    async fn test_submit_different_key_revalidates() {
        let backend = FakeBackend::accepting(&["llx-abc", "llx-def"]);
        let mut gate = SessionGate::new(MemoryStore::new());

        gate.submit(&backend, "llx-abc").await.unwrap();
        gate.submit(&backend, "llx-def").await.unwrap();

        assert_eq!(backend.validate_calls(), 2);
        assert_eq!(persisted(&gate), Some("llx-def".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_then_resubmit() {
        let backend = FakeBackend::accepting(&["llx-good"]);
        let mut gate = SessionGate::new(MemoryStore::new());

        assert!(gate.submit(&backend, "llx-bad").await.is_err());
        assert_eq!(gate.status(), KeyStatus::Invalid);

        gate.submit(&backend, "llx-good").await.unwrap();
        assert_eq!(gate.status(), KeyStatus::Valid);
    }

    #[tokio::test]
    async fn test_sign_out_clears_storage_from_any_state() {
        let backend = FakeBackend::accepting(&["llx-abc"]);

        let mut gate = SessionGate::new(stored("llx-abc"));
        gate.sign_out().unwrap();
        assert_eq!(persisted(&gate), None);
        assert_eq!(gate.state(), &SessionState::NoKey);

        let mut gate = SessionGate::new(MemoryStore::new());
        gate.submit(&backend, "llx-abc").await.unwrap();
        gate.sign_out().unwrap();
        assert_eq!(persisted(&gate), None);
        assert!(gate.credential().is_none());
    }

    #[tokio::test]
    async fn test_validation_after_sign_out_is_ignored() {
        let backend = FakeBackend::accepting(&["llx-abc"]);
        let mut gate = SessionGate::new(MemoryStore::new());

        let pending = match gate.begin_submit("llx-abc").unwrap() {
            Validation::Pending(pending) => pending,
            other => panic!("expected pending validation, got {:?}", other),
        };
        assert_eq!(gate.status(), KeyStatus::Checking);

        gate.sign_out().unwrap();
        let outcome = pending.run(&backend).await;
        let err = gate.complete(outcome).unwrap_err();

        assert!(matches!(err, ClientError::Superseded));
        assert_eq!(gate.state(), &SessionState::NoKey);
        assert_eq!(persisted(&gate), None);
    }

    #[tokio::test]
    async fn test_older_submission_is_superseded_by_newer() {
        let backend = FakeBackend::accepting(&["llx-one", "llx-two"]);
        let mut gate = SessionGate::new(MemoryStore::new());

        let Validation::Pending(first) = gate.begin_submit("llx-one").unwrap() else {
            panic!("expected pending validation");
        };
        let Validation::Pending(second) = gate.begin_submit("llx-two").unwrap() else {
            panic!("expected pending validation");
        };

        let second = second.run(&backend).await;
        gate.complete(second).unwrap();
        let first = first.run(&backend).await;
        assert!(gate.complete(first).is_err());

        assert_eq!(gate.credential().map(Credential::value), Some("llx-two"));
        assert_eq!(persisted(&gate), Some("llx-two".to_string()));
    }

    #[test]
    fn test_credential_debug_is_masked() {
        let credential = Credential::new("llx-0123456789abcdef");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("0123456789"));
        assert_eq!(credential.masked(), "llx-…cdef");
        assert_eq!(Credential::new("llx-ab").masked(), "llx-…");
    }
}
